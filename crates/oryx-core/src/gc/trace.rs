//! Trace trait and the live-set marker

use rustc_hash::FxHashSet;

use crate::behavior::Behavior;
use crate::code::Code;
use crate::message::MessageId;
use crate::method::Method;
use crate::object::{Object, ObjectId};
use crate::value::Value;

/// Receives the references reported by [`GcTraceable::trace`]
pub trait Tracer {
    /// Visit one referenced value
    fn visit_value(&mut self, value: &Value);
}

/// Reports every value an entity references directly
pub trait GcTraceable {
    /// Report references to `tracer`
    fn trace(&self, tracer: &mut dyn Tracer);
}

impl GcTraceable for Value {
    fn trace(&self, tracer: &mut dyn Tracer) {
        match self {
            Value::Array(items) => {
                for item in items.iter() {
                    tracer.visit_value(item);
                }
            }
            Value::Object(object) => object.trace(tracer),
            Value::Message(message) => message.trace(tracer),
            Value::Nil | Value::Boolean(_) | Value::Integer(_) | Value::Str(_) => {}
        }
    }
}

impl GcTraceable for Object {
    fn trace(&self, tracer: &mut dyn Tracer) {
        // class methods are owned by the registry; only per-instance ones
        // belong to the object
        self.behavior().trace(tracer);
        for (_, _, value) in self.variables() {
            tracer.visit_value(&value);
        }
    }
}

impl GcTraceable for Behavior {
    fn trace(&self, tracer: &mut dyn Tracer) {
        for (_, method) in self.instance_methods() {
            method.trace(tracer);
        }
    }
}

impl GcTraceable for Method {
    fn trace(&self, tracer: &mut dyn Tracer) {
        self.code().trace(tracer);
    }
}

impl GcTraceable for Code {
    fn trace(&self, tracer: &mut dyn Tracer) {
        if let Code::Interpreted(code) = self {
            code.body().trace(tracer);
        }
    }
}

/// Everything reachable from a set of roots.
///
/// Objects and messages are visited once each, so cyclic graphs terminate.
#[derive(Default)]
pub struct LiveSet {
    objects: FxHashSet<ObjectId>,
    messages: FxHashSet<MessageId>,
    worklist: Vec<Value>,
}

impl LiveSet {
    /// Create an empty live set
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark everything reachable from `roots`
    pub fn mark_roots<'a>(roots: impl IntoIterator<Item = &'a Value>) -> Self {
        let mut live = Self::new();
        for root in roots {
            live.mark(root);
        }
        live
    }

    /// Mark everything reachable from `root`
    pub fn mark(&mut self, root: &Value) {
        self.worklist.push(root.clone());
        while let Some(value) = self.worklist.pop() {
            let fresh = match &value {
                Value::Object(object) => self.objects.insert(object.id()),
                Value::Message(message) => self.messages.insert(message.id()),
                _ => true,
            };
            if fresh {
                value.trace(self);
            }
        }
    }

    /// Whether a heap value was reached; non-heap values are always live
    pub fn contains(&self, value: &Value) -> bool {
        match value {
            Value::Object(object) => self.objects.contains(&object.id()),
            Value::Message(message) => self.messages.contains(&message.id()),
            _ => true,
        }
    }

    /// Number of reached objects
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Number of reached messages
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

impl Tracer for LiveSet {
    fn visit_value(&mut self, value: &Value) {
        if matches!(value, Value::Object(_) | Value::Message(_) | Value::Array(_)) {
            self.worklist.push(value.clone());
        }
    }
}
