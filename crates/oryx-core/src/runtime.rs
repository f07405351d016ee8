//! Runtime: registries, options and activity creation
//!
//! A [`Runtime`] is shared (`Arc`) by every activity running on it. It owns
//! the class registry, the activity manager, the external handler registry
//! and the map from primitive value kinds to the classes they dispatch
//! through. The root `OBJECT` and the `MESSAGE` classes are installed when
//! the runtime is created.

use std::fmt;
use std::sync::Arc;
use std::thread;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::behavior::Behavior;
use crate::builtins;
use crate::class::{ClassId, ClassRegistry};
use crate::defaults::{
    DEFAULT_ACTIVITY_NAME_PREFIX, DEFAULT_MAX_CALL_DEPTH, MESSAGE_CLASS_NAME, OBJECT_CLASS_NAME,
};
use crate::handler::{HandlerContext, HandlerFn, HandlerRegistry, HandlerResult};
use crate::method::{Method, MethodRef};
use crate::object::Object;
use crate::scheduler::{Activity, ActivityHandle, ActivityManager};
use crate::security::SecurityManagerRef;
use crate::selector::Selector;
use crate::value::{Value, ValueKind};
use crate::{RuntimeError, RuntimeResult};

/// Runtime configuration
#[derive(Clone)]
pub struct RuntimeOptions {
    /// Maximum nested activations per activity
    pub max_call_depth: usize,

    /// Thread name prefix for spawned activities
    pub activity_name_prefix: String,

    /// Refuse waits that would close a cycle in the wait-for graph
    pub deadlock_detection: bool,

    /// Log a warning when a started message fails and nobody has asked for
    /// its result by the time its activity ends
    pub report_unobserved_errors: bool,

    /// Security manager installed on the root frame of every activity
    pub security_manager: Option<SecurityManagerRef>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            activity_name_prefix: DEFAULT_ACTIVITY_NAME_PREFIX.to_string(),
            deadlock_detection: true,
            report_unobserved_errors: true,
            security_manager: None,
        }
    }
}

impl RuntimeOptions {
    /// Set the maximum call depth
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Set the activity thread name prefix
    pub fn with_activity_name_prefix(mut self, prefix: &str) -> Self {
        self.activity_name_prefix = prefix.to_string();
        self
    }

    /// Enable or disable deadlock detection
    pub fn with_deadlock_detection(mut self, enabled: bool) -> Self {
        self.deadlock_detection = enabled;
        self
    }

    /// Enable or disable warnings for unobserved errors of started messages
    pub fn with_unobserved_error_reports(mut self, enabled: bool) -> Self {
        self.report_unobserved_errors = enabled;
        self
    }

    /// Install a default security manager
    pub fn with_security_manager(mut self, security: SecurityManagerRef) -> Self {
        self.security_manager = Some(security);
        self
    }
}

impl fmt::Debug for RuntimeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeOptions")
            .field("max_call_depth", &self.max_call_depth)
            .field("activity_name_prefix", &self.activity_name_prefix)
            .field("deadlock_detection", &self.deadlock_detection)
            .field("report_unobserved_errors", &self.report_unobserved_errors)
            .field("security_manager", &self.security_manager.is_some())
            .finish()
    }
}

/// The shared runtime
pub struct Runtime {
    options: RuntimeOptions,
    classes: ClassRegistry,
    activities: ActivityManager,
    handlers: RwLock<HandlerRegistry>,
    primitive_classes: RwLock<FxHashMap<ValueKind, ClassId>>,
    object_class: ClassId,
    message_class: ClassId,
}

impl Runtime {
    /// Create a runtime with default options
    pub fn new() -> Arc<Self> {
        Self::with_options(RuntimeOptions::default())
    }

    /// Create a runtime with specific options
    pub fn with_options(options: RuntimeOptions) -> Arc<Self> {
        let classes = ClassRegistry::new();
        // the registry is empty, so neither definition can fail
        let object_class = classes
            .define(OBJECT_CLASS_NAME, None)
            .unwrap_or_else(|_| ClassId::from_index(0));
        let message_class = classes
            .define(MESSAGE_CLASS_NAME, Some(object_class))
            .unwrap_or_else(|_| ClassId::from_index(1));

        let mut primitive_classes = FxHashMap::default();
        primitive_classes.insert(ValueKind::Message, message_class);

        let activities =
            ActivityManager::new(&options.activity_name_prefix, options.deadlock_detection);
        let runtime = Self {
            options,
            classes,
            activities,
            handlers: RwLock::new(HandlerRegistry::new()),
            primitive_classes: RwLock::new(primitive_classes),
            object_class,
            message_class,
        };
        builtins::install(&runtime);
        debug!(classes = runtime.classes.len(), "runtime created");
        Arc::new(runtime)
    }

    /// Options
    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// Class registry
    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    /// Activity manager
    pub fn activities(&self) -> &ActivityManager {
        &self.activities
    }

    /// The root class
    pub fn object_class(&self) -> ClassId {
        self.object_class
    }

    /// The class message values dispatch through
    pub fn message_class(&self) -> ClassId {
        self.message_class
    }

    // ------------------------------------------------------------------
    // Activities
    // ------------------------------------------------------------------

    /// Make the calling thread an activity of this runtime
    pub fn attach_activity(self: &Arc<Self>) -> Activity {
        let handle = self.activities.create_handle();
        Activity::new(Arc::clone(self), handle)
    }

    /// Run `body` on a new activity thread
    pub fn spawn_activity<F>(self: &Arc<Self>, body: F) -> RuntimeResult<ActivityHandle>
    where
        F: FnOnce(&mut Activity) + Send + 'static,
    {
        let handle = self.activities.create_handle();
        if let Err(err) = self.spawn_on(&handle, body) {
            self.activities.retire(handle.id());
            return Err(err);
        }
        Ok(handle)
    }

    pub(crate) fn spawn_on<F>(self: &Arc<Self>, handle: &ActivityHandle, body: F) -> RuntimeResult<()>
    where
        F: FnOnce(&mut Activity) + Send + 'static,
    {
        let runtime = Arc::clone(self);
        let activity_handle = handle.clone();
        let join = thread::Builder::new()
            .name(handle.name().to_string())
            .spawn(move || {
                let mut activity = Activity::new(runtime, activity_handle);
                body(&mut activity);
            })
            .map_err(|err| RuntimeError::SpawnFailed(err.to_string()))?;
        handle.set_thread(join);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Classes and objects
    // ------------------------------------------------------------------

    /// Define a class; without a superclass it subclasses `OBJECT`
    pub fn define_class(&self, name: &str, superclass: Option<ClassId>) -> RuntimeResult<ClassId> {
        let superclass = superclass.unwrap_or(self.object_class);
        self.classes.define(name, Some(superclass))
    }

    /// Define (or replace) a method on a class
    pub fn define_method(&self, class: ClassId, selector: &str, method: Method) -> RuntimeResult<MethodRef> {
        let class = self
            .classes
            .get(class)
            .ok_or_else(|| RuntimeError::UnknownClass(class.to_string()))?;
        Ok(class.define_method(Selector::new(selector), method))
    }

    /// Create an instance of `class`
    pub fn new_object(&self, class: ClassId) -> RuntimeResult<Value> {
        let unknown = || RuntimeError::UnknownClass(class.to_string());
        let class_ref = self.classes.get(class).ok_or_else(unknown)?;
        let behavior = self.classes.behavior(class).ok_or_else(unknown)?;
        Ok(Value::Object(Arc::new(Object::new(class_ref, behavior))))
    }

    /// Register the class that values of `kind` dispatch through
    pub fn set_primitive_class(&self, kind: ValueKind, class: ClassId) {
        self.primitive_classes.write().insert(kind, class);
    }

    /// Class that values of `kind` dispatch through
    pub fn primitive_class(&self, kind: ValueKind) -> Option<ClassId> {
        self.primitive_classes.read().get(&kind).copied()
    }

    /// Behavior a value dispatches through
    pub fn behavior_of(&self, value: &Value) -> Option<Arc<Behavior>> {
        match value {
            Value::Object(object) => Some(object.behavior()),
            other => {
                let class = self.primitive_class(other.kind())?;
                self.classes.behavior(class)
            }
        }
    }

    // ------------------------------------------------------------------
    // External handlers
    // ------------------------------------------------------------------

    /// Register (or replace) an external handler
    pub fn register_handler<F>(&self, name: &str, handler: F)
    where
        F: Fn(&HandlerContext<'_>, &[Value]) -> HandlerResult + Send + Sync + 'static,
    {
        self.handlers.write().register(name, handler);
    }

    /// Remove an external handler
    pub fn remove_handler(&self, name: &str) -> bool {
        self.handlers.write().remove(name)
    }

    /// Look up an external handler
    pub fn handler(&self, name: &str) -> Option<HandlerFn> {
        self.handlers.read().get(name)
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("options", &self.options)
            .field("classes", &self.classes.len())
            .field("live_activities", &self.activities.live_count())
            .finish()
    }
}
