//! Value representation
//!
//! Values are cheap to clone: strings and arrays are shared slices, objects
//! and messages are reference counted. Equality on objects and messages is
//! identity.

use std::fmt;
use std::sync::Arc;

use crate::message::MessageRef;
use crate::object::ObjectRef;

/// Kind tag of a value, used to find the class primitive values dispatch through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// `Nil`
    Nil,
    /// `Boolean`
    Boolean,
    /// `Integer`
    Integer,
    /// `Str`
    String,
    /// `Array`
    Array,
    /// `Object`
    Object,
    /// `Message`
    Message,
}

/// A runtime value
#[derive(Clone, Default)]
pub enum Value {
    /// The nil object
    #[default]
    Nil,
    /// Boolean
    Boolean(bool),
    /// 64-bit integer
    Integer(i64),
    /// Immutable string
    Str(Arc<str>),
    /// Immutable array
    Array(Arc<[Value]>),
    /// Heap object
    Object(ObjectRef),
    /// Asynchronous message object
    Message(MessageRef),
}

impl Value {
    /// Create a string value
    pub fn string(text: &str) -> Self {
        Value::Str(Arc::from(text))
    }

    /// Create an array value
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Arc::from(items))
    }

    /// Kind tag
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Nil => ValueKind::Nil,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Integer(_) => ValueKind::Integer,
            Value::Str(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
            Value::Message(_) => ValueKind::Message,
        }
    }

    /// Check if value is nil
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Integer payload
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Boolean payload
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// String payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Array payload
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Object payload
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Message payload
    pub fn as_message(&self) -> Option<&MessageRef> {
        match self {
            Value::Message(message) => Some(message),
            _ => None,
        }
    }

    /// Pointer identity for heap values, equality otherwise.
    ///
    /// This is the test used for private method visibility.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Message(a), Value::Message(b)) => Arc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Str(a), Value::Str(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => self == other,
        }
    }

    /// Short description used in error messages
    pub fn describe(&self) -> String {
        match self {
            Value::Nil => "NIL".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Str(s) => format!("{:?}", s),
            Value::Array(items) => format!("an Array({})", items.len()),
            Value::Object(object) => format!("a {}", object.class().name()),
            Value::Message(message) => format!("a Message({})", message.name()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Message(a), Value::Message(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Boolean(b) => write!(f, "Boolean({})", b),
            Value::Integer(i) => write!(f, "Integer({})", i),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::Array(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Object(object) => write!(f, "Object({}, {})", object.id(), object.class().name()),
            Value::Message(message) => write!(f, "Message({}, {})", message.id(), message.name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Value::Object(object)
    }
}

impl From<MessageRef> for Value {
    fn from(message: MessageRef) -> Self {
        Value::Message(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_kinds() {
        assert_eq!(Value::Nil.kind(), ValueKind::Nil);
        assert_eq!(Value::from(true).kind(), ValueKind::Boolean);
        assert_eq!(Value::from(42).kind(), ValueKind::Integer);
        assert_eq!(Value::from("hi").kind(), ValueKind::String);
        assert_eq!(Value::array(vec![]).kind(), ValueKind::Array);
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::from(7).as_integer(), Some(7));
        assert_eq!(Value::from("abc").as_str(), Some("abc"));
        assert_eq!(Value::from(false).as_bool(), Some(false));
        assert!(Value::Nil.is_nil());
        assert_eq!(Value::Nil.as_integer(), None);
    }

    #[test]
    fn test_array_equality_vs_identity() {
        let a = Value::array(vec![Value::from(1), Value::from(2)]);
        let b = Value::array(vec![Value::from(1), Value::from(2)]);
        assert_eq!(a, b);
        assert!(!a.is_identical(&b));
        assert!(a.is_identical(&a.clone()));
    }
}
