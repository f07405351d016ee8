//! External handler registry
//!
//! Registered code names a handler that lives outside the runtime (an
//! embedding application, a native library). Handlers are looked up by name
//! in the runtime's [`HandlerRegistry`] the first time the code runs.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::code::CallType;
use crate::scheduler::ActivityId;
use crate::value::Value;

// ============================================================================
// HandlerResult
// ============================================================================

/// Result of an external handler call
#[derive(Debug, Clone)]
pub enum HandlerResult {
    /// Call handled, returned a value
    Value(Value),
    /// Call handled, no value returned
    NoValue,
    /// Handler does not recognize the call
    Unhandled,
    /// Call failed; the text becomes the condition description
    Error(String),
}

impl HandlerResult {
    /// Successful call returning nil
    #[inline]
    pub fn nil() -> Self {
        Self::Value(Value::Nil)
    }

    /// Successful call returning an integer
    #[inline]
    pub fn integer(val: i64) -> Self {
        Self::Value(Value::Integer(val))
    }

    /// Successful call returning a string
    #[inline]
    pub fn string(val: &str) -> Self {
        Self::Value(Value::string(val))
    }
}

// ============================================================================
// HandlerContext
// ============================================================================

/// What an external handler can see of its invocation
pub struct HandlerContext<'a> {
    /// Calling activity
    pub activity: ActivityId,
    /// Receiver when invoked as a method
    pub receiver: Option<&'a Value>,
    /// Selector or routine name used for the call
    pub name: &'a str,
    /// How the handler was invoked
    pub call_type: CallType,
    /// Environment name given by the caller, if any
    pub environment: Option<&'a str>,
}

/// External handler function
pub type HandlerFn = Arc<dyn Fn(&HandlerContext<'_>, &[Value]) -> HandlerResult + Send + Sync>;

// ============================================================================
// HandlerRegistry
// ============================================================================

/// Name → handler map; names are case-insensitive
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: FxHashMap<Arc<str>, HandlerFn>,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a handler
    pub fn register<F>(&mut self, name: &str, handler: F)
    where
        F: Fn(&HandlerContext<'_>, &[Value]) -> HandlerResult + Send + Sync + 'static,
    {
        self.handlers
            .insert(Arc::from(name.to_ascii_uppercase()), Arc::new(handler));
    }

    /// Look up a handler by name
    pub fn get(&self, name: &str) -> Option<HandlerFn> {
        self.handlers.get(name.to_ascii_uppercase().as_str()).cloned()
    }

    /// Remove a handler. Code that already resolved it keeps its copy.
    pub fn remove(&mut self, name: &str) -> bool {
        self.handlers
            .remove(name.to_ascii_uppercase().as_str())
            .is_some()
    }

    /// Whether a handler is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name.to_ascii_uppercase().as_str())
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.handlers.keys().map(|name| &**name).collect();
        names.sort_unstable();
        f.debug_struct("HandlerRegistry").field("handlers", &names).finish()
    }
}
