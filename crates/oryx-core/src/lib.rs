//! Oryx Runtime Core
//!
//! This crate provides the message-passing core of the Oryx object runtime:
//! - Code capability (interpreted bodies, native trampolines, registered handlers)
//! - Method binding with copy-on-write scope rebinding
//! - Behaviors with scope-chained method resolution
//! - The `send_message` dispatch engine (private, protected and UNKNOWN handling)
//! - Asynchronous message objects with deadlock-aware result retrieval
//! - Activities (OS threads) with park/release and a wait-for graph

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod behavior;
pub mod builtins;
pub mod class;
pub mod code;
pub mod defaults;
pub mod dispatch;
pub mod gc;
pub mod handler;
pub mod message;
pub mod method;
pub mod object;
pub mod runtime;
pub mod scheduler;
pub mod security;
pub mod selector;
pub mod value;

use std::fmt;
use std::sync::Arc;

pub use behavior::Behavior;
pub use class::{Class, ClassId, ClassRef, ClassRegistry, ScopeId};
pub use code::{Arity, CallContext, CallType, Code, InterpretedBody, Invocation};
pub use dispatch::send_message;
pub use gc::{flatten, FlatGraph, FlatNode, GcTraceable, LiveSet, Tracer};
pub use handler::{HandlerContext, HandlerRegistry, HandlerResult};
pub use message::{Message, MessageFlags, MessageId, MessageRef};
pub use method::{Method, MethodFlags, MethodRef};
pub use object::{Object, ObjectId, ObjectRef, ScopeGuard};
pub use runtime::{Runtime, RuntimeOptions};
pub use scheduler::{
    Activity, ActivityHandle, ActivityId, ActivityManager, ActivityState, ActivityStats,
    DispatchRecord, Frame,
};
pub use security::{SecurityManager, SendRequest};
pub use selector::{MessageName, Selector};
pub use value::{Value, ValueKind};

/// An application-level condition raised by running code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    name: Arc<str>,
    description: Arc<str>,
}

impl Condition {
    /// Create a condition with a name (e.g. `SYNTAX`) and a description
    pub fn new(name: &str, description: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.to_ascii_uppercase()),
            description: Arc::from(description.into()),
        }
    }

    /// Condition name, upper-cased
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human readable description
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.description.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}: {}", self.name, self.description)
        }
    }
}

/// Why a message refused to be sent or started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReuseReason {
    /// The message was already sent or has completed
    AlreadySent,
    /// The message was already started
    AlreadyStarted,
    /// A start is pending and the caller is not the activity it was handed to
    StartPending,
}

impl fmt::Display for ReuseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ReuseReason::AlreadySent => "already sent",
            ReuseReason::AlreadyStarted => "already started",
            ReuseReason::StartPending => "start pending on another activity",
        };
        f.write_str(text)
    }
}

/// Runtime errors
///
/// Errors are `Clone` so that a condition stored on a message can be raised
/// again on every activity that asks for its result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    /// A message object was sent or started more than once
    #[error("Message {message} cannot be reused: {reason}")]
    MessageReuse {
        /// Offending message
        message: MessageId,
        /// What made the request invalid
        reason: ReuseReason,
    },

    /// An explicit starting scope is not part of the receiver's scope chain
    #[error("Scope {scope} is not in the scope chain of {receiver}")]
    InvalidScope {
        /// Requested starting scope
        scope: ScopeId,
        /// Description of the receiver
        receiver: String,
    },

    /// Neither the selector nor UNKNOWN resolved
    #[error("{receiver} does not understand message {selector}")]
    NoMethod {
        /// Selector that failed to resolve
        selector: Selector,
        /// Description of the receiver
        receiver: String,
    },

    /// Application condition raised by running code
    #[error("Condition raised: {0}")]
    Condition(Condition),

    /// Waiting would close a cycle in the wait-for graph
    #[error("Deadlock detected: activity {waiter} would wait on activity {producer}")]
    Deadlock {
        /// Activity that asked to wait
        waiter: ActivityId,
        /// Activity it would have waited on
        producer: ActivityId,
    },

    /// Call depth exceeded the configured limit
    #[error("Stack overflow: call depth exceeds {0}")]
    StackOverflow(usize),

    /// Wrong argument count or argument type
    #[error("Argument error: {0}")]
    Argument(String),

    /// A class id or class name is not registered
    #[error("Unknown class: {0}")]
    UnknownClass(String),

    /// A registered external handler could not be resolved
    #[error("Unknown external handler: {0}")]
    UnknownHandler(String),

    /// A routine invoked as a function returned no value
    #[error("Routine {0} did not return a result")]
    NoResult(String),

    /// The OS refused to start an activity thread
    #[error("Failed to spawn activity: {0}")]
    SpawnFailed(String),
}

impl RuntimeError {
    /// Shorthand for raising an application condition
    pub fn condition(name: &str, description: impl Into<String>) -> Self {
        RuntimeError::Condition(Condition::new(name, description))
    }

    /// Whether this is a deadlock error
    pub fn is_deadlock(&self) -> bool {
        matches!(self, RuntimeError::Deadlock { .. })
    }
}

/// Runtime result
pub type RuntimeResult<T> = Result<T, RuntimeError>;
