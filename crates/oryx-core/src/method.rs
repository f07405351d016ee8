//! Method binding
//!
//! A [`Method`] pairs shared [`Code`] with the scope it was defined in and its
//! visibility flags. The scope is assigned at most once: the first binding
//! happens in place, binding to a different scope afterwards produces a
//! shallow copy that shares the same code.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::trace;

use crate::class::ScopeId;
use crate::code::Code;
use crate::scheduler::{Activity, Frame};
use crate::selector::Selector;
use crate::value::Value;
use crate::RuntimeResult;

/// Visibility and locking flags of a method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct MethodFlags(pub u8);

impl MethodFlags {
    /// Public, unprotected, guarded
    pub const NONE: Self = Self(0);

    /// Only callable when the sender is the receiver itself
    pub const PRIVATE: Self = Self(1 << 0);

    /// Subject to the active security manager
    pub const PROTECTED: Self = Self(1 << 1);

    /// Runs without reserving the receiver's variable pool
    pub const UNGUARDED: Self = Self(1 << 2);

    /// Whether every bit of `flag` is set
    #[inline(always)]
    pub const fn contains(self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }

    /// Flags with `flag` added
    #[inline(always)]
    pub const fn with(self, flag: Self) -> Self {
        Self(self.0 | flag.0)
    }

    /// Flags with `flag` removed
    #[inline(always)]
    pub const fn without(self, flag: Self) -> Self {
        Self(self.0 & !flag.0)
    }

    /// Private method
    pub const fn is_private(self) -> bool {
        self.contains(Self::PRIVATE)
    }

    /// Protected method
    pub const fn is_protected(self) -> bool {
        self.contains(Self::PROTECTED)
    }

    /// Guarded method (the default)
    pub const fn is_guarded(self) -> bool {
        !self.contains(Self::UNGUARDED)
    }
}

/// Shared method handle
pub type MethodRef = Arc<Method>;

/// Code bound to a defining scope
pub struct Method {
    code: Arc<Code>,
    scope: OnceCell<ScopeId>,
    flags: MethodFlags,
}

impl Method {
    /// Unscoped, public, guarded method
    pub fn new(code: Code) -> Self {
        Self::from_shared(Arc::new(code))
    }

    /// Method over code that is already shared elsewhere
    pub fn from_shared(code: Arc<Code>) -> Self {
        Self {
            code,
            scope: OnceCell::new(),
            flags: MethodFlags::NONE,
        }
    }

    /// Replace the flags
    pub fn with_flags(mut self, flags: MethodFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Mark private
    pub fn private(self) -> Self {
        let flags = self.flags.with(MethodFlags::PRIVATE);
        self.with_flags(flags)
    }

    /// Mark protected
    pub fn protected(self) -> Self {
        let flags = self.flags.with(MethodFlags::PROTECTED);
        self.with_flags(flags)
    }

    /// Mark unguarded
    pub fn unguarded(self) -> Self {
        let flags = self.flags.with(MethodFlags::UNGUARDED);
        self.with_flags(flags)
    }

    /// Executable body
    pub fn code(&self) -> &Arc<Code> {
        &self.code
    }

    /// Defining scope, once bound
    pub fn scope(&self) -> Option<ScopeId> {
        self.scope.get().copied()
    }

    /// Flags
    pub fn flags(&self) -> MethodFlags {
        self.flags
    }

    /// Bind to `scope`.
    ///
    /// An unscoped method is bound in place and returned as is; a method
    /// already bound to `scope` is returned as is; otherwise a copy sharing
    /// the same code is bound to `scope`.
    pub fn bind_scope(self: &Arc<Self>, scope: ScopeId) -> MethodRef {
        let current = *self.scope.get_or_init(|| scope);
        if current == scope {
            return Arc::clone(self);
        }
        Arc::new(Method {
            code: Arc::clone(&self.code),
            scope: OnceCell::with_value(scope),
            flags: self.flags,
        })
    }

    /// Invoke on `receiver`.
    ///
    /// Pushes an activation for the call, reserves the receiver's variable
    /// pool for guarded methods whose code touches object variables, runs the
    /// code and pops the activation again.
    pub fn run(
        self: &Arc<Self>,
        activity: &mut Activity,
        receiver: &Value,
        selector: &Selector,
        args: &[Value],
    ) -> RuntimeResult<Value> {
        activity.check_stack_depth()?;

        let guard = match receiver {
            Value::Object(object)
                if self.flags.is_guarded() && self.code.uses_object_variables() =>
            {
                let scope = self.scope().unwrap_or_else(|| object.class().id());
                Some(object.reserve(activity, scope)?)
            }
            _ => None,
        };

        trace!(selector = %selector, depth = activity.depth(), "invoking method");
        let frame = Frame::for_method(
            receiver.clone(),
            selector.clone(),
            Arc::clone(self),
            activity.security_manager().cloned(),
        );
        activity.push_frame(frame);
        let outcome = self.code.run(activity, receiver, selector, args);
        activity.pop_frame();
        drop(guard);
        outcome
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("code", &self.code.name())
            .field("scope", &self.scope())
            .field("flags", &self.flags)
            .finish()
    }
}
