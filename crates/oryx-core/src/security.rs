//! Security manager hook for protected methods

use std::sync::Arc;

use crate::selector::Selector;
use crate::value::Value;

/// The send a security manager is asked to approve
#[derive(Debug, Clone, Copy)]
pub struct SendRequest<'a> {
    /// Selector being sent
    pub selector: &'a Selector,
    /// Receiver of the send
    pub receiver: &'a Value,
    /// Arguments of the send
    pub args: &'a [Value],
}

/// Consulted before a protected method runs.
///
/// Returning `Some(value)` substitutes `value` for the method's result and
/// the method is not invoked; `None` lets the call proceed.
pub trait SecurityManager: Send + Sync {
    /// Approve or short-circuit a protected send
    fn check_send(&self, request: &SendRequest<'_>) -> Option<Value>;
}

impl<F> SecurityManager for F
where
    F: Fn(&SendRequest<'_>) -> Option<Value> + Send + Sync,
{
    fn check_send(&self, request: &SendRequest<'_>) -> Option<Value> {
        self(request)
    }
}

/// Shared security manager handle
pub type SecurityManagerRef = Arc<dyn SecurityManager>;
