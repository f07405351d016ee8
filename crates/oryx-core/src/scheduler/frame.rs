//! Activation records

use std::fmt;
use std::sync::Arc;

use crate::class::ScopeId;
use crate::code::{CallContext, CallType};
use crate::message::MessageRef;
use crate::method::MethodRef;
use crate::security::SecurityManagerRef;
use crate::selector::Selector;
use crate::value::Value;

/// The selector and method most recently dispatched from a frame
#[derive(Debug, Clone)]
pub struct DispatchRecord {
    selector: Selector,
    method: MethodRef,
}

impl DispatchRecord {
    /// Selector that was sent (the original one, also for UNKNOWN fallback)
    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Method that ran
    pub fn method(&self) -> &MethodRef {
        &self.method
    }
}

/// One activation on an activity's frame stack
pub struct Frame {
    receiver: Option<Value>,
    selector: Option<Selector>,
    method: Option<MethodRef>,
    call_type: CallType,
    environment: Option<Arc<str>>,
    context: Option<CallContext>,
    security: Option<SecurityManagerRef>,
    last_dispatch: Option<DispatchRecord>,
    error_notify: Option<MessageRef>,
}

impl Frame {
    fn empty(call_type: CallType, security: Option<SecurityManagerRef>) -> Self {
        Self {
            receiver: None,
            selector: None,
            method: None,
            call_type,
            environment: None,
            context: None,
            security,
            last_dispatch: None,
            error_notify: None,
        }
    }

    /// Bottom frame of an activity
    pub fn root(security: Option<SecurityManagerRef>) -> Self {
        Self::empty(CallType::Program, security)
    }

    /// Activation of a dispatched method
    pub fn for_method(
        receiver: Value,
        selector: Selector,
        method: MethodRef,
        security: Option<SecurityManagerRef>,
    ) -> Self {
        Self {
            receiver: Some(receiver),
            selector: Some(selector),
            method: Some(method),
            ..Self::empty(CallType::Method, security)
        }
    }

    /// Activation of a routine call
    pub fn for_routine(
        name: Selector,
        call_type: CallType,
        environment: Option<&str>,
        context: &CallContext,
        security: Option<SecurityManagerRef>,
    ) -> Self {
        Self {
            selector: Some(name),
            environment: environment.map(Arc::from),
            context: Some(context.clone()),
            ..Self::empty(call_type, security)
        }
    }

    /// Receiver of the activation (none for routines and the root frame)
    pub fn receiver(&self) -> Option<&Value> {
        self.receiver.as_ref()
    }

    /// Selector or routine name
    pub fn selector(&self) -> Option<&Selector> {
        self.selector.as_ref()
    }

    /// Method being run
    pub fn method(&self) -> Option<&MethodRef> {
        self.method.as_ref()
    }

    /// Scope of the running method
    pub fn scope(&self) -> Option<ScopeId> {
        self.method.as_ref().and_then(|method| method.scope())
    }

    /// How this activation was invoked
    pub fn call_type(&self) -> CallType {
        self.call_type
    }

    /// Environment name supplied by the caller
    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    /// Caller context of a routine call
    pub fn context(&self) -> Option<&CallContext> {
        self.context.as_ref()
    }

    /// Security manager active for this activation
    pub fn security_manager(&self) -> Option<&SecurityManagerRef> {
        self.security.as_ref()
    }

    /// Install or clear the security manager for this activation and the
    /// activations it creates
    pub fn set_security_manager(&mut self, security: Option<SecurityManagerRef>) {
        self.security = security;
    }

    /// Last dispatch performed from this activation
    pub fn last_dispatch(&self) -> Option<&DispatchRecord> {
        self.last_dispatch.as_ref()
    }

    pub(crate) fn record_dispatch(&mut self, selector: Selector, method: MethodRef) {
        self.last_dispatch = Some(DispatchRecord { selector, method });
    }

    /// Message whose send is being delivered from this activation
    pub fn error_notify(&self) -> Option<&MessageRef> {
        self.error_notify.as_ref()
    }

    pub(crate) fn set_error_notify(&mut self, message: MessageRef) {
        self.error_notify = Some(message);
    }

    /// Clear the hook if it points at `message`
    pub(crate) fn clear_error_notify(&mut self, message: &MessageRef) -> bool {
        match &self.error_notify {
            Some(current) if Arc::ptr_eq(current, message) => {
                self.error_notify = None;
                true
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("receiver", &self.receiver)
            .field("selector", &self.selector)
            .field("call_type", &self.call_type)
            .field("environment", &self.environment)
            .field("last_dispatch", &self.last_dispatch.as_ref().map(|d| &d.selector))
            .finish()
    }
}
