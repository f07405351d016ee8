//! Message dispatch
//!
//! [`send_message`] resolves `(receiver, selector)` to a method and runs it:
//!
//! 1. ordinary lookup, or lookup after an explicit starting scope
//! 2. a private method only resolves when the sender is the receiver itself
//! 3. a protected method consults the caller's security manager, which may
//!    substitute the result
//! 4. an unresolved selector is redirected to `UNKNOWN` with the arguments
//!    `(selector-name, array-of-args)`; without `UNKNOWN` the send fails
//!
//! The resolved selector and method are recorded on the calling frame.

use tracing::trace;

use crate::class::ScopeId;
use crate::method::MethodRef;
use crate::scheduler::Activity;
use crate::security::SendRequest;
use crate::selector::Selector;
use crate::value::Value;
use crate::{RuntimeError, RuntimeResult};

/// Send `selector` with `args` to `receiver` on `activity`
pub fn send_message(
    activity: &mut Activity,
    receiver: &Value,
    selector: &Selector,
    args: &[Value],
    start_scope: Option<ScopeId>,
) -> RuntimeResult<Value> {
    let behavior = match activity.runtime().behavior_of(receiver) {
        Some(behavior) => behavior,
        None => return Err(no_method(receiver, selector)),
    };

    let resolved = match start_scope {
        Some(scope) => behavior.super_lookup(selector, scope),
        None => behavior.lookup(selector),
    };
    let resolved = resolved.filter(|method| visible(activity, receiver, method));

    if let Some(method) = resolved {
        activity
            .current_frame_mut()
            .record_dispatch(selector.clone(), method.clone());

        if method.flags().is_protected() {
            if let Some(security) = activity.security_manager().cloned() {
                let request = SendRequest {
                    selector,
                    receiver,
                    args,
                };
                if let Some(substitute) = security.check_send(&request) {
                    trace!(selector = %selector, "security manager substituted result");
                    return Ok(substitute);
                }
            }
        }

        trace!(selector = %selector, receiver = ?receiver.kind(), "dispatch");
        return method.run(activity, receiver, selector, args);
    }

    let unknown = Selector::unknown();
    match behavior.lookup(&unknown) {
        Some(method) => {
            activity
                .current_frame_mut()
                .record_dispatch(selector.clone(), method.clone());
            trace!(selector = %selector, "dispatch to UNKNOWN");
            let unknown_args = [
                Value::string(selector.as_str()),
                Value::array(args.to_vec()),
            ];
            method.run(activity, receiver, &unknown, &unknown_args)
        }
        None => Err(no_method(receiver, selector)),
    }
}

/// Private methods are only visible to sends from the receiver itself
fn visible(activity: &Activity, receiver: &Value, method: &MethodRef) -> bool {
    if !method.flags().is_private() {
        return true;
    }
    activity
        .current_receiver()
        .map_or(false, |sender| sender.is_identical(receiver))
}

fn no_method(receiver: &Value, selector: &Selector) -> RuntimeError {
    RuntimeError::NoMethod {
        selector: selector.clone(),
        receiver: receiver.describe(),
    }
}
