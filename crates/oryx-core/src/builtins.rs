//! Built-in methods of the `OBJECT` and `MESSAGE` classes
//!
//! `OBJECT` methods are inherited by every class:
//!
//! | selector    | arguments          | result                      |
//! |-------------|--------------------|-----------------------------|
//! | `SEND`      | name, args...      | result of the send          |
//! | `START`     | name, args...      | a started message           |
//! | `HASMETHOD` | name               | whether the selector resolves |
//!
//! `MESSAGE` methods expose the [`Message`] API to message values.

use crate::class::ClassRef;
use crate::code::{Arity, Code, Invocation};
use crate::message::{Message, MessageRef};
use crate::method::Method;
use crate::runtime::Runtime;
use crate::scheduler::Activity;
use crate::selector::Selector;
use crate::value::Value;
use crate::{RuntimeError, RuntimeResult};

/// Install the built-in methods on a freshly created runtime
pub(crate) fn install(runtime: &Runtime) {
    if let Some(object) = runtime.classes().get(runtime.object_class()) {
        install_object_methods(&object);
    }
    if let Some(message) = runtime.classes().get(runtime.message_class()) {
        install_message_methods(&message);
    }
}

fn define<F>(class: &ClassRef, name: &str, arity: Arity, f: F)
where
    F: Fn(&mut Activity, &Invocation<'_>) -> RuntimeResult<Value> + Send + Sync + 'static,
{
    let method = Method::new(Code::native(name, arity, f)).unguarded();
    class.define_method(Selector::new(name), method);
}

fn receiver(inv: &Invocation<'_>) -> Value {
    inv.receiver.cloned().unwrap_or_default()
}

fn selector_argument(inv: &Invocation<'_>, index: usize) -> RuntimeResult<Selector> {
    match inv.argument(index)? {
        Value::Str(name) => Ok(Selector::new(name)),
        other => Err(RuntimeError::Argument(format!(
            "{}: message name must be a string, got {}",
            inv.name,
            other.describe()
        ))),
    }
}

fn install_object_methods(class: &ClassRef) {
    define(class, "SEND", Arity::at_least(1), |activity, inv| {
        let selector = selector_argument(inv, 0)?;
        crate::dispatch::send_message(activity, &receiver(inv), &selector, &inv.args[1..], None)
    });

    define(class, "START", Arity::at_least(1), |activity, inv| {
        let selector = selector_argument(inv, 0)?;
        let message = Message::new(receiver(inv), selector, inv.args[1..].to_vec());
        message.start(activity, None)?;
        Ok(Value::Message(message))
    });

    define(class, "HASMETHOD", Arity::exact(1), |activity, inv| {
        let selector = selector_argument(inv, 0)?;
        let found = activity
            .runtime()
            .behavior_of(&receiver(inv))
            .map_or(false, |behavior| behavior.has_method(&selector));
        Ok(Value::Boolean(found))
    });
}

fn message_receiver(inv: &Invocation<'_>) -> RuntimeResult<MessageRef> {
    match inv.receiver {
        Some(Value::Message(message)) => Ok(message.clone()),
        other => Err(RuntimeError::Argument(format!(
            "{}: receiver is not a message: {}",
            inv.name,
            other.map(Value::describe).unwrap_or_default()
        ))),
    }
}

fn install_message_methods(class: &ClassRef) {
    define(class, "SEND", Arity::range(0, 1), |activity, inv| {
        let message = message_receiver(inv)?;
        message.send(activity, inv.args.first().cloned())
    });

    define(class, "START", Arity::range(0, 1), |activity, inv| {
        let message = message_receiver(inv)?;
        message.start(activity, inv.args.first().cloned())?;
        Ok(Value::Nil)
    });

    define(class, "RESULT", Arity::exact(0), |activity, inv| {
        message_receiver(inv)?.result(activity)
    });

    define(class, "WAIT", Arity::exact(0), |activity, inv| {
        message_receiver(inv)?.wait(activity)?;
        Ok(Value::Nil)
    });

    define(class, "NOTIFY", Arity::exact(1), |activity, inv| {
        let message = message_receiver(inv)?;
        match inv.argument(0)? {
            Value::Message(other) => {
                message.notify(activity, other.clone());
                Ok(Value::Nil)
            }
            other => Err(RuntimeError::Argument(format!(
                "NOTIFY: argument must be a message, got {}",
                other.describe()
            ))),
        }
    });

    define(class, "COMPLETED", Arity::exact(0), |_, inv| {
        Ok(Value::Boolean(message_receiver(inv)?.is_completed()))
    });

    define(class, "HASERROR", Arity::exact(0), |_, inv| {
        Ok(Value::Boolean(message_receiver(inv)?.has_error()))
    });

    define(class, "ERRORCONDITION", Arity::exact(0), |_, inv| {
        Ok(message_receiver(inv)?
            .error_condition()
            .map(|err| Value::from(err.to_string()))
            .unwrap_or_default())
    });

    define(class, "TARGET", Arity::exact(0), |_, inv| {
        Ok(message_receiver(inv)?.target())
    });

    define(class, "MESSAGENAME", Arity::exact(0), |_, inv| {
        Ok(Value::string(message_receiver(inv)?.name().selector().as_str()))
    });

    define(class, "ARGUMENTS", Arity::exact(0), |_, inv| {
        Ok(Value::array(message_receiver(inv)?.arguments()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn echo_runtime() -> (Arc<Runtime>, Value) {
        let runtime = Runtime::new();
        let class = runtime.define_class("Echo", None).unwrap();
        runtime
            .define_method(class, "echo", Method::new(Code::native("ECHO", Arity::any(), |_, inv| {
                Ok(Value::array(inv.args.to_vec()))
            })))
            .unwrap();
        let object = runtime.new_object(class).unwrap();
        (runtime, object)
    }

    #[test]
    fn test_object_send() {
        let (runtime, object) = echo_runtime();
        let mut activity = runtime.attach_activity();
        let result = activity
            .send(&object, "send", &[Value::from("echo"), Value::Integer(1)])
            .unwrap();
        assert_eq!(result, Value::array(vec![Value::Integer(1)]));

        let err = activity.send(&object, "send", &[Value::Integer(1)]).unwrap_err();
        assert!(matches!(err, RuntimeError::Argument(_)));
    }

    #[test]
    fn test_object_hasmethod() {
        let (runtime, object) = echo_runtime();
        let mut activity = runtime.attach_activity();
        assert_eq!(
            activity.send(&object, "hasmethod", &[Value::from("ECHO")]).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            activity.send(&object, "hasmethod", &[Value::from("missing")]).unwrap(),
            Value::Boolean(false)
        );
    }

    #[test]
    fn test_object_start_returns_message() {
        let (runtime, object) = echo_runtime();
        let mut activity = runtime.attach_activity();
        let message = activity
            .send(&object, "start", &[Value::from("echo"), Value::from("x")])
            .unwrap();
        assert!(message.as_message().is_some());

        let result = activity.send(&message, "result", &[]).unwrap();
        assert_eq!(result, Value::array(vec![Value::from("x")]));
        assert_eq!(activity.send(&message, "completed", &[]).unwrap(), Value::Boolean(true));
        assert_eq!(activity.send(&message, "haserror", &[]).unwrap(), Value::Boolean(false));
        assert!(activity.send(&message, "errorcondition", &[]).unwrap().is_nil());
    }

    #[test]
    fn test_message_accessors() {
        let (runtime, object) = echo_runtime();
        let mut activity = runtime.attach_activity();
        let message = Value::Message(Message::new(object.clone(), "echo", vec![Value::Integer(5)]));

        assert_eq!(activity.send(&message, "target", &[]).unwrap(), object);
        assert_eq!(activity.send(&message, "messagename", &[]).unwrap(), Value::from("ECHO"));
        assert_eq!(
            activity.send(&message, "arguments", &[]).unwrap(),
            Value::array(vec![Value::Integer(5)])
        );
        assert_eq!(
            activity.send(&message, "send", &[]).unwrap(),
            Value::array(vec![Value::Integer(5)])
        );
        assert!(activity.send(&message, "wait", &[]).unwrap().is_nil());
    }

    #[test]
    fn test_message_notify_requires_message() {
        let (runtime, object) = echo_runtime();
        let mut activity = runtime.attach_activity();
        let message = Value::Message(Message::new(object, "echo", vec![]));
        let err = activity
            .send(&message, "notify", &[Value::Integer(1)])
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Argument(_)));
    }
}
