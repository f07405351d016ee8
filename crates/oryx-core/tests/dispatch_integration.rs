//! Integration tests for method resolution and dispatch
//!
//! Tests validate:
//! - End-to-end sends through interpreted and native code
//! - Resolution order (instance methods, nearest scope, super lookup)
//! - Private/protected visibility and UNKNOWN forwarding
//! - Object variables and guarded methods
//!
//! # Running Tests
//! ```bash
//! cargo test --test dispatch_integration
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use oryx_core::{
    Arity, ClassId, Code, Message, Method, MethodRef, Runtime, RuntimeError, SecurityManager,
    Selector, SendRequest, Value,
};

fn native<F>(name: &str, arity: Arity, f: F) -> Method
where
    F: Fn(&mut oryx_core::Activity, &oryx_core::Invocation<'_>) -> Result<Value, RuntimeError>
        + Send
        + Sync
        + 'static,
{
    Method::new(Code::native(name, arity, f))
}

fn tag(text: &'static str) -> Method {
    native(text, Arity::any(), move |_, _| Ok(Value::string(text)))
}

// ===== End-to-end =====

#[test]
fn test_greet_end_to_end() {
    let runtime = Runtime::new();
    let class = runtime.define_class("Greeter", None).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    runtime
        .define_method(
            class,
            "GREET",
            Method::new(Code::interpreted_fn("GREET", move |_, inv| {
                counter.fetch_add(1, Ordering::SeqCst);
                let name = inv.argument(0)?.as_str().unwrap_or_default().to_string();
                Ok(Some(Value::from(format!("hello {}", name))))
            })),
        )
        .unwrap();
    let obj = runtime.new_object(class).unwrap();
    let mut activity = runtime.attach_activity();

    let m = Message::new(obj, "GREET", vec![Value::from("world")]);
    m.send(&mut activity, None).unwrap();
    assert_eq!(m.result(&activity).unwrap(), Value::from("hello world"));
    assert_eq!(m.result(&activity).unwrap(), Value::from("hello world"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ===== Resolution order =====

#[test]
fn test_instance_then_nearest_scope() {
    let runtime = Runtime::new();
    let a = runtime.define_class("A", None).unwrap();
    let b = runtime.define_class("B", Some(a)).unwrap();
    let c = runtime.define_class("C", Some(b)).unwrap();
    runtime.define_method(a, "who", tag("A")).unwrap();
    runtime.define_method(b, "who", tag("B")).unwrap();
    runtime.define_method(a, "base", tag("A-BASE")).unwrap();

    let obj = runtime.new_object(c).unwrap();
    let sibling = runtime.new_object(c).unwrap();
    let mut activity = runtime.attach_activity();

    assert_eq!(activity.send(&obj, "who", &[]).unwrap(), Value::from("B"));
    assert_eq!(activity.send(&obj, "base", &[]).unwrap(), Value::from("A-BASE"));

    let instance: MethodRef = Arc::new(tag("INSTANCE"));
    obj.as_object()
        .unwrap()
        .define_instance_method(Selector::new("who"), &instance);
    assert_eq!(activity.send(&obj, "who", &[]).unwrap(), Value::from("INSTANCE"));
    assert_eq!(activity.send(&sibling, "who", &[]).unwrap(), Value::from("B"));

    // super lookup from C skips instance methods and C itself
    assert_eq!(activity.send_super(&obj, "who", &[], c).unwrap(), Value::from("B"));
    assert_eq!(activity.send_super(&obj, "who", &[], b).unwrap(), Value::from("A"));
}

#[test]
fn test_method_defined_after_object_creation_is_visible() {
    let runtime = Runtime::new();
    let class = runtime.define_class("Late", None).unwrap();
    let obj = runtime.new_object(class).unwrap();
    let mut activity = runtime.attach_activity();

    assert!(activity.send(&obj, "late", &[]).is_err());
    runtime.define_method(class, "late", tag("LATE")).unwrap();
    assert_eq!(activity.send(&obj, "late", &[]).unwrap(), Value::from("LATE"));
}

#[test]
fn test_shared_method_rebound_to_second_class() {
    let runtime = Runtime::new();
    let first = runtime.define_class("First", None).unwrap();
    let second = runtime.define_class("Second", None).unwrap();

    let method = runtime.define_method(first, "shared", tag("SHARED")).unwrap();
    let class = runtime.classes().get(second).unwrap();
    let rebound = class.install_method(Selector::new("shared"), &method);

    assert_eq!(method.scope(), Some(first));
    assert_eq!(rebound.scope(), Some(second));
    assert!(Arc::ptr_eq(method.code(), rebound.code()));
}

// ===== Visibility =====

struct DenyAll;

impl SecurityManager for DenyAll {
    fn check_send(&self, request: &SendRequest<'_>) -> Option<Value> {
        Some(Value::from(format!("denied {}", request.selector)))
    }
}

#[test]
fn test_protected_with_default_security_manager() {
    let options = oryx_core::RuntimeOptions::default().with_security_manager(Arc::new(DenyAll));
    let runtime = Runtime::with_options(options);
    let class = runtime.define_class("Safe", None).unwrap();
    runtime.define_method(class, "open", tag("OPEN").protected()).unwrap();
    runtime.define_method(class, "look", tag("LOOK")).unwrap();
    let safe = runtime.new_object(class).unwrap();
    let mut activity = runtime.attach_activity();

    assert_eq!(activity.send(&safe, "open", &[]).unwrap(), Value::from("denied OPEN"));
    assert_eq!(activity.send(&safe, "look", &[]).unwrap(), Value::from("LOOK"));

    activity.set_security_manager(None);
    assert_eq!(activity.send(&safe, "open", &[]).unwrap(), Value::from("OPEN"));
}

#[test]
fn test_unknown_forwarding_proxy() {
    let runtime = Runtime::new();
    let target_class = runtime.define_class("Target", None).unwrap();
    runtime
        .define_method(target_class, "double", native("DOUBLE", Arity::exact(1), |_, inv| {
            Ok(Value::Integer(inv.argument(0)?.as_integer().unwrap_or(0) * 2))
        }))
        .unwrap();
    let target = runtime.new_object(target_class).unwrap();

    let proxy_class = runtime.define_class("Proxy", None).unwrap();
    let forward_to = target.clone();
    runtime
        .define_method(proxy_class, "unknown", native("UNKNOWN", Arity::exact(2), move |activity, inv| {
            let name = inv.argument(0)?.as_str().unwrap_or_default().to_string();
            let args = inv.argument(1)?.as_array().map(<[Value]>::to_vec).unwrap_or_default();
            activity.send(&forward_to, &name, &args)
        }))
        .unwrap();
    let proxy = runtime.new_object(proxy_class).unwrap();
    let mut activity = runtime.attach_activity();

    assert_eq!(activity.send(&proxy, "double", &[Value::Integer(21)]).unwrap(), Value::Integer(42));
    let err = activity.send(&proxy, "triple", &[Value::Integer(1)]).unwrap_err();
    assert!(matches!(err, RuntimeError::NoMethod { ref selector, .. } if selector.as_str() == "TRIPLE"));
}

// ===== Object variables =====

#[test]
fn test_counter_with_object_variables() {
    let runtime = Runtime::new();
    let class = runtime.define_class("Counter", None).unwrap();
    runtime
        .define_method(class, "increment", Method::new(Code::interpreted_fn("INCREMENT", |activity, inv| {
            let scope = activity.current_frame().scope().unwrap_or(ClassId::from_index(0));
            let object = inv.receiver.and_then(Value::as_object).cloned();
            let object = object.ok_or_else(|| RuntimeError::Argument("no receiver".into()))?;
            let next = object
                .get_variable(scope, "count")
                .and_then(|v| v.as_integer())
                .unwrap_or(0)
                + 1;
            object.set_variable(scope, "count", Value::Integer(next));
            Ok(Some(Value::Integer(next)))
        })))
        .unwrap();
    let counter = runtime.new_object(class).unwrap();
    let mut activity = runtime.attach_activity();

    for expected in 1..=3 {
        assert_eq!(activity.send(&counter, "increment", &[]).unwrap(), Value::Integer(expected));
    }
    assert_eq!(
        counter.as_object().unwrap().get_variable(class, "COUNT"),
        Some(Value::Integer(3))
    );
}

#[test]
fn test_guarded_counter_across_activities() {
    let runtime = Runtime::new();
    let class = runtime.define_class("Counter", None).unwrap();
    runtime
        .define_method(class, "increment", native("INCREMENT", Arity::exact(0), move |activity, inv| {
            let scope = activity.current_frame().scope().unwrap_or(ClassId::from_index(0));
            let object = inv.receiver.and_then(Value::as_object).cloned();
            let object = object.ok_or_else(|| RuntimeError::Argument("no receiver".into()))?;
            let current = object.get_variable(scope, "count").and_then(|v| v.as_integer()).unwrap_or(0);
            std::thread::yield_now();
            object.set_variable(scope, "count", Value::Integer(current + 1));
            Ok(Value::Nil)
        }))
        .unwrap();
    let counter = runtime.new_object(class).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let target = counter.clone();
            runtime
                .spawn_activity(move |activity| {
                    for _ in 0..50 {
                        activity.send(&target, "increment", &[]).unwrap();
                    }
                })
                .unwrap()
        })
        .collect();
    for handle in handles {
        assert!(handle.join());
    }

    assert_eq!(
        counter.as_object().unwrap().get_variable(class, "count"),
        Some(Value::Integer(200))
    );
}
