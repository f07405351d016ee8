//! Integration tests for the tracing contract
//!
//! Tests validate:
//! - Reachability through variables, instance methods and messages
//! - Flattening a completed message together with its result graph
//!
//! # Running Tests
//! ```bash
//! cargo test --test gc_integration
//! ```

use std::sync::Arc;

use oryx_core::{
    flatten, Arity, Code, FlatNode, LiveSet, Message, Method, MethodRef, Runtime, Selector, Value,
};

#[test]
fn test_live_set_follows_completed_results() {
    let runtime = Runtime::new();
    let class = runtime.define_class("Factory", None).unwrap();
    let product_class = runtime.define_class("Product", None).unwrap();
    runtime
        .define_method(
            class,
            "make",
            Method::new(Code::native("MAKE", Arity::any(), move |activity, _| {
                activity.runtime().new_object(product_class)
            })),
        )
        .unwrap();
    let factory = runtime.new_object(class).unwrap();
    let mut activity = runtime.attach_activity();

    let m = Message::new(factory.clone(), "make", vec![]);
    let product = m.send(&mut activity, None).unwrap();

    let live = LiveSet::mark_roots([&Value::Message(m.clone())]);
    assert!(live.contains(&factory));
    assert!(live.contains(&product));
    assert_eq!(live.object_count(), 2);

    // the factory alone does not reach its product
    let live = LiveSet::mark_roots([&factory]);
    assert!(!live.contains(&product));
}

#[test]
fn test_instance_method_keeps_notification_alive() {
    let runtime = Runtime::new();
    let class = runtime.define_class("Holder", None).unwrap();
    let holder = runtime.new_object(class).unwrap();
    let kept = runtime.new_object(class).unwrap();

    let pending = Message::new(kept.clone(), "anything", vec![]);
    let parent = Message::new(holder.clone(), "anything", vec![]);
    let mut activity = runtime.attach_activity();
    parent.notify(&mut activity, pending);

    holder
        .as_object()
        .unwrap()
        .set_variable(class, "parent", Value::Message(parent));

    let live = LiveSet::mark_roots([&holder]);
    assert_eq!(live.message_count(), 2);
    assert!(live.contains(&kept));
}

#[test]
fn test_enhanced_object_flattened() {
    let runtime = Runtime::new();
    let class = runtime.define_class("Shape", None).unwrap();
    let shape = runtime.new_object(class).unwrap();
    let object = shape.as_object().unwrap();
    object.set_variable(class, "sides", Value::Integer(3));
    object.set_variable(class, "self", shape.clone());

    let method: MethodRef = Arc::new(Method::new(Code::native("AREA", Arity::any(), |_, _| {
        Ok(Value::Integer(0))
    })));
    object.define_instance_method(Selector::new("area"), &method);

    let graph = flatten(&shape);
    assert_eq!(graph.len(), 2);
    match graph.node(graph.root()).unwrap() {
        FlatNode::Object {
            class,
            enhanced,
            variables,
        } => {
            assert_eq!(&**class, "SHAPE");
            assert!(*enhanced);
            let names: Vec<&str> = variables.iter().map(|(_, name, _)| &**name).collect();
            assert_eq!(names, vec!["SELF", "SIDES"]);
            assert_eq!(variables[0].2, graph.root());
            assert_eq!(graph.node(variables[1].2), Some(&FlatNode::Integer(3)));
        }
        other => panic!("unexpected root {:?}", other),
    }
}

#[test]
fn test_flatten_completed_message() {
    let runtime = Runtime::new();
    let class = runtime.define_class("Echo", None).unwrap();
    runtime
        .define_method(
            class,
            "echo",
            Method::new(Code::native("ECHO", Arity::exact(1), |_, inv| {
                Ok(inv.argument(0)?.clone())
            })),
        )
        .unwrap();
    let echo = runtime.new_object(class).unwrap();
    let mut activity = runtime.attach_activity();

    let m = Message::new(echo, "echo", vec![Value::from("ping")]);
    m.send(&mut activity, None).unwrap();

    let graph = flatten(&Value::Message(m));
    match graph.node(graph.root()).unwrap() {
        FlatNode::Message {
            name,
            args,
            result,
            completed,
            ..
        } => {
            assert_eq!(&**name, "ECHO");
            assert!(*completed);
            assert_eq!(args.len(), 1);
            let result = result.expect("completed message has a result");
            assert_eq!(graph.node(result), Some(&FlatNode::Str(Arc::from("ping"))));
        }
        other => panic!("unexpected root {:?}", other),
    }
}
