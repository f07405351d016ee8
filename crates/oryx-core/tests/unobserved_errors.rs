//! Integration tests for unobserved-error warnings of started messages
//!
//! Tests validate:
//! - A condition delivered to a caller parked in result() is not reported
//! - A condition nobody asked for is reported when its activity ends
//!
//! # Running Tests
//! ```bash
//! cargo test --test unobserved_errors
//! ```

use std::io;
use std::sync::Arc;
use std::thread;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use oryx_core::{
    ActivityId, Arity, ClassId, Code, Message, MessageRef, Method, Runtime, RuntimeError, Value,
};

const WARNING: &str = "started message failed and nobody has retrieved the error";

/// Writer appending formatted events to a shared buffer
#[derive(Clone)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Warnings of every test in this binary; tests tell theirs apart by message id
static LOG: Lazy<Capture> = Lazy::new(|| {
    let capture = Capture(Arc::new(Mutex::new(Vec::new())));
    let writer = capture.clone();
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .try_init();
    capture
});

fn reported(message: &MessageRef) -> bool {
    let tag = format!("message={} ", message.id());
    let log = LOG.0.lock();
    String::from_utf8_lossy(&log)
        .lines()
        .any(|line| line.contains(WARNING) && line.contains(&tag))
}

/// `BOOM` fails once the activity given as its argument waits on it
fn failing_class(runtime: &Arc<Runtime>) -> ClassId {
    let class = runtime.define_class("Fragile", None).unwrap();
    runtime
        .define_method(
            class,
            "boom",
            Method::new(Code::native("BOOM", Arity::exact(1), |activity, inv| {
                if let Some(id) = inv.argument(0)?.as_integer() {
                    let caller = ActivityId::from_u64(id as u64);
                    while activity.runtime().activities().waiting_on(caller) != Some(activity.id()) {
                        thread::yield_now();
                    }
                }
                Err(RuntimeError::condition("SYNTAX", "boom"))
            }))
            .unguarded(),
        )
        .unwrap();
    class
}

#[test]
fn test_error_awaited_by_parked_caller_is_not_reported() {
    Lazy::force(&LOG);
    let runtime = Runtime::new();
    let class = failing_class(&runtime);
    let fragile = runtime.new_object(class).unwrap();
    let mut activity = runtime.attach_activity();

    let caller = Value::Integer(activity.id().as_u64() as i64);
    let m = Message::new(fragile, "boom", vec![caller]);
    let worker = m.start(&mut activity, None).unwrap();

    let err = m.result(&activity).unwrap_err();
    assert_eq!(err, RuntimeError::condition("SYNTAX", "boom"));
    assert!(worker.join());

    assert!(m.flags().error_reported);
    assert!(!reported(&m));
}

#[test]
fn test_error_nobody_asked_for_is_reported() {
    Lazy::force(&LOG);
    let runtime = Runtime::new();
    let class = failing_class(&runtime);
    let fragile = runtime.new_object(class).unwrap();
    let mut activity = runtime.attach_activity();

    let m = Message::new(fragile, "boom", vec![Value::Nil]);
    let worker = m.start(&mut activity, None).unwrap();
    assert!(worker.join());
    assert!(reported(&m));

    // the condition is still there for a late caller
    assert!(m.result(&activity).is_err());
    assert!(m.flags().error_reported);
}
