use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use oryx_core::{Arity, ClassId, Code, Message, Method, Runtime, Value};
use std::sync::Arc;

fn hierarchy(runtime: &Arc<Runtime>, depth: usize) -> ClassId {
    let root = runtime.define_class("Level0", None).unwrap();
    runtime
        .define_method(
            root,
            "add",
            Method::new(Code::native("ADD", Arity::exact(2), |_, inv| {
                let a = inv.argument(0)?.as_integer().unwrap_or(0);
                let b = inv.argument(1)?.as_integer().unwrap_or(0);
                Ok(Value::Integer(a + b))
            }))
            .unguarded(),
        )
        .unwrap();
    (1..depth).fold(root, |parent, level| {
        runtime
            .define_class(&format!("Level{}", level), Some(parent))
            .unwrap()
    })
}

fn bench_send(c: &mut Criterion) {
    let mut group = c.benchmark_group("send");

    for depth in [1usize, 4, 16] {
        let runtime = Runtime::new();
        let leaf = hierarchy(&runtime, depth);
        let receiver = runtime.new_object(leaf).unwrap();
        let mut activity = runtime.attach_activity();
        let args = [Value::Integer(1), Value::Integer(2)];

        group.bench_with_input(BenchmarkId::new("inherited", depth), &depth, |b, _| {
            b.iter(|| activity.send(black_box(&receiver), "add", &args).unwrap());
        });
    }

    group.finish();
}

fn bench_unknown(c: &mut Criterion) {
    let runtime = Runtime::new();
    let class = runtime.define_class("Proxy", None).unwrap();
    runtime
        .define_method(
            class,
            "unknown",
            Method::new(Code::native("UNKNOWN", Arity::exact(2), |_, inv| {
                Ok(inv.argument(0)?.clone())
            }))
            .unguarded(),
        )
        .unwrap();
    let receiver = runtime.new_object(class).unwrap();
    let mut activity = runtime.attach_activity();

    c.bench_function("send_unknown", |b| {
        b.iter(|| activity.send(black_box(&receiver), "missing", &[]).unwrap());
    });
}

fn bench_guarded(c: &mut Criterion) {
    let runtime = Runtime::new();
    let class = runtime.define_class("Counter", None).unwrap();
    runtime
        .define_method(
            class,
            "touch",
            Method::new(Code::native("TOUCH", Arity::any(), |_, _| Ok(Value::Nil))),
        )
        .unwrap();
    let receiver = runtime.new_object(class).unwrap();
    let mut activity = runtime.attach_activity();

    c.bench_function("send_guarded", |b| {
        b.iter(|| activity.send(black_box(&receiver), "touch", &[]).unwrap());
    });
}

fn bench_message(c: &mut Criterion) {
    let runtime = Runtime::new();
    let leaf = hierarchy(&runtime, 1);
    let receiver = runtime.new_object(leaf).unwrap();
    let mut activity = runtime.attach_activity();

    c.bench_function("message_send_result", |b| {
        b.iter(|| {
            let message = Message::new(
                receiver.clone(),
                "add",
                vec![Value::Integer(3), Value::Integer(4)],
            );
            message.send(&mut activity, None).unwrap();
            message.result(&activity).unwrap()
        });
    });

    c.bench_function("message_start_result", |b| {
        b.iter(|| {
            let message = Message::new(
                receiver.clone(),
                "add",
                vec![Value::Integer(3), Value::Integer(4)],
            );
            let worker = message.start(&mut activity, None).unwrap();
            let value = message.result(&activity).unwrap();
            worker.join();
            value
        });
    });
}

criterion_group!(benches, bench_send, bench_unknown, bench_guarded, bench_message);
criterion_main!(benches);
