use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use oscsend::{plan_float_ramp, plan_integer_ramp, tokenize, OscArg, OscMessage};

/// Benchmark argument parsing on typical action inputs
fn bench_tokenize(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenize");

    let inputs = [
        ("default", r#"1 "test" 2.5"#),
        ("quoted", r#""a fairly long quoted phrase with many words" 1 2 3"#),
        ("json", r#"{"type":"f","value":0.5} {"type":"s","value":"x y"} {"type":"T"}"#),
    ];

    for (name, input) in inputs {
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), input, |b, input| {
            b.iter(|| tokenize(black_box(input)))
        });
    }

    group.finish();
}

/// Benchmark planning and materialising fades of growing size
fn bench_ramp_plans(c: &mut Criterion) {
    let mut group = c.benchmark_group("ramp_plans");

    for granularity in [1u32, 2, 3] {
        group.bench_with_input(
            BenchmarkId::new("float_0_to_1", granularity),
            &granularity,
            |b, &granularity| {
                b.iter(|| {
                    let plan = plan_float_ramp(black_box(0.0), black_box(1.0), 1000, granularity);
                    plan.emissions().count()
                })
            },
        );
    }

    group.bench_function("integer_0_to_127", |b| {
        b.iter(|| plan_integer_ramp(black_box(0), black_box(127), 2000).emissions().count())
    });

    group.finish();
}

/// Benchmark OSC framing
fn bench_encode(c: &mut Criterion) {
    let msg = OscMessage::new(
        "/mixer/ch/01/fader",
        vec![OscArg::Float(0.75), OscArg::Int(3), OscArg::from("label"), OscArg::Bool(true)],
    );

    c.bench_function("encode_message", |b| b.iter(|| black_box(&msg).encode()));
}

criterion_group!(benches, bench_tokenize, bench_ramp_plans, bench_encode);
criterion_main!(benches);
