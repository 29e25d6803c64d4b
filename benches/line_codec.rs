use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use relayd::event::{Tag, TaggedEvent};
use relayd::line::{read_line, Line};
use std::io::Cursor;
use std::time::Duration;

/// Per-line cost of the relay hot path: byte-wise line reads and event
/// encoding for typical and maximum-size IRC messages

fn bench_read_line(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_line");
    group.measurement_time(Duration::from_secs(5));

    for size in [32usize, 128, 510, 2048] {
        let mut input = vec![b'x'; size];
        input.extend_from_slice(b"\r\n");

        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.iter(|| {
                let mut src = Cursor::new(black_box(input.as_slice()));
                black_box(read_line(&mut src).unwrap());
            });
        });
    }

    group.finish();
}

fn bench_encode_event(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_event");

    let short = Line::from("PRIVMSG #chan :hi");
    let long = Line::new(vec![b'x'; 511]);

    group.bench_function("short", |b| {
        b.iter(|| {
            let event = TaggedEvent::new(Tag::Inbound, 1_700_000_000, black_box(short.clone()));
            black_box(event.encode());
        });
    });

    group.bench_function("max_line", |b| {
        b.iter(|| {
            let event = TaggedEvent::new(Tag::User, 1_700_000_000, black_box(long.clone()));
            black_box(event.encode());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_read_line, bench_encode_event);
criterion_main!(benches);
