//! Cost of the payload cache
//!
//! Compares a cached encode against a forced re-encode after mutation, and
//! measures decode of a topic-framed buffer.

use codec::{PositionMessage, Wrapper};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use types::{Header, Point, Position, Quaternion};

fn sample() -> PositionMessage {
    Wrapper::new(Position::new(
        Header::new(7, "map"),
        Point::new(1.0, 1.1, 1.2),
        Quaternion::new(0.0, 0.0, 0.0, 1.0),
    ))
}

fn bench_encode(c: &mut Criterion) {
    let message = sample();
    message.encode().unwrap();

    c.bench_function("encode_cached", |b| b.iter(|| black_box(message.encode().unwrap())));

    c.bench_function("encode_after_mutation", |b| {
        let mut x = 0.0;
        b.iter(|| {
            x += 1.0;
            message.set_point(Point::new(x, 1.1, 1.2));
            black_box(message.encode().unwrap())
        })
    });
}

fn bench_decode(c: &mut Criterion) {
    let framed = sample().encode_framed().unwrap();
    c.bench_function("decode_framed", |b| {
        b.iter(|| black_box(PositionMessage::decode_framed(black_box(&framed)).unwrap()))
    });
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
