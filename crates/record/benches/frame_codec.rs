use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use corestore_record::Frame;

fn make_frame(body_len: usize) -> Frame {
    Frame::new(7, 0, 1_000, vec![0xAB; body_len]).unwrap()
}

fn encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame encode");
    for body_len in [16usize, 256, 4096] {
        let frame = make_frame(body_len);
        group.throughput(Throughput::Bytes(frame.encoded_len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(body_len), &frame, |b, frame| {
            let mut buf = Vec::with_capacity(frame.encoded_len() + 4);
            b.iter(|| {
                buf.clear();
                frame.encode_checksummed(&mut buf);
            })
        });
    }
    group.finish();
}

fn decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame decode");
    for body_len in [16usize, 256, 4096] {
        let frame = make_frame(body_len);
        let mut buf = Vec::new();
        frame.encode_checksummed(&mut buf);
        group.throughput(Throughput::Bytes(buf.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(body_len), &buf, |b, buf| {
            b.iter(|| Frame::decode_checksummed(buf, |ty| (ty == 7).then_some(body_len as u16)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, encode, decode);
criterion_main!(benches);
