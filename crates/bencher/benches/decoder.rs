use std::hint::black_box;
use std::sync::Arc;

use bencher::{TestCase, TestGroup, content_type};
use bytes::{Bytes, BytesMut};
use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use micro_body::body::{BodyAccumulator, FailureFlag};
use micro_body::codec::MultipartDecoder;
use micro_body::protocol::ContentKind;
use tokio_util::codec::Decoder;

const CHUNK_SIZE: usize = 8 * 1024;

fn create_test_cases() -> Vec<TestCase> {
    vec![
        TestCase::multipart("fields_only", TestGroup::Small, 16, 0),
        TestCase::multipart("file_64k", TestGroup::Normal, 2, 64 * 1024),
        TestCase::multipart("file_4m", TestGroup::Large, 2, 4 * 1024 * 1024),
    ]
}

fn benchmark_multipart_decoder(criterion: &mut Criterion) {
    let content_type = content_type();
    let mut group = criterion.benchmark_group("multipart_decoder");

    for case in create_test_cases() {
        let chunks = case.chunks(CHUNK_SIZE);
        group.throughput(Throughput::Bytes(case.payload().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &chunks, |b, chunks| {
            b.iter_batched_ref(
                || MultipartDecoder::from_content_type(&content_type).expect("bench content type should have a boundary"),
                |decoder| {
                    let mut buffer = BytesMut::new();
                    let mut items = 0_usize;
                    for chunk in chunks {
                        buffer.extend_from_slice(chunk);
                        while let Some(item) = decoder.decode(&mut buffer).expect("bench payload should be valid") {
                            black_box(item);
                            items += 1;
                        }
                    }
                    black_box(items);
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn benchmark_body_accumulator(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("body_accumulator");

    for case in create_test_cases() {
        let chunks: Vec<Bytes> = case.chunks(CHUNK_SIZE);
        group.throughput(Throughput::Bytes(case.payload().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &chunks, |b, chunks| {
            b.iter(|| {
                let mut accumulator = BodyAccumulator::new(ContentKind::Other, None, 1024, Arc::new(FailureFlag::new()));
                for chunk in chunks {
                    black_box(accumulator.on_chunk(chunk).expect("unlimited body should be accepted"));
                }
                black_box(accumulator.into_body());
            });
        });
    }

    group.finish();
}

criterion_group!(decoder, benchmark_multipart_decoder, benchmark_body_accumulator);
criterion_main!(decoder);
