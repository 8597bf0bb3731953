use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use trip_ls_codec::message::{Msg, Open};

fn criterion_benchmark(c: &mut Criterion) {
    let open = Msg::Open(Open {
        version: 1,
        hold: 90,
        itad: 100,
        router_id: 0x0A00_0001,
        capabilities: vec![],
    });

    let mut buf = [0u8; 256];
    let n = open.encode(&mut buf).unwrap();
    let sample = &buf[..n];

    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Elements(1));

    group.bench_function("decode_open", |bencher| {
        bencher.iter(|| {
            Msg::decode(sample).unwrap();
        })
    });

    group.bench_function("encode_open", |bencher| {
        let mut scratch = [0u8; 256];
        bencher.iter(|| {
            open.encode(&mut scratch).unwrap();
        })
    });

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
