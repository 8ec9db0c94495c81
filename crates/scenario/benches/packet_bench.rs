//! 서버 패킷 컴파일러 벤치마크
//!
//! 패킷 DSL 컴파일과 base64 IPC 인코딩 성능을 측정합니다.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use iwpotest_scenario::packet::{PacketSpec, compile};

const SHORT: &str = r#"TCP 04 "hi""#;
const MIXED: &str = r#"TCP 01 0203 04050607 "player_name" 12.5 -3 "escaped \"quote\"" FF"#;

fn long_packet() -> String {
    let mut line = String::from("TCP");
    for i in 0..256 {
        line.push_str(&format!(" {:02X} \"chunk {i}\" {i}.5", i % 256));
    }
    line
}

fn bench_compile(c: &mut Criterion) {
    let long = long_packet();

    let mut group = c.benchmark_group("packet_compile");
    group.throughput(Throughput::Elements(1));

    group.bench_function("short", |b| {
        b.iter(|| compile(black_box(SHORT)));
    });

    group.bench_function("mixed", |b| {
        b.iter(|| compile(black_box(MIXED)));
    });

    group.throughput(Throughput::Bytes(long.len() as u64));
    group.bench_function("long", |b| {
        b.iter(|| compile(black_box(&long)));
    });

    group.finish();
}

fn bench_payload(c: &mut Criterion) {
    let spec = match PacketSpec::compile("bench", &long_packet()) {
        Ok(spec) => spec,
        Err(e) => panic!("bench packet should compile: {e}"),
    };

    c.bench_function("packet_to_payload", |b| {
        b.iter(|| black_box(&spec).to_payload());
    });
}

criterion_group!(benches, bench_compile, bench_payload);
criterion_main!(benches);
