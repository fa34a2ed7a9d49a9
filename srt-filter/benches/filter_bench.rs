use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use srt_filter::{FilterConfig, FilterRegistry, PacketFilter, SessionParameters};
use srt_protocol::{DataPacket, MsgNumber, SeqNumber};

fn params() -> SessionParameters {
    SessionParameters::new(9999, SeqNumber::new(0), SeqNumber::new(0), 1316).unwrap()
}

fn bench_config_parse(c: &mut Criterion) {
    c.bench_function("config_parse", |b| {
        b.iter(|| {
            let config = FilterConfig::parse(black_box("fec,cols:10,rows:5,arq:onreq")).unwrap();
            black_box(config);
        });
    });
}

fn bench_fec_send_path(c: &mut Criterion) {
    let registry = FilterRegistry::builtin();
    let payload = Bytes::from(vec![0xA5u8; 1312]);

    let mut group = c.benchmark_group("fec_send");
    group.throughput(Throughput::Bytes(payload.len() as u64));

    group.bench_function("feed_and_pack", |b| {
        let mut filter = PacketFilter::configure(&registry, params(), "fec,cols:10,rows:5").unwrap();
        let mut seq = SeqNumber::new(0);
        b.iter(|| {
            let packet = DataPacket::new(seq, MsgNumber::new(1), 0, 9999, payload.clone());
            filter.feed_source(black_box(&packet));
            seq = seq.next();
            while let Some(control) = filter.pack_control_packet(seq).unwrap() {
                black_box(control);
            }
        });
    });

    group.finish();
}

fn bench_fec_receive_path(c: &mut Criterion) {
    let registry = FilterRegistry::builtin();
    let payload = Bytes::from(vec![0x5Au8; 1312]);

    c.bench_function("fec_receive_in_order", |b| {
        let mut filter = PacketFilter::configure(&registry, params(), "fec,cols:10").unwrap();
        let mut seq = SeqNumber::new(0);
        b.iter(|| {
            let packet = DataPacket::new(seq, MsgNumber::new(1), 0, 9999, payload.clone());
            let outcome = filter.receive(black_box(&packet));
            seq = seq.next();
            black_box(outcome);
        });
    });
}

criterion_group!(
    benches,
    bench_config_parse,
    bench_fec_send_path,
    bench_fec_receive_path
);
criterion_main!(benches);
