use criterion::{criterion_group, criterion_main};

mod network;

criterion_group!(
    benches,
    network::modbus::bench_crc16,
    network::modbus::bench_rtu_read,
    network::mqtt::bench_encode_publish,
    network::mqtt::bench_poll_publish
);
criterion_main!(benches);
