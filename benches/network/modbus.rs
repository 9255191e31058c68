use super::ReplayBus;
use criterion::{Criterion, Throughput};
use libiot_comm::network::SerialConfig;
use libiot_comm::network::application::modbus::{Client, DataType, crc16};
use std::hint::black_box;

/// Ten holding registers from unit 1, without CRC.
const RTU_BODY: &[u8] = &[
    0x01, 0x03, 0x14, 0x00, 0x00, 0x00, 0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x04, 0x00, 0x05,
    0x00, 0x06, 0x00, 0x07, 0x00, 0x08, 0x00, 0x09,
];

pub fn bench_crc16(c: &mut Criterion) {
    let mut group = c.benchmark_group("modbus_crc16");
    let frame = [0xA5u8; 256];
    group.throughput(Throughput::Bytes(frame.len() as u64));
    group.bench_function("crc16_256", |b| b.iter(|| crc16(black_box(&frame))));
    group.finish();
}

pub fn bench_rtu_read(c: &mut Criterion) {
    let mut reply = RTU_BODY.to_vec();
    reply.extend_from_slice(&crc16(RTU_BODY).to_le_bytes());
    let reply: &'static [u8] = Box::leak(reply.into_boxed_slice());

    let mut group = c.benchmark_group("modbus_rtu_read");
    group.throughput(Throughput::Elements(10));
    group.bench_function("read_10_registers", |b| {
        let mut bus = ReplayBus(reply);
        let mut client = Client::new();
        client
            .connect_rtu(&mut bus, "/dev/bench", &SerialConfig::default())
            .expect("Failed to open port");
        b.iter(|| {
            let response = client
                .read(DataType::HoldingRegister, 0, 10)
                .expect("Failed to read");
            black_box(response.registers().expect("Bad response"));
        })
    });
    group.finish();
}
