use super::Replay;
use criterion::{Criterion, Throughput};
use libiot_comm::network::Connect;
use libiot_comm::network::application::mqtt::{Client, Options, QoS, packet};
use libiot_comm::network::error::Error;
use libiot_comm::system::clock::Clock;
use std::hint::black_box;

/// CONNACK followed by a QoS 1 PUBLISH of `23.5` to `sensors/t`, packet id 1.
const SESSION: &[u8] = &[
    0x20, 0x02, 0x00, 0x00, 0x32, 0x11, 0x00, 0x09, b's', b'e', b'n', b's', b'o', b'r', b's',
    b'/', b't', 0x00, 0x01, b'2', b'3', b'.', b'5',
];

struct Broker;

impl Connect for Broker {
    type Connection = Replay;
    type Error = Error;

    fn connect(&mut self, _remote: &str) -> Result<Self::Connection, Self::Error> {
        Ok(Replay::new(SESSION))
    }
}

struct Frozen;

impl Clock for Frozen {
    fn now_ms(&self) -> u64 {
        0
    }
}

pub fn bench_encode_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("mqtt_encode");
    let payload = [0x42u8; 512];
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("publish_qos1_512", |b| {
        b.iter(|| {
            packet::publish(
                black_box("plant/line-3/press/telemetry"),
                black_box(&payload),
                QoS::AtLeastOnce,
                false,
                Some(7),
            )
            .expect("Failed to encode")
        })
    });
    group.finish();
}

pub fn bench_poll_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("mqtt_poll");
    group.throughput(Throughput::Elements(1));
    group.bench_function("poll_qos1_publish", |b| {
        let mut client = Client::new(&Options::new("bench"), Frozen).expect("Bad options");
        client
            .connect(&mut Broker, "broker", 1883, false)
            .expect("Failed to connect");
        client
            .subscribe("sensors/t", |_: &str, payload: &[u8]| {
                black_box(payload);
            })
            .expect("Failed to subscribe");
        b.iter(|| {
            // the PUBLISH, then the replayed CONNACK which is skipped
            client.poll(0).expect("Failed to poll");
            client.poll(0).expect("Failed to poll");
        });
    });
    group.finish();
}
