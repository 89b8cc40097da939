//! Runs the write-wait protocol against the scripted backend.
//!
//! `RUST_LOG=gatt_device=debug cargo run --example write_wait --features mock`

use gatt_device::backend::{BackendKind, Handle};
use gatt_device::device::{Device, WriteOptions};
use gatt_device::mock::MockBackend;
use gatt_device::uuid::Uuid;
use log::*;
use std::time::Duration;

const TX: Handle = Handle(0x0e);
const RX: Handle = Handle(0x10);

pub fn main() -> anyhow::Result<()> {
    env_logger::init();

    let tx: Uuid = "6e400002-b5a3-f393-e0a9-e50e24dcca9e".parse()?;
    let rx: Uuid = "6e400003-b5a3-f393-e0a9-e50e24dcca9e".parse()?;

    let backend = MockBackend::new(BackendKind::Bled112)
        .characteristic(tx, TX)
        .characteristic(rx, RX)
        .respond(TX, RX, vec![b"hello, ".to_vec(), b"world".to_vec()], Duration::from_millis(100))
        .rssi_readings(vec![25, -61]);

    let device = Device::new("01:23:45:67:89:AB", backend)?;
    device.start()?;
    device.connect()?;
    info!("connected to {}", device.address());

    device.subscribe_with_observer(rx, false, |value: &[u8]| {
        let now = chrono::Local::now().format("[%Y-%m-%d %H:%M:%S]");
        println!("{} response: {}", now, String::from_utf8_lossy(value));
    })?;

    device.write_with_options(tx, b"greet", &WriteOptions::new()
        .wait_for_response(true)
        .packets(2)
        .response_characteristic(rx)
        .timeout(Duration::from_secs(1)))?;

    println!("RSSI: {} dBm", device.signal_strength()?);

    match device.write_with_options(tx, b"silence", &WriteOptions::new()
        .wait_for_response(true)
        .packets(3)
        .response_characteristic(rx)
        .timeout(Duration::from_millis(500)))
    {
        Ok(()) => warn!("unexpected response"),
        Err(e) => println!("no full response: {}", e),
    }

    device.stop()?;
    Ok(())
}
