//! Device-centric client for Bluetooth Low Energy (BLE) GATT peripherals that hides which
//! transport is used to reach them.
//!
//! Two transport families are supported through the [`Backend`](backend/trait.Backend.html)
//! trait: the Bluegiga BLED112 USB dongle, which supports every operation, and BlueZ `gatttool`,
//! which can't encrypt without bonding, read the signal strength or queue notifications.
//! A [`Device`](device/struct.Device.html) owns exactly one backend and exposes the same API
//! for both; operations the backend can't perform fail with
//! [`ErrorKind::UnsupportedOperation`](error/enum.ErrorKind.html).
//!
//! # Waiting for a response
//!
//! Many peripherals answer a command written to one characteristic with a burst of
//! notifications on another. [`Device::write_with_options`](device/struct.Device.html) can wait
//! for a fixed number of such packets, reassemble them in arrival order and hand the result to
//! the observers registered for the response characteristic.
//!
//! ## Example
//!
//! ```no_run
//! use gatt_device::backend::Backend;
//! use gatt_device::device::{Device, WriteOptions};
//! use gatt_device::error::Error;
//! use gatt_device::uuid::Uuid;
//! use std::time::Duration;
//!
//! fn query(backend: impl Backend + 'static) -> Result<(), Error> {
//!     let tx: Uuid = "6e400002-b5a3-f393-e0a9-e50e24dcca9e".parse()?;
//!     let rx: Uuid = "6e400003-b5a3-f393-e0a9-e50e24dcca9e".parse()?;
//!
//!     let device = Device::new("01:23:45:67:89:AB", backend)?;
//!     device.start()?;
//!     device.connect()?;
//!     device.subscribe_with_observer(rx, false, |value: &[u8]| {
//!         println!("response: {:02x?}", value);
//!     })?;
//!
//!     // The response is split over two notifications on `rx`.
//!     device.write_with_options(tx, &[0x01], &WriteOptions::new()
//!         .wait_for_response(true)
//!         .packets(2)
//!         .response_characteristic(rx)
//!         .timeout(Duration::from_secs(1)))?;
//!
//!     device.stop()
//! }
//! ```
#![cfg_attr(feature = "mock", doc = r#"
With the `mock` feature enabled the [`mock`](mock/index.html) module provides a scripted
in-memory backend for tests.
"#)]
#![deny(dead_code)]
#![deny(non_snake_case)]
#![deny(unused_imports)]
#![deny(unused_must_use)]

#[macro_use]
mod macros;

pub mod address;
pub mod backend;
pub mod device;
pub mod error;
pub mod inbox;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod uuid;

pub use device::{Device, WriteOptions};
pub use error::{Error, ErrorKind};
