//! Scripted in-memory [`Backend`] for tests and demos.
//!
//! A `MockBackend` is a cheap handle over shared state: keep a clone after moving one into a
//! [`Device`](crate::device::Device) to script it and to inspect what the device did.
//!
//! ```
//! use gatt_device::backend::{BackendKind, Handle};
//! use gatt_device::device::Device;
//! use gatt_device::mock::MockBackend;
//! use gatt_device::uuid::Uuid;
//!
//! let battery = Uuid::from_u16(0x2a19);
//! let mock = MockBackend::new(BackendKind::Bled112)
//!     .characteristic(battery, Handle(0x0e))
//!     .value(Handle(0x0e), vec![87]);
//! let device = Device::new("01:23:45:67:89:AB", mock.clone()).unwrap();
//! assert_eq!(device.read(battery).unwrap(), vec![87]);
//! assert_eq!(mock.calls(), vec!["handle", "read_characteristic"]);
//! ```

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use crate::address::Address;
use crate::backend::*;
use crate::error::{Error, ErrorKind};
use crate::inbox::Inbox;
use crate::uuid::Uuid;

/// Notifications pushed into the inbox after a write to a given handle.
#[derive(Clone, Debug)]
struct Response {
    handle: Handle,
    packets: Vec<Vec<u8>>,
    delay: Duration,
}

#[derive(Debug, Default)]
struct Script {
    capabilities: Option<Capabilities>,
    reachable: bool,
    handles: HashMap<Uuid, Handle>,
    values: HashMap<Handle, Vec<u8>>,
    rejected_writes: Vec<Handle>,
    responses: HashMap<Handle, Response>,
    rssi: VecDeque<i32>,
}

#[derive(Debug, Default)]
struct Journal {
    calls: Vec<&'static str>,
    connected_to: Option<Address>,
    writes: Vec<(Handle, Vec<u8>, WriteKind)>,
    subscriptions: Vec<(Uuid, bool)>,
    listening: bool,
}

struct State {
    kind: BackendKind,
    script: Mutex<Script>,
    journal: Mutex<Journal>,
    inbox: Inbox,
    sink: Mutex<Option<NotificationSink>>,
}

#[derive(Clone)]
pub struct MockBackend(Arc<State>);

impl MockBackend {
    pub fn new(kind: BackendKind) -> Self {
        Self(Arc::new(State {
            kind,
            script: Mutex::new(Script {
                reachable: true,
                ..Default::default()
            }),
            journal: Default::default(),
            inbox: Inbox::new(),
            sink: Mutex::new(None),
        }))
    }

    /// Overrides the capabilities implied by the backend kind.
    pub fn with_capabilities(self, v: Capabilities) -> Self {
        self.script().capabilities = Some(v);
        self
    }

    /// Makes every connect attempt fail.
    pub fn unreachable(self) -> Self {
        self.script().reachable = false;
        self
    }

    pub fn characteristic(self, uuid: Uuid, handle: Handle) -> Self {
        self.script().handles.insert(uuid, handle);
        self
    }

    /// Value returned by reads of `handle`. Handles without a value read as `None`.
    pub fn value(self, handle: Handle, value: Vec<u8>) -> Self {
        self.script().values.insert(handle, value);
        self
    }

    pub fn reject_writes(self, handle: Handle) -> Self {
        self.script().rejected_writes.push(handle);
        self
    }

    /// After each write to `written`, pushes `packets` into the inbox under `handle` from a
    /// separate thread, `delay` apart.
    pub fn respond(self, written: Handle, handle: Handle, packets: Vec<Vec<u8>>, delay: Duration) -> Self {
        self.script().responses.insert(written, Response { handle, packets, delay });
        self
    }

    /// Readings returned by successive RSSI reads. An exhausted script fails the read.
    pub fn rssi_readings(self, readings: impl IntoIterator<Item=i32>) -> Self {
        self.script().rssi.extend(readings);
        self
    }

    /// Simulates a notification received on `handle`.
    ///
    /// With a notification inbox the value is queued right away. Otherwise it is passed to
    /// the sink given to [`start`](Backend::start), on the calling thread, if the listener
    /// is running and `handle` belongs to a scripted characteristic.
    pub fn deliver(&self, handle: Handle, value: Vec<u8>) {
        if self.capabilities().has_notification_inbox() {
            self.0.inbox.push(handle, value);
            return;
        }
        let uuid = self.script().handles.iter()
            .find(|&(_, &h)| h == handle)
            .map(|(&uuid, _)| uuid);
        let sink = self.lock_sink().clone();
        if let (Some(uuid), Some(sink)) = (uuid, sink) {
            sink(uuid, &value);
        }
    }

    pub fn notifications(&self) -> &Inbox {
        &self.0.inbox
    }

    /// Names of the backend methods called so far, in order. Capability queries and
    /// `kind` are not recorded.
    pub fn calls(&self) -> Vec<&'static str> {
        self.journal().calls.clone()
    }

    pub fn writes(&self) -> Vec<(Handle, Vec<u8>, WriteKind)> {
        self.journal().writes.clone()
    }

    pub fn subscriptions(&self) -> Vec<(Uuid, bool)> {
        self.journal().subscriptions.clone()
    }

    pub fn connected_to(&self) -> Option<Address> {
        self.journal().connected_to
    }

    pub fn is_listening(&self) -> bool {
        self.journal().listening
    }

    fn record(&self, call: &'static str) {
        self.journal().calls.push(call);
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.0.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn journal(&self) -> MutexGuard<'_, Journal> {
        self.0.journal.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_sink(&self) -> MutexGuard<'_, Option<NotificationSink>> {
        self.0.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_response(&self, response: Response) {
        let state = self.0.clone();
        thread::spawn(move || {
            for packet in response.packets {
                thread::sleep(response.delay);
                state.inbox.push(response.handle, packet);
            }
        });
    }
}

impl fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MockBackend")
            .field("kind", &self.0.kind)
            .field("script", &*self.script())
            .field("journal", &*self.journal())
            .field("inbox", &self.0.inbox)
            .finish()
    }
}

impl Backend for MockBackend {
    fn kind(&self) -> BackendKind {
        self.0.kind
    }

    fn capabilities(&self) -> Capabilities {
        self.script().capabilities.unwrap_or_else(|| self.0.kind.capabilities())
    }

    fn connect(&self, address: Address, _timeout: Duration) -> Result<(), Error> {
        self.record("connect");
        if !self.script().reachable {
            return Err(Error::new(ErrorKind::Other, format!("{} is unreachable", address)));
        }
        self.journal().connected_to = Some(address);
        Ok(())
    }

    fn disconnect(&self) -> Result<(), Error> {
        self.record("disconnect");
        match self.journal().connected_to.take() {
            Some(_) => Ok(()),
            None => Err(Error::new(ErrorKind::Other, "not connected")),
        }
    }

    fn bond(&self) -> Result<(), Error> {
        self.record("bond");
        Ok(())
    }

    fn encrypt(&self) -> Result<(), Error> {
        self.record("encrypt");
        if self.capabilities().can_encrypt() {
            Ok(())
        } else {
            Err(Error::unsupported("encrypt"))
        }
    }

    fn handle(&self, uuid: Uuid) -> Result<Option<Handle>, Error> {
        self.record("handle");
        Ok(self.script().handles.get(&uuid).copied())
    }

    fn read_characteristic(&self, handle: Handle) -> Result<Option<Vec<u8>>, Error> {
        self.record("read_characteristic");
        Ok(self.script().values.get(&handle).cloned())
    }

    fn write_characteristic(&self, handle: Handle, value: &[u8], kind: WriteKind) -> Result<(), Error> {
        self.record("write_characteristic");
        self.journal().writes.push((handle, value.to_vec(), kind));
        let script = self.script();
        if script.rejected_writes.contains(&handle) {
            return Err(Error::new(ErrorKind::Other, format!("write to {} rejected", handle)));
        }
        if let Some(response) = script.responses.get(&handle).cloned() {
            drop(script);
            self.spawn_response(response);
        }
        Ok(())
    }

    fn subscribe(&self, uuid: Uuid, indication: bool) -> Result<(), Error> {
        self.record("subscribe");
        self.journal().subscriptions.push((uuid, indication));
        Ok(())
    }

    fn inbox(&self) -> Option<&Inbox> {
        if self.capabilities().has_notification_inbox() {
            Some(&self.0.inbox)
        } else {
            None
        }
    }

    fn rssi(&self) -> Result<i32, Error> {
        self.record("rssi");
        if !self.capabilities().can_read_signal_strength() {
            return Err(Error::unsupported("signal strength"));
        }
        self.script().rssi.pop_front()
            .ok_or_else(|| Error::new(ErrorKind::Other, "RSSI read failed"))
    }

    fn start(&self, sink: NotificationSink) -> Result<(), Error> {
        self.record("start");
        *self.lock_sink() = Some(sink);
        self.journal().listening = true;
        Ok(())
    }

    fn stop(&self) -> Result<(), Error> {
        self.record("stop");
        *self.lock_sink() = None;
        self.journal().listening = false;
        Ok(())
    }
}
