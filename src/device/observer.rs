use log::Level;
use static_assertions::assert_impl_all;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicU64, Ordering};

use super::LogSink;
use crate::address::Address;
use crate::uuid::Uuid;

/// Receives the values delivered on a characteristic.
pub trait Observer: Send + Sync {
    fn on_value(&self, value: &[u8]);
}

impl<F: Fn(&[u8]) + Send + Sync> Observer for F {
    fn on_value(&self, value: &[u8]) {
        self(value)
    }
}

/// Registration handle returned when an observer is added.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ObserverId(u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type Entry = (ObserverId, Arc<dyn Observer>);

/// Observers per characteristic, kept in registration order.
#[derive(Default)]
pub struct Registry {
    next_id: AtomicU64,
    entries: RwLock<HashMap<Uuid, Vec<Entry>>>,
}

assert_impl_all!(Registry: Send, Sync);

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `observer` to the list for `uuid`.
    pub fn register(&self, uuid: Uuid, observer: Arc<dyn Observer>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.write().entry(uuid).or_default().push((id, observer));
        id
    }

    /// Returns `false` if `id` wasn't registered.
    pub fn remove(&self, id: ObserverId) -> bool {
        let mut entries = self.write();
        let uuid = match entries.iter()
            .find(|(_, list)| list.iter().any(|(i, _)| *i == id))
        {
            Some((&uuid, _)) => uuid,
            None => return false,
        };
        if let Some(list) = entries.get_mut(&uuid) {
            list.retain(|(i, _)| *i != id);
            if list.is_empty() {
                entries.remove(&uuid);
            }
        }
        true
    }

    /// Observers of `uuid` at the time of the call. Dispatch iterates the copy, so observers
    /// may register while it runs.
    pub fn snapshot(&self, uuid: Uuid) -> Vec<(ObserverId, Arc<dyn Observer>)> {
        self.read().get(&uuid).cloned().unwrap_or_default()
    }

    pub fn len(&self, uuid: Uuid) -> usize {
        self.read().get(&uuid).map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, Vec<Entry>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, Vec<Entry>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map()
            .entries(self.read().iter().map(|(uuid, list)| (uuid, list.len())))
            .finish()
    }
}

/// Calls the observers of a device, on the caller's thread or on a backend listener.
#[derive(Clone)]
pub(in crate) struct Dispatcher {
    address: Address,
    log_sink: LogSink,
    observers: Arc<Registry>,
}

impl Dispatcher {
    pub(in crate) fn new(address: Address, log_sink: LogSink, observers: Arc<Registry>) -> Self {
        Self {
            address,
            log_sink,
            observers,
        }
    }

    /// Calls every observer of `uuid` in registration order. A panicking observer is logged
    /// and skipped.
    pub(in crate) fn dispatch(&self, uuid: Uuid, value: &[u8]) {
        for (id, observer) in self.observers.snapshot(uuid) {
            let r = panic::catch_unwind(AssertUnwindSafe(|| observer.on_value(value)));
            if let Err(e) = r {
                let msg = e.downcast_ref::<&str>().copied()
                    .or_else(|| e.downcast_ref::<String>().map(|s| s.as_str()))
                    .unwrap_or("<non-string panic>");
                device_log!(self, Level::Warn, "observer {} of {} panicked: {}", id, uuid, msg);
            }
        }
    }
}
