mod write;
pub mod observer;

use log::{Level, Log};
use static_assertions::assert_impl_all;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::address::Address;
use crate::backend::*;
use crate::error::{Error, ErrorKind};
use crate::uuid::Uuid;

use observer::{Dispatcher, Observer, ObserverId, Registry};

pub use write::WriteOptions;

/// Log target of every record a [`Device`] emits.
pub const LOG_TARGET: &str = "gatt_device::device";

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep quantum of the write-wait polling loop.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// RSSI value the BLED112 intermittently reports instead of a real reading.
pub const RSSI_SENTINEL: i32 = 25;
pub const RSSI_ATTEMPTS: u32 = 3;
pub const RSSI_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Timing and retry parameters of a [`Device`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// Used by [`Device::connect`].
    pub connect_timeout: Duration,

    /// Used by writes that wait for a response but set no timeout of their own.
    pub response_timeout: Duration,

    pub poll_interval: Duration,

    pub rssi_sentinel: i32,

    pub rssi_attempts: u32,

    pub rssi_retry_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            poll_interval: POLL_INTERVAL,
            rssi_sentinel: RSSI_SENTINEL,
            rssi_attempts: RSSI_ATTEMPTS,
            rssi_retry_delay: RSSI_RETRY_DELAY,
        }
    }
}

#[derive(Clone)]
pub(in crate) enum LogSink {
    /// The process-wide `log` logger.
    Global,
    Custom(Arc<dyn Log>),
}

impl LogSink {
    pub(in crate) fn logger(&self) -> &dyn Log {
        match self {
            LogSink::Global => log::logger(),
            LogSink::Custom(logger) => &**logger,
        }
    }
}

pub struct DeviceBuilder {
    address: Address,
    backend: Box<dyn Backend>,
    config: Config,
    log_sink: LogSink,
}

impl DeviceBuilder {
    pub fn new(address: Address, backend: impl Backend + 'static) -> Self {
        Self {
            address,
            backend: Box::new(backend),
            config: Config::default(),
            log_sink: LogSink::Global,
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Sends the device's log records to `logger` instead of the process-wide logger.
    pub fn log_sink(mut self, logger: Arc<dyn Log>) -> Self {
        self.log_sink = LogSink::Custom(logger);
        self
    }

    pub fn connect_timeout(mut self, v: Duration) -> Self {
        self.config.connect_timeout = v;
        self
    }

    pub fn response_timeout(mut self, v: Duration) -> Self {
        self.config.response_timeout = v;
        self
    }

    pub fn poll_interval(mut self, v: Duration) -> Self {
        self.config.poll_interval = v;
        self
    }

    pub fn rssi_retry_delay(mut self, v: Duration) -> Self {
        self.config.rssi_retry_delay = v;
        self
    }

    pub fn build(self) -> Device {
        let device = Device {
            address: self.address,
            backend: self.backend,
            observers: Arc::new(Registry::new()),
            config: self.config,
            log_sink: self.log_sink,
        };
        device_log!(device, Level::Info, "using {} backend", device.backend.kind());
        device
    }
}

/// A remote BLE device reached through one backend.
///
/// The backend is chosen at construction and never changes. Operations needing a capability
/// the backend lacks fail with [`ErrorKind::UnsupportedOperation`] without touching it.
pub struct Device {
    address: Address,
    backend: Box<dyn Backend>,
    observers: Arc<Registry>,
    config: Config,
    log_sink: LogSink,
}

assert_impl_all!(Device: Send, Sync);

impl Device {
    /// Parses `address` (`XX:XX:XX:XX:XX:XX`) and builds a device with default settings.
    pub fn new(address: &str, backend: impl Backend + 'static) -> Result<Self, Error> {
        Ok(DeviceBuilder::new(address.parse::<Address>()?, backend).build())
    }

    pub fn builder(address: Address, backend: impl Backend + 'static) -> DeviceBuilder {
        DeviceBuilder::new(address, backend)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.backend.capabilities()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bonds with the device. The pairing is persisted by the backend.
    pub fn bond(&self) -> Result<(), Error> {
        device_log!(self, Level::Info, "bond");
        self.backend.bond()
    }

    pub fn connect(&self) -> Result<(), Error> {
        self.connect_with_timeout(self.config.connect_timeout)
    }

    pub fn connect_with_timeout(&self, timeout: Duration) -> Result<(), Error> {
        device_log!(self, Level::Info, "connect (timeout {:?})", timeout);
        self.backend.connect(self.address, timeout)
            .map_err(|e| e.reclassify(ErrorKind::ConnectionFailed))
    }

    pub fn read(&self, uuid: Uuid) -> Result<Vec<u8>, Error> {
        device_log!(self, Level::Info, "read {}", uuid);
        let handle = self.resolve(uuid)?;
        match self.backend.read_characteristic(handle) {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(Error::new(ErrorKind::ReadFailed,
                format!("no value read from {} ({})", uuid, handle))),
            Err(e) => Err(e.reclassify(ErrorKind::ReadFailed)),
        }
    }

    /// Forms an encrypted link without bonding.
    pub fn encrypt(&self) -> Result<(), Error> {
        device_log!(self, Level::Info, "encrypt");
        self.require(Capability::Encrypt, "encrypt")?;
        self.backend.encrypt()
    }

    /// Received signal strength in dBm.
    ///
    /// Readings equal to the backend's known-bad sentinel are retried; if every attempt returns
    /// it the call fails with [`ErrorKind::SignalStrengthUnavailable`].
    pub fn signal_strength(&self) -> Result<i32, Error> {
        device_log!(self, Level::Info, "signal_strength");
        self.require(Capability::SignalStrength, "signal strength")?;
        let attempts = self.config.rssi_attempts;
        for attempt in 1..=attempts {
            let rssi = self.backend.rssi()?;
            if rssi != self.config.rssi_sentinel {
                return Ok(rssi);
            }
            device_log!(self, Level::Debug, "attempt {}/{} read sentinel RSSI {}", attempt, attempts, rssi);
            if attempt < attempts {
                thread::sleep(self.config.rssi_retry_delay);
            }
        }
        Err(Error::new(ErrorKind::SignalStrengthUnavailable,
            format!("RSSI read returned {} on all {} attempts", self.config.rssi_sentinel, attempts)))
    }

    /// Starts the backend's background listener.
    ///
    /// On backends without a notification inbox the listener calls the observers of a
    /// characteristic for every value it receives on it.
    pub fn start(&self) -> Result<(), Error> {
        device_log!(self, Level::Info, "start");
        let dispatcher = self.dispatcher();
        self.backend.start(Arc::new(move |uuid: Uuid, value: &[u8]| dispatcher.dispatch(uuid, value)))
    }

    /// Disconnects and stops the backend's background listener.
    ///
    /// The listener is stopped even if disconnecting fails; the first error is returned.
    pub fn stop(&self) -> Result<(), Error> {
        device_log!(self, Level::Info, "stop");
        let disconnected = self.backend.disconnect();
        if let Err(e) = &disconnected {
            device_log!(self, Level::Warn, "disconnect failed: {}", e);
        }
        self.backend.stop()?;
        disconnected
    }

    /// Enables notifications, or indications if `indication` is set.
    pub fn subscribe(&self, uuid: Uuid, indication: bool) -> Result<(), Error> {
        self.subscribe0(uuid, indication, false)
    }

    /// Like [`subscribe`](Self::subscribe) and registers `observer` for the values delivered on
    /// `uuid`. Observers of the same characteristic are called in registration order.
    pub fn subscribe_with_observer(&self, uuid: Uuid, indication: bool, observer: impl Observer + 'static)
        -> Result<ObserverId, Error>
    {
        self.subscribe0(uuid, indication, true)?;
        Ok(self.observers.register(uuid, Arc::new(observer)))
    }

    /// Unregisters an observer. Returns `false` if it wasn't registered.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        device_log!(self, Level::Debug, "removing observer {}", id);
        self.observers.remove(id)
    }

    pub fn observer_count(&self, uuid: Uuid) -> usize {
        self.observers.len(uuid)
    }

    fn subscribe0(&self, uuid: Uuid, indication: bool, with_observer: bool) -> Result<(), Error> {
        device_log!(self, Level::Info, "subscribe to {} with{} observer, indicate = {}",
            uuid, if with_observer { "" } else { "out" }, indication);
        self.backend.subscribe(uuid, indication)
    }

    fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.address, self.log_sink.clone(), self.observers.clone())
    }

    fn resolve(&self, uuid: Uuid) -> Result<Handle, Error> {
        let handle = match self.backend.handle(uuid) {
            Ok(Some(handle)) => handle,
            Ok(None) => return Err(Error::new(ErrorKind::InvalidIdentifier,
                format!("no characteristic {}", uuid))),
            Err(e) => return Err(e.reclassify(ErrorKind::InvalidIdentifier)),
        };
        device_log!(self, Level::Debug, "{} resolved to handle {}", uuid, handle);
        Ok(handle)
    }

    fn require(&self, capability: Capability, operation: &str) -> Result<(), Error> {
        if self.backend.capabilities().contains(capability) {
            Ok(())
        } else {
            Err(Error::unsupported(operation))
        }
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Device")
            .field("address", &self.address)
            .field("backend", &self.backend.kind())
            .field("observers", &self.observers)
            .finish()
    }
}
