//! Capability contract implemented by the transports a [`Device`](crate::device::Device) drives.

use enumflags2::BitFlags;
use static_assertions::assert_impl_all;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::address::Address;
use crate::error::Error;
use crate::inbox::Inbox;
use crate::uuid::Uuid;

/// ATT attribute handle of a characteristic value.
///
/// Resolved by the backend from a [`Uuid`] and only meaningful for the connection it was
/// resolved on.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Handle(pub u16);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum WriteKind {
    /// ATT write request, acknowledged by the remote device.
    WithResponse = 0,
    /// ATT write command, unacknowledged.
    WithoutResponse = 1,
}

impl Default for WriteKind {
    fn default() -> Self {
        WriteKind::WithResponse
    }
}

/// Transport family of a backend.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BackendKind {
    /// Bluegiga BLED112 USB dongle speaking the BGAPI serial protocol.
    Bled112,
    /// BlueZ `gatttool` driven as a child process (Linux only).
    Gatttool,
}

impl BackendKind {
    /// Capabilities every backend of this family provides.
    pub fn capabilities(self) -> Capabilities {
        match self {
            BackendKind::Bled112 => Capabilities::all(),
            BackendKind::Gatttool => Capabilities::empty(),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            BackendKind::Bled112 => "BLED112",
            BackendKind::Gatttool => "GATTTOOL",
        })
    }
}

#[derive(BitFlags, Copy, Clone, Debug, Eq, Hash, PartialEq)]
#[repr(u8)]
pub enum Capability {
    Encrypt             = 0x01,
    SignalStrength      = 0x02,
    NotificationInbox   = 0x04,
}

/// Optional capabilities of a backend. Everything in [`Backend`] without a default
/// implementation is mandatory.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct Capabilities(BitFlags<Capability>);

impl Capabilities {
    pub fn all() -> Self {
        Self(BitFlags::all())
    }

    pub fn empty() -> Self {
        Self(BitFlags::empty())
    }

    pub fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability)
    }

    pub fn without(self, capability: Capability) -> Self {
        Self(self.0 & !BitFlags::from(capability))
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(capability)
    }
}

macro_rules! capabilities {
    ($($(#[$attr:meta])* $f:ident => $e:ident,)*) => {
        impl Capabilities {
            $(
                $(#[$attr])*
                pub fn $f(&self) -> bool {
                    self.contains(Capability::$e)
                }
            )*
        }
    };
}

capabilities!(
    #[doc="Backend can form an encrypted link without bonding."]
    can_encrypt => Encrypt,

    #[doc="Backend can read the link's received signal strength."]
    can_read_signal_strength => SignalStrength,

    #[doc="Backend queues notifications and indications per handle for the write-wait protocol."]
    has_notification_inbox => NotificationInbox,
);

assert_impl_all!(Capabilities: Send, Sync);

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set().entries(self.0.iter()).finish()
    }
}

impl From<Capability> for Capabilities {
    fn from(v: Capability) -> Self {
        Self(v.into())
    }
}

/// Receives the notification and indication values of subscribed characteristics.
pub type NotificationSink = Arc<dyn Fn(Uuid, &[u8]) + Send + Sync>;

/// A transport able to talk GATT to one remote device.
///
/// Implementations own their background listener (started with [`start`](Backend::start)).
/// If they report [`Capability::NotificationInbox`] they push every notification and
/// indication they receive into the [`Inbox`] returned by [`inbox`](Backend::inbox).
/// Otherwise they pass each value to the [`NotificationSink`] given to `start`.
///
/// Optional operations default to an [`UnsupportedOperation`](crate::error::ErrorKind)
/// error; a backend overriding one must also report the matching capability.
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn capabilities(&self) -> Capabilities {
        self.kind().capabilities()
    }

    fn connect(&self, address: Address, timeout: Duration) -> Result<(), Error>;

    fn disconnect(&self) -> Result<(), Error>;

    fn bond(&self) -> Result<(), Error>;

    fn encrypt(&self) -> Result<(), Error> {
        Err(Error::unsupported("encrypt"))
    }

    /// Resolves a characteristic UUID to its value handle, `None` if the device has no such
    /// characteristic.
    fn handle(&self, uuid: Uuid) -> Result<Option<Handle>, Error>;

    /// Reads a characteristic value, `None` if the device returned nothing.
    fn read_characteristic(&self, handle: Handle) -> Result<Option<Vec<u8>>, Error>;

    fn write_characteristic(&self, handle: Handle, value: &[u8], kind: WriteKind) -> Result<(), Error>;

    /// Enables notifications, or indications if `indication` is set, on a characteristic.
    fn subscribe(&self, uuid: Uuid, indication: bool) -> Result<(), Error>;

    fn inbox(&self) -> Option<&Inbox> {
        None
    }

    /// Received signal strength in dBm.
    fn rssi(&self) -> Result<i32, Error> {
        Err(Error::unsupported("signal strength"))
    }

    /// Starts the background listener. Backends without an inbox deliver to `sink` until
    /// [`stop`](Backend::stop).
    fn start(&self, sink: NotificationSink) -> Result<(), Error>;

    /// Stops the background listener.
    fn stop(&self) -> Result<(), Error>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kind_capabilities() {
        let bled = BackendKind::Bled112.capabilities();
        assert!(bled.can_encrypt());
        assert!(bled.can_read_signal_strength());
        assert!(bled.has_notification_inbox());

        let tool = BackendKind::Gatttool.capabilities();
        assert!(!tool.can_encrypt());
        assert!(!tool.can_read_signal_strength());
        assert!(!tool.has_notification_inbox());
    }

    #[test]
    fn with_without() {
        let c = Capabilities::empty().with(Capability::Encrypt);
        assert!(c.can_encrypt());
        assert!(!c.has_notification_inbox());
        assert_eq!(c, Capabilities::from(Capability::Encrypt));
        assert_eq!(Capabilities::all().without(Capability::SignalStrength),
            Capabilities::empty().with(Capability::Encrypt).with(Capability::NotificationInbox));
    }

    #[test]
    fn handle_display() {
        assert_eq!(Handle(0x0e).to_string(), "0x000e");
    }
}
