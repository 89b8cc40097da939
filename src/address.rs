use macaddr::MacAddr6;
use static_assertions::assert_impl_all;
use std::fmt;
use std::str::FromStr;

/// Hardware address of a remote device.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Address(MacAddr6);

impl Address {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(MacAddr6::new(bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5]))
    }

    pub fn bytes(&self) -> [u8; 6] {
        self.0.into_array()
    }
}

assert_impl_all!(Address: Send, Sync);

impl From<MacAddr6> for Address {
    fn from(v: MacAddr6) -> Self {
        Self(v)
    }
}

impl From<Address> for MacAddr6 {
    fn from(v: Address) -> Self {
        v.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = self.bytes();
        write!(f, "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}", b[0], b[1], b[2], b[3], b[4], b[5])
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

/// Accepts only the colon-separated form `XX:XX:XX:XX:XX:XX`.
impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 || parts.iter().any(|p| p.len() != 2) {
            return Err(AddressParseError(()));
        }
        s.parse::<MacAddr6>()
            .map(Self)
            .map_err(|_| AddressParseError(()))
    }
}

#[derive(Debug)]
pub struct AddressParseError(());

impl fmt::Display for AddressParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid device address, expected XX:XX:XX:XX:XX:XX")
    }
}

impl std::error::Error for AddressParseError {}
