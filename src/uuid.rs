use static_assertions::assert_impl_all;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

const BASE_UUID_BYTES: [u8; 16] = [0, 0, 0, 0, 0, 0, 0x10, 0, 0x80, 0, 0, 0x80, 0x5F, 0x9B, 0x34, 0xFB];

/// Offsets of the hyphens in the canonical textual form.
const HYPHENS: [usize; 4] = [8, 13, 18, 23];

/// Characteristic identifier: a 128-bit Bluetooth UUID.
///
/// Two identifiers are equal iff their byte sequences are equal, regardless of the letter
/// case of the string they were parsed from.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Uuid([u8; 16]);

impl Uuid {
    /// Returns the Base UUID (`00000000-0000-1000-8000-00805F9B34FB`) as defined by the specs.
    pub const fn base() -> Self {
        Self(BASE_UUID_BYTES)
    }

    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Expands a SIG-assigned 16-bit identifier over the Base UUID.
    pub const fn from_u16(v: u16) -> Self {
        let mut r = BASE_UUID_BYTES;
        r[2] = (v >> 8) as u8;
        r[3] = v as u8;
        Self(r)
    }

    /// Expands a SIG-assigned 32-bit identifier over the Base UUID.
    pub const fn from_u32(v: u32) -> Self {
        let mut r = BASE_UUID_BYTES;
        r[0] = (v >> 24) as u8;
        r[1] = (v >> 16) as u8;
        r[2] = (v >> 8) as u8;
        r[3] = v as u8;
        Self(r)
    }

    /// Returns the raw 16-byte sequence, most significant byte first.
    pub fn bytes(&self) -> [u8; 16] {
        self.0
    }

    /// Returns the shortest possible byte form that is equivalent of this UUID.
    pub fn shorten(&self) -> &[u8] {
        if self.0[4..] == BASE_UUID_BYTES[4..] {
            if self.0[0..2] == BASE_UUID_BYTES[0..2] {
                &self.0[2..4]
            } else {
                &self.0[..4]
            }
        } else {
            &self.0
        }
    }
}

assert_impl_all!(Uuid: Send, Sync);

impl Deref for Uuid {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let hex = hex::encode(self.0);
        write!(f, "{}-{}-{}-{}-{}", &hex[..8], &hex[8..12], &hex[12..16], &hex[16..20], &hex[20..])
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Uuid({})", self)
    }
}

impl From<[u8; 16]> for Uuid {
    fn from(v: [u8; 16]) -> Self {
        Self::from_bytes(v)
    }
}

impl FromStr for Uuid {
    type Err = UuidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.as_bytes();
        if raw.len() != 36 || HYPHENS.iter().any(|&i| raw[i] != b'-') {
            return Err(UuidParseError(()));
        }
        let digits: Vec<u8> = raw.iter().copied().filter(|&c| c != b'-').collect();
        let mut buf = [0; 16];
        hex::decode_to_slice(&digits, &mut buf).map_err(|_| UuidParseError(()))?;
        Ok(buf.into())
    }
}

#[derive(Debug)]
pub struct UuidParseError(());

impl fmt::Display for UuidParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid UUID string")
    }
}

impl std::error::Error for UuidParseError {}

#[cfg(test)]
mod test {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn shorten() {
        let data = &[
            (Uuid::from_u16(0), &[0, 0][..]),
            (Uuid::from_u16(0x2a37), &[0x2a, 0x37][..]),
            (Uuid::from_u32(0x0001_0000), &[0, 1, 0, 0][..]),
            (Uuid::from_u32(0xffff_ffff), &[0xff, 0xff, 0xff, 0xff][..]),
        ];
        for &(inp, exp) in data {
            assert_eq!(inp.shorten(), exp);
        }
        let long = Uuid::from_bytes(hex!("ebe0ccc17a0a4b0c8a1a6ff2997da3a6"));
        assert_eq!(long.shorten(), &long[..]);
    }

    #[test]
    fn parse_ok() {
        let data = &[
            ("00000000-0000-0000-0000-000000000000", Uuid::from_bytes([0; 16])),
            ("12345678-9AbC-Def0-1234-56789aBCDEF0",
                Uuid::from_bytes(hex!("123456789abcdef0123456789abcdef0"))),
            ("00000000-0000-1000-8000-00805F9B34FB", Uuid::base()),
            ("00002A37-0000-1000-8000-00805F9B34FB", Uuid::from_u16(0x2a37)),
        ];
        for &(inp, exp) in data {
            let act = inp.parse::<Uuid>().unwrap();
            assert_eq!(act, exp);
            assert_eq!(inp.to_ascii_lowercase(), act.to_string());
        }
    }

    #[test]
    fn sig_identifier_decodes_over_base() {
        let act = "0000FFF4-0000-1000-8000-00805F9B34FB".parse::<Uuid>().unwrap();
        assert_eq!(act.bytes(), hex!("0000fff400001000800000805f9b34fb"));
    }

    #[test]
    fn equality_ignores_case() {
        let a: Uuid = "ebe0ccc1-7a0a-4b0c-8a1a-6ff2997da3a6".parse().unwrap();
        let b: Uuid = "EBE0CCC1-7A0A-4B0C-8A1A-6FF2997DA3A6".parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn parse_fail() {
        let data = &[
            "",
            "0",
            "00000000_0000-0000-0000-000000000000",
            "00000000-0000*0000-0000-000000000000",
            "00000000-0000-0000+0000-000000000000",
            "00000000-0000-0000-0000~000000000000",
            "00000000-0000-00z0-0000-000000000000",
            "00000000-0000-0000-0000-_00000000000",
            "000000000000-0000-0000-0000-00000000",
            "00000000000000000000000000000000",
        ];
        for &inp in data {
            assert!(inp.parse::<Uuid>().is_err(), "{}", inp);
        }
    }
}
