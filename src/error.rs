use std::fmt;
use std::time::Duration;

use crate::address::AddressParseError;
use crate::uuid::UuidParseError;

#[derive(Clone, Debug)]
pub struct Error {
    kind: ErrorKind,
    description: String,
    elapsed: Option<Duration>,
}

impl Error {
    pub fn new(kind: ErrorKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            elapsed: None,
        }
    }

    /// Error for a capability the active backend doesn't implement.
    pub fn unsupported(operation: &str) -> Self {
        Self::new(ErrorKind::UnsupportedOperation,
            format!("{} is not supported by this backend", operation))
    }

    pub(in crate) fn no_response(elapsed: Duration) -> Self {
        Self {
            kind: ErrorKind::NoResponse,
            description: format!("timed out after {:.2} seconds", elapsed.as_secs_f64()),
            elapsed: Some(elapsed),
        }
    }

    /// Reclassifies a backend failure as `kind`, keeping the backend's description.
    /// Unsupported-operation errors keep their kind.
    pub(in crate) fn reclassify(self, kind: ErrorKind) -> Self {
        if self.kind == ErrorKind::UnsupportedOperation {
            return self;
        }
        Self {
            kind,
            ..self
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// How long the write-wait protocol waited before giving up. Only set for
    /// [`ErrorKind::NoResponse`].
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.description)
    }
}

impl std::error::Error for Error {}

impl From<UuidParseError> for Error {
    fn from(e: UuidParseError) -> Self {
        Self::new(ErrorKind::InvalidIdentifier, e.to_string())
    }
}

impl From<AddressParseError> for Error {
    fn from(e: AddressParseError) -> Self {
        Self::new(ErrorKind::InvalidArgument, e.to_string())
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Failure reported by the backend that has no more specific kind.
    Other,

    /// The characteristic UUID is malformed or the backend couldn't resolve it to a handle.
    InvalidIdentifier,

    /// A precondition on the call arguments was violated.
    InvalidArgument,

    /// The device couldn't be reached before the connect timeout elapsed.
    ConnectionFailed,

    /// The backend returned no value for a characteristic read.
    ReadFailed,

    /// The backend rejected a characteristic write.
    WriteFailed,

    /// The expected notifications didn't arrive before the response timeout.
    NoResponse,

    /// Every signal strength reading returned the known-bad sentinel value.
    SignalStrengthUnavailable,

    /// The active backend doesn't implement the requested capability.
    UnsupportedOperation,
}
