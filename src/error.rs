//! Unified error types for the apparatus runtime.
//!
//! A single [`Error`] enum that every subsystem converts into, keeping the
//! dispatch loop's error handling uniform. The three families map onto the
//! three ways a component can fail:
//!
//! | Family                | Raised by                  | Reported via            |
//! |-----------------------|----------------------------|-------------------------|
//! | [`AdapterError`]      | sysfs / dummy adapters     | `warning` event + reply |
//! | [`ProtocolError`]     | request parsing, dispatch  | reply only              |
//! | [`ConfigError`]       | params merge, registry     | construction aborts     |

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the runtime funnels into this type.
#[derive(Debug)]
pub enum Error {
    /// A hardware adapter read or write failed.
    Hardware(AdapterError),
    /// The request was unsupported, malformed, or could not be delivered.
    Protocol(ProtocolError),
    /// Parameters or resource ownership were invalid at construction.
    Config(ConfigError),
}

impl Error {
    /// Whether this error should also be published as a `warning` event.
    pub fn is_hardware(&self) -> bool {
        matches!(self, Self::Hardware(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hardware(e) => write!(f, "hardware: {e}"),
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Hardware(e) => Some(e),
            Self::Protocol(e) => Some(e),
            Self::Config(e) => Some(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Adapter (hardware I/O) errors
// ---------------------------------------------------------------------------

/// A failed operation on one hardware resource.
///
/// Adapters never retry; the error is surfaced to the owning component.
#[derive(Debug)]
pub struct AdapterError {
    /// Device path or name of the resource that failed.
    pub resource: String,
    pub kind: AdapterErrorKind,
}

#[derive(Debug)]
pub enum AdapterErrorKind {
    /// The underlying file or handle operation failed.
    Io(std::io::Error),
    /// The resource answered with something that could not be parsed.
    InvalidValue(String),
    /// The resource reported a failure of its own (e.g. a player exit code).
    Failed(String),
}

impl AdapterError {
    pub fn io(resource: impl Into<String>, err: std::io::Error) -> Self {
        Self {
            resource: resource.into(),
            kind: AdapterErrorKind::Io(err),
        }
    }

    pub fn invalid_value(resource: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            kind: AdapterErrorKind::InvalidValue(raw.into()),
        }
    }

    pub fn failed(resource: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            kind: AdapterErrorKind::Failed(msg.into()),
        }
    }
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            AdapterErrorKind::Io(e) => write!(f, "{}: {e}", self.resource),
            AdapterErrorKind::InvalidValue(raw) => {
                write!(f, "{}: unexpected value {raw:?}", self.resource)
            }
            AdapterErrorKind::Failed(msg) => write!(f, "{}: {msg}", self.resource),
        }
    }
}

impl std::error::Error for AdapterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            AdapterErrorKind::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AdapterError> for Error {
    fn from(e: AdapterError) -> Self {
        Self::Hardware(e)
    }
}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The request kind is not one of the five supported messages.
    Unsupported(String),
    /// The request payload has the wrong shape, type, or range.
    Malformed(String),
    /// No component is registered at the requested address.
    UnknownAddress(String),
    /// The component's request queue is full.
    Busy,
    /// The component has been disconnected.
    Disconnected,
    /// The request was dropped without being answered.
    NoReply,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported(kind) => write!(f, "invalid or unsupported REQ type: {kind}"),
            Self::Malformed(msg) => write!(f, "malformed request: {msg}"),
            Self::UnknownAddress(addr) => write!(f, "no component at address {addr}"),
            Self::Busy => write!(f, "component busy"),
            Self::Disconnected => write!(f, "component disconnected"),
            Self::NoReply => write!(f, "request dropped without reply"),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Fatal at construction time: no component instance is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An override names a field the params struct does not have.
    UnknownParam(String),
    /// A field failed range validation.
    InvalidParam { field: &'static str, reason: String },
    /// Overrides or the config file could not be deserialized.
    Malformed(String),
    /// The hardware resource is already owned by another adapter.
    ResourceInUse(String),
    /// The resource could not be opened or exported.
    Unavailable { resource: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParam {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownParam(name) => write!(f, "unknown parameter {name:?}"),
            Self::InvalidParam { field, reason } => write!(f, "invalid {field}: {reason}"),
            Self::Malformed(msg) => write!(f, "malformed parameters: {msg}"),
            Self::ResourceInUse(path) => write!(f, "{path} is already owned by another component"),
            Self::Unavailable { resource, reason } => write!(f, "{resource} unavailable: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
