//! Outbound component events.
//!
//! The dispatch loop in [`service`](super::service) emits these through
//! the [`EventSink`](super::ports::EventSink) port. Sinks on the other side
//! decide what to do with them, usually logging them or relaying them to
//! the experiment controller.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Structured events published by device components.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum DeviceEvent {
    /// State changed; `data` holds only the fields that changed (the full
    /// state for the initial announcement).
    StateChanged {
        addr: String,
        data: Map<String, Value>,
        time: DateTime<Utc>,
    },

    /// Non-fatal operational problem.
    Warning {
        addr: String,
        message: String,
        time: DateTime<Utc>,
    },
}

impl DeviceEvent {
    pub fn state_changed(addr: &str, data: Map<String, Value>) -> Self {
        Self::StateChanged {
            addr: addr.to_owned(),
            data,
            time: Utc::now(),
        }
    }

    pub fn warning(addr: &str, message: impl Into<String>) -> Self {
        Self::Warning {
            addr: addr.to_owned(),
            message: message.into(),
            time: Utc::now(),
        }
    }

    /// Address of the component that emitted the event.
    pub fn addr(&self) -> &str {
        match self {
            Self::StateChanged { addr, .. } | Self::Warning { addr, .. } => addr,
        }
    }

    /// Changed fields, if this is a `state-changed` event.
    pub fn changed(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::StateChanged { data, .. } => Some(data),
            Self::Warning { .. } => None,
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, Self::Warning { .. })
    }
}
