//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing every component event through the
//! `log` facade. The controller relay would implement the same trait.

use log::{info, warn};

use crate::app::events::DeviceEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`DeviceEvent`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &DeviceEvent) {
        match event {
            DeviceEvent::StateChanged { addr, data, time } => {
                info!(
                    "STATE | {addr} | {} | {}",
                    time.format("%H:%M:%S%.3f"),
                    serde_json::Value::Object(data.clone())
                );
            }
            DeviceEvent::Warning {
                addr,
                message,
                time,
            } => {
                warn!("WARN  | {addr} | {} | {message}", time.format("%H:%M:%S%.3f"));
            }
        }
    }
}
