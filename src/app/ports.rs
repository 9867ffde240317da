//! Port traits: the hexagonal boundary between components and hardware.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Device component (domain)
//! ```
//!
//! Driven adapters (GPIO lines, LED channels, PWM channels, event sinks,
//! clocks) implement these traits. Components consume them via generics,
//! so the state machines never touch sysfs directly and can be driven by
//! the dummy adapters in tests or on a bench without a cape attached.
//!
//! ## Ownership
//!
//! Every adapter owns exactly one physical resource, claimed through the
//! [`ResourceRegistry`](crate::adapters::registry::ResourceRegistry) when
//! it is opened. Adapters are moved into the component that uses them and
//! are never shared.
//!
//! ## Failure
//!
//! Adapter operations fail with [`AdapterError`]. Adapters never retry.

use chrono::{DateTime, Utc};
use core::time::Duration;

use crate::error::AdapterError;

use super::events::DeviceEvent;

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → subscribers)
// ───────────────────────────────────────────────────────────────

/// Components emit [`DeviceEvent`]s through this port. Sinks decide where
/// they go (log, relay to the controller, test recorder, ...).
pub trait EventSink {
    fn emit(&mut self, event: &DeviceEvent);
}

// ───────────────────────────────────────────────────────────────
// GPIO port
// ───────────────────────────────────────────────────────────────

/// Logic level of a digital line (after any active-low inversion).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn from_bit(bit: u8) -> Self {
        if bit == 0 { Self::Low } else { Self::High }
    }

    pub fn as_bit(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::High => 1,
        }
    }
}

/// Which transitions an edge watch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
    Both,
}

impl Edge {
    /// Whether the transition `from -> to` matches this edge.
    pub fn matches(self, from: Level, to: Level) -> bool {
        match self {
            Self::Rising => from == Level::Low && to == Level::High,
            Self::Falling => from == Level::High && to == Level::Low,
            Self::Both => from != to,
        }
    }

    /// Value written to a sysfs `edge` attribute.
    pub fn as_sysfs(self) -> &'static str {
        match self {
            Self::Rising => "rising",
            Self::Falling => "falling",
            Self::Both => "both",
        }
    }
}

/// One digital line.
#[allow(async_fn_in_trait)]
pub trait GpioLine {
    type Watch: EdgeWatch;

    /// Device path of the owned resource.
    fn path(&self) -> &str;

    async fn read(&mut self) -> Result<Level, AdapterError>;

    async fn write(&mut self, level: Level) -> Result<(), AdapterError>;

    /// Start delivering transitions matching `edge`.
    fn watch(&mut self, edge: Edge) -> Result<Self::Watch, AdapterError>;
}

/// A cancellable edge subscription on one line.
///
/// `changed` is cancel-safe: dropping the future before it resolves loses
/// no transition. After [`close`](EdgeWatch::close) returns, `changed`
/// never resolves again.
#[allow(async_fn_in_trait)]
pub trait EdgeWatch {
    /// Wait for the next matching transition and return the new level.
    async fn changed(&mut self) -> Result<Level, AdapterError>;

    /// Stop delivery. Idempotent.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// PWM port (feeder hoppers)
// ───────────────────────────────────────────────────────────────

/// One PWM output channel. Duty values are percentages (0–100).
#[allow(async_fn_in_trait)]
pub trait PwmChannel {
    fn path(&self) -> &str;

    /// Output `duty` for `duration`, then settle at `hold_duty`.
    ///
    /// Resolves once the hold duty is in effect.
    async fn pulse(&mut self, duty: u8, duration: Duration, hold_duty: u8)
    -> Result<(), AdapterError>;

    /// Set a constant duty.
    async fn duty(&mut self, duty: u8) -> Result<(), AdapterError>;
}

// ───────────────────────────────────────────────────────────────
// LED brightness port (house lights, cue LEDs)
// ───────────────────────────────────────────────────────────────

#[allow(async_fn_in_trait)]
pub trait LedChannel {
    fn path(&self) -> &str;

    /// Write a brightness and return the value the device actually applied
    /// (the device may clamp to its maximum).
    async fn write(&mut self, brightness: u32) -> Result<u32, AdapterError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Wall-clock source for the daylight model.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}
