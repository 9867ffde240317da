//! Sysfs GPIO adapter (`/sys/class/gpio/gpioN`).
//!
//! The line is exported on open if the kernel has not exported it yet.
//! Edge watches poll the `value` attribute at a fixed period instead of
//! blocking in `poll(2)`, which keeps them on the single-threaded
//! executor and makes `close` trivially synchronous.
//!
//! Edges are detected by comparing consecutive samples. A pulse that
//! starts and ends between two samples is not seen, and a line that
//! bounces within one period reports at most one edge. The expander's
//! interrupt stays asserted until its inputs are read, so the key panel
//! does not lose presses to this.

use core::time::Duration;
use std::path::{Path, PathBuf};

use async_io_mini::Timer;
use log::debug;

use crate::app::ports::{Edge, EdgeWatch, GpioLine, Level};
use crate::error::{AdapterError, ConfigError};

use super::registry::{Claim, ResourceRegistry};
use super::utils::{display, ensure_exported, read_attr, setup_attr, write_attr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineDirection {
    In,
    Out,
}

impl LineDirection {
    fn as_sysfs(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

/// Read the `base` of a GPIO chip directory (`.../gpiochipN`).
pub fn chip_base(chip: &Path) -> Result<u32, ConfigError> {
    read_attr(&chip.join("base")).map_err(|e| ConfigError::Unavailable {
        resource: display(chip),
        reason: e.to_string(),
    })
}

pub struct SysfsGpio {
    claim: Claim,
    dir: PathBuf,
    value: PathBuf,
    poll_interval: Duration,
}

impl SysfsGpio {
    /// Claim and configure line `number` under `<class_root>/gpio`.
    pub fn open(
        registry: &ResourceRegistry,
        class_root: &Path,
        number: u32,
        direction: LineDirection,
        active_low: bool,
    ) -> Result<Self, ConfigError> {
        let class_dir = class_root.join("gpio");
        let dir = class_dir.join(format!("gpio{number}"));
        let claim = registry.claim(display(&dir))?;
        ensure_exported(&class_dir, &dir, number)?;
        setup_attr(&dir.join("direction"), direction.as_sysfs())?;
        setup_attr(&dir.join("active_low"), u8::from(active_low))?;
        debug!("opened {} ({})", display(&dir), direction.as_sysfs());
        Ok(Self {
            claim,
            value: dir.join("value"),
            dir,
            poll_interval: Duration::from_millis(5),
        })
    }

    /// Period at which watches sample the line.
    #[must_use]
    pub fn with_poll_interval(mut self, period: Duration) -> Self {
        self.poll_interval = period;
        self
    }
}

fn parse_level(value: &Path) -> Result<Level, AdapterError> {
    match read_attr::<u8>(value)? {
        0 => Ok(Level::Low),
        1 => Ok(Level::High),
        other => Err(AdapterError::invalid_value(display(value), other.to_string())),
    }
}

impl GpioLine for SysfsGpio {
    type Watch = SysfsEdgeWatch;

    fn path(&self) -> &str {
        self.claim.path()
    }

    async fn read(&mut self) -> Result<Level, AdapterError> {
        parse_level(&self.value)
    }

    async fn write(&mut self, level: Level) -> Result<(), AdapterError> {
        write_attr(&self.value, level.as_bit())
    }

    /// Also writes the line's `edge` attribute, so the kernel latches the
    /// interrupt the same way it would for a `poll(2)` reader. Detection
    /// itself only samples `value`.
    fn watch(&mut self, edge: Edge) -> Result<SysfsEdgeWatch, AdapterError> {
        write_attr(&self.dir.join("edge"), edge.as_sysfs())?;
        let last = parse_level(&self.value)?;
        Ok(SysfsEdgeWatch {
            value: self.value.clone(),
            edge,
            period: self.poll_interval,
            last,
            closed: false,
        })
    }
}

/// Polling edge watch on one sysfs line. Samples `value` every `period`.
pub struct SysfsEdgeWatch {
    value: PathBuf,
    edge: Edge,
    period: Duration,
    last: Level,
    closed: bool,
}

impl EdgeWatch for SysfsEdgeWatch {
    async fn changed(&mut self) -> Result<Level, AdapterError> {
        loop {
            if self.closed {
                return futures_lite::future::pending().await;
            }
            Timer::after(self.period).await;
            let now = parse_level(&self.value)?;
            let from = core::mem::replace(&mut self.last, now);
            if self.edge.matches(from, now) {
                return Ok(now);
            }
        }
    }

    fn close(&mut self) {
        if !self.closed {
            debug!("closed watch on {}", display(&self.value));
        }
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
