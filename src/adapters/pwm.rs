//! Sysfs PWM adapter (`/sys/class/pwm/pwmchipN/pwmM`) for the feeder
//! hoppers.
//!
//! Duty is given to the port in percent and written to the kernel in
//! nanoseconds of the configured period.

use core::time::Duration;
use std::path::{Path, PathBuf};

use async_io_mini::Timer;
use log::debug;

use crate::app::ports::PwmChannel;
use crate::error::{AdapterError, ConfigError};

use super::registry::{Claim, ResourceRegistry};
use super::utils::{display, ensure_exported, setup_attr, write_attr};

/// PWM channel wired to a named hopper.
pub fn hopper_channel(name: &str) -> Option<u32> {
    match name {
        "starboard:hopper:left" => Some(1),
        "starboard:hopper:right" => Some(0),
        _ => None,
    }
}

pub struct SysfsPwm {
    claim: Claim,
    duty_cycle: PathBuf,
    period_ns: u64,
}

impl SysfsPwm {
    /// Claim, export and enable `channel` of `pwmchip<chip>`, starting at
    /// zero duty.
    pub fn open(
        registry: &ResourceRegistry,
        class_root: &Path,
        chip: u32,
        channel: u32,
        period_ns: u64,
    ) -> Result<Self, ConfigError> {
        let chip_dir = class_root.join("pwm").join(format!("pwmchip{chip}"));
        let dir = chip_dir.join(format!("pwm{channel}"));
        let claim = registry.claim(display(&dir))?;
        ensure_exported(&chip_dir, &dir, channel)?;
        setup_attr(&dir.join("period"), period_ns)?;
        setup_attr(&dir.join("duty_cycle"), 0)?;
        setup_attr(&dir.join("enable"), 1)?;
        debug!("opened {} (period {period_ns} ns)", display(&dir));
        Ok(Self {
            claim,
            duty_cycle: dir.join("duty_cycle"),
            period_ns,
        })
    }

    fn duty_ns(&self, percent: u8) -> u64 {
        self.period_ns * u64::from(percent.min(100)) / 100
    }
}

impl PwmChannel for SysfsPwm {
    fn path(&self) -> &str {
        self.claim.path()
    }

    async fn pulse(
        &mut self,
        duty: u8,
        duration: Duration,
        hold_duty: u8,
    ) -> Result<(), AdapterError> {
        write_attr(&self.duty_cycle, self.duty_ns(duty))?;
        Timer::after(duration).await;
        write_attr(&self.duty_cycle, self.duty_ns(hold_duty))
    }

    async fn duty(&mut self, duty: u8) -> Result<(), AdapterError> {
        write_attr(&self.duty_cycle, self.duty_ns(duty))
    }
}
