//! Pulse-hold PWM feeder.
//!
//! ```text
//!            change-state{feeding:true}
//!   ┌──────┐ ── pulse, arm Stop ──────▶ ┌─────────┐
//!   │ Idle │                            │ Feeding │
//!   └──────┘ ◀── duty 0 ─────────────── └─────────┘
//!            Stop fired, or change-state{feeding:false} (disarms Stop)
//! ```
//!
//! A feed opens the hopper with a short high-duty pulse and holds it at a
//! lower duty until `interval` ms have passed.

use core::time::Duration;

use log::{debug, info};
use serde_json::{Map, Value, json};

use crate::app::meta::{Direction, Domain, Meta};
use crate::app::ports::PwmChannel;
use crate::app::service::{Context, Device};
use crate::config::FeederParams;
use crate::error::{ProtocolError, Result};

use super::{flag, to_object};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeederTimer {
    /// End of the current feed.
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FeederState {
    feeding: bool,
    /// Feed duration in milliseconds. Fractional values are allowed.
    interval: f64,
}

impl Default for FeederState {
    fn default() -> Self {
        Self {
            feeding: false,
            interval: 4000.0,
        }
    }
}

impl FeederState {
    fn interval(&self) -> Duration {
        Duration::from_nanos((self.interval * 1e6).round() as u64)
    }

    /// Whole milliseconds are reported as integers.
    fn interval_json(&self) -> Value {
        if self.interval.fract() == 0.0 && self.interval <= u64::MAX as f64 {
            json!(self.interval as u64)
        } else {
            json!(self.interval)
        }
    }
}

/// Fields of a `change-state` payload the feeder understands.
#[derive(Debug, Default)]
struct Patch {
    feeding: Option<bool>,
    interval: Option<f64>,
}

impl Patch {
    fn parse(data: &Map<String, Value>) -> core::result::Result<Self, ProtocolError> {
        let mut patch = Self::default();
        for (field, value) in data {
            match field.as_str() {
                "feeding" => patch.feeding = Some(flag(field, value)?),
                "interval" => match value.as_f64() {
                    Some(ms) if ms.is_finite() && ms > 0.0 => patch.interval = Some(ms),
                    _ => {
                        return Err(ProtocolError::Malformed(format!(
                            "interval: expected a number of milliseconds > 0, got {value}"
                        )));
                    }
                },
                other => debug!("feeder ignores unknown field {other:?}"),
            }
        }
        Ok(patch)
    }
}

pub struct Feeder<P> {
    params: FeederParams,
    pwm: P,
    meta: Meta,
    state: FeederState,
    defaults: FeederState,
}

impl<P: PwmChannel> Feeder<P> {
    pub fn new(params: FeederParams, pwm: P) -> Self {
        info!("{} feeder on {}", params.device, pwm.path());
        let meta = Meta::new("feeder", Direction::Output)
            .variable("feeding", Domain::Boolean)
            .variable("interval", Domain::Float);
        let state = FeederState::default();
        Self {
            params,
            pwm,
            meta,
            state,
            defaults: state,
        }
    }

    pub fn params(&self) -> &FeederParams {
        &self.params
    }

    async fn start_feed(&mut self, ctx: &mut Context<'_, FeederTimer>, interval: Duration) -> Result<()> {
        let p = &self.params;
        self.pwm
            .pulse(p.pulse_duty, Duration::from_millis(p.pulse_dur), p.hold_duty)
            .await?;
        ctx.timers.schedule_once(FeederTimer::Stop, interval);
        self.state.feeding = true;
        Ok(())
    }

    async fn stop_feed(&mut self, ctx: &mut Context<'_, FeederTimer>) -> Result<()> {
        self.pwm.duty(0).await?;
        ctx.timers.cancel(FeederTimer::Stop);
        self.state.feeding = false;
        Ok(())
    }
}

impl<P: PwmChannel> Device for Feeder<P> {
    type Timer = FeederTimer;
    type Input = core::convert::Infallible;

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn params(&self) -> Value {
        to_object(&self.params)
    }

    fn state(&self) -> Map<String, Value> {
        let mut state = Map::new();
        state.insert("feeding".into(), json!(self.state.feeding));
        state.insert("interval".into(), self.state.interval_json());
        state
    }

    async fn change_state(
        &mut self,
        ctx: &mut Context<'_, FeederTimer>,
        data: &Map<String, Value>,
    ) -> Result<()> {
        let patch = Patch::parse(data)?;
        let next = FeederState {
            interval: patch.interval.unwrap_or(self.state.interval),
            ..self.state
        };
        match patch.feeding {
            Some(true) if !self.state.feeding => self.start_feed(ctx, next.interval()).await?,
            Some(false) if self.state.feeding => self.stop_feed(ctx).await?,
            _ => {}
        }
        self.state.interval = next.interval;
        Ok(())
    }

    async fn reset_state(&mut self, ctx: &mut Context<'_, FeederTimer>) -> Result<()> {
        // always rewrite zero duty, even when already idle
        self.stop_feed(ctx).await?;
        self.state = self.defaults;
        Ok(())
    }

    async fn on_timer(&mut self, ctx: &mut Context<'_, FeederTimer>, timer: FeederTimer) -> Result<()> {
        match timer {
            FeederTimer::Stop if self.state.feeding => {
                debug!("{}: feed interval elapsed", ctx.addr());
                self.stop_feed(ctx).await
            }
            FeederTimer::Stop => Ok(()),
        }
    }

    /// Never leave the hopper powered after a disconnect.
    async fn release(&mut self, ctx: &mut Context<'_, FeederTimer>) -> Result<()> {
        if self.state.feeding {
            info!("{}: stopping feed on disconnect", ctx.addr());
            self.stop_feed(ctx).await?;
        }
        Ok(())
    }
}
