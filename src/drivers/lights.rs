//! House lights: manual brightness, or a clock that follows the sun.
//!
//! With `clock_on` set the lights recompute the sun's altitude every
//! `clock_interval` ms and write `max(0, round(max * sin(altitude)))`.
//! While the clock runs it owns the brightness; a `brightness` in a
//! request is ignored until the clock is turned off.

use core::time::Duration;

use chrono::{Local, Timelike};
use log::{debug, info};
use serde_json::{Map, Value, json};

use crate::app::meta::{Direction, Domain, Meta};
use crate::app::ports::{Clock, LedChannel};
use crate::app::service::{Context, Device};
use crate::config::LightsParams;
use crate::error::{ProtocolError, Result};

use super::sun::{brightness_for, is_daytime, solar_altitude, synthetic_altitude};
use super::{flag, to_object, whole};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightsTimer {
    /// Periodic daylight recompute.
    Clock,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct LightsState {
    brightness: u32,
    clock_on: bool,
    /// Radians.
    sun_altitude: f64,
    /// Unknown until the clock has run once.
    daytime: Option<bool>,
}

#[derive(Debug, Default)]
struct Patch {
    brightness: Option<u32>,
    clock_on: Option<bool>,
}

impl Patch {
    fn parse(data: &Map<String, Value>) -> core::result::Result<Self, ProtocolError> {
        let mut patch = Self::default();
        for (field, value) in data {
            match field.as_str() {
                "brightness" => {
                    let b = whole(field, value)?;
                    patch.brightness = Some(u32::try_from(b).unwrap_or(u32::MAX));
                }
                "clock_on" => patch.clock_on = Some(flag(field, value)?),
                other => debug!("lights ignore field {other:?}"),
            }
        }
        Ok(patch)
    }
}

pub struct Lights<L, C> {
    params: LightsParams,
    led: L,
    clock: C,
    meta: Meta,
    state: LightsState,
    defaults: LightsState,
}

impl<L: LedChannel, C: Clock> Lights<L, C> {
    pub fn new(params: LightsParams, led: L, clock: C) -> Self {
        info!("lights on {} (max {})", led.path(), params.max_brightness);
        let meta = Meta::new("lights", Direction::Output)
            .variable(
                "brightness",
                Domain::Range {
                    min: 0,
                    max: i64::from(params.max_brightness),
                },
            )
            .variable("clock_on", Domain::Boolean)
            .variable("sun_altitude", Domain::Float)
            .variable("daytime", Domain::Boolean);
        let state = LightsState {
            brightness: 128.min(params.max_brightness),
            clock_on: false,
            sun_altitude: 0.0,
            daytime: None,
        };
        Self {
            params,
            led,
            clock,
            meta,
            state,
            defaults: state,
        }
    }

    /// Sun altitude now, from the ephemeris or the synthetic day.
    fn altitude(&self) -> f64 {
        let now = self.clock.now();
        if self.params.ephemera {
            solar_altitude(now, self.params.lat, self.params.lon)
        } else {
            let local = now.with_timezone(&Local);
            let hour = f64::from(local.hour())
                + f64::from(local.minute()) / 60.0
                + f64::from(local.second()) / 3600.0;
            synthetic_altitude(hour, self.params.day_start, self.params.day_stop)
        }
    }

    /// Recompute from the sun and write. State is committed only after the
    /// LED confirms.
    async fn follow_sun(&mut self) -> Result<()> {
        let altitude = self.altitude();
        let target = brightness_for(altitude, self.params.max_brightness);
        debug!("sun at {altitude:.3} rad, brightness {target}");
        let applied = self.led.write(target).await?;
        self.state.brightness = applied;
        self.state.sun_altitude = altitude;
        self.state.daytime = Some(is_daytime(altitude));
        Ok(())
    }
}

impl<L: LedChannel, C: Clock> Device for Lights<L, C> {
    type Timer = LightsTimer;
    type Input = core::convert::Infallible;

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn params(&self) -> Value {
        to_object(&self.params)
    }

    fn state(&self) -> Map<String, Value> {
        let mut state = Map::new();
        state.insert("brightness".into(), json!(self.state.brightness));
        state.insert("clock_on".into(), json!(self.state.clock_on));
        state.insert("sun_altitude".into(), json!(self.state.sun_altitude));
        state.insert("daytime".into(), json!(self.state.daytime));
        state
    }

    async fn change_state(
        &mut self,
        ctx: &mut Context<'_, LightsTimer>,
        data: &Map<String, Value>,
    ) -> Result<()> {
        let patch = Patch::parse(data)?;
        let clock_on = patch.clock_on.unwrap_or(self.state.clock_on);

        if clock_on {
            if !self.state.clock_on {
                self.follow_sun().await?;
                ctx.timers.schedule_every(
                    LightsTimer::Clock,
                    Duration::from_millis(self.params.clock_interval),
                );
                self.state.clock_on = true;
            } else if patch.brightness.is_some() {
                debug!("{}: clock is on, ignoring brightness", ctx.addr());
            }
            return Ok(());
        }

        let applied = match patch.brightness {
            Some(b) if b != self.state.brightness => Some(self.led.write(b).await?),
            _ => None,
        };
        if self.state.clock_on {
            ctx.timers.cancel(LightsTimer::Clock);
            self.state.clock_on = false;
        }
        if let Some(b) = applied {
            self.state.brightness = b;
        }
        Ok(())
    }

    async fn reset_state(&mut self, ctx: &mut Context<'_, LightsTimer>) -> Result<()> {
        let applied = self.led.write(self.defaults.brightness).await?;
        ctx.timers.cancel(LightsTimer::Clock);
        self.state = LightsState {
            brightness: applied,
            ..self.defaults
        };
        Ok(())
    }

    async fn on_timer(&mut self, ctx: &mut Context<'_, LightsTimer>, timer: LightsTimer) -> Result<()> {
        match timer {
            LightsTimer::Clock if self.state.clock_on => {
                debug!("{}: clock tick", ctx.addr());
                self.follow_sun().await
            }
            LightsTimer::Clock => Ok(()),
        }
    }
}
