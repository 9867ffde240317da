//! Peck-key panel behind an i2c GPIO expander.
//!
//! The expander exposes one GPIO line per key and raises a shared
//! active-low interrupt line when any key changes. On each interrupt
//! every key is re-read. All keys that changed in one pass are published
//! together in a single `state-changed`, the same as a simulated press
//! through `change-state`.

use std::collections::BTreeMap;

use log::{debug, info};
use serde_json::{Map, Value, json};

use crate::app::meta::{Direction, Domain, Meta};
use crate::app::ports::{Edge, EdgeWatch, GpioLine, Level};
use crate::app::service::{Context, Device};
use crate::config::KeyPanelParams;
use crate::error::{AdapterError, ConfigError, Result};

use super::{flag, to_object};

pub struct KeyPanel<G: GpioLine> {
    params: KeyPanelParams,
    keys: BTreeMap<String, G>,
    /// Held so the interrupt line stays claimed while it is watched.
    trigger: G,
    watch: Option<G::Watch>,
    /// Set while the interrupt line cannot be read.
    trigger_fault: bool,
    meta: Meta,
    state: BTreeMap<String, u8>,
}

impl<G: GpioLine> KeyPanel<G> {
    /// `keys` must hold one line per `params.keymap` entry. Starts
    /// watching `trigger` for rising edges.
    pub fn new(
        params: KeyPanelParams,
        keys: BTreeMap<String, G>,
        mut trigger: G,
    ) -> core::result::Result<Self, ConfigError> {
        if !keys.keys().eq(params.keymap.keys()) {
            return Err(ConfigError::invalid("keymap", "key lines do not match the keymap"));
        }
        let watch = trigger
            .watch(Edge::Rising)
            .map_err(|e| ConfigError::Unavailable {
                resource: trigger.path().to_owned(),
                reason: e.to_string(),
            })?;
        info!(
            "key panel: monitoring {} for {} key(s)",
            trigger.path(),
            keys.len()
        );

        let meta = keys.keys().fold(Meta::new("key", Direction::Input), |meta, name| {
            meta.variable(name.clone(), Domain::Levels(vec![0, 1]))
        });
        let state = keys.keys().map(|name| (name.clone(), 0)).collect();
        Ok(Self {
            params,
            keys,
            trigger,
            watch: Some(watch),
            trigger_fault: false,
            meta,
            state,
        })
    }

    pub fn is_watching(&self) -> bool {
        self.watch.as_ref().is_some_and(|w| !w.is_closed())
    }

    /// Re-read every key. A key that cannot be read keeps its cached value
    /// and is reported as a warning.
    async fn scan(&mut self, ctx: &mut Context<'_, core::convert::Infallible>) {
        for (name, line) in &mut self.keys {
            match line.read().await {
                Ok(level) => {
                    self.state.insert(name.clone(), level.as_bit());
                }
                Err(e) => ctx.warn(format!("error reading from {name}: {e}")),
            }
        }
    }
}

impl<G: GpioLine> Device for KeyPanel<G> {
    type Timer = core::convert::Infallible;
    type Input = core::result::Result<Level, AdapterError>;

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn params(&self) -> Value {
        to_object(&self.params)
    }

    fn state(&self) -> Map<String, Value> {
        self.state
            .iter()
            .map(|(name, level)| (name.clone(), json!(level)))
            .collect()
    }

    /// Simulated key presses. Unknown keys are ignored.
    async fn change_state(
        &mut self,
        _ctx: &mut Context<'_, Self::Timer>,
        data: &Map<String, Value>,
    ) -> Result<()> {
        let mut updates = Vec::new();
        for (name, value) in data {
            if self.state.contains_key(name) {
                updates.push((name.clone(), u8::from(flag(name, value)?)));
            } else {
                debug!("key panel has no key {name:?}");
            }
        }
        self.state.extend(updates);
        Ok(())
    }

    async fn reset_state(&mut self, _ctx: &mut Context<'_, Self::Timer>) -> Result<()> {
        for level in self.state.values_mut() {
            *level = 0;
        }
        Ok(())
    }

    async fn on_timer(
        &mut self,
        _ctx: &mut Context<'_, Self::Timer>,
        timer: Self::Timer,
    ) -> Result<()> {
        match timer {}
    }

    async fn next_input(&mut self) -> Self::Input {
        match self.watch.as_mut() {
            Some(watch) => watch.changed().await,
            None => futures_lite::future::pending().await,
        }
    }

    /// A failing interrupt line is reported once, when it starts failing.
    /// Further failures are only logged until a read succeeds again.
    async fn on_input(&mut self, ctx: &mut Context<'_, Self::Timer>, input: Self::Input) -> Result<()> {
        match input {
            Err(e) if self.trigger_fault => {
                debug!("{}: interrupt line still failing: {e}", ctx.addr());
                Ok(())
            }
            Err(e) => {
                self.trigger_fault = true;
                Err(e.into())
            }
            Ok(_) => {
                if core::mem::take(&mut self.trigger_fault) {
                    info!("{}: interrupt line {} readable again", ctx.addr(), self.trigger.path());
                }
                self.scan(ctx).await;
                Ok(())
            }
        }
    }

    async fn release(&mut self, _ctx: &mut Context<'_, Self::Timer>) -> Result<()> {
        if let Some(mut watch) = self.watch.take() {
            watch.close();
            debug!("key panel: stopped monitoring {}", self.trigger.path());
        }
        Ok(())
    }
}
