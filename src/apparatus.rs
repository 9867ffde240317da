//! Apparatus assembly: one running component per configured address.
//!
//! [`Apparatus::build`] merges each component's params, opens its
//! adapters (sysfs, or dummies in dummy mode), and spawns the component on
//! the executor with a clone of the shared [`Publisher`]. Requests from
//! the controller are routed by address.
//!
//! If `build` fails, components spawned before the failure are already on
//! the executor; the caller is expected to abort rather than run it.

use std::collections::BTreeMap;
use std::path::Path;

use core::time::Duration;

use edge_executor::LocalExecutor;
use log::{error, info};
use serde_json::Value;

use crate::adapters::audio::SoundPlayer;
use crate::adapters::dummy::{DummyGpio, DummyLed, DummyPwm, GpioBench, LedBench, PwmBench};
use crate::adapters::gpio::{LineDirection, SysfsGpio, chip_base};
use crate::adapters::led::SysfsLed;
use crate::adapters::pwm::{SysfsPwm, hopper_channel};
use crate::adapters::registry::ResourceRegistry;
use crate::adapters::time::SystemClock;
use crate::adapters::utils::rebase;
use crate::app::service::ComponentHandle;
use crate::config::{
    ApparatusConfig, AudioParams, ComponentConfig, FeederParams, KeyPanelParams, LightsParams,
    Params,
};
use crate::drivers::aplayer::AudioPlayer;
use crate::drivers::feeder::Feeder;
use crate::drivers::keypanel::KeyPanel;
use crate::drivers::lights::Lights;
use crate::error::{ConfigError, ProtocolError, Result};
use crate::events::Publisher;

/// Simulated hardware behind a dummy-mode component.
#[derive(Clone)]
pub enum Bench {
    Feeder(PwmBench),
    Lights(LedBench),
    Keys {
        keys: BTreeMap<String, GpioBench>,
        trigger: GpioBench,
    },
}

pub struct Apparatus {
    components: BTreeMap<String, ComponentHandle>,
    benches: BTreeMap<String, Bench>,
    registry: ResourceRegistry,
}

impl Apparatus {
    /// Build and spawn every configured component.
    pub fn build<'a>(
        config: &ApparatusConfig,
        executor: &LocalExecutor<'a>,
        publisher: &Publisher,
    ) -> core::result::Result<Self, ConfigError> {
        let mut apparatus = Self {
            components: BTreeMap::new(),
            benches: BTreeMap::new(),
            registry: ResourceRegistry::new(),
        };
        if config.dummy {
            info!("dummy mode: no hardware will be touched");
        }
        for (addr, component) in &config.components {
            apparatus
                .add(config, executor, publisher, addr, component)
                .inspect_err(|e| error!("{addr}: {e}"))?;
        }
        info!("apparatus ready with {} component(s)", apparatus.len());
        Ok(apparatus)
    }

    fn add<'a>(
        &mut self,
        config: &ApparatusConfig,
        executor: &LocalExecutor<'a>,
        publisher: &Publisher,
        addr: &str,
        component: &ComponentConfig,
    ) -> core::result::Result<(), ConfigError> {
        let root = config.sysfs_root.as_path();
        let sink = publisher.clone();
        let handle = match component {
            ComponentConfig::Feeder { params } => {
                let params = FeederParams::merged(params)?;
                if config.dummy {
                    let (pwm, bench) = DummyPwm::new(self.registry.claim(params.device.clone())?);
                    self.benches.insert(addr.to_owned(), Bench::Feeder(bench));
                    ComponentHandle::spawn(executor, addr, Feeder::new(params, pwm), sink)
                } else {
                    let pwm = self.open_pwm(root, &params)?;
                    ComponentHandle::spawn(executor, addr, Feeder::new(params, pwm), sink)
                }
            }
            ComponentConfig::Lights { params } => {
                let params = LightsParams::merged(params)?;
                if config.dummy {
                    let claim = self.registry.claim(params.device.clone())?;
                    let (led, bench) = DummyLed::new(claim, params.max_brightness);
                    self.benches.insert(addr.to_owned(), Bench::Lights(bench));
                    ComponentHandle::spawn(executor, addr, Lights::new(params, led, SystemClock), sink)
                } else {
                    let led = SysfsLed::open(&self.registry, root, &params.device)?;
                    ComponentHandle::spawn(executor, addr, Lights::new(params, led, SystemClock), sink)
                }
            }
            ComponentConfig::Keys { params } => {
                let params = KeyPanelParams::merged(params)?;
                if config.dummy {
                    let (panel, bench) = self.dummy_keys(params)?;
                    self.benches.insert(addr.to_owned(), bench);
                    ComponentHandle::spawn(executor, addr, panel, sink)
                } else {
                    let panel = self.sysfs_keys(root, params)?;
                    ComponentHandle::spawn(executor, addr, panel, sink)
                }
            }
            ComponentConfig::Aplayer { params } => {
                let params = AudioParams::merged(params)?;
                let claim = self.registry.claim(format!("alsa:{}", params.device))?;
                let mut player = SoundPlayer::new(params.device.clone());
                if config.dummy {
                    player = player.with_program("true");
                }
                let device = AudioPlayer::new(params, player, claim);
                ComponentHandle::spawn(executor, addr, device, sink)
            }
        };
        self.components.insert(addr.to_owned(), handle);
        Ok(())
    }

    fn open_pwm(&self, root: &Path, params: &FeederParams) -> core::result::Result<SysfsPwm, ConfigError> {
        let channel = hopper_channel(&params.device).ok_or_else(|| {
            ConfigError::invalid("device", format!("no hopper named {:?}", params.device))
        })?;
        SysfsPwm::open(&self.registry, root, params.pwm_chip, channel, params.pwm_period_ns)
    }

    fn dummy_keys(
        &self,
        params: KeyPanelParams,
    ) -> core::result::Result<(KeyPanel<DummyGpio>, Bench), ConfigError> {
        let mut lines = BTreeMap::new();
        let mut benches = BTreeMap::new();
        for (name, offset) in &params.keymap {
            let (line, bench) = DummyGpio::new(
                self.registry
                    .claim(format!("{}/gpio+{offset}", params.device))?,
            );
            lines.insert(name.clone(), line);
            benches.insert(name.clone(), bench);
        }
        let (trigger, trigger_bench) = DummyGpio::new(
            self.registry
                .claim(format!("gpio{}", params.interrupt_gpio))?,
        );
        let panel = KeyPanel::new(params, lines, trigger)?;
        Ok((
            panel,
            Bench::Keys {
                keys: benches,
                trigger: trigger_bench,
            },
        ))
    }

    fn sysfs_keys(
        &self,
        root: &Path,
        params: KeyPanelParams,
    ) -> core::result::Result<KeyPanel<SysfsGpio>, ConfigError> {
        let base = chip_base(&rebase(root, &params.device))?;
        let poll = Duration::from_millis(params.poll_interval);
        let mut lines = BTreeMap::new();
        for (name, offset) in &params.keymap {
            let number = base.checked_add(*offset).ok_or_else(|| {
                ConfigError::invalid(
                    "keymap",
                    format!("{name}: offset {offset} overflows chip base {base}"),
                )
            })?;
            let line = SysfsGpio::open(&self.registry, root, number, LineDirection::In, false)?
                .with_poll_interval(poll);
            lines.insert(name.clone(), line);
        }
        let trigger = SysfsGpio::open(
            &self.registry,
            root,
            params.interrupt_gpio,
            LineDirection::In,
            true,
        )?
        .with_poll_interval(poll);
        KeyPanel::new(params, lines, trigger)
    }

    /// Route a request to the component at `addr`.
    pub async fn req(&self, addr: &str, kind: &str, data: Value) -> Result<Value> {
        match self.components.get(addr) {
            Some(component) => component.req(kind, data).await,
            None => Err(ProtocolError::UnknownAddress(addr.to_owned()).into()),
        }
    }

    pub fn component(&self, addr: &str) -> Option<&ComponentHandle> {
        self.components.get(addr)
    }

    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Dummy-mode bench for `addr`.
    pub fn bench(&self, addr: &str) -> Option<&Bench> {
        self.benches.get(addr)
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Disconnect every component. Idempotent.
    pub async fn disconnect_all(&self) {
        for (addr, component) in &self.components {
            if component.is_connected() {
                info!("disconnecting {addr}");
            }
            component.disconnect().await;
        }
    }
}
