//! Component parameters and the apparatus configuration file.
//!
//! Each device variant has a params struct whose `Default` impl holds the
//! documented defaults. Caller overrides are overlaid once, at
//! construction, with [`Params::merged`]; there is no setter afterwards.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

/// A params struct with documented defaults.
pub trait Params: Serialize + DeserializeOwned + Default {
    /// Range checks run after every merge.
    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Overlay `overrides` (a JSON object, or null for none) on the
    /// defaults. The overlay is shallow: a supplied field replaces the
    /// default wholesale. Unknown fields are rejected.
    fn merged(overrides: &Value) -> Result<Self, ConfigError> {
        let mut base = serde_json::to_value(Self::default())
            .map_err(|e| ConfigError::Malformed(e.to_string()))?;
        match overrides {
            Value::Null => {}
            Value::Object(fields) => {
                let Value::Object(defaults) = &mut base else {
                    return Err(ConfigError::Malformed("params are not an object".into()));
                };
                for (name, value) in fields {
                    let Some(slot) = defaults.get_mut(name) else {
                        return Err(ConfigError::UnknownParam(name.clone()));
                    };
                    *slot = value.clone();
                }
            }
            other => {
                return Err(ConfigError::Malformed(format!(
                    "expected an object of overrides, got {other}"
                )));
            }
        }
        let params: Self =
            serde_json::from_value(base).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }
}

// ---------------------------------------------------------------------------
// Feeder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedMode {
    /// High-duty pulse, then a lower sustaining duty.
    PulseHold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeederParams {
    /// Hopper name (`starboard:hopper:left` / `starboard:hopper:right`).
    pub device: String,
    pub mode: FeedMode,
    /// Pulse length in milliseconds.
    pub pulse_dur: u64,
    /// Pulse duty (0-100%).
    pub pulse_duty: u8,
    /// Sustaining duty after the pulse (0-100%).
    pub hold_duty: u8,
    pub pwm_chip: u32,
    pub pwm_period_ns: u64,
}

impl Default for FeederParams {
    fn default() -> Self {
        Self {
            device: "starboard:hopper:left".into(),
            mode: FeedMode::PulseHold,
            pulse_dur: 100,
            pulse_duty: 35,
            hold_duty: 10,
            pwm_chip: 0,
            pwm_period_ns: 1_000_000, // 1 kHz
        }
    }
}

impl Params for FeederParams {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.device.is_empty() {
            return Err(ConfigError::invalid("device", "must not be empty"));
        }
        if self.pulse_duty > 100 {
            return Err(ConfigError::invalid("pulse_duty", "must be 0-100"));
        }
        if self.hold_duty > 100 {
            return Err(ConfigError::invalid("hold_duty", "must be 0-100"));
        }
        if self.pulse_dur == 0 {
            return Err(ConfigError::invalid("pulse_dur", "must be > 0"));
        }
        if self.pwm_period_ns == 0 {
            return Err(ConfigError::invalid("pwm_period_ns", "must be > 0"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Lights
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightsParams {
    /// LED class device name.
    pub device: String,
    pub max_brightness: u32,
    /// Clock recompute period in milliseconds.
    pub clock_interval: u64,
    /// Use the solar ephemeris (true) or the synthetic day model (false).
    pub ephemera: bool,
    pub lat: f64,
    pub lon: f64,
    /// Synthetic model: local hour of dawn.
    pub day_start: f64,
    /// Synthetic model: local hour of dusk.
    pub day_stop: f64,
}

impl Default for LightsParams {
    fn default() -> Self {
        Self {
            device: "starboard::lights".into(),
            max_brightness: 255,
            clock_interval: 600_000, // 10 min
            ephemera: true,
            lat: 38.03,
            lon: -78.51,
            day_start: 7.0,
            day_stop: 19.0,
        }
    }
}

impl Params for LightsParams {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.device.is_empty() {
            return Err(ConfigError::invalid("device", "must not be empty"));
        }
        if self.max_brightness == 0 {
            return Err(ConfigError::invalid("max_brightness", "must be > 0"));
        }
        if self.clock_interval == 0 {
            return Err(ConfigError::invalid("clock_interval", "must be > 0"));
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(ConfigError::invalid("lat", "must be within [-90, 90]"));
        }
        if !(-180.0..=180.0).contains(&self.lon) {
            return Err(ConfigError::invalid("lon", "must be within [-180, 180]"));
        }
        for (field, hour) in [("day_start", self.day_start), ("day_stop", self.day_stop)] {
            if !(0.0..24.0).contains(&hour) {
                return Err(ConfigError::invalid(field, "must be an hour in [0, 24)"));
            }
        }
        if (self.day_start - self.day_stop).abs() < f64::EPSILON {
            return Err(ConfigError::invalid("day_stop", "must differ from day_start"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Key panel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPanelParams {
    /// GPIO chip whose `base` the keymap offsets are relative to.
    pub device: String,
    /// Absolute number of the shared active-low interrupt line.
    pub interrupt_gpio: u32,
    /// Key name to line offset within `device`.
    pub keymap: BTreeMap<String, u32>,
    /// Edge-watch poll period in milliseconds.
    pub poll_interval: u64,
}

impl Default for KeyPanelParams {
    fn default() -> Self {
        Self {
            device: "/sys/class/gpio/gpiochip496".into(),
            interrupt_gpio: 48,
            keymap: BTreeMap::from([
                ("peck_left".into(), 13),
                ("peck_center".into(), 14),
                ("peck_right".into(), 15),
            ]),
            poll_interval: 5,
        }
    }
}

impl Params for KeyPanelParams {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.keymap.is_empty() {
            return Err(ConfigError::invalid("keymap", "must name at least one key"));
        }
        if self.keymap.keys().any(String::is_empty) {
            return Err(ConfigError::invalid("keymap", "key names must not be empty"));
        }
        let mut offsets: Vec<u32> = self.keymap.values().copied().collect();
        offsets.sort_unstable();
        offsets.dedup();
        if offsets.len() != self.keymap.len() {
            return Err(ConfigError::invalid("keymap", "two keys share a line"));
        }
        if self.poll_interval == 0 {
            return Err(ConfigError::invalid("poll_interval", "must be > 0"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Audio player
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioParams {
    /// ALSA device stimuli are played on.
    pub device: String,
}

impl Default for AudioParams {
    fn default() -> Self {
        Self {
            device: "default".into(),
        }
    }
}

impl Params for AudioParams {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.device.is_empty() {
            return Err(ConfigError::invalid("device", "must not be empty"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Apparatus file
// ---------------------------------------------------------------------------

/// One configured component: its driver and param overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "driver", rename_all = "lowercase")]
pub enum ComponentConfig {
    Feeder {
        #[serde(default)]
        params: Value,
    },
    Lights {
        #[serde(default)]
        params: Value,
    },
    Keys {
        #[serde(default)]
        params: Value,
    },
    Aplayer {
        #[serde(default)]
        params: Value,
    },
}

/// The daemon's configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApparatusConfig {
    /// Drive dummy adapters instead of sysfs.
    #[serde(default)]
    pub dummy: bool,
    /// Root of the sysfs class tree.
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: PathBuf,
    /// Components keyed by address.
    #[serde(default)]
    pub components: BTreeMap<String, ComponentConfig>,
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from("/sys/class")
}

impl Default for ApparatusConfig {
    fn default() -> Self {
        Self {
            dummy: false,
            sysfs_root: default_sysfs_root(),
            components: BTreeMap::new(),
        }
    }
}

impl ApparatusConfig {
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("parsing apparatus config")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("loading {}", path.display()))
    }
}
