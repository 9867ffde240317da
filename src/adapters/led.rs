//! Sysfs LED class adapter (`/sys/class/leds/<name>`).

use std::path::{Path, PathBuf};

use log::debug;

use crate::app::ports::LedChannel;
use crate::error::{AdapterError, ConfigError};

use super::registry::{Claim, ResourceRegistry};
use super::utils::{display, read_attr, setup_attr, write_attr};

pub struct SysfsLed {
    claim: Claim,
    brightness: PathBuf,
}

impl SysfsLed {
    /// Claim the LED and detach it from any kernel trigger.
    pub fn open(registry: &ResourceRegistry, class_root: &Path, name: &str) -> Result<Self, ConfigError> {
        let dir = class_root.join("leds").join(name);
        let claim = registry.claim(display(&dir))?;
        if !dir.is_dir() {
            return Err(ConfigError::Unavailable {
                resource: display(&dir),
                reason: "no such LED".into(),
            });
        }
        setup_attr(&dir.join("trigger"), "none")?;
        debug!("opened {}", display(&dir));
        Ok(Self {
            claim,
            brightness: dir.join("brightness"),
        })
    }
}

impl LedChannel for SysfsLed {
    fn path(&self) -> &str {
        self.claim.path()
    }

    /// The kernel clamps to `max_brightness`; the value read back is the
    /// one in effect.
    async fn write(&mut self, brightness: u32) -> Result<u32, AdapterError> {
        write_attr(&self.brightness, brightness)?;
        read_attr(&self.brightness)
    }
}
