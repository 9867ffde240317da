//! Single-owner registry of hardware resources.
//!
//! Every adapter claims the device path it drives when it is opened and
//! holds the [`Claim`] for as long as it lives. A second claim of the same
//! path fails, so no two components can address one resource.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::error::ConfigError;

type Claimed = Rc<RefCell<BTreeSet<String>>>;

/// Shared by every adapter built for one apparatus. Cloning shares the set.
#[derive(Clone, Default)]
pub struct ResourceRegistry {
    claimed: Claimed,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take exclusive ownership of `path` until the returned guard drops.
    pub fn claim(&self, path: impl Into<String>) -> Result<Claim, ConfigError> {
        let path = path.into();
        if !self.claimed.borrow_mut().insert(path.clone()) {
            return Err(ConfigError::ResourceInUse(path));
        }
        debug!("claimed {path}");
        Ok(Claim {
            path,
            claimed: self.claimed.clone(),
        })
    }

    pub fn is_claimed(&self, path: &str) -> bool {
        self.claimed.borrow().contains(path)
    }

    pub fn len(&self) -> usize {
        self.claimed.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.borrow().is_empty()
    }
}

impl fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.claimed.borrow().iter()).finish()
    }
}

/// Ownership of one resource path. Released on drop.
pub struct Claim {
    path: String,
    claimed: Claimed,
}

impl Claim {
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.claimed.borrow_mut().remove(&self.path);
        debug!("released {}", self.path);
    }
}

impl fmt::Debug for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Claim").field(&self.path).finish()
    }
}
