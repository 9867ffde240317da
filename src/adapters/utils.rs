//! Shared sysfs attribute helpers for the GPIO, LED and PWM adapters.
//!
//! Every sysfs attribute is a small text file holding one value followed
//! by a newline.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{AdapterError, ConfigError};

/// Read an attribute and parse its trimmed contents.
pub(super) fn read_attr<T: FromStr>(path: &Path) -> Result<T, AdapterError> {
    let raw = fs::read_to_string(path).map_err(|e| AdapterError::io(display(path), e))?;
    raw.trim()
        .parse()
        .map_err(|_| AdapterError::invalid_value(display(path), raw.trim()))
}

pub(super) fn write_attr(path: &Path, value: impl ToString) -> Result<(), AdapterError> {
    fs::write(path, value.to_string()).map_err(|e| AdapterError::io(display(path), e))
}

/// Write an attribute during adapter setup, where failure means the
/// resource cannot be used at all.
pub(super) fn setup_attr(path: &Path, value: impl ToString) -> Result<(), ConfigError> {
    write_attr(path, value).map_err(|e| ConfigError::Unavailable {
        resource: display(path),
        reason: e.to_string(),
    })
}

/// Export `id` through `<class_dir>/export` unless `node` already exists.
pub(super) fn ensure_exported(class_dir: &Path, node: &Path, id: u32) -> Result<(), ConfigError> {
    if node.exists() {
        return Ok(());
    }
    setup_attr(&class_dir.join("export"), id)?;
    if node.exists() {
        Ok(())
    } else {
        Err(ConfigError::Unavailable {
            resource: display(node),
            reason: "not present after export".into(),
        })
    }
}

/// Rebase an absolute `/sys/class/...` path onto `root`.
pub fn rebase(root: &Path, path: &str) -> PathBuf {
    match Path::new(path).strip_prefix("/sys/class") {
        Ok(rest) => root.join(rest),
        Err(_) => PathBuf::from(path),
    }
}

pub(super) fn display(path: &Path) -> String {
    path.display().to_string()
}

/// Fresh empty directory under the system temp dir, removed on drop.
#[cfg(test)]
pub(crate) struct ScratchDir(PathBuf);

#[cfg(test)]
impl ScratchDir {
    pub(crate) fn new(name: &str) -> Self {
        use std::sync::atomic::{AtomicU32, Ordering};
        static NEXT: AtomicU32 = AtomicU32::new(0);
        let dir = std::env::temp_dir().join(format!(
            "starboard-{}-{}-{}",
            name,
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }
}

#[cfg(test)]
impl core::ops::Deref for ScratchDir {
    type Target = Path;

    fn deref(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}
