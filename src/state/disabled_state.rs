//! DisabledDevices - Administratively Disabled Robots
//!
//! A client-side cache persisted as a JSON list of devEui values. The
//! backend keeps no equivalent record, so the cache can drift from what the
//! robots actually do; it is only changed by explicit enable/disable.

use std::path::{Path, PathBuf};

use hashlink::LinkedHashSet;
use tracing::{debug, warn};

use crate::error::Result;
use crate::helpers::write_atomic;

#[derive(Debug, Clone, Default)]
pub struct DisabledDevices {
    ids: LinkedHashSet<String>,
    path: Option<PathBuf>,
}

impl DisabledDevices {
    /// Load from `path`; a missing or unreadable file starts empty
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let ids = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<Vec<String>>(&bytes).unwrap_or_else(|e| {
                warn!("Ignoring corrupt disabled-device cache {}: {e}", path.display());
                Vec::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!("Cannot read {}: {e}", path.display());
                Vec::new()
            }
        };
        debug!(count = ids.len(), "Loaded disabled devices");
        Self {
            ids: ids.into_iter().collect(),
            path: Some(path),
        }
    }

    /// In-memory only
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let list: Vec<&String> = self.ids.iter().collect();
        write_atomic(path, &serde_json::to_vec(&list)?)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn contains(&self, dev_eui: &str) -> bool {
        self.ids.contains(dev_eui)
    }

    /// Returns whether the set changed
    pub fn set_disabled(&mut self, dev_eui: &str, disabled: bool) -> bool {
        if disabled {
            self.ids.insert(dev_eui.to_string())
        } else {
            self.ids.remove(dev_eui)
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.ids.iter()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
