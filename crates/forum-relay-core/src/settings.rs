//! Runtime enablement flag and write credential
//!
//! The relay reads these on every delivery so a toggle takes effect on the
//! next event without a restart.

use std::sync::{Arc, RwLock};

/// Source of the enablement flag and write key.
pub trait SettingsSource: Send + Sync + 'static {
    /// Whether delivery should happen at all.
    fn enabled(&self) -> bool;

    /// Current write key for the ingestion endpoint.
    fn write_key(&self) -> String;
}

#[derive(Debug, Clone, Default)]
struct Snapshot {
    enabled: bool,
    write_key: String,
}

/// In-process settings that can be flipped at runtime.
///
/// Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<Snapshot>>,
}

impl SharedSettings {
    /// Create settings with an initial state.
    pub fn new(enabled: bool, write_key: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Snapshot {
                enabled,
                write_key: write_key.into(),
            })),
        }
    }

    /// Turn delivery on or off.
    pub fn set_enabled(&self, enabled: bool) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        guard.enabled = enabled;
        tracing::info!(enabled, "Analytics relay toggled");
    }

    /// Replace the write key.
    pub fn set_write_key(&self, write_key: impl Into<String>) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        guard.write_key = write_key.into();
    }
}

impl SettingsSource for SharedSettings {
    fn enabled(&self) -> bool {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).enabled
    }

    fn write_key(&self) -> String {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .write_key
            .clone()
    }
}
