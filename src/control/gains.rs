// PID gain sets, validation, and hot reload
//
// Each controller reads its gains through a shared `GainHandle`. Updates from
// the gain store replace the whole (kp, ki, kd) triple in one swap, so a
// controller never evaluates with half-old, half-new gains.

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Controller names used as keys in the gain store
pub const ANGULAR_VELOCITY: &str = "angular velocity";
pub const LINEAR_VELOCITY: &str = "linear velocity";
pub const HEADING: &str = "heading";

#[derive(Debug, thiserror::Error)]
pub enum GainsError {
    #[error("gain `{field}` for controller `{name}` is not finite")]
    NotFinite { name: String, field: &'static str },

    #[error("failed to read gain file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse gain file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to parse gain update: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GainsError>;

/// Proportional, integral and derivative coefficients
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl PidGains {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        for (field, value) in [("kp", self.kp), ("ki", self.ki), ("kd", self.kd)] {
            if !value.is_finite() {
                return Err(GainsError::NotFinite {
                    name: name.to_string(),
                    field,
                });
            }
        }
        Ok(())
    }
}

/// Shared, atomically swappable gains for one controller
pub type GainHandle = Arc<ArcSwap<PidGains>>;

pub fn gain_handle(gains: PidGains) -> GainHandle {
    Arc::new(ArcSwap::from_pointee(gains))
}

/// Gain values keyed by controller name, as read from the gain store
///
/// TOML form:
/// ```toml
/// ["angular velocity"]
/// kp = 0.08
/// ki = 0.01
/// kd = 0.0
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GainTable {
    pub controllers: HashMap<String, PidGains>,
}

impl GainTable {
    /// Built-in gains, used until the store provides its own
    pub fn defaults() -> Self {
        let controllers = [
            (ANGULAR_VELOCITY, PidGains::new(0.08, 0.01, 0.0)),
            (LINEAR_VELOCITY, PidGains::new(0.15, 0.02, 0.0)),
            (HEADING, PidGains::new(1.5, 0.0, 0.05)),
        ]
        .into_iter()
        .map(|(name, gains)| (name.to_string(), gains))
        .collect();
        Self { controllers }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn get(&self, name: &str) -> Option<PidGains> {
        self.controllers.get(name).copied()
    }

    /// Reject the table if any entry is malformed
    pub fn validate(&self) -> Result<()> {
        for (name, gains) in &self.controllers {
            gains.validate(name)?;
        }
        Ok(())
    }
}

/// Name -> handle map shared by the gain subscriber and the controllers
#[derive(Debug, Clone, Default)]
pub struct GainRegistry {
    handles: HashMap<String, GainHandle>,
}

impl GainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller, returning the handle it should read from
    pub fn register(&mut self, name: &str, initial: PidGains) -> GainHandle {
        self.handles
            .entry(name.to_string())
            .or_insert_with(|| gain_handle(initial))
            .clone()
    }

    /// Apply a gain table from the store.
    ///
    /// The whole table is validated before anything is swapped; on error
    /// every controller keeps its previous gains. Returns the number of
    /// controllers updated.
    pub fn apply(&self, table: &GainTable) -> Result<usize> {
        table.validate()?;

        let mut updated = 0;
        for (name, gains) in &table.controllers {
            match self.handles.get(name) {
                Some(handle) => {
                    handle.store(Arc::new(*gains));
                    info!(
                        "Gains for {}: kp={}, ki={}, kd={}",
                        name, gains.kp, gains.ki, gains.kd
                    );
                    updated += 1;
                }
                None => warn!("Ignoring gains for unknown controller '{}'", name),
            }
        }
        Ok(updated)
    }
}
