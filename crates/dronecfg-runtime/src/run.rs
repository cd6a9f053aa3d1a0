//! Typed view of a resolved training configuration.
//!
//! Only the keys a training driver, viewer and tracking client read are
//! typed; the composed `task`/`algo`/`sim`/`env` groups stay as JSON values.

use dronecfg_types::{ErrorCode, Group};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `max_iters`/`eval_interval`/`save_interval` value meaning "unbounded".
pub const UNBOUNDED: i64 = -1;

/// Top-level run parameters.
///
/// # Example
///
/// ```
/// use dronecfg_runtime::run::RunConfig;
///
/// let run = RunConfig::default();
/// assert!(run.validate().is_err()); // total_frames must be set
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    /// Disables the interactive viewer.
    pub headless: bool,

    /// Training horizon in environment steps.
    pub total_frames: i64,

    /// Training horizon in iterations; `-1` is unbounded.
    pub max_iters: i64,

    /// Evaluation cadence in iterations; `-1` disables.
    pub eval_interval: i64,

    /// Checkpoint cadence in iterations; `-1` disables.
    pub save_interval: i64,

    pub seed: i64,

    pub viewer: ViewerConfig,

    pub wandb: WandbConfig,

    pub task: serde_json::Value,
    pub algo: serde_json::Value,
    pub sim: serde_json::Value,
    pub env: serde_json::Value,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            headless: false,
            total_frames: 0,
            max_iters: UNBOUNDED,
            eval_interval: UNBOUNDED,
            save_interval: UNBOUNDED,
            seed: 0,
            viewer: ViewerConfig::default(),
            wandb: WandbConfig::default(),
            task: serde_json::Value::Null,
            algo: serde_json::Value::Null,
            sim: serde_json::Value::Null,
            env: serde_json::Value::Null,
        }
    }
}

/// Camera and render settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewerConfig {
    pub resolution: [i64; 2],
    pub eye: [f64; 3],
    pub lookat: [f64; 3],
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            resolution: [960, 720],
            eye: [8.0, 0.0, 6.0],
            lookat: [0.0, 0.0, 1.0],
        }
    }
}

/// Experiment-tracking metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WandbConfig {
    pub group: Option<String>,
    pub run_name: Option<String>,
    pub job_type: Option<String>,
    pub entity: Option<String>,
    pub project: Option<String>,
    pub mode: Option<String>,
    pub run_id: Option<String>,
    pub monitor_gym: bool,
    pub tags: Option<Vec<String>>,
}

impl RunConfig {
    /// Reads the run parameters from a resolved tree.
    ///
    /// # Errors
    ///
    /// [`ValidationError::Schema`] if a key has the wrong type.
    pub fn from_tree(tree: &Group) -> Result<Self, ValidationError> {
        let json = serde_json::to_value(tree).map_err(|e| ValidationError::Schema(e.to_string()))?;
        serde_json::from_value(json).map_err(|e| ValidationError::Schema(e.to_string()))
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// The first out-of-range parameter.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.total_frames <= 0 {
            return Err(ValidationError::TotalFrames(self.total_frames));
        }

        for (field, value) in [
            ("max_iters", self.max_iters),
            ("eval_interval", self.eval_interval),
            ("save_interval", self.save_interval),
        ] {
            if value != UNBOUNDED && value <= 0 {
                return Err(ValidationError::Interval { field, value });
            }
        }

        let [width, height] = self.viewer.resolution;
        if width <= 0 || height <= 0 {
            return Err(ValidationError::Resolution { width, height });
        }

        Ok(())
    }
}

/// Run parameters that are well-typed but unusable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("run parameters do not match the expected types: {0}")]
    Schema(String),

    #[error("total_frames must be positive, got {0}")]
    TotalFrames(i64),

    #[error("{field} must be -1 or positive, got {value}")]
    Interval { field: &'static str, value: i64 },

    #[error("viewer.resolution must be positive, got {width}x{height}")]
    Resolution { width: i64, height: i64 },
}

impl ErrorCode for ValidationError {
    fn code(&self) -> &'static str {
        match self {
            Self::Schema(_) => "VALIDATION_SCHEMA",
            Self::TotalFrames(_) => "VALIDATION_TOTAL_FRAMES",
            Self::Interval { .. } => "VALIDATION_INTERVAL",
            Self::Resolution { .. } => "VALIDATION_RESOLUTION",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}
