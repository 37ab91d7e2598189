//! Calibration run configuration.
//!
//! The defaults are the build-time constants; a JSON file may overlay any
//! subset of fields.

use std::path::Path;
use std::time::Duration;

use camcal_core::{GridSize, Real, Resolution};
use camcal_detect::{SubPixParams, TermCriteria};
use camcal_solve::{SolverOptions, MIN_VIEWS};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Refinement settings as they appear in the config file.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubPixConfig {
    pub half_window: usize,
    pub max_iters: usize,
    pub epsilon: Real,
}

impl Default for SubPixConfig {
    fn default() -> Self {
        Self::from(SubPixParams::default())
    }
}

impl From<SubPixParams> for SubPixConfig {
    fn from(p: SubPixParams) -> Self {
        Self {
            half_window: p.half_window,
            max_iters: p.criteria.max_iters,
            epsilon: p.criteria.epsilon,
        }
    }
}

impl SubPixConfig {
    pub fn params(&self) -> SubPixParams {
        SubPixParams {
            half_window: self.half_window,
            criteria: TermCriteria {
                max_iters: self.max_iters,
                epsilon: self.epsilon,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Inner-vertex counts of the checkerboard.
    pub grid: GridSize,
    /// Distance between adjacent vertices, metres.
    pub square_size: Real,
    pub device_index: u32,
    pub resolution: Resolution,
    pub target_samples: usize,
    /// Minimum dwell between two accepted samples, seconds.
    pub debounce_secs: Real,
    /// RMS strictly below this passes, pixels.
    pub quality_threshold_rms: Real,
    pub subpix: SubPixConfig,
    pub solver: SolverOptions,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            grid: GridSize::new(10, 7),
            square_size: 0.025,
            device_index: 0,
            resolution: Resolution::new(640, 480),
            target_samples: 20,
            // Older notes mention 2 s; 1.5 s is the value the accept check has always used.
            debounce_secs: 1.5,
            quality_threshold_rms: 1.0,
            subpix: SubPixConfig::default(),
            solver: SolverOptions::default(),
        }
    }
}

impl CalibrationConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_secs_f64(self.debounce_secs.max(0.0))
    }

    /// Read a JSON file; missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: String| Err(ConfigError::Invalid(msg));

        if self.grid.cols < 2 || self.grid.rows < 2 {
            return fail(format!(
                "grid {} needs at least 2 vertices per axis",
                self.grid
            ));
        }
        if !(self.square_size.is_finite() && self.square_size > 0.0) {
            return fail(format!("square_size {} must be positive", self.square_size));
        }
        if self.resolution.is_empty() {
            return fail(format!("resolution {} is empty", self.resolution));
        }
        if self.target_samples < MIN_VIEWS {
            return fail(format!(
                "target_samples {} is below the solver minimum of {MIN_VIEWS} views",
                self.target_samples
            ));
        }
        if !(self.debounce_secs.is_finite() && self.debounce_secs >= 0.0) {
            return fail(format!(
                "debounce_secs {} must be non-negative",
                self.debounce_secs
            ));
        }
        if !(self.quality_threshold_rms.is_finite() && self.quality_threshold_rms > 0.0) {
            return fail(format!(
                "quality_threshold_rms {} must be positive",
                self.quality_threshold_rms
            ));
        }
        if self.subpix.half_window == 0 || self.subpix.max_iters == 0 {
            return fail("subpix window and iteration cap must be non-zero".into());
        }
        if !(self.subpix.epsilon.is_finite() && self.subpix.epsilon >= 0.0) {
            return fail(format!("subpix epsilon {} is invalid", self.subpix.epsilon));
        }
        if self.solver.max_iters == 0 {
            return fail("solver.max_iters must be at least 1".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let cfg = CalibrationConfig::default();
        cfg.validate().expect("defaults");
        assert_eq!(cfg.grid, GridSize::new(10, 7));
        assert_eq!(cfg.debounce(), Duration::from_millis(1500));
        assert_eq!(cfg.subpix.params(), SubPixParams::default());
    }

    #[test]
    fn rejects_bad_values() {
        let bad = [
            CalibrationConfig {
                grid: GridSize::new(1, 7),
                ..Default::default()
            },
            CalibrationConfig {
                square_size: 0.0,
                ..Default::default()
            },
            CalibrationConfig {
                target_samples: 0,
                ..Default::default()
            },
            CalibrationConfig {
                target_samples: 2,
                ..Default::default()
            },
            CalibrationConfig {
                debounce_secs: -1.0,
                ..Default::default()
            },
            CalibrationConfig {
                resolution: Resolution::new(0, 480),
                ..Default::default()
            },
            CalibrationConfig {
                quality_threshold_rms: f64::NAN,
                ..Default::default()
            },
        ];
        for cfg in bad {
            assert!(
                matches!(cfg.validate(), Err(ConfigError::Invalid(_))),
                "{cfg:?}"
            );
        }
    }

    #[test]
    fn target_below_solver_minimum_names_it() {
        let cfg = CalibrationConfig {
            target_samples: MIN_VIEWS - 1,
            ..Default::default()
        };
        let err = cfg.validate().expect_err("too few samples");
        assert!(err.to_string().contains("solver minimum of 3"), "{err}");

        let cfg = CalibrationConfig {
            target_samples: MIN_VIEWS,
            ..Default::default()
        };
        cfg.validate().expect("minimum is allowed");
    }

    #[test]
    fn json_overlays_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("tmp");
        write!(
            file,
            r#"{{"target_samples": 5, "grid": {{"cols": 9, "rows": 6}}, "subpix": {{"half_window": 3}}}}"#
        )
        .expect("write");

        let cfg = CalibrationConfig::from_json_file(file.path()).expect("parse");
        assert_eq!(cfg.target_samples, 5);
        assert_eq!(cfg.grid, GridSize::new(9, 6));
        assert_eq!(cfg.subpix.half_window, 3);
        assert_eq!(cfg.subpix.max_iters, 30);
        assert_eq!(cfg.debounce_secs, 1.5);
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            CalibrationConfig::from_json_file("/nonexistent/camcal.json"),
            Err(ConfigError::Io { .. })
        ));
    }
}
