//! Run configuration
//!
//! Typed, validated configuration for a detection run. Unknown keys are
//! rejected when the file is parsed; cross-field requirements are checked
//! by [`RunConfig::validate`] before any tile is touched.

use demdelta_core::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Metric thresholds for the change classifier.
///
/// Every metric is optional; an absent metric is simply not evaluated.
/// All comparisons are strict greater-than.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricConfig {
    /// Mean per-pixel difference threshold
    pub mean: Option<f64>,
    /// Maximum per-pixel difference threshold
    pub maxima: Option<f64>,
    /// Sum-of-differences threshold
    pub sum: Option<f64>,
    /// `(value, count)`: fires when more than `count` pixels differ by more than `value`
    pub count_larger_than: Option<(f64, usize)>,
    /// `(value, fraction)`: fires when the fraction of pixels differing by
    /// more than `value` exceeds `fraction`
    pub percentage_larger_than: Option<(f64, f64)>,
}

impl MetricConfig {
    /// True when no metric is configured
    pub fn is_empty(&self) -> bool {
        self.mean.is_none()
            && self.maxima.is_none()
            && self.sum.is_none()
            && self.count_larger_than.is_none()
            && self.percentage_larger_than.is_none()
    }
}

fn default_change_list() -> PathBuf {
    PathBuf::from("changed.txt")
}

/// Configuration for a full detection run
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Root of the reference-epoch raster tiles
    pub reference_dir: PathBuf,
    /// Root of the target-epoch raster tiles
    pub target_dir: PathBuf,
    /// Metric thresholds
    pub metrics: MetricConfig,

    /// Destination root for archived raster pairs (required with `copy_tif`)
    #[serde(default)]
    pub save_dir: Option<PathBuf>,
    /// Root of the reference-epoch point clouds (required with `copy_las`)
    #[serde(default)]
    pub reference_las_dir: Option<PathBuf>,
    /// Root of the target-epoch point clouds (required with `copy_las`)
    #[serde(default)]
    pub target_las_dir: Option<PathBuf>,
    /// Destination root for archived point-cloud pairs (required with `copy_las`)
    #[serde(default)]
    pub save_las_dir: Option<PathBuf>,

    /// Archive the raster pair of every changed tile
    #[serde(default)]
    pub copy_tif: bool,
    /// Archive the point-cloud pair of every changed tile
    #[serde(default)]
    pub copy_las: bool,

    /// Worker pool size; 0 uses all available cores
    #[serde(default)]
    pub threads: usize,

    /// Change-list output file, one changed stem per line
    #[serde(default = "default_change_list")]
    pub change_list: PathBuf,
}

impl RunConfig {
    /// Load and validate a configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&text)
    }

    /// Parse and validate a configuration from YAML text
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: RunConfig =
            serde_yaml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field requirements
    pub fn validate(&self) -> Result<()> {
        if self.copy_tif && self.save_dir.is_none() {
            return Err(Error::Config(
                "copy_tif requires save_dir".to_string(),
            ));
        }
        if self.copy_las {
            for (name, dir) in [
                ("reference_las_dir", &self.reference_las_dir),
                ("target_las_dir", &self.target_las_dir),
                ("save_las_dir", &self.save_las_dir),
            ] {
                if dir.is_none() {
                    return Err(Error::Config(format!("copy_las requires {}", name)));
                }
            }
        }
        Ok(())
    }
}
