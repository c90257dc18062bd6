//! Configuration structures for the highlight detection pipeline.
//!
//! Every knob has a documented default and can be overridden per call. Two
//! tolerances exist and must not be conflated: the matcher's own default
//! ([`crate::core_modules::highlight_matcher::DEFAULT_MATCH_TOLERANCE`], 5) and the
//! pipeline tolerance ([`DetectorConfig::tolerance`], 20) that the orchestrator
//! passes to both matching and masking.
//!
//! ```no_run
//! use highlight_detector::DetectorConfig;
//! use std::path::Path;
//!
//! let config = DetectorConfig::from_json_file(Path::new("detector.json"))?;
//! config.validate()?;
//! # Ok::<(), highlight_detector::DetectorError>(())
//! ```

use crate::error::{DetectorError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CLUSTER_COUNT: usize = 10;
pub const DEFAULT_BLACK_WHITE_THRESHOLD: u8 = 10;
pub const DEFAULT_DETECTION_TOLERANCE: u8 = 20;
pub const DEFAULT_MAX_ITERATIONS: usize = 300;
pub const DEFAULT_CONVERGENCE_TOLERANCE: f32 = 1e-4;

/// Complete detector configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Dominant-color extraction settings.
    pub clustering: ClusteringConfig,

    /// Per-channel tolerance used for palette matching (RGB) and masking (HSV).
    pub tolerance: u8,

    /// Whether the hue band of the mask wraps around the color wheel.
    pub hue_mode: HueMode,

    /// Which candidate region is reported when several highlight colors match.
    pub selection: SelectionPolicy,
}

/// Dominant-color extraction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Requested number of clusters (k). Clamped to the number of distinct colors.
    pub cluster_count: usize,

    /// Centers with every channel `<=` this (or `>= 255 -` this) are discarded.
    pub black_white_threshold: u8,

    /// Seed for the k-means++ initialization; identical seeds give identical results.
    pub seed: u64,

    /// Upper bound on Lloyd iterations.
    pub max_iterations: usize,

    /// Iteration stops once no center moves more than this (squared RGB distance).
    pub convergence_tolerance: f32,
}

/// Treatment of the hue channel when building an HSV tolerance band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HueMode {
    /// Hue is circular: a band crossing 0 or 180 continues on the other side.
    #[default]
    Circular,
    /// Hue is compared as a plain number; the band is cut off at the ends of the range.
    Linear,
}

/// Policy for choosing the reported region among matched highlight colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// First matched palette entry (registry order) that yields a region.
    #[default]
    FirstInPaletteOrder,
    /// Region with the largest area across all matched entries; ties go to palette order.
    LargestArea,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            cluster_count: DEFAULT_CLUSTER_COUNT,
            black_white_threshold: DEFAULT_BLACK_WHITE_THRESHOLD,
            seed: 0,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            convergence_tolerance: DEFAULT_CONVERGENCE_TOLERANCE,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            clustering: ClusteringConfig::default(),
            tolerance: DEFAULT_DETECTION_TOLERANCE,
            hue_mode: HueMode::default(),
            selection: SelectionPolicy::default(),
        }
    }
}

impl ClusteringConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cluster_count == 0 {
            return Err(DetectorError::invalid_config("cluster_count", self.cluster_count));
        }
        if self.max_iterations == 0 {
            return Err(DetectorError::invalid_config("max_iterations", self.max_iterations));
        }
        if !self.convergence_tolerance.is_finite() || self.convergence_tolerance < 0.0 {
            return Err(DetectorError::invalid_config(
                "convergence_tolerance",
                self.convergence_tolerance,
            ));
        }
        Ok(())
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        self.clustering.validate()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.clustering.seed = seed;
        self
    }

    pub fn with_selection(mut self, selection: SelectionPolicy) -> Self {
        self.selection = selection;
        self
    }

    /// Load configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
