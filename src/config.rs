//! Run configuration.
//!
//! Stock defaults are serialized to a TOML table, an optional user file
//! (`--config path`) is merged on top, and the result is deserialized and
//! validated. Command-line flags are applied to the merged config last.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [scan]
//! suffixes = ["jpeg", "jpg", "png", "gif", "webp", "tiff", "psd", "raw", "bmp", "heif", "heic", "svg"]
//!
//! [processing]
//! max_processes = 4         # Parallel workers (omit for auto = max(cores / 2, 2))
//!
//! [down_size]
//! max_size_mb = 1.5
//! quality = 90
//! force_jpg = false
//! tags = []                 # EXIF tags removed from re-encoded outputs
//!
//! [down_scale]
//! max_dimension = 0         # 0 = keep the source's longer side
//! quality = 90
//! tags = []
//! skip_under_mb = 0.0       # 0 = never skip
//!
//! [distort]
//! quality = 90
//! width_aspect_ratio = 1.0
//! height_aspect_ratio = 1.0
//!
//! [remove_black_bar]
//! quality = 90
//! threshold = 0             # Luma at or below this counts as black
//!
//! [strip_exif]
//! tags = []
//!
//! [set_exif]
//! max_attempts = 10
//! [set_exif.values]
//! artist = "john"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::exif::{ExifContainer, resolve_tag_name};
use crate::imaging::Quality;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Suffixes (lowercase, no dot) routed to the transform instead of copied.
pub const IMAGE_SUFFIXES: &[&str] = &[
    "jpeg", "jpg", "png", "gif", "webp", "tiff", "psd", "raw", "bmp", "heif", "heic", "svg",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MirrorConfig {
    pub scan: ScanConfig,
    pub processing: ProcessingConfig,
    pub down_size: DownSizeConfig,
    pub down_scale: DownScaleConfig,
    pub distort: DistortConfig,
    pub remove_black_bar: BlackBarConfig,
    pub strip_exif: StripExifConfig,
    pub set_exif: SetExifConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// File suffixes handed to the transform, matched case-insensitively.
    /// A leading dot is accepted.
    pub suffixes: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            suffixes: IMAGE_SUFFIXES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ScanConfig {
    /// Suffixes lowercased with any leading dot removed.
    pub fn normalized_suffixes(&self) -> Vec<String> {
        self.suffixes
            .iter()
            .map(|s| s.trim_start_matches('.').to_lowercase())
            .collect()
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Number of parallel workers. When absent, `max(cores / 2, 2)`.
    pub max_processes: Option<usize>,
}

/// Resolve the effective worker count.
///
/// - `None` → half the available cores, but at least 2
/// - `Some(n)` → `n`, at least 1
pub fn effective_workers(config: &ProcessingConfig) -> usize {
    match config.max_processes {
        Some(n) => n.max(1),
        None => {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1);
            (cores / 2).max(2)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DownSizeConfig {
    /// Byte budget per output file, in megabytes (1 MB = 1024 * 1024 bytes).
    pub max_size_mb: f64,
    pub quality: Quality,
    /// Re-encode non-JPEG sources even when they are under budget.
    pub force_jpg: bool,
    /// EXIF tags removed from re-encoded outputs.
    pub tags: Vec<String>,
}

impl Default for DownSizeConfig {
    fn default() -> Self {
        Self {
            max_size_mb: 1.5,
            quality: Quality::default(),
            force_jpg: false,
            tags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DownScaleConfig {
    /// Cap on both width and height; 0 keeps the source's longer side.
    pub max_dimension: u32,
    pub quality: Quality,
    pub tags: Vec<String>,
    /// Files smaller than this are copied as-is; 0 never skips.
    pub skip_under_mb: f64,
}

impl Default for DownScaleConfig {
    fn default() -> Self {
        Self {
            max_dimension: 0,
            quality: Quality::default(),
            tags: Vec::new(),
            skip_under_mb: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DistortConfig {
    pub quality: Quality,
    pub width_aspect_ratio: f64,
    pub height_aspect_ratio: f64,
}

impl Default for DistortConfig {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            width_aspect_ratio: 1.0,
            height_aspect_ratio: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BlackBarConfig {
    pub quality: Quality,
    /// Pixels with luma at or below this value count as black.
    pub threshold: u8,
}

impl Default for BlackBarConfig {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            threshold: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StripExifConfig {
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SetExifConfig {
    /// Tag name → value.
    pub values: BTreeMap<String, String>,
    /// Attempt ceiling for the reset-and-retry loop.
    pub max_attempts: u32,
}

impl Default for SetExifConfig {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
            max_attempts: crate::sanitizer::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl SetExifConfig {
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

fn validate_quality(section: &str, quality: Quality) -> Result<(), ConfigError> {
    if !(1..=100).contains(&quality.value()) {
        return Err(ConfigError::Validation(format!(
            "{section}.quality must be 1-100"
        )));
    }
    Ok(())
}

impl MirrorConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan.suffixes.is_empty() {
            return Err(ConfigError::Validation(
                "scan.suffixes must not be empty".into(),
            ));
        }
        validate_quality("down_size", self.down_size.quality)?;
        validate_quality("down_scale", self.down_scale.quality)?;
        validate_quality("distort", self.distort.quality)?;
        validate_quality("remove_black_bar", self.remove_black_bar.quality)?;

        if !(self.down_size.max_size_mb > 0.0) {
            return Err(ConfigError::Validation(
                "down_size.max_size_mb must be positive".into(),
            ));
        }
        if !(self.down_scale.skip_under_mb >= 0.0) {
            return Err(ConfigError::Validation(
                "down_scale.skip_under_mb must not be negative".into(),
            ));
        }
        if !(self.distort.width_aspect_ratio > 0.0 && self.distort.height_aspect_ratio > 0.0) {
            return Err(ConfigError::Validation(format!(
                "distort aspect ratio {}:{} must be positive",
                self.distort.width_aspect_ratio, self.distort.height_aspect_ratio
            )));
        }
        if self.set_exif.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "set_exif.max_attempts must be at least 1".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }

        // Every set_exif pair must encode into an empty container.
        let mut probe = ExifContainer::new();
        for (name, value) in &self.set_exif.values {
            let def = resolve_tag_name(name).ok_or_else(|| {
                ConfigError::Validation(format!("set_exif: unknown EXIF tag '{name}'"))
            })?;
            probe
                .set(def, value)
                .map_err(|e| ConfigError::Validation(format!("set_exif: {e}")))?;
        }
        Ok(())
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(MirrorConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto the stock defaults, then deserialize.
///
/// Validation is left to the caller so command-line overrides can be
/// applied first.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<MirrorConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    Ok(merged.try_into()?)
}

/// Load and validate config from an optional file path.
pub fn load_config(path: Option<&Path>) -> Result<MirrorConfig, ConfigError> {
    let overlay = path.map(load_raw_config).transpose()?;
    let config = resolve_config(overlay)?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock config file.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imgmirror configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Command-line flags override them.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Tree scan
# ---------------------------------------------------------------------------
[scan]
# File suffixes handed to the transform (case-insensitive).
# Everything else is copied byte-for-byte.
suffixes = ["jpeg", "jpg", "png", "gif", "webp", "tiff", "psd", "raw", "bmp", "heif", "heic", "svg"]

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Parallel workers.
# Omit or comment out to auto-detect (= half the CPU cores, at least 2).
# max_processes = 4

# ---------------------------------------------------------------------------
# down-size: shrink images until they fit a byte budget
# ---------------------------------------------------------------------------
[down_size]
# Maximum output size in megabytes.
max_size_mb = 1.5
# JPEG quality (1-100), kept fixed while dimensions shrink.
quality = 90
# Re-encode non-JPEG images even when they are already small enough.
force_jpg = false
# EXIF tags removed from re-encoded outputs, e.g. ["gps_latitude", "artist"].
tags = []

# ---------------------------------------------------------------------------
# down-scale: cap width and height
# ---------------------------------------------------------------------------
[down_scale]
# Maximum width and height in pixels. 0 keeps the original size.
max_dimension = 0
quality = 90
tags = []
# Copy files smaller than this many megabytes unchanged. 0 never skips.
skip_under_mb = 0.0

# ---------------------------------------------------------------------------
# distort: resample to a different aspect ratio (never enlarges)
# ---------------------------------------------------------------------------
[distort]
quality = 90
width_aspect_ratio = 1.0
height_aspect_ratio = 1.0

# ---------------------------------------------------------------------------
# remove-black-bar: crop away black borders
# ---------------------------------------------------------------------------
[remove_black_bar]
quality = 90
# Pixels whose luma is at or below this value count as black (0-255).
threshold = 0

# ---------------------------------------------------------------------------
# strip-exif: remove EXIF tags without re-encoding
# ---------------------------------------------------------------------------
[strip_exif]
tags = []

# ---------------------------------------------------------------------------
# set-exif: write EXIF tags without re-encoding
# ---------------------------------------------------------------------------
[set_exif]
# Attempts before giving up on a file whose metadata keeps failing.
max_attempts = 10

[set_exif.values]
# artist = "john"
"##
}
