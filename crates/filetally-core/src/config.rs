//! Gather configuration types.

use std::path::Path;

use chrono::TimeDelta;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::units;

/// Name pattern that matches every entry and disables the name filter.
pub const MATCH_ALL: &str = "*";

/// Commented sample configuration.
pub const SAMPLE_CONFIG: &str = r#"# Count files in a directory and compute their size
## Directories to gather stats about.
## Globs are supported:
##   /var/log/**    -> recursively find all directories in /var/log and count files in each directory
##   /var/log/*/*   -> find all directories with a parent dir in /var/log and count files in each directory
##   /var/log       -> count all files in /var/log and all of its subdirectories
directories = ["/var/cache/apt", "/tmp"]

## Only count files that match the name pattern. Defaults to "*".
name = "*"

## Count files in subdirectories. Defaults to true.
recursive = true

## Only count regular files. Defaults to true.
regular_only = true

## Follow all symlinks while walking the directory tree. Defaults to false.
follow_symlinks = false

## Only count files that are at least this size. If size is
## a negative number, only count files that are smaller than the
## absolute value of size. Acceptable units are B, KiB, MiB, KB, ...
## KB, MB, ... are multiples of 1000; KiB, MiB, ... multiples of 1024.
## Without quotes and units, interpreted as size in bytes.
size = "0B"

## Only count files that have not been touched for at least this
## duration. If mtime is negative, only count files that have been
## touched in this duration. Defaults to "0s".
mtime = "0s"

## Scan the roots of each pattern in parallel. Defaults to false.
parallel_roots = false
"#;

/// Configuration for a gather.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct FileTallyConfig {
    /// Directory glob patterns to gather stats about.
    pub directories: Vec<String>,

    /// Base-name glob every counted entry must match.
    #[builder(default = "MATCH_ALL.to_string()")]
    #[serde(default = "default_name")]
    pub name: String,

    /// Roll subdirectory totals into their parents.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub recursive: bool,

    /// Only count regular files.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub regular_only: bool,

    /// Follow symbolic links.
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Size threshold in bytes (0 = disabled, negative = "smaller than").
    #[builder(default = "0")]
    #[serde(default, deserialize_with = "units::deserialize_size")]
    pub size: i64,

    /// Modification age threshold (0 = disabled, negative = "newer than").
    #[builder(default = "TimeDelta::zero()")]
    #[serde(
        default = "TimeDelta::zero",
        deserialize_with = "units::deserialize_duration",
        serialize_with = "units::serialize_duration"
    )]
    pub mtime: TimeDelta,

    /// Scan the roots of one pattern on a thread pool.
    #[builder(default = "false")]
    #[serde(default)]
    pub parallel_roots: bool,
}

fn default_true() -> bool {
    true
}

fn default_name() -> String {
    MATCH_ALL.to_string()
}

impl FileTallyConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.directories {
            Some(ref dirs) => check_directories(dirs),
            None => Err("At least one directory is required".to_string()),
        }
    }
}

fn check_directories(dirs: &[String]) -> Result<(), String> {
    if dirs.is_empty() {
        return Err("At least one directory is required".to_string());
    }
    if dirs.iter().any(|d| d.trim().is_empty()) {
        return Err("Directory patterns cannot be empty".to_string());
    }
    Ok(())
}

impl FileTallyConfig {
    /// Create a new config builder.
    pub fn builder() -> FileTallyConfigBuilder {
        FileTallyConfigBuilder::default()
    }

    /// Create a config with defaults for the given directory patterns.
    pub fn new<I, S>(directories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            directories: directories.into_iter().map(Into::into).collect(),
            name: default_name(),
            recursive: true,
            regular_only: true,
            follow_symlinks: false,
            size: 0,
            mtime: TimeDelta::zero(),
            parallel_roots: false,
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ScanError> {
        let config: Self = toml::from_str(s).map_err(|e| ScanError::InvalidConfig {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ScanError::io(path, e))?;
        Self::from_toml_str(&contents)
    }

    /// Serialize back to TOML.
    pub fn to_toml_string(&self) -> Result<String, ScanError> {
        toml::to_string(self).map_err(|e| ScanError::InvalidConfig {
            message: e.to_string(),
        })
    }

    /// Check invariants not enforced by the type system.
    pub fn validate(&self) -> Result<(), ScanError> {
        check_directories(&self.directories).map_err(|message| ScanError::InvalidConfig { message })
    }

    /// The commented sample configuration.
    pub fn sample() -> &'static str {
        SAMPLE_CONFIG
    }

    /// Whether the name filter is active.
    pub fn filters_by_name(&self) -> bool {
        self.name != MATCH_ALL
    }
}
