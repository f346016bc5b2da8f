//! Core types and traits for filetally.
//!
//! This crate provides the data structures shared by the scanning engine
//! and its callers: entry metadata, per-directory statistics, the sink
//! interface, and configuration.

mod config;
mod error;
mod meta;
mod sink;
mod stats;
pub mod units;

pub use config::{FileTallyConfig, FileTallyConfigBuilder, MATCH_ALL, SAMPLE_CONFIG};
pub use error::ScanError;
pub use meta::{FileKind, FileMeta, InodeInfo, system_time_nanos};
pub use sink::{Accumulator, CollectingAccumulator, Gauge};
pub use stats::{DirectoryStats, MEASUREMENT};
