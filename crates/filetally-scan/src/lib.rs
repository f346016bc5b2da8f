//! Directory walking and aggregation engine for filetally.
//!
//! # Overview
//!
//! `filetally-scan` expands directory glob patterns, walks each root depth
//! first, applies the configured file filters and reports one
//! [`DirectoryStats`] record per matching directory. Key features:
//!
//! - **Glob patterns** with `**` to report every directory below a prefix
//! - **Filters** on base name, file type, size and modification age
//! - **Recursive roll-up** of subdirectory totals into their ancestors
//! - **Link-cycle safety** when following symbolic links
//! - **Pluggable file system** via the [`FileSystem`] trait
//!
//! # Example
//!
//! ```rust,no_run
//! use filetally_scan::{CollectingAccumulator, FileCounter, FileTallyConfig};
//!
//! let config = FileTallyConfig::new(["/var/log/**"]);
//! let mut counter = FileCounter::new(config).unwrap();
//!
//! let mut acc = CollectingAccumulator::new();
//! let summary = counter.gather(&mut acc);
//!
//! for gauge in &acc.gauges {
//!     println!("{gauge}");
//! }
//! println!("{} directories in {:?}", acc.gauges.len(), summary.elapsed);
//! ```

mod ancestors;
mod counter;
mod filter;
mod fs;
mod glob;
mod link;
mod summary;
mod walker;

pub use ancestors::AncestorChain;
pub use counter::FileCounter;
pub use filter::{Filter, FilterChain, Predicate};
pub use fs::{FileSystem, FsOp, MemoryFs, OsFs, base_name, clean_path};
pub use glob::DirGlob;
pub use link::{LinkPolicy, Resolution, SkipReason};
pub use summary::{GatherSummary, WalkSummary};
pub use walker::TreeWalker;

// Re-export core types for convenience
pub use filetally_core::{
    Accumulator, CollectingAccumulator, DirectoryStats, FileKind, FileMeta, FileTallyConfig, Gauge,
    InodeInfo, MEASUREMENT, ScanError, system_time_nanos,
};
