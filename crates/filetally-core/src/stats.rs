//! Per-directory aggregate statistics.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::meta::FileMeta;
use crate::sink::Gauge;

/// Measurement name used for every emitted directory record.
pub const MEASUREMENT: &str = "filecount";

/// Running totals for one directory.
///
/// Timestamps are epoch nanoseconds where `0` means no matching entry has
/// been seen yet. A zero is never folded over a real value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryStats {
    /// Number of matching entries.
    pub count: i64,
    /// Total size of matching entries in bytes.
    pub size_bytes: i64,
    /// Oldest modification time among matches (0 = none).
    pub oldest_file_timestamp: i64,
    /// Newest modification time among matches (0 = none).
    pub newest_file_timestamp: i64,
}

impl DirectoryStats {
    /// Create empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one matching entry.
    pub fn record(&mut self, meta: &FileMeta) {
        self.count += 1;
        self.size_bytes = self.size_bytes.saturating_add(meta.size_i64());
        self.observe_timestamps(meta.modified_nanos(), meta.modified_nanos());
    }

    /// Fold a finished child directory into this one.
    pub fn merge(&mut self, child: &DirectoryStats) {
        self.count += child.count;
        self.size_bytes = self.size_bytes.saturating_add(child.size_bytes);
        self.observe_timestamps(child.oldest_file_timestamp, child.newest_file_timestamp);
    }

    fn observe_timestamps(&mut self, oldest: i64, newest: i64) {
        if oldest != 0 && (self.oldest_file_timestamp == 0 || oldest < self.oldest_file_timestamp) {
            self.oldest_file_timestamp = oldest;
        }
        if newest != 0 && (self.newest_file_timestamp == 0 || newest > self.newest_file_timestamp) {
            self.newest_file_timestamp = newest;
        }
    }

    /// Whether no entry has matched.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Oldest modification time, or `None` when no data.
    pub fn oldest(&self) -> Option<DateTime<Utc>> {
        nanos_to_datetime(self.oldest_file_timestamp)
    }

    /// Newest modification time, or `None` when no data.
    pub fn newest(&self) -> Option<DateTime<Utc>> {
        nanos_to_datetime(self.newest_file_timestamp)
    }

    /// Build the sink record for `directory`.
    pub fn to_gauge(&self, directory: &Path) -> Gauge {
        Gauge::new(MEASUREMENT)
            .field("count", self.count)
            .field("size_bytes", self.size_bytes)
            .field("oldest_file_timestamp", self.oldest_file_timestamp)
            .field("newest_file_timestamp", self.newest_file_timestamp)
            .tag("directory", directory.to_string_lossy())
    }

    /// Read stats back out of a gauge produced by [`DirectoryStats::to_gauge`].
    pub fn from_gauge(gauge: &Gauge) -> Self {
        let get = |key: &str| gauge.fields.get(key).copied().unwrap_or_default();
        Self {
            count: get("count"),
            size_bytes: get("size_bytes"),
            oldest_file_timestamp: get("oldest_file_timestamp"),
            newest_file_timestamp: get("newest_file_timestamp"),
        }
    }
}

fn nanos_to_datetime(nanos: i64) -> Option<DateTime<Utc>> {
    (nanos != 0).then(|| DateTime::from_timestamp_nanos(nanos))
}
