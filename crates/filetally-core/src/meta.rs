//! File metadata as seen by the predicate chain.

use std::time::SystemTime;

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Inode information used to recognise a directory reached twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InodeInfo {
    /// Inode number.
    pub inode: u64,
    /// Device ID.
    pub device: u64,
}

impl InodeInfo {
    /// Create new inode info.
    pub fn new(inode: u64, device: u64) -> Self {
        Self { inode, device }
    }
}

/// Type of a file system entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link that was not resolved.
    Symlink,
    /// Other file types (sockets, devices, fifos).
    Other,
}

impl FileKind {
    /// Classify a std file type.
    pub fn from_file_type(file_type: std::fs::FileType) -> Self {
        if file_type.is_symlink() {
            Self::Symlink
        } else if file_type.is_dir() {
            Self::Directory
        } else if file_type.is_file() {
            Self::File
        } else {
            Self::Other
        }
    }
}

/// Metadata for a single entry, after link resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMeta {
    /// Base name of the entry.
    pub name: CompactString,

    /// Entry type.
    pub kind: FileKind,

    /// Size in bytes.
    pub size: u64,

    /// Last modification time.
    pub modified: SystemTime,

    /// Inode identity, where the platform provides one.
    pub inode: Option<InodeInfo>,
}

impl FileMeta {
    /// Create metadata for a regular file.
    pub fn file(name: impl Into<CompactString>, size: u64, modified: SystemTime) -> Self {
        Self {
            name: name.into(),
            kind: FileKind::File,
            size,
            modified,
            inode: None,
        }
    }

    /// Create metadata for a directory.
    pub fn directory(name: impl Into<CompactString>, modified: SystemTime) -> Self {
        Self {
            name: name.into(),
            kind: FileKind::Directory,
            size: 0,
            modified,
            inode: None,
        }
    }

    /// Attach an inode identity.
    pub fn with_inode(mut self, inode: InodeInfo) -> Self {
        self.inode = Some(inode);
        self
    }

    /// Build from std metadata.
    pub fn from_std(name: impl Into<CompactString>, metadata: &std::fs::Metadata) -> Self {
        Self {
            name: name.into(),
            kind: FileKind::from_file_type(metadata.file_type()),
            size: metadata.len(),
            modified: metadata.modified().unwrap_or(std::time::UNIX_EPOCH),
            inode: inode_of(metadata),
        }
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// Check if this is a regular file.
    pub fn is_regular(&self) -> bool {
        self.kind == FileKind::File
    }

    /// Check if this is an unresolved symlink.
    pub fn is_symlink(&self) -> bool {
        self.kind == FileKind::Symlink
    }

    /// Size as a signed byte count, saturating.
    pub fn size_i64(&self) -> i64 {
        i64::try_from(self.size).unwrap_or(i64::MAX)
    }

    /// Modification time in nanoseconds since the Unix epoch.
    pub fn modified_nanos(&self) -> i64 {
        system_time_nanos(self.modified)
    }
}

/// Convert a `SystemTime` into epoch nanoseconds, saturating outside the i64 range.
pub fn system_time_nanos(time: SystemTime) -> i64 {
    let datetime: DateTime<Utc> = time.into();
    datetime.timestamp_nanos_opt().unwrap_or(if datetime.timestamp() < 0 {
        i64::MIN
    } else {
        i64::MAX
    })
}

#[cfg(unix)]
fn inode_of(metadata: &std::fs::Metadata) -> Option<InodeInfo> {
    use std::os::unix::fs::MetadataExt;
    Some(InodeInfo::new(metadata.ino(), metadata.dev()))
}

#[cfg(not(unix))]
fn inode_of(_metadata: &std::fs::Metadata) -> Option<InodeInfo> {
    None // No stable inode numbers from std here
}
