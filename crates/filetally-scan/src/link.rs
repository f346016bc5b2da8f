//! Symbolic link handling for visited entries.

use std::path::Path;

use tracing::debug;

use filetally_core::{FileMeta, ScanError};

use crate::fs::FileSystem;

/// Why an entry was left out of matching and recursion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A symbolic link while links are not being followed.
    Symlink,
    /// The entry, or the target of a followed link, no longer exists.
    Vanished,
}

/// Outcome of resolving one path.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Metadata to match against; for followed links this is the target's.
    Entry(FileMeta),
    /// Leave this entry out without reporting an error.
    Skip(SkipReason),
}

/// Decides between `stat` and `lstat` for each entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkPolicy {
    follow_symlinks: bool,
}

impl LinkPolicy {
    /// Create a policy.
    pub fn new(follow_symlinks: bool) -> Self {
        Self { follow_symlinks }
    }

    /// Whether links are followed.
    pub fn follows_symlinks(&self) -> bool {
        self.follow_symlinks
    }

    /// Resolve metadata for `path`.
    pub fn resolve<F: FileSystem + ?Sized>(&self, fs: &F, path: &Path) -> Result<Resolution, ScanError> {
        let result = if self.follow_symlinks {
            fs.stat(path)
        } else {
            fs.lstat(path)
        };

        match result {
            Ok(meta) if meta.is_symlink() => {
                debug!(path = %path.display(), "skipping symlink");
                Ok(Resolution::Skip(SkipReason::Symlink))
            }
            Ok(meta) => Ok(Resolution::Entry(meta)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "entry vanished or link is dangling");
                Ok(Resolution::Skip(SkipReason::Vanished))
            }
            Err(e) => Err(ScanError::io(path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;
    use filetally_core::FileKind;
    use std::io;
    use std::time::{Duration, UNIX_EPOCH};

    fn fs() -> MemoryFs {
        MemoryFs::new()
            .file("/r/target.bin", 900, UNIX_EPOCH + Duration::from_secs(5))
            .symlink("/r/link", "target.bin")
            .symlink("/r/dangling", "missing")
    }

    #[test]
    fn test_symlink_skipped_when_not_following() {
        let policy = LinkPolicy::new(false);
        assert!(matches!(
            policy.resolve(&fs(), Path::new("/r/link")).unwrap(),
            Resolution::Skip(SkipReason::Symlink)
        ));
    }

    #[test]
    fn test_symlink_followed_uses_target_metadata() {
        let policy = LinkPolicy::new(true);
        let Resolution::Entry(meta) = policy.resolve(&fs(), Path::new("/r/link")).unwrap() else {
            panic!("expected entry");
        };
        assert_eq!(meta.kind, FileKind::File);
        assert_eq!(meta.size, 900);
    }

    #[test]
    fn test_dangling_link_is_skipped() {
        let policy = LinkPolicy::new(true);
        assert!(matches!(
            policy.resolve(&fs(), Path::new("/r/dangling")).unwrap(),
            Resolution::Skip(SkipReason::Vanished)
        ));
    }

    #[test]
    fn test_vanished_entry_is_skipped() {
        let policy = LinkPolicy::new(false);
        assert!(matches!(
            policy.resolve(&fs(), Path::new("/r/gone")).unwrap(),
            Resolution::Skip(SkipReason::Vanished)
        ));
    }

    #[test]
    fn test_other_errors_propagate() {
        let fs = fs().fail("/r/target.bin", crate::fs::FsOp::Stat, io::ErrorKind::PermissionDenied);
        let err = LinkPolicy::new(false)
            .resolve(&fs, Path::new("/r/target.bin"))
            .unwrap_err();
        assert!(err.is_permission_denied());
    }
}
