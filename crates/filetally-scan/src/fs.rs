//! File system access used by the walker.
//!
//! Everything the engine reads from disk goes through [`FileSystem`], so
//! tests can run against [`MemoryFs`] instead of a real tree.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use compact_str::CompactString;

use filetally_core::{FileKind, FileMeta, InodeInfo};

/// Metadata and directory listing operations.
pub trait FileSystem: Send + Sync {
    /// Metadata for `path`, following symbolic links.
    fn stat(&self, path: &Path) -> io::Result<FileMeta>;

    /// Metadata for `path` itself, without following a final symbolic link.
    fn lstat(&self, path: &Path) -> io::Result<FileMeta>;

    /// Names of the entries in directory `path`, in no particular order.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<OsString>>;
}

/// The real file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl FileSystem for OsFs {
    fn stat(&self, path: &Path) -> io::Result<FileMeta> {
        let metadata = std::fs::metadata(path)?;
        Ok(FileMeta::from_std(base_name(path), &metadata))
    }

    fn lstat(&self, path: &Path) -> io::Result<FileMeta> {
        let metadata = std::fs::symlink_metadata(path)?;
        Ok(FileMeta::from_std(base_name(path), &metadata))
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<OsString>> {
        std::fs::read_dir(listing_path(path))?
            .map(|entry| entry.map(|e| e.file_name()))
            .collect()
    }
}

/// Base name of a path, or the whole path when it has none (e.g. `/`).
pub fn base_name(path: &Path) -> CompactString {
    match path.file_name() {
        Some(name) => CompactString::new(name.to_string_lossy()),
        None => CompactString::new(path.to_string_lossy()),
    }
}

/// An empty relative path means the current directory when listing.
fn listing_path(path: &Path) -> &Path {
    if path.as_os_str().is_empty() {
        Path::new(".")
    } else {
        path
    }
}

/// Lexically normalize a path: drop `.` components, resolve `..` against
/// preceding names, and collapse repeated separators.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Which operations an injected [`MemoryFs`] error applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsOp {
    /// `stat` and `lstat`.
    Stat,
    /// `read_dir`.
    ReadDir,
}

#[derive(Debug, Clone)]
enum MemKind {
    File { size: u64 },
    Dir,
    Symlink { target: PathBuf },
    Other,
}

#[derive(Debug, Clone)]
struct MemNode {
    kind: MemKind,
    modified: SystemTime,
    inode: u64,
}

const MAX_LINK_HOPS: usize = 40;

/// In-memory file system for tests and dry runs.
///
/// Paths are absolute; relative paths are taken relative to `/`. Parent
/// directories are created on demand.
#[derive(Debug, Clone)]
pub struct MemoryFs {
    nodes: BTreeMap<PathBuf, MemNode>,
    errors: HashMap<(PathBuf, FsOp), io::ErrorKind>,
    next_inode: u64,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    /// Default modification time for directories created implicitly.
    pub const DIR_MTIME: SystemTime = UNIX_EPOCH;

    /// Create a file system holding only `/`.
    pub fn new() -> Self {
        let mut fs = Self {
            nodes: BTreeMap::new(),
            errors: HashMap::new(),
            next_inode: 1,
        };
        fs.insert(Path::new("/"), MemKind::Dir, Self::dir_mtime());
        fs
    }

    fn dir_mtime() -> SystemTime {
        Self::DIR_MTIME + Duration::from_secs(1)
    }

    /// Add a directory.
    pub fn dir(mut self, path: impl AsRef<Path>) -> Self {
        self.insert(path.as_ref(), MemKind::Dir, Self::dir_mtime());
        self
    }

    /// Add a regular file.
    pub fn file(mut self, path: impl AsRef<Path>, size: u64, modified: SystemTime) -> Self {
        self.insert(path.as_ref(), MemKind::File { size }, modified);
        self
    }

    /// Add a symbolic link. Relative targets resolve against the link's directory.
    pub fn symlink(mut self, path: impl AsRef<Path>, target: impl Into<PathBuf>) -> Self {
        let target = target.into();
        self.insert(path.as_ref(), MemKind::Symlink { target }, Self::dir_mtime());
        self
    }

    /// Add a special file (socket, device, fifo).
    pub fn special(mut self, path: impl AsRef<Path>, modified: SystemTime) -> Self {
        self.insert(path.as_ref(), MemKind::Other, modified);
        self
    }

    /// Make `op` on exactly `path` fail with `kind`.
    pub fn fail(mut self, path: impl AsRef<Path>, op: FsOp, kind: io::ErrorKind) -> Self {
        self.errors.insert((absolute(path.as_ref()), op), kind);
        self
    }

    /// Remove a path and everything beneath it.
    pub fn remove(&mut self, path: impl AsRef<Path>) {
        let path = absolute(path.as_ref());
        self.nodes.retain(|p, _| !p.starts_with(&path));
    }

    fn insert(&mut self, path: &Path, kind: MemKind, modified: SystemTime) {
        let path = absolute(path);
        if let Some(parent) = path.parent()
            && !self.nodes.contains_key(parent)
        {
            self.insert(parent, MemKind::Dir, Self::dir_mtime());
        }
        let inode = self.next_inode;
        self.next_inode += 1;
        self.nodes.insert(
            path,
            MemNode {
                kind,
                modified,
                inode,
            },
        );
    }

    fn injected(&self, path: &Path, op: FsOp) -> io::Result<()> {
        match self.errors.get(&(path.to_path_buf(), op)) {
            Some(kind) => Err(io::Error::new(*kind, format!("injected {op:?} failure"))),
            None => Ok(()),
        }
    }

    /// Resolve symlinks in every component, and in the last one too when
    /// `follow_last` is set.
    fn resolve(&self, path: &Path, follow_last: bool) -> io::Result<PathBuf> {
        let mut hops = 0;
        self.resolve_inner(&absolute(path), follow_last, &mut hops)
    }

    fn resolve_inner(&self, path: &Path, follow_last: bool, hops: &mut usize) -> io::Result<PathBuf> {
        let components: Vec<Component<'_>> = path.components().collect();
        let mut current = PathBuf::from("/");

        for (i, component) in components.iter().enumerate() {
            let is_last = i + 1 == components.len();
            match component {
                Component::RootDir | Component::Prefix(_) | Component::CurDir => continue,
                Component::ParentDir => {
                    current.pop();
                    continue;
                }
                Component::Normal(name) => current.push(name),
            }

            let node = self.nodes.get(&current).ok_or_else(|| not_found(&current))?;
            if let MemKind::Symlink { target } = &node.kind
                && (!is_last || follow_last)
            {
                *hops += 1;
                if *hops > MAX_LINK_HOPS {
                    return Err(io::Error::other(format!(
                        "too many levels of symbolic links: {}",
                        path.display()
                    )));
                }
                let base = current.parent().unwrap_or(Path::new("/")).to_path_buf();
                current = self.resolve_inner(&base.join(target), true, hops)?;
            }
        }
        Ok(current)
    }

    fn meta_at(&self, requested: &Path, resolved: &Path) -> io::Result<FileMeta> {
        let node = self.nodes.get(resolved).ok_or_else(|| not_found(resolved))?;
        let (kind, size) = match &node.kind {
            MemKind::File { size } => (FileKind::File, *size),
            MemKind::Dir => (FileKind::Directory, 0),
            MemKind::Symlink { target } => (FileKind::Symlink, target.as_os_str().len() as u64),
            MemKind::Other => (FileKind::Other, 0),
        };
        Ok(FileMeta {
            name: base_name(requested),
            kind,
            size,
            modified: node.modified,
            inode: Some(InodeInfo::new(node.inode, 1)),
        })
    }
}

impl FileSystem for MemoryFs {
    fn stat(&self, path: &Path) -> io::Result<FileMeta> {
        self.injected(&absolute(path), FsOp::Stat)?;
        let resolved = self.resolve(path, true)?;
        self.meta_at(path, &resolved)
    }

    fn lstat(&self, path: &Path) -> io::Result<FileMeta> {
        self.injected(&absolute(path), FsOp::Stat)?;
        let resolved = self.resolve(path, false)?;
        self.meta_at(path, &resolved)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<OsString>> {
        self.injected(&absolute(path), FsOp::ReadDir)?;
        let dir = self.resolve(path, true)?;
        match self.nodes.get(&dir).map(|n| &n.kind) {
            Some(MemKind::Dir) => {}
            Some(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::NotADirectory,
                    format!("not a directory: {}", path.display()),
                ));
            }
            None => return Err(not_found(&dir)),
        }
        Ok(self
            .nodes
            .keys()
            .filter(|p| p.parent() == Some(dir.as_path()))
            .filter_map(|p| p.file_name().map(|n| n.to_os_string()))
            .collect())
    }
}

fn absolute(path: &Path) -> PathBuf {
    clean_path(&Path::new("/").join(path))
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file or directory: {}", path.display()),
    )
}
