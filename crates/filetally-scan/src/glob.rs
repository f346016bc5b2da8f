//! Directory glob patterns and their root expansion.
//!
//! A pattern such as `/var/log/*/nginx` or `/srv/**` names the directories
//! to report on. [`DirGlob::roots`] expands it into concrete starting points
//! for the walker, and [`DirGlob::matches`] decides which visited
//! directories produce a record.

use std::path::{Component, Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use tracing::trace;

use filetally_core::ScanError;

use crate::fs::{FileSystem, clean_path};

const META_CHARS: &[char] = &['*', '?', '[', '{'];
const SUPER_META: &str = "**";

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Wildcard(GlobMatcher),
    Recursive,
}

/// A compiled directory pattern.
#[derive(Debug, Clone)]
pub struct DirGlob {
    pattern: String,
    base: PathBuf,
    segments: Vec<Segment>,
    has_meta: bool,
    has_super_meta: bool,
    matcher: Option<GlobMatcher>,
}

impl DirGlob {
    /// Compile a directory pattern. The pattern is normalized first.
    pub fn compile(pattern: &str) -> Result<Self, ScanError> {
        let cleaned = clean_path(Path::new(pattern));
        let normalized = cleaned.to_string_lossy().into_owned();
        let has_meta = normalized.contains(META_CHARS);
        let has_super_meta = normalized.contains(SUPER_META);

        let matcher = if has_meta {
            Some(compile_glob(&normalized, pattern)?)
        } else {
            None
        };

        let mut base = PathBuf::new();
        let mut segments = Vec::new();
        for component in cleaned.components() {
            match component {
                Component::Prefix(_) | Component::RootDir if segments.is_empty() => {
                    base.push(component.as_os_str());
                }
                Component::Normal(name) => {
                    let name = name.to_string_lossy();
                    segments.push(if name == SUPER_META {
                        Segment::Recursive
                    } else if name.contains(META_CHARS) {
                        Segment::Wildcard(compile_glob(&name, pattern)?)
                    } else {
                        Segment::Literal(name.into_owned())
                    });
                }
                other => segments.push(Segment::Literal(other.as_os_str().to_string_lossy().into_owned())),
            }
        }

        Ok(Self {
            pattern: normalized,
            base,
            segments,
            has_meta,
            has_super_meta,
            matcher,
        })
    }

    /// The normalized pattern text.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Whether the pattern contains any wildcard syntax.
    pub fn has_meta(&self) -> bool {
        self.has_meta
    }

    /// Whether the pattern contains a recursive `**` wildcard.
    pub fn has_super_meta(&self) -> bool {
        self.has_super_meta
    }

    /// Test whether a concrete directory path satisfies the whole pattern.
    pub fn matches(&self, path: &Path) -> bool {
        match &self.matcher {
            Some(matcher) => matcher.is_match(path),
            None => clean_path(path).as_os_str() == self.pattern.as_str(),
        }
    }

    /// Expand the pattern into the directories a walk should start from.
    ///
    /// Without wildcards this is the pattern itself. Otherwise every
    /// segment before the first `**` is expanded against the file system.
    /// Missing prefixes yield no roots; existence of the final paths is left
    /// to the caller.
    pub fn roots<F: FileSystem + ?Sized>(&self, fs: &F) -> Vec<PathBuf> {
        if !self.has_meta {
            return vec![PathBuf::from(&self.pattern)];
        }

        let mut candidates = vec![self.base.clone()];
        for segment in &self.segments {
            match segment {
                Segment::Recursive => break,
                Segment::Literal(name) => {
                    for candidate in &mut candidates {
                        candidate.push(name);
                    }
                }
                Segment::Wildcard(matcher) => {
                    candidates = candidates
                        .iter()
                        .flat_map(|dir| expand_wildcard(fs, dir, matcher))
                        .collect();
                }
            }
            if candidates.is_empty() {
                break;
            }
        }

        let mut roots: Vec<PathBuf> = candidates
            .into_iter()
            .map(|p| if p.as_os_str().is_empty() { PathBuf::from(".") } else { p })
            .collect();
        roots.sort();
        roots.dedup();
        trace!(pattern = %self.pattern, roots = roots.len(), "resolved glob roots");
        roots
    }
}

fn expand_wildcard<F: FileSystem + ?Sized>(fs: &F, dir: &Path, matcher: &GlobMatcher) -> Vec<PathBuf> {
    match fs.read_dir(dir) {
        Ok(names) => names
            .into_iter()
            .filter(|name| matcher.is_match(Path::new(name)))
            .map(|name| dir.join(name))
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn compile_glob(glob: &str, pattern: &str) -> Result<GlobMatcher, ScanError> {
    GlobBuilder::new(glob)
        .literal_separator(true)
        .backslash_escape(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| ScanError::invalid_pattern(pattern, e.kind()))
}

/// Compile a base-name pattern such as `*.log`.
pub(crate) fn compile_name_glob(pattern: &str) -> Result<GlobMatcher, ScanError> {
    compile_glob(pattern, pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;

    fn tree() -> MemoryFs {
        MemoryFs::new()
            .dir("/var/log/nginx")
            .dir("/var/log/apt")
            .dir("/var/log/apt/old")
            .dir("/var/cache")
            .dir("/var/.hidden")
    }

    #[test]
    fn test_literal_pattern() {
        let glob = DirGlob::compile("/var/log/").unwrap();
        assert!(!glob.has_meta());
        assert!(!glob.has_super_meta());
        assert_eq!(glob.as_str(), "/var/log");
        assert_eq!(glob.roots(&tree()), vec![PathBuf::from("/var/log")]);
        assert!(glob.matches(Path::new("/var/log")));
        assert!(glob.matches(Path::new("/var/./log")));
        assert!(!glob.matches(Path::new("/var/log/apt")));
    }

    #[test]
    fn test_literal_pattern_missing_root_is_kept() {
        let glob = DirGlob::compile("/nope").unwrap();
        assert_eq!(glob.roots(&tree()), vec![PathBuf::from("/nope")]);
    }

    #[test]
    fn test_single_star_expands_matches() {
        let glob = DirGlob::compile("/var/log/*").unwrap();
        assert!(glob.has_meta());
        assert!(!glob.has_super_meta());
        assert_eq!(
            glob.roots(&tree()),
            vec![PathBuf::from("/var/log/apt"), PathBuf::from("/var/log/nginx")]
        );
        assert!(glob.matches(Path::new("/var/log/apt")));
        assert!(!glob.matches(Path::new("/var/log/apt/old")));
        assert!(!glob.matches(Path::new("/var/log")));
    }

    #[test]
    fn test_star_in_middle() {
        let glob = DirGlob::compile("/var/*/apt").unwrap();
        assert_eq!(glob.roots(&tree()), vec![PathBuf::from("/var/log/apt")]);
    }

    #[test]
    fn test_star_matches_hidden_names() {
        let glob = DirGlob::compile("/var/*").unwrap();
        let roots = glob.roots(&tree());
        assert!(roots.contains(&PathBuf::from("/var/.hidden")));
        assert_eq!(roots.len(), 3);
    }

    #[test]
    fn test_super_meta_roots_at_prefix() {
        let glob = DirGlob::compile("/var/log/**").unwrap();
        assert!(glob.has_super_meta());
        assert_eq!(glob.roots(&tree()), vec![PathBuf::from("/var/log")]);
        assert!(glob.matches(Path::new("/var/log/apt")));
        assert!(glob.matches(Path::new("/var/log/apt/old")));
        assert!(!glob.matches(Path::new("/var/cache")));
    }

    #[test]
    fn test_super_meta_after_wildcard() {
        let glob = DirGlob::compile("/var/l*/**/old").unwrap();
        assert_eq!(glob.roots(&tree()), vec![PathBuf::from("/var/log")]);
        assert!(glob.matches(Path::new("/var/log/apt/old")));
        assert!(!glob.matches(Path::new("/var/log/apt")));
    }

    #[test]
    fn test_brace_and_class() {
        let glob = DirGlob::compile("/var/log/{apt,nginx}").unwrap();
        assert_eq!(glob.roots(&tree()).len(), 2);

        let glob = DirGlob::compile("/var/log/[a]pt").unwrap();
        assert_eq!(glob.roots(&tree()), vec![PathBuf::from("/var/log/apt")]);
    }

    #[test]
    fn test_missing_prefix_yields_no_roots() {
        let glob = DirGlob::compile("/srv/*/data").unwrap();
        assert!(glob.roots(&tree()).is_empty());
    }

    #[test]
    fn test_malformed_pattern() {
        let err = DirGlob::compile("/var/[log").unwrap_err();
        assert!(matches!(err, ScanError::InvalidPattern { .. }));
    }

    #[test]
    fn test_name_glob() {
        let matcher = compile_name_glob("*.log").unwrap();
        assert!(matcher.is_match("error.log"));
        assert!(!matcher.is_match("error.txt"));
        assert!(compile_name_glob("[").is_err());
    }
}
