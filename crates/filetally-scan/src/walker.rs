//! Depth-first directory walk with per-directory aggregation.
//!
//! The walk is sequential. Each directory's totals live in a map keyed by
//! path from the moment a child matches until the directory's post-order
//! step, where they are reported, folded into the parent when recursive,
//! and dropped. Only the current path's ancestors hold entries at any time.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, debug_span, trace, warn};

use filetally_core::{Accumulator, DirectoryStats, InodeInfo, ScanError};

use crate::ancestors::AncestorChain;
use crate::filter::FilterChain;
use crate::fs::{FileSystem, clean_path};
use crate::glob::DirGlob;
use crate::link::{LinkPolicy, Resolution};
use crate::summary::WalkSummary;

/// Work items on the explicit traversal stack.
enum Step {
    /// List a directory and queue its children.
    Enter(PathBuf, Option<InodeInfo>),
    /// Resolve, match and maybe descend into one entry.
    Visit(PathBuf),
    /// Post-order completion of a directory.
    Finish(PathBuf, Option<InodeInfo>),
}

/// Mutable state for a single root's walk.
#[derive(Default)]
struct WalkState {
    live: HashMap<PathBuf, DirectoryStats>,
    ancestors: AncestorChain,
    summary: WalkSummary,
}

impl WalkState {
    fn aggregate_for(&mut self, dir: &Path) -> &mut DirectoryStats {
        let live = self.live.len();
        let peak = &mut self.summary.peak_live_aggregates;
        self.live.entry(dir.to_path_buf()).or_insert_with(|| {
            *peak = (*peak).max(live + 1);
            DirectoryStats::new()
        })
    }
}

/// Walks one root and reports per-directory statistics.
pub struct TreeWalker<'a, F: FileSystem + ?Sized> {
    fs: &'a F,
    filters: &'a FilterChain,
    links: LinkPolicy,
    recursive: bool,
}

impl<'a, F: FileSystem + ?Sized> TreeWalker<'a, F> {
    /// Create a walker.
    pub fn new(fs: &'a F, filters: &'a FilterChain, links: LinkPolicy, recursive: bool) -> Self {
        Self {
            fs,
            filters,
            links,
            recursive,
        }
    }

    /// Walk `root`, reporting every directory that `glob` matches.
    ///
    /// Filter errors go to `acc` and the walk continues. Permission errors
    /// skip the affected subtree. Any other error aborts this root and is
    /// returned.
    pub fn walk<A: Accumulator + ?Sized>(
        &self,
        root: &Path,
        glob: &DirGlob,
        acc: &mut A,
    ) -> Result<WalkSummary, ScanError> {
        let root = clean_path(root);
        let _span = debug_span!("walk", root = %root.display(), pattern = glob.as_str()).entered();

        let mut state = WalkState::default();
        let identity = if self.links.follows_symlinks() {
            self.fs.stat(&root).ok().and_then(|meta| meta.inode)
        } else {
            None
        };

        let mut stack = vec![Step::Enter(root.clone(), identity)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(dir, identity) => self.enter(dir, identity, &mut stack, &mut state)?,
                Step::Visit(path) => self.visit(path, glob, &mut stack, &mut state, acc)?,
                Step::Finish(dir, identity) => self.finish(&dir, identity, &root, glob, &mut state, acc),
            }
        }

        debug_assert!(state.live.is_empty(), "aggregates leaked: {:?}", state.live.keys());
        debug_assert_eq!(state.ancestors.depth(), 0);
        Ok(state.summary)
    }

    fn enter(
        &self,
        dir: PathBuf,
        identity: Option<InodeInfo>,
        stack: &mut Vec<Step>,
        state: &mut WalkState,
    ) -> Result<(), ScanError> {
        let names = match self.fs.read_dir(&dir) {
            Ok(names) => names,
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                debug!(path = %dir.display(), error = %e, "permission denied, skipping subtree");
                state.summary.subtrees_denied += 1;
                state.live.remove(&dir);
                return Ok(());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %dir.display(), "directory vanished before listing");
                state.live.remove(&dir);
                return Ok(());
            }
            Err(e) => return Err(ScanError::io(&dir, e)),
        };

        state.summary.directories_entered += 1;
        if let Some(info) = identity {
            state.ancestors.push(info);
        }
        stack.push(Step::Finish(dir.clone(), identity));
        stack.extend(names.into_iter().map(|name| Step::Visit(dir.join(name))));
        Ok(())
    }

    fn visit<A: Accumulator + ?Sized>(
        &self,
        path: PathBuf,
        glob: &DirGlob,
        stack: &mut Vec<Step>,
        state: &mut WalkState,
        acc: &mut A,
    ) -> Result<(), ScanError> {
        state.summary.entries_visited += 1;

        let meta = match self.links.resolve(self.fs, &path) {
            Ok(Resolution::Entry(meta)) => meta,
            Ok(Resolution::Skip(_)) => {
                state.summary.entries_skipped += 1;
                return Ok(());
            }
            Err(e) if e.is_permission_denied() => {
                debug!(path = %path.display(), "permission denied reading metadata, skipping");
                state.summary.subtrees_denied += 1;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match self.filters.matches(&meta) {
            Ok(true) => {
                state.summary.entries_matched += 1;
                let parent = path.parent().unwrap_or(path.as_path());
                state.aggregate_for(parent).record(&meta);
            }
            Ok(false) => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "filter failed");
                state.summary.filter_errors += 1;
                acc.add_error(e);
            }
        }

        if !meta.is_dir() {
            return Ok(());
        }
        if !self.recursive && !glob.has_super_meta() {
            return Ok(());
        }

        let identity = if self.links.follows_symlinks() { meta.inode } else { None };
        if let Some(info) = identity
            && state.ancestors.contains(&info)
        {
            debug!(path = %path.display(), "link leads back to an open ancestor, not descending");
            state.summary.cycles_avoided += 1;
            return Ok(());
        }

        stack.push(Step::Enter(path, identity));
        Ok(())
    }

    fn finish<A: Accumulator + ?Sized>(
        &self,
        dir: &Path,
        identity: Option<InodeInfo>,
        root: &Path,
        glob: &DirGlob,
        state: &mut WalkState,
        acc: &mut A,
    ) {
        if identity.is_some() {
            state.ancestors.pop();
        }
        let stats = state.live.remove(dir).unwrap_or_default();

        if glob.matches(dir) {
            trace!(
                directory = %dir.display(),
                count = stats.count,
                size_bytes = stats.size_bytes,
                "directory complete"
            );
            acc.add_gauge(stats.to_gauge(dir));
            state.summary.directories_reported += 1;
        }

        if self.recursive
            && dir != root
            && !stats.is_empty()
            && let Some(parent) = dir.parent()
        {
            state.aggregate_for(parent).merge(&stats);
        }
    }
}
