//! Gather orchestration across all configured directory patterns.

use std::path::PathBuf;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info_span, warn};

use filetally_core::{Accumulator, CollectingAccumulator, FileTallyConfig, Gauge, ScanError};

use crate::filter::FilterChain;
use crate::fs::{FileSystem, OsFs};
use crate::glob::DirGlob;
use crate::link::LinkPolicy;
use crate::summary::{GatherSummary, WalkSummary};
use crate::walker::TreeWalker;

/// Counts files below every configured directory pattern.
///
/// Patterns and filters are compiled once at construction. Roots are
/// resolved again on every [`FileCounter::gather`], since the file system
/// may change between calls.
pub struct FileCounter<F: FileSystem = OsFs> {
    config: FileTallyConfig,
    fs: F,
    filters: FilterChain,
    globs: Vec<DirGlob>,
    compile_errors: Vec<ScanError>,
}

impl FileCounter<OsFs> {
    /// Create a counter over the real file system.
    pub fn new(config: FileTallyConfig) -> Result<Self, ScanError> {
        Self::with_fs(config, OsFs)
    }
}

impl<F: FileSystem> FileCounter<F> {
    /// Create a counter over a custom file system.
    ///
    /// Only an invalid config is an error here. Patterns that fail to
    /// compile are reported to the sink on the first gather. A bad directory
    /// pattern is left out; a bad name pattern matches no file, so every
    /// directory still reports, with zero counts.
    pub fn with_fs(config: FileTallyConfig, fs: F) -> Result<Self, ScanError> {
        config.validate()?;

        let mut compile_errors = Vec::new();
        let filters = match FilterChain::from_config(&config) {
            Ok(filters) => filters,
            Err(e) => {
                warn!(pattern = %config.name, error = %e, "name pattern is invalid, no file will match");
                compile_errors.push(e);
                FilterChain::rejecting()
            }
        };

        let mut globs = Vec::with_capacity(config.directories.len());
        for directory in &config.directories {
            match DirGlob::compile(directory) {
                Ok(glob) => globs.push(glob),
                Err(e) => {
                    warn!(pattern = %directory, error = %e, "skipping directory pattern");
                    compile_errors.push(e);
                }
            }
        }

        Ok(Self {
            config,
            fs,
            filters,
            globs,
            compile_errors,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &FileTallyConfig {
        &self.config
    }

    /// Patterns that compiled successfully.
    pub fn patterns(&self) -> &[DirGlob] {
        &self.globs
    }

    /// The filter chain applied to entries.
    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    /// Gather statistics for every pattern into `acc`.
    ///
    /// Never fails: every error is forwarded to `acc`, and the remaining
    /// patterns and roots still run.
    pub fn gather<A: Accumulator + ?Sized>(&mut self, acc: &mut A) -> GatherSummary {
        let start = Instant::now();
        let _span = info_span!("gather", patterns = self.globs.len()).entered();
        let mut summary = GatherSummary::new();

        for error in self.compile_errors.drain(..) {
            summary.errors_reported += 1;
            acc.add_error(error);
        }

        let walker = TreeWalker::new(
            &self.fs,
            &self.filters,
            LinkPolicy::new(self.config.follow_symlinks),
            self.config.recursive,
        );

        for glob in &self.globs {
            summary.patterns += 1;
            let roots = only_directories(&self.fs, glob.roots(&self.fs));
            debug!(pattern = glob.as_str(), roots = roots.len(), "gathering");

            if self.config.parallel_roots && roots.len() > 1 {
                let results: Vec<(CollectingAccumulator, Result<WalkSummary, ScanError>)> = roots
                    .par_iter()
                    .map(|root| {
                        let mut local = CollectingAccumulator::new();
                        let result = walker.walk(root, glob, &mut local);
                        (local, result)
                    })
                    .collect();

                for (local, result) in results {
                    for gauge in local.gauges {
                        acc.add_gauge(gauge);
                    }
                    for error in local.errors {
                        summary.errors_reported += 1;
                        acc.add_error(error);
                    }
                    record_walk(&mut summary, result, acc);
                }
            } else {
                for root in &roots {
                    let mut sink = CountingSink::new(acc, &mut summary.errors_reported);
                    let result = walker.walk(root, glob, &mut sink);
                    record_walk(&mut summary, result, acc);
                }
            }
        }

        summary.elapsed = start.elapsed();
        summary
    }
}

fn record_walk<A: Accumulator + ?Sized>(
    summary: &mut GatherSummary,
    result: Result<WalkSummary, ScanError>,
    acc: &mut A,
) {
    summary.roots_scanned += 1;
    match result {
        Ok(walk) => summary.walk += walk,
        Err(e) => {
            warn!(error = %e, "walk aborted");
            summary.roots_failed += 1;
            summary.errors_reported += 1;
            acc.add_error(e);
        }
    }
}

/// Keep only roots that exist and are directories.
fn only_directories<F: FileSystem + ?Sized>(fs: &F, roots: Vec<PathBuf>) -> Vec<PathBuf> {
    roots
        .into_iter()
        .filter(|root| fs.stat(root).map(|meta| meta.is_dir()).unwrap_or(false))
        .collect()
}

/// Forwards to another sink while counting errors.
struct CountingSink<'a, A: Accumulator + ?Sized> {
    inner: &'a mut A,
    errors: &'a mut u64,
}

impl<'a, A: Accumulator + ?Sized> CountingSink<'a, A> {
    fn new(inner: &'a mut A, errors: &'a mut u64) -> Self {
        Self { inner, errors }
    }
}

impl<A: Accumulator + ?Sized> Accumulator for CountingSink<'_, A> {
    fn add_gauge(&mut self, gauge: Gauge) {
        self.inner.add_gauge(gauge);
    }

    fn add_error(&mut self, error: ScanError) {
        *self.errors += 1;
        self.inner.add_error(error);
    }
}
