//! File predicates applied to every visited entry.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::TimeDelta;
use globset::GlobMatcher;

use filetally_core::{FileTallyConfig, FileMeta, MATCH_ALL, ScanError};

use crate::glob::compile_name_glob;

type PredicateFn = dyn Fn(&FileMeta) -> Result<bool, ScanError> + Send + Sync;

/// A caller-supplied predicate with a label for logs.
#[derive(Clone)]
pub struct Predicate {
    label: String,
    func: Arc<PredicateFn>,
}

impl Predicate {
    /// The label given at construction.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.label).finish()
    }
}

/// A single predicate over entry metadata.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Base name must match a glob.
    Name(GlobMatcher),
    /// Entry must be a regular file.
    RegularOnly,
    /// Regular files of at least `n` bytes, or smaller than `|n|` when negative.
    Size(i64),
    /// Modified before `now - age`, or after it when the age is negative.
    Modified(TimeDelta),
    /// Any other check.
    Custom(Predicate),
}

impl Filter {
    /// Name filter, or `None` for the match-all pattern.
    pub fn name(pattern: &str) -> Result<Option<Self>, ScanError> {
        if pattern == MATCH_ALL {
            return Ok(None);
        }
        compile_name_glob(pattern).map(|m| Some(Self::Name(m)))
    }

    /// Regular-file filter, if enabled.
    pub fn regular_only(enabled: bool) -> Option<Self> {
        enabled.then_some(Self::RegularOnly)
    }

    /// Size filter, or `None` for a zero threshold.
    pub fn size(threshold: i64) -> Option<Self> {
        (threshold != 0).then_some(Self::Size(threshold))
    }

    /// Modification-age filter, or `None` for a zero duration.
    pub fn modified(age: TimeDelta) -> Option<Self> {
        (!age.is_zero()).then_some(Self::Modified(age))
    }

    /// Wrap a closure as a filter.
    pub fn custom<F>(label: impl Into<String>, func: F) -> Self
    where
        F: Fn(&FileMeta) -> Result<bool, ScanError> + Send + Sync + 'static,
    {
        Self::Custom(Predicate {
            label: label.into(),
            func: Arc::new(func),
        })
    }

    /// Evaluate against the current time.
    pub fn matches(&self, meta: &FileMeta) -> Result<bool, ScanError> {
        self.matches_at(meta, SystemTime::now())
    }

    /// Evaluate with `now` as the reference point for age checks.
    pub fn matches_at(&self, meta: &FileMeta, now: SystemTime) -> Result<bool, ScanError> {
        match self {
            Self::Name(matcher) => Ok(matcher.is_match(Path::new(meta.name.as_str()))),
            Self::RegularOnly => Ok(meta.is_regular()),
            Self::Size(threshold) => {
                if !meta.is_regular() {
                    return Ok(false);
                }
                let bound = threshold.unsigned_abs();
                Ok(if *threshold < 0 {
                    meta.size < bound
                } else {
                    meta.size >= bound
                })
            }
            Self::Modified(age) => {
                let span = age.abs().to_std().map_err(|e| ScanError::Other {
                    message: format!("mtime threshold {age} out of range: {e}"),
                })?;
                let boundary = now.checked_sub(span).ok_or_else(|| ScanError::Other {
                    message: format!("mtime threshold {age} reaches before the representable time range"),
                })?;
                Ok(if *age < TimeDelta::zero() {
                    meta.modified > boundary
                } else {
                    meta.modified < boundary
                })
            }
            Self::Custom(predicate) => (predicate.func)(meta),
        }
    }
}

/// Ordered conjunction of filters: name, regular-only, size, mtime.
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    filters: Vec<Filter>,
}

impl FilterChain {
    /// A chain that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the chain from configuration, leaving out disabled filters.
    pub fn from_config(config: &FileTallyConfig) -> Result<Self, ScanError> {
        let filters = [
            Filter::name(&config.name)?,
            Filter::regular_only(config.regular_only),
            Filter::size(config.size),
            Filter::modified(config.mtime),
        ];
        Ok(Self {
            filters: filters.into_iter().flatten().collect(),
        })
    }

    /// A chain that rejects every entry.
    pub fn rejecting() -> Self {
        let mut chain = Self::new();
        chain.push(Filter::custom("reject all", |_| Ok(false)));
        chain
    }

    /// Append a filter, evaluated after the existing ones.
    pub fn push(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    /// The active filters, in evaluation order.
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Number of active filters.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Check if no filter is active.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Evaluate all filters, stopping at the first rejection or error.
    pub fn matches(&self, meta: &FileMeta) -> Result<bool, ScanError> {
        self.matches_at(meta, SystemTime::now())
    }

    /// Like [`FilterChain::matches`] with a fixed reference time.
    pub fn matches_at(&self, meta: &FileMeta, now: SystemTime) -> Result<bool, ScanError> {
        for filter in &self.filters {
            if !filter.matches_at(meta, now)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
