//! Counters describing what a walk or gather did.

use std::ops::AddAssign;
use std::time::Duration;

/// Statistics for one root's walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    /// Entries visited below the root (the root itself is not counted).
    pub entries_visited: u64,
    /// Entries accepted by the filter chain.
    pub entries_matched: u64,
    /// Entries left out as symlinks or vanished paths.
    pub entries_skipped: u64,
    /// Directories whose children were listed.
    pub directories_entered: u64,
    /// Directory records emitted.
    pub directories_reported: u64,
    /// Subtrees skipped for lack of permission.
    pub subtrees_denied: u64,
    /// Directories not re-entered because they were already walked.
    pub cycles_avoided: u64,
    /// Filter errors forwarded to the sink.
    pub filter_errors: u64,
    /// Largest number of directory aggregates alive at once.
    pub peak_live_aggregates: usize,
}

impl AddAssign for WalkSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.entries_visited += rhs.entries_visited;
        self.entries_matched += rhs.entries_matched;
        self.entries_skipped += rhs.entries_skipped;
        self.directories_entered += rhs.directories_entered;
        self.directories_reported += rhs.directories_reported;
        self.subtrees_denied += rhs.subtrees_denied;
        self.cycles_avoided += rhs.cycles_avoided;
        self.filter_errors += rhs.filter_errors;
        self.peak_live_aggregates = self.peak_live_aggregates.max(rhs.peak_live_aggregates);
    }
}

/// Statistics for one gather across all patterns.
#[derive(Debug, Clone, Default)]
pub struct GatherSummary {
    /// Patterns that compiled and were resolved.
    pub patterns: u64,
    /// Existing root directories that were walked.
    pub roots_scanned: u64,
    /// Roots whose walk was aborted by an error.
    pub roots_failed: u64,
    /// Errors forwarded to the sink, including compile errors.
    pub errors_reported: u64,
    /// Combined walk counters.
    pub walk: WalkSummary,
    /// Wall-clock time of the gather.
    pub elapsed: Duration,
}

impl GatherSummary {
    /// Create an empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculate throughput in entries per second.
    pub fn entries_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.walk.entries_visited as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Whether anything went wrong.
    pub fn has_errors(&self) -> bool {
        self.errors_reported > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_summary_add() {
        let mut total = WalkSummary {
            entries_visited: 3,
            peak_live_aggregates: 4,
            ..Default::default()
        };
        total += WalkSummary {
            entries_visited: 2,
            directories_reported: 1,
            peak_live_aggregates: 2,
            ..Default::default()
        };

        assert_eq!(total.entries_visited, 5);
        assert_eq!(total.directories_reported, 1);
        assert_eq!(total.peak_live_aggregates, 4);
    }

    #[test]
    fn test_entries_per_second() {
        let mut summary = GatherSummary::new();
        assert_eq!(summary.entries_per_second(), 0.0);

        summary.walk.entries_visited = 100;
        summary.elapsed = Duration::from_secs(2);
        assert_eq!(summary.entries_per_second(), 50.0);
        assert!(!summary.has_errors());
    }
}
