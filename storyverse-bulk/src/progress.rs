//! Progress and results of bulk sweeps.

use std::fmt;

use storyverse_core::StoryCategory;

/// Which traversal a sweep performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepKind {
    /// Every (age, language) cell of one category.
    Category(StoryCategory),
    /// Every cell of the library.
    Universe,
    /// Covers for every story that lacks one.
    Paint,
}

impl fmt::Display for SweepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepKind::Category(category) => write!(f, "category sweep ({})", category),
            SweepKind::Universe => f.write_str("universe sweep"),
            SweepKind::Paint => f.write_str("paint sweep"),
        }
    }
}

/// Live progress of the active sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkProgress {
    pub kind: SweepKind,
    pub current: usize,
    pub total: usize,
    pub status: String,
    /// Set on the terminal message of an aborted sweep.
    pub error: bool,
}

impl BulkProgress {
    /// Completion in percent, 100 for an empty sweep.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.current.min(self.total) * 100) / self.total) as u8
    }
}

/// How a sweep ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepStatus {
    Completed,
    Aborted { reason: String },
    Cancelled,
}

/// Counters of a finished sweep.
///
/// For paint sweeps `generated` counts stored covers and `skipped` counts
/// stories that got no picture or vanished mid-sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub kind: SweepKind,
    pub total: usize,
    pub processed: usize,
    pub generated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub status: SweepStatus,
}

impl SweepReport {
    pub(crate) fn start(kind: SweepKind, total: usize) -> Self {
        Self {
            kind,
            total,
            processed: 0,
            generated: 0,
            skipped: 0,
            failed: 0,
            status: SweepStatus::Completed,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == SweepStatus::Completed
    }
}
