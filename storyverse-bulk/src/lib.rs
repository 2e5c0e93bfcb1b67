//! Storyverse Bulk - Library-Wide Generation Sweeps
//!
//! Three sweeps share one policy: one sweep at a time, one provider call
//! in flight, skip cells that already have content, pause between calls,
//! report progress after every cell, stop promptly on cancellation.
//!
//! - [`BulkOrchestrator::sweep_category`]: 9 cells of one category
//! - [`BulkOrchestrator::sweep_universe`]: all 108 cells, with an error budget
//! - [`BulkOrchestrator::paint_universe`]: a cover for every story lacking one

pub mod orchestrator;
pub mod progress;

pub use orchestrator::{BulkOrchestrator, TOO_MANY_ERRORS};
pub use progress::{BulkProgress, SweepKind, SweepReport, SweepStatus};
