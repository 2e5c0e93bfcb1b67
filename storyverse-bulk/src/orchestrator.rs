//! The bulk orchestrator.
//!
//! Sweeps walk the library one cell at a time with exactly one provider
//! call in flight. Each cell checks the live cache before calling out, so
//! cells filled by anyone else meanwhile are skipped. Every provider call
//! and every delay is raced against the cancellation signal.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use storyverse_core::{BulkError, PartitionKey, Story, StoryCategory, StoryverseResult, SweepPacing};
use storyverse_library::{begin_cover, finish_cover, generate_list, PaintOutcome, StoryLibrary};
use storyverse_llm::StoryGenerator;
use tokio::sync::watch;

use crate::progress::{BulkProgress, SweepKind, SweepReport, SweepStatus};

/// Terminal status of a universe sweep that hit its error budget.
pub const TOO_MANY_ERRORS: &str = "Too many consecutive errors. Aborting.";

const PAINT_TITLE_CHARS: usize = 15;

// ============================================================================
// ACTIVE SWEEP GUARD
// ============================================================================

/// Held for the lifetime of a sweep. Dropping it clears the progress slot
/// and the active marker on every exit path.
struct ActiveSweep<'a> {
    active: &'a AtomicBool,
    progress: &'a watch::Sender<Option<BulkProgress>>,
}

impl Drop for ActiveSweep<'_> {
    fn drop(&mut self) {
        self.progress.send_replace(None);
        self.active.store(false, Ordering::Release);
    }
}

/// Cancellation handle for one sweep.
struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    fn is_set(&self) -> bool {
        *self.0.borrow()
    }

    /// Run `fut` unless cancellation arrives first.
    async fn race<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        if self.is_set() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.0.wait_for(|cancelled| *cancelled) => None,
            out = fut => Some(out),
        }
    }

    /// Sleep for `delay`; `false` when cancelled meanwhile.
    async fn pause(&mut self, delay: Duration) -> bool {
        if delay.is_zero() {
            return !self.is_set();
        }
        self.race(tokio::time::sleep(delay)).await.is_some()
    }
}

// ============================================================================
// BULK ORCHESTRATOR
// ============================================================================

/// Runs bulk sweeps, one at a time.
pub struct BulkOrchestrator {
    library: Arc<StoryLibrary>,
    generator: Arc<dyn StoryGenerator>,
    pacing: SweepPacing,
    active: AtomicBool,
    progress: watch::Sender<Option<BulkProgress>>,
    cancel: watch::Sender<bool>,
}

impl BulkOrchestrator {
    pub fn new(
        library: Arc<StoryLibrary>,
        generator: Arc<dyn StoryGenerator>,
        pacing: SweepPacing,
    ) -> Self {
        let (progress, _) = watch::channel(None);
        let (cancel, _) = watch::channel(false);
        Self {
            library,
            generator,
            pacing,
            active: AtomicBool::new(false),
            progress,
            cancel,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Progress of the active sweep; `None` while idle.
    pub fn subscribe_progress(&self) -> watch::Receiver<Option<BulkProgress>> {
        self.progress.subscribe()
    }

    /// Ask the active sweep to stop at its next suspension point.
    ///
    /// # Returns
    /// `false` when no sweep is running.
    pub fn cancel(&self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.cancel.send_replace(true);
        tracing::info!("Bulk sweep cancellation requested");
        true
    }

    fn begin(&self) -> StoryverseResult<(ActiveSweep<'_>, CancelSignal)> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Rejected sweep start, another sweep is active");
            return Err(BulkError::SweepInProgress.into());
        }
        self.cancel.send_replace(false);
        let guard = ActiveSweep {
            active: &self.active,
            progress: &self.progress,
        };
        Ok((guard, CancelSignal(self.cancel.subscribe())))
    }

    fn publish(&self, kind: SweepKind, current: usize, total: usize, status: String, error: bool) {
        self.progress.send_replace(Some(BulkProgress {
            kind,
            current,
            total,
            status,
            error,
        }));
    }

    fn finish(&self, report: SweepReport) -> SweepReport {
        match &report.status {
            SweepStatus::Completed => tracing::info!(
                kind = %report.kind,
                processed = report.processed,
                generated = report.generated,
                skipped = report.skipped,
                failed = report.failed,
                "Sweep completed"
            ),
            SweepStatus::Cancelled => tracing::info!(
                kind = %report.kind,
                processed = report.processed,
                total = report.total,
                "Sweep cancelled"
            ),
            SweepStatus::Aborted { reason } => tracing::error!(
                kind = %report.kind,
                processed = report.processed,
                failed = report.failed,
                reason = %reason,
                "Sweep aborted"
            ),
        }
        report
    }

    // ------------------------------------------------------------------
    // Category sweep
    // ------------------------------------------------------------------

    /// Generate lists for every empty (age, language) cell of `category`.
    ///
    /// Failed cells are abandoned; the sweep carries on.
    pub async fn sweep_category(&self, category: StoryCategory) -> StoryverseResult<SweepReport> {
        let (_guard, mut cancel) = self.begin()?;
        let kind = SweepKind::Category(category);
        let cells: Vec<PartitionKey> = PartitionKey::for_category(category).collect();
        let total = cells.len();
        let mut report = SweepReport::start(kind, total);

        tracing::info!(category = %category, cells = total, "Category sweep started");
        self.publish(kind, 0, total, format!("Preparing {}...", category), false);

        for key in cells {
            if cancel.is_set() {
                report.status = SweepStatus::Cancelled;
                break;
            }

            if self.library.has_stories(&key) {
                report.processed += 1;
                report.skipped += 1;
                self.publish(
                    kind,
                    report.processed,
                    total,
                    format!("Skipping existing ({}, {})...", key.age, key.language),
                    false,
                );
                if !cancel.pause(self.pacing.skip_delay()).await {
                    report.status = SweepStatus::Cancelled;
                    break;
                }
                continue;
            }

            let status = format!("Generating {} ({}, {})...", category, key.age, key.language);
            self.publish(kind, report.processed + 1, total, status.clone(), false);

            let Some(result) = cancel
                .race(generate_list(&self.library, self.generator.as_ref(), key))
                .await
            else {
                report.status = SweepStatus::Cancelled;
                break;
            };
            report.processed += 1;
            match result {
                Ok(_) => report.generated += 1,
                Err(e) if e.is_configuration() => {
                    report.failed += 1;
                    report.status = SweepStatus::Aborted { reason: e.to_string() };
                    break;
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(partition = %key, error = %e, "Category sweep cell failed");
                }
            }
            self.publish(kind, report.processed, total, status, false);

            if !cancel.pause(self.pacing.category_delay()).await {
                report.status = SweepStatus::Cancelled;
                break;
            }
        }

        if let SweepStatus::Aborted { reason } = &report.status {
            self.show_terminal_error(kind, &report, reason, &mut cancel).await;
        }
        Ok(self.finish(report))
    }

    // ------------------------------------------------------------------
    // Universe sweep
    // ------------------------------------------------------------------

    /// Generate lists for every empty cell of the library.
    ///
    /// Aborts once more than `max_consecutive_errors` cells in a row have
    /// failed; a single success resets the count.
    pub async fn sweep_universe(&self) -> StoryverseResult<SweepReport> {
        let (_guard, mut cancel) = self.begin()?;
        let kind = SweepKind::Universe;
        let cells: Vec<PartitionKey> = PartitionKey::all().collect();
        let total = cells.len();
        let mut report = SweepReport::start(kind, total);
        let mut consecutive_errors: u32 = 0;

        tracing::info!(cells = total, "Universe sweep started");
        self.publish(kind, 0, total, "Initializing Universe...".to_string(), false);

        for key in cells {
            if cancel.is_set() {
                report.status = SweepStatus::Cancelled;
                break;
            }
            if consecutive_errors > self.pacing.max_consecutive_errors {
                report.status = SweepStatus::Aborted {
                    reason: TOO_MANY_ERRORS.to_string(),
                };
                break;
            }

            if self.library.has_stories(&key) {
                report.processed += 1;
                report.skipped += 1;
                self.publish(
                    kind,
                    report.processed,
                    total,
                    format!("Checked {} (Skipped)", key.category),
                    false,
                );
                if !cancel.pause(self.pacing.skip_delay()).await {
                    report.status = SweepStatus::Cancelled;
                    break;
                }
                continue;
            }

            let status = format!("Generating: {} | {} | {}", key.category, key.age, key.language);
            self.publish(kind, report.processed, total, status.clone(), false);

            let Some(result) = cancel
                .race(generate_list(&self.library, self.generator.as_ref(), key))
                .await
            else {
                report.status = SweepStatus::Cancelled;
                break;
            };
            report.processed += 1;
            match result {
                Ok(_) => {
                    report.generated += 1;
                    consecutive_errors = 0;
                }
                Err(e) if e.is_configuration() => {
                    report.failed += 1;
                    report.status = SweepStatus::Aborted { reason: e.to_string() };
                    break;
                }
                Err(e) => {
                    report.failed += 1;
                    consecutive_errors += 1;
                    tracing::warn!(
                        partition = %key,
                        consecutive_errors,
                        error = %e,
                        "Universe sweep cell failed"
                    );
                }
            }
            self.publish(kind, report.processed, total, status, false);

            if !cancel.pause(self.pacing.universe_delay()).await {
                report.status = SweepStatus::Cancelled;
                break;
            }
        }

        if let SweepStatus::Aborted { reason } = &report.status {
            self.show_terminal_error(kind, &report, reason, &mut cancel).await;
        }
        Ok(self.finish(report))
    }

    // ------------------------------------------------------------------
    // Paint sweep
    // ------------------------------------------------------------------

    /// Paint a cover for every story in the library that has none and none
    /// in flight. Failures are per story; the sweep always runs to the end
    /// of its worklist unless cancelled.
    pub async fn paint_universe(&self) -> StoryverseResult<SweepReport> {
        let (_guard, mut cancel) = self.begin()?;
        let kind = SweepKind::Paint;
        let worklist = self.cover_worklist();
        let total = worklist.len();
        let mut report = SweepReport::start(kind, total);

        tracing::info!(stories = total, "Paint sweep started");
        self.publish(kind, 0, total, format!("Preparing {} covers...", total), false);

        for story in worklist {
            if cancel.is_set() {
                report.status = SweepStatus::Cancelled;
                break;
            }
            let key = story.partition_key();
            let short_title: String = story.title.chars().take(PAINT_TITLE_CHARS).collect();
            let status = format!("Painting: {}...", short_title);
            self.publish(kind, report.processed, total, status.clone(), false);

            let Some(current) = begin_cover(&self.library, &key, &story.id) else {
                report.processed += 1;
                report.skipped += 1;
                self.publish(kind, report.processed, total, status, false);
                continue;
            };

            let request = self.generator.generate_cover_image(
                &current.title,
                &current.summary,
                current.category,
            );
            let Some(result) = cancel.race(request).await else {
                self.library
                    .mark_transient(&key, &story.id, |s| s.is_loading_cover = false);
                report.status = SweepStatus::Cancelled;
                break;
            };

            report.processed += 1;
            match finish_cover(&self.library, &key, &story.id, None, result) {
                PaintOutcome::Painted => report.generated += 1,
                PaintOutcome::NoImage | PaintOutcome::Missing => report.skipped += 1,
                PaintOutcome::Failed { .. } => report.failed += 1,
            }
            self.publish(kind, report.processed, total, status, false);

            if !cancel.pause(self.pacing.paint_delay()).await {
                report.status = SweepStatus::Cancelled;
                break;
            }
        }

        Ok(self.finish(report))
    }

    /// Stories lacking a cover, partitions in key order, list order within.
    fn cover_worklist(&self) -> Vec<Story> {
        let snapshot = self.library.snapshot();
        self.library
            .partition_keys()
            .into_iter()
            .filter_map(|key| snapshot.get(&key))
            .flatten()
            .filter(|story| story.needs_cover())
            .cloned()
            .collect()
    }

    /// Keep the abort message visible for the cool-down before the guard
    /// clears it.
    async fn show_terminal_error(
        &self,
        kind: SweepKind,
        report: &SweepReport,
        reason: &str,
        cancel: &mut CancelSignal,
    ) {
        self.publish(
            kind,
            report.processed,
            report.total,
            format!("Error: {}", reason),
            true,
        );
        cancel.pause(self.pacing.error_cooldown()).await;
    }
}

impl std::fmt::Debug for BulkOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkOrchestrator")
            .field("active", &self.is_active())
            .field("pacing", &self.pacing)
            .finish_non_exhaustive()
    }
}
