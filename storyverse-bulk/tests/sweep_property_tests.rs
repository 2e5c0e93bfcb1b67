//! Property-Based Tests for Bulk Sweeps
//!
//! **Property 1: Category sweep skips populated cells**
//!
//! With k of the 9 cells of a category already populated, the sweep calls
//! list generation exactly 9 - k times and never for a populated cell.
//!
//! **Property 2: Error budget**
//!
//! Six consecutive failures abort the universe sweep before a seventh
//! call. A success in between resets the count.
//!
//! **Property 3: Cover sweep completeness**
//!
//! N stories lacking covers across several partitions yield exactly N
//! cover calls, whichever call fails.
//!
//! **Property 4: One sweep at a time, and cancellation**

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use storyverse_bulk::{BulkOrchestrator, SweepStatus, TOO_MANY_ERRORS};
use storyverse_core::{
    AgeBracket, BulkError, Language, PartitionKey, StoryCategory, StoryverseError, SweepPacing,
};
use storyverse_library::StoryLibrary;
use storyverse_storage::InMemoryStoryStore;
use storyverse_test_utils::fixtures::{key, make_partition};
use storyverse_test_utils::{CoverOutcome, ListOutcome, ScriptedGenerator};
use tokio::runtime::Runtime;

// ============================================================================
// TEST CONFIGURATION
// ============================================================================

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

fn setup(generator: ScriptedGenerator) -> (Arc<BulkOrchestrator>, Arc<StoryLibrary>, Arc<ScriptedGenerator>) {
    let library = Arc::new(StoryLibrary::empty(Arc::new(InMemoryStoryStore::new())));
    let generator = Arc::new(generator);
    let bulk = Arc::new(BulkOrchestrator::new(
        library.clone(),
        generator.clone(),
        SweepPacing::immediate(),
    ));
    (bulk, library, generator)
}

fn fails(n: usize) -> impl Iterator<Item = ListOutcome> {
    std::iter::repeat(ListOutcome::Fail).take(n)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..2_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached in time");
}

// ============================================================================
// PROPERTY 1: CATEGORY SWEEP SKIPS POPULATED CELLS
// ============================================================================

#[tokio::test]
async fn test_category_sweep_with_two_populated_cells() {
    let (bulk, library, generator) = setup(ScriptedGenerator::new());
    let populated = [
        key(StoryCategory::Animals, AgeBracket::Toddler, Language::French),
        key(StoryCategory::Animals, AgeBracket::OlderKid, Language::Arabic),
    ];
    for cell in populated {
        library.set_list(cell, make_partition(cell, 2)).unwrap();
    }

    let report = bulk.sweep_category(StoryCategory::Animals).await.unwrap();

    assert_eq!(generator.list_calls(), 7);
    let called: HashSet<PartitionKey> = generator.list_keys().into_iter().collect();
    assert_eq!(called.len(), 7);
    assert!(populated.iter().all(|cell| !called.contains(cell)));
    assert_eq!(report.skipped, 2);
    assert_eq!(report.generated, 7);
    assert_eq!(report.processed, 9);
    assert!(report.is_completed());
    // Pre-populated partitions are untouched.
    assert_eq!(library.get_by_key(&populated[0]).len(), 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    #[test]
    fn prop_category_sweep_calls_only_empty_cells(
        category in storyverse_test_utils::generators::arb_category(),
        mask in prop::collection::vec(any::<bool>(), 9),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let (bulk, library, generator) = setup(ScriptedGenerator::new());
            let cells: Vec<PartitionKey> = PartitionKey::for_category(category).collect();
            let populated: HashSet<PartitionKey> = cells
                .iter()
                .zip(mask.iter())
                .filter(|(_, filled)| **filled)
                .map(|(cell, _)| *cell)
                .collect();
            for cell in &populated {
                library.set_list(*cell, make_partition(*cell, 1)).map_err(|e| TestCaseError::fail(e.to_string()))?;
            }

            let report = bulk.sweep_category(category).await.map_err(|e| TestCaseError::fail(e.to_string()))?;

            prop_assert_eq!(generator.list_calls(), 9 - populated.len());
            prop_assert!(generator.list_keys().iter().all(|k| !populated.contains(k)));
            prop_assert_eq!(report.skipped, populated.len());
            prop_assert!(report.is_completed());
            Ok::<(), TestCaseError>(())
        })?;
    }
}

// ============================================================================
// PROPERTY 2: ERROR BUDGET
// ============================================================================

#[tokio::test]
async fn test_universe_aborts_after_six_consecutive_failures() {
    let (bulk, _, generator) = setup(ScriptedGenerator::new().with_list_outcomes(fails(6)));

    let report = bulk.sweep_universe().await.unwrap();

    assert_eq!(generator.list_calls(), 6);
    assert_eq!(
        report.status,
        SweepStatus::Aborted {
            reason: TOO_MANY_ERRORS.to_string()
        }
    );
    assert_eq!(report.failed, 6);
    assert!(!bulk.is_active());
}

#[tokio::test]
async fn test_success_resets_error_budget() {
    let outcomes = fails(5)
        .chain(std::iter::once(ListOutcome::Stories(2)))
        .chain(fails(5));
    let (bulk, library, generator) = setup(ScriptedGenerator::new().with_list_outcomes(outcomes));

    let report = bulk.sweep_universe().await.unwrap();

    assert!(report.is_completed());
    assert_eq!(generator.list_calls(), 108);
    assert_eq!(report.failed, 10);
    assert_eq!(report.generated, 98);
    assert_eq!(library.partition_keys().len(), 98);
}

#[tokio::test]
async fn test_universe_skips_populated_cells() {
    let (bulk, library, generator) = setup(ScriptedGenerator::new());
    let cell = key(StoryCategory::Disney, AgeBracket::Toddler, Language::English);
    library.set_list(cell, make_partition(cell, 1)).unwrap();

    let report = bulk.sweep_universe().await.unwrap();

    assert_eq!(generator.list_calls(), 107);
    assert!(!generator.list_keys().contains(&cell));
    assert_eq!(report.skipped, 1);
}

#[tokio::test]
async fn test_aborted_sweep_shows_error_then_clears() {
    let library = Arc::new(StoryLibrary::empty(Arc::new(InMemoryStoryStore::new())));
    let generator = Arc::new(ScriptedGenerator::new().with_list_outcomes(fails(6)));
    let pacing = SweepPacing {
        error_cooldown_ms: 50,
        ..SweepPacing::immediate()
    };
    let bulk = BulkOrchestrator::new(library, generator, pacing);
    let mut progress = bulk.subscribe_progress();

    let watcher = tokio::spawn(async move {
        let mut saw_error = false;
        while progress.changed().await.is_ok() {
            let current = progress.borrow_and_update().clone();
            match current {
                Some(p) if p.error => saw_error = p.status == format!("Error: {}", TOO_MANY_ERRORS),
                Some(_) => {}
                None if saw_error => return true,
                None => {}
            }
        }
        saw_error
    });

    bulk.sweep_universe().await.unwrap();
    drop(bulk);
    assert!(watcher.await.unwrap());
}

#[tokio::test]
async fn test_rejected_credential_aborts_universe_after_one_call() {
    let (bulk, library, generator) =
        setup(ScriptedGenerator::new().with_list_outcomes([ListOutcome::NotConfigured]));

    let report = bulk.sweep_universe().await.unwrap();

    assert_eq!(generator.list_calls(), 1);
    assert!(matches!(report.status, SweepStatus::Aborted { .. }));
    assert_eq!(report.failed, 1);
    assert_eq!(library.story_count(), 0);
    assert!(!bulk.is_active());
}

#[tokio::test]
async fn test_rejected_credential_aborts_category_sweep() {
    let (bulk, _, generator) =
        setup(ScriptedGenerator::new().with_list_outcomes([ListOutcome::NotConfigured]));

    let report = bulk.sweep_category(StoryCategory::Bedtime).await.unwrap();

    assert_eq!(generator.list_calls(), 1);
    assert!(matches!(report.status, SweepStatus::Aborted { .. }));
    assert_eq!(report.processed, 1);
}

// ============================================================================
// PROPERTY 3: COVER SWEEP COMPLETENESS
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    #[test]
    fn prop_paint_calls_once_per_uncovered_story(
        sizes in prop::collection::vec(1usize..4, 1..4),
        fail_at in 0usize..12,
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let total: usize = sizes.iter().sum();
            let script: Vec<CoverOutcome> = (0..total)
                .map(|i| if i == fail_at { CoverOutcome::Fail } else { CoverOutcome::Image })
                .collect();
            let (bulk, library, generator) = setup(ScriptedGenerator::new().with_cover_outcomes(script));
            let cells: Vec<PartitionKey> = PartitionKey::all().step_by(7).take(sizes.len()).collect();
            for (cell, size) in cells.iter().zip(sizes.iter()) {
                library.set_list(*cell, make_partition(*cell, *size)).map_err(|e| TestCaseError::fail(e.to_string()))?;
            }

            let report = bulk.paint_universe().await.map_err(|e| TestCaseError::fail(e.to_string()))?;

            prop_assert_eq!(generator.cover_calls(), total);
            prop_assert_eq!(report.total, total);
            prop_assert_eq!(report.processed, total);
            let expected_failures = usize::from(fail_at < total);
            prop_assert_eq!(report.failed, expected_failures);
            prop_assert_eq!(report.generated, total - expected_failures);

            let snapshot = library.snapshot();
            let stories: Vec<_> = snapshot.values().flatten().collect();
            prop_assert!(stories.iter().all(|s| !s.is_loading_cover));
            prop_assert_eq!(stories.iter().filter(|s| s.has_cover()).count(), total - expected_failures);
            Ok::<(), TestCaseError>(())
        })?;
    }
}

#[tokio::test]
async fn test_paint_with_empty_worklist_completes_immediately() {
    let (bulk, _, generator) = setup(ScriptedGenerator::new());
    let report = bulk.paint_universe().await.unwrap();

    assert!(report.is_completed());
    assert_eq!(report.total, 0);
    assert_eq!(generator.cover_calls(), 0);
}

#[tokio::test]
async fn test_paint_progress_reaches_total() {
    let library = Arc::new(StoryLibrary::empty(Arc::new(InMemoryStoryStore::new())));
    let cell = key(StoryCategory::Animals, AgeBracket::Toddler, Language::French);
    library.set_list(cell, make_partition(cell, 3)).unwrap();
    let pacing = SweepPacing {
        paint_delay_ms: 20,
        ..SweepPacing::immediate()
    };
    let bulk = BulkOrchestrator::new(library, Arc::new(ScriptedGenerator::new()), pacing);
    let mut progress = bulk.subscribe_progress();

    let watcher = tokio::spawn(async move {
        let mut seen = Vec::new();
        while progress.changed().await.is_ok() {
            match progress.borrow_and_update().clone() {
                Some(p) => seen.push((p.current, p.total)),
                None if !seen.is_empty() => break,
                None => {}
            }
        }
        seen
    });

    let report = bulk.paint_universe().await.unwrap();
    assert_eq!(report.generated, 3);
    drop(bulk);

    let seen = watcher.await.unwrap();
    assert!(seen.contains(&(3, 3)), "progress seen: {:?}", seen);
}

// ============================================================================
// PROPERTY 4: ONE SWEEP AT A TIME, AND CANCELLATION
// ============================================================================

#[tokio::test]
async fn test_second_sweep_is_rejected_while_active() {
    let (bulk, _, generator) =
        setup(ScriptedGenerator::new().with_call_delay(Duration::from_millis(20)));

    let running = {
        let bulk = bulk.clone();
        tokio::spawn(async move { bulk.sweep_universe().await })
    };
    wait_until(|| bulk.is_active()).await;

    let rejected = bulk.sweep_category(StoryCategory::Magic).await;
    assert_eq!(rejected, Err(StoryverseError::Bulk(BulkError::SweepInProgress)));
    let rejected = bulk.paint_universe().await;
    assert!(matches!(rejected, Err(StoryverseError::Bulk(BulkError::SweepInProgress))));

    assert!(bulk.cancel());
    let report = running.await.unwrap().unwrap();
    assert_eq!(report.status, SweepStatus::Cancelled);
    assert!(generator.list_calls() < 108);
    assert!(!bulk.is_active());
}

#[tokio::test]
async fn test_cancel_stops_universe_sweep_mid_call() {
    let (bulk, library, generator) =
        setup(ScriptedGenerator::new().with_call_delay(Duration::from_millis(20)));

    let running = {
        let bulk = bulk.clone();
        tokio::spawn(async move { bulk.sweep_universe().await })
    };
    wait_until(|| generator.list_calls() >= 3).await;
    bulk.cancel();

    let report = running.await.unwrap().unwrap();
    assert_eq!(report.status, SweepStatus::Cancelled);
    let calls = generator.list_calls();
    assert!(calls < 108);
    // The interrupted call never lands in the cache.
    assert!(library.partition_keys().len() < calls);

    // A fresh sweep may start after cancellation.
    let again = bulk.sweep_category(StoryCategory::School).await.unwrap();
    assert!(again.is_completed());
}

#[tokio::test]
async fn test_cancel_paint_clears_loading_flag() {
    let (bulk, library, generator) =
        setup(ScriptedGenerator::new().with_call_delay(Duration::from_millis(20)));
    let cell = key(StoryCategory::Superheroes, AgeBracket::EarlyGrade, Language::Arabic);
    library.set_list(cell, make_partition(cell, 10)).unwrap();

    let running = {
        let bulk = bulk.clone();
        tokio::spawn(async move { bulk.paint_universe().await })
    };
    wait_until(|| generator.cover_calls() >= 2).await;
    bulk.cancel();

    let report = running.await.unwrap().unwrap();
    assert_eq!(report.status, SweepStatus::Cancelled);
    assert!(library.get_by_key(&cell).iter().all(|s| !s.is_loading_cover));
}
