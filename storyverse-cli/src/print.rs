//! Plain-text rendering of stories, statistics, and sweep progress.

use storyverse_bulk::{BulkProgress, SweepReport, SweepStatus};
use storyverse_core::{LibrarySelection, Story};
use storyverse_library::LibraryStats;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub fn selection_line(selection: &LibrarySelection) -> String {
    format!(
        "{} | {} ({}) | {} {}",
        selection.category,
        selection.age_bracket,
        selection.age_bracket.label(),
        selection.language.flag(),
        selection.language
    )
}

/// One row of a story listing.
pub fn story_row(index: usize, story: &Story) -> String {
    let mut marks = String::new();
    if story.has_cover() {
        marks.push_str(" [cover]");
    }
    if let Some(words) = story.word_count {
        marks.push_str(&format!(" [{} words]", words));
    }
    format!("{:>2}. {}{}\n    {}\n    id: {}", index + 1, story.title, marks, story.summary, story.id)
}

pub fn print_stories(selection: &LibrarySelection, stories: &[Story]) {
    println!("{}", selection_line(selection));
    if stories.is_empty() {
        println!("No stories yet. Run `storyverse generate` to create some.");
        return;
    }
    for (index, story) in stories.iter().enumerate() {
        println!("{}", story_row(index, story));
    }
}

pub fn print_story(story: &Story) {
    println!("# {}\n", story.title);
    println!("_{}_\n", story.summary);
    match &story.content {
        Some(content) => println!("{}", content),
        None => println!("(no content yet)"),
    }
    if let Some(words) = story.word_count {
        println!("\n{} words", words);
    }
}

pub fn stats_lines(stats: &LibraryStats) -> Vec<String> {
    let mut lines = vec![
        format!("Total stories: {}", stats.total),
        format!("Full stories:  {}", stats.full_stories),
        format!("Covers:        {}", stats.covers),
        String::new(),
    ];
    lines.extend(
        stats
            .per_category
            .iter()
            .map(|c| format!("{:<24} {}", c.category.to_string(), c.stories)),
    );
    lines
}

pub fn report_line(report: &SweepReport) -> String {
    let outcome = match &report.status {
        SweepStatus::Completed => "completed".to_string(),
        SweepStatus::Cancelled => "cancelled".to_string(),
        SweepStatus::Aborted { reason } => format!("aborted: {}", reason),
    };
    format!(
        "{} {}: {}/{} processed, {} generated, {} skipped, {} failed",
        report.kind, outcome, report.processed, report.total, report.generated, report.skipped, report.failed
    )
}

pub fn progress_line(progress: &BulkProgress) -> String {
    format!(
        "[{:>3}/{:<3} {:>3}%] {}",
        progress.current,
        progress.total,
        progress.percent(),
        progress.status
    )
}

/// Print every progress update on stderr until the sender goes away or
/// the task is aborted.
pub fn spawn_progress_renderer(mut progress: watch::Receiver<Option<BulkProgress>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let current = progress.borrow_and_update().clone();
            if let Some(p) = current {
                let marker = if p.error { "!! " } else { "" };
                eprintln!("{}{}", marker, progress_line(&p));
            }
        }
    })
}
