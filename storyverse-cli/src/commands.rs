//! One handler per subcommand.

use std::future::Future;
use std::path::{Path, PathBuf};

use chrono::Utc;
use storyverse_bulk::{BulkOrchestrator, SweepReport};
use storyverse_core::{AgeBracket, Language, StoryCategory, StoryverseResult};
use storyverse_library::{backup_file_name, export_backup, import_backup, LibraryStats};

use crate::args::Commands;
use crate::context::App;
use crate::error::{CliError, CliResult};
use crate::io::{confirm, load_image, save_image};
use crate::print;

pub async fn handle(app: &mut App, command: Commands) -> CliResult<()> {
    match command {
        Commands::Select {
            category,
            age,
            language,
        } => select(app, category, age, language),
        Commands::List => {
            let stories = app.library.get_by_key(&app.selection.key());
            print::print_stories(&app.selection, &stories);
            Ok(())
        }
        Commands::Generate => generate(app).await,
        Commands::Read { id } => read(app, &id).await,
        Commands::Covers => covers(app).await,
        Commands::RegenerateCover { id } => regenerate_cover(app, &id).await,
        Commands::SaveCover { id, path } => save_cover(app, &id, &path),
        Commands::BulkCategory { category } => {
            let category = category.unwrap_or(app.selection.category);
            let bulk = app.bulk()?;
            let report = run_sweep(&bulk, bulk.sweep_category(category)).await?;
            println!("{}", print::report_line(&report));
            Ok(())
        }
        Commands::Universe { yes } => {
            let prompt = format!(
                "Generate lists for every empty cell ({} categories x {} ages x {} languages)?",
                StoryCategory::ALL.len(),
                AgeBracket::ALL.len(),
                Language::ALL.len()
            );
            if !confirm(&prompt, yes)? {
                println!("Cancelled.");
                return Ok(());
            }
            let bulk = app.bulk()?;
            let report = run_sweep(&bulk, bulk.sweep_universe()).await?;
            println!("{}", print::report_line(&report));
            Ok(())
        }
        Commands::Paint { yes } => {
            if !confirm("Paint a cover for every story in the library that lacks one?", yes)? {
                println!("Cancelled.");
                return Ok(());
            }
            let bulk = app.bulk()?;
            let report = run_sweep(&bulk, bulk.paint_universe()).await?;
            println!("{}", print::report_line(&report));
            Ok(())
        }
        Commands::Stats { json } => stats(app, json),
        Commands::Export { path } => {
            let path = path.unwrap_or_else(|| PathBuf::from(backup_file_name(Utc::now())));
            let summary = export_backup(&app.library, &path)?;
            println!(
                "Exported {} stories in {} partitions to {}",
                summary.stories,
                summary.partitions,
                path.display()
            );
            Ok(())
        }
        Commands::Import { path } => {
            let summary = import_backup(&app.library, &path)?;
            println!(
                "Imported {} stories in {} partitions from {}",
                summary.stories,
                summary.partitions,
                path.display()
            );
            Ok(())
        }
        Commands::Clear { yes } => {
            if !confirm("Delete every story? This cannot be undone.", yes)? {
                println!("Cancelled.");
                return Ok(());
            }
            app.library.clear_all().await?;
            println!("Library cleared.");
            Ok(())
        }
        Commands::Analyze { image, prompt } => {
            let image = load_image(&image)?;
            let service = app.service()?;
            println!("{}", service.analyze_image(&image, &prompt).await);
            Ok(())
        }
    }
}

fn select(
    app: &mut App,
    category: Option<StoryCategory>,
    age: Option<AgeBracket>,
    language: Option<Language>,
) -> CliResult<()> {
    let changed = category.is_some() || age.is_some() || language.is_some();
    if let Some(category) = category {
        app.selection.category = category;
    }
    if let Some(age) = age {
        app.selection.age_bracket = age;
    }
    if let Some(language) = language {
        app.selection.language = language;
    }
    if changed {
        app.save_selection()?;
    }
    println!("{}", print::selection_line(&app.selection));
    println!("{} stories", app.library.get_by_key(&app.selection.key()).len());
    Ok(())
}

async fn generate(app: &App) -> CliResult<()> {
    let service = app.service()?;
    let key = app.selection.key();
    eprintln!("Generating stories for {}...", print::selection_line(&app.selection));
    let stories = service.generate_partition(key).await?;
    print::print_stories(&app.selection, &stories);
    Ok(())
}

async fn read(app: &App, id: &str) -> CliResult<()> {
    let story = app.find_story(id)?;
    let service = app.service()?;
    if story.needs_content() {
        eprintln!("Writing \"{}\"...", story.title);
    }
    let story = service
        .open_story(&story.partition_key(), &story.id)
        .await
        .ok_or_else(|| CliError::StoryNotFound { id: id.to_string() })?;
    print::print_story(&story);
    Ok(())
}

async fn covers(app: &App) -> CliResult<()> {
    let service = app.service()?;
    let summary = service.paint_partition(&app.selection.key()).await;
    println!(
        "Covers: {} requested, {} painted, {} without image, {} failed",
        summary.requested, summary.painted, summary.no_image, summary.failed
    );
    Ok(())
}

async fn regenerate_cover(app: &App, id: &str) -> CliResult<()> {
    let story = app.find_story(id)?;
    let service = app.service()?;
    let story = service
        .regenerate_cover(&story.partition_key(), &story.id)
        .await
        .ok_or_else(|| CliError::StoryNotFound { id: id.to_string() })?;
    if story.has_cover() {
        println!("New cover for \"{}\".", story.title);
    } else {
        println!("No cover produced for \"{}\".", story.title);
    }
    Ok(())
}

fn save_cover(app: &App, id: &str, path: &Path) -> CliResult<()> {
    let story = app.find_story(id)?;
    let image = story
        .cover_image
        .as_ref()
        .ok_or_else(|| CliError::NoCover { id: id.to_string() })?;
    let written = save_image(image, path)?;
    println!("Saved cover to {}", written.display());
    Ok(())
}

fn stats(app: &App, json: bool) -> CliResult<()> {
    let stats = LibraryStats::compute(&app.library.snapshot());
    if json {
        let rendered = serde_json::to_string_pretty(&stats)
            .map_err(|e| CliError::InvalidInput(e.to_string()))?;
        println!("{}", rendered);
    } else {
        for line in print::stats_lines(&stats) {
            println!("{}", line);
        }
    }
    Ok(())
}

/// Drive a sweep to completion, rendering progress and cancelling it on
/// Ctrl-C.
async fn run_sweep<F>(bulk: &BulkOrchestrator, sweep: F) -> CliResult<SweepReport>
where
    F: Future<Output = StoryverseResult<SweepReport>>,
{
    let renderer = print::spawn_progress_renderer(bulk.subscribe_progress());
    tokio::pin!(sweep);

    let mut cancelling = false;
    let result = loop {
        tokio::select! {
            result = &mut sweep => break result,
            signal = tokio::signal::ctrl_c(), if !cancelling => {
                cancelling = true;
                match signal {
                    Ok(()) => {
                        eprintln!("Cancelling...");
                        bulk.cancel();
                    }
                    Err(e) => tracing::warn!(error = %e, "Cannot listen for Ctrl-C"),
                }
            }
        }
    };

    renderer.abort();
    Ok(result?)
}
