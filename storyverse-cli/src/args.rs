//! Command-line surface of the `storyverse` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use storyverse_core::{AgeBracket, Language, StoryCategory};

#[derive(Parser, Debug)]
#[command(name = "storyverse", version, about = "Generate and browse a library of children's stories", long_about = None)]
pub struct Cli {
    /// Config file (TOML); falls back to STORYVERSE_CONFIG, then defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show or change the current category, age bracket, and language
    Select {
        #[arg(long, short = 'c')]
        category: Option<StoryCategory>,
        #[arg(long, short = 'a')]
        age: Option<AgeBracket>,
        #[arg(long, short = 'l')]
        language: Option<Language>,
    },
    /// List the stories of the current selection
    List,
    /// Generate a fresh story list for the current selection
    Generate,
    /// Read a story, generating its full text on first open
    Read { id: String },
    /// Paint covers for every story of the current selection lacking one
    Covers,
    /// Replace the cover of one story
    RegenerateCover { id: String },
    /// Write a story's cover image to a file
    SaveCover { id: String, path: PathBuf },
    /// Generate lists for every empty cell of a category
    BulkCategory {
        /// Defaults to the selected category
        #[arg(long, short = 'c')]
        category: Option<StoryCategory>,
    },
    /// Generate lists for every empty cell of the library
    Universe {
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Paint covers for every story of the library lacking one
    Paint {
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Library statistics
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Write a JSON backup of the whole library
    Export {
        /// Defaults to storyverse_backup_<timestamp>.json in the working directory
        path: Option<PathBuf>,
    },
    /// Merge a JSON backup into the library
    Import { path: PathBuf },
    /// Delete every story
    Clear {
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Describe an image for a child
    Analyze {
        image: PathBuf,
        #[arg(long, short = 'p', default_value = "")]
        prompt: String,
    },
}
