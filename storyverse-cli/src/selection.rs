//! Persistence for the current selection.

use std::path::Path;

use storyverse_core::LibrarySelection;

#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub fn load(path: &Path) -> Result<Option<LibrarySelection>, SelectionError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)?;
    let selection = serde_json::from_str::<LibrarySelection>(&contents)?;
    Ok(Some(selection))
}

/// The saved selection, or the default when none is saved or it is
/// unreadable.
pub fn load_or_default(path: &Path) -> LibrarySelection {
    match load(path) {
        Ok(Some(selection)) => selection,
        Ok(None) => LibrarySelection::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable selection");
            LibrarySelection::default()
        }
    }
}

pub fn save(path: &Path, selection: &LibrarySelection) -> Result<(), SelectionError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(selection)?;
    std::fs::write(path, contents)?;
    Ok(())
}
