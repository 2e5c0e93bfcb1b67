//! File helpers: image input, cover output, confirmations.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use storyverse_core::ImageRef;

use crate::error::{CliError, CliResult};

/// Read an image file into an inline reference, typed by its extension.
pub fn load_image(path: &Path) -> CliResult<ImageRef> {
    let mime = mime_guess::from_path(path)
        .first()
        .filter(|m| m.type_() == mime_guess::mime::IMAGE)
        .ok_or_else(|| {
            CliError::InvalidInput(format!("{} is not a recognised image file", path.display()))
        })?;
    let bytes = std::fs::read(path).map_err(|source| CliError::InputFile {
        path: path.display().to_string(),
        source,
    })?;
    Ok(ImageRef::from_bytes(mime.essence_str(), &bytes))
}

/// `path` with an extension matching `mime` when it has none.
pub fn cover_output_path(path: &Path, mime: &str) -> PathBuf {
    if path.extension().is_some() {
        return path.to_path_buf();
    }
    match mime_guess::get_mime_extensions_str(mime).and_then(|exts| exts.first()) {
        Some(ext) => path.with_extension(ext),
        None => path.to_path_buf(),
    }
}

/// Decode `image` and write it next to `path`.
///
/// # Returns
/// The path actually written.
pub fn save_image(image: &ImageRef, path: &Path) -> CliResult<PathBuf> {
    let bytes = image
        .decode()
        .map_err(|e| CliError::Storyverse(e.into()))?;
    let target = cover_output_path(path, image.mime_type());
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&target, bytes)?;
    Ok(target)
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Ask a yes/no question on stderr, reading the answer from `input`.
pub fn confirm_with<R: BufRead>(prompt: &str, assume_yes: bool, input: &mut R) -> CliResult<bool> {
    if assume_yes {
        return Ok(true);
    }
    eprint!("{} [y/N] ", prompt);
    std::io::stderr().flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(is_affirmative(&answer))
}

pub fn confirm(prompt: &str, assume_yes: bool) -> CliResult<bool> {
    let stdin = std::io::stdin();
    let mut lock = stdin.lock();
    confirm_with(prompt, assume_yes, &mut lock)
}
