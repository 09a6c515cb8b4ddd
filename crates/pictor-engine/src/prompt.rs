//! Prompt source
//!
//! Reads exactly one prompt from a UTF-8 text file. A missing file and a
//! whitespace-only file are the same precondition failure; there is no
//! default prompt to fall back to.

use pictor_core::{PictorError, Prompt, Result};
use std::path::PathBuf;
use tracing::debug;

/// File-backed prompt source.
pub struct PromptSource {
    path: PathBuf,
}

impl PromptSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read, trim, and validate the prompt. No side effects beyond the read.
    pub async fn read(&self) -> Result<Prompt> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PictorError::EmptyPrompt(format!("prompt file not found: {}", self.path.display()))
            } else {
                PictorError::Io(e)
            }
        })?;

        let prompt = Prompt::new(&raw)?;
        debug!("read {}-char prompt from {}", prompt.text().len(), self.path.display());
        Ok(prompt)
    }
}
