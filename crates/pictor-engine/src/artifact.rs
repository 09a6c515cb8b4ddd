//! Artifact writer
//!
//! Persists fetched bytes exactly once under a deterministic,
//! collision-resistant name: `YYYYMMDD_HHMMSS_<hash-prefix>.png`. A name
//! collision gets a numeric suffix, never a silent replace. The write is
//! atomic from the caller's perspective: bytes land in a staging file in
//! the target directory, and the final name is claimed with an exclusive
//! hard link, so a name either refers to a complete payload or nothing.

use chrono::{Local, Utc};
use pictor_core::{Artifact, PictorError, Prompt, Result, SurfaceErrorKind};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// The 8-byte PNG file signature.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Ceiling on accepted asset size (32 MiB). Anything bigger is not a
/// plausible single generated image.
const MAX_ARTIFACT_BYTES: usize = 32 * 1024 * 1024;

/// Disambiguation suffixes tried before giving up on a colliding name.
const MAX_DISAMBIGUATION: u32 = 99;

/// Gate a downloaded payload before it may be persisted.
///
/// A login page or an error document fetched where the image should be fails
/// here, which turns it into a failed attempt rather than a bogus artifact.
pub fn validate_png(bytes: &[u8]) -> Result<()> {
    if bytes.is_empty() {
        return Err(PictorError::surface(
            SurfaceErrorKind::Unknown,
            "downloaded payload is empty",
        ));
    }
    if bytes.len() < PNG_SIGNATURE.len() || bytes[..PNG_SIGNATURE.len()] != PNG_SIGNATURE {
        return Err(PictorError::surface(
            SurfaceErrorKind::Unknown,
            format!("downloaded payload is not a PNG ({} bytes)", bytes.len()),
        ));
    }
    if bytes.len() > MAX_ARTIFACT_BYTES {
        return Err(PictorError::surface(
            SurfaceErrorKind::Unknown,
            format!(
                "downloaded payload of {} bytes exceeds the {} MiB ceiling",
                bytes.len(),
                MAX_ARTIFACT_BYTES / (1024 * 1024)
            ),
        ));
    }
    Ok(())
}

/// Writes artifacts into one output directory.
pub struct ArtifactWriter {
    image_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(image_dir: impl Into<PathBuf>) -> Self {
        Self {
            image_dir: image_dir.into(),
        }
    }

    /// Persist the bytes under a fresh name derived from the current local
    /// timestamp and the prompt's hash prefix.
    pub async fn persist(&self, bytes: &[u8], prompt: &Prompt) -> Result<Artifact> {
        tokio::fs::create_dir_all(&self.image_dir).await?;

        let stem = format!(
            "{}_{}",
            Local::now().format("%Y%m%d_%H%M%S"),
            prompt.hash_prefix()
        );

        // Stage the complete bytes in the target directory, then claim the
        // final name with a hard link. Link creation fails if the target
        // already exists, so checking and claiming a name is one atomic
        // step and an existing file can never be clobbered; the final name
        // only ever refers to the complete payload.
        let tmp = self.image_dir.join(format!(".{}.tmp", stem));
        tokio::fs::write(&tmp, bytes).await?;
        let claimed = self.claim_name(&tmp, &stem).await;
        let _ = tokio::fs::remove_file(&tmp).await;
        let path = claimed?;

        info!("artifact written to {} ({} bytes)", path.display(), bytes.len());
        Ok(Artifact {
            path,
            prompt_hash: prompt.hash_prefix(),
            size_bytes: bytes.len() as u64,
            created_at: Utc::now(),
        })
    }

    /// Link the staged file to the first free name for this stem:
    /// `<stem>.png`, then `<stem>-1.png` up to the disambiguation bound.
    async fn claim_name(&self, staged: &Path, stem: &str) -> Result<PathBuf> {
        let candidate = self.image_dir.join(format!("{}.png", stem));
        match tokio::fs::hard_link(staged, &candidate).await {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                warn!(
                    "artifact name {} already taken, disambiguating",
                    candidate.display()
                );
            }
            Err(e) => return Err(e.into()),
        }

        for suffix in 1..=MAX_DISAMBIGUATION {
            let candidate = self.image_dir.join(format!("{}-{}.png", stem, suffix));
            match tokio::fs::hard_link(staged, &candidate).await {
                Ok(()) => return Ok(candidate),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(PictorError::WriteConflict(format!(
            "{} variants of {}.png already exist in {}",
            MAX_DISAMBIGUATION,
            stem,
            self.image_dir.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn png_payload(tail: &[u8]) -> Vec<u8> {
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(tail);
        bytes
    }

    #[test]
    fn test_validate_accepts_png() {
        assert!(validate_png(&png_payload(b"data")).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_and_non_png() {
        assert!(validate_png(&[]).is_err());
        assert!(validate_png(b"<html></html>").is_err());
    }

    #[test]
    fn test_validate_rejects_oversized() {
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.resize(MAX_ARTIFACT_BYTES + 1, 0);
        assert!(validate_png(&bytes).is_err());
    }

    #[tokio::test]
    async fn test_persist_writes_named_file() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path());
        let prompt = Prompt::new("a red balloon").unwrap();

        let artifact = writer.persist(&png_payload(b"img"), &prompt).await.unwrap();
        let name = artifact.path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with(&format!("_{}.png", prompt.hash_prefix())));
        assert_eq!(artifact.size_bytes, 8 + 3);
        assert!(artifact.path.exists());
        // No temporary file left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_collision_disambiguates_and_preserves_original() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path());
        let prompt = Prompt::new("a red balloon").unwrap();

        let first = writer.persist(&png_payload(b"one"), &prompt).await.unwrap();
        // Same prompt within the same second collides on the full name
        let second = writer.persist(&png_payload(b"two"), &prompt).await.unwrap();

        assert_ne!(first.path, second.path);
        assert_eq!(std::fs::read(&first.path).unwrap(), png_payload(b"one"));
        assert_eq!(std::fs::read(&second.path).unwrap(), png_payload(b"two"));
    }

    #[tokio::test]
    async fn test_pre_existing_file_never_overwritten() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path());
        let prompt = Prompt::new("a red balloon").unwrap();

        let stem = format!(
            "{}_{}",
            Local::now().format("%Y%m%d_%H%M%S"),
            prompt.hash_prefix()
        );
        let existing = dir.path().join(format!("{}.png", stem));
        std::fs::write(&existing, b"precious original").unwrap();

        let artifact = writer.persist(&png_payload(b"new"), &prompt).await.unwrap();
        assert_eq!(std::fs::read(&existing).unwrap(), b"precious original");
        assert_ne!(artifact.path, existing);
    }

    #[tokio::test]
    async fn test_claim_skips_every_pre_created_name() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path());
        let prompt = Prompt::new("a red balloon").unwrap();

        let stem = format!(
            "{}_{}",
            Local::now().format("%Y%m%d_%H%M%S"),
            prompt.hash_prefix()
        );
        let taken = dir.path().join(format!("{}.png", stem));
        let taken_1 = dir.path().join(format!("{}-1.png", stem));
        std::fs::write(&taken, b"first occupant").unwrap();
        std::fs::write(&taken_1, b"second occupant").unwrap();

        let artifact = writer.persist(&png_payload(b"new"), &prompt).await.unwrap();
        assert_ne!(artifact.path, taken);
        assert_ne!(artifact.path, taken_1);
        assert_eq!(std::fs::read(&taken).unwrap(), b"first occupant");
        assert_eq!(std::fs::read(&taken_1).unwrap(), b"second occupant");
        assert_eq!(std::fs::read(&artifact.path).unwrap(), png_payload(b"new"));
        // Staging file is gone once the name is claimed
        assert!(!dir.path().join(format!(".{}.tmp", stem)).exists());
    }

    #[tokio::test]
    async fn test_creates_missing_output_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("out").join("images");
        let writer = ArtifactWriter::new(&nested);
        let prompt = Prompt::new("a red balloon").unwrap();

        let artifact = writer.persist(&png_payload(b"img"), &prompt).await.unwrap();
        assert!(artifact.path.starts_with(&nested));
    }
}
