//! Core data types for a generation run

use crate::error::{PictorError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::Duration;

/// Hex characters of the prompt digest used in artifact filenames.
const PROMPT_HASH_LEN: usize = 6;

/// A validated, trimmed prompt.
///
/// Construction is the only validation point: a `Prompt` value is always
/// non-empty. Naming identity is the SHA-256 digest of the trimmed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    text: String,
}

impl Prompt {
    /// Trim and validate raw prompt text.
    pub fn new(raw: &str) -> Result<Self> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(PictorError::EmptyPrompt(
                "prompt is empty after trimming whitespace".to_string(),
            ));
        }
        Ok(Self {
            text: text.to_string(),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Fixed-length hash prefix used in artifact filenames.
    ///
    /// Deterministic for a given trimmed prompt, so re-runs of the same
    /// prompt produce names that differ only in their timestamp part.
    pub fn hash_prefix(&self) -> String {
        let digest = Sha256::digest(self.text.as_bytes());
        let mut hash = hex::encode(digest);
        hash.truncate(PROMPT_HASH_LEN);
        hash
    }
}

impl std::fmt::Display for Prompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// One submission to the remote surface. Created fresh per attempt.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: Prompt,
    pub submitted_at: DateTime<Utc>,
}

impl GenerationRequest {
    pub fn new(prompt: Prompt) -> Self {
        Self {
            prompt,
            submitted_at: Utc::now(),
        }
    }
}

/// Terminal result of one submit -> watch -> fetch attempt.
#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    /// The final asset was fetched.
    Ready { bytes: Vec<u8>, elapsed: Duration },
    /// The surface reported an explicit failure (error banner, bad payload).
    Failed { reason: String, elapsed: Duration },
    /// No completion signal appeared within the watch budget.
    TimedOut { elapsed: Duration },
}

impl GenerationOutcome {
    pub fn elapsed(&self) -> Duration {
        match self {
            GenerationOutcome::Ready { elapsed, .. }
            | GenerationOutcome::Failed { elapsed, .. }
            | GenerationOutcome::TimedOut { elapsed } => *elapsed,
        }
    }

    /// Human-readable description for run records.
    pub fn describe(&self) -> String {
        match self {
            GenerationOutcome::Ready { bytes, .. } => {
                format!("generation completed ({} bytes)", bytes.len())
            }
            GenerationOutcome::Failed { reason, .. } => reason.clone(),
            GenerationOutcome::TimedOut { elapsed } => {
                format!("no completion signal within {}s", elapsed.as_secs())
            }
        }
    }
}

/// Metadata for a persisted image artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Final path under the configured image directory
    pub path: PathBuf,
    /// Hash prefix of the prompt that produced it
    pub prompt_hash: String,
    /// Size in bytes
    pub size_bytes: u64,
    /// When persisted
    pub created_at: DateTime<Utc>,
}

/// Terminal status of an attempt or a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Success,
    Failure,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Success => write!(f, "SUCCESS"),
            RunStatus::Failure => write!(f, "FAILURE"),
        }
    }
}

/// Append-only log entry. One per attempt, plus one terminal entry per run.
///
/// `attempt` is `None` on the terminal entry. Never mutated after emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub timestamp: DateTime<Utc>,
    pub run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    pub prompt: String,
    pub status: RunStatus,
    /// Artifact path on success, error detail on failure
    pub detail: String,
    pub duration_secs: f64,
}

impl RunRecord {
    /// Record for one attempt within a run.
    pub fn for_attempt(
        run_id: &str,
        attempt: u32,
        prompt: &str,
        status: RunStatus,
        detail: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            run_id: run_id.to_string(),
            attempt: Some(attempt),
            prompt: prompt.to_string(),
            status,
            detail: detail.into(),
            duration_secs: elapsed.as_secs_f64(),
        }
    }

    /// Terminal record for a whole run.
    pub fn for_run(
        run_id: &str,
        prompt: &str,
        status: RunStatus,
        detail: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            run_id: run_id.to_string(),
            attempt: None,
            prompt: prompt.to_string(),
            status,
            detail: detail.into(),
            duration_secs: elapsed.as_secs_f64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_trims_whitespace() {
        let prompt = Prompt::new("  a cat in the rain \n").unwrap();
        assert_eq!(prompt.text(), "a cat in the rain");
    }

    #[test]
    fn test_empty_prompt_rejected() {
        assert!(matches!(
            Prompt::new("   \n\t  "),
            Err(PictorError::EmptyPrompt(_))
        ));
        assert!(matches!(Prompt::new(""), Err(PictorError::EmptyPrompt(_))));
    }

    #[test]
    fn test_hash_prefix_deterministic() {
        let a = Prompt::new("a red balloon").unwrap();
        let b = Prompt::new("  a red balloon  ").unwrap();
        assert_eq!(a.hash_prefix(), b.hash_prefix());
        assert_eq!(a.hash_prefix().len(), 6);
    }

    #[test]
    fn test_hash_prefix_varies_with_content() {
        let a = Prompt::new("a red balloon").unwrap();
        let b = Prompt::new("a blue balloon").unwrap();
        assert_ne!(a.hash_prefix(), b.hash_prefix());
    }

    #[test]
    fn test_generation_request_stamps_submission_time() {
        let prompt = Prompt::new("a cat").unwrap();
        let before = Utc::now();
        let request = GenerationRequest::new(prompt.clone());
        assert_eq!(request.prompt, prompt);
        assert!(request.submitted_at >= before);
        assert!(request.submitted_at <= Utc::now());
    }

    #[test]
    fn test_run_status_display() {
        assert_eq!(RunStatus::Success.to_string(), "SUCCESS");
        assert_eq!(RunStatus::Failure.to_string(), "FAILURE");
    }

    #[test]
    fn test_run_record_serializes_status_uppercase() {
        let record = RunRecord::for_attempt(
            "run-1",
            1,
            "a cat",
            RunStatus::Failure,
            "timed out",
            Duration::from_secs(3),
        );
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"FAILURE\""));
        assert!(json.contains("\"attempt\":1"));
    }

    #[test]
    fn test_terminal_record_omits_attempt() {
        let record = RunRecord::for_run(
            "run-1",
            "a cat",
            RunStatus::Success,
            "images/x.png",
            Duration::from_secs(10),
        );
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("\"attempt\""));
    }

    #[test]
    fn test_outcome_describe() {
        let ready = GenerationOutcome::Ready {
            bytes: vec![0u8; 16],
            elapsed: Duration::from_secs(1),
        };
        assert!(ready.describe().contains("16 bytes"));

        let timed_out = GenerationOutcome::TimedOut {
            elapsed: Duration::from_secs(42),
        };
        assert!(timed_out.describe().contains("42s"));
    }
}
