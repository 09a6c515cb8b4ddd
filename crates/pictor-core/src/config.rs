//! Configuration management for pictor
//!
//! Every knob has an explicit default so a missing or partial config file
//! never stops a run. Loaded from `pictor.toml` unless the CLI points
//! elsewhere.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::Result;

/// Top-level configuration for a generation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PictorConfig {
    /// Landing page of the image studio
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// UTF-8 text file holding exactly one prompt
    #[serde(default = "default_prompt_file")]
    pub prompt_file: PathBuf,

    /// Externally-produced session export (JSON with a cookie list)
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,

    /// Where artifacts are written
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,

    /// Where run records, per-run logs, and failure snapshots go
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Browser launch options
    #[serde(default)]
    pub browser: BrowserOptions,

    /// Polling, retry, and budget knobs
    #[serde(default)]
    pub timing: TimingConfig,

    /// DOM probes for the target site
    #[serde(default)]
    pub selectors: SelectorConfig,
}

/// Browser launch options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserOptions {
    /// Run without a visible window (default: true)
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Browser window width
    #[serde(default = "default_window_width")]
    pub window_width: u32,

    /// Browser window height
    #[serde(default = "default_window_height")]
    pub window_height: u32,

    /// User agent string
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Navigation and element-wait timeout in seconds
    #[serde(default = "default_nav_timeout_secs")]
    pub nav_timeout_secs: u64,
}

/// Polling, retry, and budget parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Seconds between completion-signal polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Per-attempt budget for the completion watch
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,

    /// Attempt ceiling across the whole run
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First inter-attempt delay; doubles each retry
    #[serde(default = "default_base_retry_delay_secs")]
    pub base_retry_delay_secs: u64,

    /// Cap on the doubled retry delay
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,

    /// Wall-clock ceiling for the whole run, all attempts combined
    #[serde(default = "default_max_session_secs")]
    pub max_session_secs: u64,
}

/// DOM probes for the target site
///
/// Plain entries are CSS selectors. The `text=` form matches visible
/// elements whose text contains the needle, for controls that have no
/// stable class or id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Prompt input field
    #[serde(default = "default_prompt_input")]
    pub prompt_input: String,

    /// Control that starts a generation
    #[serde(default = "default_generate_button")]
    pub generate_button: String,

    /// Marker that the generation finished (distinct from the progress UI)
    #[serde(default = "default_ready_signal")]
    pub ready_signal: String,

    /// The full-resolution asset, as opposed to any preview thumbnail
    #[serde(default = "default_final_image")]
    pub final_image: String,

    /// In-flight progress indicator, observed for debug visibility only
    #[serde(default = "default_progress")]
    pub progress: String,

    /// Explicit failure markers; any of these visible fails the attempt
    #[serde(default = "default_error_banners")]
    pub error_banners: Vec<String>,
}

// Default value providers

fn default_base_url() -> String {
    "https://sora.com".to_string()
}

fn default_prompt_file() -> PathBuf {
    PathBuf::from("prompt.txt")
}

fn default_session_file() -> PathBuf {
    PathBuf::from("session.json")
}

fn default_image_dir() -> PathBuf {
    PathBuf::from("images")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_headless() -> bool {
    true
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

fn default_nav_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_generation_timeout_secs() -> u64 {
    600
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_retry_delay_secs() -> u64 {
    2
}

fn default_max_backoff_secs() -> u64 {
    60
}

fn default_max_session_secs() -> u64 {
    600
}

fn default_prompt_input() -> String {
    "textarea".to_string()
}

fn default_generate_button() -> String {
    "text=Generate".to_string()
}

fn default_ready_signal() -> String {
    "text=Download".to_string()
}

fn default_final_image() -> String {
    "img.fullsize-image".to_string()
}

fn default_progress() -> String {
    ".progress-indicator".to_string()
}

fn default_error_banners() -> Vec<String> {
    vec![
        ".error-message".to_string(),
        "[data-testid='error']".to_string(),
        "text=An error occurred".to_string(),
        "text=Something went wrong".to_string(),
    ]
}

impl PictorConfig {
    /// Load configuration from the given file or use defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content).map_err(|e| {
                crate::PictorError::Config(format!(
                    "failed to parse {}: {}",
                    path.display(),
                    e
                ))
            })?)
        } else {
            Ok(Self::default())
        }
    }

    /// Write the default configuration to the given file
    pub fn write_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let config = Self::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| crate::PictorError::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl Default for PictorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            prompt_file: default_prompt_file(),
            session_file: default_session_file(),
            image_dir: default_image_dir(),
            log_dir: default_log_dir(),
            browser: BrowserOptions::default(),
            timing: TimingConfig::default(),
            selectors: SelectorConfig::default(),
        }
    }
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            window_width: default_window_width(),
            window_height: default_window_height(),
            user_agent: None,
            nav_timeout_secs: default_nav_timeout_secs(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            generation_timeout_secs: default_generation_timeout_secs(),
            max_retries: default_max_retries(),
            base_retry_delay_secs: default_base_retry_delay_secs(),
            max_backoff_secs: default_max_backoff_secs(),
            max_session_secs: default_max_session_secs(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            prompt_input: default_prompt_input(),
            generate_button: default_generate_button(),
            ready_signal: default_ready_signal(),
            final_image: default_final_image(),
            progress: default_progress(),
            error_banners: default_error_banners(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = PictorConfig::default();
        assert!(config.browser.headless);
        assert_eq!(config.timing.max_retries, 3);
        assert_eq!(config.timing.poll_interval_secs, 2);
        assert_eq!(config.timing.base_retry_delay_secs, 2);
        assert_eq!(config.timing.max_session_secs, 600);
        assert_eq!(config.prompt_file, PathBuf::from("prompt.txt"));
        assert_eq!(config.selectors.error_banners.len(), 4);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config =
            PictorConfig::load_or_default(&temp_dir.path().join("does-not-exist.toml")).unwrap();
        assert_eq!(config.timing.max_retries, 3);
    }

    #[test]
    fn test_partial_file_fills_remaining_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pictor.toml");
        std::fs::write(
            &path,
            "prompt_file = \"other.txt\"\n\n[timing]\nmax_retries = 5\n",
        )
        .unwrap();

        let config = PictorConfig::load_or_default(&path).unwrap();
        assert_eq!(config.prompt_file, PathBuf::from("other.txt"));
        assert_eq!(config.timing.max_retries, 5);
        // Untouched fields keep their defaults
        assert_eq!(config.timing.poll_interval_secs, 2);
        assert_eq!(config.session_file, PathBuf::from("session.json"));
    }

    #[test]
    fn test_invalid_file_is_a_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pictor.toml");
        std::fs::write(&path, "timing = \"not a table\"").unwrap();

        let err = PictorConfig::load_or_default(&path).unwrap_err();
        assert!(matches!(err, crate::PictorError::Config(_)));
    }

    #[test]
    fn test_write_default_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pictor.toml");

        PictorConfig::write_default(&path).unwrap();
        let config = PictorConfig::load_or_default(&path).unwrap();

        assert_eq!(config.base_url, default_base_url());
        assert_eq!(config.timing.generation_timeout_secs, 600);
    }
}
