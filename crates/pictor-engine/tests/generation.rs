//! End-to-end runs against the mock surface.

use pictor_browser::{AttemptScript, MockSurface, SessionHandle};
use pictor_core::{PictorConfig, PictorError};
use pictor_engine::{preflight, run_with_surface};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// A config whose files and directories all live in the temp dir, with
/// delays zeroed so failing attempts retry instantly.
fn test_config(dir: &TempDir) -> PictorConfig {
    let mut config = PictorConfig::default();
    config.prompt_file = dir.path().join("prompt.txt");
    config.session_file = dir.path().join("session.json");
    config.image_dir = dir.path().join("images");
    config.log_dir = dir.path().join("logs");
    config.timing.base_retry_delay_secs = 0;
    config.timing.poll_interval_secs = 0;
    config.timing.generation_timeout_secs = 1;
    config.timing.max_session_secs = 10;
    config
}

fn write_inputs(dir: &TempDir, prompt: &str) {
    std::fs::write(dir.path().join("prompt.txt"), prompt).unwrap();
    std::fs::write(
        dir.path().join("session.json"),
        r#"{"cookies": [{"name": "auth", "value": "abc"}]}"#,
    )
    .unwrap();
}

fn artifact_count(image_dir: &Path) -> usize {
    match std::fs::read_dir(image_dir) {
        Ok(entries) => entries
            .filter(|e| {
                e.as_ref()
                    .map(|e| e.path().extension().is_some_and(|ext| ext == "png"))
                    .unwrap_or(false)
            })
            .count(),
        Err(_) => 0,
    }
}

#[tokio::test]
async fn empty_prompt_fails_without_surface_interaction() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    std::fs::write(&config.prompt_file, "   \n").unwrap();
    std::fs::write(
        &config.session_file,
        r#"{"cookies": [{"name": "auth", "value": "abc"}]}"#,
    )
    .unwrap();

    let err = preflight(&config).await.unwrap_err();
    assert!(matches!(err, PictorError::EmptyPrompt(_)));
}

#[tokio::test]
async fn missing_session_fails_without_surface_interaction() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    std::fs::write(&config.prompt_file, "a cat").unwrap();

    let err = preflight(&config).await.unwrap_err();
    assert!(matches!(err, PictorError::MissingSession(_)));
}

#[tokio::test]
async fn successful_run_writes_one_artifact_and_terminal_record() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    write_inputs(&dir, "a lighthouse at dusk");

    let mock = MockSurface::new().with_attempt(AttemptScript::Ready { after_polls: 0 });
    let inputs = preflight(&config).await.unwrap();
    let artifact = run_with_surface(&config, &mock, inputs).await.unwrap();

    assert!(artifact.path.exists());
    assert_eq!(mock.open_count(), 1);
    assert_eq!(mock.submit_count(), 1);
    assert_eq!(artifact_count(&config.image_dir), 1);

    let records = std::fs::read_to_string(config.log_dir.join("runs.jsonl")).unwrap();
    let lines: Vec<&str> = records.lines().collect();
    // One attempt record plus one terminal record
    assert_eq!(lines.len(), 2);
    let terminal: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(terminal["status"], "SUCCESS");
    assert!(terminal["detail"]
        .as_str()
        .unwrap()
        .ends_with(&format!("_{}.png", artifact.prompt_hash)));
}

#[tokio::test]
async fn failed_attempts_then_success_makes_three_submissions() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    write_inputs(&dir, "a lighthouse at dusk");

    let mock = MockSurface::new()
        .with_attempt(AttemptScript::ErrorBanner {
            message: "An error occurred".to_string(),
        })
        .with_attempt(AttemptScript::ErrorBanner {
            message: "An error occurred".to_string(),
        })
        .with_attempt(AttemptScript::Ready { after_polls: 0 });

    let inputs = preflight(&config).await.unwrap();
    let artifact = run_with_surface(&config, &mock, inputs).await.unwrap();

    assert_eq!(mock.submit_count(), 3);
    assert_eq!(mock.download_count(), 1);
    assert!(artifact.path.exists());
    assert_eq!(artifact_count(&config.image_dir), 1);
}

#[tokio::test]
async fn silent_surface_exhausts_retries_within_budget() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.timing.generation_timeout_secs = 1;
    config.timing.max_session_secs = 3;
    write_inputs(&dir, "a lighthouse at dusk");

    let mock = MockSurface::new().with_attempt(AttemptScript::Silent);
    let inputs = preflight(&config).await.unwrap();

    let started = std::time::Instant::now();
    let err = run_with_surface(&config, &mock, inputs).await.unwrap_err();
    assert!(matches!(err, PictorError::GenerationFailed { .. }));
    assert_eq!(artifact_count(&config.image_dir), 0);
    // Bounded by the total budget plus a small epsilon, never a hang
    assert!(started.elapsed() < Duration::from_secs(6));

    let records = std::fs::read_to_string(config.log_dir.join("runs.jsonl")).unwrap();
    let terminal: serde_json::Value =
        serde_json::from_str(records.lines().last().unwrap()).unwrap();
    assert_eq!(terminal["status"], "FAILURE");
    assert!(terminal.get("attempt").is_none());
}

#[tokio::test]
async fn rerunning_after_success_produces_a_second_distinct_artifact() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    write_inputs(&dir, "a lighthouse at dusk");

    let mock = MockSurface::new().with_attempt(AttemptScript::Ready { after_polls: 0 });

    let first = run_with_surface(&config, &mock, preflight(&config).await.unwrap())
        .await
        .unwrap();
    let second = run_with_surface(&config, &mock, preflight(&config).await.unwrap())
        .await
        .unwrap();

    assert_ne!(first.path, second.path);
    assert_eq!(first.prompt_hash, second.prompt_hash);
    assert_eq!(artifact_count(&config.image_dir), 2);
}

#[tokio::test]
async fn open_failure_is_a_terminal_run_failure() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    write_inputs(&dir, "a lighthouse at dusk");

    let mock = MockSurface::new().with_open_error(pictor_core::SurfaceErrorKind::Network);
    let inputs = preflight(&config).await.unwrap();

    let err = run_with_surface(&config, &mock, inputs).await.unwrap_err();
    assert!(matches!(err, PictorError::Surface { .. }));
    assert_eq!(mock.submit_count(), 0);
    assert_eq!(artifact_count(&config.image_dir), 0);
}

#[tokio::test]
async fn validated_session_reports_cookie_count() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("session.json"),
        r#"{"cookies": [{"name": "a", "value": "1"}, {"name": "b", "value": "2"}]}"#,
    )
    .unwrap();
    let session = SessionHandle::validate(&dir.path().join("session.json")).unwrap();
    assert_eq!(session.cookie_count(), 2);
}
