//! Run orchestration
//!
//! One run = preflight → open surface → attempt loop → persist → terminal
//! record. Preflight validates the prompt and session before any browser
//! work, so precondition failures cost nothing and touch nothing.

use pictor_browser::{ChromeSurface, RemoteSurface, SessionHandle};
use pictor_core::{Artifact, PictorConfig, Prompt, Result, RunRecord, RunStatus};
use std::time::Instant;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::artifact::ArtifactWriter;
use crate::prompt::PromptSource;
use crate::retry::{RetryCoordinator, Schedule};
use crate::run_log::RunLog;

/// Validated inputs of a run, with no surface touched yet.
#[derive(Debug)]
pub struct Preflight {
    pub prompt: Prompt,
    pub session: SessionHandle,
}

/// Validate the prompt and session files.
///
/// Fails with the empty-prompt or missing-session error without any browser
/// interaction; the `check` command uses this as a dry run.
pub async fn preflight(config: &PictorConfig) -> Result<Preflight> {
    let prompt = PromptSource::new(&config.prompt_file).read().await?;
    let session = SessionHandle::validate(&config.session_file)?;
    Ok(Preflight { prompt, session })
}

/// Execute one full generation run with a real browser.
pub async fn run(config: &PictorConfig) -> Result<Artifact> {
    let inputs = preflight(config).await?;
    let surface = ChromeSurface::launch(config).await?;
    run_with_surface(config, &surface, inputs).await
}

/// Execute one run against any surface implementation.
///
/// The surface is borrowed exclusively for the whole run; the remote
/// application supports one active generation per session, so no other run
/// may share it.
pub async fn run_with_surface<S: RemoteSurface + ?Sized>(
    config: &PictorConfig,
    surface: &S,
    inputs: Preflight,
) -> Result<Artifact> {
    let run_id = Uuid::new_v4().to_string();
    let span = info_span!("run", run_id = %run_id);

    async {
        let started = Instant::now();
        let log = RunLog::new(&config.log_dir);
        info!("starting generation for {}-char prompt", inputs.prompt.text().len());

        let result = execute(config, surface, &inputs, &log, &run_id).await;

        let elapsed = started.elapsed();
        match &result {
            Ok(artifact) => {
                info!(
                    "run succeeded in {:.1}s: {}",
                    elapsed.as_secs_f64(),
                    artifact.path.display()
                );
                log.append(&RunRecord::for_run(
                    &run_id,
                    inputs.prompt.text(),
                    RunStatus::Success,
                    artifact.path.display().to_string(),
                    elapsed,
                ))
                .await;
            }
            Err(e) => {
                error!("run failed after {:.1}s: {}", elapsed.as_secs_f64(), e);
                log.append(&RunRecord::for_run(
                    &run_id,
                    inputs.prompt.text(),
                    RunStatus::Failure,
                    e.to_string(),
                    elapsed,
                ))
                .await;
            }
        }
        result
    }
    .instrument(span)
    .await
}

async fn execute<S: RemoteSurface + ?Sized>(
    config: &PictorConfig,
    surface: &S,
    inputs: &Preflight,
    log: &RunLog,
    run_id: &str,
) -> Result<Artifact> {
    surface.open(&inputs.session).await?;

    let coordinator = RetryCoordinator::new(Schedule::from(&config.timing), &config.selectors);
    let bytes = coordinator
        .run(surface, &inputs.prompt, log, run_id, &config.log_dir)
        .await?;

    ArtifactWriter::new(&config.image_dir)
        .persist(&bytes, &inputs.prompt)
        .await
}
