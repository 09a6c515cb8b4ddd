//! Retry coordinator
//!
//! Wraps submit → watch → fetch as one attempt unit and retries it under two
//! ceilings: the attempt count and the total wall-clock budget, whichever is
//! hit first. Every retry performs a fresh submission; no partial state
//! carries across attempts. Backoff doubles per attempt and is capped, and
//! both the watch budget and the backoff sleep are clipped to the run
//! deadline so the run can never meaningfully overshoot it.

use pictor_browser::RemoteSurface;
use pictor_core::fail_open::fail_open;
use pictor_core::{
    GenerationOutcome, GenerationRequest, PictorError, Prompt, Result, RunRecord, RunStatus,
    SelectorConfig, TimingConfig,
};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::artifact::validate_png;
use crate::run_log::RunLog;
use crate::watcher::{CompletionWatcher, WatchOutcome};

/// Timing knobs as durations, derived from [`TimingConfig`].
///
/// Tests construct this directly with millisecond-scale values.
#[derive(Debug, Clone)]
pub struct Schedule {
    pub poll_interval: Duration,
    pub generation_timeout: Duration,
    pub max_retries: u32,
    pub base_retry_delay: Duration,
    pub max_backoff: Duration,
    pub total_budget: Duration,
}

impl From<&TimingConfig> for Schedule {
    fn from(timing: &TimingConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(timing.poll_interval_secs),
            generation_timeout: Duration::from_secs(timing.generation_timeout_secs),
            max_retries: timing.max_retries,
            base_retry_delay: Duration::from_secs(timing.base_retry_delay_secs),
            max_backoff: Duration::from_secs(timing.max_backoff_secs),
            total_budget: Duration::from_secs(timing.max_session_secs),
        }
    }
}

/// Drives the attempt loop for one run.
pub struct RetryCoordinator<'a> {
    schedule: Schedule,
    selectors: &'a SelectorConfig,
}

impl<'a> RetryCoordinator<'a> {
    pub fn new(schedule: Schedule, selectors: &'a SelectorConfig) -> Self {
        Self {
            schedule,
            selectors,
        }
    }

    /// Run attempts until one yields the final asset bytes.
    ///
    /// Emits one run record per attempt and a diagnostic screenshot per
    /// failed attempt (best effort). Fails with `GenerationFailed` once the
    /// attempt ceiling or the total budget is exhausted.
    #[instrument(skip_all, fields(run_id = %run_id))]
    pub async fn run<S: RemoteSurface + ?Sized>(
        &self,
        surface: &S,
        prompt: &Prompt,
        log: &RunLog,
        run_id: &str,
        log_dir: &Path,
    ) -> Result<Vec<u8>> {
        let run_started = Instant::now();
        let max_attempts = self.schedule.max_retries.max(1);
        let mut last_detail = String::from("no attempt executed");
        let mut attempts_made = 0u32;

        for attempt in 1..=max_attempts {
            let remaining = self
                .schedule
                .total_budget
                .saturating_sub(run_started.elapsed());
            if remaining.is_zero() {
                last_detail = format!(
                    "total run budget of {}s exhausted before attempt {}",
                    self.schedule.total_budget.as_secs(),
                    attempt
                );
                warn!("{}", last_detail);
                break;
            }

            attempts_made = attempt;
            info!("attempt {}/{} starting", attempt, max_attempts);

            // Fresh request per attempt: no partial state carries forward.
            let request = GenerationRequest::new(prompt.clone());
            let attempt_started = Instant::now();
            let outcome = self.attempt(surface, &request, remaining).await;
            match outcome {
                Ok(GenerationOutcome::Ready { bytes, elapsed }) => {
                    info!(
                        "attempt {} succeeded in {:.1}s ({} bytes)",
                        attempt,
                        elapsed.as_secs_f64(),
                        bytes.len()
                    );
                    log.append(&RunRecord::for_attempt(
                        run_id,
                        attempt,
                        prompt.text(),
                        RunStatus::Success,
                        format!("generation completed ({} bytes)", bytes.len()),
                        elapsed,
                    ))
                    .await;
                    return Ok(bytes);
                }
                Ok(other) => {
                    last_detail = other.describe();
                    let elapsed = other.elapsed();
                    warn!(
                        "attempt {}/{} failed after {:.1}s: {}",
                        attempt,
                        max_attempts,
                        elapsed.as_secs_f64(),
                        last_detail
                    );
                    log.append(&RunRecord::for_attempt(
                        run_id,
                        attempt,
                        prompt.text(),
                        RunStatus::Failure,
                        last_detail.clone(),
                        elapsed,
                    ))
                    .await;
                }
                Err(e) => {
                    last_detail = e.to_string();
                    warn!(
                        "attempt {}/{} failed: {}",
                        attempt, max_attempts, last_detail
                    );
                    log.append(&RunRecord::for_attempt(
                        run_id,
                        attempt,
                        prompt.text(),
                        RunStatus::Failure,
                        last_detail.clone(),
                        attempt_started.elapsed(),
                    ))
                    .await;
                }
            }

            capture_failure_screenshot(surface, log_dir, run_id, attempt).await;

            if attempt < max_attempts {
                let backoff = self
                    .schedule
                    .base_retry_delay
                    .saturating_mul(1 << (attempt - 1).min(16))
                    .min(self.schedule.max_backoff);
                let remaining = self
                    .schedule
                    .total_budget
                    .saturating_sub(run_started.elapsed());
                if remaining.is_zero() {
                    last_detail = format!(
                        "total run budget of {}s exhausted after attempt {}",
                        self.schedule.total_budget.as_secs(),
                        attempt
                    );
                    warn!("{}", last_detail);
                    break;
                }
                let backoff = backoff.min(remaining);
                if !backoff.is_zero() {
                    info!("backing off {:.1}s before retry", backoff.as_secs_f64());
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        Err(PictorError::GenerationFailed {
            attempts: attempts_made,
            reason: last_detail,
        })
    }

    /// One attempt: fresh submission, settle check, watch, fetch, validate.
    async fn attempt<S: RemoteSurface + ?Sized>(
        &self,
        surface: &S,
        request: &GenerationRequest,
        remaining: Duration,
    ) -> Result<GenerationOutcome> {
        let started = Instant::now();
        surface.submit(request.prompt.text()).await?;
        debug!("submission accepted at {}", request.submitted_at.to_rfc3339());

        // Site-side rejections show fast; one bounded observation right
        // after submission catches them without burning the poll budget.
        for banner in &self.selectors.error_banners {
            let state = surface.observe(banner).await?;
            if state.is_visible() {
                let detail = state
                    .text()
                    .filter(|t| !t.is_empty())
                    .unwrap_or(banner)
                    .to_string();
                return Ok(GenerationOutcome::Failed {
                    reason: format!("rejected at submission: {}", detail),
                    elapsed: started.elapsed(),
                });
            }
        }

        let budget = self
            .schedule
            .generation_timeout
            .min(remaining.saturating_sub(started.elapsed()));
        let watcher = CompletionWatcher::new(surface, self.selectors, self.schedule.poll_interval);

        match watcher.watch(budget).await {
            WatchOutcome::Ready { .. } => {
                let bytes = surface.download(&self.selectors.final_image).await?;
                validate_png(&bytes)?;
                Ok(GenerationOutcome::Ready {
                    bytes,
                    elapsed: started.elapsed(),
                })
            }
            WatchOutcome::Failed { reason, .. } => Ok(GenerationOutcome::Failed {
                reason,
                elapsed: started.elapsed(),
            }),
            WatchOutcome::TimedOut { .. } => Ok(GenerationOutcome::TimedOut {
                elapsed: started.elapsed(),
            }),
        }
    }
}

/// Best-effort full-page screenshot for post-mortem debugging of DOM drift.
async fn capture_failure_screenshot<S: RemoteSurface + ?Sized>(
    surface: &S,
    log_dir: &Path,
    run_id: &str,
    attempt: u32,
) {
    let path = log_dir.join(format!("failure_{}_attempt{}.png", run_id, attempt));
    fail_open("failure_screenshot", || async {
        let bytes = surface.screenshot().await?;
        tokio::fs::create_dir_all(log_dir).await?;
        tokio::fs::write(&path, &bytes).await?;
        info!("failure screenshot written to {}", path.display());
        Ok(())
    })
    .await;
}
