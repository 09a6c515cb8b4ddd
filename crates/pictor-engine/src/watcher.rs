//! Completion watcher
//!
//! The core state machine: decide when a generation has finished from
//! observed page state, never from elapsed time alone. The transition
//! function is pure and fully testable; the async driver produces events by
//! probing the surface once per poll interval, bounded by the watch budget.
//!
//! A ready verdict requires the ready signal to be visible AND the full-size
//! asset to be present in the DOM; a visible ready control with no asset is
//! still a placeholder state.

use pictor_browser::RemoteSurface;
use pictor_core::SelectorConfig;
use std::time::{Duration, Instant};
use tracing::debug;

/// Consecutive `observe` failures tolerated before the attempt fails.
/// Intermittent selector-lookup failures are expected; a long streak means
/// the surface is actually gone.
pub const MAX_CONSECUTIVE_OBSERVE_FAILURES: u32 = 5;

/// Watcher state. `Ready`, `Failed`, and `TimedOut` are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchState {
    /// Submission done, no poll yet
    Submitted,
    /// Waiting for a completion signal
    Polling { consecutive_failures: u32 },
    /// Completion signal observed, final asset present
    Ready,
    /// Explicit error signal observed, or observation broke down
    Failed { reason: String },
    /// Watch budget exhausted with no signal either way
    TimedOut,
}

impl WatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WatchState::Ready | WatchState::Failed { .. } | WatchState::TimedOut
        )
    }
}

/// One observation of the surface, fed to [`transition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Ready signal visible and final asset present
    ReadyObserved,
    /// An error banner is visible
    ErrorObserved { reason: String },
    /// No signal either way; keep polling
    NoSignal,
    /// The observation itself failed (transient DOM/network trouble)
    ObserveFailed { error: String },
    /// The watch budget is spent
    BudgetExceeded,
}

/// Pure state transition. Deterministic, no I/O, never panics.
///
/// Terminal states absorb every further event, so a late observation can
/// never un-decide a finished watch.
pub fn transition(state: WatchState, event: WatchEvent) -> WatchState {
    if state.is_terminal() {
        return state;
    }

    match event {
        WatchEvent::ReadyObserved => WatchState::Ready,
        WatchEvent::ErrorObserved { reason } => WatchState::Failed { reason },
        WatchEvent::BudgetExceeded => WatchState::TimedOut,
        WatchEvent::NoSignal => WatchState::Polling {
            consecutive_failures: 0,
        },
        WatchEvent::ObserveFailed { error } => {
            let failures = match state {
                WatchState::Polling {
                    consecutive_failures,
                } => consecutive_failures + 1,
                _ => 1,
            };
            if failures > MAX_CONSECUTIVE_OBSERVE_FAILURES {
                WatchState::Failed {
                    reason: format!(
                        "observation failed {} times in a row: {}",
                        failures, error
                    ),
                }
            } else {
                WatchState::Polling {
                    consecutive_failures: failures,
                }
            }
        }
    }
}

/// Terminal verdict of one watch, with elapsed wall-clock time.
#[derive(Debug, Clone)]
pub enum WatchOutcome {
    Ready { elapsed: Duration },
    Failed { reason: String, elapsed: Duration },
    TimedOut { elapsed: Duration },
}

/// Async driver: polls the surface and runs the transition function until a
/// terminal state is reached.
pub struct CompletionWatcher<'a, S: RemoteSurface + ?Sized> {
    surface: &'a S,
    selectors: &'a SelectorConfig,
    poll_interval: Duration,
}

impl<'a, S: RemoteSurface + ?Sized> CompletionWatcher<'a, S> {
    pub fn new(surface: &'a S, selectors: &'a SelectorConfig, poll_interval: Duration) -> Self {
        Self {
            surface,
            selectors,
            poll_interval,
        }
    }

    /// Watch until ready, failed, or the budget runs out.
    pub async fn watch(&self, budget: Duration) -> WatchOutcome {
        let started = Instant::now();
        let mut state = WatchState::Submitted;

        loop {
            let event = if started.elapsed() >= budget {
                WatchEvent::BudgetExceeded
            } else {
                self.observe_once(started.elapsed()).await
            };
            state = transition(state, event);

            match state {
                WatchState::Ready => {
                    return WatchOutcome::Ready {
                        elapsed: started.elapsed(),
                    }
                }
                WatchState::Failed { reason } => {
                    return WatchOutcome::Failed {
                        reason,
                        elapsed: started.elapsed(),
                    }
                }
                WatchState::TimedOut => {
                    return WatchOutcome::TimedOut {
                        elapsed: started.elapsed(),
                    }
                }
                _ => {
                    let remaining = budget.saturating_sub(started.elapsed());
                    tokio::time::sleep(self.poll_interval.min(remaining)).await;
                }
            }
        }
    }

    /// One poll iteration: ready signal first, then error banners, then
    /// progress visibility at debug level.
    async fn observe_once(&self, elapsed: Duration) -> WatchEvent {
        match self.check_signals(elapsed).await {
            Ok(event) => event,
            Err(e) => WatchEvent::ObserveFailed {
                error: e.to_string(),
            },
        }
    }

    async fn check_signals(&self, elapsed: Duration) -> pictor_core::Result<WatchEvent> {
        let ready = self.surface.observe(&self.selectors.ready_signal).await?;
        if ready.is_visible() {
            let asset = self.surface.observe(&self.selectors.final_image).await?;
            if asset.is_present() {
                return Ok(WatchEvent::ReadyObserved);
            }
            debug!("ready control visible but full-size asset not yet in DOM");
        }

        for banner in &self.selectors.error_banners {
            let state = self.surface.observe(banner).await?;
            if state.is_visible() {
                let detail = state
                    .text()
                    .filter(|t| !t.is_empty())
                    .unwrap_or(banner)
                    .to_string();
                return Ok(WatchEvent::ErrorObserved {
                    reason: format!("error signal on page: {}", detail),
                });
            }
        }

        let progress = self.surface.observe(&self.selectors.progress).await?;
        if let Some(text) = progress.text() {
            debug!("still generating after {}s: {}", elapsed.as_secs(), text);
        }

        Ok(WatchEvent::NoSignal)
    }
}
