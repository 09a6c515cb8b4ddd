//! # pictor-engine
//!
//! The generation pipeline: read the prompt, submit it through the remote
//! surface, watch for the completion signal, retry with backoff under the
//! run budget, and persist the artifact exactly once. The engine only ever
//! sees the surface through the `RemoteSurface` trait, so every test here
//! runs against `MockSurface`.

mod artifact;
mod prompt;
mod retry;
mod run_log;
mod runner;
mod watcher;

pub use artifact::{validate_png, ArtifactWriter, PNG_SIGNATURE};
pub use prompt::PromptSource;
pub use retry::{RetryCoordinator, Schedule};
pub use run_log::RunLog;
pub use runner::{preflight, run, run_with_surface, Preflight};
pub use watcher::{
    transition, CompletionWatcher, WatchEvent, WatchOutcome, WatchState,
    MAX_CONSECUTIVE_OBSERVE_FAILURES,
};
