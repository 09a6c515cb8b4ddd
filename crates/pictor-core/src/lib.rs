//! # pictor-core
//!
//! Shared types for the pictor image-generation driver.
//!
//! The driver submits one prompt to a browser-automated image studio, watches
//! for the completion signal, and persists the result exactly once. This crate
//! holds what every other crate needs: the unified error type, the run
//! configuration, the data model of a run (prompt, outcome, artifact, record),
//! and the fail-open helper for infrastructure operations.

mod config;
mod error;
pub mod fail_open;
mod types;

pub use config::{BrowserOptions, PictorConfig, SelectorConfig, TimingConfig};
pub use error::{PictorError, Result, SurfaceErrorKind};
pub use types::{Artifact, GenerationOutcome, GenerationRequest, Prompt, RunRecord, RunStatus};
