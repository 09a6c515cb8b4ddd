//! Remote-surface abstraction
//!
//! The engine never talks to a browser directly; it talks to this trait.
//! Selector strings are either CSS (`img.fullsize-image`) or the `text=` form
//! (`text=Download`), which matches visible elements whose text contains the
//! needle. The trait implementation decides how to resolve either form.

use async_trait::async_trait;
use pictor_core::{PictorError, Result, SelectorConfig, SurfaceErrorKind};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::session::SessionHandle;

/// Observed state of one element probe.
///
/// The distinction between `Hidden` and `Visible` is what lets the watcher
/// tell a completed-state marker apart from a placeholder that is in the DOM
/// but not yet shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementState {
    /// No matching element in the DOM
    Absent,
    /// Matching element exists but is not rendered (zero size or hidden)
    Hidden,
    /// Matching element is rendered; carries its trimmed text content
    Visible { text: String },
}

impl ElementState {
    pub fn is_visible(&self) -> bool {
        matches!(self, ElementState::Visible { .. })
    }

    /// Present in the DOM at all, rendered or not.
    pub fn is_present(&self) -> bool {
        !matches!(self, ElementState::Absent)
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            ElementState::Visible { text } => Some(text),
            _ => None,
        }
    }
}

/// Capability interface over the externally-controlled web application.
///
/// All operations may fail intermittently; the caller treats failures as
/// retryable signals up to a bound, never as proof the site is gone.
#[async_trait]
pub trait RemoteSurface: Send + Sync {
    /// Inject the session cookies and navigate to the landing page.
    ///
    /// Implementations verify the page actually loaded and the prompt input
    /// is reachable, so an expired session surfaces here as an error naming
    /// what was found instead of a silent timeout later.
    async fn open(&self, session: &SessionHandle) -> Result<()>;

    /// Type the prompt into the input and trigger a generation.
    async fn submit(&self, prompt: &str) -> Result<()>;

    /// Probe one selector and report what is there.
    async fn observe(&self, selector: &str) -> Result<ElementState>;

    /// Fetch the binary content referenced by the selector (an `img` element),
    /// through the authenticated page context.
    async fn download(&self, selector: &str) -> Result<Vec<u8>>;

    /// Capture a full-page PNG for failure diagnostics.
    async fn screenshot(&self) -> Result<Vec<u8>>;
}

// ---------------------------------------------------------------------------
// Mock surface for tests
// ---------------------------------------------------------------------------

/// Scripted behavior for one submission on a [`MockSurface`].
///
/// Each `submit` call consumes the next script; the last script repeats if
/// the plan runs out.
#[derive(Debug, Clone)]
pub enum AttemptScript {
    /// Ready signal and final image become visible after this many polls of
    /// the ready selector.
    Ready { after_polls: u32 },
    /// The first configured error banner is visible from the start.
    ErrorBanner { message: String },
    /// Nothing ever becomes visible; the watcher must time out.
    Silent,
    /// Every `observe` call fails with the given kind.
    ObserveFailure { kind: SurfaceErrorKind },
}

#[derive(Debug, Default)]
struct MockState {
    current: Option<AttemptScript>,
    ready_polls: u32,
}

/// Scriptable [`RemoteSurface`] for engine tests.
///
/// Call counters let tests assert exactly how many submissions or downloads a
/// run performed.
pub struct MockSurface {
    selectors: SelectorConfig,
    payload: Vec<u8>,
    scripts: Mutex<VecDeque<AttemptScript>>,
    state: Mutex<MockState>,
    open_calls: AtomicU32,
    submit_calls: AtomicU32,
    observe_calls: AtomicU32,
    download_calls: AtomicU32,
    open_error: Option<SurfaceErrorKind>,
}

impl Default for MockSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSurface {
    /// Mock with default selectors and a minimal valid PNG payload.
    pub fn new() -> Self {
        Self {
            selectors: SelectorConfig::default(),
            payload: minimal_png(),
            scripts: Mutex::new(VecDeque::new()),
            state: Mutex::new(MockState::default()),
            open_calls: AtomicU32::new(0),
            submit_calls: AtomicU32::new(0),
            observe_calls: AtomicU32::new(0),
            download_calls: AtomicU32::new(0),
            open_error: None,
        }
    }

    /// Queue the script for the next submission.
    pub fn with_attempt(self, script: AttemptScript) -> Self {
        self.scripts.lock().unwrap().push_back(script);
        self
    }

    /// Replace the bytes returned by `download`.
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    /// Make `open` fail with the given kind.
    pub fn with_open_error(mut self, kind: SurfaceErrorKind) -> Self {
        self.open_error = Some(kind);
        self
    }

    /// Use non-default selectors (when a test exercises selector config).
    pub fn with_selectors(mut self, selectors: SelectorConfig) -> Self {
        self.selectors = selectors;
        self
    }

    pub fn open_count(&self) -> u32 {
        self.open_calls.load(Ordering::SeqCst)
    }

    pub fn submit_count(&self) -> u32 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn observe_count(&self) -> u32 {
        self.observe_calls.load(Ordering::SeqCst)
    }

    pub fn download_count(&self) -> u32 {
        self.download_calls.load(Ordering::SeqCst)
    }

    fn is_error_banner(&self, selector: &str) -> bool {
        self.selectors.error_banners.iter().any(|s| s == selector)
    }
}

#[async_trait]
impl RemoteSurface for MockSurface {
    async fn open(&self, _session: &SessionHandle) -> Result<()> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        match self.open_error {
            Some(kind) => Err(PictorError::surface(kind, "scripted open failure")),
            None => Ok(()),
        }
    }

    async fn submit(&self, _prompt: &str) -> Result<()> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let next = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.len() > 1 {
                scripts.pop_front()
            } else {
                scripts.front().cloned()
            }
        };
        let mut state = self.state.lock().unwrap();
        state.current = Some(next.unwrap_or(AttemptScript::Silent));
        state.ready_polls = 0;
        Ok(())
    }

    async fn observe(&self, selector: &str) -> Result<ElementState> {
        self.observe_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let script = state
            .current
            .clone()
            .unwrap_or(AttemptScript::Silent);

        match script {
            AttemptScript::ObserveFailure { kind } => {
                Err(PictorError::surface(kind, "scripted observe failure"))
            }
            AttemptScript::ErrorBanner { message } => {
                if self.is_error_banner(selector) {
                    Ok(ElementState::Visible { text: message })
                } else {
                    Ok(ElementState::Absent)
                }
            }
            AttemptScript::Silent => Ok(ElementState::Absent),
            AttemptScript::Ready { after_polls } => {
                if selector == self.selectors.ready_signal {
                    let seen = state.ready_polls;
                    state.ready_polls += 1;
                    if seen >= after_polls {
                        Ok(ElementState::Visible {
                            text: "Download".to_string(),
                        })
                    } else {
                        Ok(ElementState::Absent)
                    }
                } else if selector == self.selectors.final_image {
                    if state.ready_polls > after_polls {
                        Ok(ElementState::Visible {
                            text: String::new(),
                        })
                    } else {
                        Ok(ElementState::Absent)
                    }
                } else if selector == self.selectors.progress {
                    if state.ready_polls <= after_polls {
                        Ok(ElementState::Visible {
                            text: "Generating...".to_string(),
                        })
                    } else {
                        Ok(ElementState::Absent)
                    }
                } else {
                    Ok(ElementState::Absent)
                }
            }
        }
    }

    async fn download(&self, _selector: &str) -> Result<Vec<u8>> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.payload.clone())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(minimal_png())
    }
}

/// Smallest byte sequence the artifact pipeline accepts as a PNG.
pub fn minimal_png() -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&[0u8; 16]);
    bytes
}
