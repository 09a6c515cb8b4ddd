//! Diagnostic screenshot capture via Chrome DevTools Protocol

use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::Tab;
use pictor_core::{PictorError, Result, SurfaceErrorKind};
use tracing::debug;

/// Capture a full-page PNG of the current tab.
///
/// Used for failure diagnostics only; callers route this through the
/// fail-open path so a capture failure never changes a run's outcome.
pub(crate) fn capture_full_page(tab: &Tab) -> Result<Vec<u8>> {
    let bytes = tab
        .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
        .map_err(|e| {
            PictorError::surface(
                SurfaceErrorKind::Unknown,
                format!("screenshot capture failed: {}", e),
            )
        })?;
    debug!("captured {}-byte diagnostic screenshot", bytes.len());
    Ok(bytes)
}
