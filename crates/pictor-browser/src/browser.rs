//! Chrome implementation of the remote surface
//!
//! Drives the image studio through Chrome DevTools Protocol. All DOM access
//! goes through `Tab::evaluate` JS probes so the same code handles CSS
//! selectors and the `text=` form; no probe assumes the site's DOM is stable.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use headless_chrome::{Browser, LaunchOptions, Tab};
use pictor_core::{PictorConfig, PictorError, Result, SelectorConfig, SurfaceErrorKind};
use serde_json::Value;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

use crate::screenshot;
use crate::session::SessionHandle;
use crate::surface::{ElementState, RemoteSurface};

/// How often the navigation verification re-probes the landing page.
const VERIFY_PROBE_INTERVAL: Duration = Duration::from_millis(500);

/// Live Chrome session implementing [`RemoteSurface`].
pub struct ChromeSurface {
    /// Kept alive for the tab's lifetime
    #[allow(dead_code)]
    browser: Browser,
    tab: Arc<Tab>,
    base_url: String,
    selectors: SelectorConfig,
    nav_timeout: Duration,
}

impl ChromeSurface {
    /// Launch a browser per the run configuration.
    pub async fn launch(config: &PictorConfig) -> Result<Self> {
        let opts = &config.browser;
        info!(
            "launching browser (headless: {}, size: {}x{})",
            opts.headless, opts.window_width, opts.window_height
        );

        let mut launch_options = LaunchOptions::default_builder()
            .headless(opts.headless)
            .window_size(Some((opts.window_width, opts.window_height)))
            .build()
            .map_err(|e| {
                PictorError::surface(
                    SurfaceErrorKind::Unknown,
                    format!("failed to build launch options: {}", e),
                )
            })?;

        let user_agent_arg: Option<String> = opts
            .user_agent
            .as_ref()
            .map(|ua| format!("--user-agent={}", ua));
        if let Some(ref ua_arg) = user_agent_arg {
            launch_options.args.push(OsStr::new(ua_arg));
        }

        let browser = Browser::new(launch_options).map_err(|e| {
            PictorError::surface(
                SurfaceErrorKind::Network,
                format!("failed to launch browser: {}", e),
            )
        })?;

        let tab = browser.new_tab().map_err(|e| {
            PictorError::surface(
                SurfaceErrorKind::Network,
                format!("failed to create tab: {}", e),
            )
        })?;

        Ok(Self {
            browser,
            tab,
            base_url: config.base_url.clone(),
            selectors: config.selectors.clone(),
            nav_timeout: Duration::from_secs(opts.nav_timeout_secs),
        })
    }

    /// Run a JS probe and return its JSON result.
    fn evaluate(&self, script: &str, await_promise: bool) -> Result<Value> {
        let result = self.tab.evaluate(script, await_promise).map_err(|e| {
            PictorError::surface(
                SurfaceErrorKind::Unknown,
                format!("script evaluation failed: {}", e),
            )
        })?;
        Ok(result.value.unwrap_or(Value::Null))
    }

    fn probe(&self, selector: &str) -> Result<ElementState> {
        let script = format!(
            r#"(() => {{
                {finder}
                const el = findElement();
                if (!el) return JSON.stringify({{ found: false, visible: false, text: '' }});
                return JSON.stringify({{
                    found: true,
                    visible: isVisible(el),
                    text: (el.textContent || '').trim().slice(0, 200)
                }});
            }})()"#,
            finder = element_finder_js(selector)
        );

        let value = self.evaluate(&script, false)?;
        let raw = value.as_str().ok_or_else(|| {
            PictorError::surface(
                SurfaceErrorKind::Unknown,
                format!("probe for {} returned no result", selector),
            )
        })?;
        let report: Value = serde_json::from_str(raw)?;

        let found = report["found"].as_bool().unwrap_or(false);
        let visible = report["visible"].as_bool().unwrap_or(false);
        Ok(if !found {
            ElementState::Absent
        } else if !visible {
            ElementState::Hidden
        } else {
            ElementState::Visible {
                text: report["text"].as_str().unwrap_or("").to_string(),
            }
        })
    }

    fn click(&self, selector: &str) -> Result<()> {
        let script = format!(
            r#"(() => {{
                {finder}
                const el = findElement();
                if (!el) return false;
                el.click();
                return true;
            }})()"#,
            finder = element_finder_js(selector)
        );

        let clicked = self.evaluate(&script, false)?.as_bool().unwrap_or(false);
        if clicked {
            Ok(())
        } else {
            Err(PictorError::surface(
                SurfaceErrorKind::ElementNotFound,
                format!("no clickable element for {}", selector),
            ))
        }
    }

    /// Wait for the landing page to actually be usable: document loaded and
    /// the prompt input reachable. A login wall never shows the input, so
    /// this is where an expired session becomes a diagnosable error.
    async fn verify_loaded(&self) -> Result<()> {
        let deadline = Instant::now() + self.nav_timeout;
        loop {
            let ready = self
                .evaluate("document.readyState", false)?
                .as_str()
                .map(|s| s == "complete")
                .unwrap_or(false);
            if ready && self.probe(&self.selectors.prompt_input)?.is_present() {
                debug!("landing page verified, prompt input reachable");
                return Ok(());
            }

            if Instant::now() >= deadline {
                let title = self
                    .evaluate("document.title", false)?
                    .as_str()
                    .unwrap_or("")
                    .to_string();
                return Err(PictorError::surface(
                    SurfaceErrorKind::ElementNotFound,
                    format!(
                        "prompt input {} never appeared on {} (page title: {:?}); \
                         the session may be expired or a login wall is shown",
                        self.selectors.prompt_input, self.base_url, title
                    ),
                ));
            }
            tokio::time::sleep(VERIFY_PROBE_INTERVAL).await;
        }
    }
}

#[async_trait]
impl RemoteSurface for ChromeSurface {
    #[instrument(skip(self, session), fields(url = %self.base_url))]
    async fn open(&self, session: &SessionHandle) -> Result<()> {
        self.tab
            .set_cookies(session.cookies().to_vec())
            .map_err(|e| {
                PictorError::surface(
                    SurfaceErrorKind::Network,
                    format!("failed to inject session cookies: {}", e),
                )
            })?;
        debug!("injected {} session cookie(s)", session.cookie_count());

        self.tab.navigate_to(&self.base_url).map_err(|e| {
            PictorError::surface(
                SurfaceErrorKind::Network,
                format!("failed to navigate to {}: {}", self.base_url, e),
            )
        })?;
        self.tab.wait_until_navigated().map_err(|e| {
            PictorError::surface(
                SurfaceErrorKind::Timeout,
                format!("navigation to {} timed out: {}", self.base_url, e),
            )
        })?;

        self.verify_loaded().await?;
        info!("opened {}", self.base_url);
        Ok(())
    }

    #[instrument(skip(self, prompt))]
    async fn submit(&self, prompt: &str) -> Result<()> {
        let script = format!(
            r#"(() => {{
                {finder}
                const input = findElement();
                if (!input) return false;
                const proto = input.tagName === 'TEXTAREA'
                    ? window.HTMLTextAreaElement.prototype
                    : window.HTMLInputElement.prototype;
                const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
                setter.call(input, {prompt});
                input.dispatchEvent(new Event('input', {{ bubbles: true }}));
                return true;
            }})()"#,
            finder = element_finder_js(&self.selectors.prompt_input),
            prompt = js_string(prompt),
        );

        let filled = self.evaluate(&script, false)?.as_bool().unwrap_or(false);
        if !filled {
            return Err(PictorError::surface(
                SurfaceErrorKind::ElementNotFound,
                format!("prompt input {} not found", self.selectors.prompt_input),
            ));
        }

        self.click(&self.selectors.generate_button)?;
        info!("prompt submitted");
        Ok(())
    }

    async fn observe(&self, selector: &str) -> Result<ElementState> {
        self.probe(selector)
    }

    async fn download(&self, selector: &str) -> Result<Vec<u8>> {
        // Fetch through the page context so the request carries the session;
        // a plain HTTP client would hit the login wall.
        let script = format!(
            r#"(async () => {{
                {finder}
                const el = findElement();
                if (!el) return '';
                const src = el.currentSrc || el.src || el.getAttribute('href');
                if (!src) return '';
                const resp = await fetch(src, {{ credentials: 'include' }});
                if (!resp.ok) return '';
                const buf = new Uint8Array(await resp.arrayBuffer());
                let binary = '';
                const chunk = 0x8000;
                for (let i = 0; i < buf.length; i += chunk) {{
                    binary += String.fromCharCode.apply(null, buf.subarray(i, i + chunk));
                }}
                return btoa(binary);
            }})()"#,
            finder = element_finder_js(selector)
        );

        let value = self.evaluate(&script, true)?;
        let encoded = value.as_str().unwrap_or("");
        if encoded.is_empty() {
            return Err(PictorError::surface(
                SurfaceErrorKind::ElementNotFound,
                format!("no fetchable asset behind {}", selector),
            ));
        }

        let bytes = BASE64.decode(encoded).map_err(|e| {
            PictorError::surface(
                SurfaceErrorKind::Unknown,
                format!("asset fetch returned undecodable payload: {}", e),
            )
        })?;
        debug!("downloaded {} bytes via {}", bytes.len(), selector);
        Ok(bytes)
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        screenshot::capture_full_page(&self.tab)
    }
}

/// JS prelude defining `findElement()` and `isVisible()` for one selector.
///
/// `text=` selectors walk leaf elements for visible text containing the
/// needle; anything else is handed to `querySelector`.
fn element_finder_js(selector: &str) -> String {
    let is_visible = r#"const isVisible = (el) => {
        const r = el.getBoundingClientRect();
        const s = window.getComputedStyle(el);
        return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none';
    };"#;

    match selector.strip_prefix("text=") {
        Some(needle) => format!(
            r#"{is_visible}
            const findElement = () => {{
                const needle = {needle};
                for (const c of document.querySelectorAll('body *')) {{
                    if (c.childElementCount === 0
                        && (c.textContent || '').includes(needle)
                        && isVisible(c)) {{
                        return c;
                    }}
                }}
                return null;
            }};"#,
            needle = js_string(needle),
        ),
        None => format!(
            r#"{is_visible}
            const findElement = () => document.querySelector({selector});"#,
            selector = js_string(selector),
        ),
    }
}

/// Encode a Rust string as a JS string literal.
fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}
