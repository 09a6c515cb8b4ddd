//! Session file validation and cookie normalization
//!
//! The session is produced out of band (a browser-extension cookie export)
//! and consumed read-only. Validation is structural: the file must parse as
//! JSON and contain a non-empty `cookies` array. Cookie values are never
//! logged.

use headless_chrome::protocol::cdp::Network::CookieParam;
use pictor_core::{PictorError, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Validated, externally-produced session context.
///
/// Exclusively owned by one run; the remote application supports only one
/// active generation per session, so sharing a handle across concurrent runs
/// would corrupt completion detection.
#[derive(Debug)]
pub struct SessionHandle {
    path: PathBuf,
    cookies: Vec<CookieParam>,
}

impl SessionHandle {
    /// Check the session file exists and is structurally usable, and
    /// normalize its cookies to the CDP shape.
    ///
    /// Runs before any browser work so a missing or malformed session fails
    /// fast and cheaply.
    pub fn validate(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PictorError::MissingSession(format!(
                "session file not found: {}",
                path.display()
            )));
        }

        let raw = std::fs::read_to_string(path)?;
        let parsed: Value = serde_json::from_str(&raw).map_err(|e| {
            PictorError::MissingSession(format!(
                "session file {} is not valid JSON: {}",
                path.display(),
                e
            ))
        })?;

        let entries = parsed
            .get("cookies")
            .and_then(Value::as_array)
            .filter(|list| !list.is_empty())
            .ok_or_else(|| {
                PictorError::MissingSession(format!(
                    "session file {} has no cookies array",
                    path.display()
                ))
            })?;

        let mut cookies = Vec::with_capacity(entries.len());
        for entry in entries {
            match normalize_cookie(entry) {
                Some(cookie) => cookies.push(cookie),
                None => warn!("skipping unusable cookie entry in session file"),
            }
        }

        if cookies.is_empty() {
            return Err(PictorError::MissingSession(format!(
                "session file {} contains no usable cookies",
                path.display()
            )));
        }

        debug!("session file validated: {} cookie(s)", cookies.len());
        Ok(Self {
            path: path.to_path_buf(),
            cookies,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cookies(&self) -> &[CookieParam] {
        &self.cookies
    }

    pub fn cookie_count(&self) -> usize {
        self.cookies.len()
    }
}

/// Rewrite one exported cookie entry into the CDP cookie shape.
///
/// Extension exports use `expirationDate` where CDP wants `expires`, and
/// lowercase `sameSite` values where CDP wants capitalized ones. Entries
/// without a name or value are unusable; unknown keys are ignored by the
/// deserializer.
fn normalize_cookie(entry: &Value) -> Option<CookieParam> {
    let obj = entry.as_object()?;
    if !obj.get("name").is_some_and(Value::is_string)
        || !obj.get("value").is_some_and(Value::is_string)
    {
        return None;
    }

    let mut normalized = obj.clone();

    if let Some(expiration) = normalized.remove("expirationDate") {
        normalized.entry("expires").or_insert(expiration);
    }

    match normalized.get("sameSite").and_then(Value::as_str) {
        Some("no_restriction") => {
            normalized.insert("sameSite".to_string(), Value::String("None".to_string()));
        }
        Some("lax") => {
            normalized.insert("sameSite".to_string(), Value::String("Lax".to_string()));
        }
        Some("strict") => {
            normalized.insert("sameSite".to_string(), Value::String("Strict".to_string()));
        }
        Some("None") | Some("Lax") | Some("Strict") | None => {}
        Some(_) => {
            normalized.remove("sameSite");
        }
    }

    serde_json::from_value(Value::Object(normalized)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_session(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("session.json");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_missing_file_rejected() {
        let dir = TempDir::new().unwrap();
        let err = SessionHandle::validate(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, PictorError::MissingSession(_)));
    }

    #[test]
    fn test_non_json_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_session(&dir, "not json at all");
        let err = SessionHandle::validate(&path).unwrap_err();
        assert!(matches!(err, PictorError::MissingSession(_)));
    }

    #[test]
    fn test_empty_cookie_list_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_session(&dir, r#"{"cookies": []}"#);
        let err = SessionHandle::validate(&path).unwrap_err();
        assert!(matches!(err, PictorError::MissingSession(_)));
    }

    #[test]
    fn test_valid_session_accepted() {
        let dir = TempDir::new().unwrap();
        let path = write_session(
            &dir,
            r#"{"cookies": [
                {"name": "auth", "value": "abc", "domain": ".example.com",
                 "path": "/", "secure": true, "httpOnly": true,
                 "expirationDate": 1893456000.5, "sameSite": "lax"},
                {"name": "pref", "value": "1"}
            ]}"#,
        );
        let session = SessionHandle::validate(&path).unwrap();
        assert_eq!(session.cookie_count(), 2);
        let auth = &session.cookies()[0];
        assert_eq!(auth.name, "auth");
        assert_eq!(auth.expires, Some(1893456000.5));
    }

    #[test]
    fn test_nameless_entries_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        let path = write_session(
            &dir,
            r#"{"cookies": [
                {"value": "orphan"},
                {"name": "auth", "value": "abc"}
            ]}"#,
        );
        let session = SessionHandle::validate(&path).unwrap();
        assert_eq!(session.cookie_count(), 1);
    }

    #[test]
    fn test_unknown_same_site_dropped() {
        let dir = TempDir::new().unwrap();
        let path = write_session(
            &dir,
            r#"{"cookies": [
                {"name": "auth", "value": "abc", "sameSite": "unspecified"}
            ]}"#,
        );
        let session = SessionHandle::validate(&path).unwrap();
        assert!(session.cookies()[0].same_site.is_none());
    }
}
