//! Environment-sourced application configuration.
//!
//! Loaded once at startup via figment's `Env` provider and treated as
//! immutable for the process lifetime. Portal credentials are never logged
//! or persisted by this service.

use anyhow::Context;
use chrono::{DateTime, FixedOffset, Utc};
use figment::Figment;
use figment::providers::Env;
use serde::Deserialize;

/// Default production cutover: 2026-01-07 00:00 KST. Requests before this
/// instant are routed to the test-dispatch path regardless of payload.
pub const DEFAULT_PRODUCTION_START: &str = "2026-01-07T00:00:00+09:00";

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_portal_base_url() -> String {
    "https://cnsa.riroschool.kr".to_string()
}

fn default_production_start() -> String {
    DEFAULT_PRODUCTION_START.to_string()
}

fn default_headless() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Portal login identifier (`PORTAL_ID`).
    pub portal_id: String,
    /// Portal login password (`PORTAL_PASSWORD`). Sanitized on access, see
    /// [`Config::portal_password`].
    #[serde(rename = "portal_password")]
    portal_password_raw: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_portal_base_url")]
    pub portal_base_url: String,
    /// RFC3339 production cutover instant (`PRODUCTION_START`).
    #[serde(default = "default_production_start")]
    production_start: String,
    /// Discord webhook for attendance reports (`DISCORD_WEBHOOK_URL`).
    #[serde(default)]
    pub discord_webhook_url: Option<String>,
    /// Spreadsheet link embedded into the Discord report message.
    #[serde(default)]
    pub spreadsheet_url: Option<String>,
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Explicit Chrome/Chromium executable path (`CHROME_PATH`); autodetected
    /// when unset.
    #[serde(default)]
    pub chrome_path: Option<String>,
}

impl Config {
    /// Reads configuration from the process environment. `PORTAL_ID` and
    /// `PORTAL_PASSWORD` are required; everything else has a default.
    pub fn load() -> anyhow::Result<Self> {
        Figment::new()
            .merge(Env::raw())
            .extract()
            .context("failed to load configuration from environment")
    }

    /// The portal password with deployment shell-escape artifacts removed.
    pub fn portal_password(&self) -> String {
        sanitize_password(&self.portal_password_raw)
    }

    /// The cutover instant exactly as configured, for echoing to callers.
    pub fn production_start_raw(&self) -> &str {
        &self.production_start
    }

    /// Parsed production cutover instant.
    pub fn production_start(&self) -> anyhow::Result<DateTime<Utc>> {
        let parsed: DateTime<FixedOffset> = self
            .production_start
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid PRODUCTION_START '{}': {e}", self.production_start))?;
        Ok(parsed.with_timezone(&Utc))
    }

    /// Whether the service is past its production cutover at `now`.
    ///
    /// Pure function of `now` so handlers and tests share one definition.
    pub fn is_production_at(&self, now: DateTime<Utc>) -> bool {
        match self.production_start() {
            Ok(start) => now >= start,
            // An unparseable cutover never silently goes live.
            Err(_) => false,
        }
    }

    pub fn mode_at(&self, now: DateTime<Utc>) -> &'static str {
        if self.is_production_at(now) {
            "production"
        } else {
            "test"
        }
    }
}

/// Collapses the `\!` artifact certain deployment environments introduce when
/// a password containing `!` is exported through a shell. Idempotent on
/// already-clean input.
pub fn sanitize_password(raw: &str) -> String {
    raw.replace("\\!", "!")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_config(production_start: &str) -> Config {
        Config {
            portal_id: "school_admin".to_string(),
            portal_password_raw: "hunter2".to_string(),
            port: default_port(),
            log_level: default_log_level(),
            portal_base_url: default_portal_base_url(),
            production_start: production_start.to_string(),
            discord_webhook_url: None,
            spreadsheet_url: None,
            headless: true,
            chrome_path: None,
        }
    }

    #[test]
    fn sanitizer_removes_escaped_exclamation() {
        assert_eq!(sanitize_password("ab\\!cd"), "ab!cd");
    }

    #[test]
    fn sanitizer_is_idempotent_on_clean_input() {
        assert_eq!(sanitize_password("abcd"), "abcd");
        assert_eq!(sanitize_password(&sanitize_password("ab\\!cd")), "ab!cd");
    }

    #[test]
    fn mode_is_pure_function_of_now_vs_cutover() {
        let config = test_config("2026-01-07T00:00:00+09:00");
        // 2026-01-06 14:59:59 UTC == 2026-01-06 23:59:59 KST, still test mode.
        let before = Utc.with_ymd_and_hms(2026, 1, 6, 14, 59, 59).unwrap();
        // 2026-01-06 15:00:00 UTC == cutover exactly.
        let at = Utc.with_ymd_and_hms(2026, 1, 6, 15, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();

        assert!(!config.is_production_at(before));
        assert!(config.is_production_at(at));
        assert!(config.is_production_at(after));
        assert_eq!(config.mode_at(before), "test");
        assert_eq!(config.mode_at(after), "production");
    }

    #[test]
    fn invalid_cutover_never_goes_live() {
        let config = test_config("not-a-date");
        assert!(!config.is_production_at(Utc::now()));
    }
}
