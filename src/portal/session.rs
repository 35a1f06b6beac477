//! Browser session lifecycle.
//!
//! One [`PortalSession`] wraps one isolated headless Chromium process and a
//! single page that drives the whole workflow. The session is exclusively
//! owned by one dispatch run and is torn down unconditionally: `close`
//! terminates the browser, and `Drop` aborts the CDP handler task so the
//! process cannot leak on exceptional paths.

use crate::config::Config;
use crate::portal::errors::PortalError;
use anyhow::{Context, anyhow};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

pub struct PortalSession {
    browser: Browser,
    page: Page,
    handler_task: tokio::task::JoinHandle<()>,
}

impl PortalSession {
    /// Launches an isolated headless browser and opens the driving page.
    ///
    /// Sandbox isolation is disabled because the service runs in restricted
    /// container environments where the Chromium sandbox cannot start. A
    /// launch failure is fatal to the run; there is no retry here.
    pub async fn open(config: &Config) -> Result<Self, PortalError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");

        let chrome_path = match &config.chrome_path {
            Some(path) => Some(path.clone()),
            None => find_chrome(),
        };
        if let Some(path) = chrome_path {
            builder = builder.chrome_executable(path);
        }
        if !config.headless {
            builder = builder.with_head();
        }

        let browser_config = builder
            .build()
            .map_err(|e| PortalError::Browser(anyhow!("failed to configure browser: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("failed to launch browser")?;

        let handler_task = tokio::spawn(async move { while (handler.next().await).is_some() {} });

        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to open page")?;

        debug!("browser session opened");
        Ok(Self {
            browser,
            page,
            handler_task,
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Navigates the driving page and waits for the load event.
    pub async fn goto(&self, url: &str) -> Result<(), PortalError> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("navigation to {url} failed"))?;
        Ok(())
    }

    pub async fn current_url(&self) -> Result<String, PortalError> {
        let url = self.page.url().await?;
        Ok(url.unwrap_or_default())
    }

    /// Evaluates a JavaScript expression on the page, deserializing its
    /// completion value.
    pub async fn eval<T: DeserializeOwned>(&self, js: &str) -> Result<T, PortalError> {
        let result = self.page.evaluate(js).await?;
        let value = result
            .into_value()
            .context("failed to deserialize evaluation result")?;
        Ok(value)
    }

    /// Evaluates a JavaScript function literal with one JSON argument.
    ///
    /// The argument is serialized through serde so page-side code never sees
    /// improperly escaped strings (the original motivation: passwords with
    /// shell metacharacters).
    pub async fn eval_call<T: DeserializeOwned>(
        &self,
        js_fn: &str,
        arg: &Value,
    ) -> Result<T, PortalError> {
        self.eval(&format!("({js_fn})({arg})")).await
    }

    /// Terminates the browser process. Called on success and failure alike.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "browser close failed; process will be dropped");
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        debug!("browser session closed");
    }
}

impl Drop for PortalSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

/// Locates a Chrome/Chromium executable on the host.
fn find_chrome() -> Option<String> {
    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(output) = std::process::Command::new("which").arg(name).output()
            && output.status.success()
        {
            let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !path.is_empty() {
                return Some(path);
            }
        }
    }

    let candidates = [
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];
    candidates
        .into_iter()
        .find(|candidate| std::path::Path::new(candidate).exists())
        .map(str::to_string)
}
