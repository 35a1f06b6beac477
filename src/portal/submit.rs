//! Submission: send-button click, confirmation dialogs, API capture.
//!
//! Both watchers must be armed before the click. The portal raises its first
//! confirmation dialog synchronously with the click, and the send request
//! fires while a dialog is still open; a listener attached afterwards would
//! miss one or both.

use crate::portal::errors::PortalError;
use crate::portal::session::PortalSession;
use crate::portal::wait::{self, SECOND_DIALOG_TIMEOUT, poll_until};
use base64::Engine;
use chromiumoxide::cdp::browser_protocol::network::{
    self, EventLoadingFinished, EventRequestWillBeSent, GetResponseBodyParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Everything observed during one submission, for the verifier to weigh.
#[derive(Debug, Clone, Default)]
pub struct SubmitOutcome {
    pub dialogs_handled: usize,
    pub dialog_messages: Vec<String>,
    pub api_response: Option<ApiResponse>,
}

/// The captured send-endpoint response. `code` 0 means accepted.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub code: Option<i64>,
    pub message: Option<String>,
    pub raw: String,
}

impl ApiResponse {
    fn parse(raw: String) -> Self {
        let parsed: Option<serde_json::Value> = serde_json::from_str(&raw).ok();
        let code = parsed
            .as_ref()
            .and_then(|v| v.get("code"))
            .and_then(|c| c.as_i64());
        let message = parsed
            .as_ref()
            .and_then(|v| v.get("msg").or_else(|| v.get("message")))
            .and_then(|m| m.as_str())
            .map(str::to_string);
        Self { code, message, raw }
    }
}

/// Clicks send and rides out the confirmation dialog sequence.
///
/// One dialog always appears and a second (cost confirmation) sometimes
/// follows. The first wait uses the caller's budget (long for a single
/// send, short per recipient in a batch); the second is always the short
/// one. A missing dialog is recorded, not fatal, because the verifier
/// cross-checks against the API response and page text.
pub async fn submit(
    session: &PortalSession,
    first_dialog_budget: std::time::Duration,
) -> Result<SubmitOutcome, PortalError> {
    let network = NetworkWatcher::arm(session).await?;
    let dialogs = DialogWatcher::arm(session).await?;

    let clicked: bool = session.eval(CLICK_SEND_JS).await?;
    if !clicked {
        dialogs.finish();
        network.finish();
        return Err(PortalError::Submission(
            "send button not found on compose page".into(),
        ));
    }
    info!("send button clicked");

    if dialogs.wait_for_count(1, first_dialog_budget).await? {
        dialogs.wait_for_count(2, SECOND_DIALOG_TIMEOUT).await?;
    } else {
        warn!("no confirmation dialog appeared within budget");
    }

    // Give the send request time to complete after the last dialog.
    tokio::time::sleep(wait::SETTLE_DELAY).await;

    let api_response = network.finish();
    let dialog_messages = dialogs.finish();
    let outcome = SubmitOutcome {
        dialogs_handled: dialog_messages.len(),
        dialog_messages,
        api_response,
    };
    debug!(
        dialogs = outcome.dialogs_handled,
        api_captured = outcome.api_response.is_some(),
        "submission sequence complete"
    );
    Ok(outcome)
}

/// Accepts every JavaScript dialog as it opens and records its message.
struct DialogWatcher {
    messages: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl DialogWatcher {
    async fn arm(session: &PortalSession) -> Result<Self, PortalError> {
        let mut events = session
            .page()
            .event_listener::<EventJavascriptDialogOpening>()
            .await?;
        let page = session.page().clone();
        let messages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&messages);

        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let message = event.message.clone();
                debug!(message = %message, "dialog opened, accepting");
                if let Err(e) = page.execute(HandleJavaScriptDialogParams::new(true)).await {
                    warn!(error = %e, "dialog accept failed");
                }
                if let Ok(mut guard) = sink.lock() {
                    guard.push(message);
                }
            }
        });
        Ok(Self { messages, task })
    }

    fn handled(&self) -> usize {
        self.messages.lock().map(|g| g.len()).unwrap_or(0)
    }

    /// Waits until at least `count` dialogs have been handled.
    async fn wait_for_count(&self, count: usize, budget: std::time::Duration) -> Result<bool, PortalError> {
        poll_until(budget, || async move {
            Ok::<_, PortalError>(self.handled() >= count)
        })
        .await
    }

    fn finish(self) -> Vec<String> {
        self.task.abort();
        self.messages.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

/// Watches for the POST to the send endpoint and captures its response body.
struct NetworkWatcher {
    captured: Arc<Mutex<Option<ApiResponse>>>,
    task: JoinHandle<()>,
}

impl NetworkWatcher {
    async fn arm(session: &PortalSession) -> Result<Self, PortalError> {
        let page = session.page().clone();
        page.execute(network::EnableParams::default())
            .await?;

        let mut requests = page
            .event_listener::<EventRequestWillBeSent>()
            .await?;
        let mut finished = page
            .event_listener::<EventLoadingFinished>()
            .await?;

        let captured = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&captured);

        let task = tokio::spawn(async move {
            let mut pending: Option<network::RequestId> = None;
            loop {
                tokio::select! {
                    event = requests.next() => {
                        let Some(event) = event else { break };
                        if event.request.method.eq_ignore_ascii_case("POST")
                            && event.request.url.contains("sms.php")
                        {
                            debug!(url = %event.request.url, "send request observed");
                            pending = Some(event.request_id.clone());
                        }
                    }
                    event = finished.next() => {
                        let Some(event) = event else { break };
                        if pending.as_ref() != Some(&event.request_id) {
                            continue;
                        }
                        match page
                            .execute(GetResponseBodyParams::new(event.request_id.clone()))
                            .await
                        {
                            Ok(result) => {
                                let raw = if result.base64_encoded {
                                    base64::engine::general_purpose::STANDARD
                                        .decode(result.body.as_bytes())
                                        .map(|b| String::from_utf8_lossy(&b).into_owned())
                                        .unwrap_or_else(|_| result.body.clone())
                                } else {
                                    result.body.clone()
                                };
                                let response = ApiResponse::parse(raw);
                                debug!(code = ?response.code, "send response captured");
                                if let Ok(mut guard) = sink.lock() {
                                    *guard = Some(response);
                                }
                            }
                            Err(e) => warn!(error = %e, "send response body fetch failed"),
                        }
                    }
                }
            }
        });
        Ok(Self { captured, task })
    }

    fn finish(self) -> Option<ApiResponse> {
        self.task.abort();
        self.captured.lock().ok().and_then(|mut g| g.take())
    }
}

/// Prefers the exact send label; submit-typed controls are the fallback.
const CLICK_SEND_JS: &str = r#"(function() {
  const candidates = Array.from(
    document.querySelectorAll('button, a, input[type="submit"], input[type="button"]'));
  const text = el => (el.textContent || el.value || '').trim();
  let target = candidates.find(el => text(el) === '발송' || text(el) === '보내기');
  if (!target) target = candidates.find(el => text(el).includes('발송'));
  if (!target) return false;
  target.click();
  return true;
})()"#;
