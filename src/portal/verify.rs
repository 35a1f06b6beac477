//! Post-submission verification.
//!
//! Three signals, in order of trust: the captured API response code, failure
//! keywords in the page text, success keywords in the page text. When none
//! of them speaks the result is `Unknown`, which the batch loop reports as
//! such rather than guessing.

use crate::portal::errors::PortalError;
use crate::portal::session::PortalSession;
use crate::portal::submit::SubmitOutcome;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    Sent,
    Failed,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub status: SendStatus,
    pub detail: String,
}

const SUCCESS_KEYWORDS: [&str; 2] = ["발송 완료", "성공"];
const FAILURE_KEYWORDS: [&str; 3] = ["실패", "오류", "에러"];

/// Reads the page text and weighs it together with the submit outcome.
pub async fn verify(
    session: &PortalSession,
    outcome: &SubmitOutcome,
) -> Result<VerifyReport, PortalError> {
    let page_text: String = session.eval("document.body.innerText || ''").await?;
    let report = weigh_signals(outcome, &page_text);
    match report.status {
        SendStatus::Sent => info!(detail = %report.detail, "send verified"),
        SendStatus::Failed => warn!(detail = %report.detail, "send failed"),
        SendStatus::Unknown => warn!(detail = %report.detail, "send result inconclusive"),
    }
    Ok(report)
}

/// Pure signal weighting, separated from the browser for testability.
pub fn weigh_signals(outcome: &SubmitOutcome, page_text: &str) -> VerifyReport {
    if let Some(api) = &outcome.api_response {
        match api.code {
            Some(0) => {
                return VerifyReport {
                    status: SendStatus::Sent,
                    detail: api
                        .message
                        .clone()
                        .unwrap_or_else(|| "send endpoint accepted the message".into()),
                };
            }
            Some(code) => {
                return VerifyReport {
                    status: SendStatus::Failed,
                    detail: api
                        .message
                        .clone()
                        .unwrap_or_else(|| format!("send endpoint returned code {code}")),
                };
            }
            None => {}
        }
    }

    // Failure keywords outrank success keywords: result pages have been seen
    // carrying both ("발송 완료: 0건, 실패: 1건").
    if let Some(kw) = FAILURE_KEYWORDS.iter().find(|kw| page_text.contains(**kw)) {
        return VerifyReport {
            status: SendStatus::Failed,
            detail: format!("page reports failure ({kw})"),
        };
    }
    if let Some(kw) = SUCCESS_KEYWORDS.iter().find(|kw| page_text.contains(**kw)) {
        return VerifyReport {
            status: SendStatus::Sent,
            detail: format!("page reports success ({kw})"),
        };
    }

    let detail = if outcome.dialogs_handled > 0 {
        format!(
            "no definitive signal; {} confirmation dialog(s) were accepted",
            outcome.dialogs_handled
        )
    } else {
        "no definitive signal and no confirmation dialog appeared".into()
    };
    VerifyReport {
        status: SendStatus::Unknown,
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::submit::ApiResponse;

    fn outcome_with_code(code: Option<i64>) -> SubmitOutcome {
        SubmitOutcome {
            dialogs_handled: 2,
            dialog_messages: vec!["발송하시겠습니까?".into()],
            api_response: Some(ApiResponse {
                code,
                message: None,
                raw: String::new(),
            }),
        }
    }

    #[test]
    fn api_code_zero_wins_regardless_of_page_text() {
        let report = weigh_signals(&outcome_with_code(Some(0)), "오류가 발생했습니다");
        assert_eq!(report.status, SendStatus::Sent);
    }

    #[test]
    fn nonzero_api_code_is_failure() {
        let report = weigh_signals(&outcome_with_code(Some(13)), "발송 완료");
        assert_eq!(report.status, SendStatus::Failed);
        assert!(report.detail.contains("13"));
    }

    #[test]
    fn failure_keywords_outrank_success_keywords() {
        let report = weigh_signals(
            &SubmitOutcome::default(),
            "발송 완료: 0건, 실패: 1건",
        );
        assert_eq!(report.status, SendStatus::Failed);
    }

    #[test]
    fn success_keyword_without_api_response() {
        let report = weigh_signals(&SubmitOutcome::default(), "문자 발송 완료되었습니다");
        assert_eq!(report.status, SendStatus::Sent);
    }

    #[test]
    fn silence_is_unknown_not_sent() {
        let report = weigh_signals(&SubmitOutcome::default(), "알림문자 보내기");
        assert_eq!(report.status, SendStatus::Unknown);
    }

    #[test]
    fn unparseable_api_body_falls_through_to_page_text() {
        let outcome = SubmitOutcome {
            api_response: Some(ApiResponse {
                code: None,
                message: None,
                raw: "<html>redirect</html>".into(),
            }),
            ..SubmitOutcome::default()
        };
        let report = weigh_signals(&outcome, "발송 완료");
        assert_eq!(report.status, SendStatus::Sent);
    }
}
