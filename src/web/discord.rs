//! Discord attendance-report webhook.

use crate::state::AppState;
use crate::web::error::ApiError;
use axum::Json;
use axum::extract::State;
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

const WEEKDAYS_KO: [&str; 7] = ["일", "월", "화", "수", "목", "금", "토"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscordReportRequest {
    /// Report date, `YYYY-MM-DD` in Seoul local time.
    pub date: Option<String>,
    /// Attendance sheet tab name, e.g. `260107`.
    pub sheet_name: Option<String>,
    #[serde(default)]
    pub grade1_count: u32,
    #[serde(default)]
    pub grade2_count: u32,
    /// Overrides the generated report message when present.
    #[serde(default)]
    pub message: Option<String>,
}

/// POST /api/send-discord-report: post the daily attendance report to the
/// configured Discord webhook.
pub async fn discord_report_handler(
    State(state): State<AppState>,
    Json(request): Json<DiscordReportRequest>,
) -> Result<Json<Value>, ApiError> {
    let webhook = state
        .config
        .discord_webhook_url
        .as_deref()
        .ok_or_else(|| ApiError::unavailable("DISCORD_WEBHOOK_URL is not configured"))?;

    let (Some(date), Some(sheet_name)) = (request.date.as_deref(), request.sheet_name.as_deref())
    else {
        return Err(ApiError::bad_request(
            "date and sheetName are required (e.g. date: 2026-01-07, sheetName: 260107)",
        ));
    };

    let date: NaiveDate = date
        .parse()
        .map_err(|_| ApiError::bad_request(format!("invalid date '{date}', expected YYYY-MM-DD")))?;

    let content = match request.message {
        Some(message) if !message.trim().is_empty() => message,
        _ => report_message(
            date,
            request.grade1_count + request.grade2_count,
            state.config.spreadsheet_url.as_deref(),
        ),
    };

    let response = state
        .http
        .post(webhook)
        .json(&json!({ "content": content }))
        .send()
        .await
        .map_err(|e| ApiError::internal(format!("discord webhook request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(ApiError::internal(format!(
            "discord webhook returned {}",
            response.status()
        )));
    }
    info!(sheet_name, "discord report posted");
    Ok(Json(json!({
        "success": true,
        "message": "Discord 전송 완료",
        "sheetName": sheet_name,
    })))
}

fn report_message(date: NaiveDate, total: u32, spreadsheet_url: Option<&str>) -> String {
    let mut lines = vec![
        "안녕하세요, 부장님.".to_string(),
        format!(
            "{} 겨울방학 방과후학교 조간면학 출결현황 보내드립니다.",
            format_date_ko(date)
        ),
        format!("총 {total}명의 학생 및 학부모님께 알림 발송 완료했습니다."),
    ];
    if let Some(url) = spreadsheet_url {
        lines.push(format!("[조간면학일지 스프레드시트] {url}?usp=sharing"));
    }
    lines.push("감사합니다.".to_string());
    lines.join("\n")
}

/// "1월 7일(수)" style date.
fn format_date_ko(date: NaiveDate) -> String {
    let weekday = WEEKDAYS_KO[date.weekday().num_days_from_sunday() as usize];
    format!("{}월 {}일({})", date.month(), date.day(), weekday)
}
