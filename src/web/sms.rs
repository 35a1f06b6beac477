//! Dispatch endpoints.
//!
//! `/api/send-absent-sms` carries the cutover gate: before the production
//! start instant every call is rerouted to the staff test recipient so a
//! misconfigured scheduler cannot message real parents during the pilot
//! period.

use crate::portal::dispatcher::{DispatchReport, RecipientResult};
use crate::roster::{RecipientType, StudentId, StudentRef};
use crate::state::AppState;
use crate::web::error::ApiError;
use axum::Json;
use axum::extract::State;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsenceRequest {
    #[serde(default)]
    pub absent_students: Vec<StudentRef>,
    /// Validated by hand so the caller gets the list of accepted values
    /// instead of a serde parse error.
    #[serde(default)]
    pub recipient_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResponse {
    pub success: bool,
    pub mode: &'static str,
    pub recipient_type: RecipientType,
    pub message: String,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<RecipientResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl DispatchResponse {
    fn from_report(
        report: DispatchReport,
        mode: &'static str,
        recipient_type: RecipientType,
        note: Option<String>,
    ) -> Self {
        let successful = report.successful();
        let failed = report.failed();
        Self {
            success: report.all_sent(),
            mode,
            recipient_type,
            message: format!("SMS sending completed: {successful} success, {failed} failed"),
            successful,
            failed,
            results: report.results,
            note,
        }
    }
}

/// POST /api/test-sms: send the test notice to the designated staff member.
pub async fn test_sms_handler(
    State(state): State<AppState>,
) -> Result<Json<DispatchResponse>, ApiError> {
    let report = state.dispatcher.send_test().await?;
    Ok(Json(DispatchResponse::from_report(
        report,
        "test",
        RecipientType::default(),
        None,
    )))
}

/// POST /api/send-absent-sms: send the absence notice to each listed
/// student's contacts, or the test path before the production cutover.
pub async fn absence_sms_handler(
    State(state): State<AppState>,
    Json(request): Json<AbsenceRequest>,
) -> Result<Json<DispatchResponse>, ApiError> {
    let recipient_type = parse_recipient_type(request.recipient_type.as_deref())?;

    let now = Utc::now();
    if !state.config.is_production_at(now) {
        info!(
            students = request.absent_students.len(),
            "before production cutover; rerouting to test recipient"
        );
        let report = state.dispatcher.send_test().await?;
        let note = format!(
            "production starts {}; test notice sent instead",
            state.config.production_start_raw()
        );
        return Ok(Json(DispatchResponse::from_report(
            report,
            "test",
            recipient_type,
            Some(note),
        )));
    }

    validate_students(&request.absent_students)?;
    info!(
        students = request.absent_students.len(),
        recipient_type = %recipient_type,
        "absence dispatch requested"
    );
    let report = state
        .dispatcher
        .send_absences(request.absent_students, recipient_type)
        .await?;
    Ok(Json(DispatchResponse::from_report(
        report,
        "production",
        recipient_type,
        None,
    )))
}

fn parse_recipient_type(raw: Option<&str>) -> Result<RecipientType, ApiError> {
    match raw {
        None => Ok(RecipientType::default()),
        Some(raw) => raw.parse().map_err(|_| {
            ApiError::bad_request(format!(
                "invalid recipientType '{raw}' (valid: {})",
                RecipientType::VALID.join(", ")
            ))
        }),
    }
}

fn validate_students(students: &[StudentRef]) -> Result<(), ApiError> {
    if students.is_empty() {
        return Err(ApiError::bad_request("absentStudents must not be empty"));
    }
    for student in students {
        if student.name.trim().is_empty() {
            return Err(ApiError::bad_request(format!(
                "student '{}' has an empty name",
                student.student_id
            )));
        }
        StudentId::parse(&student.student_id)
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
    }
    Ok(())
}
