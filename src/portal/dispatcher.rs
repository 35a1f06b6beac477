//! Batch dispatch orchestration.
//!
//! [`run_batch`] drives any [`DispatchRun`] through prepare-then-send-each,
//! isolating per-recipient failures so one missing address-book entry cannot
//! sink the rest of the batch. [`Dispatcher`] is the production service: it
//! owns the run lock (the portal tolerates exactly one concurrent session
//! per account) and wires a fresh browser session into a [`PortalRun`] for
//! every request.

use crate::config::Config;
use crate::message::{self, MessageTemplate};
use crate::portal::errors::PortalError;
use crate::portal::session::PortalSession;
use crate::portal::verify::{SendStatus, VerifyReport};
use crate::portal::{composer, login, navigator, submit, verify, wait};
use crate::roster::{RecipientSpec, RecipientType, StudentRef};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Per-recipient outcome as reported to API callers.
#[derive(Debug, Clone, Serialize)]
pub struct RecipientResult {
    pub name: String,
    pub status: SendStatus,
    pub detail: String,
    pub dialogs_handled: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dialog_messages: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub results: Vec<RecipientResult>,
}

impl DispatchReport {
    pub fn all_sent(&self) -> bool {
        self.results.iter().all(|r| r.status == SendStatus::Sent)
    }

    pub fn successful(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == SendStatus::Sent)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == SendStatus::Failed)
            .count()
    }
}

/// What one completed send attempt yielded: the verdict plus the raw dialog
/// observations callers want echoed back.
#[derive(Debug, Clone)]
pub struct SendRecord {
    pub verdict: VerifyReport,
    pub dialogs_handled: usize,
    pub dialog_messages: Vec<String>,
}

/// One dispatch attempt against some message target.
///
/// Split from the batch loop so the loop's isolation and abort semantics can
/// be tested without a browser.
#[async_trait]
pub trait DispatchRun: Send {
    /// One-time setup for the whole batch.
    async fn prepare(&mut self) -> Result<(), PortalError>;

    /// Full select-compose-submit-verify cycle for a single recipient.
    async fn send_one(&mut self, recipient: &RecipientSpec) -> Result<SendRecord, PortalError>;
}

/// Sends to each recipient in order.
///
/// Fatal errors (authentication) abort the run; anything else becomes a
/// failed entry for that recipient and the loop moves on.
pub async fn run_batch<R: DispatchRun + ?Sized>(
    run: &mut R,
    recipients: &[RecipientSpec],
) -> Result<DispatchReport, PortalError> {
    run.prepare().await?;

    let mut results = Vec::with_capacity(recipients.len());
    for recipient in recipients {
        let name = recipient.label().to_string();
        match run.send_one(recipient).await {
            Ok(record) => {
                results.push(RecipientResult {
                    name,
                    status: record.verdict.status,
                    detail: record.verdict.detail,
                    dialogs_handled: record.dialogs_handled,
                    dialog_messages: record.dialog_messages,
                });
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(recipient = %name, error = %e, "dispatch failed for recipient");
                results.push(RecipientResult {
                    name,
                    status: SendStatus::Failed,
                    detail: e.to_string(),
                    dialogs_handled: 0,
                    dialog_messages: Vec::new(),
                });
            }
        }
    }
    Ok(DispatchReport { results })
}

/// The page-level steps of one send, in their required order, behind a trait
/// so the ordering contract itself is testable without a browser.
///
/// Selection state must never leak between recipients: the portal retains
/// checkbox state within a page load, so `clear_selections` runs before
/// every `select_recipient`.
#[async_trait]
trait ComposeCycle: Send {
    async fn open_compose_page(&mut self) -> Result<(), PortalError>;
    async fn clear_selections(&mut self) -> Result<(), PortalError>;
    async fn select_recipient(&mut self, recipient: &RecipientSpec) -> Result<(), PortalError>;
    async fn compose(&mut self) -> Result<(), PortalError>;
    async fn submit_and_verify(&mut self) -> Result<SendRecord, PortalError>;
}

async fn run_compose_cycle<C: ComposeCycle + ?Sized>(
    cycle: &mut C,
    recipient: &RecipientSpec,
) -> Result<SendRecord, PortalError> {
    cycle.open_compose_page().await?;
    cycle.clear_selections().await?;
    cycle.select_recipient(recipient).await?;
    cycle.compose().await?;
    cycle.submit_and_verify().await
}

/// The real portal-backed run: one browser session, one login, then a full
/// compose-page cycle per recipient (the page resets itself after each send).
pub struct PortalRun<'a> {
    session: PortalSession,
    config: &'a Config,
    template: &'a MessageTemplate,
    recipient_type: RecipientType,
    first_dialog_budget: std::time::Duration,
}

impl<'a> PortalRun<'a> {
    pub fn new(
        session: PortalSession,
        config: &'a Config,
        template: &'a MessageTemplate,
        recipient_type: RecipientType,
        first_dialog_budget: std::time::Duration,
    ) -> Self {
        Self {
            session,
            config,
            template,
            recipient_type,
            first_dialog_budget,
        }
    }

    pub async fn close(self) {
        self.session.close().await;
    }
}

#[async_trait]
impl ComposeCycle for PortalRun<'_> {
    async fn open_compose_page(&mut self) -> Result<(), PortalError> {
        navigator::open_compose_page(&self.session, self.config).await
    }

    async fn clear_selections(&mut self) -> Result<(), PortalError> {
        navigator::clear_selections(&self.session).await.map(|_| ())
    }

    async fn select_recipient(&mut self, recipient: &RecipientSpec) -> Result<(), PortalError> {
        navigator::select_recipient(&self.session, recipient).await
    }

    async fn compose(&mut self) -> Result<(), PortalError> {
        composer::compose(
            &self.session,
            self.template,
            self.recipient_type,
            &self.config.portal_password(),
        )
        .await
    }

    async fn submit_and_verify(&mut self) -> Result<SendRecord, PortalError> {
        let outcome = submit::submit(&self.session, self.first_dialog_budget).await?;
        let verdict = verify::verify(&self.session, &outcome).await?;
        Ok(SendRecord {
            verdict,
            dialogs_handled: outcome.dialogs_handled,
            dialog_messages: outcome.dialog_messages,
        })
    }
}

#[async_trait]
impl DispatchRun for PortalRun<'_> {
    async fn prepare(&mut self) -> Result<(), PortalError> {
        login::login(&self.session, self.config).await
    }

    async fn send_one(&mut self, recipient: &RecipientSpec) -> Result<SendRecord, PortalError> {
        run_compose_cycle(self, recipient).await
    }
}

/// What the web layer asks of the dispatch machinery. Object safe so handler
/// tests can substitute a mock.
#[async_trait]
pub trait DispatchService: Send + Sync {
    /// Sends the test notice to the designated staff test recipient.
    async fn send_test(&self) -> Result<DispatchReport, PortalError>;

    /// Sends the absence notice to each listed student's contacts.
    async fn send_absences(
        &self,
        students: Vec<StudentRef>,
        recipient_type: RecipientType,
    ) -> Result<DispatchReport, PortalError>;
}

pub struct Dispatcher {
    config: Arc<Config>,
    // The portal invalidates the older session when the same account logs in
    // twice, so runs are strictly serialized.
    run_lock: tokio::sync::Mutex<()>,
}

impl Dispatcher {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn dispatch(
        &self,
        recipients: &[RecipientSpec],
        template: &MessageTemplate,
        recipient_type: RecipientType,
    ) -> Result<DispatchReport, PortalError> {
        let _guard = self.run_lock.lock().await;
        info!(recipients = recipients.len(), "dispatch run starting");

        let session = PortalSession::open(&self.config).await?;
        let mut run = PortalRun::new(
            session,
            &self.config,
            template,
            recipient_type,
            wait::first_dialog_budget(recipients.len()),
        );
        let report = run_batch(&mut run, recipients).await;
        run.close().await;

        if let Ok(report) = &report {
            info!(
                total = report.results.len(),
                all_sent = report.all_sent(),
                "dispatch run finished"
            );
        }
        report
    }
}

#[async_trait]
impl DispatchService for Dispatcher {
    async fn send_test(&self) -> Result<DispatchReport, PortalError> {
        let recipients = vec![RecipientSpec::Staff {
            display_name: message::TEST_RECIPIENT_NAME.to_string(),
        }];
        self.dispatch(&recipients, &message::TEST_NOTICE, RecipientType::default())
            .await
    }

    async fn send_absences(
        &self,
        students: Vec<StudentRef>,
        recipient_type: RecipientType,
    ) -> Result<DispatchReport, PortalError> {
        let recipients: Vec<RecipientSpec> =
            students.into_iter().map(RecipientSpec::Student).collect();
        self.dispatch(&recipients, &message::ABSENCE_NOTICE, recipient_type)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::StudentRef;

    /// Scripted run: per-recipient outcomes keyed by name.
    struct MockRun {
        prepare_error: Option<PortalError>,
        failing: Vec<(&'static str, PortalError)>,
        sent: Vec<String>,
    }

    impl MockRun {
        fn ok() -> Self {
            Self {
                prepare_error: None,
                failing: Vec::new(),
                sent: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl DispatchRun for MockRun {
        async fn prepare(&mut self) -> Result<(), PortalError> {
            match self.prepare_error.take() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }

        async fn send_one(
            &mut self,
            recipient: &RecipientSpec,
        ) -> Result<SendRecord, PortalError> {
            let name = recipient.label().to_string();
            if let Some(pos) = self.failing.iter().position(|(n, _)| *n == name) {
                return Err(self.failing.remove(pos).1);
            }
            self.sent.push(name);
            Ok(SendRecord {
                verdict: VerifyReport {
                    status: SendStatus::Sent,
                    detail: "ok".into(),
                },
                dialogs_handled: 2,
                dialog_messages: vec!["발송하시겠습니까?".into()],
            })
        }
    }

    fn student(id: &str, name: &str) -> RecipientSpec {
        RecipientSpec::Student(StudentRef {
            student_id: id.into(),
            name: name.into(),
        })
    }

    #[tokio::test]
    async fn batch_reports_every_recipient_in_order() {
        let mut run = MockRun::ok();
        let recipients = vec![student("10823", "김민준"), student("21105", "이서연")];
        let report = run_batch(&mut run, &recipients).await.unwrap();
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[0].name, "김민준");
        assert_eq!(report.results[1].name, "이서연");
        assert!(report.all_sent());
    }

    #[tokio::test]
    async fn one_missing_recipient_does_not_sink_the_batch() {
        let mut run = MockRun::ok();
        run.failing.push((
            "이서연",
            PortalError::RecipientNotFound {
                name: "이서연".into(),
                visible: vec![],
            },
        ));
        let recipients = vec![
            student("10823", "김민준"),
            student("21105", "이서연"),
            student("30501", "박지후"),
        ];
        let report = run_batch(&mut run, &recipients).await.unwrap();
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.results[0].status, SendStatus::Sent);
        assert_eq!(report.results[1].status, SendStatus::Failed);
        assert_eq!(report.results[2].status, SendStatus::Sent);
        assert_eq!(report.results[0].dialogs_handled, 2);
        assert_eq!(report.results[1].dialogs_handled, 0);
        assert_eq!(report.successful(), 2);
        assert_eq!(report.failed(), 1);
        assert!(!report.all_sent());
        assert_eq!(run.sent, vec!["김민준", "박지후"]);
    }

    #[tokio::test]
    async fn auth_failure_aborts_the_whole_run() {
        let mut run = MockRun::ok();
        run.prepare_error = Some(PortalError::Auth("bad credentials".into()));
        let recipients = vec![student("10823", "김민준")];
        let err = run_batch(&mut run, &recipients).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(run.sent.is_empty());
    }

    /// Records each page step as it runs.
    #[derive(Default)]
    struct RecordingCycle {
        steps: Vec<String>,
    }

    #[async_trait]
    impl ComposeCycle for RecordingCycle {
        async fn open_compose_page(&mut self) -> Result<(), PortalError> {
            self.steps.push("open".into());
            Ok(())
        }

        async fn clear_selections(&mut self) -> Result<(), PortalError> {
            self.steps.push("clear".into());
            Ok(())
        }

        async fn select_recipient(
            &mut self,
            recipient: &RecipientSpec,
        ) -> Result<(), PortalError> {
            self.steps.push(format!("select:{}", recipient.label()));
            Ok(())
        }

        async fn compose(&mut self) -> Result<(), PortalError> {
            self.steps.push("compose".into());
            Ok(())
        }

        async fn submit_and_verify(&mut self) -> Result<SendRecord, PortalError> {
            self.steps.push("submit".into());
            Ok(SendRecord {
                verdict: VerifyReport {
                    status: SendStatus::Sent,
                    detail: "ok".into(),
                },
                dialogs_handled: 1,
                dialog_messages: Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn selections_are_cleared_before_every_selection() {
        let mut cycle = RecordingCycle::default();
        let recipients = vec![student("10823", "김민준"), student("21105", "이서연")];
        for recipient in &recipients {
            run_compose_cycle(&mut cycle, recipient).await.unwrap();
        }

        assert_eq!(
            cycle.steps,
            vec![
                "open",
                "clear",
                "select:김민준",
                "compose",
                "submit",
                "open",
                "clear",
                "select:이서연",
                "compose",
                "submit",
            ]
        );
        // Every selection is immediately preceded by a clear, so no checkbox
        // state survives from the previous recipient.
        for (i, step) in cycle.steps.iter().enumerate() {
            if step.starts_with("select:") {
                assert_eq!(cycle.steps[i - 1], "clear");
            }
        }
    }

    #[tokio::test]
    async fn empty_batch_is_a_valid_noop() {
        let mut run = MockRun::ok();
        let report = run_batch(&mut run, &[]).await.unwrap();
        assert!(report.results.is_empty());
        assert!(report.all_sent());
    }
}
