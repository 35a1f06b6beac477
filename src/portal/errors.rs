//! Error types for the portal automation workflow.

/// Failures raised while driving the portal UI.
///
/// `Auth` is fatal to an entire dispatch run; the others are terminal for a
/// single recipient and are converted into error results at the batch loop.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("login failed: {0}")]
    Auth(String),
    #[error("recipient '{name}' not found in address book (visible: {visible:?})")]
    RecipientNotFound { name: String, visible: Vec<String> },
    #[error("message composition failed: {0}")]
    Composition(String),
    #[error("send or confirmation flow failed: {0}")]
    Submission(String),
    #[error(transparent)]
    Browser(#[from] anyhow::Error),
}

impl PortalError {
    /// True when the failure poisons the whole run rather than one recipient.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PortalError::Auth(_))
    }
}

impl From<chromiumoxide::error::CdpError> for PortalError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        PortalError::Browser(anyhow::Error::from(err))
    }
}
