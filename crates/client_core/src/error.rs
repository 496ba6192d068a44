use shared::sanitize::{DETAILS_MAX, DETAILS_MIN, FEEDBACK_MIN, VISA_LABEL_MIN};
use thiserror::Error;

use crate::screens::StepKind;

/// A required field is missing or out of range; the primary action stays disabled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("please answer: {0}")]
    MissingAnswer(&'static str),
    #[error("please choose a reason")]
    MissingReason,
    #[error("please enter a valid amount")]
    InvalidPrice,
    #[error("please enter at least {} characters (max {})", DETAILS_MIN, DETAILS_MAX)]
    DetailsTooShort { actual: usize },
    #[error("please enter at least {} characters", FEEDBACK_MIN)]
    FeedbackTooShort { actual: usize },
    #[error("please enter a visa type of at least {} characters", VISA_LABEL_MIN)]
    VisaTypeTooShort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CsrfError {
    #[error("anti-forgery token is missing")]
    Missing,
    #[error("anti-forgery header does not match the session cookie")]
    Mismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("{0}")]
    Csrf(#[from] CsrfError),
    #[error("request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    #[error("request failed ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("unexpected submission failure: {0}")]
    Unexpected(String),
}

impl SubmitError {
    /// Text shown inline on the step that attempted the submission.
    pub fn display_message(&self) -> String {
        match self {
            Self::Csrf(_) => "Your session could not be verified. Reload the page and try again."
                .to_string(),
            Self::Timeout { .. } => "Request timed out.".to_string(),
            Self::Http { message, .. } => message.clone(),
            Self::Unexpected(_) => "Something went wrong.".to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Csrf(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{event} is not available on the {step:?} step")]
    NotAvailable { step: StepKind, event: &'static str },
    #[error("the {0} choice is locked; use change to pick again")]
    SelectionLocked(&'static str),
    #[error("a submission for this step is already in flight")]
    SubmissionInFlight,
    #[error("no submission is pending for the current step")]
    NoPendingSubmission,
}
