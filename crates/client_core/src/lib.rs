//! Client side of the cancellation wizard: answer store, step state machine, offer
//! assignment and the submission client that talks to the cancellation boundary.

pub mod ab;
pub mod cookies;
pub mod error;
pub mod flow;
pub mod screens;
pub mod session;
pub mod store;
pub mod submission;

pub use ab::AbOverride;
pub use cookies::{CsrfTokenSource, SessionCookies};
pub use error::{CsrfError, FlowError, SubmitError, ValidationError};
pub use flow::{FlowConfig, FlowController, Transition, DEFAULT_PLAN_PRICE_CENTS};
pub use screens::{FieldEdit, FlowEvent, Step, StepKind};
pub use session::WizardSession;
pub use store::{FlowState, FlowStore};
pub use submission::{
    Endpoint, SubmissionClient, SubmissionConfig, SubmissionPayload, Submitter,
    DEFAULT_SUBMIT_TIMEOUT,
};
