use std::sync::Arc;

use crate::{
    error::FlowError,
    flow::{FlowController, Transition},
    screens::{FlowEvent, Step},
    store::FlowState,
    submission::Submitter,
};

/// Drives a [`FlowController`] and performs the submissions it asks for.
///
/// Submission failures never surface as `Err` here; they land on the active screen as
/// an inline error, exactly as a user would see them.
pub struct WizardSession {
    controller: FlowController,
    submitter: Arc<dyn Submitter>,
}

impl WizardSession {
    pub fn new(controller: FlowController, submitter: Arc<dyn Submitter>) -> Self {
        Self {
            controller,
            submitter,
        }
    }

    pub fn controller(&self) -> &FlowController {
        &self.controller
    }

    pub fn step(&self) -> &Step {
        self.controller.step()
    }

    pub fn state(&self) -> &FlowState {
        self.controller.state()
    }

    pub async fn dispatch(&mut self, event: FlowEvent) -> Result<Transition, FlowError> {
        match self.controller.dispatch(event)? {
            Transition::Submit { ticket, payload } => {
                let outcome = self.submitter.submit_payload(&payload).await;
                self.controller.complete_submission(ticket, outcome)
            }
            transition => Ok(transition),
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
