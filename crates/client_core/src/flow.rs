use rand::{rngs::StdRng, SeedableRng};
use shared::domain::{CancellationReason, VisaSource};
use tracing::{debug, info, warn};

use crate::{
    ab::{assign_variant, clear_variant, discounted_price_cents, AbOverride},
    cookies::SessionCookies,
    error::{FlowError, SubmitError, ValidationError},
    screens::{
        CongratsForm, FeedbackForm, FieldEdit, FlowEvent, OfferScreen, ReasonForm, Step,
        StepKind, SubmissionTicket, SurveyForm, VisaForm,
    },
    store::{FlowState, FlowStore, OfferAcceptance},
    submission::SubmissionPayload,
};

pub const DEFAULT_PLAN_PRICE_CENTS: u32 = 2500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowConfig {
    pub plan_price_cents: u32,
    pub ab_override: Option<AbOverride>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            plan_price_cents: DEFAULT_PLAN_PRICE_CENTS,
            ab_override: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Moved { from: StepKind, to: StepKind },
    Stayed(StepKind),
    Submit {
        ticket: SubmissionTicket,
        payload: SubmissionPayload,
    },
}

pub struct FlowController {
    store: FlowStore,
    step: Step,
    config: FlowConfig,
    cookies: SessionCookies,
    rng: StdRng,
    next_ticket: u64,
}

impl FlowController {
    pub fn new(config: FlowConfig, cookies: SessionCookies) -> Self {
        Self::with_rng(config, cookies, StdRng::from_entropy())
    }

    pub fn with_rng(config: FlowConfig, cookies: SessionCookies, rng: StdRng) -> Self {
        Self {
            store: FlowStore::new(),
            step: Step::Empty,
            config,
            cookies,
            rng,
            next_ticket: 0,
        }
    }

    pub fn step(&self) -> &Step {
        &self.step
    }

    pub fn state(&self) -> &FlowState {
        self.store.get()
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn cookies(&self) -> &SessionCookies {
        &self.cookies
    }

    pub fn open(&mut self) -> Result<Transition, FlowError> {
        self.dispatch(FlowEvent::Open)
    }

    pub fn dispatch(&mut self, event: FlowEvent) -> Result<Transition, FlowError> {
        let from = self.step.kind();
        let not_available = FlowError::NotAvailable {
            step: from,
            event: event.name(),
        };

        let next = match (event, from) {
            (FlowEvent::Open, StepKind::Empty | StepKind::Closed) => {
                self.store.reset();
                Step::Question
            }
            (FlowEvent::Close, _) => return Ok(self.close()),
            (FlowEvent::Edit(edit), _) => return self.apply_edit(edit),
            (FlowEvent::ChangeSelection, _) => return self.change_selection(),
            (FlowEvent::DismissError, _) => {
                let status = self.step.status_mut().ok_or(not_available)?;
                status.error = None;
                return Ok(Transition::Stayed(from));
            }
            (FlowEvent::Back, _) => self.back_target().ok_or(not_available)?,
            (FlowEvent::Next, _) => return self.next(),
            (FlowEvent::FoundJob, StepKind::Question) => {
                self.store.set_found_job(true);
                Step::CongratsSurvey(CongratsForm::prefilled(self.store.get()))
            }
            (FlowEvent::NotYet, StepKind::Question) => {
                self.store.set_found_job(false);
                self.enter_offer()
            }
            (FlowEvent::AcceptOffer, StepKind::OfferAb) => {
                let Step::OfferAb(offer) = self.step else {
                    return Err(not_available);
                };
                let acceptance = OfferAcceptance::from(offer);
                self.store.set_offer_acceptance(acceptance);
                info!(
                    variant = acceptance.variant.as_str(),
                    discounted_price_cents = acceptance.discounted_price_cents,
                    "retention offer accepted"
                );
                Step::OfferAccepted(acceptance)
            }
            (FlowEvent::DeclineOffer, StepKind::OfferAb) => {
                Step::OfferDeclinedSurvey(SurveyForm::prefilled(self.store.get()))
            }
            (
                FlowEvent::Upsell,
                StepKind::OfferDeclinedSurvey | StepKind::CancelReasonSelection,
            ) => self.enter_offer(),
            (
                FlowEvent::Finish,
                StepKind::CancellationComplete | StepKind::OfferAccepted,
            ) => return Ok(self.finish()),
            _ => return Err(not_available),
        };

        Ok(self.move_to(next))
    }

    /// Late results for a screen that is no longer waiting on `ticket` are rejected.
    pub fn complete_submission(
        &mut self,
        ticket: SubmissionTicket,
        outcome: Result<(), SubmitError>,
    ) -> Result<Transition, FlowError> {
        let from = self.step.kind();
        let status = self
            .step
            .status_mut()
            .filter(|status| status.pending == Some(ticket))
            .ok_or(FlowError::NoPendingSubmission)?;
        status.pending = None;

        match outcome {
            Ok(()) => {
                if from == StepKind::VisaSupport {
                    self.store.clear_visa_support();
                }
                info!(step = %from, "submission completed");
                Ok(self.move_to(Step::CancellationComplete))
            }
            Err(err) => {
                warn!(step = %from, error = %err, retryable = err.is_retryable(), "submission failed");
                status.error = Some(err.display_message());
                Ok(Transition::Stayed(from))
            }
        }
    }

    fn move_to(&mut self, next: Step) -> Transition {
        let from = self.step.kind();
        let to = next.kind();
        self.step = next;
        debug!(from = %from, to = %to, "step transition");
        Transition::Moved { from, to }
    }

    fn close(&mut self) -> Transition {
        if matches!(self.step, Step::OfferAb(_)) {
            clear_variant(&self.cookies);
        }
        self.store.reset();
        self.move_to(Step::Closed)
    }

    fn finish(&mut self) -> Transition {
        self.store.reset();
        self.move_to(Step::Closed)
    }

    fn enter_offer(&mut self) -> Step {
        // The override applies on every entry, not just the first one after open.
        let variant = assign_variant(&self.cookies, self.config.ab_override, &mut self.rng);
        self.store.set_variant(Some(variant));
        let base_price_cents = self.config.plan_price_cents;
        Step::OfferAb(OfferScreen {
            variant,
            base_price_cents,
            discounted_price_cents: discounted_price_cents(variant, base_price_cents),
        })
    }

    fn back_target(&mut self) -> Option<Step> {
        let target = match self.step.kind() {
            StepKind::CongratsSurvey => Step::Question,
            StepKind::Feedback => Step::CongratsSurvey(CongratsForm::prefilled(self.store.get())),
            StepKind::VisaSupport => Step::Feedback(FeedbackForm::prefilled(self.store.get())),
            StepKind::OfferAb => {
                clear_variant(&self.cookies);
                self.store.set_variant(None);
                Step::Question
            }
            StepKind::OfferDeclinedSurvey => self.enter_offer(),
            StepKind::CancelReasonSelection => {
                Step::OfferDeclinedSurvey(SurveyForm::prefilled(self.store.get()))
            }
            StepKind::Empty
            | StepKind::Question
            | StepKind::OfferAccepted
            | StepKind::CancellationComplete
            | StepKind::Closed => return None,
        };
        Some(target)
    }

    fn next(&mut self) -> Result<Transition, FlowError> {
        let from = self.step.kind();
        let not_available = FlowError::NotAvailable {
            step: from,
            event: "next",
        };
        match from {
            StepKind::OfferAccepted | StepKind::CancellationComplete => return Ok(self.finish()),
            StepKind::Empty | StepKind::Question | StepKind::OfferAb | StepKind::Closed => {
                return Err(not_available);
            }
            _ => {}
        }
        let plan_price_cents = self.config.plan_price_cents;

        let next = match &mut self.step {
            Step::CongratsSurvey(form) => {
                form.validate()?;
                self.store.set_congrats_survey(&form.answers);
                self.store.set_survey(&form.usage);
                Step::Feedback(FeedbackForm::prefilled(self.store.get()))
            }
            Step::Feedback(form) => {
                self.store.set_feedback(&form.text)?;
                let source = match self.store.get().job_found_via_platform {
                    Some(true) => VisaSource::WithPlatform,
                    _ => VisaSource::NoPlatform,
                };
                Step::VisaSupport(VisaForm::new(source))
            }
            Step::VisaSupport(form) => {
                if form.status.is_pending() {
                    return Err(FlowError::SubmissionInFlight);
                }
                let has_company_lawyer = form.validate()?;
                self.store
                    .set_visa_support(form.source, has_company_lawyer, &form.visa_type)?;
                let payload = self
                    .store
                    .get()
                    .visa_request()
                    .map(SubmissionPayload::Visa)
                    .ok_or(FlowError::NoPendingSubmission)?;
                self.next_ticket += 1;
                let ticket = SubmissionTicket(self.next_ticket);
                form.status.pending = Some(ticket);
                form.status.error = None;
                return Ok(Transition::Submit { ticket, payload });
            }
            Step::OfferDeclinedSurvey(form) => {
                form.validate()?;
                self.store.set_survey(&form.answers);
                Step::CancelReasonSelection(ReasonForm::prefilled(
                    self.store.get(),
                    plan_price_cents,
                ))
            }
            Step::CancelReasonSelection(form) => {
                if form.status.is_pending() {
                    return Err(FlowError::SubmissionInFlight);
                }
                let reason = form.validate()?;
                self.store
                    .set_reason(reason, form.input(), form.plan_price_cents)?;
                let payload = self
                    .store
                    .get()
                    .reason_request()
                    .map(SubmissionPayload::Reason)
                    .ok_or(FlowError::NoPendingSubmission)?;
                self.next_ticket += 1;
                let ticket = SubmissionTicket(self.next_ticket);
                form.status.pending = Some(ticket);
                form.status.error = None;
                return Ok(Transition::Submit { ticket, payload });
            }
            _ => return Err(not_available),
        };

        Ok(self.move_to(next))
    }

    fn apply_edit(&mut self, edit: FieldEdit) -> Result<Transition, FlowError> {
        let from = self.step.kind();
        let not_available = FlowError::NotAvailable {
            step: from,
            event: "edit",
        };

        match (&mut self.step, edit) {
            (Step::CongratsSurvey(form), FieldEdit::FoundViaPlatform(value)) => {
                form.answers.found_via_platform = Some(value);
            }
            (Step::CongratsSurvey(form), FieldEdit::JobTitle(value)) => {
                form.answers.job_title = Some(value);
            }
            (Step::CongratsSurvey(form), FieldEdit::Company(value)) => {
                form.answers.company = Some(value);
            }
            (Step::CongratsSurvey(form), FieldEdit::City(value)) => form.answers.city = Some(value),
            (Step::CongratsSurvey(form), FieldEdit::Country(value)) => {
                form.answers.country = Some(value);
            }
            (Step::CongratsSurvey(form), FieldEdit::AppliedViaPlatform(value)) => {
                form.usage.applied_via_platform = Some(value);
            }
            (Step::CongratsSurvey(form), FieldEdit::EmailedCompanies(value)) => {
                form.usage.emailed_companies = Some(value);
            }
            (Step::CongratsSurvey(form), FieldEdit::InterviewedCompanies(value)) => {
                form.usage.interviewed_companies = Some(value);
            }
            (Step::OfferDeclinedSurvey(form), FieldEdit::AppliedViaPlatform(value)) => {
                form.answers.applied_via_platform = Some(value);
            }
            (Step::OfferDeclinedSurvey(form), FieldEdit::EmailedCompanies(value)) => {
                form.answers.emailed_companies = Some(value);
            }
            (Step::OfferDeclinedSurvey(form), FieldEdit::InterviewedCompanies(value)) => {
                form.answers.interviewed_companies = Some(value);
            }
            (Step::Feedback(form), FieldEdit::Feedback(value)) => form.text = value,
            (Step::VisaSupport(form), FieldEdit::HasCompanyLawyer(value)) => {
                if form.has_company_lawyer.is_some() {
                    return Err(FlowError::SelectionLocked("company lawyer"));
                }
                form.has_company_lawyer = Some(value);
            }
            (Step::VisaSupport(form), FieldEdit::VisaType(value)) => form.visa_type = value,
            (Step::CancelReasonSelection(form), FieldEdit::Reason(value)) => {
                if form.reason.is_some() {
                    return Err(FlowError::SelectionLocked("reason"));
                }
                let reason = CancellationReason::parse(value.trim())
                    .ok_or(ValidationError::MissingReason)?;
                form.reason = Some(reason);
            }
            (Step::CancelReasonSelection(form), FieldEdit::MaxPrice(value)) => form.price = value,
            (Step::CancelReasonSelection(form), FieldEdit::Details(value)) => {
                form.details = value;
            }
            _ => return Err(not_available),
        }

        Ok(Transition::Stayed(from))
    }

    fn change_selection(&mut self) -> Result<Transition, FlowError> {
        let from = self.step.kind();
        match &mut self.step {
            Step::CancelReasonSelection(form) => form.change(),
            Step::VisaSupport(form) => {
                form.has_company_lawyer = None;
                form.status.error = None;
            }
            _ => {
                return Err(FlowError::NotAvailable {
                    step: from,
                    event: "change_selection",
                })
            }
        }
        Ok(Transition::Stayed(from))
    }
}

#[cfg(test)]
#[path = "tests/flow_tests.rs"]
mod tests;
