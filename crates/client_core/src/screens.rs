//! Step screens: one variant per modal, each carrying only its own form fields.

use std::fmt;

use serde::Deserialize;
use shared::{
    domain::{AbVariant, CancellationReason, VisaSource},
    protocol::{CongratsSurveyInput, OfferSurveyInput},
    sanitize::{sanitize_congrats_survey, sanitize_offer_survey},
};

use crate::{
    error::ValidationError,
    store::{
        validate_feedback, validate_reason, validate_visa_type, FlowState, OfferAcceptance,
        ReasonInput, ReasonPayload,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    Empty,
    Question,
    CongratsSurvey,
    Feedback,
    VisaSupport,
    OfferAb,
    OfferAccepted,
    OfferDeclinedSurvey,
    CancelReasonSelection,
    CancellationComplete,
    Closed,
}

impl StepKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Question => "question",
            Self::CongratsSurvey => "congratsSurvey",
            Self::Feedback => "feedback",
            Self::VisaSupport => "visaSupport",
            Self::OfferAb => "offerAB",
            Self::OfferAccepted => "offerAccepted",
            Self::OfferDeclinedSurvey => "offerDeclinedSurvey",
            Self::CancelReasonSelection => "cancelReasonSelection",
            Self::CancellationComplete => "cancellationComplete",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one submit attempt so a late response can't land on a different screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubmissionTicket(pub(crate) u64);

/// In-flight marker and dismissible inline error of a submitting screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitStatus {
    pub pending: Option<SubmissionTicket>,
    pub error: Option<String>,
}

impl SubmitStatus {
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CongratsForm {
    pub answers: CongratsSurveyInput,
    pub usage: OfferSurveyInput,
}

impl CongratsForm {
    pub fn prefilled(state: &FlowState) -> Self {
        Self {
            answers: state
                .congrats_survey
                .as_ref()
                .map(CongratsSurveyInput::from)
                .unwrap_or_default(),
            usage: state
                .offer_survey
                .as_ref()
                .map(OfferSurveyInput::from)
                .unwrap_or_default(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if sanitize_congrats_survey(&self.answers)
            .found_via_platform
            .is_none()
        {
            return Err(ValidationError::MissingAnswer("found via platform"));
        }
        require_usage_bins(&self.usage)
    }

    pub fn is_complete(&self) -> bool {
        self.validate().is_ok()
    }
}

fn require_usage_bins(usage: &OfferSurveyInput) -> Result<(), ValidationError> {
    let survey = sanitize_offer_survey(usage);
    if survey.applied_via_platform.is_none() {
        return Err(ValidationError::MissingAnswer("applied via platform"));
    }
    if survey.emailed_companies.is_none() {
        return Err(ValidationError::MissingAnswer("emailed companies"));
    }
    if survey.interviewed_companies.is_none() {
        return Err(ValidationError::MissingAnswer("interviewed companies"));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedbackForm {
    pub text: String,
}

impl FeedbackForm {
    pub fn prefilled(state: &FlowState) -> Self {
        Self {
            text: state.feedback.clone().unwrap_or_default(),
        }
    }

    pub fn is_complete(&self) -> bool {
        validate_feedback(&self.text).is_ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisaForm {
    pub source: VisaSource,
    /// Picking an answer locks it until a `change` event.
    pub has_company_lawyer: Option<bool>,
    pub visa_type: String,
    pub status: SubmitStatus,
}

impl VisaForm {
    pub fn new(source: VisaSource) -> Self {
        Self {
            source,
            has_company_lawyer: None,
            visa_type: String::new(),
            status: SubmitStatus::default(),
        }
    }

    pub fn validate(&self) -> Result<bool, ValidationError> {
        let has_company_lawyer = self
            .has_company_lawyer
            .ok_or(ValidationError::MissingAnswer("company lawyer"))?;
        validate_visa_type(&self.visa_type)?;
        Ok(has_company_lawyer)
    }

    pub fn is_complete(&self) -> bool {
        self.validate().is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferScreen {
    pub variant: AbVariant,
    pub base_price_cents: u32,
    pub discounted_price_cents: u32,
}

impl From<OfferScreen> for OfferAcceptance {
    fn from(offer: OfferScreen) -> Self {
        Self {
            variant: offer.variant,
            base_price_cents: offer.base_price_cents,
            discounted_price_cents: offer.discounted_price_cents,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurveyForm {
    pub answers: OfferSurveyInput,
}

impl SurveyForm {
    pub fn prefilled(state: &FlowState) -> Self {
        Self {
            answers: state
                .offer_survey
                .as_ref()
                .map(OfferSurveyInput::from)
                .unwrap_or_default(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_usage_bins(&self.answers)
    }

    pub fn is_complete(&self) -> bool {
        self.validate().is_ok()
    }

    /// The way back to the offer never depends on the survey answers.
    pub fn upsell_enabled(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasonForm {
    /// Picking a reason locks it until a `change` event.
    pub reason: Option<CancellationReason>,
    pub price: String,
    pub details: String,
    pub plan_price_cents: u32,
    pub status: SubmitStatus,
}

impl ReasonForm {
    pub fn new(plan_price_cents: u32) -> Self {
        Self {
            reason: None,
            price: String::new(),
            details: String::new(),
            plan_price_cents,
            status: SubmitStatus::default(),
        }
    }

    pub fn prefilled(state: &FlowState, plan_price_cents: u32) -> Self {
        let mut form = Self::new(plan_price_cents);
        if let Some(record) = &state.cancellation {
            form.reason = Some(record.reason);
            match &record.payload {
                ReasonPayload::MaxPriceCents(cents) => {
                    form.price = format!("{}.{:02}", cents / 100, cents % 100);
                }
                ReasonPayload::Details(details) => form.details.clone_from(details),
            }
        }
        form
    }

    pub fn input(&self) -> ReasonInput<'_> {
        ReasonInput {
            price: &self.price,
            details: &self.details,
        }
    }

    pub fn validate(&self) -> Result<CancellationReason, ValidationError> {
        let reason = self.reason.ok_or(ValidationError::MissingReason)?;
        validate_reason(reason, self.input(), self.plan_price_cents)?;
        Ok(reason)
    }

    pub fn is_complete(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn upsell_enabled(&self) -> bool {
        true
    }

    /// Unlocks the reason pick and forgets everything typed for it.
    pub fn change(&mut self) {
        self.reason = None;
        self.price.clear();
        self.details.clear();
        self.status.error = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Empty,
    Question,
    CongratsSurvey(CongratsForm),
    Feedback(FeedbackForm),
    VisaSupport(VisaForm),
    OfferAb(OfferScreen),
    OfferAccepted(OfferAcceptance),
    OfferDeclinedSurvey(SurveyForm),
    CancelReasonSelection(ReasonForm),
    CancellationComplete,
    Closed,
}

impl Step {
    pub fn kind(&self) -> StepKind {
        match self {
            Self::Empty => StepKind::Empty,
            Self::Question => StepKind::Question,
            Self::CongratsSurvey(_) => StepKind::CongratsSurvey,
            Self::Feedback(_) => StepKind::Feedback,
            Self::VisaSupport(_) => StepKind::VisaSupport,
            Self::OfferAb(_) => StepKind::OfferAb,
            Self::OfferAccepted(_) => StepKind::OfferAccepted,
            Self::OfferDeclinedSurvey(_) => StepKind::OfferDeclinedSurvey,
            Self::CancelReasonSelection(_) => StepKind::CancelReasonSelection,
            Self::CancellationComplete => StepKind::CancellationComplete,
            Self::Closed => StepKind::Closed,
        }
    }

    pub fn status(&self) -> Option<&SubmitStatus> {
        match self {
            Self::VisaSupport(form) => Some(&form.status),
            Self::CancelReasonSelection(form) => Some(&form.status),
            _ => None,
        }
    }

    pub(crate) fn status_mut(&mut self) -> Option<&mut SubmitStatus> {
        match self {
            Self::VisaSupport(form) => Some(&mut form.status),
            Self::CancelReasonSelection(form) => Some(&mut form.status),
            _ => None,
        }
    }

    /// Whether the primary action (continue/complete) would be accepted right now.
    pub fn primary_enabled(&self) -> bool {
        match self {
            Self::CongratsSurvey(form) => form.is_complete(),
            Self::Feedback(form) => form.is_complete(),
            Self::VisaSupport(form) => !form.status.is_pending() && form.is_complete(),
            Self::OfferDeclinedSurvey(form) => form.is_complete(),
            Self::CancelReasonSelection(form) => {
                !form.status.is_pending() && form.is_complete()
            }
            Self::OfferAccepted(_) | Self::CancellationComplete => true,
            Self::Empty | Self::Question | Self::OfferAb(_) | Self::Closed => false,
        }
    }
}

/// One raw field edit; values are kept exactly as typed until the step is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum FieldEdit {
    FoundViaPlatform(String),
    JobTitle(String),
    Company(String),
    City(String),
    Country(String),
    AppliedViaPlatform(String),
    EmailedCompanies(String),
    InterviewedCompanies(String),
    Feedback(String),
    HasCompanyLawyer(bool),
    VisaType(String),
    Reason(String),
    MaxPrice(String),
    Details(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum FlowEvent {
    Open,
    FoundJob,
    NotYet,
    Edit(FieldEdit),
    Next,
    Back,
    Close,
    AcceptOffer,
    DeclineOffer,
    Upsell,
    ChangeSelection,
    DismissError,
    Finish,
}

impl FlowEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::FoundJob => "found_job",
            Self::NotYet => "not_yet",
            Self::Edit(_) => "edit",
            Self::Next => "next",
            Self::Back => "back",
            Self::Close => "close",
            Self::AcceptOffer => "accept_offer",
            Self::DeclineOffer => "decline_offer",
            Self::Upsell => "upsell",
            Self::ChangeSelection => "change_selection",
            Self::DismissError => "dismiss_error",
            Self::Finish => "finish",
        }
    }
}
