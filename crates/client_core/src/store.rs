//! Answers collected so far in one wizard session.
//!
//! Every setter sanitizes its own input; callers are never trusted to have done it.

use shared::{
    domain::{AbVariant, CancellationReason, VisaSource},
    protocol::{
        CancellationReasonRequest, CongratsSurvey, CongratsSurveyInput, OfferSurvey,
        OfferSurveyInput, VisaSupportRequest,
    },
    sanitize::{
        parse_price_to_cents, sanitize_congrats_survey, sanitize_offer_survey, sanitize_text,
        sanitize_visa_label, DETAILS_MAX, DETAILS_MIN, FEEDBACK_MIN, VISA_LABEL_MIN,
    },
};

use crate::error::ValidationError;

/// Reason-dependent payload; the enum makes "price XOR details" structural.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReasonPayload {
    MaxPriceCents(u32),
    Details(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationRecord {
    pub reason: CancellationReason,
    pub payload: ReasonPayload,
}

impl CancellationRecord {
    pub fn to_request(&self, offer_survey: Option<&OfferSurvey>) -> CancellationReasonRequest {
        let (details, max_price_cents) = match &self.payload {
            ReasonPayload::MaxPriceCents(cents) => (None, Some(*cents)),
            ReasonPayload::Details(details) => (Some(details.clone()), None),
        };
        CancellationReasonRequest {
            reason: self.reason,
            details,
            max_price_cents,
            offer_survey: offer_survey.filter(|survey| !survey.is_empty()).cloned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisaSupport {
    pub has_company_lawyer: bool,
    pub visa_type: String,
    pub source: VisaSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferAcceptance {
    pub variant: AbVariant,
    pub base_price_cents: u32,
    pub discounted_price_cents: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowState {
    pub found_job: Option<bool>,
    pub job_found_via_platform: Option<bool>,
    pub offer_survey: Option<OfferSurvey>,
    pub congrats_survey: Option<CongratsSurvey>,
    pub feedback: Option<String>,
    pub cancellation: Option<CancellationRecord>,
    pub visa_support: Option<VisaSupport>,
    pub ab_variant: Option<AbVariant>,
    pub offer_acceptance: Option<OfferAcceptance>,
}

impl FlowState {
    pub fn visa_request(&self) -> Option<VisaSupportRequest> {
        let visa = self.visa_support.as_ref()?;
        Some(VisaSupportRequest {
            source: visa.source,
            has_company_lawyer: visa.has_company_lawyer,
            visa_type: visa.visa_type.clone(),
            offer_usage: self
                .offer_survey
                .clone()
                .filter(|survey| !survey.is_empty()),
            congrats_survey: self
                .congrats_survey
                .clone()
                .filter(|survey| !survey.is_empty()),
        })
    }

    pub fn reason_request(&self) -> Option<CancellationReasonRequest> {
        self.cancellation
            .as_ref()
            .map(|record| record.to_request(self.offer_survey.as_ref()))
    }
}

/// Raw reason-screen fields exactly as typed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReasonInput<'a> {
    pub price: &'a str,
    pub details: &'a str,
}

pub fn validate_reason(
    reason: CancellationReason,
    input: ReasonInput<'_>,
    plan_price_cents: u32,
) -> Result<ReasonPayload, ValidationError> {
    if reason.expects_price() {
        return match parse_price_to_cents(input.price, plan_price_cents) {
            Some(cents) if cents > 0 && cents <= plan_price_cents => {
                Ok(ReasonPayload::MaxPriceCents(cents))
            }
            _ => Err(ValidationError::InvalidPrice),
        };
    }

    let details = sanitize_text(input.details, DETAILS_MAX);
    let actual = details.chars().count();
    if actual < DETAILS_MIN {
        return Err(ValidationError::DetailsTooShort { actual });
    }
    Ok(ReasonPayload::Details(details))
}

/// Gated on what the user typed (trimmed); the stored copy is sanitized.
pub fn validate_feedback(raw: &str) -> Result<String, ValidationError> {
    let actual = raw.trim().chars().count();
    if actual < FEEDBACK_MIN {
        return Err(ValidationError::FeedbackTooShort { actual });
    }
    Ok(sanitize_text(raw, DETAILS_MAX))
}

pub fn validate_visa_type(raw: &str) -> Result<String, ValidationError> {
    let visa_type = sanitize_visa_label(raw);
    if visa_type.chars().count() < VISA_LABEL_MIN {
        return Err(ValidationError::VisaTypeTooShort);
    }
    Ok(visa_type)
}

#[derive(Debug, Default)]
pub struct FlowStore {
    state: FlowState,
}

impl FlowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> &FlowState {
        &self.state
    }

    pub fn set_found_job(&mut self, found_job: bool) {
        self.state.found_job = Some(found_job);
    }

    pub fn set_survey(&mut self, input: &OfferSurveyInput) -> &OfferSurvey {
        let clean = sanitize_offer_survey(input);
        let survey = self.state.offer_survey.get_or_insert_with(OfferSurvey::default);
        survey.merge(&clean);
        survey
    }

    pub fn set_congrats_survey(&mut self, input: &CongratsSurveyInput) -> &CongratsSurvey {
        let clean = sanitize_congrats_survey(input);
        if let Some(found) = clean.found_via_platform {
            self.state.job_found_via_platform = Some(found.is_yes());
        }
        let survey = self
            .state
            .congrats_survey
            .get_or_insert_with(CongratsSurvey::default);
        survey.merge(&clean);
        survey
    }

    pub fn set_feedback(&mut self, raw: &str) -> Result<&str, ValidationError> {
        let feedback = validate_feedback(raw)?;
        Ok(self.state.feedback.insert(feedback).as_str())
    }

    pub fn set_reason(
        &mut self,
        reason: CancellationReason,
        input: ReasonInput<'_>,
        plan_price_cents: u32,
    ) -> Result<&CancellationRecord, ValidationError> {
        let payload = validate_reason(reason, input, plan_price_cents)?;
        Ok(&*self
            .state
            .cancellation
            .insert(CancellationRecord { reason, payload }))
    }

    pub fn set_visa_support(
        &mut self,
        source: VisaSource,
        has_company_lawyer: bool,
        raw_visa_type: &str,
    ) -> Result<&VisaSupport, ValidationError> {
        let visa_type = validate_visa_type(raw_visa_type)?;
        Ok(&*self.state.visa_support.insert(VisaSupport {
            has_company_lawyer,
            visa_type,
            source,
        }))
    }

    /// Drops visa answers once they have been delivered.
    pub fn clear_visa_support(&mut self) {
        self.state.visa_support = None;
    }

    pub fn set_variant(&mut self, variant: Option<AbVariant>) {
        self.state.ab_variant = variant;
    }

    pub fn set_offer_acceptance(&mut self, acceptance: OfferAcceptance) {
        self.state.offer_acceptance = Some(acceptance);
    }

    pub fn reset(&mut self) {
        self.state = FlowState::default();
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
