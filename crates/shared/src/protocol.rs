use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::{CancellationReason, CountBin, InterviewBin, VisaSource, YesNo};

pub const CSRF_COOKIE_NAME: &str = "csrfToken";
pub const CSRF_HEADER_NAME: &str = "x-csrf-token";
pub const AB_VARIANT_COOKIE_NAME: &str = "ab_offer_variant";

pub fn cancellation_reason_route() -> &'static str {
    "/cancellation-reason"
}

pub fn cancellation_visa_route() -> &'static str {
    "/cancellation-visa"
}

pub fn healthz_route() -> &'static str {
    "/healthz"
}

pub fn cookie_value<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

pub fn set_cookie_pair(set_cookie: &str) -> Option<(&str, &str)> {
    let pair = set_cookie.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    if name.is_empty() {
        return None;
    }
    Some((name, value))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferSurvey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_via_platform: Option<CountBin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emailed_companies: Option<CountBin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interviewed_companies: Option<InterviewBin>,
}

impl OfferSurvey {
    pub fn is_empty(&self) -> bool {
        self.applied_via_platform.is_none()
            && self.emailed_companies.is_none()
            && self.interviewed_companies.is_none()
    }

    pub fn merge(&mut self, other: &OfferSurvey) {
        if other.applied_via_platform.is_some() {
            self.applied_via_platform = other.applied_via_platform;
        }
        if other.emailed_companies.is_some() {
            self.emailed_companies = other.emailed_companies;
        }
        if other.interviewed_companies.is_some() {
            self.interviewed_companies = other.interviewed_companies;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CongratsSurvey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub found_via_platform: Option<YesNo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl CongratsSurvey {
    pub fn is_empty(&self) -> bool {
        self.found_via_platform.is_none()
            && self.job_title.is_none()
            && self.company.is_none()
            && self.city.is_none()
            && self.country.is_none()
    }

    pub fn merge(&mut self, other: &CongratsSurvey) {
        if other.found_via_platform.is_some() {
            self.found_via_platform = other.found_via_platform;
        }
        for (ours, theirs) in [
            (&mut self.job_title, &other.job_title),
            (&mut self.company, &other.company),
            (&mut self.city, &other.city),
            (&mut self.country, &other.country),
        ] {
            if theirs.is_some() {
                ours.clone_from(theirs);
            }
        }
    }
}

// Raw form input; see `sanitize::sanitize_offer_survey`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferSurveyInput {
    #[serde(default, deserialize_with = "lenient_string")]
    pub applied_via_platform: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub emailed_companies: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub interviewed_companies: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CongratsSurveyInput {
    #[serde(default, deserialize_with = "lenient_string")]
    pub found_via_platform: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub job_title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub company: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub country: Option<String>,
}

impl From<&OfferSurvey> for OfferSurveyInput {
    fn from(survey: &OfferSurvey) -> Self {
        Self {
            applied_via_platform: survey.applied_via_platform.map(|bin| bin.as_str().to_string()),
            emailed_companies: survey.emailed_companies.map(|bin| bin.as_str().to_string()),
            interviewed_companies: survey
                .interviewed_companies
                .map(|bin| bin.as_str().to_string()),
        }
    }
}

impl From<&CongratsSurvey> for CongratsSurveyInput {
    fn from(survey: &CongratsSurvey) -> Self {
        Self {
            found_via_platform: survey
                .found_via_platform
                .map(|answer| answer.as_str().to_string()),
            job_title: survey.job_title.clone(),
            company: survey.company.clone(),
            city: survey.city.clone(),
            country: survey.country.clone(),
        }
    }
}

// Numbers and bools become text; objects, arrays and null are dropped.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_text))
}

pub fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationReasonRequest {
    pub reason: CancellationReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price_cents: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer_survey: Option<OfferSurvey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisaSupportRequest {
    pub source: VisaSource,
    pub has_company_lawyer: bool,
    pub visa_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer_usage: Option<OfferSurvey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub congrats_survey: Option<CongratsSurvey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisaSupportResponse {
    pub ok: bool,
    pub data: VisaSupportRequest,
}
