//! Input normalization shared by the wizard client and the submission endpoints.

use crate::{
    domain::{CountBin, InterviewBin, YesNo},
    protocol::{CongratsSurvey, CongratsSurveyInput, OfferSurvey, OfferSurveyInput},
};

pub const SURVEY_TEXT_MAX: usize = 120;
pub const DETAILS_MIN: usize = 25;
pub const DETAILS_MAX: usize = 500;
pub const FEEDBACK_MIN: usize = 25;
pub const VISA_LABEL_MIN: usize = 2;
pub const VISA_LABEL_MAX: usize = 40;
pub const MIN_PRICE_CENTS: u32 = 100;

pub const COUNT_BINS: [&str; 4] = ["0", "1-5", "6-20", "20+"];
pub const INTERVIEW_BINS: [&str; 4] = ["0", "1-2", "3-5", "5+"];

/// Removes `<...>` runs plus any unmatched angle bracket left behind.
pub fn strip_tags(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find(|ch: char| ch == '<' || ch == '>') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        rest = match (tail.starts_with('<'), tail.find('>')) {
            (true, Some(end)) => &tail[end + 1..],
            _ => &tail[1..],
        };
    }
    out.push_str(rest);
    out
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(raw: &str, max_len: usize) -> String {
    raw.chars().take(max_len).collect()
}

pub fn sanitize_text(raw: &str, max_len: usize) -> String {
    truncate_chars(&collapse_whitespace(&strip_tags(raw)), max_len)
}

fn is_visa_label_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '/' | '(' | ')' | ' ')
}

pub fn sanitize_visa_label(raw: &str) -> String {
    let allowed: String = collapse_whitespace(&strip_tags(raw))
        .chars()
        .filter(|ch| is_visa_label_char(*ch))
        .collect();
    truncate_chars(&collapse_whitespace(&allowed).to_ascii_uppercase(), VISA_LABEL_MAX)
}

/// "$12.50" or "12.50 USD" into cents, clamped to `[$1, cap_cents]`.
pub fn parse_price_to_cents(raw: &str, cap_cents: u32) -> Option<u32> {
    let cleaned: String = raw
        .chars()
        .filter(|ch| ch.is_ascii_digit() || *ch == '.')
        .collect();
    let amount = leading_decimal(&cleaned)?.parse::<f64>().ok()?;
    if !amount.is_finite() {
        return None;
    }
    let cents = (amount * 100.0).round();
    let clamped = cents.max(f64::from(MIN_PRICE_CENTS)).min(f64::from(cap_cents));
    Some(clamped as u32)
}

// Longest `digits[.digits]` prefix.
fn leading_decimal(cleaned: &str) -> Option<&str> {
    let mut seen_dot = false;
    let mut seen_digit = false;
    let mut end = 0;
    for (idx, ch) in cleaned.char_indices() {
        match ch {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = idx + ch.len_utf8();
    }
    seen_digit.then(|| &cleaned[..end])
}

pub fn is_valid_bin(value: &str, allowed: &[&str]) -> bool {
    allowed.contains(&value)
}

fn count_bin(value: Option<&str>) -> Option<CountBin> {
    value
        .filter(|value| is_valid_bin(value, &COUNT_BINS))
        .and_then(CountBin::parse)
}

fn interview_bin(value: Option<&str>) -> Option<InterviewBin> {
    value
        .filter(|value| is_valid_bin(value, &INTERVIEW_BINS))
        .and_then(InterviewBin::parse)
}

pub fn sanitize_offer_survey(input: &OfferSurveyInput) -> OfferSurvey {
    OfferSurvey {
        applied_via_platform: count_bin(input.applied_via_platform.as_deref()),
        emailed_companies: count_bin(input.emailed_companies.as_deref()),
        interviewed_companies: interview_bin(input.interviewed_companies.as_deref()),
    }
}

fn survey_text(raw: Option<&str>) -> Option<String> {
    raw.map(|raw| sanitize_text(raw, SURVEY_TEXT_MAX))
        .filter(|clean| !clean.is_empty())
}

pub fn sanitize_congrats_survey(input: &CongratsSurveyInput) -> CongratsSurvey {
    CongratsSurvey {
        found_via_platform: input.found_via_platform.as_deref().and_then(YesNo::parse),
        job_title: survey_text(input.job_title.as_deref()),
        company: survey_text(input.company.as_deref()),
        city: survey_text(input.city.as_deref()),
        country: survey_text(input.country.as_deref()),
    }
}

#[cfg(test)]
#[path = "tests/sanitize_tests.rs"]
mod tests;
