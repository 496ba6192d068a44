use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use shared::{
    domain::{CancellationReason, VisaSource},
    error::{ApiError, ApiException, ErrorCode},
    protocol::{
        cancellation_reason_route, cancellation_visa_route, healthz_route, value_as_text,
        AckResponse, CancellationReasonRequest, CongratsSurvey, CongratsSurveyInput,
        OfferSurvey, OfferSurveyInput, VisaSupportRequest, VisaSupportResponse,
    },
    sanitize::{
        sanitize_congrats_survey, sanitize_offer_survey, sanitize_text, sanitize_visa_label,
        DETAILS_MAX, DETAILS_MIN, VISA_LABEL_MIN,
    },
};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

use crate::{
    app_state::AppState,
    csrf::{issue_csrf_cookie, verify_csrf, CsrfMode},
    sink::{RecordedSubmission, SubmissionKind},
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(healthz_route(), get(healthz))
        .route(cancellation_reason_route(), post(cancellation_reason))
        .route(
            cancellation_visa_route(),
            post(cancellation_visa).options(preflight),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            issue_csrf_cookie,
        ))
        .layer(RequestBodyLimitLayer::new(state.max_body_bytes))
        .with_state(state)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: ApiException) -> (StatusCode, Json<ApiError>) {
    (status_for(err.code), Json(ApiError::from(err)))
}

fn invalid(message: &str) -> ApiException {
    ApiException::new(ErrorCode::Validation, message)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn preflight() -> Json<AckResponse> {
    Json(AckResponse { ok: true })
}

async fn cancellation_reason(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<AckResponse> {
    if let Err(rejection) = verify_csrf(&headers, CsrfMode::Strict) {
        warn!(route = cancellation_reason_route(), %rejection, "csrf check failed");
        return Err(reject(ApiException::new(
            ErrorCode::Forbidden,
            "CSRF validation failed",
        )));
    }

    let raw: Value = serde_json::from_slice(&body).map_err(|_| reject(invalid("Invalid JSON")))?;
    let request = sanitize_reason_body(&raw).map_err(reject)?;

    state
        .sink
        .record(RecordedSubmission::new(SubmissionKind::Reason(request.clone())))
        .await
        .map_err(|e| {
            error!(error = %e, "failed to record cancellation reason");
            reject(ApiException::new(
                ErrorCode::Internal,
                "Failed to record cancellation reason",
            ))
        })?;

    info!(reason = request.reason.as_str(), "cancellation reason accepted");
    Ok(Json(AckResponse { ok: true }))
}

async fn cancellation_visa(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<VisaSupportResponse> {
    if let Err(rejection) = verify_csrf(&headers, CsrfMode::Lenient) {
        warn!(route = cancellation_visa_route(), %rejection, "csrf check failed");
        return Err(reject(ApiException::new(
            ErrorCode::Forbidden,
            "Invalid CSRF token",
        )));
    }

    // Unreadable bodies fall through to field validation as an empty object.
    let raw: Value = serde_json::from_slice(&body).unwrap_or_else(|_| Value::Object(Default::default()));
    let request = sanitize_visa_body(&raw).map_err(reject)?;

    state
        .sink
        .record(RecordedSubmission::new(SubmissionKind::Visa(request.clone())))
        .await
        .map_err(|e| {
            error!(error = %e, "failed to record visa support");
            reject(ApiException::new(ErrorCode::Internal, e.to_string()))
        })?;

    info!(source = request.source.as_str(), "visa support accepted");
    Ok(Json(VisaSupportResponse {
        ok: true,
        data: request,
    }))
}

/// Number or numeric string, as a positive whole count of cents.
fn price_cents(value: Option<&Value>) -> Option<u32> {
    let amount = match value? {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !amount.is_finite() || amount <= 0.0 {
        return None;
    }
    let cents = amount.round();
    if cents < 1.0 || cents > f64::from(u32::MAX) {
        return None;
    }
    Some(cents as u32)
}

fn offer_survey(value: Option<&Value>) -> Option<OfferSurvey> {
    let input: OfferSurveyInput =
        serde_json::from_value(value.filter(|v| v.is_object())?.clone()).ok()?;
    Some(sanitize_offer_survey(&input)).filter(|survey| !survey.is_empty())
}

fn congrats_survey(value: Option<&Value>) -> Option<CongratsSurvey> {
    let input: CongratsSurveyInput =
        serde_json::from_value(value.filter(|v| v.is_object())?.clone()).ok()?;
    Some(sanitize_congrats_survey(&input)).filter(|survey| !survey.is_empty())
}

/// Loose truthiness: absent, `false`, `0`, `""` and `null` are false, anything else true.
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}

fn sanitize_reason_body(raw: &Value) -> Result<CancellationReasonRequest, ApiException> {
    let reason = raw
        .get("reason")
        .and_then(Value::as_str)
        .and_then(CancellationReason::parse)
        .ok_or_else(|| invalid("Invalid reason"))?;

    let (details, max_price_cents) = if reason.expects_price() {
        let cents = price_cents(raw.get("maxPriceCents")).ok_or_else(|| invalid("Invalid price"))?;
        (None, Some(cents))
    } else {
        let details = raw
            .get("details")
            .and_then(value_as_text)
            .map(|text| sanitize_text(&text, DETAILS_MAX))
            .unwrap_or_default();
        if details.chars().count() < DETAILS_MIN {
            return Err(invalid("Details too short"));
        }
        (Some(details), None)
    };

    Ok(CancellationReasonRequest {
        reason,
        details,
        max_price_cents,
        offer_survey: offer_survey(raw.get("offerSurvey")),
    })
}

fn sanitize_visa_body(raw: &Value) -> Result<VisaSupportRequest, ApiException> {
    let source = raw
        .get("source")
        .and_then(Value::as_str)
        .and_then(VisaSource::parse)
        .unwrap_or(VisaSource::NoPlatform);
    let visa_type = raw
        .get("visaType")
        .and_then(value_as_text)
        .map(|text| sanitize_visa_label(&text))
        .unwrap_or_default();
    if visa_type.chars().count() < VISA_LABEL_MIN {
        return Err(invalid("Visa type is required"));
    }

    Ok(VisaSupportRequest {
        source,
        has_company_lawyer: truthy(raw.get("hasCompanyLawyer")),
        visa_type,
        offer_usage: offer_survey(raw.get("offerUsage")),
        congrats_survey: congrats_survey(raw.get("congratsSurvey")),
    })
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
