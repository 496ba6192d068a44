use super::*;
use crate::{config::Settings, sink::InMemorySink, sink::SubmissionSink};
use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{header, Method, Request},
    response::Response,
};
use shared::domain::{CountBin, YesNo};
use tower::ServiceExt;

fn test_app() -> (Router, Arc<InMemorySink>) {
    let sink = Arc::new(InMemorySink::new());
    let state = AppState::new(&Settings::default(), sink.clone());
    (build_router(Arc::new(state)), sink)
}

fn post_json(route: &str, body: &str, csrf: Option<(&str, &str)>) -> Request<Body> {
    let mut builder = Request::post(route).header("content-type", "application/json");
    if let Some((cookie, header_value)) = csrf {
        builder = builder
            .header(header::COOKIE, format!("csrfToken={cookie}"))
            .header(CSRF_HEADER, header_value);
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

const CSRF_HEADER: &str = shared::protocol::CSRF_HEADER_NAME;

async fn json_body(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

#[tokio::test]
async fn healthz_issues_a_script_readable_csrf_cookie() {
    let (app, _sink) = test_app();
    let response = app
        .clone()
        .oneshot(Request::get("/healthz").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("set-cookie")
        .to_string();
    assert!(cookie.starts_with("csrfToken="));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Path=/"));
    assert!(!cookie.contains("HttpOnly"));
    assert!(!cookie.contains("Secure"));

    let again = app
        .oneshot(
            Request::get("/healthz")
                .header(header::COOKIE, "csrfToken=already")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert!(again.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn secure_settings_mark_the_cookie_secure() {
    let settings = Settings {
        secure_cookies: true,
        ..Settings::default()
    };
    let app = build_router(Arc::new(AppState::new(
        &settings,
        Arc::new(InMemorySink::new()),
    )));
    let response = app
        .oneshot(Request::get("/healthz").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("set-cookie");
    assert!(cookie.ends_with("; Secure"));
}

#[tokio::test]
async fn reason_rejects_missing_or_mismatched_csrf() {
    let (app, sink) = test_app();
    let body = r#"{"reason":"too_expensive","maxPriceCents":1250}"#;

    for csrf in [None, Some(("abc", "abd")), Some(("abc", ""))] {
        let response = app
            .clone()
            .oneshot(post_json("/cancellation-reason", body, csrf))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let err = json_body(response).await;
        assert_eq!(err["message"], "CSRF validation failed");
    }
    assert!(sink.snapshot().await.is_empty());
}

#[tokio::test]
async fn reason_validates_body() {
    let (app, sink) = test_app();
    let cases = [
        ("not json", "Invalid JSON"),
        (r#"{"reason":"bored"}"#, "Invalid reason"),
        (r#"{"reason":"too_expensive","maxPriceCents":"abc"}"#, "Invalid price"),
        (r#"{"reason":"too_expensive","maxPriceCents":0}"#, "Invalid price"),
        (r#"{"reason":"other","details":"<b>short</b>"}"#, "Details too short"),
    ];
    for (body, message) in cases {
        let response = app
            .clone()
            .oneshot(post_json("/cancellation-reason", body, Some(("t", "t"))))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(json_body(response).await["message"], message);
    }
    assert!(sink.snapshot().await.is_empty());
}

#[tokio::test]
async fn reason_records_sanitized_submission() {
    let (app, sink) = test_app();
    let body = serde_json::json!({
        "reason": "platform_not_helpful",
        "details": "  The   <i>matching</i> never surfaced relevant roles.  ",
        "maxPriceCents": 999,
        "offerSurvey": { "appliedViaPlatform": "20+", "emailedCompanies": "many" },
    })
    .to_string();

    let response = app
        .oneshot(post_json("/cancellation-reason", &body, Some(("t", "t"))))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, serde_json::json!({ "ok": true }));

    let records = sink.snapshot().await;
    assert_eq!(records.len(), 1);
    let SubmissionKind::Reason(request) = &records[0].kind else {
        panic!("expected reason record");
    };
    assert_eq!(
        request.details.as_deref(),
        Some("The matching never surfaced relevant roles.")
    );
    assert_eq!(request.max_price_cents, None);
    let survey = request.offer_survey.as_ref().expect("survey");
    assert_eq!(survey.applied_via_platform, Some(CountBin::TwentyPlus));
    assert_eq!(survey.emailed_companies, None);
}

#[tokio::test]
async fn visa_without_any_cookie_is_accepted_and_echoed() {
    let (app, sink) = test_app();
    let body = serde_json::json!({
        "source": "somewhere",
        "hasCompanyLawyer": "yes",
        "visaType": "h-1b <script>",
        "congratsSurvey": { "foundViaPlatform": "yes", "company": "  ", "city": "Austin" },
    })
    .to_string();

    let response = app
        .oneshot(post_json("/cancellation-visa", &body, None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let echoed: VisaSupportResponse =
        serde_json::from_value(json_body(response).await).expect("echo");
    assert!(echoed.ok);
    assert_eq!(echoed.data.source, VisaSource::NoPlatform);
    assert!(echoed.data.has_company_lawyer);
    assert_eq!(echoed.data.visa_type, "H-1B");
    let congrats = echoed.data.congrats_survey.expect("congrats");
    assert_eq!(congrats.found_via_platform, Some(YesNo::Yes));
    assert_eq!(congrats.company, None);
    assert_eq!(congrats.city.as_deref(), Some("Austin"));
    assert_eq!(sink.snapshot().await.len(), 1);
}

#[tokio::test]
async fn visa_rejects_mismatch_once_a_cookie_exists() {
    let (app, sink) = test_app();
    let body = r#"{"source":"with_platform","hasCompanyLawyer":false,"visaType":"O-1"}"#;

    let forged = app
        .clone()
        .oneshot(post_json("/cancellation-visa", body, Some(("real", "forged"))))
        .await
        .expect("response");
    assert_eq!(forged.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(forged).await["message"], "Invalid CSRF token");

    let headerless = app
        .clone()
        .oneshot(post_json("/cancellation-visa", body, Some(("real", ""))))
        .await
        .expect("response");
    assert_eq!(headerless.status(), StatusCode::FORBIDDEN);
    assert!(sink.snapshot().await.is_empty());

    let genuine = app
        .oneshot(post_json("/cancellation-visa", body, Some(("real", "real"))))
        .await
        .expect("response");
    assert_eq!(genuine.status(), StatusCode::OK);
    assert_eq!(sink.snapshot().await.len(), 1);
}

#[tokio::test]
async fn visa_requires_a_usable_visa_type() {
    let (app, _sink) = test_app();
    for body in ["garbage", r#"{"visaType":"<b>"}"#, r#"{"visaType":"x"}"#] {
        let response = app
            .clone()
            .oneshot(post_json("/cancellation-visa", body, None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
    }
}

struct FailingSink;

#[async_trait]
impl SubmissionSink for FailingSink {
    async fn record(&self, _submission: RecordedSubmission) -> anyhow::Result<()> {
        anyhow::bail!("storage offline")
    }
}

#[tokio::test]
async fn visa_sink_failure_is_an_internal_error() {
    let app = build_router(Arc::new(AppState::new(
        &Settings::default(),
        Arc::new(FailingSink),
    )));
    let response = app
        .oneshot(post_json(
            "/cancellation-visa",
            r#"{"visaType":"TN"}"#,
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let err = json_body(response).await;
    assert_eq!(err["code"], "internal");
    assert_eq!(err["message"], "storage offline");
}

#[tokio::test]
async fn visa_preflight_answers_ok() {
    let (app, _sink) = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/cancellation-visa")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, serde_json::json!({ "ok": true }));
}

#[test]
fn loose_truthiness_matches_form_semantics() {
    assert!(!truthy(None));
    assert!(!truthy(Some(&Value::Null)));
    assert!(!truthy(Some(&serde_json::json!(0))));
    assert!(!truthy(Some(&serde_json::json!(""))));
    assert!(truthy(Some(&serde_json::json!("false"))));
    assert!(truthy(Some(&serde_json::json!(1))));
    assert!(truthy(Some(&serde_json::json!({}))));
}
