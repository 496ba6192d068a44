use super::*;
use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use shared::{domain::CancellationReason, protocol::AckResponse};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct Hits {
    seen: Arc<Mutex<Vec<(Option<String>, Option<String>)>>>,
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

async fn record(State(hits): State<Hits>, headers: HeaderMap) -> Json<AckResponse> {
    hits.seen.lock().await.push((
        header_text(&headers, CSRF_HEADER_NAME),
        header_text(&headers, "cookie"),
    ));
    Json(AckResponse { ok: true })
}

async fn issue_cookie() -> ([(axum::http::HeaderName, &'static str); 1], &'static str) {
    (
        [(SET_COOKIE, "csrfToken=tok123; Path=/; SameSite=Lax")],
        "ok",
    )
}

async fn spawn(app: Router) -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

async fn recording_server() -> anyhow::Result<(String, Hits)> {
    let hits = Hits::default();
    let app = Router::new()
        .route(healthz_route(), get(issue_cookie))
        .route(cancellation_reason_route(), post(record))
        .route(cancellation_visa_route(), post(record))
        .with_state(hits.clone());
    Ok((spawn(app).await?, hits))
}

fn client(base_url: &str) -> anyhow::Result<SubmissionClient> {
    SubmissionClient::new(SubmissionConfig::new(base_url)?, SessionCookies::new())
}

fn reason_request() -> CancellationReasonRequest {
    CancellationReasonRequest {
        reason: CancellationReason::TooExpensive,
        details: None,
        max_price_cents: Some(1250),
        offer_survey: None,
    }
}

struct FixedTokens {
    cookie: Option<&'static str>,
    meta: Option<&'static str>,
}

impl CsrfTokenSource for FixedTokens {
    fn cookie_token(&self) -> Option<String> {
        self.cookie.map(str::to_string)
    }

    fn meta_token(&self) -> Option<String> {
        self.meta.map(str::to_string)
    }
}

#[test]
fn token_resolution_prefers_the_cookie_and_rejects_disagreement() {
    let both = FixedTokens {
        cookie: Some("a"),
        meta: Some("a"),
    };
    assert_eq!(
        resolve_csrf_token(&both, CsrfPolicy::Strict),
        Ok(Some("a".into()))
    );

    let mismatch = FixedTokens {
        cookie: Some("a"),
        meta: Some("b"),
    };
    assert_eq!(
        resolve_csrf_token(&mismatch, CsrfPolicy::Lenient),
        Err(CsrfError::Mismatch)
    );

    let meta_only = FixedTokens {
        cookie: None,
        meta: Some("m"),
    };
    assert_eq!(
        resolve_csrf_token(&meta_only, CsrfPolicy::Lenient),
        Ok(Some("m".into()))
    );
    assert_eq!(
        resolve_csrf_token(&meta_only, CsrfPolicy::Strict),
        Err(CsrfError::Missing)
    );

    let none = FixedTokens {
        cookie: None,
        meta: None,
    };
    assert_eq!(resolve_csrf_token(&none, CsrfPolicy::Lenient), Ok(None));
}

#[tokio::test]
async fn primed_client_echoes_the_cookie_token() -> anyhow::Result<()> {
    let (base_url, hits) = recording_server().await?;
    let client = client(&base_url)?;
    client.prime().await?;
    assert_eq!(client.cookies().get("csrfToken").as_deref(), Some("tok123"));

    client
        .submit(
            Endpoint::CancellationReason,
            &reason_request(),
            DEFAULT_SUBMIT_TIMEOUT,
        )
        .await?;

    let seen = hits.seen.lock().await;
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0.as_deref(), Some("tok123"));
    assert_eq!(seen[0].1.as_deref(), Some("csrfToken=tok123"));
    Ok(())
}

#[tokio::test]
async fn mismatched_token_never_reaches_the_server() -> anyhow::Result<()> {
    let (base_url, hits) = recording_server().await?;
    let client = client(&base_url)?;
    client.cookies().set("csrfToken", "from-cookie");
    client.cookies().set_meta_csrf(Some("from-page".into()));

    let err = client
        .submit(
            Endpoint::CancellationVisa,
            &reason_request(),
            DEFAULT_SUBMIT_TIMEOUT,
        )
        .await
        .unwrap_err();
    assert_eq!(err, SubmitError::Csrf(CsrfError::Mismatch));
    assert!(!err.is_retryable());
    assert!(hits.seen.lock().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn strict_endpoint_requires_a_token_but_lenient_one_does_not() -> anyhow::Result<()> {
    let (base_url, hits) = recording_server().await?;
    let client = client(&base_url)?;

    let err = client
        .submit(
            Endpoint::CancellationReason,
            &reason_request(),
            DEFAULT_SUBMIT_TIMEOUT,
        )
        .await
        .unwrap_err();
    assert_eq!(err, SubmitError::Csrf(CsrfError::Missing));

    client
        .submit(
            Endpoint::CancellationVisa,
            &serde_json::json!({ "visaType": "H-1B" }),
            DEFAULT_SUBMIT_TIMEOUT,
        )
        .await?;
    let seen = hits.seen.lock().await;
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, None);
    Ok(())
}

#[tokio::test]
async fn page_token_source_feeds_the_header() -> anyhow::Result<()> {
    let (base_url, hits) = recording_server().await?;
    let client = client(&base_url)?.with_token_source(Arc::new(FixedTokens {
        cookie: None,
        meta: Some("from-page"),
    }));

    client
        .submit(
            Endpoint::CancellationVisa,
            &serde_json::json!({ "visaType": "O-1" }),
            DEFAULT_SUBMIT_TIMEOUT,
        )
        .await?;
    let seen = hits.seen.lock().await;
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0.as_deref(), Some("from-page"));
    Ok(())
}

#[tokio::test]
async fn slow_server_times_out() -> anyhow::Result<()> {
    let app = Router::new().route(
        cancellation_visa_route(),
        post(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(AckResponse { ok: true })
        }),
    );
    let client = client(&spawn(app).await?)?;

    let err = client
        .submit(
            Endpoint::CancellationVisa,
            &serde_json::json!({}),
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();
    assert_eq!(err, SubmitError::Timeout { timeout_ms: 100 });
    assert!(err.is_retryable());
    Ok(())
}

#[tokio::test]
async fn error_statuses_carry_a_bounded_message() -> anyhow::Result<()> {
    let app = Router::new()
        .route(
            cancellation_reason_route(),
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(ApiError::validation("Details too short")),
                )
            }),
        )
        .route(
            cancellation_visa_route(),
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "x".repeat(500)) }),
        );
    let base_url = spawn(app).await?;
    let client = client(&base_url)?;
    client.cookies().set("csrfToken", "tok");

    let err = client
        .submit(
            Endpoint::CancellationReason,
            &reason_request(),
            DEFAULT_SUBMIT_TIMEOUT,
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        SubmitError::Http {
            status: 400,
            message: "Details too short".into()
        }
    );

    let err = client
        .submit(
            Endpoint::CancellationVisa,
            &serde_json::json!({}),
            DEFAULT_SUBMIT_TIMEOUT,
        )
        .await
        .unwrap_err();
    let SubmitError::Http { status, message } = err else {
        panic!("expected http error");
    };
    assert_eq!(status, 500);
    assert_eq!(message.chars().count(), ERROR_MESSAGE_MAX_CHARS);

    assert_eq!(
        error_message(StatusCode::BAD_GATEWAY, ""),
        "Request failed (502)"
    );
    Ok(())
}

#[tokio::test]
async fn submitter_routes_payloads_to_their_endpoint() -> anyhow::Result<()> {
    let (base_url, hits) = recording_server().await?;
    let client = client(&base_url)?;
    client.prime().await?;

    client
        .submit_payload(&SubmissionPayload::Reason(reason_request()))
        .await?;
    assert_eq!(hits.seen.lock().await.len(), 1);
    assert_eq!(
        SubmissionPayload::Reason(reason_request()).endpoint(),
        Endpoint::CancellationReason
    );
    Ok(())
}
