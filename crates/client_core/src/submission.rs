use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Serialize;
use shared::{
    error::ApiError,
    protocol::{
        cancellation_reason_route, cancellation_visa_route, healthz_route,
        CancellationReasonRequest, VisaSupportRequest, CSRF_HEADER_NAME,
    },
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    cookies::{CsrfTokenSource, SessionCookies},
    error::{CsrfError, SubmitError},
};

pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(12);
pub const ERROR_MESSAGE_MAX_CHARS: usize = 200;

/// How strictly an endpoint's anti-forgery check is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrfPolicy {
    /// Header and cookie must both be present and equal.
    Strict,
    /// A missing token is tolerated; a mismatching one never is.
    Lenient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    CancellationReason,
    CancellationVisa,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Self::CancellationReason => cancellation_reason_route(),
            Self::CancellationVisa => cancellation_visa_route(),
        }
    }

    pub fn csrf_policy(self) -> CsrfPolicy {
        match self {
            Self::CancellationReason => CsrfPolicy::Strict,
            Self::CancellationVisa => CsrfPolicy::Lenient,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionPayload {
    Reason(CancellationReasonRequest),
    Visa(VisaSupportRequest),
}

impl SubmissionPayload {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            Self::Reason(_) => Endpoint::CancellationReason,
            Self::Visa(_) => Endpoint::CancellationVisa,
        }
    }
}

/// Picks the token to echo in the header. Cookie wins over the page meta tag, and the
/// two must agree when both exist.
pub fn resolve_csrf_token(
    source: &dyn CsrfTokenSource,
    policy: CsrfPolicy,
) -> Result<Option<String>, CsrfError> {
    match (source.cookie_token(), source.meta_token(), policy) {
        (Some(cookie), Some(meta), _) if cookie != meta => Err(CsrfError::Mismatch),
        (Some(cookie), _, _) => Ok(Some(cookie)),
        (None, Some(meta), CsrfPolicy::Lenient) => Ok(Some(meta)),
        (None, None, CsrfPolicy::Lenient) => Ok(None),
        (None, _, CsrfPolicy::Strict) => Err(CsrfError::Missing),
    }
}

#[derive(Debug, Clone)]
pub struct SubmissionConfig {
    pub base_url: Url,
    pub timeout: Duration,
}

impl SubmissionConfig {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("invalid submission base url '{base_url}'"))?;
        Ok(Self {
            base_url,
            timeout: DEFAULT_SUBMIT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Anything that can deliver a step's payload to the backend boundary.
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit_payload(&self, payload: &SubmissionPayload) -> Result<(), SubmitError>;
}

#[derive(Clone)]
pub struct SubmissionClient {
    http: Client,
    config: SubmissionConfig,
    cookies: SessionCookies,
    tokens: Arc<dyn CsrfTokenSource>,
}

impl SubmissionClient {
    pub fn new(config: SubmissionConfig, cookies: SessionCookies) -> Result<Self> {
        let http = Client::builder()
            .build()
            .context("failed to build submission http client")?;
        Ok(Self {
            http,
            config,
            tokens: Arc::new(cookies.clone()),
            cookies,
        })
    }

    pub fn with_token_source(mut self, tokens: Arc<dyn CsrfTokenSource>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn cookies(&self) -> &SessionCookies {
        &self.cookies
    }

    pub fn config(&self) -> &SubmissionConfig {
        &self.config
    }

    fn endpoint_url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.config.base_url.join(path)
    }

    fn absorb_cookies(&self, headers: &header::HeaderMap) {
        for value in headers.get_all(header::SET_COOKIE) {
            if let Ok(set_cookie) = value.to_str() {
                self.cookies.absorb_set_cookie(set_cookie);
            }
        }
    }

    /// Performs a safe request so the boundary can issue its anti-forgery cookie.
    pub async fn prime(&self) -> Result<()> {
        let url = self.endpoint_url(healthz_route())?;
        let mut request = self.http.get(url);
        if let Some(cookie) = self.cookies.cookie_header() {
            request = request.header(header::COOKIE, cookie);
        }
        let response = request
            .send()
            .await
            .context("failed to reach the cancellation boundary")?
            .error_for_status()?;
        self.absorb_cookies(response.headers());
        debug!(
            has_csrf_cookie = self.tokens.cookie_token().is_some(),
            "submission client primed"
        );
        Ok(())
    }

    pub async fn submit<T>(
        &self,
        endpoint: Endpoint,
        payload: &T,
        timeout: Duration,
    ) -> Result<(), SubmitError>
    where
        T: Serialize + ?Sized + Sync,
    {
        let token = resolve_csrf_token(self.tokens.as_ref(), endpoint.csrf_policy())
            .inspect_err(|err| {
                warn!(endpoint = endpoint.path(), error = %err, "submission aborted before sending");
            })?;
        let url = self
            .endpoint_url(endpoint.path())
            .map_err(|err| SubmitError::Unexpected(err.to_string()))?;

        let mut request = self
            .http
            .post(url)
            .header(header::CACHE_CONTROL, "no-store")
            .json(payload);
        if let Some(cookie) = self.cookies.cookie_header() {
            request = request.header(header::COOKIE, cookie);
        }
        if let Some(token) = token {
            request = request.header(CSRF_HEADER_NAME, token);
        }

        let exchange = async {
            let response = request.send().await?;
            self.absorb_cookies(response.headers());
            let status = response.status();
            let body = if status.is_success() {
                String::new()
            } else {
                response.text().await?
            };
            Ok::<_, reqwest::Error>((status, body))
        };

        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let (status, body) = match tokio::time::timeout(timeout, exchange).await {
            Err(_) => return Err(SubmitError::Timeout { timeout_ms }),
            Ok(Err(err)) if err.is_timeout() => return Err(SubmitError::Timeout { timeout_ms }),
            Ok(Err(err)) => {
                warn!(endpoint = endpoint.path(), error = %err, "submission failed");
                return Err(SubmitError::Unexpected(err.to_string()));
            }
            Ok(Ok(outcome)) => outcome,
        };

        if status.is_success() {
            info!(endpoint = endpoint.path(), status = %status, "submission accepted");
            return Ok(());
        }

        warn!(endpoint = endpoint.path(), status = %status, "submission rejected");
        Err(SubmitError::Http {
            status: status.as_u16(),
            message: error_message(status, &body),
        })
    }
}

#[async_trait]
impl Submitter for SubmissionClient {
    async fn submit_payload(&self, payload: &SubmissionPayload) -> Result<(), SubmitError> {
        let timeout = self.config.timeout;
        match payload {
            SubmissionPayload::Reason(request) => {
                self.submit(Endpoint::CancellationReason, request, timeout)
                    .await
            }
            SubmissionPayload::Visa(request) => {
                self.submit(Endpoint::CancellationVisa, request, timeout)
                    .await
            }
        }
    }
}

/// Server message if the body is an `ApiError`, else the raw body, capped for display.
fn error_message(status: StatusCode, body: &str) -> String {
    let message = serde_json::from_str::<ApiError>(body)
        .map(|err| err.message)
        .unwrap_or_else(|_| body.trim().to_string());
    if message.is_empty() {
        return format!("Request failed ({})", status.as_u16());
    }
    message.chars().take(ERROR_MESSAGE_MAX_CHARS).collect()
}

#[cfg(test)]
#[path = "tests/submission_tests.rs"]
mod tests;
