//! Double-submit anti-forgery cookie: issued on safe requests, echoed by the client in
//! a header on every submission.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use shared::protocol::{cookie_value, CSRF_COOKIE_NAME, CSRF_HEADER_NAME};
use thiserror::Error;
use tracing::debug;

use crate::app_state::AppState;

const CSRF_TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrfMode {
    /// Cookie and header must both be present and equal.
    Strict,
    /// Passes when no cookie was ever issued; otherwise behaves like `Strict`.
    Lenient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CsrfRejection {
    #[error("anti-forgery cookie missing")]
    MissingCookie,
    #[error("anti-forgery header missing")]
    MissingHeader,
    #[error("anti-forgery header does not match cookie")]
    Mismatch,
}

pub fn generate_token() -> String {
    let mut bytes = [0u8; CSRF_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Not `HttpOnly`: the client copies the value into a request header.
pub fn csrf_set_cookie(token: &str, secure: bool) -> String {
    let mut cookie = format!("{CSRF_COOKIE_NAME}={token}; Path=/; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn request_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|raw| cookie_value(raw, name))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn verify_csrf(headers: &HeaderMap, mode: CsrfMode) -> Result<(), CsrfRejection> {
    let cookie = request_cookie(headers, CSRF_COOKIE_NAME).filter(|token| !token.is_empty());
    let header = headers
        .get(CSRF_HEADER_NAME)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty());

    match (mode, cookie, header) {
        (CsrfMode::Lenient, None, _) => Ok(()),
        (CsrfMode::Strict, None, _) => Err(CsrfRejection::MissingCookie),
        (_, Some(_), None) => Err(CsrfRejection::MissingHeader),
        (_, Some(cookie), Some(header)) if constant_time_eq(cookie.as_bytes(), header.as_bytes()) => {
            Ok(())
        }
        (_, Some(_), Some(_)) => Err(CsrfRejection::Mismatch),
    }
}

/// Issues a fresh token cookie on any `GET` that arrives without one.
pub async fn issue_csrf_cookie(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let needs_token = request.method() == Method::GET
        && request_cookie(request.headers(), CSRF_COOKIE_NAME).is_none();
    let mut response = next.run(request).await;

    if needs_token {
        let cookie = csrf_set_cookie(&generate_token(), state.secure_cookies);
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
            debug!("issued anti-forgery cookie");
        }
    }
    response
}
