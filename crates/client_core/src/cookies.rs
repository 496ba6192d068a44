use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use shared::protocol::{set_cookie_pair, CSRF_COOKIE_NAME};

/// Where the submission client reads the anti-forgery token from.
pub trait CsrfTokenSource: Send + Sync {
    /// Value of the cookie-bound token, if the boundary has issued one.
    fn cookie_token(&self) -> Option<String>;
    /// Token embedded in the page (`<meta name="csrf-token">`), if any.
    fn meta_token(&self) -> Option<String>;
}

#[derive(Default)]
struct JarState {
    cookies: BTreeMap<String, String>,
    meta_csrf: Option<String>,
}

/// Process-wide cookie jar shared by the flow controller and the submission client.
///
/// Clones share the same underlying jar.
#[derive(Clone, Default)]
pub struct SessionCookies {
    inner: Arc<RwLock<JarState>>,
}

impl SessionCookies {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, JarState> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, JarState> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.read().cookies.get(name).cloned()
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        self.write().cookies.insert(name.into(), value.into());
    }

    pub fn remove(&self, name: &str) -> Option<String> {
        self.write().cookies.remove(name)
    }

    pub fn set_meta_csrf(&self, token: Option<String>) {
        self.write().meta_csrf = token;
    }

    /// Stores the cookie carried by a `Set-Cookie` header. An empty value deletes it.
    pub fn absorb_set_cookie(&self, set_cookie: &str) {
        let Some((name, value)) = set_cookie_pair(set_cookie) else {
            return;
        };
        if value.is_empty() {
            self.remove(name);
        } else {
            self.set(name, value);
        }
    }

    /// Renders the jar as a `Cookie` request header.
    pub fn cookie_header(&self) -> Option<String> {
        let guard = self.read();
        if guard.cookies.is_empty() {
            return None;
        }
        Some(
            guard
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

impl CsrfTokenSource for SessionCookies {
    fn cookie_token(&self) -> Option<String> {
        self.get(CSRF_COOKIE_NAME).filter(|token| !token.is_empty())
    }

    fn meta_token(&self) -> Option<String> {
        self.read().meta_csrf.clone().filter(|token| !token.is_empty())
    }
}
