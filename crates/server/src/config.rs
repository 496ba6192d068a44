use std::{fs, path::Path};

use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    /// Adds `Secure` to the anti-forgery cookie.
    pub secure_cookies: bool,
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8443".into(),
            secure_cookies: false,
            max_body_bytes: 16 * 1024,
        }
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new("server.toml"), |key| std::env::var(key).ok())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub(crate) fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<toml::Table>(&raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.get("bind_addr").and_then(|v| v.as_str()) {
                    settings.server_bind = v.to_string();
                }
                if let Some(v) = file_cfg.get("secure_cookies").and_then(|v| v.as_bool()) {
                    settings.secure_cookies = v;
                }
                if let Some(v) = file_cfg
                    .get("max_body_bytes")
                    .and_then(|v| v.as_integer())
                    .and_then(|v| usize::try_from(v).ok())
                {
                    settings.max_body_bytes = v;
                }
            }
            Err(error) => warn!(path = %path.display(), %error, "ignoring unreadable settings file"),
        }
    }

    if let Some(v) = env("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if env("APP_ENV").is_some_and(|v| v.eq_ignore_ascii_case("production")) {
        settings.secure_cookies = true;
    }
    if let Some(v) = env("APP__SECURE_COOKIES").as_deref().and_then(parse_flag) {
        settings.secure_cookies = v;
    }

    if let Some(v) = env("APP__MAX_BODY_BYTES") {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.max_body_bytes = parsed;
        }
    }

    settings
}
