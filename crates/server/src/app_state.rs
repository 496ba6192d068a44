use std::sync::Arc;

use crate::{config::Settings, sink::SubmissionSink};

#[derive(Clone)]
pub struct AppState {
    pub sink: Arc<dyn SubmissionSink>,
    pub secure_cookies: bool,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(settings: &Settings, sink: Arc<dyn SubmissionSink>) -> Self {
        Self {
            sink,
            secure_cookies: settings.secure_cookies,
            max_body_bytes: settings.max_body_bytes,
        }
    }
}
