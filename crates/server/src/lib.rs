//! Backend boundary for the cancellation wizard.

pub mod api;
pub mod app_state;
pub mod config;
pub mod csrf;
pub mod sink;

pub use api::build_router;
pub use app_state::AppState;
pub use config::{load_settings, Settings};
pub use sink::{InMemorySink, SubmissionSink};
