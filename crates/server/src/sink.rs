//! Where accepted submissions go once they pass the boundary checks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::protocol::{CancellationReasonRequest, VisaSupportRequest};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmissionKind {
    Reason(CancellationReasonRequest),
    Visa(VisaSupportRequest),
}

impl SubmissionKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Reason(_) => "reason",
            Self::Visa(_) => "visa",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordedSubmission {
    pub id: Uuid,
    pub received_at: DateTime<Utc>,
    pub kind: SubmissionKind,
}

impl RecordedSubmission {
    pub fn new(kind: SubmissionKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            received_at: Utc::now(),
            kind,
        }
    }
}

#[async_trait]
pub trait SubmissionSink: Send + Sync {
    async fn record(&self, submission: RecordedSubmission) -> anyhow::Result<()>;
}

#[derive(Debug, Default)]
pub struct InMemorySink {
    records: Mutex<Vec<RecordedSubmission>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Vec<RecordedSubmission> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl SubmissionSink for InMemorySink {
    async fn record(&self, submission: RecordedSubmission) -> anyhow::Result<()> {
        info!(
            id = %submission.id,
            kind = submission.kind.label(),
            "submission recorded"
        );
        self.records.lock().await.push(submission);
        Ok(())
    }
}
