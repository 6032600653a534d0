use gavel_common::store::StatusStore;
use gavel_common::types::{SubmissionRecord, SubmissionStatus, Verdict};
use std::time::Duration;
use tracing::{error, info};

/// Delivers the final verdict to the status store, bounded by a
/// timeout. A failed or timed-out delivery is logged and dropped: the
/// verdict is recomputable from the job payload, so nothing is retried
/// here and at-least-once delivery to the store is not claimed.
pub struct Reporter<S> {
    store: S,
    timeout: Duration,
}

impl<S: StatusStore> Reporter<S> {
    pub fn new(store: S, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn report(&mut self, submission_id: &str, verdict: &Verdict) {
        match tokio::time::timeout(self.timeout, deliver(&mut self.store, submission_id, verdict))
            .await
        {
            Ok(Ok(())) => {
                info!(submission_id = %submission_id, status = %verdict.status, "result reported");
            }
            Ok(Err(e)) => {
                error!(submission_id = %submission_id, error = %format!("{:#}", e),
                    "failed to report result");
            }
            Err(_) => {
                error!(submission_id = %submission_id,
                    timeout_ms = self.timeout.as_millis() as u64, "result report timed out");
            }
        }
    }
}

/// Read-modify-write so `submitted_at` survives; a record the store
/// never saw gets a fresh one.
async fn deliver<S: StatusStore>(
    store: &mut S,
    submission_id: &str,
    verdict: &Verdict,
) -> anyhow::Result<()> {
    let mut record = store
        .get(submission_id)
        .await?
        .unwrap_or_else(SubmissionRecord::pending);

    record.status = SubmissionStatus::Judged(verdict.status);
    record.result = Some(verdict.usage);

    store.put(submission_id, &record).await
}
