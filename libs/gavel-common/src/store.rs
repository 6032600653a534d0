use crate::types::SubmissionRecord;
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Minimal key-value view of the submission status store: put/get by
/// submission id. The judge writes through it, the API reads through
/// it, and tests swap in the in-memory variant.
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn put(&mut self, submission_id: &str, record: &SubmissionRecord) -> Result<()>;
    async fn get(&mut self, submission_id: &str) -> Result<Option<SubmissionRecord>>;
}

pub const RECORD_PREFIX: &str = "gavel:submission";
pub const RECORD_TTL_SECS: u64 = 86_400;

pub fn record_key(submission_id: &str) -> String {
    format!("{}:{}", RECORD_PREFIX, submission_id)
}

/// Redis-backed store. Records expire after 24 hours.
#[derive(Clone)]
pub struct RedisStatusStore {
    conn: ConnectionManager,
}

impl RedisStatusStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl StatusStore for RedisStatusStore {
    async fn put(&mut self, submission_id: &str, record: &SubmissionRecord) -> Result<()> {
        let payload = serde_json::to_string(record).context("failed to encode record")?;
        let _: () = self
            .conn
            .set_ex(record_key(submission_id), payload, RECORD_TTL_SECS)
            .await
            .context("failed to store record")?;
        Ok(())
    }

    async fn get(&mut self, submission_id: &str) -> Result<Option<SubmissionRecord>> {
        let payload: Option<String> = self
            .conn
            .get(record_key(submission_id))
            .await
            .context("failed to load record")?;

        match payload {
            Some(data) => {
                let record = serde_json::from_str(&data).context("failed to decode record")?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }
}

/// Process-local store. Stands in for the durable one in tests; not
/// visible across processes.
#[derive(Clone, Default)]
pub struct MemoryStatusStore {
    records: Arc<Mutex<HashMap<String, SubmissionRecord>>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn put(&mut self, submission_id: &str, record: &SubmissionRecord) -> Result<()> {
        self.records
            .lock()
            .expect("store mutex poisoned")
            .insert(submission_id.to_string(), record.clone());
        Ok(())
    }

    async fn get(&mut self, submission_id: &str) -> Result<Option<SubmissionRecord>> {
        Ok(self
            .records
            .lock()
            .expect("store mutex poisoned")
            .get(submission_id)
            .cloned())
    }
}
