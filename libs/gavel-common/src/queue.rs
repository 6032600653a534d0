use crate::types::SubmissionJob;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Direction, RedisResult};

/// Queue semantics shared by the API (producer) and the workers
/// (consumers). Keys are deterministic so the two sides never drift.
///
/// Delivery is at-least-once: a claim moves the message into the
/// worker's processing list, and only an explicit ack removes it. A
/// worker that dies mid-job finds the message again on restart via
/// [`requeue_pending`].
pub const QUEUE_KEY: &str = "gavel:queue:submissions";
pub const PROCESSING_PREFIX: &str = "gavel:processing";

/// Processing list for one worker instance.
pub fn processing_key(worker_id: &str) -> String {
    format!("{}:{}", PROCESSING_PREFIX, worker_id)
}

/// A message claimed from the queue but not yet acknowledged. Keeps the
/// raw payload because the ack removes the list entry by value.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub payload: String,
}

impl Delivery {
    pub fn job(&self) -> serde_json::Result<SubmissionJob> {
        serde_json::from_str(&self.payload)
    }
}

/// Enqueue a job. RPUSH keeps FIFO order with the LMOVE-from-the-left
/// claim below.
pub async fn push_job(conn: &mut ConnectionManager, job: &SubmissionJob) -> RedisResult<()> {
    let payload = serde_json::to_string(job).map_err(|e| {
        redis::RedisError::from((
            redis::ErrorKind::TypeError,
            "serialization error",
            e.to_string(),
        ))
    })?;

    conn.rpush(QUEUE_KEY, payload).await
}

/// Claim the next job, blocking up to `timeout_seconds`. The message is
/// moved into this worker's processing list in the same command, so it
/// is never in limbo between the two.
pub async fn claim_job(
    conn: &mut ConnectionManager,
    worker_id: &str,
    timeout_seconds: f64,
) -> RedisResult<Option<Delivery>> {
    let processing = processing_key(worker_id);
    let moved: Option<String> = conn
        .blmove(
            QUEUE_KEY,
            processing.as_str(),
            Direction::Left,
            Direction::Right,
            timeout_seconds,
        )
        .await?;

    Ok(moved.map(|payload| Delivery { payload }))
}

/// Acknowledge a claimed job, dropping it from the processing list.
pub async fn ack_job(
    conn: &mut ConnectionManager,
    worker_id: &str,
    delivery: &Delivery,
) -> RedisResult<()> {
    let _removed: i64 = conn
        .lrem(processing_key(worker_id).as_str(), 1, &delivery.payload)
        .await?;
    Ok(())
}

/// Move whatever is left in this worker's processing list back onto the
/// queue head. Called at startup; this is what turns a crash mid-job
/// into a redelivery. Returns the number of messages re-queued.
pub async fn requeue_pending(conn: &mut ConnectionManager, worker_id: &str) -> RedisResult<usize> {
    let processing = processing_key(worker_id);
    let mut moved = 0;
    loop {
        let item: Option<String> = conn
            .lmove(
                processing.as_str(),
                QUEUE_KEY,
                Direction::Left,
                Direction::Left,
            )
            .await?;
        if item.is_none() {
            break;
        }
        moved += 1;
    }
    Ok(moved)
}
