mod config;
mod engine;
mod language;
mod reporter;
mod sandbox;
mod verdict;
mod workspace;

use anyhow::Result;
use config::WorkerConfig;
use gavel_common::queue;
use gavel_common::store::RedisStatusStore;
use gavel_common::types::Verdict;
use redis::aio::ConnectionManager;
use reporter::Reporter;
use sandbox::DockerSandbox;
use tokio::signal;
use tracing::{error, info, instrument, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("gavel worker booting");

    let config = WorkerConfig::from_env()?;
    let sandbox = DockerSandbox::new(config.memory_limit_bytes, config.time_limit)?;

    info!(
        worker_id = %config.worker_id,
        redis_url = %config.redis_url,
        workspace_root = %config.workspace_root.display(),
        time_limit_ms = config.time_limit_ms(),
        "worker configured"
    );

    let shutdown = async {
        signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C signal handler");
        warn!("received shutdown signal");
    };

    tokio::select! {
        _ = consume_jobs(&config, &sandbox) => {}
        _ = shutdown => {}
    }

    info!("worker shutdown complete");
    Ok(())
}

/// Outer connection loop: connect with a fixed backoff, recover
/// anything this worker left claimed in a previous run, then pull jobs
/// until the connection fails. Queue connectivity is the only failure
/// class allowed to stall the worker.
async fn consume_jobs(config: &WorkerConfig, sandbox: &DockerSandbox) {
    loop {
        let mut conn = connect_with_backoff(config).await;

        match queue::requeue_pending(&mut conn, &config.worker_id).await {
            Ok(0) => {}
            Ok(n) => warn!(requeued = n, "re-queued jobs left over from a previous run"),
            Err(e) => {
                error!(error = %e, "failed to recover processing list");
                tokio::time::sleep(config.reconnect_backoff).await;
                continue;
            }
        }

        let mut reporter = Reporter::new(RedisStatusStore::new(conn.clone()), config.report_timeout);

        if let Err(e) = worker_loop(&mut conn, &mut reporter, config, sandbox).await {
            error!(error = %e, "queue connection lost");
            tokio::time::sleep(config.reconnect_backoff).await;
        }
    }
}

async fn connect_with_backoff(config: &WorkerConfig) -> ConnectionManager {
    loop {
        match connect(&config.redis_url).await {
            Ok(conn) => {
                info!(redis_url = %config.redis_url, "connected to queue");
                return conn;
            }
            Err(e) => {
                warn!(
                    error = %e,
                    backoff_secs = config.reconnect_backoff.as_secs(),
                    "queue unavailable, retrying"
                );
                tokio::time::sleep(config.reconnect_backoff).await;
            }
        }
    }
}

async fn connect(url: &str) -> Result<ConnectionManager> {
    let client = redis::Client::open(url)?;
    Ok(ConnectionManager::new(client).await?)
}

/// One job at a time: claim, judge, report, ack. The ack is issued once
/// reporting has been attempted, whatever that attempt's outcome, so a
/// crash before this point leaves the job claimable again.
#[instrument(skip_all, fields(worker_id = %config.worker_id))]
async fn worker_loop(
    conn: &mut ConnectionManager,
    reporter: &mut Reporter<RedisStatusStore>,
    config: &WorkerConfig,
    sandbox: &DockerSandbox,
) -> Result<()> {
    loop {
        let delivery =
            match queue::claim_job(conn, &config.worker_id, config.poll_timeout_seconds).await? {
                Some(delivery) => delivery,
                // Poll timeout; the queue is idle.
                None => continue,
            };

        let job = match delivery.job() {
            Ok(job) => job,
            Err(e) => {
                error!(error = %e, "discarding undecodable job payload");
                queue::ack_job(conn, &config.worker_id, &delivery).await?;
                continue;
            }
        };

        info!(
            submission_id = %job.submission_id,
            language = %job.language,
            test_cases = job.test_cases.len(),
            source_bytes = job.code.len(),
            "received job"
        );

        let started = std::time::Instant::now();
        let verdict = match engine::judge(sandbox, config, &job).await {
            Ok(verdict) => verdict,
            Err(e) => {
                error!(
                    submission_id = %job.submission_id,
                    error = %format!("{:#}", e),
                    "judging failed"
                );
                Verdict::system_error()
            }
        };

        info!(
            submission_id = %job.submission_id,
            status = %verdict.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "judging complete"
        );

        reporter.report(&job.submission_id, &verdict).await;
        queue::ack_job(conn, &config.worker_id, &delivery).await?;
    }
}
