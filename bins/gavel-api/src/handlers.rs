// HTTP handlers for the submission API.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use chrono::{DateTime, Utc};
use gavel_common::queue;
use gavel_common::store::StatusStore;
use gavel_common::types::{
    ResourceUsage, SubmissionJob, SubmissionRecord, SubmissionStatus, TestCase,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub user_id: String,
    pub problem_id: String,
    pub code: String,
    pub language: String,
    /// Normally resolved from the problem id; callers may supply their
    /// own while there is no problem service to ask.
    #[serde(default = "default_test_cases")]
    pub test_cases: Vec<TestCase>,
}

/// The reference sum-of-two-integers cases.
fn default_test_cases() -> Vec<TestCase> {
    vec![
        TestCase {
            input: "2 2\n".to_string(),
            output: "4".to_string(),
        },
        TestCase {
            input: "5 10\n".to_string(),
            output: "15".to_string(),
        },
    ]
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub submission_id: String,
    pub status: SubmissionStatus,
}

/// POST /api/v1/submissions — store a PENDING record and queue the job.
pub async fn create_submission(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SubmitRequest>,
) -> impl IntoResponse {
    let submission_id = Uuid::new_v4().to_string();
    let mut store = state.store.clone();

    let record = SubmissionRecord::pending();
    if let Err(e) = store.put(&submission_id, &record).await {
        error!(submission_id = %submission_id, error = %format!("{:#}", e),
            "failed to store submission record");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "failed to store submission" })),
        )
            .into_response();
    }

    let job = SubmissionJob {
        submission_id: submission_id.clone(),
        code: request.code,
        language: request.language,
        test_cases: request.test_cases,
    };

    let mut conn = state.queue.clone();
    if let Err(e) = queue::push_job(&mut conn, &job).await {
        error!(submission_id = %submission_id, error = %e, "failed to queue submission");

        let mut failed = record;
        failed.status = SubmissionStatus::QueueError;
        if let Err(e) = store.put(&submission_id, &failed).await {
            error!(submission_id = %submission_id, error = %format!("{:#}", e),
                "failed to record queue error");
        }

        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "failed to queue submission for processing" })),
        )
            .into_response();
    }

    info!(
        submission_id = %submission_id,
        user_id = %request.user_id,
        problem_id = %request.problem_id,
        language = %job.language,
        test_cases = job.test_cases.len(),
        "submission queued"
    );

    (
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            submission_id,
            status: SubmissionStatus::Pending,
        }),
    )
        .into_response()
}

/// Clean view of one submission for the polling endpoint.
#[derive(Debug, Serialize)]
pub struct SubmissionView {
    pub submission_id: String,
    pub status: SubmissionStatus,
    pub submitted_at: DateTime<Utc>,
    pub result: Option<ResourceUsage>,
}

/// GET /api/v1/submissions/:submission_id — surface the stored record
/// verbatim.
pub async fn get_submission(
    State(state): State<Arc<AppState>>,
    Path(submission_id): Path<String>,
) -> impl IntoResponse {
    let mut store = state.store.clone();

    match store.get(&submission_id).await {
        Ok(Some(record)) => (
            StatusCode::OK,
            Json(SubmissionView {
                submission_id,
                status: record.status,
                submitted_at: record.submitted_at,
                result: record.result,
            }),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "submission not found" })),
        )
            .into_response(),
        Err(e) => {
            error!(submission_id = %submission_id, error = %format!("{:#}", e),
                "failed to load submission");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "failed to load submission" })),
            )
                .into_response()
        }
    }
}

/// GET /status — health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
