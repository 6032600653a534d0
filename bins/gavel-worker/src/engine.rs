/// Execution engine: runs one submission end to end.
///
/// Language resolution happens before anything is provisioned, so an
/// unsupported tag never creates a workspace or a container. Test
/// cases run strictly in payload order, each against a fresh sandbox
/// instance; the first non-passing ruling terminates evaluation. The
/// scratch workspace is released by its guard on every exit path,
/// the `?` propagations included.
use crate::config::WorkerConfig;
use crate::language::Language;
use crate::sandbox::SandboxRunner;
use crate::verdict::{classify, TestRuling};
use crate::workspace::Workspace;
use anyhow::Result;
use gavel_common::types::{SubmissionJob, Verdict, VerdictStatus};
use tracing::{debug, info, instrument};

/// Produce the verdict for one submission. An `Err` here means the
/// orchestration itself failed (workspace I/O and the like); the job
/// boundary downgrades it to a `SystemError` verdict.
#[instrument(skip_all, fields(submission_id = %job.submission_id, language = %job.language))]
pub async fn judge<R: SandboxRunner>(
    sandbox: &R,
    config: &WorkerConfig,
    job: &SubmissionJob,
) -> Result<Verdict> {
    let language = match Language::from_tag(&job.language) {
        Some(language) => language,
        None => {
            info!("unsupported language tag");
            return Ok(Verdict::unsupported_language());
        }
    };

    let workspace = Workspace::create(&config.workspace_root, &job.submission_id)?;
    workspace.write_source(language.source_file(), &job.code)?;

    for (index, case) in job.test_cases.iter().enumerate() {
        let outcome = sandbox.run(language, workspace.dir(), &case.input).await;

        match classify(&outcome, &case.output) {
            TestRuling::Pass => {
                debug!(test_case = index, "test case passed");
            }
            TestRuling::Reject(status) => {
                info!(test_case = index, status = %status, "submission rejected");
                return Ok(rejection(status, config));
            }
        }
    }

    info!(test_cases = job.test_cases.len(), "submission accepted");
    Ok(Verdict::accepted())
}

/// Attach the sentinel resource figures for a rejecting status.
fn rejection(status: VerdictStatus, config: &WorkerConfig) -> Verdict {
    match status {
        VerdictStatus::TimeLimitExceeded => Verdict::time_limit_exceeded(config.time_limit_ms()),
        VerdictStatus::WrongAnswer => Verdict::wrong_answer(),
        VerdictStatus::RuntimeError => Verdict::runtime_error(),
        VerdictStatus::SystemError => Verdict::system_error(),
        VerdictStatus::UnsupportedLanguage => Verdict::unsupported_language(),
        VerdictStatus::Accepted => Verdict::accepted(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::ExecutionOutcome;
    use async_trait::async_trait;
    use gavel_common::types::TestCase;
    use std::collections::VecDeque;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted sandbox: hands out the queued outcomes in order and
    /// counts how often it was invoked.
    struct FakeSandbox {
        outcomes: Mutex<VecDeque<ExecutionOutcome>>,
        calls: AtomicUsize,
    }

    impl FakeSandbox {
        fn new(outcomes: Vec<ExecutionOutcome>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SandboxRunner for FakeSandbox {
        async fn run(&self, _: Language, _: &Path, _: &str) -> ExecutionOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .expect("sandbox invoked more often than scripted")
        }
    }

    fn completed(exit_code: i64, stdout: &str) -> ExecutionOutcome {
        ExecutionOutcome::Completed {
            exit_code,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    fn test_config(root: PathBuf) -> WorkerConfig {
        WorkerConfig {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            worker_id: "test-worker".to_string(),
            workspace_root: root,
            time_limit: Duration::from_millis(5000),
            memory_limit_bytes: 256 * 1024 * 1024,
            report_timeout: Duration::from_secs(5),
            reconnect_backoff: Duration::from_secs(5),
            poll_timeout_seconds: 5.0,
        }
    }

    fn scratch_root() -> PathBuf {
        std::env::temp_dir().join(format!("gavel-engine-test-{}", uuid::Uuid::new_v4()))
    }

    fn job(id: &str, language: &str, cases: &[(&str, &str)]) -> SubmissionJob {
        SubmissionJob {
            submission_id: id.to_string(),
            code: "print(sum(map(int, input().split())))".to_string(),
            language: language.to_string(),
            test_cases: cases
                .iter()
                .map(|(input, output)| TestCase {
                    input: input.to_string(),
                    output: output.to_string(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn all_cases_matching_is_accepted() {
        let root = scratch_root();
        let config = test_config(root.clone());
        let sandbox = FakeSandbox::new(vec![completed(0, "4\n"), completed(0, "15\n")]);
        let job = job("sub-accept", "python", &[("2 2\n", "4"), ("5 10\n", "15")]);

        let verdict = judge(&sandbox, &config, &job).await.unwrap();

        assert_eq!(verdict, Verdict::accepted());
        assert_eq!(sandbox.calls(), 2);
        assert!(!root.join("sub-accept").exists());
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn first_failure_short_circuits() {
        let root = scratch_root();
        let config = test_config(root.clone());
        // Second outcome would pass, but must never be requested.
        let sandbox = FakeSandbox::new(vec![completed(0, "5\n"), completed(0, "15\n")]);
        let job = job("sub-wa", "python", &[("2 2\n", "4"), ("5 10\n", "15")]);

        let verdict = judge(&sandbox, &config, &job).await.unwrap();

        assert_eq!(verdict.status, VerdictStatus::WrongAnswer);
        assert_eq!(verdict.usage.runtime_ms, Some(100));
        assert_eq!(sandbox.calls(), 1);
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn unsupported_language_provisions_nothing() {
        let root = scratch_root();
        std::fs::create_dir_all(&root).unwrap();
        let config = test_config(root.clone());
        let sandbox = FakeSandbox::new(vec![]);
        let job = job("sub-java", "java", &[("2 2\n", "4")]);

        let verdict = judge(&sandbox, &config, &job).await.unwrap();

        assert_eq!(verdict.status, VerdictStatus::UnsupportedLanguage);
        assert_eq!(verdict.usage.runtime_ms, Some(0));
        assert_eq!(sandbox.calls(), 0);
        assert!(!root.join("sub-java").exists());
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn timeout_reports_the_deadline() {
        let root = scratch_root();
        let config = test_config(root.clone());
        let sandbox = FakeSandbox::new(vec![ExecutionOutcome::TimedOut]);
        let job = job("sub-tle", "python", &[("", "4")]);

        let verdict = judge(&sandbox, &config, &job).await.unwrap();

        assert_eq!(verdict.status, VerdictStatus::TimeLimitExceeded);
        assert_eq!(verdict.usage.runtime_ms, Some(5000));
        assert_eq!(verdict.usage.memory_kb, Some(0));
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn nonzero_exit_is_a_runtime_error() {
        let root = scratch_root();
        let config = test_config(root.clone());
        let sandbox = FakeSandbox::new(vec![completed(1, "")]);
        let job = job("sub-re", "python", &[("", "4")]);

        let verdict = judge(&sandbox, &config, &job).await.unwrap();

        assert_eq!(verdict.status, VerdictStatus::RuntimeError);
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn infrastructure_failure_becomes_system_error() {
        let root = scratch_root();
        let config = test_config(root.clone());
        let sandbox = FakeSandbox::new(vec![ExecutionOutcome::Infrastructure {
            detail: "daemon unreachable".to_string(),
        }]);
        let job = job("sub-infra", "python", &[("", "4")]);

        let verdict = judge(&sandbox, &config, &job).await.unwrap();

        assert_eq!(verdict.status, VerdictStatus::SystemError);
        assert_eq!(verdict.usage.runtime_ms, None);
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn workspace_is_released_on_every_path() {
        let root = scratch_root();
        let config = test_config(root.clone());

        for (name, outcome) in [
            ("path-ok", completed(0, "4\n")),
            ("path-wa", completed(0, "9\n")),
            ("path-tle", ExecutionOutcome::TimedOut),
            ("path-re", completed(2, "")),
        ] {
            let sandbox = FakeSandbox::new(vec![outcome]);
            let job = job(name, "python", &[("2 2\n", "4")]);
            judge(&sandbox, &config, &job).await.unwrap();
            assert!(!root.join(name).exists(), "workspace leaked for {}", name);
        }
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn hostile_submission_id_is_an_orchestration_error() {
        let root = scratch_root();
        let config = test_config(root.clone());
        let sandbox = FakeSandbox::new(vec![]);
        let mut bad = job("ignored", "python", &[("", "")]);
        bad.submission_id = "../escape".to_string();

        assert!(judge(&sandbox, &config, &bad).await.is_err());
        assert_eq!(sandbox.calls(), 0);
        std::fs::remove_dir_all(&root).ok();
    }
}
