/// Verdict classification.
///
/// A pure mapping from one execution outcome to the verdict taxonomy;
/// knows nothing about Docker, queues or the status store. The engine
/// applies it in payload order and stops at the first rejection, so a
/// later test case can never change the verdict.
use crate::sandbox::ExecutionOutcome;
use gavel_common::types::VerdictStatus;

/// Ruling for a single test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestRuling {
    Pass,
    Reject(VerdictStatus),
}

pub fn classify(outcome: &ExecutionOutcome, expected: &str) -> TestRuling {
    match outcome {
        ExecutionOutcome::TimedOut => TestRuling::Reject(VerdictStatus::TimeLimitExceeded),
        ExecutionOutcome::Crashed { .. } => TestRuling::Reject(VerdictStatus::RuntimeError),
        ExecutionOutcome::Infrastructure { .. } => TestRuling::Reject(VerdictStatus::SystemError),
        ExecutionOutcome::Completed {
            exit_code, stdout, ..
        } => {
            if *exit_code != 0 {
                TestRuling::Reject(VerdictStatus::RuntimeError)
            } else if !output_matches(stdout, expected) {
                TestRuling::Reject(VerdictStatus::WrongAnswer)
            } else {
                TestRuling::Pass
            }
        }
    }
}

/// Exact comparison after trimming trailing whitespace on both sides.
/// Leading whitespace is significant.
fn output_matches(actual: &str, expected: &str) -> bool {
    actual.trim_end() == expected.trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(exit_code: i64, stdout: &str) -> ExecutionOutcome {
        ExecutionOutcome::Completed {
            exit_code,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    #[test]
    fn matching_output_passes() {
        assert_eq!(classify(&completed(0, "4"), "4"), TestRuling::Pass);
    }

    #[test]
    fn trailing_whitespace_is_ignored_on_both_sides() {
        assert_eq!(classify(&completed(0, "4\n"), "4"), TestRuling::Pass);
        assert_eq!(classify(&completed(0, "4"), "4\n"), TestRuling::Pass);
        assert_eq!(classify(&completed(0, "a b  \n\n"), "a b"), TestRuling::Pass);
    }

    #[test]
    fn leading_whitespace_is_significant() {
        assert_eq!(
            classify(&completed(0, "  4"), "4"),
            TestRuling::Reject(VerdictStatus::WrongAnswer)
        );
    }

    #[test]
    fn mismatch_is_wrong_answer() {
        assert_eq!(
            classify(&completed(0, "5"), "4"),
            TestRuling::Reject(VerdictStatus::WrongAnswer)
        );
    }

    #[test]
    fn nonzero_exit_is_runtime_error_even_with_matching_output() {
        assert_eq!(
            classify(&completed(1, "4"), "4"),
            TestRuling::Reject(VerdictStatus::RuntimeError)
        );
        assert_eq!(
            classify(&completed(137, ""), ""),
            TestRuling::Reject(VerdictStatus::RuntimeError)
        );
    }

    #[test]
    fn timeout_is_time_limit_exceeded() {
        assert_eq!(
            classify(&ExecutionOutcome::TimedOut, "4"),
            TestRuling::Reject(VerdictStatus::TimeLimitExceeded)
        );
    }

    #[test]
    fn crash_is_runtime_error() {
        let outcome = ExecutionOutcome::Crashed {
            detail: "oci runtime error".to_string(),
        };
        assert_eq!(
            classify(&outcome, "4"),
            TestRuling::Reject(VerdictStatus::RuntimeError)
        );
    }

    #[test]
    fn infrastructure_failure_is_system_error() {
        let outcome = ExecutionOutcome::Infrastructure {
            detail: "daemon unreachable".to_string(),
        };
        assert_eq!(
            classify(&outcome, "4"),
            TestRuling::Reject(VerdictStatus::SystemError)
        );
    }

    #[test]
    fn empty_expected_output_matches_whitespace_only_stdout() {
        assert_eq!(classify(&completed(0, "\n"), ""), TestRuling::Pass);
    }
}
