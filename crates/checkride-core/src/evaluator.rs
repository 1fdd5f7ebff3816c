//! Evaluation pipeline: oracle call, strict parse, bounded repair, fallback.
//!
//! [`Evaluator::evaluate`] is total — whatever the oracle does, the caller
//! gets a structurally valid [`Verdict`] and never needs to special-case a
//! missing one.

use std::sync::Arc;
use std::time::Duration;

use crate::traits::{GradingOracle, OracleRequest};
use crate::verdict::{parse_verdict, Verdict};

/// Bounded-retry policy for malformed oracle output.
///
/// The bound is an explicit, testable parameter rather than a loop literal.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Repair attempts after the first call (each re-sends the original
    /// context plus the invalid prior output).
    pub max_repairs: u32,
    /// Overall deadline for one evaluation, covering every oracle call.
    pub deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_repairs: 2,
            deadline: Duration::from_secs(90),
        }
    }
}

/// Turns a free-text answer into a structured grading verdict.
pub struct Evaluator {
    oracle: Arc<dyn GradingOracle>,
    policy: RetryPolicy,
}

impl Evaluator {
    pub fn new(oracle: Arc<dyn GradingOracle>, policy: RetryPolicy) -> Self {
        Self { oracle, policy }
    }

    /// Grade an answer. Never fails outwardly.
    ///
    /// The returned verdict always carries the caller-supplied ACS task code;
    /// the oracle's echo of it is never trusted.
    pub async fn evaluate(&self, stem: &str, answer: &str, acs_task_code: &str) -> Verdict {
        let request = OracleRequest::new(stem, answer, acs_task_code);

        let attempt = tokio::time::timeout(self.policy.deadline, self.run(&request)).await;

        match attempt {
            Ok(Some(mut verdict)) => {
                verdict.acs_task_code = acs_task_code.to_string();
                verdict
            }
            Ok(None) => Verdict::fallback(acs_task_code),
            Err(_) => {
                tracing::warn!(acs_task_code, "evaluation deadline exceeded, using fallback");
                Verdict::fallback(acs_task_code)
            }
        }
    }

    /// One first call plus up to `max_repairs` correction calls.
    async fn run(&self, request: &OracleRequest) -> Option<Verdict> {
        let mut raw = match self.oracle.complete(request).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(oracle = self.oracle.name(), error = %e, "oracle call failed");
                return None;
            }
        };

        for repair in 0..=self.policy.max_repairs {
            match parse_verdict(&raw) {
                Ok(verdict) => return Some(verdict),
                Err(e) => {
                    if repair == self.policy.max_repairs {
                        tracing::warn!(
                            oracle = self.oracle.name(),
                            error = %e,
                            repairs = repair,
                            "oracle output never parsed, using fallback"
                        );
                        return None;
                    }
                    tracing::debug!(error = %e, repair, "oracle output malformed, requesting fix");
                }
            }

            raw = match self.oracle.complete(&request.repair(&raw)).await {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(oracle = self.oracle.name(), error = %e, "repair call failed");
                    return None;
                }
            };
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use crate::verdict::Outcome;

    /// Oracle returning a fixed sequence of replies.
    struct SequenceOracle {
        replies: Mutex<Vec<anyhow::Result<String>>>,
        calls: AtomicU32,
        requests: Mutex<Vec<OracleRequest>>,
    }

    impl SequenceOracle {
        fn new(replies: Vec<anyhow::Result<String>>) -> Self {
            let mut replies = replies;
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                calls: AtomicU32::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GradingOracle for SequenceOracle {
        fn name(&self) -> &str {
            "sequence"
        }

        async fn complete(&self, request: &OracleRequest) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok("{}".to_string()))
        }
    }

    fn valid_reply(code: &str) -> String {
        format!(
            r#"{{"result":"PASS","confidence":0.7,"feedback":"Good answer.",
               "missing_points":[],"probe_question":null,"acs_task_code":"{code}"}}"#
        )
    }

    fn evaluator(oracle: SequenceOracle) -> (Evaluator, Arc<SequenceOracle>) {
        let oracle = Arc::new(oracle);
        (
            Evaluator::new(oracle.clone(), RetryPolicy::default()),
            oracle,
        )
    }

    #[tokio::test]
    async fn valid_first_reply_is_accepted() {
        let (eval, oracle) = evaluator(SequenceOracle::new(vec![Ok(valid_reply("PA.I.B.K1"))]));
        let verdict = eval.evaluate("stem", "answer", "PA.I.B.K1").await;
        assert_eq!(verdict.outcome, Outcome::Pass);
        assert_eq!(oracle.calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn three_malformed_replies_yield_fallback() {
        let (eval, oracle) = evaluator(SequenceOracle::new(vec![
            Ok("not json".into()),
            Ok("{\"result\":\"MAYBE\"}".into()),
            Ok("still bad".into()),
        ]));
        let verdict = eval.evaluate("stem", "answer", "PA.I.B.K1").await;
        assert_eq!(verdict.outcome, Outcome::Probe);
        assert_eq!(verdict.confidence, 0.0);
        assert_eq!(verdict.acs_task_code, "PA.I.B.K1");
        // First call plus exactly two repairs.
        assert_eq!(oracle.calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn valid_second_reply_is_accepted_with_forced_code() {
        let (eval, oracle) = evaluator(SequenceOracle::new(vec![
            Ok("garbage".into()),
            Ok(valid_reply("WRONG.ECHO")),
        ]));
        let verdict = eval.evaluate("stem", "answer", "PA.I.B.K1").await;
        assert_eq!(verdict.outcome, Outcome::Pass);
        // Oracle echo is never trusted.
        assert_eq!(verdict.acs_task_code, "PA.I.B.K1");
        assert_eq!(oracle.calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn repair_request_carries_invalid_output_and_context() {
        let (eval, oracle) = evaluator(SequenceOracle::new(vec![
            Ok("garbage".into()),
            Ok(valid_reply("PA.I.B.K1")),
        ]));
        eval.evaluate("What is Vx?", "speed", "PA.I.B.K1").await;

        let requests = oracle.requests.lock().unwrap();
        assert!(requests[0].invalid_reply.is_none());
        assert_eq!(requests[1].invalid_reply.as_deref(), Some("garbage"));
        assert_eq!(requests[1].stem, "What is Vx?");
    }

    #[tokio::test]
    async fn transport_failure_yields_fallback_without_retry() {
        let (eval, oracle) = evaluator(SequenceOracle::new(vec![Err(anyhow::anyhow!(
            "connection refused"
        ))]));
        let verdict = eval.evaluate("stem", "answer", "PA.I.B.K1").await;
        assert_eq!(verdict.outcome, Outcome::Probe);
        assert_eq!(verdict.confidence, 0.0);
        assert_eq!(oracle.calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn deadline_yields_fallback() {
        struct SlowOracle;

        #[async_trait]
        impl GradingOracle for SlowOracle {
            fn name(&self) -> &str {
                "slow"
            }
            async fn complete(&self, _request: &OracleRequest) -> anyhow::Result<String> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(String::new())
            }
        }

        let policy = RetryPolicy {
            max_repairs: 2,
            deadline: Duration::from_millis(20),
        };
        let eval = Evaluator::new(Arc::new(SlowOracle), policy);
        let verdict = eval.evaluate("stem", "answer", "PA.I.B.K1").await;
        assert_eq!(verdict.outcome, Outcome::Probe);
        assert_eq!(verdict.confidence, 0.0);
    }
}
