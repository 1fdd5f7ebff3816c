//! Scripted oracle for testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use checkride_core::traits::{GradingOracle, OracleRequest};

/// A grading oracle that replays a scripted queue of replies.
///
/// Lets tests drive the evaluation pipeline through malformed-output and
/// transport-failure paths without real API calls.
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<anyhow::Result<String>>>,
    /// Reply used once the queue runs dry.
    default_reply: String,
    call_count: AtomicU32,
    last_request: Mutex<Option<OracleRequest>>,
}

impl ScriptedOracle {
    /// Replay `replies` in order, then fall back to the default reply.
    pub fn new(replies: Vec<anyhow::Result<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            default_reply: default_verdict_json("GEN.TASK"),
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Always return the same reply.
    pub fn with_fixed_reply(reply: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            default_reply: reply.to_string(),
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Number of calls made to this oracle.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// The most recent request received.
    pub fn last_request(&self) -> Option<OracleRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

/// A minimal valid verdict reply for scripting convenience.
pub fn default_verdict_json(acs_task_code: &str) -> String {
    format!(
        r#"{{"result":"PASS","confidence":0.7,"feedback":"Good structure.",
           "missing_points":[],"probe_question":null,"acs_task_code":"{acs_task_code}"}}"#
    )
}

#[async_trait]
impl GradingOracle for ScriptedOracle {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &OracleRequest) -> anyhow::Result<String> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_request.lock().unwrap() = Some(request.clone());

        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.default_reply.clone()))
    }
}
