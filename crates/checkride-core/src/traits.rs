//! Core trait definitions for grading oracles and session storage.
//!
//! These async traits are implemented by the `checkride-oracle` and
//! `checkride-store` crates respectively.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{Attempt, Mode, Question, Session, SkillMastery};

// ---------------------------------------------------------------------------
// Grading oracle trait
// ---------------------------------------------------------------------------

/// Trait for external services that grade free-text answers.
///
/// One invocation is one outbound call. Implementations never retry; bounded
/// retry-with-correction belongs to the evaluation pipeline. The reply is raw
/// text — the pipeline owns the strict parse into a verdict.
#[async_trait]
pub trait GradingOracle: Send + Sync {
    /// Human-readable oracle name (e.g. "openai").
    fn name(&self) -> &str;

    /// Send one grading request and return the oracle's raw reply text.
    async fn complete(&self, request: &OracleRequest) -> anyhow::Result<String>;
}

/// One grading request to the oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleRequest {
    /// The question stem that was asked.
    pub stem: String,
    /// The examinee's verbatim answer.
    pub answer: String,
    /// ACS task code being examined.
    pub acs_task_code: String,
    /// On repair turns, the prior reply that failed to parse. The oracle is
    /// asked to correct it instead of grading from scratch.
    #[serde(default)]
    pub invalid_reply: Option<String>,
}

impl OracleRequest {
    /// A first-turn grading request.
    pub fn new(stem: &str, answer: &str, acs_task_code: &str) -> Self {
        Self {
            stem: stem.to_string(),
            answer: answer.to_string(),
            acs_task_code: acs_task_code.to_string(),
            invalid_reply: None,
        }
    }

    /// A repair turn carrying the invalid prior output.
    pub fn repair(&self, invalid_reply: &str) -> Self {
        Self {
            invalid_reply: Some(invalid_reply.to_string()),
            ..self.clone()
        }
    }
}

/// System instructions shared by oracle implementations.
pub const ORACLE_SYSTEM_PROMPT: &str = "You are an FAA DPE-style oral evaluator.
Evaluate only this answer against this question and ACS task.
Grade for structure, regulatory/source correctness, and safety/risk emphasis.
Return ONLY valid JSON. No markdown. No extra keys.

Required JSON:
{
  \"result\": \"PASS\" | \"PROBE\" | \"REMEDIATE\" | \"FAIL\",
  \"confidence\": number between 0 and 1,
  \"feedback\": string,
  \"missing_points\": string[],
  \"probe_question\": string | null,
  \"acs_task_code\": string
}";

// ---------------------------------------------------------------------------
// Storage trait
// ---------------------------------------------------------------------------

/// Trait for persistent session, attempt, and mastery storage.
///
/// `commit_graded_answer` must apply its three writes atomically: a crash or
/// cancellation must never leave an attempt logged without the matching
/// mastery and session updates.
#[async_trait]
pub trait ExamStore: Send + Sync {
    /// Persist a newly created session.
    async fn insert_session(&self, session: &Session) -> anyhow::Result<()>;

    /// Load a session by id.
    async fn load_session(&self, id: Uuid) -> anyhow::Result<Option<Session>>;

    /// Persist a mutated session.
    async fn save_session(&self, session: &Session) -> anyhow::Result<()>;

    /// Load a question by id.
    async fn question(&self, id: &str) -> anyhow::Result<Option<Question>>;

    /// All questions tagged for a mode.
    async fn questions_for_mode(&self, mode: Mode) -> anyhow::Result<Vec<Question>>;

    /// Load the mastery record for one (examinee, ACS task code) pair.
    async fn skill(&self, user_id: &str, acs_task_code: &str)
        -> anyhow::Result<Option<SkillMastery>>;

    /// Atomically record a graded answer: insert the attempt, upsert the
    /// skill record, and save the updated session.
    async fn commit_graded_answer(
        &self,
        session: &Session,
        attempt: &Attempt,
        skill: &SkillMastery,
    ) -> anyhow::Result<()>;

    /// Attempts recorded for a session, most recent first.
    async fn attempts_for_session(&self, session_id: Uuid) -> anyhow::Result<Vec<Attempt>>;

    /// All mastery records for an examinee.
    async fn skills_for_user(&self, user_id: &str) -> anyhow::Result<Vec<SkillMastery>>;
}
