//! Central session orchestrator.
//!
//! Composes the question selector, probe-loop controller, evaluation
//! pipeline, and mastery tracker behind the two externally visible
//! operations: serve the next prompt, and grade an answer.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::ExamError;
use crate::evaluator::Evaluator;
use crate::model::{Attempt, Mode, Session, SkillMastery};
use crate::probe::{self, ProbeDecision, PromptKind};
use crate::report::{self, SessionReport};
use crate::selector;
use crate::traits::ExamStore;
use crate::verdict::{Outcome, Verdict};

/// Configuration for the exam engine.
#[derive(Debug, Clone)]
pub struct ExamEngineConfig {
    /// Probe depth limit stamped onto new sessions.
    pub max_probes_per_task: u32,
}

impl Default for ExamEngineConfig {
    fn default() -> Self {
        Self {
            max_probes_per_task: 2,
        }
    }
}

/// A question as served to the caller, tagged base or probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServedQuestion {
    /// Question id; probe prompts carry a synthesized `__probe_n` id.
    pub id: String,
    /// The text to present.
    pub stem: String,
    /// ACS task code under examination.
    pub acs_task_code: String,
    /// Area label; probe prompts are annotated as a probe variant.
    pub acs_area: String,
    /// Base question or probe follow-up.
    pub kind: PromptKind,
    /// Current probe depth (0 for base prompts).
    pub probe_count: u32,
    /// The session's probe depth limit.
    pub max_probes: u32,
}

/// The central exam engine.
pub struct ExamEngine {
    store: Arc<dyn ExamStore>,
    evaluator: Evaluator,
    config: ExamEngineConfig,
    /// Per-session locks: operations against one session are serialized,
    /// different sessions proceed in parallel.
    session_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl ExamEngine {
    pub fn new(store: Arc<dyn ExamStore>, evaluator: Evaluator, config: ExamEngineConfig) -> Self {
        Self {
            store,
            evaluator,
            config,
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Start a new exam session for an examinee.
    pub async fn start_session(&self, user_id: &str, mode: Mode) -> Result<Uuid, ExamError> {
        let session = Session::new(user_id, mode, self.config.max_probes_per_task);
        self.store
            .insert_session(&session)
            .await
            .map_err(ExamError::Persistence)?;
        tracing::info!(session_id = %session.id, %mode, user_id, "session started");
        Ok(session.id)
    }

    /// Serve the next prompt for a session.
    ///
    /// Decides between re-serving the stored probe question and drawing a
    /// fresh base question; base draws reset the probe counter and are
    /// persisted before returning.
    pub async fn next_prompt(
        &self,
        user_id: &str,
        session_id: Uuid,
        force_new_base: bool,
    ) -> Result<ServedQuestion, ExamError> {
        let lock = self.session_lock(session_id).await;
        let _guard = lock.lock().await;

        let session = self.authorized_session(user_id, session_id).await?;

        if let ProbeDecision::ServeProbe {
            base_question_id,
            probe_question,
        } = probe::decide(&session, force_new_base)
        {
            // If the base question vanished from the bank, fall through to a
            // fresh draw instead of erroring.
            if let Some(base) = self
                .store
                .question(&base_question_id)
                .await
                .map_err(ExamError::Persistence)?
            {
                tracing::debug!(
                    session_id = %session.id,
                    base_question_id,
                    probe_count = session.probe_count,
                    "serving probe prompt"
                );
                return Ok(ServedQuestion {
                    id: probe::probe_question_id(&base.id, session.probe_count),
                    stem: probe_question,
                    acs_task_code: base.acs_task_code,
                    acs_area: format!("{} (Probe)", base.acs_area),
                    kind: PromptKind::Probe,
                    probe_count: session.probe_count,
                    max_probes: session.max_probes,
                });
            }
        }

        self.serve_base(session).await
    }

    /// Grade an answer and advance session state.
    ///
    /// Total with respect to the oracle: the evaluation pipeline guarantees
    /// a structurally valid verdict. The attempt insert, mastery upsert, and
    /// session update are committed atomically.
    pub async fn submit_answer(
        &self,
        user_id: &str,
        session_id: Uuid,
        question_id: &str,
        answer: &str,
    ) -> Result<Verdict, ExamError> {
        let lock = self.session_lock(session_id).await;
        let _guard = lock.lock().await;

        let mut session = self.authorized_session(user_id, session_id).await?;

        // Probe prompts are graded against their underlying base question.
        let base_id = probe::base_question_id(question_id);
        let question = self
            .store
            .question(base_id)
            .await
            .map_err(ExamError::Persistence)?
            .ok_or_else(|| ExamError::QuestionNotFound(base_id.to_string()))?;

        let verdict = self
            .evaluator
            .evaluate(&question.stem, answer, &question.acs_task_code)
            .await;

        let now = chrono::Utc::now();
        let attempt = Attempt {
            id: Uuid::new_v4(),
            session_id: session.id,
            user_id: user_id.to_string(),
            question_id: question.id.clone(),
            acs_task_code: verdict.acs_task_code.clone(),
            answer: answer.to_string(),
            outcome: verdict.outcome,
            missing_count: verdict.missing_points.len() as u32,
            red_flag: verdict.outcome == Outcome::Fail,
            confidence: verdict.confidence,
            created_at: now,
        };

        let current = self
            .store
            .skill(user_id, &verdict.acs_task_code)
            .await
            .map_err(ExamError::Persistence)?
            .unwrap_or_else(|| SkillMastery::new(user_id, &verdict.acs_task_code));
        let (skill, delta) = crate::mastery::apply_verdict(&current, &verdict, now);

        session.last_outcome = Some(verdict.outcome);
        session.last_feedback = Some(verdict.feedback.clone());
        session.last_probe_question = verdict.probe_question.clone();
        session.probe_count =
            probe::next_probe_count(verdict.outcome, session.probe_count, session.max_probes);
        session.current_question_id = Some(question.id.clone());
        session.current_acs_task_code = Some(question.acs_task_code.clone());

        self.store
            .commit_graded_answer(&session, &attempt, &skill)
            .await
            .map_err(ExamError::Persistence)?;

        tracing::info!(
            session_id = %session.id,
            question_id = %question.id,
            outcome = %verdict.outcome,
            confidence = verdict.confidence,
            delta,
            mastery = skill.mastery,
            probe_count = session.probe_count,
            "answer graded"
        );

        Ok(verdict)
    }

    /// Aggregate results for a session.
    pub async fn session_results(
        &self,
        user_id: &str,
        session_id: Uuid,
    ) -> Result<SessionReport, ExamError> {
        let session = self
            .store
            .load_session(session_id)
            .await
            .map_err(ExamError::Persistence)?
            .ok_or(ExamError::SessionNotFound(session_id))?;
        if session.user_id != user_id {
            return Err(ExamError::Forbidden);
        }

        let attempts = self
            .store
            .attempts_for_session(session_id)
            .await
            .map_err(ExamError::Persistence)?;
        let skills = self
            .store
            .skills_for_user(user_id)
            .await
            .map_err(ExamError::Persistence)?;

        Ok(report::build(&session, &attempts, &skills))
    }

    /// Load a session and enforce existence, ownership, and active state.
    async fn authorized_session(
        &self,
        user_id: &str,
        session_id: Uuid,
    ) -> Result<Session, ExamError> {
        let session = self
            .store
            .load_session(session_id)
            .await
            .map_err(ExamError::Persistence)?
            .ok_or(ExamError::SessionNotFound(session_id))?;
        if session.user_id != user_id {
            return Err(ExamError::Forbidden);
        }
        if !session.is_active() {
            return Err(ExamError::SessionNotActive);
        }
        Ok(session)
    }

    /// Draw a fresh base question, reset the probe counter, and persist.
    async fn serve_base(&self, mut session: Session) -> Result<ServedQuestion, ExamError> {
        let bank = self
            .store
            .questions_for_mode(session.mode)
            .await
            .map_err(ExamError::Persistence)?;
        if bank.is_empty() {
            return Err(ExamError::NoQuestionsForMode(session.mode));
        }

        // Scoped so the thread-local rng never crosses an await.
        let question = {
            let mut rng = rand::rng();
            selector::select_base(&bank, &session.recent_question_ids, &mut rng)
                .cloned()
                .ok_or(ExamError::NoQuestionsForMode(session.mode))?
        };

        session.current_question_id = Some(question.id.clone());
        session.current_acs_task_code = Some(question.acs_task_code.clone());
        session.probe_count = 0;
        session.note_recent(&question.id);

        self.store
            .save_session(&session)
            .await
            .map_err(ExamError::Persistence)?;

        tracing::debug!(
            session_id = %session.id,
            question_id = %question.id,
            "serving base prompt"
        );

        Ok(ServedQuestion {
            id: question.id,
            stem: question.stem,
            acs_task_code: question.acs_task_code,
            acs_area: question.acs_area,
            kind: PromptKind::Base,
            probe_count: 0,
            max_probes: session.max_probes,
        })
    }

    async fn session_lock(&self, session_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.session_locks.lock().await;
        // An in-flight operation holds a clone of its lock, so a strong count
        // of 1 means the session has gone quiet and the entry can go.
        locks.retain(|id, lock| *id == session_id || Arc::strong_count(lock) > 1);
        locks.entry(session_id).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::evaluator::RetryPolicy;
    use crate::model::Question;
    use crate::traits::{GradingOracle, OracleRequest};

    struct NoopStore;

    #[async_trait]
    impl ExamStore for NoopStore {
        async fn insert_session(&self, _session: &Session) -> anyhow::Result<()> {
            Ok(())
        }
        async fn load_session(&self, _id: Uuid) -> anyhow::Result<Option<Session>> {
            Ok(None)
        }
        async fn save_session(&self, _session: &Session) -> anyhow::Result<()> {
            Ok(())
        }
        async fn question(&self, _id: &str) -> anyhow::Result<Option<Question>> {
            Ok(None)
        }
        async fn questions_for_mode(&self, _mode: Mode) -> anyhow::Result<Vec<Question>> {
            Ok(Vec::new())
        }
        async fn skill(
            &self,
            _user_id: &str,
            _acs_task_code: &str,
        ) -> anyhow::Result<Option<SkillMastery>> {
            Ok(None)
        }
        async fn commit_graded_answer(
            &self,
            _session: &Session,
            _attempt: &Attempt,
            _skill: &SkillMastery,
        ) -> anyhow::Result<()> {
            Ok(())
        }
        async fn attempts_for_session(&self, _session_id: Uuid) -> anyhow::Result<Vec<Attempt>> {
            Ok(Vec::new())
        }
        async fn skills_for_user(&self, _user_id: &str) -> anyhow::Result<Vec<SkillMastery>> {
            Ok(Vec::new())
        }
    }

    struct NoopOracle;

    #[async_trait]
    impl GradingOracle for NoopOracle {
        fn name(&self) -> &str {
            "noop"
        }
        async fn complete(&self, _request: &OracleRequest) -> anyhow::Result<String> {
            Ok(String::new())
        }
    }

    fn engine() -> ExamEngine {
        ExamEngine::new(
            Arc::new(NoopStore),
            Evaluator::new(Arc::new(NoopOracle), RetryPolicy::default()),
            ExamEngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn idle_session_locks_are_pruned() {
        let engine = engine();

        for _ in 0..5 {
            engine.session_lock(Uuid::new_v4()).await;
        }
        let latest = Uuid::new_v4();
        engine.session_lock(latest).await;

        let locks = engine.session_locks.lock().await;
        assert_eq!(locks.len(), 1);
        assert!(locks.contains_key(&latest));
    }

    #[tokio::test]
    async fn held_session_lock_survives_pruning() {
        let engine = engine();

        let busy = Uuid::new_v4();
        let _held = engine.session_lock(busy).await;

        engine.session_lock(Uuid::new_v4()).await;

        let locks = engine.session_locks.lock().await;
        assert!(locks.contains_key(&busy));
    }

    #[tokio::test]
    async fn same_session_reuses_its_lock() {
        let engine = engine();

        let id = Uuid::new_v4();
        let first = engine.session_lock(id).await;
        let second = engine.session_lock(id).await;
        assert!(Arc::ptr_eq(&first, &second));
    }
}
