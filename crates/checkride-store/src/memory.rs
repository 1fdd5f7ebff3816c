//! In-memory exam store.
//!
//! All state sits behind one `tokio::sync::RwLock`; `commit_graded_answer`
//! takes a single write guard, so the attempt insert, skill upsert, and
//! session save apply atomically with respect to every reader and writer.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use checkride_core::model::{Attempt, Mode, Question, Session, SkillMastery};
use checkride_core::traits::ExamStore;

#[derive(Default)]
struct Inner {
    sessions: HashMap<Uuid, Session>,
    questions: HashMap<String, Question>,
    attempts: Vec<Attempt>,
    /// Keyed by (user_id, acs_task_code).
    skills: HashMap<(String, String), SkillMastery>,
}

/// An `ExamStore` holding everything in process memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-loaded with a question bank.
    pub fn with_questions(questions: Vec<Question>) -> Self {
        let mut inner = Inner::default();
        for q in questions {
            inner.questions.insert(q.id.clone(), q);
        }
        Self {
            inner: RwLock::new(inner),
        }
    }
}

#[async_trait]
impl ExamStore for MemoryStore {
    async fn insert_session(&self, session: &Session) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        inner.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn load_session(&self, id: Uuid) -> anyhow::Result<Option<Session>> {
        Ok(self.inner.read().await.sessions.get(&id).cloned())
    }

    async fn save_session(&self, session: &Session) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        anyhow::ensure!(
            inner.sessions.contains_key(&session.id),
            "cannot save unknown session {}",
            session.id
        );
        inner.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn question(&self, id: &str) -> anyhow::Result<Option<Question>> {
        Ok(self.inner.read().await.questions.get(id).cloned())
    }

    async fn questions_for_mode(&self, mode: Mode) -> anyhow::Result<Vec<Question>> {
        Ok(self
            .inner
            .read()
            .await
            .questions
            .values()
            .filter(|q| q.modes.contains(&mode))
            .cloned()
            .collect())
    }

    async fn skill(
        &self,
        user_id: &str,
        acs_task_code: &str,
    ) -> anyhow::Result<Option<SkillMastery>> {
        Ok(self
            .inner
            .read()
            .await
            .skills
            .get(&(user_id.to_string(), acs_task_code.to_string()))
            .cloned())
    }

    async fn commit_graded_answer(
        &self,
        session: &Session,
        attempt: &Attempt,
        skill: &SkillMastery,
    ) -> anyhow::Result<()> {
        // One guard covers all three writes.
        let mut inner = self.inner.write().await;
        anyhow::ensure!(
            inner.sessions.contains_key(&session.id),
            "cannot commit against unknown session {}",
            session.id
        );
        inner.attempts.push(attempt.clone());
        inner.skills.insert(
            (skill.user_id.clone(), skill.acs_task_code.clone()),
            skill.clone(),
        );
        inner.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn attempts_for_session(&self, session_id: Uuid) -> anyhow::Result<Vec<Attempt>> {
        let inner = self.inner.read().await;
        let mut attempts: Vec<Attempt> = inner
            .attempts
            .iter()
            .filter(|a| a.session_id == session_id)
            .cloned()
            .collect();
        attempts.reverse(); // insertion order is oldest-first
        Ok(attempts)
    }

    async fn skills_for_user(&self, user_id: &str) -> anyhow::Result<Vec<SkillMastery>> {
        Ok(self
            .inner
            .read()
            .await
            .skills
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }
}
