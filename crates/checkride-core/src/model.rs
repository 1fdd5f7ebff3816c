//! Core data model types for checkride.
//!
//! These are the fundamental types the entire checkride system uses to
//! represent exam sessions, questions, graded attempts, and skill mastery.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::verdict::Outcome;

/// How many recently-served base question ids a session remembers.
///
/// The list exists only for repeat avoidance; order beyond the cap is
/// irrelevant.
pub const RECENT_LIMIT: usize = 10;

/// Certificate modes an exam session can run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    /// Private Pilot License.
    Ppl,
    /// Instrument Rating.
    Ir,
    /// Commercial Pilot License.
    Cpl,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Ppl => write!(f, "PPL"),
            Mode::Ir => write!(f, "IR"),
            Mode::Cpl => write!(f, "CPL"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PPL" => Ok(Mode::Ppl),
            "IR" => Ok(Mode::Ir),
            "CPL" => Ok(Mode::Cpl),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

/// A single oral-exam question from the bank.
///
/// Questions are immutable content items owned by the bank; the engine only
/// ever reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier for this question.
    pub id: String,
    /// The question text presented to the examinee.
    pub stem: String,
    /// ACS task code this question examines (e.g. "PA.I.B.K1").
    pub acs_task_code: String,
    /// Human-readable ACS area label.
    pub acs_area: String,
    /// Certificate modes this question applies to.
    #[serde(default)]
    pub modes: Vec<Mode>,
}

/// Lifecycle state of an exam session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Completed => write!(f, "completed"),
        }
    }
}

/// One exam attempt for one examinee and one certificate mode.
///
/// Invariant: `probe_count <= max_probes` at all times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier.
    pub id: Uuid,
    /// The examinee this session belongs to.
    pub user_id: String,
    /// Certificate mode, fixed at creation.
    pub mode: Mode,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Recently-served base question ids, most recent first, capped at
    /// [`RECENT_LIMIT`].
    #[serde(default)]
    pub recent_question_ids: Vec<String>,
    /// Consecutive probes served against the current task.
    pub probe_count: u32,
    /// Maximum probe depth, fixed at creation.
    pub max_probes: u32,
    /// Base question currently in play.
    pub current_question_id: Option<String>,
    /// ACS task code of the current question.
    pub current_acs_task_code: Option<String>,
    /// Outcome of the most recent graded answer.
    pub last_outcome: Option<Outcome>,
    /// Feedback from the most recent graded answer.
    pub last_feedback: Option<String>,
    /// Follow-up probe question proposed by the most recent verdict.
    pub last_probe_question: Option<String>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create a fresh active session.
    pub fn new(user_id: &str, mode: Mode, max_probes: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            mode,
            status: SessionStatus::Active,
            recent_question_ids: Vec::new(),
            probe_count: 0,
            max_probes,
            current_question_id: None,
            current_acs_task_code: None,
            last_outcome: None,
            last_feedback: None,
            last_probe_question: None,
            created_at: Utc::now(),
        }
    }

    /// Whether the session accepts further operations.
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Record a freshly-served base question in the recent list.
    ///
    /// Prepends the id, removes any prior occurrence, and truncates to
    /// [`RECENT_LIMIT`].
    pub fn note_recent(&mut self, question_id: &str) {
        self.recent_question_ids.retain(|id| id != question_id);
        self.recent_question_ids.insert(0, question_id.to_string());
        self.recent_question_ids.truncate(RECENT_LIMIT);
    }
}

/// An immutable record of one graded answer.
///
/// Created exactly once per grading call; never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    /// Unique attempt identifier.
    pub id: Uuid,
    /// Session this attempt belongs to.
    pub session_id: Uuid,
    /// Examinee who answered.
    pub user_id: String,
    /// Base question that was answered (probe ids are resolved first).
    pub question_id: String,
    /// ACS task code the answer was graded against.
    pub acs_task_code: String,
    /// Verbatim answer text.
    pub answer: String,
    /// Grading outcome.
    pub outcome: Outcome,
    /// Number of rubric points the answer missed.
    pub missing_count: u32,
    /// Whether the verdict flagged unsafe reasoning (outcome == FAIL).
    pub red_flag: bool,
    /// Oracle confidence in [0, 1].
    pub confidence: f64,
    /// When the attempt was recorded.
    pub created_at: DateTime<Utc>,
}

/// Running mastery state for one (examinee, ACS task code) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillMastery {
    /// The examinee.
    pub user_id: String,
    /// ACS task code this record tracks.
    pub acs_task_code: String,
    /// Bounded competence score in [0.0, 5.0].
    pub mastery: f64,
    /// When this skill was last graded.
    pub last_seen_at: DateTime<Utc>,
    /// Total graded answers against this skill.
    pub attempts: u32,
    /// Answers graded PASS.
    pub passes: u32,
    /// Answers graded anything other than PASS.
    ///
    /// PROBE lands here too: the counter means "non-pass", not "failure".
    pub fails: u32,
}

impl SkillMastery {
    /// A fresh record with no attempts and a neutral starting score.
    pub fn new(user_id: &str, acs_task_code: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            acs_task_code: acs_task_code.to_string(),
            mastery: 0.0,
            last_seen_at: Utc::now(),
            attempts: 0,
            passes: 0,
            fails: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_display_and_parse() {
        assert_eq!(Mode::Ppl.to_string(), "PPL");
        assert_eq!(Mode::Ir.to_string(), "IR");
        assert_eq!("PPL".parse::<Mode>().unwrap(), Mode::Ppl);
        assert_eq!("cpl".parse::<Mode>().unwrap(), Mode::Cpl);
        assert!("ATP".parse::<Mode>().is_err());
    }

    #[test]
    fn new_session_starts_clean() {
        let session = Session::new("demo-user", Mode::Ppl, 2);
        assert!(session.is_active());
        assert_eq!(session.probe_count, 0);
        assert_eq!(session.max_probes, 2);
        assert!(session.recent_question_ids.is_empty());
        assert!(session.current_question_id.is_none());
    }

    #[test]
    fn note_recent_prepends_and_dedupes() {
        let mut session = Session::new("u", Mode::Ppl, 2);
        session.note_recent("q1");
        session.note_recent("q2");
        session.note_recent("q1");
        assert_eq!(session.recent_question_ids, vec!["q1", "q2"]);
    }

    #[test]
    fn note_recent_caps_at_limit() {
        let mut session = Session::new("u", Mode::Ppl, 2);
        for i in 0..15 {
            session.note_recent(&format!("q{i}"));
        }
        assert_eq!(session.recent_question_ids.len(), RECENT_LIMIT);
        assert_eq!(session.recent_question_ids[0], "q14");
        assert!(!session.recent_question_ids.contains(&"q4".to_string()));
    }

    #[test]
    fn session_serde_roundtrip() {
        let session = Session::new("demo-user", Mode::Ir, 2);
        let json = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, session.id);
        assert_eq!(back.mode, Mode::Ir);
        assert_eq!(back.status, SessionStatus::Active);
    }
}
