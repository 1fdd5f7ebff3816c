//! Session results aggregation.
//!
//! Pure summaries built from stored attempts and mastery records: outcome
//! counts, the examinee's weakest and strongest skills, and the most-probed
//! skills of the session.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{Attempt, Mode, Session, SessionStatus, SkillMastery};
use crate::verdict::Outcome;

/// How many skills to list per ranking.
const SKILL_LIMIT: usize = 8;
/// How many attempts of history to include.
const ATTEMPT_LIMIT: usize = 30;

/// Aggregate results for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub mode: Mode,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    /// Outcome tallies across the session's attempts.
    pub counts: OutcomeCounts,
    /// The examinee's lowest-mastery skills, weakest first.
    pub weakest: Vec<SkillSummary>,
    /// The examinee's highest-mastery skills, strongest first.
    pub strongest: Vec<SkillSummary>,
    /// Skills that drew the most PROBE verdicts in this session.
    pub most_probed: Vec<ProbedSkill>,
    /// Attempt history, most recent first, capped.
    pub attempts: Vec<AttemptSummary>,
}

/// Attempt tallies by outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub total: u32,
    pub pass: u32,
    pub probe: u32,
    pub remediate: u32,
    pub fail: u32,
}

impl OutcomeCounts {
    /// Tally outcomes across a slice of attempts.
    pub fn tally(attempts: &[Attempt]) -> Self {
        let mut counts = Self::default();
        for attempt in attempts {
            counts.total += 1;
            match attempt.outcome {
                Outcome::Pass => counts.pass += 1,
                Outcome::Probe => counts.probe += 1,
                Outcome::Remediate => counts.remediate += 1,
                Outcome::Fail => counts.fail += 1,
            }
        }
        counts
    }
}

/// One skill in a mastery ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillSummary {
    pub acs_task_code: String,
    pub mastery: f64,
    pub attempts: u32,
    pub passes: u32,
    pub fails: u32,
}

impl From<&SkillMastery> for SkillSummary {
    fn from(skill: &SkillMastery) -> Self {
        Self {
            acs_task_code: skill.acs_task_code.clone(),
            mastery: skill.mastery,
            attempts: skill.attempts,
            passes: skill.passes,
            fails: skill.fails,
        }
    }
}

/// A skill ranked by how often it was probed this session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbedSkill {
    pub acs_task_code: String,
    pub probes: u32,
}

/// One line of attempt history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub outcome: Outcome,
    pub acs_task_code: String,
    pub question_id: String,
}

/// Build a session report from stored state.
///
/// `attempts` must be most-recent-first, as [`crate::traits::ExamStore`]
/// returns them; `skills` covers every skill the examinee has touched.
pub fn build(session: &Session, attempts: &[Attempt], skills: &[SkillMastery]) -> SessionReport {
    let counts = OutcomeCounts::tally(attempts);

    let mut ranked: Vec<&SkillMastery> = skills.iter().collect();
    // Ties break toward the skill with more attempts — it carries more signal.
    ranked.sort_by(|a, b| {
        a.mastery
            .total_cmp(&b.mastery)
            .then(b.attempts.cmp(&a.attempts))
    });

    let weakest = ranked
        .iter()
        .take(SKILL_LIMIT)
        .map(|s| SkillSummary::from(*s))
        .collect();
    let strongest = ranked
        .iter()
        .rev()
        .take(SKILL_LIMIT)
        .map(|s| SkillSummary::from(*s))
        .collect();

    let mut probe_counts: HashMap<&str, u32> = HashMap::new();
    for attempt in attempts {
        if attempt.outcome == Outcome::Probe {
            *probe_counts.entry(attempt.acs_task_code.as_str()).or_default() += 1;
        }
    }
    let mut most_probed: Vec<ProbedSkill> = probe_counts
        .into_iter()
        .map(|(code, probes)| ProbedSkill {
            acs_task_code: code.to_string(),
            probes,
        })
        .collect();
    most_probed.sort_by(|a, b| {
        b.probes
            .cmp(&a.probes)
            .then_with(|| a.acs_task_code.cmp(&b.acs_task_code))
    });
    most_probed.truncate(SKILL_LIMIT);

    let attempts = attempts
        .iter()
        .take(ATTEMPT_LIMIT)
        .map(|a| AttemptSummary {
            id: a.id,
            created_at: a.created_at,
            outcome: a.outcome,
            acs_task_code: a.acs_task_code.clone(),
            question_id: a.question_id.clone(),
        })
        .collect();

    SessionReport {
        session_id: session.id,
        mode: session.mode,
        status: session.status,
        created_at: session.created_at,
        counts,
        weakest,
        strongest,
        most_probed,
        attempts,
    }
}
