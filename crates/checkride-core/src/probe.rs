//! Probe-loop controller: whether to drill deeper or move on.
//!
//! Grading sets the probe counter; the next-prompt step reads it. A non-PASS
//! answer keeps the same ACS task active and re-serves the oracle's own
//! follow-up question up to the depth limit, then falls back to a fresh base
//! question even if the last answer was still non-PASS.

use serde::{Deserialize, Serialize};

use crate::model::Session;
use crate::verdict::Outcome;

const PROBE_ID_SEPARATOR: &str = "__probe_";

/// Whether a served question is a fresh base question or a probe follow-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptKind {
    Base,
    Probe,
}

/// What the next prompt should be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeDecision {
    /// Re-serve the stored probe question against the current base question.
    ServeProbe {
        /// Id of the base question the probe extends.
        base_question_id: String,
        /// Stored probe question text to present as the stem.
        probe_question: String,
    },
    /// Draw a fresh base question and reset the probe counter.
    ServeBase,
}

/// Decide the next prompt for a session.
///
/// Rule order:
/// 1. Caller forces a new base question — always serve base.
/// 2. Last outcome was non-PASS, the counter is in `1..=max_probes`, and a
///    current question plus a stored probe question exist — serve the probe.
/// 3. Otherwise serve a fresh base question.
pub fn decide(session: &Session, force_new_base: bool) -> ProbeDecision {
    if force_new_base {
        return ProbeDecision::ServeBase;
    }

    let non_pass = session
        .last_outcome
        .is_some_and(|outcome| !outcome.is_pass());
    let in_depth = session.probe_count > 0 && session.probe_count <= session.max_probes;

    if non_pass && in_depth {
        if let (Some(base_id), Some(probe_question)) = (
            session.current_question_id.as_ref(),
            session.last_probe_question.as_ref(),
        ) {
            return ProbeDecision::ServeProbe {
                base_question_id: base_id.clone(),
                probe_question: probe_question.clone(),
            };
        }
    }

    ProbeDecision::ServeBase
}

/// Recompute the probe counter after a graded answer.
///
/// Non-PASS outcomes deepen the probe up to `max`; a PASS resets it.
pub fn next_probe_count(outcome: Outcome, current: u32, max: u32) -> u32 {
    if outcome.is_pass() {
        0
    } else {
        (current + 1).min(max)
    }
}

/// Synthesize the identifier for the nth probe on a base question.
pub fn probe_question_id(base_id: &str, probe_count: u32) -> String {
    format!("{base_id}{PROBE_ID_SEPARATOR}{probe_count}")
}

/// Resolve a possibly-synthetic probe id back to its base question id.
pub fn base_question_id(question_id: &str) -> &str {
    match question_id.find(PROBE_ID_SEPARATOR) {
        Some(idx) => &question_id[..idx],
        None => question_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Mode;

    fn probing_session() -> Session {
        let mut session = Session::new("u", Mode::Ppl, 2);
        session.current_question_id = Some("q1".into());
        session.current_acs_task_code = Some("PA.I.B.K1".into());
        session.last_outcome = Some(Outcome::Probe);
        session.last_probe_question = Some("X".into());
        session.probe_count = 1;
        session
    }

    #[test]
    fn serves_probe_within_depth() {
        let decision = decide(&probing_session(), false);
        assert_eq!(
            decision,
            ProbeDecision::ServeProbe {
                base_question_id: "q1".into(),
                probe_question: "X".into(),
            }
        );
    }

    #[test]
    fn force_new_base_wins() {
        let mut session = probing_session();
        session.probe_count = 2;
        assert_eq!(decide(&session, true), ProbeDecision::ServeBase);
    }

    #[test]
    fn pass_outcome_serves_base() {
        let mut session = probing_session();
        session.last_outcome = Some(Outcome::Pass);
        assert_eq!(decide(&session, false), ProbeDecision::ServeBase);
    }

    #[test]
    fn zero_counter_serves_base() {
        let mut session = probing_session();
        session.probe_count = 0;
        assert_eq!(decide(&session, false), ProbeDecision::ServeBase);
    }

    #[test]
    fn counter_beyond_depth_serves_base() {
        let mut session = probing_session();
        session.probe_count = 3;
        assert_eq!(decide(&session, false), ProbeDecision::ServeBase);
    }

    #[test]
    fn missing_probe_question_serves_base() {
        let mut session = probing_session();
        session.last_probe_question = None;
        assert_eq!(decide(&session, false), ProbeDecision::ServeBase);
    }

    #[test]
    fn missing_current_question_serves_base() {
        let mut session = probing_session();
        session.current_question_id = None;
        assert_eq!(decide(&session, false), ProbeDecision::ServeBase);
    }

    #[test]
    fn remediate_and_fail_also_probe() {
        for outcome in [Outcome::Remediate, Outcome::Fail] {
            let mut session = probing_session();
            session.last_outcome = Some(outcome);
            assert!(matches!(
                decide(&session, false),
                ProbeDecision::ServeProbe { .. }
            ));
        }
    }

    #[test]
    fn counter_recompute() {
        assert_eq!(next_probe_count(Outcome::Probe, 0, 2), 1);
        assert_eq!(next_probe_count(Outcome::Fail, 1, 2), 2);
        assert_eq!(next_probe_count(Outcome::Remediate, 2, 2), 2);
        assert_eq!(next_probe_count(Outcome::Pass, 2, 2), 0);
    }

    #[test]
    fn probe_id_roundtrip() {
        let id = probe_question_id("q-42", 2);
        assert_eq!(id, "q-42__probe_2");
        assert_eq!(base_question_id(&id), "q-42");
        assert_eq!(base_question_id("q-42"), "q-42");
    }
}
