//! Mastery tracking: turning verdicts into a bounded per-skill score.
//!
//! Pure functions with no I/O; persistence of the updated record is the
//! caller's responsibility, once per graded answer.

use chrono::{DateTime, Utc};

use crate::model::SkillMastery;
use crate::verdict::{clamp01, Outcome, Verdict};

/// Lower bound of the mastery scale.
pub const MASTERY_MIN: f64 = 0.0;
/// Upper bound of the mastery scale.
pub const MASTERY_MAX: f64 = 5.0;

/// Score delta for a verdict, weighted by oracle confidence.
///
/// A confident PASS moves the score further than a hesitant one; a confident
/// FAIL costs more than a hesitant one.
pub fn delta_for(outcome: Outcome, confidence: f64) -> f64 {
    let c = clamp01(confidence);
    match outcome {
        Outcome::Pass => 0.4 + 0.4 * c,
        Outcome::Probe => 0.05 + 0.15 * c,
        Outcome::Remediate => -(0.3 + 0.4 * c),
        Outcome::Fail => -(0.6 + 0.4 * c),
    }
}

/// Apply a verdict to a mastery record, returning the updated record and the
/// delta that was applied (before clamping).
///
/// The attempts counter always increments; passes increments only on PASS;
/// fails increments on every non-PASS outcome, PROBE included (the counter
/// tracks "non-pass", not "failure").
pub fn apply_verdict(
    current: &SkillMastery,
    verdict: &Verdict,
    now: DateTime<Utc>,
) -> (SkillMastery, f64) {
    let delta = delta_for(verdict.outcome, verdict.confidence);
    let pass = verdict.outcome.is_pass();

    let updated = SkillMastery {
        user_id: current.user_id.clone(),
        acs_task_code: current.acs_task_code.clone(),
        mastery: (current.mastery + delta).clamp(MASTERY_MIN, MASTERY_MAX),
        last_seen_at: now,
        attempts: current.attempts + 1,
        passes: current.passes + u32::from(pass),
        fails: current.fails + u32::from(!pass),
    };

    (updated, delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(outcome: Outcome, confidence: f64) -> Verdict {
        Verdict {
            outcome,
            confidence,
            feedback: "feedback".into(),
            missing_points: vec![],
            probe_question: None,
            acs_task_code: "PA.I.B.K1".into(),
        }
    }

    fn skill(mastery: f64) -> SkillMastery {
        SkillMastery {
            mastery,
            ..SkillMastery::new("u", "PA.I.B.K1")
        }
    }

    #[test]
    fn delta_formulas() {
        assert!((delta_for(Outcome::Pass, 1.0) - 0.8).abs() < 1e-9);
        assert!((delta_for(Outcome::Pass, 0.0) - 0.4).abs() < 1e-9);
        assert!((delta_for(Outcome::Probe, 1.0) - 0.2).abs() < 1e-9);
        assert!((delta_for(Outcome::Probe, 0.0) - 0.05).abs() < 1e-9);
        assert!((delta_for(Outcome::Remediate, 1.0) + 0.7).abs() < 1e-9);
        assert!((delta_for(Outcome::Fail, 0.9) + 0.96).abs() < 1e-9);
    }

    #[test]
    fn delta_clamps_wild_confidence() {
        assert!((delta_for(Outcome::Pass, 42.0) - 0.8).abs() < 1e-9);
        assert!((delta_for(Outcome::Fail, f64::NAN) + 0.6).abs() < 1e-9);
    }

    #[test]
    fn mastery_never_leaves_bounds() {
        let (low, _) = apply_verdict(&skill(0.1), &verdict(Outcome::Fail, 1.0), Utc::now());
        assert_eq!(low.mastery, MASTERY_MIN);

        let (high, _) = apply_verdict(&skill(4.9), &verdict(Outcome::Pass, 1.0), Utc::now());
        assert_eq!(high.mastery, MASTERY_MAX);
    }

    #[test]
    fn mastery_stays_in_bounds_across_grid() {
        for m in [0.0, 1.25, 2.5, 3.75, 5.0] {
            for c in [0.0, 0.25, 0.5, 0.75, 1.0] {
                for outcome in [
                    Outcome::Pass,
                    Outcome::Probe,
                    Outcome::Remediate,
                    Outcome::Fail,
                ] {
                    let (next, _) =
                        apply_verdict(&skill(m), &verdict(outcome, c), Utc::now());
                    assert!(
                        (MASTERY_MIN..=MASTERY_MAX).contains(&next.mastery),
                        "mastery {m} + {outcome}@{c} escaped bounds: {}",
                        next.mastery
                    );
                }
            }
        }
    }

    #[test]
    fn pass_increments_pass_counter_only() {
        let (next, delta) = apply_verdict(&skill(2.0), &verdict(Outcome::Pass, 0.5), Utc::now());
        assert_eq!(next.attempts, 1);
        assert_eq!(next.passes, 1);
        assert_eq!(next.fails, 0);
        assert!((delta - 0.6).abs() < 1e-9);
    }

    #[test]
    fn probe_counts_toward_fail_bucket() {
        let (next, _) = apply_verdict(&skill(2.0), &verdict(Outcome::Probe, 0.5), Utc::now());
        assert_eq!(next.attempts, 1);
        assert_eq!(next.passes, 0);
        assert_eq!(next.fails, 1);
    }

    #[test]
    fn counters_accumulate() {
        let start = skill(2.0);
        let (a, _) = apply_verdict(&start, &verdict(Outcome::Pass, 0.5), Utc::now());
        let (b, _) = apply_verdict(&a, &verdict(Outcome::Fail, 0.5), Utc::now());
        assert_eq!(b.attempts, 2);
        assert_eq!(b.passes, 1);
        assert_eq!(b.fails, 1);
    }
}
