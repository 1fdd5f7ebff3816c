//! Offline rule-based grading oracle.
//!
//! Grades answers with fixed heuristics: red-flag phrase scan, checks for
//! definition/source/process/safety structure, and word-count thresholds. No
//! network, deterministic, useful for local practice and as a fallback when
//! no API key is configured.
//!
//! Replies are emitted as the standard verdict JSON so they flow through the
//! same parse boundary as real oracle output.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use checkride_core::traits::{GradingOracle, OracleRequest};
use checkride_core::verdict::{Outcome, Verdict};

/// Phrases that signal unsafe reasoning and fail the answer outright.
const RED_FLAG_PHRASES: &[&str] = &[
    "doesn't matter",
    "doesnt matter",
    "optional",
    "ignore",
    "always fine",
    "never check",
    "skip checklist",
    "don't check",
    "dont check",
];

static DEFINITION: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\b(is|means|defined as|definition)\b",
        r"\b(a|an)\b.+\bthat\b",
    ])
});
static SOURCE: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\b(far|14 cfr|regulation|aim|acs|afh|poh|fih)\b",
        r"\b(section|part)\b\s*\d+",
    ])
});
static PROCESS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\b(first|then|next|after|before|finally)\b",
        r"\b(step|procedure|checklist|sequence)\b",
    ])
});
static SAFETY: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\b(risk|hazard|mitigate|mitigation|safe|safety|go/no-go)\b",
        r"\b(minimums|weather|currency|airworthiness)\b",
    ])
});

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
}

fn matches_any(text: &str, patterns: &[Regex]) -> bool {
    patterns.iter().any(|p| p.is_match(text))
}

/// Deterministic heuristic grading oracle.
pub struct RuleOracle;

impl RuleOracle {
    /// Grade an answer against the structural rubric.
    fn grade(answer: &str, acs_task_code: &str) -> Verdict {
        let raw = answer.trim();
        let lower = raw.to_lowercase();
        let words = raw.split_whitespace().count();

        let red_flag = RED_FLAG_PHRASES.iter().any(|p| lower.contains(p));

        let mut missing_points = Vec::new();
        if !matches_any(&lower, &DEFINITION) {
            missing_points.push("State a crisp definition first.".to_string());
        }
        if !matches_any(&lower, &SOURCE) {
            missing_points.push("Cite a source (FAR/AIM/ACS/POH) for authority.".to_string());
        }
        if !matches_any(&lower, &PROCESS) {
            missing_points.push("Give step-by-step process in order.".to_string());
        }
        if !matches_any(&lower, &SAFETY) {
            missing_points.push("Explain safety risk and mitigation.".to_string());
        }

        let (outcome, confidence, feedback) = if red_flag {
            (
                Outcome::Fail,
                0.9,
                "Unsafe reasoning detected. Re-answer with explicit legal source, \
                 checklist process, and risk controls.",
            )
        } else if words < 18 || missing_points.len() >= 3 {
            (
                Outcome::Remediate,
                0.82,
                "Answer is too thin for checkride depth. Rebuild it with definition, \
                 authority, process, and safety implications.",
            )
        } else if words < 40 || !missing_points.is_empty() {
            (
                Outcome::Probe,
                0.66,
                "Partially correct. Add missing structure and be more specific with \
                 source and risk reasoning.",
            )
        } else {
            (
                Outcome::Pass,
                0.72,
                "Solid structure. Keep tightening references and keep your process \
                 safety-first.",
            )
        };

        let probe_focus = missing_points.first().map(String::as_str).unwrap_or(
            "Tighten your answer with clearer source, ordered process, and risk mitigation.",
        );
        let probe_question = format!(
            "Follow-up on {acs_task_code}: {probe_focus} In 4-6 sentences, answer using \
             definition -> source -> process -> safety/risk."
        );

        Verdict {
            outcome,
            confidence,
            feedback: feedback.to_string(),
            missing_points,
            probe_question: Some(probe_question),
            acs_task_code: acs_task_code.to_string(),
        }
    }
}

#[async_trait]
impl GradingOracle for RuleOracle {
    fn name(&self) -> &str {
        "rules"
    }

    async fn complete(&self, request: &OracleRequest) -> anyhow::Result<String> {
        let verdict = Self::grade(&request.answer, &request.acs_task_code);
        Ok(serde_json::to_string(&verdict)?)
    }
}
