//! Grading verdicts and the strict parse boundary for oracle replies.
//!
//! The oracle is instructed to return a fixed JSON shape, but its output is
//! free text and is never trusted. [`parse_verdict`] is the single place
//! where that text becomes a typed [`Verdict`] or an explicit parse failure.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Grading outcome, in ascending severity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Pass,
    Probe,
    Remediate,
    Fail,
}

impl Outcome {
    /// Whether this outcome passes the question outright.
    pub fn is_pass(&self) -> bool {
        matches!(self, Outcome::Pass)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pass => write!(f, "PASS"),
            Outcome::Probe => write!(f, "PROBE"),
            Outcome::Remediate => write!(f, "REMEDIATE"),
            Outcome::Fail => write!(f, "FAIL"),
        }
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PASS" => Ok(Outcome::Pass),
            "PROBE" => Ok(Outcome::Probe),
            "REMEDIATE" => Ok(Outcome::Remediate),
            "FAIL" => Ok(Outcome::Fail),
            other => Err(format!("unknown outcome: {other}")),
        }
    }
}

/// A structured grading verdict for one answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    /// Grading outcome.
    #[serde(rename = "result")]
    pub outcome: Outcome,
    /// Oracle confidence, clamped to [0, 1].
    pub confidence: f64,
    /// Human-readable feedback for the examinee.
    pub feedback: String,
    /// Rubric points the answer missed.
    pub missing_points: Vec<String>,
    /// Follow-up probe question proposed by the oracle.
    pub probe_question: Option<String>,
    /// ACS task code the answer was graded against.
    pub acs_task_code: String,
}

impl Verdict {
    /// Deterministic verdict returned when evaluation cannot produce one.
    ///
    /// Outcome PROBE at zero confidence keeps the session moving without
    /// rewarding or punishing the answer.
    pub fn fallback(acs_task_code: &str) -> Self {
        Self {
            outcome: Outcome::Probe,
            confidence: 0.0,
            feedback: "Automatic evaluation was unavailable for this answer. \
                       Expect a follow-up question on the same task."
                .to_string(),
            missing_points: Vec::new(),
            probe_question: None,
            acs_task_code: acs_task_code.to_string(),
        }
    }
}

/// Why an oracle reply failed to parse into a [`Verdict`].
#[derive(Debug, Error)]
pub enum VerdictParseError {
    /// The reply contained no parseable JSON object.
    #[error("reply is not valid JSON")]
    NotJson,
    /// A required field was missing or had the wrong type.
    #[error("invalid or missing field: {0}")]
    InvalidField(&'static str),
}

/// Clamp a confidence value into [0, 1]; non-finite values collapse to 0.
pub fn clamp01(n: f64) -> f64 {
    if !n.is_finite() {
        return 0.0;
    }
    n.clamp(0.0, 1.0)
}

/// Strip a markdown code fence wrapping the JSON payload, if present.
///
/// Oracles occasionally wrap their reply in ```json fences despite being
/// told not to; the payload inside is still worth a parse attempt.
fn extract_json_payload(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag on the opening fence line.
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => return trimmed,
    };
    body.trim_end()
        .strip_suffix("```")
        .map(str::trim)
        .unwrap_or(body.trim())
}

/// Parse an oracle reply into a validated [`Verdict`].
///
/// Every field is checked: outcome must be one of the four enum values,
/// confidence is coerced to a number and clamped (missing or unparseable
/// values collapse to 0.0), feedback must be non-empty after trimming,
/// missing points are trimmed with empties dropped, and the probe question
/// collapses to `None` unless it has real content.
pub fn parse_verdict(raw: &str) -> Result<Verdict, VerdictParseError> {
    let payload = extract_json_payload(raw);
    let value: serde_json::Value =
        serde_json::from_str(payload).map_err(|_| VerdictParseError::NotJson)?;
    let obj = value.as_object().ok_or(VerdictParseError::NotJson)?;

    let outcome = obj
        .get("result")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<Outcome>().ok())
        .ok_or(VerdictParseError::InvalidField("result"))?;

    // A missing or unparseable confidence collapses to 0.0 instead of
    // failing the parse.
    let confidence = match obj.get("confidence") {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };

    let feedback = obj
        .get("feedback")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(VerdictParseError::InvalidField("feedback"))?;

    let missing_points = obj
        .get("missing_points")
        .and_then(|v| v.as_array())
        .ok_or(VerdictParseError::InvalidField("missing_points"))?
        .iter()
        .map(|v| {
            v.as_str()
                .ok_or(VerdictParseError::InvalidField("missing_points"))
        })
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let probe_question = match obj.get("probe_question") {
        Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                Some(s.to_string())
            }
        }
        _ => return Err(VerdictParseError::InvalidField("probe_question")),
    };

    let acs_task_code = obj
        .get("acs_task_code")
        .and_then(|v| v.as_str())
        .ok_or(VerdictParseError::InvalidField("acs_task_code"))?
        .trim()
        .to_string();

    Ok(Verdict {
        outcome,
        confidence: clamp01(confidence),
        feedback: feedback.to_string(),
        missing_points,
        probe_question,
        acs_task_code,
    })
}
