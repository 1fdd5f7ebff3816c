//! Base question selection with repeat avoidance.
//!
//! Picks uniformly at random among questions not recently served; when the
//! exclusion list has eaten the whole bank, repeats are preferable to a dead
//! end, so selection falls back to the full mode bank.

use rand::seq::IndexedRandom;
use rand::Rng;

use crate::model::Question;

/// Choose a base question for a mode.
///
/// `bank` must already be filtered to the session's mode. Returns `None` only
/// when the bank itself is empty, which callers surface as a content
/// configuration error.
pub fn select_base<'a, R: Rng + ?Sized>(
    bank: &'a [Question],
    recent_ids: &[String],
    rng: &mut R,
) -> Option<&'a Question> {
    let eligible: Vec<&Question> = bank
        .iter()
        .filter(|q| !recent_ids.iter().any(|id| id == &q.id))
        .collect();

    if let Some(&question) = eligible.choose(rng) {
        return Some(question);
    }

    // Everything was recently served; allow repeats rather than stall.
    bank.choose(rng)
}
