// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Deterministic generators for engagement sequences.
//!
//! Tests need varied-but-reproducible inputs, so selection uses the
//! golden-ratio multiplier instead of a seeded RNG.

/// Generate `n` distinct user ids.
pub fn user_ids(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("user_{i}")).collect()
}

/// Reaction vocabulary used across sequence tests.
pub fn reaction_types() -> Vec<&'static str> {
    vec!["like", "love", "laugh", "angry"]
}

/// Deterministic choice in `0..choices` for a sequence index.
pub fn pick(index: usize, choices: usize) -> usize {
    assert!(choices > 0);
    let phase = ((index as f64 + 1.0) * 0.618033988749895) % 1.0;
    ((phase * choices as f64) as usize).min(choices - 1)
}
