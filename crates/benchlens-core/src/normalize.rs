//! Latency unit normalization.
//!
//! Older rows store latency in seconds, current rows in milliseconds, and no
//! schema version tells them apart. Anything below [`SECONDS_CUTOFF`] is read
//! as seconds. A genuinely sub-second latency recorded in milliseconds is
//! therefore over-reported by a factor of 1000; this is a known imprecision
//! kept for compatibility with existing data.

use crate::model::{PromptResult, Run};

pub const SECONDS_CUTOFF: f64 = 1000.0;

/// Returns the latency in milliseconds. Non-finite and negative inputs
/// contribute nothing.
pub fn latency_ms(raw: f64) -> f64 {
    if !raw.is_finite() || raw <= 0.0 {
        return 0.0;
    }
    if raw < SECONDS_CUTOFF {
        raw * 1000.0
    } else {
        raw
    }
}

/// Sum of normalized latencies over prompts that carry a response.
pub fn derived_latency_ms<'a, I>(prompts: I) -> f64
where
    I: IntoIterator<Item = &'a PromptResult>,
{
    prompts
        .into_iter()
        .filter(|p| p.has_response())
        .map(|p| latency_ms(p.latency))
        .sum()
}

/// Run-level latency, derived from the prompts when the rollup is missing.
pub fn run_latency_ms(run: &Run) -> f64 {
    let stored = latency_ms(run.latency);
    if stored > 0.0 {
        stored
    } else {
        derived_latency_ms(&run.prompts)
    }
}
