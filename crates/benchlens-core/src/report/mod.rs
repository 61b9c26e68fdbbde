pub mod console;

use crate::reconcile::ReconciledBenchmarkView;

/// Pretty-printed JSON form of a view, as served to tooling.
pub fn render_json(view: &ReconciledBenchmarkView) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(view)?)
}
