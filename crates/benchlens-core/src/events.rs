use anyhow::Context;
use serde::{Deserialize, Serialize};

/// A push notification from the backend executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PushEvent {
    /// A model made progress (or finished) on a benchmark.
    Progress {
        benchmark_id: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model_name: Option<String>,
        status: String,
    },
    /// The whole benchmark finished.
    Completion { benchmark_id: i64 },
}

impl PushEvent {
    pub fn benchmark_id(&self) -> i64 {
        match self {
            PushEvent::Progress { benchmark_id, .. } | PushEvent::Completion { benchmark_id } => {
                *benchmark_id
            }
        }
    }

    /// Parses one JSON line of an event stream.
    pub fn parse_line(line: &str) -> anyhow::Result<Self> {
        serde_json::from_str(line.trim())
            .with_context(|| format!("invalid push event: {}", line.trim()))
    }
}
