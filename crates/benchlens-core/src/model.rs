use serde::{Deserialize, Serialize};

/// Response prefix older backends used to flag a failed model call.
/// Only consulted when a record carries no explicit outcome tag.
pub const LEGACY_ERROR_MARKER: &str = "ERROR";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Benchmark {
    pub id: i64,
    #[serde(default, alias = "name")]
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub status: PersistedStatus,
    /// Backend-maintained counters. Informational only, may lag the runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_prompts: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_prompts: Option<u64>,
    #[serde(default)]
    pub runs: Vec<Run>,
}

/// The status column as stored by the backend executor. It is written
/// asynchronously and can be stale in either direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PersistedStatus {
    Running,
    Completed,
    Failed,
    #[default]
    Unknown,
}

impl PersistedStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "running" | "in_progress" | "in-progress" | "pending" => PersistedStatus::Running,
            "completed" | "complete" | "done" | "finished" => PersistedStatus::Completed,
            "failed" | "error" => PersistedStatus::Failed,
            _ => PersistedStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PersistedStatus::Running => "running",
            PersistedStatus::Completed => "completed",
            PersistedStatus::Failed => "failed",
            PersistedStatus::Unknown => "unknown",
        }
    }

    /// True when the backend still claims work is happening. An unknown
    /// status carries no information, so it is treated as active.
    pub fn is_active(&self) -> bool {
        matches!(self, PersistedStatus::Running | PersistedStatus::Unknown)
    }
}

impl From<String> for PersistedStatus {
    fn from(s: String) -> Self {
        PersistedStatus::parse(&s)
    }
}

impl From<PersistedStatus> for String {
    fn from(s: PersistedStatus) -> Self {
        s.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub standard_input: u64,
    pub cached_input: u64,
    pub output: u64,
}

impl TokenUsage {
    /// Sums saturate: corrupt counts near `u64::MAX` must not abort a pass.
    pub fn total(&self) -> u64 {
        self.standard_input
            .saturating_add(self.cached_input)
            .saturating_add(self.output)
    }

    pub fn is_zero(&self) -> bool {
        self.total() == 0
    }

    pub fn add(&mut self, other: &TokenUsage) {
        self.standard_input = self.standard_input.saturating_add(other.standard_input);
        self.cached_input = self.cached_input.saturating_add(other.cached_input);
        self.output = self.output.saturating_add(other.output);
    }
}

/// One stored execution attempt for a (model, provider) pair. Several runs
/// for the same pair are fragments of a single logical run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Run {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(alias = "model")]
    pub model_name: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default, deserialize_with = "lenient::f64")]
    pub total_cost: f64,
    #[serde(default, deserialize_with = "lenient::u64")]
    pub standard_input_tokens: u64,
    #[serde(default, deserialize_with = "lenient::u64")]
    pub cached_input_tokens: u64,
    #[serde(default, deserialize_with = "lenient::u64")]
    pub output_tokens: u64,
    /// Seconds on legacy rows, milliseconds on current ones.
    #[serde(default, deserialize_with = "lenient::f64")]
    pub latency: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_status: Option<String>,
    #[serde(default)]
    pub prompts: Vec<PromptResult>,
}

impl Run {
    pub fn tokens(&self) -> TokenUsage {
        TokenUsage {
            standard_input: self.standard_input_tokens,
            cached_input: self.cached_input_tokens,
            output: self.output_tokens,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptOutcome {
    Success,
    Error,
    Pending,
}

impl PromptOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PromptOutcome::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptOutcome::Success => "success",
            PromptOutcome::Error => "error",
            PromptOutcome::Pending => "pending",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptResult {
    /// Row id, usable to request a re-execution of this prompt.
    #[serde(default, alias = "prompt_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(alias = "prompt_text")]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, deserialize_with = "lenient::f64")]
    pub cost: f64,
    #[serde(default, deserialize_with = "lenient::u64")]
    pub standard_input_tokens: u64,
    #[serde(default, deserialize_with = "lenient::u64")]
    pub cached_input_tokens: u64,
    #[serde(default, deserialize_with = "lenient::u64")]
    pub output_tokens: u64,
    #[serde(default, deserialize_with = "lenient::f64")]
    pub latency: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<PromptOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_search_used: Option<bool>,
}

impl PromptResult {
    pub fn tokens(&self) -> TokenUsage {
        TokenUsage {
            standard_input: self.standard_input_tokens,
            cached_input: self.cached_input_tokens,
            output: self.output_tokens,
        }
    }

    pub fn has_response(&self) -> bool {
        self.response
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty())
    }

    /// Resolves the outcome of this attempt.
    ///
    /// An explicit `outcome` tag always wins. Untagged rows fall back to the
    /// legacy convention: an `error` field or an `ERROR`-prefixed response is
    /// a terminal error, any other non-empty response is a success.
    pub fn outcome(&self) -> PromptOutcome {
        if let Some(tag) = self.outcome {
            return tag;
        }
        if self.error.as_deref().is_some_and(|e| !e.trim().is_empty()) {
            return PromptOutcome::Error;
        }
        match self.response.as_deref().map(str::trim_start) {
            Some(r) if r.starts_with(LEGACY_ERROR_MARKER) => PromptOutcome::Error,
            Some(r) if !r.is_empty() => PromptOutcome::Success,
            _ => PromptOutcome::Pending,
        }
    }
}

/// List-level benchmark row, without prompt detail.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BenchmarkSummary {
    pub id: i64,
    #[serde(default, alias = "name")]
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub status: PersistedStatus,
    #[serde(default, deserialize_with = "lenient::u64")]
    pub completed_prompts: u64,
    #[serde(default, deserialize_with = "lenient::u64")]
    pub total_prompts: u64,
}

/// Backend answer to "does this benchmark need a resync?".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SyncStatus {
    pub sync_needed: bool,
    #[serde(default)]
    pub models_needing_sync: Vec<String>,
    #[serde(default, deserialize_with = "lenient::u64")]
    pub total_prompts_to_sync: u64,
}

/// Deserializers that degrade malformed numeric fields to zero instead of
/// failing the whole record.
pub mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn f64<'de, D>(d: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = Option::<Value>::deserialize(d)?;
        let n = match v {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        };
        Ok(if n.is_finite() { n } else { 0.0 })
    }

    pub fn u64<'de, D>(d: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = Option::<Value>::deserialize(d)?;
        Ok(match v {
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
                .unwrap_or(0),
            Some(Value::String(s)) => s.trim().parse::<u64>().unwrap_or(0),
            _ => 0,
        })
    }
}
