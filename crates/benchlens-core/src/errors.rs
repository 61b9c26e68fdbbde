use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ConfigError(pub String);

/// Failure talking to a benchmark source.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("benchmark source unreachable: {0}")]
    Transport(String),
    #[error("benchmark source returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("failed to decode source response: {0}")]
    Decode(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<SourceError>,
    },
}

impl SourceError {
    /// Whether retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Transport(_) => true,
            SourceError::Http { status, .. } => *status >= 500 || *status == 429,
            SourceError::NotFound(_)
            | SourceError::Decode(_)
            | SourceError::Storage(_)
            | SourceError::Exhausted { .. } => false,
        }
    }

    /// True for failures where the source could not be reached at all, as
    /// opposed to answering with a definite "no".
    pub fn is_connection_failure(&self) -> bool {
        match self {
            SourceError::Exhausted { last, .. } => last.is_connection_failure(),
            other => other.is_transient(),
        }
    }
}

impl From<anyhow::Error> for SourceError {
    fn from(e: anyhow::Error) -> Self {
        SourceError::Storage(format!("{e:#}"))
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SourceError::Decode(e.to_string())
        } else if e.is_timeout() {
            SourceError::Transport(format!("request timed out: {e}"))
        } else {
            SourceError::Transport(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SourceError::Transport("reset".into()).is_transient());
        assert!(SourceError::Http {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(SourceError::Http {
            status: 429,
            body: String::new()
        }
        .is_transient());
        assert!(!SourceError::Http {
            status: 400,
            body: String::new()
        }
        .is_transient());
        assert!(!SourceError::NotFound("benchmark 1".into()).is_transient());
    }

    #[test]
    fn test_exhausted_keeps_cause() {
        let e = SourceError::Exhausted {
            attempts: 3,
            last: Box::new(SourceError::Transport("refused".into())),
        };
        assert!(!e.is_transient());
        assert!(e.is_connection_failure());
        assert!(e.to_string().contains("refused"));
    }
}
