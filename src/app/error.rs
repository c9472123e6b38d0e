use thiserror::Error;

#[derive(Error, Debug)]
pub enum MagpieError {
    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Blocked by target site: {0}")]
    Blocked(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("In-page script failed: {0}")]
    Execution(String),

    #[error("Browser session crashed: {0}")]
    SessionCrash(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Targets file error: {0}")]
    TargetsFile(String),

    #[error("Duplicate target id in merged results: {0}")]
    MergeCollision(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl MagpieError {
    /// Whether the retry wrapper may attempt this operation again.
    ///
    /// Navigation rejections, explicit blocks and dead sessions are fatal for
    /// the current target; structural misses and script hiccups are transient.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MagpieError::ElementNotFound(_) | MagpieError::Execution(_)
        )
    }

    /// Short failure classification recorded in the run log.
    pub fn failure_kind(&self) -> &'static str {
        match self {
            MagpieError::Navigation(_) => "navigation",
            MagpieError::Blocked(_) => "blocked",
            MagpieError::ElementNotFound(_) => "element_not_found",
            MagpieError::Execution(_) => "execution",
            MagpieError::SessionCrash(_) => "session_crash",
            MagpieError::Browser(_) => "browser",
            MagpieError::InvalidUrl(_) => "invalid_url",
            MagpieError::Io(_) => "io",
            MagpieError::Serialize(_) => "serialize",
            MagpieError::TargetsFile(_) => "targets_file",
            MagpieError::MergeCollision(_) => "merge_collision",
            MagpieError::Config(_) => "config",
            MagpieError::Other(_) => "other",
        }
    }
}

pub type Result<T> = std::result::Result<T, MagpieError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(MagpieError::ElementNotFound("panel".into()).is_retryable());
        assert!(MagpieError::Execution("script".into()).is_retryable());
        assert!(!MagpieError::Navigation("404".into()).is_retryable());
        assert!(!MagpieError::Blocked("captcha".into()).is_retryable());
        assert!(!MagpieError::SessionCrash("gone".into()).is_retryable());
    }

    #[test]
    fn test_failure_kind_labels() {
        assert_eq!(MagpieError::Blocked("x".into()).failure_kind(), "blocked");
        assert_eq!(
            MagpieError::SessionCrash("x".into()).failure_kind(),
            "session_crash"
        );
    }
}
