use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

#[derive(Debug, Error)]
pub enum LlmError {
    /// Unknown provider, missing credential, or an unreadable credentials file.
    #[error("{0}")]
    Configuration(String),

    /// Anything that went wrong talking to the remote provider.
    #[error("{0}")]
    Provider(String),
}

impl LlmError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn is_provider(&self) -> bool {
        matches!(self, Self::Provider(_))
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        Self::Provider(e.to_string())
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(e: serde_json::Error) -> Self {
        Self::Provider(format!("unexpected response format: {e}"))
    }
}
