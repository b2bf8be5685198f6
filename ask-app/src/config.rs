//! Environment-driven settings for the `ask` binary.
//!
//! API keys are handled by `ask_llm::CredentialStore`; this module only covers
//! process-level knobs.

use ask_llm::ProviderKind;

pub const LOG_FORMAT_ENV: &str = "ASK_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn from_env() -> anyhow::Result<Self> {
        match std::env::var(LOG_FORMAT_ENV) {
            Ok(v) => Self::parse(&v),
            Err(_) => Ok(Self::Compact),
        }
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(anyhow::anyhow!(
                "unsupported {LOG_FORMAT_ENV}={other:?}; expected one of: compact, pretty, json"
            )),
        }
    }
}

/// API root override for `provider` from `ASK_<PROVIDER>_BASE_URL`, if set.
pub fn base_url_override(provider: &str) -> Option<String> {
    let kind: ProviderKind = provider.parse().ok()?;
    base_url_override_with(kind, |name| std::env::var(name).ok())
}

fn base_url_override_with<F>(kind: ProviderKind, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(kind.base_url_env_var()).filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parsing() {
        assert_eq!(LogFormat::parse("").ok(), Some(LogFormat::Compact));
        assert_eq!(LogFormat::parse("JSON").ok(), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse(" pretty ").ok(), Some(LogFormat::Pretty));
        assert!(LogFormat::parse("xml").is_err());
    }

    #[test]
    fn base_url_override_reads_provider_specific_variable() {
        let lookup = |name: &str| {
            (name == "ASK_GROQ_BASE_URL").then(|| "http://localhost:8080/v1".to_string())
        };
        assert_eq!(
            base_url_override_with(ProviderKind::Groq, lookup).as_deref(),
            Some("http://localhost:8080/v1")
        );
        assert_eq!(base_url_override_with(ProviderKind::OpenAi, lookup), None);
    }

    #[test]
    fn blank_override_is_ignored() {
        let lookup = |_: &str| Some("  ".to_string());
        assert_eq!(base_url_override_with(ProviderKind::Gemini, lookup), None);
    }
}
