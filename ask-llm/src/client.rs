use crate::anthropic::AnthropicClient;
use crate::credentials::Credentials;
use crate::error::{LlmError, Result};
use crate::gemini::GeminiClient;
use crate::openai::OpenAiClient;
use crate::session::Session;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    Anthropic,
    Groq,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Gemini,
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Groq,
    ];

    pub const NAMES: [&'static str; 4] = ["gemini", "openai", "anthropic", "groq"];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Groq => "groq",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "Gemini",
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Anthropic => "Anthropic",
            ProviderKind::Groq => "Groq",
        }
    }

    /// Key inside the credentials file.
    pub fn credential_key(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini_api_key",
            ProviderKind::OpenAi => "openai_api_key",
            ProviderKind::Anthropic => "anthropic_api_key",
            ProviderKind::Groq => "groq_api_key",
        }
    }

    pub fn env_var(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::Groq => "GROQ_API_KEY",
        }
    }

    /// Environment variable that points this provider at another API root.
    pub fn base_url_env_var(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "ASK_GEMINI_BASE_URL",
            ProviderKind::OpenAi => "ASK_OPENAI_BASE_URL",
            ProviderKind::Anthropic => "ASK_ANTHROPIC_BASE_URL",
            ProviderKind::Groq => "ASK_GROQ_BASE_URL",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini-pro",
            ProviderKind::OpenAi => "gpt-4-turbo-preview",
            ProviderKind::Anthropic => "claude-3-5-sonnet-20241022",
            ProviderKind::Groq => "llama-3.3-70b-versatile",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com/v1",
            ProviderKind::Groq => "https://api.groq.com/openai/v1",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        ProviderKind::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| LlmError::Configuration(format!("Unknown provider: {}", s.trim())))
    }
}

/// Capability shared by every provider adapter.
///
/// `send` shapes `message` plus whatever history the provider accepts into one
/// request, and records the exchange in `session` the way that provider expects.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn model(&self) -> &str;

    async fn send(
        &self,
        message: &str,
        session: &mut Session,
        system_prompt: Option<&str>,
    ) -> Result<String>;
}

/// A provider client bound to one secret and one model.
#[derive(Clone)]
pub enum ProviderHandle {
    Gemini(GeminiClient),
    OpenAi(OpenAiClient),
    Anthropic(AnthropicClient),
    Groq(OpenAiClient),
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("provider", &self.kind())
            .field("model", &self.model())
            .finish_non_exhaustive()
    }
}

impl ProviderHandle {
    pub fn create(
        credentials: &Credentials,
        selector: &str,
        model_override: Option<&str>,
    ) -> Result<Self> {
        Self::create_with_base_url(credentials, selector, model_override, None)
    }

    /// Like [`ProviderHandle::create`], but targeting `base_url` instead of the
    /// vendor's public API root.
    #[tracing::instrument(level = "debug", skip(credentials))]
    pub fn create_with_base_url(
        credentials: &Credentials,
        selector: &str,
        model_override: Option<&str>,
        base_url: Option<&str>,
    ) -> Result<Self> {
        let kind: ProviderKind = selector.parse()?;

        let api_key = credentials.get(kind);
        if api_key.is_empty() {
            return Err(LlmError::Configuration(format!(
                "{} API key not found. Set {} or run --configure",
                kind.display_name(),
                kind.env_var()
            )));
        }

        let model = model_override
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| kind.default_model());
        let base_url = base_url
            .map(|u| u.trim().trim_end_matches('/'))
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| kind.default_base_url());

        let http = build_http_client();
        let handle = match kind {
            ProviderKind::Gemini => {
                Self::Gemini(GeminiClient::new(http, base_url, api_key, model))
            }
            ProviderKind::OpenAi => {
                Self::OpenAi(OpenAiClient::new(http, kind, base_url, api_key, model))
            }
            ProviderKind::Anthropic => {
                Self::Anthropic(AnthropicClient::new(http, base_url, api_key, model))
            }
            ProviderKind::Groq => {
                Self::Groq(OpenAiClient::new(http, kind, base_url, api_key, model))
            }
        };
        tracing::debug!(provider = %kind, model = %model, %base_url, "provider handle created");
        Ok(handle)
    }

    fn inner(&self) -> &dyn ChatProvider {
        match self {
            Self::Gemini(c) => c,
            Self::OpenAi(c) | Self::Groq(c) => c,
            Self::Anthropic(c) => c,
        }
    }
}

#[async_trait]
impl ChatProvider for ProviderHandle {
    fn kind(&self) -> ProviderKind {
        self.inner().kind()
    }

    fn model(&self) -> &str {
        self.inner().model()
    }

    #[tracing::instrument(level = "info", skip_all, fields(provider = %self.kind(), model = %self.model()))]
    async fn send(
        &self,
        message: &str,
        session: &mut Session,
        system_prompt: Option<&str>,
    ) -> Result<String> {
        self.inner().send(message, session, system_prompt).await
    }
}

fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("ask/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(%e, "reqwest client build failed; falling back to default client");
            reqwest::Client::new()
        })
}

/// One handle, one transcript and an optional system prompt.
#[derive(Debug)]
pub struct Conversation {
    handle: ProviderHandle,
    session: Session,
    system_prompt: Option<String>,
}

impl Conversation {
    pub fn new(handle: ProviderHandle, system_prompt: Option<String>) -> Self {
        Self {
            handle,
            session: Session::new(),
            system_prompt: system_prompt.filter(|s| !s.is_empty()),
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.handle.kind()
    }

    pub fn model(&self) -> &str {
        self.handle.model()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn send(&mut self, message: &str) -> Result<String> {
        self.handle
            .send(message, &mut self.session, self.system_prompt.as_deref())
            .await
    }

    pub fn clear(&mut self) {
        self.session.clear();
    }
}

/// Returns `body` truncated for inclusion in error text.
pub(crate) fn error_body(body: &str) -> &str {
    const MAX: usize = 2000;
    if body.len() <= MAX {
        return body;
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
