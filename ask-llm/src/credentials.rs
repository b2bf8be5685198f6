//! Per-user API key store.
//!
//! Keys live in a flat JSON object at `~/.ai_cli_config.json`. Missing keys fall
//! back to the provider's environment variable.

use crate::client::ProviderKind;
use crate::error::{LlmError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "ASK_CONFIG_PATH";
const CONFIG_FILE_NAME: &str = ".ai_cli_config.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anthropic_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groq_api_key: Option<String>,
    /// Keys this client does not manage, kept so a save does not drop them.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Credentials {
    /// Returns the secret for `provider`, or an empty string when none is set.
    pub fn get(&self, provider: ProviderKind) -> &str {
        let value = self.slot(provider).as_deref().unwrap_or("");
        if value.trim().is_empty() { "" } else { value }
    }

    pub fn set(&mut self, provider: ProviderKind, secret: impl Into<String>) {
        *self.slot_mut(provider) = Some(secret.into());
    }

    pub fn contains(&self, provider: ProviderKind) -> bool {
        self.slot(provider).is_some()
    }

    /// Fills every absent key from `lookup(env_var)`, or with an empty string.
    pub fn fill_missing_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for provider in ProviderKind::ALL {
            let slot = self.slot_mut(provider);
            if slot.is_none() {
                *slot = Some(lookup(provider.env_var()).unwrap_or_default());
            }
        }
    }

    fn slot(&self, provider: ProviderKind) -> &Option<String> {
        match provider {
            ProviderKind::Gemini => &self.gemini_api_key,
            ProviderKind::OpenAi => &self.openai_api_key,
            ProviderKind::Anthropic => &self.anthropic_api_key,
            ProviderKind::Groq => &self.groq_api_key,
        }
    }

    fn slot_mut(&mut self, provider: ProviderKind) -> &mut Option<String> {
        match provider {
            ProviderKind::Gemini => &mut self.gemini_api_key,
            ProviderKind::OpenAi => &mut self.openai_api_key,
            ProviderKind::Anthropic => &mut self.anthropic_api_key,
            ProviderKind::Groq => &mut self.groq_api_key,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `$ASK_CONFIG_PATH`, or `~/.ai_cli_config.json`.
    pub fn open_default() -> Self {
        Self::new(default_credentials_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persisted keys merged with the process environment.
    pub async fn load(&self) -> Result<Credentials> {
        self.load_with(|name| std::env::var(name).ok()).await
    }

    pub async fn load_with<F>(&self, lookup: F) -> Result<Credentials>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut creds = self.load_persisted().await?;
        creds.fill_missing_with(lookup);
        Ok(creds)
    }

    /// File contents only. A missing file is an empty mapping.
    #[tracing::instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    pub async fn load_persisted(&self) -> Result<Credentials> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(v) => v,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("credentials file not found; using empty mapping");
                return Ok(Credentials::default());
            }
            Err(e) => {
                return Err(LlmError::Configuration(format!(
                    "read credentials {}: {e}",
                    self.path.display()
                )));
            }
        };
        if contents.trim().is_empty() {
            return Ok(Credentials::default());
        }
        serde_json::from_str(&contents).map_err(|e| {
            LlmError::Configuration(format!("parse credentials {}: {e}", self.path.display()))
        })
    }

    /// Overwrites the file with `creds`, readable and writable by the owner only.
    ///
    /// Contents are written to a sibling temp file and renamed into place.
    #[tracing::instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    pub async fn save(&self, creds: &Credentials) -> Result<()> {
        let body = serde_json::to_string_pretty(creds).map_err(|e| {
            LlmError::Configuration(format!("serialize credentials: {e}"))
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                LlmError::Configuration(format!("create config dir {}: {e}", parent.display()))
            })?;
        }

        let tmp_path = self.temp_path();
        if let Err(e) = write_private(&tmp_path, body.as_bytes()).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(LlmError::Configuration(format!(
                "write credentials {}: {e}",
                tmp_path.display()
            )));
        }
        if let Err(e) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(LlmError::Configuration(format!(
                "replace credentials {}: {e}",
                self.path.display()
            )));
        }

        tracing::info!("credentials saved");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| CONFIG_FILE_NAME.into());
        name.push(format!(".tmp-{}", std::process::id()));
        self.path.with_file_name(name)
    }
}

async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;

    // `mode` only applies on creation; a stale temp file keeps its old bits.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    Ok(())
}

pub fn default_credentials_path() -> PathBuf {
    if let Ok(v) = std::env::var(CONFIG_PATH_ENV) {
        if !v.trim().is_empty() {
            return PathBuf::from(v);
        }
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(CONFIG_FILE_NAME)
}
