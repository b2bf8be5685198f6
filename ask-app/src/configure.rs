//! Interactive API key setup for `ask --configure`.
//!
//! Prompts for each provider key, keeps the stored value on a blank answer, and
//! rewrites the credentials file. Environment variables are never copied into
//! the file.

use anyhow::Result;
use ask_llm::{CredentialStore, ProviderKind};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

const PREVIEW_CHARS: usize = 10;

pub async fn run<R, W>(store: &CredentialStore, input: R, mut out: W) -> Result<PathBuf>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut creds = store.load_persisted().await?;
    let mut lines = input.lines();

    out.write_all(b"=== AI CLI Configuration ===\n\n").await?;
    out.write_all(b"Enter your API keys (press Enter to skip):\n\n").await?;

    for provider in ProviderKind::ALL {
        let prompt = format!(
            "{} API Key [{}...]: ",
            provider.display_name(),
            preview(creds.get(provider))
        );
        out.write_all(prompt.as_bytes()).await?;
        out.flush().await?;

        let answer = lines.next_line().await?.unwrap_or_default();
        let answer = answer.trim();
        if !answer.is_empty() {
            creds.set(provider, answer);
            tracing::debug!(provider = %provider, "api key updated");
        }
    }

    store.save(&creds).await?;
    let saved = format!("\n✓ Configuration saved to {}\n", store.path().display());
    out.write_all(saved.as_bytes()).await?;
    out.flush().await?;
    Ok(store.path().to_path_buf())
}

fn preview(secret: &str) -> String {
    secret.chars().take(PREVIEW_CHARS).collect()
}
