//! Interactive chat loop.
//!
//! Reads one line at a time; `exit`/`quit` end the loop, `clear` resets the
//! transcript, anything else is sent to the provider.

use ask_llm::{Conversation, ProviderKind};
use async_trait::async_trait;
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// What the loop needs from a conversation.
#[async_trait]
pub trait Chat: Send {
    fn provider(&self) -> ProviderKind;
    fn model(&self) -> &str;
    async fn send(&mut self, message: &str) -> ask_llm::Result<String>;
    fn clear(&mut self);
}

#[async_trait]
impl Chat for Conversation {
    fn provider(&self) -> ProviderKind {
        Conversation::provider(self)
    }

    fn model(&self) -> &str {
        Conversation::model(self)
    }

    async fn send(&mut self, message: &str) -> ask_llm::Result<String> {
        Conversation::send(self, message).await
    }

    fn clear(&mut self) {
        Conversation::clear(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// `exit`, `quit`, or end of input.
    Quit,
    Interrupted,
}

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Quit,
    Clear,
    Message(&'a str),
}

fn parse_line(line: &str) -> Option<Command<'_>> {
    let input = line.trim();
    if input.is_empty() {
        return None;
    }
    match input.to_lowercase().as_str() {
        "exit" | "quit" => Some(Command::Quit),
        "clear" => Some(Command::Clear),
        _ => Some(Command::Message(input)),
    }
}

pub async fn run<C, R, W, F>(chat: &mut C, input: R, mut out: W, interrupt: F) -> anyhow::Result<Exit>
where
    C: Chat + ?Sized,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    F: Future<Output = ()>,
{
    tokio::pin!(interrupt);
    let mut lines = input.lines();

    let banner = format!(
        "\n=== AI Chat ({} - {}) ===\nType 'exit' or 'quit' to end, 'clear' to reset conversation\n",
        chat.provider().as_str().to_uppercase(),
        chat.model()
    );
    out.write_all(banner.as_bytes()).await?;

    loop {
        out.write_all(b"\n You: ").await?;
        out.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut interrupt => {
                out.write_all(b"\n\nGoodbye!\n").await?;
                out.flush().await?;
                return Ok(Exit::Interrupted);
            }
        };
        let Some(line) = line else {
            out.write_all(b"\nGoodbye!\n").await?;
            out.flush().await?;
            return Ok(Exit::Quit);
        };

        let message = match parse_line(&line) {
            None => continue,
            Some(Command::Quit) => {
                out.write_all(b"\nGoodbye!\n").await?;
                out.flush().await?;
                return Ok(Exit::Quit);
            }
            Some(Command::Clear) => {
                chat.clear();
                tracing::debug!("conversation cleared");
                out.write_all("\n✓ Conversation cleared\n".as_bytes()).await?;
                continue;
            }
            Some(Command::Message(m)) => m,
        };

        let result = tokio::select! {
            r = chat.send(message) => r,
            _ = &mut interrupt => {
                out.write_all(b"\n\nGoodbye!\n").await?;
                out.flush().await?;
                return Ok(Exit::Interrupted);
            }
        };
        match result {
            Ok(reply) => {
                out.write_all(format!("\n  AI: {reply}\n").as_bytes()).await?;
            }
            Err(e) => {
                tracing::debug!(error = %e, "chat turn failed");
                out.write_all(format!("\nError: {e}\n").as_bytes()).await?;
            }
        }
    }
}
