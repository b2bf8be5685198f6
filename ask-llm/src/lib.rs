//! Provider adapters, credential store and conversation state for `ask`.
//!
//! Pure HTTP clients for Gemini, OpenAI, Anthropic and Groq behind one
//! [`ChatProvider`] contract.

mod anthropic;
mod client;
mod credentials;
mod error;
mod gemini;
mod openai;
mod session;
mod types;

#[cfg(test)]
mod test_support;

pub use client::{ChatProvider, Conversation, ProviderHandle, ProviderKind};
pub use credentials::{CONFIG_PATH_ENV, CredentialStore, Credentials, default_credentials_path};
pub use error::{LlmError, Result};
pub use session::Session;
pub use types::{Role, Turn};
