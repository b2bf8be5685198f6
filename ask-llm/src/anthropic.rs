use crate::client::{ChatProvider, ProviderKind, error_body};
use crate::error::{LlmError, Result};
use crate::session::Session;
use crate::types::{Role, Turn};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

#[derive(Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            http,
            url: format!("{base_url}/messages"),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    #[tracing::instrument(level = "info", skip_all)]
    async fn complete(&self, req: &AnthropicRequest) -> Result<String> {
        let response = self
            .http
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(req)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Provider(format!(
                "anthropic chat status={status} body={}",
                error_body(&body)
            )));
        }

        let parsed: AnthropicResponse = serde_json::from_str(&body)?;
        parsed.into_reply()
    }
}

#[async_trait]
impl ChatProvider for AnthropicClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn send(
        &self,
        message: &str,
        session: &mut Session,
        system_prompt: Option<&str>,
    ) -> Result<String> {
        let before = session.len();
        session.append(Role::User, message);

        let req = AnthropicRequest::new(&self.model, system_prompt, session.turns());
        match self.complete(&req).await {
            Ok(reply) => {
                session.append(Role::Assistant, reply.clone());
                Ok(reply)
            }
            Err(e) => {
                session.truncate(before);
                Err(e)
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
}

impl AnthropicRequest {
    fn new(model: &str, system_prompt: Option<&str>, turns: &[Turn]) -> Self {
        Self {
            model: model.to_string(),
            max_tokens: MAX_TOKENS,
            system: system_prompt
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            messages: turns
                .iter()
                .map(|t| AnthropicMessage {
                    role: t.role.as_str().to_string(),
                    content: t.content.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl AnthropicResponse {
    fn into_reply(self) -> Result<String> {
        tracing::debug!(
            input_tokens = self.usage.input_tokens,
            output_tokens = self.usage.output_tokens,
            stop_reason = ?self.stop_reason,
            "chat completed"
        );
        match self.content.into_iter().next() {
            Some(AnthropicContentBlock::Text { text }) => Ok(text),
            Some(AnthropicContentBlock::Other) => Err(LlmError::Provider(
                "anthropic first content block is not text".to_string(),
            )),
            None => Err(LlmError::Provider(
                "anthropic response missing content".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProviderHandle;
    use crate::test_support::{FakeProvider, creds_for};
    use axum::http::StatusCode;
    use serde_json::json;

    fn message(text: &str) -> serde_json::Value {
        json!({
            "content": [{ "type": "text", "text": text }],
            "stop_reason": "end_turn",
            "usage": { "input_tokens": 5, "output_tokens": 1 }
        })
    }

    async fn anthropic_handle(fake: &FakeProvider) -> ProviderHandle {
        ProviderHandle::create_with_base_url(
            &creds_for(ProviderKind::Anthropic),
            "anthropic",
            None,
            Some(&fake.base_url()),
        )
        .expect("handle")
    }

    #[test]
    fn request_carries_top_level_system_and_fixed_max_tokens() {
        let turns = vec![Turn::user("hi")];
        let req = AnthropicRequest::new("claude", Some("be terse"), &turns);
        let value = serde_json::to_value(&req).expect("serializes");
        assert_eq!(
            value,
            json!({
                "model": "claude",
                "max_tokens": 4096,
                "system": "be terse",
                "messages": [{ "role": "user", "content": "hi" }]
            })
        );
    }

    #[test]
    fn request_omits_system_when_absent() {
        let req = AnthropicRequest::new("claude", None, &[Turn::user("hi")]);
        let value = serde_json::to_value(&req).expect("serializes");
        assert!(value.get("system").is_none());
        assert_eq!(value["max_tokens"], 4096);
    }

    #[tokio::test]
    async fn sends_whole_transcript_including_new_user_turn() {
        let fake = FakeProvider::start(StatusCode::OK, |_| message("pong")).await;
        let handle = anthropic_handle(&fake).await;
        let mut session = Session::new();

        handle.send("one", &mut session, Some("sys")).await.expect("send");
        let reply = handle.send("two", &mut session, Some("sys")).await.expect("send");
        assert_eq!(reply, "pong");

        assert_eq!(
            session.turns(),
            &[
                Turn::user("one"),
                Turn::assistant("pong"),
                Turn::user("two"),
                Turn::assistant("pong"),
            ]
        );

        let last = fake.requests().pop().expect("request recorded");
        assert_eq!(last["system"], "sys");
        assert_eq!(last["max_tokens"], 4096);
        assert_eq!(last["messages"].as_array().map(Vec::len), Some(3));
        assert_eq!(last["messages"][2]["content"], "two");
        assert_eq!(fake.last_path().as_deref(), Some("/messages"));
        assert_eq!(fake.last_header("x-api-key").as_deref(), Some("key-anthropic"));
        assert_eq!(
            fake.last_header("anthropic-version").as_deref(),
            Some(ANTHROPIC_VERSION)
        );
    }

    #[tokio::test]
    async fn failed_send_rolls_back_the_user_turn() {
        let fake = FakeProvider::start(StatusCode::TOO_MANY_REQUESTS, |_| {
            json!({ "type": "error", "error": { "type": "rate_limit_error" } })
        })
        .await;
        let handle = anthropic_handle(&fake).await;
        let mut session = Session::new();
        session.append(Role::User, "earlier");
        session.append(Role::Assistant, "reply");

        let err = handle
            .send("hi", &mut session, None)
            .await
            .expect_err("429 surfaces");
        assert!(err.is_provider());
        assert!(err.to_string().contains("429"), "{err}");
        assert_eq!(session.len(), 2);
    }

    #[test]
    fn non_text_first_block_is_a_provider_error() {
        let parsed: AnthropicResponse = serde_json::from_value(json!({
            "content": [{ "type": "tool_use", "id": "t", "name": "x", "input": {} }]
        }))
        .expect("parses");
        assert!(parsed.into_reply().expect_err("not text").is_provider());
    }
}
