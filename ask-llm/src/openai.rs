//! Chat-completions adapter. Serves both OpenAI and Groq, which accept the same
//! request shape.

use crate::client::{ChatProvider, ProviderKind, error_body};
use crate::error::{LlmError, Result};
use crate::session::Session;
use crate::types::{Role, Turn};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    kind: ProviderKind,
    url: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(
        http: reqwest::Client,
        kind: ProviderKind,
        base_url: &str,
        api_key: &str,
        model: &str,
    ) -> Self {
        Self {
            http,
            kind,
            url: format!("{base_url}/chat/completions"),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    #[tracing::instrument(level = "info", skip_all, fields(provider = %self.kind))]
    async fn complete(&self, req: &OpenAiChatRequest) -> Result<String> {
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(req)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Provider(format!(
                "{} chat status={status} body={}",
                self.kind,
                error_body(&body)
            )));
        }

        let parsed: OpenAiChatResponse = serde_json::from_str(&body)?;
        parsed.into_reply(self.kind)
    }
}

#[async_trait]
impl ChatProvider for OpenAiClient {
    fn kind(&self) -> ProviderKind {
        self.kind
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
        let req = OpenAiChatRequest::new(&self.model, system_prompt, session.turns(), message);
        let reply = self.complete(&req).await?;

        session.append(Role::User, message);
        session.append(Role::Assistant, reply.clone());
        Ok(reply)
    }
}

#[derive(Debug, Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
}

impl OpenAiChatRequest {
    fn new(model: &str, system_prompt: Option<&str>, history: &[Turn], message: &str) -> Self {
        let mut messages = Vec::with_capacity(history.len() + 2);
        if let Some(system) = system_prompt.filter(|s| !s.is_empty()) {
            messages.push(OpenAiMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.extend(history.iter().map(|t| OpenAiMessage {
            role: t.role.as_str().to_string(),
            content: t.content.clone(),
        }));
        messages.push(OpenAiMessage {
            role: "user".to_string(),
            content: message.to_string(),
        });

        Self {
            model: model.to_string(),
            messages,
        }
    }
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl OpenAiChatResponse {
    fn into_reply(self, kind: ProviderKind) -> Result<String> {
        if let Some(u) = &self.usage {
            tracing::debug!(
                provider = %kind,
                prompt_tokens = u.prompt_tokens,
                completion_tokens = u.completion_tokens,
                "chat usage"
            );
        }
        let choice = self.choices.into_iter().next().ok_or_else(|| {
            LlmError::Provider(format!("{kind} response missing choices"))
        })?;
        tracing::debug!(finish_reason = ?choice.finish_reason, "chat completed");
        Ok(choice.message.content.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeProvider, creds_for};
    use crate::{ChatProvider, ProviderHandle};
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn request_puts_system_first_then_history_then_user() {
        let history = vec![Turn::user("q1"), Turn::assistant("a1")];
        let req = OpenAiChatRequest::new("gpt", Some("be brief"), &history, "q2");
        let value = serde_json::to_value(&req).expect("serializes");
        assert_eq!(
            value,
            json!({
                "model": "gpt",
                "messages": [
                    { "role": "system", "content": "be brief" },
                    { "role": "user", "content": "q1" },
                    { "role": "assistant", "content": "a1" },
                    { "role": "user", "content": "q2" },
                ]
            })
        );
    }

    #[test]
    fn request_without_system_prompt_has_no_system_message() {
        let req = OpenAiChatRequest::new("gpt", None, &[], "hi");
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].role, "user");
    }

    #[test]
    fn response_without_choices_is_a_provider_error() {
        let parsed: OpenAiChatResponse =
            serde_json::from_value(json!({ "choices": [] })).expect("parses");
        let err = parsed.into_reply(ProviderKind::OpenAi).expect_err("no choice");
        assert!(err.is_provider());
    }

    fn completion(text: &str) -> serde_json::Value {
        json!({
            "choices": [{ "message": { "role": "assistant", "content": text }, "finish_reason": "stop" }],
            "usage": { "prompt_tokens": 3, "completion_tokens": 2 }
        })
    }

    #[tokio::test]
    async fn n_sends_produce_2n_alternating_turns() {
        for provider in [ProviderKind::OpenAi, ProviderKind::Groq] {
            let fake = FakeProvider::start(StatusCode::OK, |req| {
                let n = req["messages"].as_array().map(Vec::len).unwrap_or(0);
                completion(&format!("reply-{n}"))
            })
            .await;
            let handle = ProviderHandle::create_with_base_url(
                &creds_for(provider),
                provider.as_str(),
                None,
                Some(&fake.base_url()),
            )
            .expect("handle");

            let mut session = Session::new();
            for i in 0..3 {
                let reply = handle
                    .send(&format!("q{i}"), &mut session, Some("sys"))
                    .await
                    .expect("send succeeds");
                assert!(reply.starts_with("reply-"));
            }

            assert_eq!(session.len(), 6);
            for (i, turn) in session.turns().iter().enumerate() {
                let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
                assert_eq!(turn.role, expected);
            }
            assert_eq!(session.turns()[4].content, "q2");

            // Third request: system + 4 history turns + new user turn.
            let last = fake.requests().pop().expect("request recorded");
            assert_eq!(last["messages"].as_array().map(Vec::len), Some(6));
            assert_eq!(last["messages"][0]["role"], "system");
            assert_eq!(
                fake.last_header("authorization"),
                Some(format!("Bearer key-{provider}"))
            );
            assert_eq!(fake.last_path().as_deref(), Some("/chat/completions"));
        }
    }

    #[tokio::test]
    async fn clear_then_send_leaves_exactly_one_exchange() {
        let fake = FakeProvider::start(StatusCode::OK, |_| completion("ok")).await;
        let handle = ProviderHandle::create_with_base_url(
            &creds_for(ProviderKind::Groq),
            "groq",
            None,
            Some(&fake.base_url()),
        )
        .expect("handle");

        let mut session = Session::new();
        for _ in 0..4 {
            handle.send("hi", &mut session, None).await.expect("send");
        }
        session.clear();
        handle.send("fresh", &mut session, None).await.expect("send");

        assert_eq!(session.len(), 2);
        assert_eq!(session.turns()[0], Turn::user("fresh"));
        assert_eq!(session.turns()[1], Turn::assistant("ok"));
    }

    #[tokio::test]
    async fn error_status_is_a_provider_error_and_transcript_is_untouched() {
        let fake = FakeProvider::start(StatusCode::UNAUTHORIZED, |_| {
            json!({ "error": { "message": "invalid api key" } })
        })
        .await;
        let handle = ProviderHandle::create_with_base_url(
            &creds_for(ProviderKind::OpenAi),
            "openai",
            None,
            Some(&fake.base_url()),
        )
        .expect("handle");

        let mut session = Session::new();
        let err = handle
            .send("hi", &mut session, None)
            .await
            .expect_err("401 surfaces");
        assert!(err.is_provider());
        assert!(err.to_string().contains("401"), "{err}");
        assert!(err.to_string().contains("invalid api key"), "{err}");
        assert!(session.is_empty());
    }
}
