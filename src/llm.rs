//! Reply generation via `OpenAI` chat completions

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::credentials::Credential;
use crate::services::Generator;
use crate::session::{Stage, Turn};
use crate::{Error, Result};

/// Chat completion client
///
/// Sends the whole conversation on every request
pub struct ChatClient {
    client: Client,
    api_base: String,
    model: String,
}

impl ChatClient {
    /// Create a new chat completion client
    #[must_use]
    pub fn new(client: Client, api_base: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            model: model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl Generator for ChatClient {
    async fn generate(&self, credential: &Credential, turns: &[Turn]) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: turns,
        };

        tracing::debug!(model = %self.model, turns = turns.len(), "requesting reply");

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", credential.bearer())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::service(Stage::GeneratingReply, format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::service(
                Stage::GeneratingReply,
                format!("API error: {status} - {body}"),
            ));
        }

        let result: ChatCompletionResponse = response.json().await.map_err(|e| {
            Error::service(Stage::GeneratingReply, format!("malformed response: {e}"))
        })?;

        let reply = extract_reply(result)?;
        tracing::info!(reply = %reply, "reply generated");
        Ok(reply)
    }
}

/// Pull the first choice's text out of a completion
fn extract_reply(response: ChatCompletionResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| Error::service(Stage::GeneratingReply, "response contained no reply text"))
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ChatCompletionResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_request_carries_every_turn() {
        let turns = vec![
            Turn::system("be a tutor"),
            Turn::user("ordering coffee"),
            Turn::assistant("你好"),
        ];
        let json = serde_json::to_value(ChatCompletionRequest {
            model: "gpt-4o",
            messages: &turns,
        })
        .unwrap();

        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["messages"].as_array().unwrap().len(), 3);
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "ordering coffee");
    }

    #[test]
    fn test_extract_reply() {
        let response = parse(r#"{"choices":[{"message":{"role":"assistant","content":"欢迎光临！"}}]}"#);
        assert_eq!(extract_reply(response).unwrap(), "欢迎光临！");
    }

    #[test]
    fn test_missing_content_is_service_error() {
        let response = parse(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#);
        let err = extract_reply(response).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::GeneratingReply));

        let response = parse(r#"{"choices":[]}"#);
        assert!(extract_reply(response).is_err());
    }
}
