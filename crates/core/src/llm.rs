use crate::error::{ServiceError, ServiceResult};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: Message,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub content: String,
}

/// One chat message. `content` is a plain string or an array of content parts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: Value,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: Value::String(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: Value::String(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: "assistant",
            content: Value::String(text.into()),
        }
    }

    /// A user message carrying a prompt and an image.
    pub fn user_with_image(text: &str, image_url: &str) -> Self {
        Self {
            role: "user",
            content: serde_json::json!([
                { "type": "text", "text": text },
                { "type": "image_url", "image_url": { "url": image_url } }
            ]),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Minimal client for an OpenAI compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    api_key: SecretString,
    base_url: String,
}

impl ChatClient {
    pub fn new(client: Client, api_key: SecretString) -> Self {
        Self {
            client,
            api_key,
            base_url: GROQ_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Sends the request and returns the first choice's trimmed content.
    pub async fn complete(&self, request: &ChatRequest<'_>) -> ServiceResult<String> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::from_response(response).await);
        }

        let resp = response.json::<LlmResponse>().await?;
        let answer = &resp
            .choices
            .first()
            .ok_or_else(|| ServiceError::Malformed("no choices in response".to_string()))?
            .message
            .content;
        Ok(answer.trim().to_string())
    }
}

/// Returns the text between the first `{` and the last `}`, if any.
///
/// Models often wrap JSON in prose or code fences.
pub fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::serve;
    use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    fn request(model: &str) -> ChatRequest<'_> {
        ChatRequest {
            model,
            messages: vec![ChatMessage::user("hello")],
            temperature: 0.1,
            max_tokens: 10,
        }
    }

    #[tokio::test]
    async fn completes_against_configured_endpoint() {
        let router = Router::new()
            .route(
                "/v1/chat/completions",
                post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                    let auth = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
                    if auth != Some("Bearer gsk") {
                        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad key"})));
                    }
                    let model = body["model"].as_str().unwrap_or_default().to_string();
                    let content = format!("  answered by {model}  ");
                    (
                        StatusCode::OK,
                        Json(json!({"choices": [{"message": {"content": content}}]})),
                    )
                }),
            )
            .route(
                "/busy/chat/completions",
                post(|| async { StatusCode::TOO_MANY_REQUESTS }),
            );
        let base = serve(router).await;

        let chat = ChatClient::new(Client::new(), SecretString::from("gsk"))
            .with_base_url(&format!("{base}/v1/"));
        assert_eq!(
            chat.complete(&request("llama")).await.unwrap(),
            "answered by llama"
        );

        let wrong_key = ChatClient::new(Client::new(), SecretString::from("nope"))
            .with_base_url(&format!("{base}/v1"));
        assert!(matches!(
            wrong_key.complete(&request("llama")).await,
            Err(ServiceError::Status { status: 401, .. })
        ));

        let busy = ChatClient::new(Client::new(), SecretString::from("gsk"))
            .with_base_url(&format!("{base}/busy"));
        assert!(busy.complete(&request("llama")).await.unwrap_err().is_rate_limited());
    }

    #[test]
    fn extracts_json_from_fenced_output() {
        let content = "Sure!\n```json\n{\"score\": 7, \"nested\": {\"a\": 1}}\n```";
        assert_eq!(
            extract_json_object(content),
            Some("{\"score\": 7, \"nested\": {\"a\": 1}}")
        );
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[test]
    fn image_message_uses_content_parts() {
        let msg = ChatMessage::user_with_image("describe", "data:image/png;base64,AAAA");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(
            json["content"][1]["image_url"]["url"],
            "data:image/png;base64,AAAA"
        );
    }
}
