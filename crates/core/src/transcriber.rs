use crate::error::{ServiceError, ServiceResult};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

pub const DEEPGRAM_LISTEN_URL: &str = "https://api.deepgram.com/v1/listen";

/// Encodings Deepgram cannot detect from a container header.
const RAW_ENCODINGS: &[&str] = &["linear16", "linear32", "flac", "mulaw", "alaw", "opus"];

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Returns `None` when the audio contained no speech.
    async fn transcribe(
        &self,
        audio: &[u8],
        encoding: &str,
        sample_rate: u32,
    ) -> ServiceResult<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct ListenResponse {
    #[serde(default)]
    results: Option<ListenResults>,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    #[serde(default)]
    channels: Vec<ListenChannel>,
}

#[derive(Debug, Deserialize)]
struct ListenChannel {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    #[serde(default)]
    transcript: String,
}

impl ListenResponse {
    fn transcript(&self) -> Option<String> {
        let text = self
            .results
            .as_ref()?
            .channels
            .first()?
            .alternatives
            .first()?
            .transcript
            .trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

/// Deepgram pre-recorded transcription over HTTP.
pub struct DeepgramClient {
    client: Client,
    api_key: SecretString,
    model: String,
    url: String,
}

impl DeepgramClient {
    pub fn new(client: Client, api_key: SecretString, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
            url: DEEPGRAM_LISTEN_URL.to_string(),
        }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    fn query(&self, encoding: &str, sample_rate: u32) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("model", self.model.clone()),
            ("smart_format", "true".to_string()),
            ("punctuate", "true".to_string()),
            ("channels", "1".to_string()),
        ];
        if RAW_ENCODINGS.contains(&encoding) {
            params.push(("encoding", encoding.to_string()));
            params.push(("sample_rate", sample_rate.to_string()));
        }
        params
    }
}

#[async_trait]
impl Transcriber for DeepgramClient {
    async fn transcribe(
        &self,
        audio: &[u8],
        encoding: &str,
        sample_rate: u32,
    ) -> ServiceResult<Option<String>> {
        let response = self
            .client
            .post(&self.url)
            .query(&self.query(encoding, sample_rate))
            .header(
                "Authorization",
                format!("Token {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "application/octet-stream")
            .body(audio.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::from_response(response).await);
        }

        let body = response.json::<ListenResponse>().await?;
        Ok(body.transcript())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::serve;
    use axum::body::Bytes;
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    #[tokio::test]
    async fn posts_audio_to_configured_endpoint() {
        let router = Router::new()
            .route(
                "/v1/listen",
                post(
                    |headers: HeaderMap,
                     Query(params): Query<HashMap<String, String>>,
                     body: Bytes| async move {
                        let auth = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
                        if auth != Some("Token dg") {
                            return (StatusCode::UNAUTHORIZED, Json(json!({})));
                        }
                        let transcript = format!(
                            "{} bytes with {} at {}",
                            body.len(),
                            params.get("model").cloned().unwrap_or_default(),
                            params.get("sample_rate").cloned().unwrap_or_default()
                        );
                        (
                            StatusCode::OK,
                            Json(json!({"results": {"channels": [{"alternatives": [{"transcript": transcript}]}]}})),
                        )
                    },
                ),
            )
            .route(
                "/down",
                post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            );
        let base = serve(router).await;

        let client = DeepgramClient::new(Client::new(), SecretString::from("dg"), "nova-2".to_string())
            .with_url(&format!("{base}/v1/listen"));
        let text = client.transcribe(&[0u8; 32], "linear16", 16_000).await.unwrap();
        assert_eq!(text.as_deref(), Some("32 bytes with nova-2 at 16000"));

        let down = DeepgramClient::new(Client::new(), SecretString::from("dg"), "nova-2".to_string())
            .with_url(&format!("{base}/down"));
        match down.transcribe(&[0u8; 32], "webm", 48_000).await {
            Err(ServiceError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected a status error, got {other:?}"),
        }
    }

    #[test]
    fn transcript_is_read_from_first_alternative() {
        let body: ListenResponse = serde_json::from_str(
            r#"{"results":{"channels":[{"alternatives":[{"transcript":"  hello there "}]}]}}"#,
        )
        .unwrap();
        assert_eq!(body.transcript().as_deref(), Some("hello there"));

        let silent: ListenResponse = serde_json::from_str(
            r#"{"results":{"channels":[{"alternatives":[{"transcript":""}]}]}}"#,
        )
        .unwrap();
        assert_eq!(silent.transcript(), None);

        let empty: ListenResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.transcript(), None);
    }

    #[test]
    fn raw_encodings_carry_format_parameters() {
        let client = DeepgramClient::new(
            Client::new(),
            SecretString::from("key"),
            "nova-2".to_string(),
        );
        let raw = client.query("linear16", 16_000);
        assert!(raw.contains(&("sample_rate", "16000".to_string())));
        assert!(raw.contains(&("encoding", "linear16".to_string())));

        let webm = client.query("webm", 48_000);
        assert!(!webm.iter().any(|(k, _)| *k == "encoding"));
        assert!(webm.contains(&("model", "nova-2".to_string())));
    }
}
