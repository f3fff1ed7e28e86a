use crate::error::{ServiceError, ServiceResult};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

pub const OPENAI_SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Returns encoded audio (mp3). Empty means nothing to play.
    async fn synthesize(&self, text: &str) -> ServiceResult<Vec<u8>>;
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
}

pub struct OpenAiSpeechClient {
    client: Client,
    api_key: SecretString,
    voice: String,
    url: String,
}

impl OpenAiSpeechClient {
    pub fn new(client: Client, api_key: SecretString, voice: String) -> Self {
        Self {
            client,
            api_key,
            voice,
            url: OPENAI_SPEECH_URL.to_string(),
        }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeechClient {
    async fn synthesize(&self, text: &str) -> ServiceResult<Vec<u8>> {
        let request = SpeechRequest {
            model: "tts-1",
            voice: &self.voice,
            input: text,
            response_format: "mp3",
        };
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::from_response(response).await);
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Used when no speech backend is configured; sessions run text-only.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSynthesizer;

#[async_trait]
impl SpeechSynthesizer for SilentSynthesizer {
    async fn synthesize(&self, _text: &str) -> ServiceResult<Vec<u8>> {
        Ok(Vec::new())
    }
}
