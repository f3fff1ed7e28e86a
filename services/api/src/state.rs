use crate::config::Config;
use anyhow::{Context, Result};
use interview_core::evaluator::{EvaluatorModels, GroqEvaluator};
use interview_core::llm::ChatClient;
use interview_core::report::{MarkdownReportRenderer, ReportRenderer};
use interview_core::speech::{OpenAiSpeechClient, SilentSynthesizer, SpeechSynthesizer};
use interview_core::storage::{JsonFileStore, RecordStore};
use interview_core::transcriber::DeepgramClient;
use interview_core::vision::GroqVisionClient;
use interview_core::{Collaborators, SessionConfig};
use std::sync::Arc;
use std::time::Duration;

/// Builds the collaborators for one new session.
pub type CollaboratorFactory = Arc<dyn Fn() -> Collaborators + Send + Sync>;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub session: SessionConfig,
    pub collaborators: CollaboratorFactory,
    pub store: Arc<dyn RecordStore>,
    pub renderer: Arc<dyn ReportRenderer>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        let store: Arc<dyn RecordStore> = Arc::new(JsonFileStore::new(&config.history_dir));
        let renderer: Arc<dyn ReportRenderer> =
            Arc::new(MarkdownReportRenderer::new(&config.reports_dir));

        let transcriber = Arc::new(DeepgramClient::new(
            client.clone(),
            config.deepgram_api_key.clone(),
            config.deepgram_model.clone(),
        ));
        let vision = Arc::new(GroqVisionClient::new(
            ChatClient::new(client.clone(), config.groq_api_key.clone()),
            config.vision_model.clone(),
        ));
        let synthesizer: Arc<dyn SpeechSynthesizer> = match &config.openai_api_key {
            Some(key) => Arc::new(OpenAiSpeechClient::new(
                client.clone(),
                key.clone(),
                config.tts_voice.clone(),
            )),
            None => {
                tracing::warn!("OPENAI_API_KEY not set, speech output disabled");
                Arc::new(SilentSynthesizer)
            }
        };

        let chat = ChatClient::new(client, config.groq_api_key.clone());
        let models = EvaluatorModels {
            main: config.llm_model.clone(),
            fast: config.fast_llm_model.clone(),
        };
        let (shared_store, shared_renderer) = (store.clone(), renderer.clone());
        // The evaluator keeps conversational memory, so it is never shared.
        let collaborators: CollaboratorFactory = Arc::new(move || Collaborators {
            transcriber: transcriber.clone(),
            vision: vision.clone(),
            evaluator: Arc::new(GroqEvaluator::new(chat.clone(), models.clone())),
            synthesizer: synthesizer.clone(),
            store: shared_store.clone(),
            renderer: shared_renderer.clone(),
        });

        Ok(Self {
            session: config.session.clone(),
            collaborators,
            store,
            renderer,
        })
    }
}
