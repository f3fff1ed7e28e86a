use crate::error::ServiceResult;
use crate::frame::Frame;
use crate::llm::{ChatClient, ChatMessage, ChatRequest};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

const VISION_PROMPT: &str = r#"Analyze this screenshot from a technical presentation.

Extract and return concisely:
1. **Content Type**: Code, Diagram, Slide, Terminal, IDE, etc.
2. **Technical Details**:
   - If code: language, key functions, logic flow, complexity
   - If diagram: components, relationships, data flow
   - If slide: bullet points, key claims, numbers
3. **Key Data Points**: Any metrics, percentages, or quantitative claims
4. **Main Topic**: Primary subject being shown

Be precise and factual. Output will verify the presenter's explanation.

Format:
TYPE: <type>
DETAILS: <technical details>
DATA: <numbers/metrics if any>
TOPIC: <main topic>"#;

/// Turns a screen capture into a text description.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VisionDescriber: Send + Sync {
    async fn describe(&self, frame: &Frame) -> ServiceResult<String>;
}

/// Vision description through a multimodal chat model.
pub struct GroqVisionClient {
    chat: ChatClient,
    model: String,
}

impl GroqVisionClient {
    pub fn new(chat: ChatClient, model: String) -> Self {
        Self { chat, model }
    }
}

#[async_trait]
impl VisionDescriber for GroqVisionClient {
    async fn describe(&self, frame: &Frame) -> ServiceResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage::user_with_image(
                VISION_PROMPT,
                &frame.data_url(),
            )],
            temperature: 0.1,
            max_tokens: 500,
        };
        self.chat.complete(&request).await
    }
}
