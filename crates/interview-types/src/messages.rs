fn default_encoding() -> String {
    "linear16".to_string()
}

fn default_sample_rate() -> u32 {
    16_000
}

/// Messages sent from the browser to the interview server.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A base64 encoded chunk of microphone audio.
    Audio {
        #[serde(default)]
        data: String,
        #[serde(default = "default_encoding")]
        encoding: String,
        #[serde(rename = "sampleRate", default = "default_sample_rate")]
        sample_rate: u32,
    },
    /// A base64 encoded screen capture frame (JPEG, PNG or WebP).
    Video {
        #[serde(default)]
        data: String,
    },
    ScreenShareLost,
    ScreenShareRestored,
    GenerateReport,
    Stop,
    /// The participant started talking; used to cut AI playback short.
    UserSpeaking,
}
