/// Failure of an external collaborator (transcription, vision, evaluation, speech).
///
/// Callers never propagate these past the session; they log them and fall
/// back to a default. `RateLimited` is kept apart because some callers reuse a
/// cached result in that case.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("rate limited by upstream service")]
    RateLimited,
    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("upstream request failed: {0}")]
    Request(String),
    #[error("malformed upstream response: {0}")]
    Malformed(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) if status == reqwest::StatusCode::TOO_MANY_REQUESTS => Self::RateLimited,
            _ if e.is_decode() => Self::Malformed(e.to_string()),
            _ => Self::Request(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}

impl ServiceError {
    /// Builds an error from a non-success HTTP response, keeping the body short.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Self::RateLimited;
        }
        let body = response.text().await.unwrap_or_default();
        Self::Status {
            status: status.as_u16(),
            body: interview_types::truncate_chars(&body, 200).to_string(),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}
