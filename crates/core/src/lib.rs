pub mod change_gate;
pub mod config;
pub mod conversation;
pub mod error;
pub mod evaluator;
pub mod frame;
pub mod guard;
pub mod interruption;
pub mod llm;
pub mod pacer;
pub mod policy;
pub mod report;
pub mod session;
pub mod speech;
pub mod storage;
pub mod transcriber;
pub mod transcription;
pub mod transport;
pub mod vision;

#[cfg(test)]
mod test_server;

pub use config::SessionConfig;
pub use error::{ServiceError, ServiceResult};
pub use interview_types as types;
pub use session::{Collaborators, InterviewSession};
pub use transport::EventSink;
