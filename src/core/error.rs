use crate::core::models::JobType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PollError {
    #[error("Status request failed: {0}")]
    Request(String),

    #[error("Status endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected status payload: {0}")]
    Payload(String),

    #[error("Missing or empty `{field}` in {job_type} context")]
    InvalidContext { job_type: JobType, field: &'static str },

    #[error("State store error: {0}")]
    Store(String),
}

impl From<reqwest::Error> for PollError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            PollError::Payload(e.to_string())
        } else {
            PollError::Request(e.to_string())
        }
    }
}

impl From<serde_json::Error> for PollError {
    fn from(e: serde_json::Error) -> Self {
        PollError::Payload(e.to_string())
    }
}

impl From<std::io::Error> for PollError {
    fn from(e: std::io::Error) -> Self {
        PollError::Store(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PollError>;
