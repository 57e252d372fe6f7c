use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ContributionError>;

/// Everything that can stop a contribution run
#[derive(Error, Debug)]
pub enum ContributionError {
    #[error("Configuration error in {variable}: {reason}")]
    Configuration { variable: String, reason: String },

    #[error("Authentication failed ({status}): {message}")]
    Authentication { status: StatusCode, message: String },

    #[error("Rate limit exceeded{}", reset_suffix(.reset_at))]
    RateLimit { reset_at: Option<DateTime<Utc>> },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected response from {url}: {reason}")]
    UnexpectedResponse { url: String, reason: String },
}

impl ContributionError {
    pub fn config(variable: &str, reason: impl Into<String>) -> Self {
        Self::Configuration {
            variable: variable.to_string(),
            reason: reason.into(),
        }
    }

    pub fn unexpected(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

fn reset_suffix(reset_at: &Option<DateTime<Utc>>) -> String {
    match reset_at {
        Some(at) => format!(" (resets at {})", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => String::new(),
    }
}
