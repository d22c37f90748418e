//! Error taxonomy for posting.
//!
//! Transport errors ([`TwitterError`]) are what the HTTP client returns.
//! The publisher turns them into a classified [`PostFailure`]. Problems
//! caught before any request is made are a [`PublishError`].

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::validate::InvalidTweet;

/// Informational cool-down shown after a rate limit. Not enforced.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Errors from the Twitter REST transport.
#[derive(Error, Debug)]
pub enum TwitterError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Twitter API returned an error body
    #[error("Twitter API error {status}: {message}")]
    Api {
        status: u16,
        message: String,
        retry_after: Option<u64>,
    },

    /// HTTP 429
    #[error("Rate limited, retry after {retry_after} seconds")]
    RateLimited { retry_after: u64 },
}

pub type TwitterResult<T> = Result<T, TwitterError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostErrorKind {
    RateLimited,
    DuplicateContent,
    AuthFailure,
    TooLong,
    Unknown,
}

impl PostErrorKind {
    /// Classify a provider error message. The provider has no stable error
    /// code for these cases, so this matches on its English text.
    pub fn from_message(message: &str) -> Self {
        let message = message.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| message.contains(n));

        if has(&["rate limit"]) {
            Self::RateLimited
        } else if has(&["duplicate", "already", "repeated"]) {
            Self::DuplicateContent
        } else if has(&["forbidden", "unauthorized"]) {
            Self::AuthFailure
        } else if has(&["too long", "character limit"]) {
            Self::TooLong
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for PostErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RateLimited => "rate limited",
            Self::DuplicateContent => "duplicate content",
            Self::AuthFailure => "auth failure",
            Self::TooLong => "too long",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A tweet the provider refused, with the raw provider message kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostFailure {
    pub kind: PostErrorKind,
    pub message: String,
    pub status: Option<u16>,
    /// Seconds until the provider's rate-limit window resets, when it said.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl PostFailure {
    pub fn classify(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: PostErrorKind::from_message(&message),
            message,
            status,
            retry_after: None,
        }
    }

    /// Human-readable explanation for the user.
    pub fn user_message(&self) -> String {
        match self.kind {
            PostErrorKind::RateLimited => "Rate limit exceeded. Please try again later.".into(),
            PostErrorKind::DuplicateContent => "This content appears to be a duplicate of a recent tweet. \
                 Twitter doesn't allow posting identical content."
                .into(),
            PostErrorKind::AuthFailure => "Authentication failed. Please log in again.".into(),
            PostErrorKind::TooLong => "Tweet content exceeds the character limit.".into(),
            PostErrorKind::Unknown => self.message.clone(),
        }
    }

    /// Whether re-posting with unique markers may get past the provider.
    #[must_use]
    pub fn is_retryable_with_unique(&self) -> bool {
        self.kind == PostErrorKind::DuplicateContent
    }

    /// How long to wait after a rate limit: the provider's reset time if it
    /// sent one, otherwise the documented window.
    #[must_use]
    pub fn cooldown(&self) -> Option<Duration> {
        (self.kind == PostErrorKind::RateLimited).then(|| {
            self.retry_after
                .map(Duration::from_secs)
                .unwrap_or(RATE_LIMIT_WINDOW)
        })
    }
}

impl fmt::Display for PostFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_message())
    }
}

impl std::error::Error for PostFailure {}

impl From<TwitterError> for PostFailure {
    fn from(err: TwitterError) -> Self {
        match err {
            TwitterError::RateLimited { retry_after } => Self {
                kind: PostErrorKind::RateLimited,
                message: err.to_string(),
                status: Some(429),
                retry_after: Some(retry_after),
            },
            TwitterError::Api {
                status,
                message,
                retry_after,
            } => Self {
                retry_after,
                ..Self::classify(Some(status), message)
            },
            TwitterError::Http(e) => Self {
                kind: PostErrorKind::Unknown,
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
                retry_after: None,
            },
            TwitterError::Json(e) => Self {
                kind: PostErrorKind::Unknown,
                message: format!("Unexpected response from Twitter: {e}"),
                status: None,
                retry_after: None,
            },
        }
    }
}

/// Failures detected before anything is sent.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Not connected to Twitter")]
    NotConnected,

    #[error("Thread must contain at least one tweet")]
    EmptyThread,

    #[error("{}", describe_invalid(.0))]
    Invalid(Vec<InvalidTweet>),

    /// Single-tweet posting only; thread failures live in the outcome.
    #[error(transparent)]
    Post(#[from] PostFailure),
}

fn describe_invalid(invalid: &[InvalidTweet]) -> String {
    invalid
        .iter()
        .map(|t| format!("Invalid tweet {}: {}", t.index + 1, t.errors.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}
