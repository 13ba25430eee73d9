use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification attached to an `ActionResult` when dispatch could not do
/// what the user asked. `AmbiguousInput` is not a failure: it marks a
/// clarifying question the user is expected to answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthorized,
    QuotaExceeded,
    NotFound,
    BadRequest,
    UpstreamUnavailable,
    ExtractionFailed,
    AmbiguousInput,
}

/// Failure surface of every backend API method. The dispatcher maps each
/// variant to a distinct user-facing message class and never lets one
/// escape the event-handling stack.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("resource not found")]
    NotFound,
    #[error("forbidden")]
    Forbidden,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("upstream unavailable: {0}")]
    Upstream(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound => ErrorKind::NotFound,
            Self::Forbidden => ErrorKind::Unauthorized,
            Self::BadRequest(_) => ErrorKind::BadRequest,
            Self::Upstream(_) => ErrorKind::UpstreamUnavailable,
        }
    }

    /// Friendly copy for the chat surface. Raw transport detail stays in
    /// the logs; the user never sees stack traces or internal identifiers.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound => {
                "Hmm, I couldn't find that one. Mind double-checking the ID?".to_owned()
            }
            Self::Forbidden => "Sorry, you don't have permission for that one.".to_owned(),
            Self::BadRequest(reason) => format!("That didn't quite work: {reason}"),
            Self::Upstream(_) => {
                "Sorry mate, having trouble reaching the backend right now. Try again in a tic!"
                    .to_owned()
            }
        }
    }
}
