//! Crate error taxonomy
//!
//! Only input-shaped failures surface as `Err` to callers: ill-formed
//! options, inputs no parser recognizes, and subscription fetch problems.
//! Per-profile probe failures never abort a run; they are folded into the
//! profile's result record and reported through the event stream.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Options message that does not match either accepted shape.
    #[error("invalid data")]
    InvalidData,

    /// Every parser rejected the input, or a successful parse was empty.
    #[error("no profile found")]
    NoProfileFound,

    /// Retest entry point called with a message that is not in retest mode.
    #[error("not retest mode")]
    NotRetest,

    /// A proxy link whose scheme the engine does not understand.
    #[error("unrecognized proxy link: {0}")]
    UnrecognizedLink(String),

    /// Content that could not be decoded with any base64 variant.
    #[error("failed to decode base64 content")]
    Base64,

    #[error("subscription fetch failed: {0}")]
    Subscription(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("clash config error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("message error: {0}")]
    Json(#[from] serde_json::Error),
}
