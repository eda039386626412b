use thiserror::Error;

#[derive(Error, Debug)]
pub enum HearthError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed event: {0}")]
    MalformedEvent(#[source] serde_json::Error),

    #[error("Event is not a JSON object")]
    NotAnObject,

    #[error("Event has no type discriminator")]
    MissingType,
}

pub type Result<T> = std::result::Result<T, HearthError>;
