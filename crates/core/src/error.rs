// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("queue service error: {0}")]
    Queue(#[from] crate::port::queue_service::QueueServiceError),

    #[error("codec error: {0}")]
    Codec(#[from] crate::port::codec::CodecError),

    #[error("handler error: {0}")]
    Handler(#[from] crate::port::handler::HandlerError),

    #[error("configuration error: {0}")]
    Config(#[from] crate::port::config_resolver::ConfigResolverError),

    #[error("dispatch error: {0}")]
    Dispatch(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
