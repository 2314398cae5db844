// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("invalid concurrency bounds: min {min} max {max}")]
    InvalidConcurrencyBounds { min: usize, max: usize },

    #[error("binding declares no payload parameter")]
    MissingPayloadParameter,

    #[error("binding declares {0} payload parameters")]
    MultiplePayloadParameters(usize),

    #[error("binding declares {0} session parameters")]
    MultipleSessionParameters(usize),

    #[error("validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
