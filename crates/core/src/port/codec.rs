// Codec Port (Interface)
// Serialize/deserialize payloads and results; the wire encoding beyond
// "text in, value out" is the codec's concern.

use serde_json::Value;
use thiserror::Error;

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("decode failed: {0}")]
    Decode(String),

    #[error("encode failed: {0}")]
    Encode(String),
}

/// Codec trait
pub trait Codec: Send + Sync {
    /// Serialize a value to its wire text
    fn encode(&self, value: &Value) -> Result<String, CodecError>;

    /// Deserialize wire text into a value
    fn decode(&self, text: &str) -> Result<Value, CodecError>;
}

/// JSON codec (production)
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, value: &Value) -> Result<String, CodecError> {
        serde_json::to_string(value).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, text: &str) -> Result<Value, CodecError> {
        serde_json::from_str(text).map_err(|e| CodecError::Decode(e.to_string()))
    }
}
