// Message Domain Model

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Message identifier assigned by the queue service
pub type MessageId = String;

/// Concrete queue address (resolved from a logical name)
pub type QueueAddress = String;

/// Opaque acknowledgment token; invalidated by a successful delete
pub type Receipt = String;

/// Wire-reported attribute type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeType {
    String,
    Number,
    Binary,
}

/// A single typed message attribute as reported by the queue service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageAttribute {
    pub data_type: AttributeType,
    pub string_value: Option<String>,
    pub binary_value: Option<Vec<u8>>,
}

impl MessageAttribute {
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            data_type: AttributeType::String,
            string_value: Some(value.into()),
            binary_value: None,
        }
    }

    /// Numbers travel as text on the wire
    pub fn number(value: impl ToString) -> Self {
        Self {
            data_type: AttributeType::Number,
            string_value: Some(value.to_string()),
            binary_value: None,
        }
    }

    pub fn binary(value: Vec<u8>) -> Self {
        Self {
            data_type: AttributeType::Binary,
            string_value: None,
            binary_value: Some(value),
        }
    }
}

/// A received message; consumed once by the binder and once by acknowledgment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub body: String,
    pub attributes: HashMap<String, MessageAttribute>,
    pub receipt: Receipt,
}

impl Message {
    pub fn new(
        id: impl Into<String>,
        body: impl Into<String>,
        attributes: HashMap<String, MessageAttribute>,
        receipt: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            attributes,
            receipt: receipt.into(),
        }
    }
}

/// A fully-formed outbound send instruction; handlers may return one to
/// bypass result serialization entirely
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequest {
    pub destination: QueueAddress,
    pub body: String,
    pub attributes: HashMap<String, MessageAttribute>,
}

impl SendRequest {
    pub fn new(destination: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            body: body.into(),
            attributes: HashMap::new(),
        }
    }
}

/// Status returned by the delete operation; non-2xx is logged but non-fatal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteStatus {
    pub code: u16,
}

impl DeleteStatus {
    pub const OK: DeleteStatus = DeleteStatus { code: 200 };

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}
