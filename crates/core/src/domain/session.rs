// Session Domain Model - per-message mutable context

use crate::domain::binding::Binding;
use crate::domain::message::QueueAddress;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sentinel for "no error code set"
pub const ERROR_CODE_UNSET: i32 = -1;

/// Coerced attribute value. Downstream consumers pattern-match instead of
/// dynamically casting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bytes(Vec<u8>),
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeValue::Text(s) => write!(f, "{}", s),
            AttributeValue::Integer(i) => write!(f, "{}", i),
            AttributeValue::Float(x) => write!(f, "{}", x),
            AttributeValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Mutable context created fresh for each message. The handler and the
/// parameter binder are the only writers; it is discarded once the message's
/// processing completes.
#[derive(Debug, Clone)]
pub struct Session {
    /// Gates whether the message is deleted after processing
    pub acknowledge: bool,
    pub error: bool,
    pub error_code: i32,
    pub error_description: Option<String>,
    /// Forwarding destination; handlers may override to redirect the result
    pub destination: Option<QueueAddress>,
    pub attributes: HashMap<String, AttributeValue>,
}

impl Session {
    /// Build the session for one message of the given binding
    pub fn for_binding(binding: &Binding) -> Self {
        Self {
            acknowledge: binding.auto_acknowledge,
            error: false,
            error_code: ERROR_CODE_UNSET,
            error_description: None,
            destination: binding.forward_target.clone(),
            attributes: HashMap::new(),
        }
    }
}
