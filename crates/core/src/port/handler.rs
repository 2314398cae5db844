// Handler Port (Interface)
// The driven side of the engine: a bound argument list in, an outcome out.

use crate::domain::{Message, SendRequest, Session};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// The payload position in the shape the binding declared
#[derive(Debug, Clone)]
pub enum PayloadArg {
    /// The raw message, unchanged
    Raw(Message),
    /// The message body verbatim
    Text(String),
    /// The body decoded through the codec
    Decoded(Value),
    /// Decode failed and was recovered into the session error fields
    Absent,
}

/// One bound argument position
#[derive(Debug, Clone)]
pub enum Argument {
    Payload(PayloadArg),
    /// Named attribute value; `None` when the message does not carry it
    Attribute(Option<String>),
    /// Marker for the session position; the session itself travels alongside
    /// the argument list
    Session,
}

/// Ordered argument list produced by the parameter binder
#[derive(Debug, Clone)]
pub struct Arguments(Vec<Argument>);

impl Arguments {
    pub fn new(args: Vec<Argument>) -> Self {
        Self(args)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Argument> {
        self.0.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Argument> {
        self.0.iter()
    }

    /// The payload position, if bound
    pub fn payload(&self) -> Option<&PayloadArg> {
        self.0.iter().find_map(|a| match a {
            Argument::Payload(p) => Some(p),
            _ => None,
        })
    }

    /// The payload as verbatim text, when bound that way
    pub fn text(&self) -> Option<&str> {
        match self.payload() {
            Some(PayloadArg::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// The payload as a decoded value, when bound that way
    pub fn decoded(&self) -> Option<&Value> {
        match self.payload() {
            Some(PayloadArg::Decoded(v)) => Some(v),
            _ => None,
        }
    }

    /// The payload as the raw message, when bound that way
    pub fn raw(&self) -> Option<&Message> {
        match self.payload() {
            Some(PayloadArg::Raw(m)) => Some(m),
            _ => None,
        }
    }

    /// Attribute values in declaration order
    pub fn attributes(&self) -> impl Iterator<Item = Option<&str>> {
        self.0.iter().filter_map(|a| match a {
            Argument::Attribute(v) => Some(v.as_deref()),
            _ => None,
        })
    }
}

/// What the handler produced
#[derive(Debug, Clone)]
pub enum HandlerOutcome {
    /// Nothing to forward
    None,
    /// A text result; forwarded verbatim in raw-text mode
    Text(String),
    /// A structured result; serialized through the codec unless the binding
    /// forwards raw text
    Value(Value),
    /// A fully-formed send instruction, passed through unmodified
    Request(SendRequest),
}

/// Handler errors. A failed invocation leaves the message unacknowledged.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("handler failed: {0}")]
    Failed(String),
}

/// Handler trait
///
/// The session is the per-message context: the handler may flip
/// `acknowledge`, set error state, override the forward destination, or add
/// outbound attributes.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(
        &self,
        args: Arguments,
        session: &mut Session,
    ) -> Result<HandlerOutcome, HandlerError>;
}

/// Adapter for plain synchronous handler functions
pub struct FnHandler<F> {
    func: F,
}

pub fn handler_fn<F>(func: F) -> FnHandler<F>
where
    F: Fn(Arguments, &mut Session) -> Result<HandlerOutcome, HandlerError> + Send + Sync,
{
    FnHandler { func }
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: Fn(Arguments, &mut Session) -> Result<HandlerOutcome, HandlerError> + Send + Sync,
{
    async fn handle(
        &self,
        args: Arguments,
        session: &mut Session,
    ) -> Result<HandlerOutcome, HandlerError> {
        (self.func)(args, session)
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mock handler behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Return the given outcome
        Succeed(HandlerOutcome),
        /// Fail with message
        Fail(String),
    }

    /// Mock handler that records every invocation
    pub struct MockHandler {
        behavior: MockBehavior,
        calls: Arc<Mutex<Vec<Arguments>>>,
    }

    impl MockHandler {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockBehavior::Succeed(HandlerOutcome::None))
        }

        pub fn new_outcome(outcome: HandlerOutcome) -> Self {
            Self::new(MockBehavior::Succeed(outcome))
        }

        pub fn new_fail(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Fail(message.into()))
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn calls(&self) -> Vec<Arguments> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Handler for MockHandler {
        async fn handle(
            &self,
            args: Arguments,
            _session: &mut Session,
        ) -> Result<HandlerOutcome, HandlerError> {
            self.calls.lock().unwrap().push(args);
            match self.behavior.clone() {
                MockBehavior::Succeed(outcome) => Ok(outcome),
                MockBehavior::Fail(msg) => Err(HandlerError::Failed(msg)),
            }
        }
    }
}
