// Queue Service Port (Interface)
// Abstraction over the message queue provider; wire protocol, retries and
// backoff are the provider's concern.

use crate::domain::{DeleteStatus, Message, MessageAttribute, QueueAddress, SendRequest};
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Queue service errors
#[derive(Error, Debug)]
pub enum QueueServiceError {
    #[error("queue not found: {0}")]
    NotFound(String),

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("delete failed: {0}")]
    Delete(String),
}

/// Queue Service trait
///
/// Implementations:
/// - InMemoryQueueService (infra-memory): in-process queues with
///   visibility-timeout redelivery
#[async_trait]
pub trait QueueService: Send + Sync {
    /// Map a logical queue name to a concrete address. Identity when the
    /// name is already an address.
    async fn resolve(&self, name: &str) -> Result<QueueAddress, QueueServiceError>;

    /// Receive up to `max_messages` messages. Attribute filtering is
    /// restricted to the named attributes only.
    async fn receive(
        &self,
        queue_url: &str,
        max_messages: usize,
        attribute_names: &[String],
    ) -> Result<Vec<Message>, QueueServiceError>;

    /// Acknowledge a message by its receipt. A non-2xx status is reported,
    /// not raised.
    async fn delete(&self, queue_url: &str, receipt: &str)
        -> Result<DeleteStatus, QueueServiceError>;

    /// Send a body with optional outbound attributes. `None` omits the
    /// attribute set entirely.
    async fn send(
        &self,
        queue_url: &str,
        body: &str,
        attributes: Option<&HashMap<String, MessageAttribute>>,
    ) -> Result<(), QueueServiceError>;

    /// Send a pre-built request unmodified
    async fn send_request(&self, request: SendRequest) -> Result<(), QueueServiceError>;
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// One observed send, keeping the omitted-vs-empty attribute distinction
    #[derive(Debug, Clone)]
    pub struct RecordedSend {
        pub destination: String,
        pub body: String,
        pub attributes: Option<HashMap<String, MessageAttribute>>,
    }

    /// Scripted queue service: serves pre-loaded receive batches in order and
    /// records deletes and sends for assertions.
    pub struct ScriptedQueueService {
        batches: Mutex<VecDeque<Result<Vec<Message>, String>>>,
        deletes: Mutex<Vec<(String, String)>>,
        sends: Mutex<Vec<RecordedSend>>,
        requests: Mutex<Vec<SendRequest>>,
        delete_status: DeleteStatus,
    }

    impl ScriptedQueueService {
        pub fn new() -> Self {
            Self {
                batches: Mutex::new(VecDeque::new()),
                deletes: Mutex::new(Vec::new()),
                sends: Mutex::new(Vec::new()),
                requests: Mutex::new(Vec::new()),
                delete_status: DeleteStatus::OK,
            }
        }

        pub fn with_delete_status(mut self, status: DeleteStatus) -> Self {
            self.delete_status = status;
            self
        }

        /// Queue one receive result; once drained, receives return empty
        pub fn push_batch(&self, messages: Vec<Message>) {
            self.batches.lock().unwrap().push_back(Ok(messages));
        }

        pub fn push_receive_error(&self, detail: impl Into<String>) {
            self.batches.lock().unwrap().push_back(Err(detail.into()));
        }

        pub fn deletes(&self) -> Vec<(String, String)> {
            self.deletes.lock().unwrap().clone()
        }

        pub fn sends(&self) -> Vec<RecordedSend> {
            self.sends.lock().unwrap().clone()
        }

        /// Pre-built requests passed through `send_request`
        pub fn requests(&self) -> Vec<SendRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Default for ScriptedQueueService {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl QueueService for ScriptedQueueService {
        async fn resolve(&self, name: &str) -> Result<QueueAddress, QueueServiceError> {
            Ok(format!("https://queues.invalid/{}", name))
        }

        async fn receive(
            &self,
            _queue_url: &str,
            max_messages: usize,
            _attribute_names: &[String],
        ) -> Result<Vec<Message>, QueueServiceError> {
            match self.batches.lock().unwrap().pop_front() {
                Some(Ok(mut messages)) => {
                    messages.truncate(max_messages);
                    Ok(messages)
                }
                Some(Err(detail)) => Err(QueueServiceError::Receive(detail)),
                None => Ok(Vec::new()),
            }
        }

        async fn delete(
            &self,
            queue_url: &str,
            receipt: &str,
        ) -> Result<DeleteStatus, QueueServiceError> {
            self.deletes
                .lock()
                .unwrap()
                .push((queue_url.to_string(), receipt.to_string()));
            Ok(self.delete_status)
        }

        async fn send(
            &self,
            queue_url: &str,
            body: &str,
            attributes: Option<&HashMap<String, MessageAttribute>>,
        ) -> Result<(), QueueServiceError> {
            self.sends.lock().unwrap().push(RecordedSend {
                destination: queue_url.to_string(),
                body: body.to_string(),
                attributes: attributes.cloned(),
            });
            Ok(())
        }

        async fn send_request(&self, request: SendRequest) -> Result<(), QueueServiceError> {
            self.requests.lock().unwrap().push(request);
            Ok(())
        }
    }
}
