// In-Memory QueueService Implementation
//
// At-least-once semantics modeled the way a hosted queue behaves: received
// messages become invisible for a visibility window; deleting by receipt
// removes them for good, and an expired window puts them back on the queue
// with the old receipt invalidated.

use async_trait::async_trait;
use hopper_core::domain::{DeleteStatus, Message, MessageAttribute, QueueAddress, SendRequest};
use hopper_core::port::queue_service::{QueueService, QueueServiceError};
use hopper_core::port::TimeProvider;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

/// Default visibility window (30s, matching common provider defaults)
const DEFAULT_VISIBILITY_TIMEOUT_MS: i64 = 30_000;

const ADDRESS_PREFIX: &str = "https://queues.invalid/";

#[derive(Debug, Clone)]
struct StoredMessage {
    id: String,
    body: String,
    attributes: HashMap<String, MessageAttribute>,
}

#[derive(Debug)]
struct InflightMessage {
    message: StoredMessage,
    visible_at: i64,
}

#[derive(Debug, Default)]
struct QueueState {
    available: VecDeque<StoredMessage>,
    inflight: HashMap<String, InflightMessage>,
}

/// In-process queue service for local runs and integration tests
pub struct InMemoryQueueService {
    queues: Mutex<HashMap<QueueAddress, QueueState>>,
    time: Arc<dyn TimeProvider>,
    visibility_timeout_ms: i64,
}

impl InMemoryQueueService {
    pub fn new(time: Arc<dyn TimeProvider>) -> Self {
        Self::with_visibility_timeout(time, DEFAULT_VISIBILITY_TIMEOUT_MS)
    }

    pub fn with_visibility_timeout(time: Arc<dyn TimeProvider>, visibility_timeout_ms: i64) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            time,
            visibility_timeout_ms,
        }
    }

    /// Create a queue under a logical name; returns its address
    pub fn create_queue(&self, name: &str) -> QueueAddress {
        let url = format!("{}{}", ADDRESS_PREFIX, name);
        self.queues
            .lock()
            .unwrap()
            .entry(url.clone())
            .or_default();
        url
    }

    /// Messages currently visible (test observability)
    pub fn available_count(&self, queue_url: &str) -> usize {
        let mut queues = self.queues.lock().unwrap();
        match queues.get_mut(queue_url) {
            Some(state) => {
                Self::requeue_expired(state, self.time.now_millis());
                state.available.len()
            }
            None => 0,
        }
    }

    /// Messages received but neither deleted nor expired (test observability)
    pub fn inflight_count(&self, queue_url: &str) -> usize {
        let mut queues = self.queues.lock().unwrap();
        match queues.get_mut(queue_url) {
            Some(state) => {
                Self::requeue_expired(state, self.time.now_millis());
                state.inflight.len()
            }
            None => 0,
        }
    }

    /// Total messages still owned by the queue in any state
    pub fn depth(&self, queue_url: &str) -> usize {
        let queues = self.queues.lock().unwrap();
        match queues.get(queue_url) {
            Some(state) => state.available.len() + state.inflight.len(),
            None => 0,
        }
    }

    fn requeue_expired(state: &mut QueueState, now: i64) {
        let expired: Vec<String> = state
            .inflight
            .iter()
            .filter(|(_, m)| m.visible_at <= now)
            .map(|(receipt, _)| receipt.clone())
            .collect();
        for receipt in expired {
            if let Some(inflight) = state.inflight.remove(&receipt) {
                debug!(message_id = %inflight.message.id, "visibility expired, requeueing");
                state.available.push_back(inflight.message);
            }
        }
    }

    fn filter_attributes(
        attributes: &HashMap<String, MessageAttribute>,
        attribute_names: &[String],
    ) -> HashMap<String, MessageAttribute> {
        attributes
            .iter()
            .filter(|(name, _)| attribute_names.iter().any(|n| n == *name))
            .map(|(name, attr)| (name.clone(), attr.clone()))
            .collect()
    }
}

#[async_trait]
impl QueueService for InMemoryQueueService {
    async fn resolve(&self, name: &str) -> Result<QueueAddress, QueueServiceError> {
        let url = format!("{}{}", ADDRESS_PREFIX, name);
        if self.queues.lock().unwrap().contains_key(&url) {
            Ok(url)
        } else {
            Err(QueueServiceError::NotFound(name.to_string()))
        }
    }

    async fn receive(
        &self,
        queue_url: &str,
        max_messages: usize,
        attribute_names: &[String],
    ) -> Result<Vec<Message>, QueueServiceError> {
        let now = self.time.now_millis();
        let mut queues = self.queues.lock().unwrap();
        let state = queues
            .get_mut(queue_url)
            .ok_or_else(|| QueueServiceError::NotFound(queue_url.to_string()))?;

        Self::requeue_expired(state, now);

        let count = max_messages.min(state.available.len());
        let mut received = Vec::with_capacity(count);
        for _ in 0..count {
            let stored = match state.available.pop_front() {
                Some(m) => m,
                None => break,
            };
            let receipt = Uuid::new_v4().to_string();
            received.push(Message::new(
                stored.id.clone(),
                stored.body.clone(),
                Self::filter_attributes(&stored.attributes, attribute_names),
                receipt.clone(),
            ));
            state.inflight.insert(
                receipt,
                InflightMessage {
                    message: stored,
                    visible_at: now + self.visibility_timeout_ms,
                },
            );
        }
        Ok(received)
    }

    async fn delete(
        &self,
        queue_url: &str,
        receipt: &str,
    ) -> Result<DeleteStatus, QueueServiceError> {
        let mut queues = self.queues.lock().unwrap();
        let state = queues
            .get_mut(queue_url)
            .ok_or_else(|| QueueServiceError::NotFound(queue_url.to_string()))?;

        // an unknown or stale receipt is a non-success status, not an error
        if state.inflight.remove(receipt).is_some() {
            Ok(DeleteStatus::OK)
        } else {
            Ok(DeleteStatus { code: 404 })
        }
    }

    async fn send(
        &self,
        queue_url: &str,
        body: &str,
        attributes: Option<&HashMap<String, MessageAttribute>>,
    ) -> Result<(), QueueServiceError> {
        let mut queues = self.queues.lock().unwrap();
        let state = queues
            .get_mut(queue_url)
            .ok_or_else(|| QueueServiceError::NotFound(queue_url.to_string()))?;
        state.available.push_back(StoredMessage {
            id: Uuid::new_v4().to_string(),
            body: body.to_string(),
            attributes: attributes.cloned().unwrap_or_default(),
        });
        Ok(())
    }

    async fn send_request(&self, request: SendRequest) -> Result<(), QueueServiceError> {
        let attributes = if request.attributes.is_empty() {
            None
        } else {
            Some(&request.attributes)
        };
        self.send(&request.destination, &request.body, attributes)
            .await
    }
}
