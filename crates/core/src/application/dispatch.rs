// Result Dispatcher - forwards handler results and acknowledges messages

use crate::domain::{AttributeValue, Binding, Message, MessageAttribute, Session};
use crate::error::{AppError, Result};
use crate::port::codec::Codec;
use crate::port::handler::HandlerOutcome;
use crate::port::queue_service::QueueService;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Decides how to serialize a handler's return value and where to send it,
/// then gates deletion on the session's acknowledge flag.
#[derive(Clone)]
pub struct Dispatcher {
    queue: Arc<dyn QueueService>,
    codec: Arc<dyn Codec>,
}

impl Dispatcher {
    pub fn new(queue: Arc<dyn QueueService>, codec: Arc<dyn Codec>) -> Self {
        Self { queue, codec }
    }

    /// Forward the outcome when the binding asks for it. A pre-built request
    /// always passes through unmodified; `None` means there is nothing to
    /// forward. Errors leave the message unacknowledged.
    pub async fn dispatch(
        &self,
        binding: &Binding,
        session: &Session,
        outcome: HandlerOutcome,
    ) -> Result<()> {
        match outcome {
            HandlerOutcome::Request(request) => {
                self.queue.send_request(request).await?;
            }
            HandlerOutcome::None => {}
            outcome if binding.forwards() => {
                if let Some(body) = self.render_body(binding, outcome)? {
                    let destination = session.destination.clone().ok_or_else(|| {
                        AppError::Dispatch(
                            "forwarding requested but no destination set".to_string(),
                        )
                    })?;
                    let attributes = outbound_attributes(&session.attributes);
                    self.queue
                        .send(&destination, &body, attributes.as_ref())
                        .await?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Delete the message by its receipt. Non-2xx statuses are reported and
    /// tolerated; the provider will redeliver if the delete truly failed.
    pub async fn acknowledge(&self, binding: &Binding, message: &Message) -> Result<()> {
        let status = self.queue.delete(&binding.queue_url, &message.receipt).await?;
        if !status.is_success() {
            info!(
                message_id = %message.id,
                code = status.code,
                "delete returned non-success status"
            );
        }
        Ok(())
    }

    fn render_body(&self, binding: &Binding, outcome: HandlerOutcome) -> Result<Option<String>> {
        let body = match outcome {
            HandlerOutcome::Text(s) if binding.forward_as_raw_text => s,
            HandlerOutcome::Text(s) => self.codec.encode(&Value::String(s))?,
            HandlerOutcome::Value(Value::String(s)) if binding.forward_as_raw_text => s,
            HandlerOutcome::Value(v) if binding.forward_as_raw_text => v.to_string(),
            HandlerOutcome::Value(v) => self.codec.encode(&v)?,
            HandlerOutcome::None | HandlerOutcome::Request(_) => return Ok(None),
        };
        Ok(Some(body))
    }
}

/// Map session attributes onto wire attributes; `None` when the bag is empty
/// so an empty set is omitted from the send, not sent as empty.
pub fn outbound_attributes(
    attributes: &HashMap<String, AttributeValue>,
) -> Option<HashMap<String, MessageAttribute>> {
    if attributes.is_empty() {
        return None;
    }
    let mapped = attributes
        .iter()
        .map(|(name, value)| {
            let attr = match value {
                AttributeValue::Text(s) => MessageAttribute::string(s.clone()),
                AttributeValue::Integer(i) => MessageAttribute::number(i),
                AttributeValue::Float(x) => MessageAttribute::number(x),
                AttributeValue::Bytes(b) => MessageAttribute::binary(b.clone()),
            };
            (name.clone(), attr)
        })
        .collect();
    Some(mapped)
}
