// Binding Domain Model - immutable queue-to-handler wiring

use crate::domain::error::{DomainError, Result};
use crate::domain::message::QueueAddress;
use std::time::Duration;

/// Registration defaults, mirroring the listener attributes
pub const DEFAULT_MIN_CONCURRENCY: usize = 1;
pub const DEFAULT_MAX_CONCURRENCY: usize = 1;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Role of one handler parameter position, resolved ahead of time so the hot
/// path needs no runtime type inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterRole {
    /// The message payload position
    Payload,
    /// A named message attribute
    Attribute(String),
    /// The per-message session
    Session,
}

/// Shape the payload position is bound as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// The raw message, unchanged
    Raw,
    /// The message body verbatim
    Text,
    /// The body decoded through the codec
    Decoded,
}

/// Unresolved registration-time description of one queue-to-handler wiring.
/// Queue and forward-target names may carry `${...}` placeholders.
#[derive(Debug, Clone)]
pub struct BindingSpec {
    pub queue: String,
    pub min_concurrency: usize,
    pub max_concurrency: usize,
    pub poll_interval: Duration,
    /// Accepted and carried, not enforced by the scheduling loop
    pub timeout: Duration,
    pub auto_acknowledge: bool,
    pub forward_target: Option<String>,
    pub forward_as_raw_text: bool,
    pub transaction_attribute: Option<String>,
    pub parameters: Vec<ParameterRole>,
    pub payload_kind: PayloadKind,
}

impl BindingSpec {
    /// A spec with the registration defaults: single decoded payload
    /// parameter, min 1, max 1, 10ms polling, auto-acknowledge on
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            min_concurrency: DEFAULT_MIN_CONCURRENCY,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: Duration::ZERO,
            auto_acknowledge: true,
            forward_target: None,
            forward_as_raw_text: false,
            transaction_attribute: None,
            parameters: vec![ParameterRole::Payload],
            payload_kind: PayloadKind::Decoded,
        }
    }

    pub fn concurrency(mut self, min: usize, max: usize) -> Self {
        self.min_concurrency = min;
        self.max_concurrency = max;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn auto_acknowledge(mut self, acknowledge: bool) -> Self {
        self.auto_acknowledge = acknowledge;
        self
    }

    pub fn forward_to(mut self, target: impl Into<String>) -> Self {
        self.forward_target = Some(target.into());
        self
    }

    /// Forward the result as its plain text representation instead of the
    /// structured encoding. Set when the handler's return is a text or
    /// numeric primitive.
    pub fn forward_as_raw_text(mut self, raw: bool) -> Self {
        self.forward_as_raw_text = raw;
        self
    }

    pub fn transaction_attribute(mut self, name: impl Into<String>) -> Self {
        self.transaction_attribute = Some(name.into());
        self
    }

    pub fn parameters(mut self, parameters: Vec<ParameterRole>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn payload_kind(mut self, kind: PayloadKind) -> Self {
        self.payload_kind = kind;
        self
    }
}

/// Resolved, validated wiring. Created once at registration, immutable
/// thereafter, owned by exactly one worker.
#[derive(Debug, Clone)]
pub struct Binding {
    /// Symbolic name the binding was registered under (registry key)
    pub queue_name: String,
    /// Resolved queue address
    pub queue_url: QueueAddress,
    pub min_concurrency: usize,
    pub max_concurrency: usize,
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub auto_acknowledge: bool,
    pub forward_target: Option<QueueAddress>,
    pub forward_as_raw_text: bool,
    pub transaction_attribute: Option<String>,
    pub parameters: Vec<ParameterRole>,
    pub payload_kind: PayloadKind,
    /// Attribute names this binding declares interest in: declared attribute
    /// parameters plus the transaction attribute, deduplicated. Passed to
    /// every receive call.
    pub attribute_names: Vec<String>,
}

impl Binding {
    /// Validate a spec against resolved addresses and produce the immutable
    /// binding. Fails with a `DomainError` when the spec violates the shape
    /// invariants; the caller skips that one registration and proceeds.
    pub fn from_spec(
        spec: &BindingSpec,
        queue_url: QueueAddress,
        forward_target: Option<QueueAddress>,
    ) -> Result<Self> {
        if spec.min_concurrency < 1 || spec.min_concurrency > spec.max_concurrency {
            return Err(DomainError::InvalidConcurrencyBounds {
                min: spec.min_concurrency,
                max: spec.max_concurrency,
            });
        }

        let payload_count = spec
            .parameters
            .iter()
            .filter(|r| **r == ParameterRole::Payload)
            .count();
        if payload_count == 0 {
            return Err(DomainError::MissingPayloadParameter);
        }
        if payload_count > 1 {
            return Err(DomainError::MultiplePayloadParameters(payload_count));
        }

        let session_count = spec
            .parameters
            .iter()
            .filter(|r| **r == ParameterRole::Session)
            .count();
        if session_count > 1 {
            return Err(DomainError::MultipleSessionParameters(session_count));
        }

        let mut attribute_names: Vec<String> = spec
            .parameters
            .iter()
            .filter_map(|r| match r {
                ParameterRole::Attribute(name) => Some(name.clone()),
                _ => None,
            })
            .collect();
        if let Some(name) = &spec.transaction_attribute {
            if !attribute_names.iter().any(|n| n == name) {
                attribute_names.push(name.clone());
            }
        }

        Ok(Self {
            queue_name: spec.queue.clone(),
            queue_url,
            min_concurrency: spec.min_concurrency,
            max_concurrency: spec.max_concurrency,
            poll_interval: spec.poll_interval,
            timeout: spec.timeout,
            auto_acknowledge: spec.auto_acknowledge,
            forward_target,
            forward_as_raw_text: spec.forward_as_raw_text,
            transaction_attribute: spec.transaction_attribute.clone(),
            parameters: spec.parameters.clone(),
            payload_kind: spec.payload_kind,
            attribute_names,
        })
    }

    /// Whether a session parameter position is declared
    pub fn has_session(&self) -> bool {
        self.parameters.contains(&ParameterRole::Session)
    }

    /// Whether results are forwarded after invocation
    pub fn forwards(&self) -> bool {
        self.forward_target.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(spec: &BindingSpec) -> Result<Binding> {
        Binding::from_spec(spec, "https://queues.invalid/q".to_string(), None)
    }

    #[test]
    fn test_defaults_mirror_registration_attributes() {
        let spec = BindingSpec::new("orders");
        assert_eq!(spec.min_concurrency, 1);
        assert_eq!(spec.max_concurrency, 1);
        assert_eq!(spec.poll_interval, Duration::from_millis(10));
        assert!(spec.auto_acknowledge);
        assert_eq!(spec.parameters, vec![ParameterRole::Payload]);
    }

    #[test]
    fn test_rejects_inverted_concurrency_bounds() {
        let spec = BindingSpec::new("orders").concurrency(5, 2);
        assert!(matches!(
            resolved(&spec),
            Err(DomainError::InvalidConcurrencyBounds { min: 5, max: 2 })
        ));

        let spec = BindingSpec::new("orders").concurrency(0, 2);
        assert!(matches!(
            resolved(&spec),
            Err(DomainError::InvalidConcurrencyBounds { .. })
        ));
    }

    #[test]
    fn test_requires_exactly_one_payload_position() {
        let spec = BindingSpec::new("orders").parameters(vec![ParameterRole::Session]);
        assert!(matches!(
            resolved(&spec),
            Err(DomainError::MissingPayloadParameter)
        ));

        let spec = BindingSpec::new("orders")
            .parameters(vec![ParameterRole::Payload, ParameterRole::Payload]);
        assert!(matches!(
            resolved(&spec),
            Err(DomainError::MultiplePayloadParameters(2))
        ));
    }

    #[test]
    fn test_rejects_two_session_positions() {
        let spec = BindingSpec::new("orders").parameters(vec![
            ParameterRole::Session,
            ParameterRole::Payload,
            ParameterRole::Session,
        ]);
        assert!(matches!(
            resolved(&spec),
            Err(DomainError::MultipleSessionParameters(2))
        ));
    }

    #[test]
    fn test_attribute_names_include_transaction_attribute_once() {
        let spec = BindingSpec::new("orders")
            .parameters(vec![
                ParameterRole::Payload,
                ParameterRole::Attribute("tenant".to_string()),
                ParameterRole::Attribute("txn".to_string()),
            ])
            .transaction_attribute("txn");
        let binding = resolved(&spec).unwrap();
        assert_eq!(binding.attribute_names, vec!["tenant", "txn"]);
    }

    #[test]
    fn test_forward_target_resolution_is_carried() {
        let spec = BindingSpec::new("orders").forward_to("audit");
        let binding = Binding::from_spec(
            &spec,
            "https://queues.invalid/orders".to_string(),
            Some("https://queues.invalid/audit".to_string()),
        )
        .unwrap();
        assert!(binding.forwards());
        assert_eq!(
            binding.forward_target.as_deref(),
            Some("https://queues.invalid/audit")
        );
    }
}
