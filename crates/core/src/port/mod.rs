// Port Layer - Interfaces for external collaborators

pub mod codec;
pub mod config_resolver;
pub mod handler;
pub mod queue_service;
pub mod time_provider; // For deterministic testing

// Re-exports
pub use codec::{Codec, CodecError, JsonCodec};
pub use config_resolver::{ConfigResolver, ConfigResolverError, EnvResolver};
pub use handler::{
    handler_fn, Argument, Arguments, FnHandler, Handler, HandlerError, HandlerOutcome, PayloadArg,
};
pub use queue_service::{QueueService, QueueServiceError};
pub use time_provider::{SystemTimeProvider, TimeProvider};
