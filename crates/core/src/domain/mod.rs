// Domain Layer - Pure business objects, no infrastructure dependencies

pub mod binding;
pub mod error;
pub mod message;
pub mod session;

// Re-exports
pub use binding::{Binding, BindingSpec, ParameterRole, PayloadKind};
pub use error::DomainError;
pub use message::{
    AttributeType, DeleteStatus, Message, MessageAttribute, MessageId, QueueAddress, Receipt,
    SendRequest,
};
pub use session::{AttributeValue, Session, ERROR_CODE_UNSET};
