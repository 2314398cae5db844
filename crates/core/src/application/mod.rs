// Application Layer - the adaptive worker and its collaborators

pub mod binder;
pub mod dispatch;
pub mod registry;
pub mod stat;
pub mod worker;

// Re-exports
pub use dispatch::Dispatcher;
pub use registry::{WorkerHandle, WorkerRegistry};
pub use stat::ConcurrencyStat;
pub use worker::{shutdown_channel, ShutdownSender, ShutdownToken, Worker};
