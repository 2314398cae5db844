// Hopper Infrastructure - In-Memory Queue Adapter
// Implements: QueueService with visibility-timeout redelivery

mod queue;

pub use queue::InMemoryQueueService;
