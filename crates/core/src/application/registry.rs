// Worker Registry - registration-time resolution and engine-wide shutdown
//
// Owned by whatever composes multiple bindings (the daemon). Each worker is
// independently addressable by the queue name it was registered under; no
// worker touches another's state.

use crate::application::worker::{shutdown_channel, ShutdownSender, Worker};
use crate::domain::{Binding, BindingSpec, QueueAddress};
use crate::error::{AppError, Result};
use crate::port::codec::Codec;
use crate::port::config_resolver::ConfigResolver;
use crate::port::handler::Handler;
use crate::port::queue_service::QueueService;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// A started worker: its binding, its shutdown signal, and its task
pub struct WorkerHandle {
    binding: Arc<Binding>,
    shutdown: ShutdownSender,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    /// Signal this worker to stop; in-flight work finishes on the runtime
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    /// Wait for the scheduler task to exit
    pub async fn join(&mut self) {
        let _ = (&mut self.task).await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Registry of live workers, keyed by the symbolic queue name
pub struct WorkerRegistry {
    queue: Arc<dyn QueueService>,
    codec: Arc<dyn Codec>,
    resolver: Arc<dyn ConfigResolver>,
    workers: HashMap<String, WorkerHandle>,
}

impl WorkerRegistry {
    pub fn new(
        queue: Arc<dyn QueueService>,
        codec: Arc<dyn Codec>,
        resolver: Arc<dyn ConfigResolver>,
    ) -> Self {
        Self {
            queue,
            codec,
            resolver,
            workers: HashMap::new(),
        }
    }

    /// Resolve, validate and start one binding. A failure here is fatal to
    /// this binding only; the registry is left unchanged.
    pub async fn register(&mut self, spec: BindingSpec, handler: Arc<dyn Handler>) -> Result<()> {
        if self.workers.contains_key(&spec.queue) {
            return Err(AppError::Conflict(format!(
                "worker already registered for queue: {}",
                spec.queue
            )));
        }

        let queue_url = self.resolve_identifier(&spec.queue).await?;
        let forward_target = match &spec.forward_target {
            Some(raw) => Some(self.resolve_identifier(raw).await?),
            None => None,
        };
        let binding = Arc::new(Binding::from_spec(&spec, queue_url, forward_target)?);

        info!(
            queue = %binding.queue_url,
            min = binding.min_concurrency,
            max = binding.max_concurrency,
            timeout_ms = binding.timeout.as_millis() as u64,
            polling_ms = binding.poll_interval.as_millis() as u64,
            "starting listener"
        );

        let (sender, token) = shutdown_channel();
        let worker = Worker::new(
            Arc::clone(&binding),
            handler,
            Arc::clone(&self.queue),
            Arc::clone(&self.codec),
        );
        let task = worker.spawn(token);
        self.workers.insert(
            binding.queue_name.clone(),
            WorkerHandle {
                binding,
                shutdown: sender,
                task,
            },
        );
        Ok(())
    }

    /// Register a batch of bindings. Failures are logged and skipped so one
    /// bad binding never aborts the rest. Returns how many workers started.
    pub async fn register_all(
        &mut self,
        entries: impl IntoIterator<Item = (BindingSpec, Arc<dyn Handler>)>,
    ) -> usize {
        let mut started = 0;
        for (spec, handler) in entries {
            let queue = spec.queue.clone();
            match self.register(spec, handler).await {
                Ok(()) => started += 1,
                Err(e) => error!(queue = %queue, error = %e, "error registering listener"),
            }
        }
        started
    }

    /// Materialize placeholders, then resolve logical names to addresses.
    /// Values that already carry a direct address are used verbatim.
    async fn resolve_identifier(&self, raw: &str) -> Result<QueueAddress> {
        let name = if raw.contains("${") {
            self.resolver.resolve(raw)?
        } else {
            raw.to_string()
        };
        if name.to_lowercase().contains("https://") {
            Ok(name)
        } else {
            Ok(self.queue.resolve(&name).await?)
        }
    }

    pub fn worker(&self, queue_name: &str) -> Option<&WorkerHandle> {
        self.workers.get(queue_name)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Signal every worker to stop
    pub fn shutdown_all(&self) {
        for handle in self.workers.values() {
            handle.shutdown();
        }
    }

    /// Wait for every scheduler task to exit
    pub async fn join_all(&mut self) {
        for handle in self.workers.values_mut() {
            handle.join().await;
        }
    }
}
