// Worker - adaptive queue polling loop
//
// One scheduler task per binding decides when to admit new receive calls; the
// receive-and-process tasks themselves run on the runtime, bounded by a
// semaphore sized to the binding's maximum concurrency.

pub mod constants;
mod shutdown;

pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use constants::*;

use crate::application::binder;
use crate::application::dispatch::Dispatcher;
use crate::application::stat::ConcurrencyStat;
use crate::domain::{Binding, Message, Session};
use crate::error::AppError;
use crate::port::codec::Codec;
use crate::port::handler::Handler;
use crate::port::queue_service::QueueService;
use futures::FutureExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Worker ties one binding to its queue: polls on a fixed interval, scales
/// admission by recent poll yield, and runs the per-message pipeline.
pub struct Worker {
    binding: Arc<Binding>,
    handler: Arc<dyn Handler>,
    queue: Arc<dyn QueueService>,
    codec: Arc<dyn Codec>,
    dispatcher: Dispatcher,
    outstanding: Arc<AtomicUsize>,
    permits: Arc<Semaphore>,
}

impl Worker {
    pub fn new(
        binding: Arc<Binding>,
        handler: Arc<dyn Handler>,
        queue: Arc<dyn QueueService>,
        codec: Arc<dyn Codec>,
    ) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&queue), Arc::clone(&codec));
        let permits = Arc::new(Semaphore::new(binding.max_concurrency));
        Self {
            binding,
            handler,
            queue,
            codec,
            dispatcher,
            outstanding: Arc::new(AtomicUsize::new(0)),
            permits,
        }
    }

    /// Spawn the scheduler loop onto the runtime
    pub fn spawn(self, shutdown: ShutdownToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Run the scheduler loop until shutdown is signalled. Ticks fire on the
    /// binding's poll interval, starting immediately; nothing in the loop
    /// body blocks on queue I/O.
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            queue = %self.binding.queue_url,
            min = self.binding.min_concurrency,
            max = self.binding.max_concurrency,
            "worker started"
        );

        // the interval requires a non-zero period
        let period = self.binding.poll_interval.max(Duration::from_millis(1));
        let mut timer = tokio::time::interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut stat = ConcurrencyStat::new(STAT_WINDOW_SIZE);
        let mut ceiling = self.binding.min_concurrency;
        let mut inflight: Vec<JoinHandle<Result<usize, AppError>>> = Vec::new();

        loop {
            tokio::select! {
                _ = timer.tick() => {}
                _ = shutdown.wait() => {
                    info!(queue = %self.binding.queue_url, "worker shutting down");
                    break;
                }
            }
            if shutdown.is_shutdown() {
                break;
            }

            let outstanding = self.outstanding.load(Ordering::SeqCst);
            if outstanding < self.binding.min_concurrency || outstanding < ceiling {
                self.submit_receive(&mut inflight, &shutdown);
            }
            self.reap(&mut inflight, &mut stat, &mut ceiling);
        }

        // in-flight tasks run to completion on the runtime; no draining
        info!(queue = %self.binding.queue_url, "worker stopped");
    }

    /// Admit one receive-and-process task, bounded by the pool permits
    fn submit_receive(
        &self,
        inflight: &mut Vec<JoinHandle<Result<usize, AppError>>>,
        shutdown: &ShutdownToken,
    ) {
        let permit = match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(
                    queue = %self.binding.queue_url,
                    "receive submission rejected: pool exhausted"
                );
                return;
            }
        };

        let binding = Arc::clone(&self.binding);
        let handler = Arc::clone(&self.handler);
        let queue = Arc::clone(&self.queue);
        let codec = Arc::clone(&self.codec);
        let dispatcher = self.dispatcher.clone();
        let outstanding = Arc::clone(&self.outstanding);
        let shutdown = shutdown.clone();

        inflight.push(tokio::spawn(async move {
            let _permit = permit;
            outstanding.fetch_add(1, Ordering::SeqCst);
            let result =
                receive_and_process(&binding, &handler, &queue, &codec, &dispatcher).await;
            if let Err(e) = &result {
                if !shutdown.is_shutdown() {
                    error!(
                        queue = %binding.queue_url,
                        error = %e,
                        "error from queue polling task"
                    );
                }
            }
            outstanding.fetch_sub(1, Ordering::SeqCst);
            result
        }));
    }

    /// Remove finished tasks, feed their yield into the window, and
    /// recompute the ceiling only when the tracked set shrank
    fn reap(
        &self,
        inflight: &mut Vec<JoinHandle<Result<usize, AppError>>>,
        stat: &mut ConcurrencyStat,
        ceiling: &mut usize,
    ) {
        let before = inflight.len();
        let (finished, pending): (Vec<_>, Vec<_>) = std::mem::take(inflight)
            .into_iter()
            .partition(|h| h.is_finished());
        *inflight = pending;

        for handle in finished {
            match handle.now_or_never() {
                Some(Ok(Ok(received))) => {
                    stat.record(received as f64 / RECEIVE_BATCH_SIZE as f64);
                }
                Some(Ok(Err(_))) => {} // already logged by the task itself
                Some(Err(e)) => {
                    error!(
                        queue = %self.binding.queue_url,
                        error = %e,
                        "receive task panicked or was cancelled"
                    );
                }
                None => {}
            }
        }

        if inflight.len() < before {
            let next = stat.ceiling(self.binding.min_concurrency, self.binding.max_concurrency);
            if next != *ceiling {
                info!(queue = %self.binding.queue_url, ceiling = next, "concurrency ceiling");
                *ceiling = next;
            }
        }
    }
}

/// One pool task: receive a batch, run the pipeline over it sequentially.
/// Returns the batch size so the scheduler can sample the yield.
async fn receive_and_process(
    binding: &Binding,
    handler: &Arc<dyn Handler>,
    queue: &Arc<dyn QueueService>,
    codec: &Arc<dyn Codec>,
    dispatcher: &Dispatcher,
) -> Result<usize, AppError> {
    let messages = queue
        .receive(
            &binding.queue_url,
            RECEIVE_BATCH_SIZE,
            &binding.attribute_names,
        )
        .await?;
    let received = messages.len();
    for message in messages {
        process_message(binding, handler, codec, dispatcher, message).await;
    }
    Ok(received)
}

/// Per-message pipeline under its own span. Any failure is contained here:
/// the message stays unacknowledged and the rest of the batch continues.
async fn process_message(
    binding: &Binding,
    handler: &Arc<dyn Handler>,
    codec: &Arc<dyn Codec>,
    dispatcher: &Dispatcher,
    message: Message,
) {
    let span = info_span!(
        "message",
        queue = %binding.queue_name,
        message_id = %message.id,
        transaction = tracing::field::Empty
    );
    async {
        let mut session = Session::for_binding(binding);
        if let Err(e) =
            handle_message(binding, handler, codec, dispatcher, &message, &mut session).await
        {
            error!(error = %e, "error while handling message");
        }
    }
    .instrument(span)
    .await;
}

async fn handle_message(
    binding: &Binding,
    handler: &Arc<dyn Handler>,
    codec: &Arc<dyn Codec>,
    dispatcher: &Dispatcher,
    message: &Message,
    session: &mut Session,
) -> Result<(), AppError> {
    let args = binder::bind(binding, message, session, codec.as_ref())?;

    if let Some(name) = &binding.transaction_attribute {
        if let Some(value) = message
            .attributes
            .get(name)
            .and_then(|a| a.string_value.as_deref())
        {
            tracing::Span::current().record("transaction", value);
        }
    }

    if args.len() == binding.parameters.len() {
        let outcome = handler.handle(args, session).await?;
        dispatcher.dispatch(binding, session, outcome).await?;
    } else {
        // arity guard: never invoke with a short argument list
        debug!(
            bound = args.len(),
            declared = binding.parameters.len(),
            "argument count mismatch, handler not invoked"
        );
    }

    if session.acknowledge {
        dispatcher.acknowledge(binding, message).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BindingSpec, DeleteStatus, MessageAttribute, PayloadKind};
    use crate::port::codec::JsonCodec;
    use crate::port::handler::mocks::MockHandler;
    use crate::port::handler::HandlerOutcome;
    use crate::port::queue_service::mocks::ScriptedQueueService;
    use std::collections::HashMap;

    fn text_binding(spec: BindingSpec) -> Arc<Binding> {
        Arc::new(
            Binding::from_spec(
                &spec.payload_kind(PayloadKind::Text),
                "https://queues.invalid/orders".to_string(),
                None,
            )
            .unwrap(),
        )
    }

    fn batch(count: usize) -> Vec<Message> {
        (0..count)
            .map(|i| {
                Message::new(
                    format!("m-{}", i),
                    "hello",
                    HashMap::new(),
                    format!("r-{}", i),
                )
            })
            .collect()
    }

    async fn run_worker_until(
        worker: Worker,
        deadline: Duration,
        mut done: impl FnMut() -> bool,
    ) {
        let (tx, rx) = shutdown_channel();
        let task = worker.spawn(rx);
        let started = tokio::time::Instant::now();
        while !done() && started.elapsed() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tx.shutdown();
        let _ = task.await;
    }

    #[tokio::test]
    async fn test_batch_is_processed_and_acknowledged() {
        let queue = Arc::new(ScriptedQueueService::new());
        queue.push_batch(batch(10));
        let handler = Arc::new(MockHandler::new_success());
        let binding = text_binding(
            BindingSpec::new("orders")
                .concurrency(1, 5)
                .poll_interval(Duration::from_millis(5)),
        );

        let worker = Worker::new(
            binding,
            handler.clone(),
            queue.clone(),
            Arc::new(JsonCodec),
        );
        let q = queue.clone();
        run_worker_until(worker, Duration::from_secs(2), move || {
            q.deletes().len() == 10
        })
        .await;

        assert_eq!(handler.call_count(), 10);
        assert_eq!(queue.deletes().len(), 10);
        assert!(queue.sends().is_empty());
    }

    #[tokio::test]
    async fn test_failed_handler_leaves_message_unacknowledged() {
        let queue = Arc::new(ScriptedQueueService::new());
        queue.push_batch(batch(1));
        let handler = Arc::new(MockHandler::new_fail("boom"));
        let binding = text_binding(
            BindingSpec::new("orders").poll_interval(Duration::from_millis(5)),
        );

        let worker = Worker::new(
            binding,
            handler.clone(),
            queue.clone(),
            Arc::new(JsonCodec),
        );
        let h = handler.clone();
        run_worker_until(worker, Duration::from_secs(2), move || h.call_count() >= 1)
            .await;

        assert!(queue.deletes().is_empty());
    }

    #[tokio::test]
    async fn test_manual_acknowledge_off_skips_delete() {
        let queue = Arc::new(ScriptedQueueService::new());
        queue.push_batch(batch(1));
        let handler = Arc::new(MockHandler::new_success());
        let binding = text_binding(
            BindingSpec::new("orders")
                .auto_acknowledge(false)
                .poll_interval(Duration::from_millis(5)),
        );

        let worker = Worker::new(
            binding,
            handler.clone(),
            queue.clone(),
            Arc::new(JsonCodec),
        );
        let h = handler.clone();
        run_worker_until(worker, Duration::from_secs(2), move || h.call_count() >= 1)
            .await;

        assert_eq!(handler.call_count(), 1);
        assert!(queue.deletes().is_empty());
    }

    #[tokio::test]
    async fn test_non_success_delete_status_is_tolerated() {
        let queue = Arc::new(
            ScriptedQueueService::new().with_delete_status(DeleteStatus { code: 500 }),
        );
        queue.push_batch(batch(2));
        let handler = Arc::new(MockHandler::new_success());
        let binding = text_binding(
            BindingSpec::new("orders").poll_interval(Duration::from_millis(5)),
        );

        let worker = Worker::new(
            binding,
            handler.clone(),
            queue.clone(),
            Arc::new(JsonCodec),
        );
        let q = queue.clone();
        run_worker_until(worker, Duration::from_secs(2), move || {
            q.deletes().len() == 2
        })
        .await;

        // both messages processed; the bad status never aborts the batch
        assert_eq!(handler.call_count(), 2);
    }

    #[tokio::test]
    async fn test_receive_error_does_not_stop_the_loop() {
        let queue = Arc::new(ScriptedQueueService::new());
        queue.push_receive_error("transient outage");
        queue.push_batch(batch(1));
        let handler = Arc::new(MockHandler::new_success());
        let binding = text_binding(
            BindingSpec::new("orders").poll_interval(Duration::from_millis(5)),
        );

        let worker = Worker::new(
            binding,
            handler.clone(),
            queue.clone(),
            Arc::new(JsonCodec),
        );
        let q = queue.clone();
        run_worker_until(worker, Duration::from_secs(2), move || {
            q.deletes().len() == 1
        })
        .await;

        // the batch behind the failed poll still got through
        assert_eq!(handler.call_count(), 1);
        assert_eq!(queue.deletes().len(), 1);
    }

    #[tokio::test]
    async fn test_forwarded_result_carries_transaction_attribute() {
        let queue = Arc::new(ScriptedQueueService::new());
        let mut attrs = HashMap::new();
        attrs.insert("txn".to_string(), MessageAttribute::number("42"));
        queue.push_batch(vec![Message::new("m-0", "hello", attrs, "r-0")]);

        let handler = Arc::new(MockHandler::new_outcome(HandlerOutcome::Text(
            "done".to_string(),
        )));
        let spec = BindingSpec::new("orders")
            .poll_interval(Duration::from_millis(5))
            .forward_to("audit")
            .forward_as_raw_text(true)
            .transaction_attribute("txn")
            .payload_kind(PayloadKind::Text);
        let binding = Arc::new(
            Binding::from_spec(
                &spec,
                "https://queues.invalid/orders".to_string(),
                Some("https://queues.invalid/audit".to_string()),
            )
            .unwrap(),
        );

        let worker = Worker::new(
            binding,
            handler.clone(),
            queue.clone(),
            Arc::new(JsonCodec),
        );
        let q = queue.clone();
        run_worker_until(worker, Duration::from_secs(2), move || {
            q.deletes().len() == 1
        })
        .await;

        let sends = queue.sends();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].body, "done");
        let attrs = sends[0].attributes.clone().expect("attributes present");
        assert_eq!(attrs["txn"].string_value.as_deref(), Some("42"));
        assert_eq!(queue.deletes().len(), 1);
    }
}
