//! End-to-end scenarios over the in-memory queue adapter: registration,
//! polling, binding, dispatch and acknowledgment working together.

use hopper_core::application::WorkerRegistry;
use hopper_core::domain::{BindingSpec, ParameterRole, PayloadKind, Session};
use hopper_core::port::codec::JsonCodec;
use hopper_core::port::config_resolver::mocks::MapResolver;
use hopper_core::port::handler::{handler_fn, Arguments, HandlerOutcome, PayloadArg};
use hopper_core::port::queue_service::QueueService;
use hopper_core::port::time_provider::SystemTimeProvider;
use hopper_infra_memory::InMemoryQueueService;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn engine() -> (Arc<InMemoryQueueService>, WorkerRegistry) {
    let queue = Arc::new(InMemoryQueueService::new(Arc::new(SystemTimeProvider)));
    let registry = WorkerRegistry::new(
        queue.clone(),
        Arc::new(JsonCodec),
        Arc::new(MapResolver::new([])),
    );
    (queue, registry)
}

async fn wait_for(deadline: Duration, mut done: impl FnMut() -> bool) {
    let started = tokio::time::Instant::now();
    while !done() && started.elapsed() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_ten_messages_drained_and_acknowledged() {
    let (queue, mut registry) = engine();
    let orders = queue.create_queue("orders");
    for i in 0..10 {
        queue
            .send(&orders, &format!("payload-{}", i), None)
            .await
            .unwrap();
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let handler = handler_fn(move |_args: Arguments, _session: &mut Session| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(HandlerOutcome::None)
    });

    registry
        .register(
            BindingSpec::new("orders")
                .concurrency(1, 5)
                .poll_interval(Duration::from_millis(5))
                .payload_kind(PayloadKind::Text),
            Arc::new(handler),
        )
        .await
        .unwrap();

    let q = queue.clone();
    let orders_url = orders.clone();
    wait_for(Duration::from_secs(5), move || q.depth(&orders_url) == 0).await;

    registry.shutdown_all();
    registry.join_all().await;

    // every message deleted, nothing forwarded anywhere
    assert_eq!(calls.load(Ordering::SeqCst), 10);
    assert_eq!(queue.depth(&orders), 0);
}

#[tokio::test]
async fn test_integer_result_forwards_as_plain_text() {
    let (queue, mut registry) = engine();
    let orders = queue.create_queue("orders");
    let audit = queue.create_queue("orders-audit");
    queue.send(&orders, "ignored", None).await.unwrap();

    let handler = handler_fn(|_args: Arguments, _session: &mut Session| {
        Ok(HandlerOutcome::Value(json!(42)))
    });

    registry
        .register(
            BindingSpec::new("orders")
                .poll_interval(Duration::from_millis(5))
                .payload_kind(PayloadKind::Text)
                .forward_to("orders-audit")
                .forward_as_raw_text(true),
            Arc::new(handler),
        )
        .await
        .unwrap();

    let q = queue.clone();
    let orders_url = orders.clone();
    wait_for(Duration::from_secs(5), move || q.depth(&orders_url) == 0).await;

    registry.shutdown_all();
    registry.join_all().await;

    let forwarded = queue.receive(&audit, 10, &[]).await.unwrap();
    assert_eq!(forwarded.len(), 1);
    // raw-text mode: the integer's text representation, not a structured doc
    assert_eq!(forwarded[0].body, "42");
    assert_eq!(queue.depth(&orders), 0);
}

#[tokio::test]
async fn test_decode_failure_is_recovered_into_the_session() {
    let (queue, mut registry) = engine();
    let orders = queue.create_queue("orders");
    queue.send(&orders, "{definitely not json", None).await.unwrap();

    let seen: Arc<Mutex<Vec<(bool, i32, bool)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let handler = handler_fn(move |args: Arguments, session: &mut Session| {
        let payload_absent = matches!(args.payload(), Some(PayloadArg::Absent));
        sink.lock()
            .unwrap()
            .push((session.error, session.error_code, payload_absent));
        Ok(HandlerOutcome::None)
    });

    registry
        .register(
            BindingSpec::new("orders")
                .poll_interval(Duration::from_millis(5))
                .parameters(vec![ParameterRole::Session, ParameterRole::Payload]),
            Arc::new(handler),
        )
        .await
        .unwrap();

    let q = queue.clone();
    let orders_url = orders.clone();
    wait_for(Duration::from_secs(5), move || q.depth(&orders_url) == 0).await;

    registry.shutdown_all();
    registry.join_all().await;

    let calls = seen.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (error, error_code, payload_absent) = calls[0];
    assert!(error, "session.error should be set");
    assert_eq!(error_code, 500);
    assert!(payload_absent, "payload argument should be absent");
    // recovery is not a failure: auto-acknowledge still deletes the message
    assert_eq!(queue.depth(&orders), 0);
}

#[tokio::test]
async fn test_handler_can_decline_acknowledgment() {
    let (queue, mut registry) = engine();
    let orders = queue.create_queue("orders");
    queue.send(&orders, "keep-me", None).await.unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let handler = handler_fn(move |_args: Arguments, session: &mut Session| {
        counter.fetch_add(1, Ordering::SeqCst);
        session.acknowledge = false;
        Ok(HandlerOutcome::None)
    });

    registry
        .register(
            BindingSpec::new("orders")
                .poll_interval(Duration::from_millis(5))
                .payload_kind(PayloadKind::Text),
            Arc::new(handler),
        )
        .await
        .unwrap();

    let c = calls.clone();
    wait_for(Duration::from_secs(5), move || c.load(Ordering::SeqCst) >= 1).await;

    registry.shutdown_all();
    registry.join_all().await;

    // the message was processed but never deleted
    assert!(calls.load(Ordering::SeqCst) >= 1);
    assert_eq!(queue.depth(&orders), 1);
}
