//! Hopper Queue Engine - Main Entry Point
//!
//! Composition root: wires the in-memory queue adapter, the JSON codec and
//! the configuration resolver into a worker registry, then registers the
//! listener table. Handler registration is explicit application start-up
//! code; the engine core never discovers handlers on its own.

mod settings;
mod telemetry;

use anyhow::Result;
use hopper_core::application::WorkerRegistry;
use hopper_core::domain::{BindingSpec, MessageAttribute, ParameterRole, PayloadKind, Session};
use hopper_core::port::codec::JsonCodec;
use hopper_core::port::handler::{handler_fn, Arguments, Handler, HandlerOutcome};
use hopper_core::port::queue_service::QueueService;
use hopper_core::port::time_provider::SystemTimeProvider;
use hopper_infra_memory::InMemoryQueueService;
use serde_json::json;
use settings::SettingsResolver;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    let log_format = std::env::var("HOPPER_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("hopper=info"))
        .expect("Failed to create env filter");

    // Optional rolling file output (HOPPER_LOG_DIR); the guard must outlive main
    let mut file_guard = None;
    let file_layer = std::env::var("HOPPER_LOG_DIR").ok().map(|dir| {
        let appender = tracing_appender::rolling::daily(dir, "hopper-engine.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guard = Some(guard);
        fmt::layer().json().with_writer(writer)
    });
    let _file_guard = file_guard;

    match log_format.as_str() {
        "json" => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            // Development: Pretty formatting with colors
            tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .with(fmt::layer().pretty())
                .init();
        }
    }

    info!("Hopper Queue Engine v{} starting...", VERSION);

    // 1.1. Initialize OpenTelemetry (optional)
    if let Err(e) = telemetry::init_telemetry() {
        tracing::warn!(error = ?e, "Failed to initialize OpenTelemetry (continuing without it)");
    }

    // 2. Load configuration (placeholder resolution source)
    let resolver = Arc::new(SettingsResolver::load()?);

    // 3. Set up the queue service and demo queues
    let time_provider = Arc::new(SystemTimeProvider);
    let queue = Arc::new(InMemoryQueueService::new(time_provider));
    let orders_url = queue.create_queue("orders");
    queue.create_queue("orders-audit");

    // 4. Build the registry and register the listener table
    let mut registry = WorkerRegistry::new(queue.clone(), Arc::new(JsonCodec), resolver);

    let order_handler = handler_fn(|args: Arguments, session: &mut Session| {
        match args.decoded() {
            Some(order) => {
                let id = order
                    .get("id")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_string();
                let total = order.get("total").and_then(|v| v.as_f64()).unwrap_or(0.0);
                info!(order_id = %id, total = total, "order processed");
                Ok(HandlerOutcome::Value(
                    json!({ "order_id": id, "status": "processed" }),
                ))
            }
            None => {
                // decode failure details were recorded on the session
                warn!(
                    code = session.error_code,
                    description = ?session.error_description,
                    "skipping malformed order"
                );
                Ok(HandlerOutcome::None)
            }
        }
    });

    let audit_handler = handler_fn(|args: Arguments, _session: &mut Session| {
        if let Some(entry) = args.text() {
            info!(entry = %entry, "audit record");
        }
        Ok(HandlerOutcome::None)
    });

    let listeners: Vec<(BindingSpec, Arc<dyn Handler>)> = vec![
        (
            BindingSpec::new("orders")
                .concurrency(1, 4)
                .poll_interval(Duration::from_millis(50))
                .parameters(vec![ParameterRole::Session, ParameterRole::Payload])
                .forward_to("orders-audit")
                .transaction_attribute("trace-id"),
            Arc::new(order_handler),
        ),
        (
            BindingSpec::new("orders-audit")
                .concurrency(1, 2)
                .poll_interval(Duration::from_millis(50))
                .payload_kind(PayloadKind::Text),
            Arc::new(audit_handler),
        ),
    ];

    let started = registry.register_all(listeners).await;
    if started == 0 {
        anyhow::bail!("no listeners could be registered");
    }
    info!(listeners = started, "listeners running");

    // 5. Demo traffic so the engine has something to chew on
    let feeder_queue = queue.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        let mut n: u64 = 0;
        loop {
            ticker.tick().await;
            n += 1;
            let body = json!({ "id": format!("order-{}", n), "total": n as f64 * 9.5 })
                .to_string();
            let mut attrs = HashMap::new();
            attrs.insert("trace-id".to_string(), MessageAttribute::number(n));
            if let Err(e) = feeder_queue.send(&orders_url, &body, Some(&attrs)).await {
                warn!(error = %e, "demo feeder send failed");
            }
        }
    });

    // 6. Run until interrupted, then stop every worker
    info!("Hopper Queue Engine running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    registry.shutdown_all();
    registry.join_all().await;
    info!("All workers stopped");

    Ok(())
}
