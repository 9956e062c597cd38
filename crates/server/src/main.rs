//! vitalwatch: consumes patient vitals from a durable JetStream
//! subscription, evaluates threshold rules per patient, and publishes
//! alert events.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::Notify;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use vitalwatch_core::Config;
use vitalwatch_engine::{spawn_sweeper, RuleSet, StateStore, ThresholdEngine};
use vitalwatch_schema::SchemaRegistry;
use vitalwatch_server::{api, AppState, Counters, MessagePipeline};
use vitalwatch_stream::jetstream::{self, JetStreamPublisher, SubscriptionConfig};
use vitalwatch_stream::AcquireConfig;

#[derive(Parser, Debug)]
#[command(name = "vitalwatch", about = "Patient vitals threshold alerting service")]
struct Args {
    /// Rule file path (overrides RULES_PATH).
    #[arg(long)]
    rules_file: Option<PathBuf>,

    /// Schema directory (overrides SCHEMA_DIR).
    #[arg(long)]
    schema_dir: Option<PathBuf>,

    /// Status server port (overrides SERVER_PORT).
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    vitalwatch_core::config::load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::from_env();
    if let Some(rules_file) = args.rules_file {
        config.engine.rules_path = rules_file;
    }
    if let Some(schema_dir) = args.schema_dir {
        config.engine.schema_dir = schema_dir;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.log_summary();

    // Rule set and schemas are loaded once; failures here are fatal.
    let rules = RuleSet::from_path(&config.engine.rules_path)?;
    if rules.is_empty() {
        warn!("Rule set is empty, no alerts will be raised");
    }
    let registry = Arc::new(SchemaRegistry::load_or_defaults(&config.engine.schema_dir)?);

    let store = Arc::new(StateStore::new());
    let engine = Arc::new(ThresholdEngine::new(rules, store.clone()));
    let counters = Arc::new(Counters::new());
    let app_state = Arc::new(AppState::new(counters.clone(), store.clone()));

    // Read-only status surface.
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Status server listening on {}", addr);
    let router = api::router(app_state.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!("Status server failed: {}", e);
        }
    });

    // Acquire the durable subscription. The broker may still be starting,
    // so this retries with a bounded budget before giving up.
    let sub_config = SubscriptionConfig {
        url: config.nats.url.clone(),
        stream: config.nats.stream.clone(),
        filter_subject: config.nats.subject.clone(),
        durable_name: config.nats.durable_name.clone(),
        max_deliver: config.nats.max_deliver,
        ack_wait: config.nats.ack_wait(),
    };
    let retry = AcquireConfig {
        max_attempts: config.nats.acquire_max_attempts,
        retry_delay: config.nats.acquire_retry_delay(),
    };
    let (context, subscription) = jetstream::acquire(&sub_config, &retry).await?;
    app_state.connected.store(true, Ordering::Relaxed);
    info!(
        stream = %sub_config.stream,
        durable = %sub_config.durable_name,
        "Subscription live"
    );

    let publisher = Arc::new(JetStreamPublisher::new(context));

    // Eviction sweep period defaults to the TTL itself.
    let ttl = config.engine.entity_ttl();
    let sweeper = spawn_sweeper(store.clone(), ttl, ttl);

    let pipeline = MessagePipeline::new(
        engine,
        registry,
        publisher,
        counters,
        config.nats.alert_subject.clone(),
        config.nats.nak_delay(),
        config.nats.max_in_flight,
    );

    let shutdown = Arc::new(Notify::new());
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal_shutdown.notify_one();
        }
    });

    // Runs until shutdown or subscription close, draining in-flight
    // handlers before returning.
    pipeline.run(Box::new(subscription), shutdown).await;

    app_state.connected.store(false, Ordering::Relaxed);
    sweeper.stop().await;
    info!("Shutdown complete");
    Ok(())
}
