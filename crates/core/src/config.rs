//! Environment-driven configuration.
//!
//! Every knob has a default so the service starts against a local NATS with
//! no configuration at all. Call [`load_dotenv`] before [`Config::from_env`].

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u16(key: &str, default: u16) -> u16 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub nats: NatsConfig,
    pub engine: EngineConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            nats: NatsConfig::from_env(),
            engine: EngineConfig::from_env(),
        }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  server:  {}:{}", self.server.host, self.server.port);
        tracing::info!(
            "  nats:    url={}, stream={}, subject={}, durable={}",
            self.nats.url,
            self.nats.stream,
            self.nats.subject,
            self.nats.durable_name
        );
        tracing::info!(
            "  limits:  in_flight={}, max_deliver={}, ack_wait={}ms, nak_delay={}ms",
            self.nats.max_in_flight,
            self.nats.max_deliver,
            self.nats.ack_wait_ms,
            self.nats.nak_delay_ms
        );
        tracing::info!(
            "  engine:  rules={}, schemas={}, entity_ttl={}ms",
            self.engine.rules_path.display(),
            self.engine.schema_dir.display(),
            self.engine.entity_ttl_ms
        );
    }
}

// ── HTTP server ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: env_or("SERVER_HOST", "0.0.0.0"),
            port: env_u16("SERVER_PORT", 8080),
        }
    }
}

// ── NATS / JetStream ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatsConfig {
    pub url: String,
    /// JetStream stream holding the vitals subjects.
    pub stream: String,
    /// Subject filter for the durable consumer.
    pub subject: String,
    /// Durable consumer name (shared across instances).
    pub durable_name: String,
    /// Subject alerts are published to.
    pub alert_subject: String,
    /// Bounded concurrency window for in-flight message handlers.
    pub max_in_flight: usize,
    /// Redelivery bound enforced by the broker.
    pub max_deliver: i64,
    /// Time the broker waits for an ack before redelivering.
    pub ack_wait_ms: u64,
    /// Redelivery delay requested on a negative acknowledgement.
    pub nak_delay_ms: u64,
    /// Startup acquisition retry bound.
    pub acquire_max_attempts: u32,
    /// Fixed delay between acquisition attempts.
    pub acquire_retry_delay_ms: u64,
}

impl NatsConfig {
    pub fn from_env() -> Self {
        Self {
            url: env_or("NATS_URL", "nats://127.0.0.1:4222"),
            stream: env_or("VITALS_STREAM", "VITALS"),
            subject: env_or("VITALS_SUBJECT", "patient.vitals.recorded"),
            durable_name: env_or("DURABLE_NAME", "vitalwatch-alerts"),
            alert_subject: env_or("ALERT_SUBJECT", "patient.alert.raised"),
            max_in_flight: env_u64("MAX_IN_FLIGHT", 100) as usize,
            max_deliver: env_u64("MAX_DELIVER", 5) as i64,
            ack_wait_ms: env_u64("ACK_WAIT_MS", 30_000),
            nak_delay_ms: env_u64("NAK_DELAY_MS", 2_000),
            acquire_max_attempts: env_u32("ACQUIRE_MAX_ATTEMPTS", 30),
            acquire_retry_delay_ms: env_u64("ACQUIRE_RETRY_DELAY_MS", 2_000),
        }
    }

    pub fn ack_wait(&self) -> Duration {
        Duration::from_millis(self.ack_wait_ms)
    }

    pub fn nak_delay(&self) -> Duration {
        Duration::from_millis(self.nak_delay_ms)
    }

    pub fn acquire_retry_delay(&self) -> Duration {
        Duration::from_millis(self.acquire_retry_delay_ms)
    }
}

// ── Engine ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// JSON rule file (thresholds, persistence, cutoffs).
    pub rules_path: PathBuf,
    /// Directory of `<schema_id>.json` validation schemas.
    pub schema_dir: PathBuf,
    /// Idle time after which a patient's state is evicted.
    pub entity_ttl_ms: u64,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            rules_path: PathBuf::from(env_or("RULES_PATH", "config/rules.json")),
            schema_dir: PathBuf::from(env_or("SCHEMA_DIR", "config/schemas")),
            entity_ttl_ms: env_u64("ENTITY_TTL_MS", 600_000),
        }
    }

    pub fn entity_ttl(&self) -> Duration {
        Duration::from_millis(self.entity_ttl_ms)
    }
}
