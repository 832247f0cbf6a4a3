//! Shared server state
//!
//! One [`ServerState`] is built at startup and cloned into every handler and
//! connection task. It owns the message router, and through it both
//! registries, so separate instances never share sessions.

use crate::config::ServerConfig;
use crate::router::MessageRouter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

/// Body of `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub connections: usize,
    pub sessions: usize,
}

/// Handle to the relay shared by all connections
#[derive(Debug, Clone)]
pub struct ServerState {
    router: Arc<MessageRouter>,
    config: Arc<ServerConfig>,
    started_at: Instant,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            router: Arc::new(MessageRouter::new()),
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }

    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Live counters for monitoring
    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "ok".into(),
            uptime_secs: self.started_at.elapsed().as_secs(),
            connections: self.router.connection_count(),
            sessions: self.router.session_count(),
        }
    }

    /// Start the periodic sweep for unanswered offers.
    ///
    /// Returns `None` when no offer TTL is configured.
    pub fn spawn_offer_expiry(&self) -> Option<JoinHandle<()>> {
        let ttl = Duration::from_secs(self.config.offer_ttl_secs?);
        let period = Duration::from_secs(self.config.sweep_interval_secs.max(1));
        let router = Arc::clone(&self.router);

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                let _ = ticker.tick().await;
                let expired = router.expire_pending(ttl);
                debug!(expired, "offer expiry sweep");
            }
        }))
    }
}
