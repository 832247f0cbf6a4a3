//! Server configuration.

use clap::Parser;
use serde::{Deserialize, Serialize};

const DEFAULT_PORT: u16 = 8999;
const DEFAULT_OUTBOUND_BUFFER: usize = 64;
const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;

/// Configuration for the relay, from command line flags or `RENCONTRES_*`
/// environment variables
#[derive(Clone, Debug, PartialEq, Eq, Parser, Serialize, Deserialize)]
#[command(name = "rencontres")]
#[command(about = "Rendezvous relay matching WebRTC offers to answers over WebSocket")]
#[command(version)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind
    #[arg(long, env = "RENCONTRES_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind
    #[arg(short, long, env = "RENCONTRES_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Messages queued per connection before further ones are dropped
    #[arg(long, env = "RENCONTRES_OUTBOUND_BUFFER", default_value_t = DEFAULT_OUTBOUND_BUFFER)]
    pub outbound_buffer: usize,

    /// Largest inbound WebSocket message accepted, in bytes
    #[arg(long, env = "RENCONTRES_MAX_MESSAGE_SIZE", default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
    pub max_message_size: usize,

    /// Drop offers nobody answered after this many seconds (disabled if unset)
    #[arg(long, env = "RENCONTRES_OFFER_TTL_SECS")]
    pub offer_ttl_secs: Option<u64>,

    /// How often to look for expired offers
    #[arg(long, env = "RENCONTRES_SWEEP_INTERVAL_SECS", default_value_t = DEFAULT_SWEEP_INTERVAL_SECS)]
    pub sweep_interval_secs: u64,

    /// Emit logs as JSON lines
    #[arg(long, env = "RENCONTRES_LOG_JSON")]
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            offer_ttl_secs: None,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            log_json: false,
        }
    }
}

impl ServerConfig {
    /// `host:port` for the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cli_defaults() {
        let parsed = ServerConfig::try_parse_from(["rencontres"]).unwrap();
        assert_eq!(parsed, ServerConfig::default());
    }

    #[test]
    fn default_listens_on_all_interfaces() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8999");
        assert!(cfg.offer_ttl_secs.is_none());
    }

    #[test]
    fn flags_override_defaults() {
        let cfg = ServerConfig::try_parse_from([
            "rencontres",
            "--host",
            "127.0.0.1",
            "-p",
            "9000",
            "--outbound-buffer",
            "8",
            "--offer-ttl-secs",
            "120",
            "--log-json",
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr(), "127.0.0.1:9000");
        assert_eq!(cfg.outbound_buffer, 8);
        assert_eq!(cfg.offer_ttl_secs, Some(120));
        assert!(cfg.log_json);
    }

    #[test]
    fn rejects_invalid_port() {
        assert!(ServerConfig::try_parse_from(["rencontres", "--port", "70000"]).is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: ServerConfig = serde_json::from_str(r#"{"port":3000,"offer_ttl_secs":60}"#).unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.offer_ttl_secs, Some(60));
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.outbound_buffer, DEFAULT_OUTBOUND_BUFFER);
    }
}
