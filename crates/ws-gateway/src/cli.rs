//! Command-line interface

use clap::{Parser, ValueEnum};
use wsgw_core::config::{DEFAULT_MESSAGE_PATH, DEFAULT_PORT};
use wsgw_core::{CorsSetting, GatewayConfig};

/// Expose a stdio JSON-RPC server over WebSocket
#[derive(Debug, Parser)]
#[command(name = "ws-gateway", author, version, about)]
pub struct Cli {
    /// Command that runs the stdio server, e.g. "node server.js"
    #[arg(long)]
    pub stdio: String,

    /// Port to listen on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Path for WebSocket upgrades
    #[arg(long, default_value = DEFAULT_MESSAGE_PATH)]
    pub message_path: String,

    /// Health check path answering "ok" when ready; repeatable
    #[arg(long = "health-endpoint")]
    pub health_endpoints: Vec<String>,

    /// Enable CORS; without origins every origin is allowed
    #[arg(long, num_args = 0..)]
    pub cors: Option<Vec<String>>,

    /// Logging verbosity
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Bearer token required on every request except health checks
    #[arg(long, env = "HTTP_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Info,
    Debug,
    None,
}

impl LogLevel {
    /// Filter used when `RUST_LOG` is not set
    pub fn default_filter(self) -> &'static str {
        match self {
            LogLevel::Info => "ws_gateway=info,stdio_runner=info,tower_http=info",
            LogLevel::Debug => "ws_gateway=debug,stdio_runner=debug,wsgw_core=debug,tower_http=debug",
            LogLevel::None => "off",
        }
    }
}

impl Cli {
    pub fn into_config(self) -> GatewayConfig {
        let mut config = GatewayConfig::new(self.stdio);
        config.port = self.port;
        config.message_path = self.message_path;
        config.health_endpoints = self.health_endpoints;
        config.cors = CorsSetting::from_flag(self.cors);
        config.api_token = self.api_token;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["ws-gateway", "--stdio", "node server.js"]).unwrap();
        assert_eq!(cli.log_level, LogLevel::Info);

        let config = cli.into_config();
        assert_eq!(config.stdio_command, "node server.js");
        assert_eq!(config.port, 8000);
        assert_eq!(config.message_path, "/message");
        assert!(config.health_endpoints.is_empty());
        assert_eq!(config.cors, CorsSetting::Disabled);
    }

    #[test]
    fn stdio_is_required() {
        assert!(Cli::try_parse_from(["ws-gateway", "--port", "9000"]).is_err());
    }

    #[test]
    fn repeatable_health_endpoints() {
        let cli = Cli::try_parse_from([
            "ws-gateway",
            "--stdio",
            "cat",
            "--health-endpoint",
            "/healthz",
            "--health-endpoint",
            "/ready",
        ])
        .unwrap();
        assert_eq!(cli.health_endpoints, vec!["/healthz", "/ready"]);
    }

    #[test]
    fn cors_flag_forms() {
        let bare = Cli::try_parse_from(["ws-gateway", "--stdio", "cat", "--cors"]).unwrap();
        assert_eq!(bare.into_config().cors, CorsSetting::AnyOrigin);

        let listed = Cli::try_parse_from([
            "ws-gateway",
            "--stdio",
            "cat",
            "--cors",
            "https://a.example",
            "https://b.example",
        ])
        .unwrap();
        assert_eq!(
            listed.into_config().cors,
            CorsSetting::Origins(vec![
                "https://a.example".to_string(),
                "https://b.example".to_string()
            ])
        );
    }

    #[test]
    fn log_level_values() {
        let cli =
            Cli::try_parse_from(["ws-gateway", "--stdio", "cat", "--log-level", "none"]).unwrap();
        assert_eq!(cli.log_level.default_filter(), "off");
        assert!(
            Cli::try_parse_from(["ws-gateway", "--stdio", "cat", "--log-level", "loud"]).is_err()
        );
    }

    #[test]
    fn api_token_flag() {
        let cli = Cli::try_parse_from([
            "ws-gateway",
            "--stdio",
            "cat",
            "--api-token",
            "secret",
        ])
        .unwrap();
        assert!(cli.into_config().auth_enabled());
    }
}
