//! Gateway configuration
//!
//! Built once at startup (from the CLI) and handed to every component that
//! needs it; nothing reads process-wide globals after that.

use crate::error::Error;
use crate::Result;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MESSAGE_PATH: &str = "/message";

/// Cross-origin policy for the HTTP server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CorsSetting {
    #[default]
    Disabled,
    AnyOrigin,
    Origins(Vec<String>),
}

impl CorsSetting {
    /// Map the `--cors` flag: absent, present without values, or a list
    pub fn from_flag(values: Option<Vec<String>>) -> Self {
        match values {
            None => Self::Disabled,
            Some(origins) if origins.is_empty() || origins.iter().any(|o| o == "*") => {
                Self::AnyOrigin
            }
            Some(origins) => Self::Origins(origins),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Disabled => "disabled".to_string(),
            Self::AnyOrigin => "enabled (*)".to_string(),
            Self::Origins(origins) => format!("enabled ({})", origins.join(", ")),
        }
    }
}

#[derive(Clone)]
pub struct GatewayConfig {
    /// Shell command line of the stdio child
    pub stdio_command: String,
    pub port: u16,
    /// WebSocket upgrade path
    pub message_path: String,
    pub health_endpoints: Vec<String>,
    pub cors: CorsSetting,
    /// Bearer secret; `None` disables authentication
    pub api_token: Option<String>,
}

impl GatewayConfig {
    pub fn new(stdio_command: impl Into<String>) -> Self {
        Self {
            stdio_command: stdio_command.into(),
            port: DEFAULT_PORT,
            message_path: DEFAULT_MESSAGE_PATH.to_string(),
            health_endpoints: Vec::new(),
            cors: CorsSetting::Disabled,
            api_token: None,
        }
    }

    /// Check paths and command, collapsing duplicate health endpoints
    pub fn validate(mut self) -> Result<Self> {
        if self.stdio_command.trim().is_empty() {
            return Err(Error::InvalidConfig("stdio command is empty".to_string()));
        }

        if !self.message_path.starts_with('/') {
            return Err(Error::InvalidConfig(format!(
                "message path must start with '/': {}",
                self.message_path
            )));
        }

        let mut health = Vec::with_capacity(self.health_endpoints.len());
        for path in self.health_endpoints {
            if !path.starts_with('/') {
                return Err(Error::InvalidConfig(format!(
                    "health endpoint must start with '/': {}",
                    path
                )));
            }
            if path == self.message_path {
                return Err(Error::InvalidConfig(format!(
                    "health endpoint {} collides with the message path",
                    path
                )));
            }
            if !health.contains(&path) {
                health.push(path);
            }
        }
        self.health_endpoints = health;

        Ok(self)
    }

    pub fn auth_enabled(&self) -> bool {
        self.api_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("stdio_command", &self.stdio_command)
            .field("port", &self.port)
            .field("message_path", &self.message_path)
            .field("health_endpoints", &self.health_endpoints)
            .field("cors", &self.cors)
            .field("auth_enabled", &self.auth_enabled())
            .finish()
    }
}
