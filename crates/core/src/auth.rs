//! Shared-secret bearer authentication
//!
//! One rule serves both the plain HTTP path and the WebSocket upgrade path:
//! with no secret configured every request is allowed, otherwise the
//! `Authorization` header must be exactly `Bearer <secret>`.

use std::fmt;

const BEARER_PREFIX: &str = "Bearer ";

/// Reason a request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    MissingHeader,
    NotBearer,
    TokenMismatch,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingHeader => "missing authorization header",
            Self::NotBearer => "authorization is not a bearer token",
            Self::TokenMismatch => "bearer token mismatch",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`AuthGate::authorize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Allowed,
    Denied(DenyReason),
}

impl AuthDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Static, process-wide bearer token check
#[derive(Clone, Default)]
pub struct AuthGate {
    secret: Option<String>,
}

impl AuthGate {
    /// Build a gate; an absent or empty secret disables authentication
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Check the raw value of an `Authorization` header
    pub fn authorize(&self, authorization: Option<&str>) -> AuthDecision {
        let Some(secret) = self.secret.as_deref() else {
            return AuthDecision::Allowed;
        };

        let Some(header) = authorization else {
            return AuthDecision::Denied(DenyReason::MissingHeader);
        };

        match header.strip_prefix(BEARER_PREFIX) {
            Some(token) if token == secret => AuthDecision::Allowed,
            Some(_) => AuthDecision::Denied(DenyReason::TokenMismatch),
            None => AuthDecision::Denied(DenyReason::NotBearer),
        }
    }
}

// The secret never appears in logs.
impl fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthGate")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
