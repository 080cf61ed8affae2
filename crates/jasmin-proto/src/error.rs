//! The error taxonomy raised by the routing and delivery plane (§7).
//!
//! A single enum is shared by every crate so that the HTTP and SMPP server
//! surfaces can turn any of it into the literal response bodies in §6 with
//! one `match`, instead of each crate inventing its own error type that the
//! edges then have to translate.

use thiserror::Error;

/// Errors the core raises while admitting, routing, charging or delivering
/// a message. Every variant maps to exactly one category from §7.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum JasminError {
    #[error("Authentication failure for username:{username}")]
    Authentication { username: String },

    #[error("Authorization failure: {action} denied for username:{username}")]
    Authorization { username: String, action: String },

    #[error("Validation failure for argument {field}: {message}")]
    Validation { field: String, message: String },

    #[error("No route found for this routable (misconfiguration: default route missing)")]
    Routing,

    #[error("Charging failure: {reason}")]
    Charging { reason: String },

    #[error("Throughput exceeded for {surface}")]
    Throughput { surface: String },

    #[error("Transport failure: {reason}")]
    Transport { reason: String },

    #[error("Remote error {status} ({})", if *retryable { "retryable" } else { "terminal" })]
    Remote { status: String, retryable: bool },

    #[error("Message expired before send (validity_period elapsed)")]
    Expired,
}

impl JasminError {
    pub fn remote(status: impl Into<String>, retryable: bool) -> Self {
        Self::Remote {
            status: status.into(),
            retryable,
        }
    }

    /// HTTP status this error maps to per §6 ("turns core errors into
    /// user-visible 4xx/5xx").
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Authentication { .. } | Self::Authorization { .. } => 403,
            Self::Validation { .. } | Self::Routing => 400,
            Self::Charging { .. } | Self::Throughput { .. } => 400,
            Self::Transport { .. } | Self::Remote { .. } | Self::Expired => 500,
        }
    }

    /// The literal `Error "<text>"` body used by the HTTP surface (§6).
    pub fn http_body(&self) -> String {
        format!("Error \"{self}\"")
    }
}
