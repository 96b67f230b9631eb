//! Error types for snapshot persistence and configuration loading.
//!
//! Persistence failures never abort a scheduling request; these errors are
//! logged by the manager and surfaced directly only by the config loaders and
//! the store implementations themselves.

use std::fmt;
use std::path::{Path, PathBuf};

/// Result type for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Where and why a persistence error happened.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation being performed (e.g., "load_state", "save_state")
    pub operation: Option<String>,
    /// File involved, if any
    pub path: Option<PathBuf>,
    /// Additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with an operation name.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Default::default()
        }
    }

    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref op) = self.operation {
            parts.push(format!("operation={}", op));
        }
        if let Some(ref path) = self.path {
            parts.push(format!("path={}", path.display()));
        }
        if let Some(ref details) = self.details {
            parts.push(format!("details={}", details));
        }
        write!(f, "[{}]", parts.join(", "))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Reading or writing the snapshot failed at the OS level.
    #[error("I/O error: {message} {context}")]
    Io {
        message: String,
        context: ErrorContext,
    },

    /// The snapshot exists but cannot be decoded into a task table.
    #[error("Corrupt snapshot: {message} {context}")]
    Corrupt {
        message: String,
        context: ErrorContext,
    },

    /// Configuration file missing, unreadable or invalid.
    #[error("Configuration error: {message} {context}")]
    Configuration {
        message: String,
        context: ErrorContext,
    },
}

impl PersistenceError {
    pub fn io(err: std::io::Error, context: ErrorContext) -> Self {
        Self::Io {
            message: err.to_string(),
            context,
        }
    }

    pub fn corrupt(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Corrupt {
            message: message.into(),
            context,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn configuration_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Configuration {
            message: message.into(),
            context,
        }
    }

    /// Get the error context.
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Io { context, .. } => context,
            Self::Corrupt { context, .. } => context,
            Self::Configuration { context, .. } => context,
        }
    }
}
