//! Error types for TAP operations.
//!
//! Every fallible operation in the crate returns [`TapResult`]. Failures carry a
//! structured [`ErrorContext`] describing which request or entity was involved.

use std::fmt;

/// Result type for TAP operations
pub type TapResult<T> = Result<T, TapError>;

/// Structured context for TAP errors.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation being performed (e.g., "launch_job", "load_tables")
    pub operation: Option<String>,
    /// The entity type involved (e.g., "job", "table", "group")
    pub entity: Option<String>,
    /// The entity identifier if applicable
    pub entity_id: Option<String>,
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

    /// Set the entity type.
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Set the entity ID.
    pub fn with_entity_id(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    /// Set additional details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    fn is_empty(&self) -> bool {
        self.operation.is_none()
            && self.entity.is_none()
            && self.entity_id.is_none()
            && self.details.is_none()
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        let mut parts = Vec::new();
        if let Some(ref op) = self.operation {
            parts.push(format!("operation={}", op));
        }
        if let Some(ref entity) = self.entity {
            parts.push(format!("entity={}", entity));
        }
        if let Some(ref id) = self.entity_id {
            parts.push(format!("id={}", id));
        }
        if let Some(ref details) = self.details {
            parts.push(format!("details={}", details));
        }
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Error type for TAP operations
#[derive(Debug, thiserror::Error)]
pub enum TapError {
    /// The server answered with a status other than the expected one.
    #[error("HTTP error {status}: {message} {context}")]
    Http {
        status: u16,
        message: String,
        context: ErrorContext,
    },

    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("Transport error: {message} {context}")]
    Transport {
        message: String,
        context: ErrorContext,
    },

    /// A response body could not be understood.
    #[error("Parse error: {message} {context}")]
    Parse {
        message: String,
        context: ErrorContext,
    },

    /// The caller supplied an invalid or incomplete argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration or client construction error.
    #[error("Configuration error: {message} {context}")]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    /// An asynchronous job finished in a failed phase.
    #[error("Job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TapError {
    /// Create an HTTP status error.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create an HTTP status error with context.
    pub fn http_with_context(
        status: u16,
        message: impl Into<String>,
        context: ErrorContext,
    ) -> Self {
        Self::Http {
            status,
            message: message.into(),
            context,
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a transport error with context.
    pub fn transport_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Transport {
            message: message.into(),
            context,
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a parse error with context.
    pub fn parse_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Parse {
            message: message.into(),
            context,
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a configuration error with context.
    pub fn configuration_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Configuration {
            message: message.into(),
            context,
        }
    }

    /// HTTP status code carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Attach (or replace) the context of a contextual error.
    pub fn with_context(self, context: ErrorContext) -> Self {
        match self {
            Self::Http {
                status, message, ..
            } => Self::Http {
                status,
                message,
                context,
            },
            Self::Transport { message, .. } => Self::Transport { message, context },
            Self::Parse { message, .. } => Self::Parse { message, context },
            Self::Configuration { message, .. } => Self::Configuration { message, context },
            other => other,
        }
    }
}

impl From<quick_xml::Error> for TapError {
    fn from(e: quick_xml::Error) -> Self {
        TapError::parse(format!("Malformed XML: {}", e))
    }
}

impl From<quick_xml::events::attributes::AttrError> for TapError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        TapError::parse(format!("Malformed XML attribute: {}", e))
    }
}
