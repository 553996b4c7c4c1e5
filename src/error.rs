//! Application error types
//!
//! Every fallible operation in the broker returns [`AppResult`]. Errors are
//! grouped by where they originate: bad input from the caller, a failure
//! reported by (or while talking to) a payment processor, or local
//! infrastructure such as configuration and the override store.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Result type for broker operations
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub context: Option<String>,
}

#[derive(Debug, Error)]
pub enum AppErrorKind {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    External(#[from] ExternalError),

    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),
}

/// Input rejected before any processor call was made
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must be greater than or equal to 0.01")]
    NonPositiveAmount { field: String },

    #[error("{field} must be a valid email")]
    InvalidEmail { field: String },

    #[error("{field} should not be empty")]
    MissingField { field: String },

    #[error("{field} {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Invalid request body: {message}")]
    MalformedBody { message: String },
}

/// Failures reported by or while reaching a payment processor
#[derive(Debug, Clone, Error)]
pub enum ExternalError {
    /// The processor answered with an error payload
    #[error("{provider} API error: {message}")]
    Processor {
        provider: String,
        status: Option<u16>,
        message: String,
        code: Option<String>,
        error_type: Option<String>,
        causes: Vec<Value>,
    },

    /// The requested payment method is not enabled on the processor account
    #[error("{message}")]
    PaymentMethodNotEnabled {
        provider: String,
        method: String,
        message: String,
        help_url: String,
    },

    #[error("{provider} request failed: {message}")]
    Transport {
        provider: String,
        message: String,
        is_timeout: bool,
    },

    #[error("{provider} returned an unexpected response: {message}")]
    InvalidResponse { provider: String, message: String },
}

#[derive(Debug, Clone, Error)]
pub enum InfrastructureError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Status store error: {message}")]
    StatusStore { message: String },
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn validation(error: ValidationError) -> Self {
        Self::new(AppErrorKind::Validation(error))
    }

    pub fn external(error: ExternalError) -> Self {
        Self::new(AppErrorKind::External(error))
    }

    pub fn infrastructure(error: InfrastructureError) -> Self {
        Self::new(AppErrorKind::Infrastructure(error))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.kind, AppErrorKind::Validation(_))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{} ({})", self.kind, context),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl From<ValidationError> for AppError {
    fn from(error: ValidationError) -> Self {
        Self::validation(error)
    }
}

impl From<ExternalError> for AppError {
    fn from(error: ExternalError) -> Self {
        Self::external(error)
    }
}

impl From<InfrastructureError> for AppError {
    fn from(error: InfrastructureError) -> Self {
        Self::infrastructure(error)
    }
}
