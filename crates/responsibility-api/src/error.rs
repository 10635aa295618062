//! Error model for the session layer.
//!
//! [`SessionError`] is what every session operation returns on failure. [`ErrorReport`] is the
//! serializable shape handed to the UI layer:
//! - stable error codes for frontend handling
//! - a user-facing message
//! - optional internal detail for logs
//! - a retry hint

use std::fmt;

use responsibility_core::{ContractView, CoreError};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::gateway::GatewayError;

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum SessionError {
    /// Missing or malformed required fields. Nothing was mutated.
    #[error("validation error: {0}")]
    Validation(String),
    /// A manual edit tried to write into the derived-task id namespace.
    #[error("task id is reserved for derived tasks: {0}")]
    ReservedId(String),
    #[error("unknown role: {0}")]
    UnknownRole(String),
    #[error("unknown {view} task: {id}")]
    UnknownTask { view: ContractView, id: String },
    /// The data source rejected a call. The in-memory mutation stays applied.
    #[error("persistence error during {operation}: {message}")]
    Persistence { operation: String, message: String },
}

impl SessionError {
    #[must_use]
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence { .. })
    }

    #[must_use]
    pub fn report(&self) -> ErrorReport {
        match self {
            Self::Validation(message) => ErrorReport::new(
                ErrorCode::VALIDATION_EMPTY_INPUT,
                message.clone(),
                ErrorCategory::Validation,
            ),
            Self::ReservedId(id) => ErrorReport::new(
                ErrorCode::VALIDATION_RESERVED_ID,
                "Tasks created from contract assignments are edited from the contract views",
                ErrorCategory::Validation,
            )
            .with_detail(id.clone()),
            Self::UnknownRole(role) => ErrorReport::new(
                ErrorCode::VALIDATION_UNKNOWN_ROLE,
                format!("Unknown role: {role}"),
                ErrorCategory::Validation,
            ),
            Self::UnknownTask { view, id } => ErrorReport::new(
                ErrorCode::VALIDATION_UNKNOWN_TASK,
                format!("Task not found in the {view} view: {id}"),
                ErrorCategory::Validation,
            ),
            Self::Persistence { operation, message } => {
                let code = if operation == "fetch_bundle" {
                    ErrorCode::PERSISTENCE_READ_FAILED
                } else {
                    ErrorCode::PERSISTENCE_WRITE_FAILED
                };
                let category = ErrorCategory::Persistence;
                ErrorReport::new(code, "Changes could not be saved", category)
                    .with_detail(format!("{operation}: {message}"))
                    .retryable()
            }
        }
    }
}

impl From<CoreError> for SessionError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(message) => Self::Validation(message),
        }
    }
}

impl From<GatewayError> for SessionError {
    fn from(err: GatewayError) -> Self {
        Self::Persistence {
            operation: err.operation,
            message: err.message,
        }
    }
}

/// Error categories for grouping and UI display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Validation,
    Persistence,
    Config,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Persistence => write!(f, "persistence"),
            Self::Config => write!(f, "config"),
        }
    }
}

/// Stable error codes. Format: `CATEGORY_SPECIFIC_ERROR`.
pub struct ErrorCode;

impl ErrorCode {
    pub const VALIDATION_EMPTY_INPUT: &'static str = "VALIDATION_EMPTY_INPUT";
    pub const VALIDATION_RESERVED_ID: &'static str = "VALIDATION_RESERVED_ID";
    pub const VALIDATION_UNKNOWN_ROLE: &'static str = "VALIDATION_UNKNOWN_ROLE";
    pub const VALIDATION_UNKNOWN_TASK: &'static str = "VALIDATION_UNKNOWN_TASK";

    pub const PERSISTENCE_READ_FAILED: &'static str = "PERSISTENCE_READ_FAILED";
    pub const PERSISTENCE_WRITE_FAILED: &'static str = "PERSISTENCE_WRITE_FAILED";

    pub const CONFIG_INVALID: &'static str = "CONFIG_INVALID";
}

/// Error as rendered by the UI layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorReport {
    pub code: String,
    pub message: String,
    /// Internal detail for logging, not shown to the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub retryable: bool,
    pub category: ErrorCategory,
}

impl ErrorReport {
    #[must_use]
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        category: ErrorCategory,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            detail: None,
            retryable: false,
            category,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    #[must_use]
    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<&SessionError> for ErrorReport {
    fn from(err: &SessionError) -> Self {
        err.report()
    }
}

impl From<&ConfigError> for ErrorReport {
    fn from(err: &ConfigError) -> Self {
        Self::new(
            ErrorCode::CONFIG_INVALID,
            "Configuration could not be loaded",
            ErrorCategory::Config,
        )
        .with_detail(err.to_string())
    }
}
