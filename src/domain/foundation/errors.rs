//! Error types shared across the domain layer.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' must be positive, got {actual}")]
    NotPositive { field: String, actual: i64 },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField {
            field: field.into(),
        }
    }

    /// Creates a not-positive validation error.
    pub fn not_positive(field: impl Into<String>, actual: i64) -> Self {
        ValidationError::NotPositive {
            field: field.into(),
            actual,
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Error codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Validation errors
    ValidationFailed,
    InvalidQuantity,
    InvalidAmount,

    // Inventory errors
    InsufficientStock,
    HoldNotFound,
    Backpressure,

    // Order errors
    InvalidStateTransfer,
    OrderNotFound,
    InvalidSignature,
    InvalidPaymentStatus,

    // Read-model errors
    OrderViewNotFound,

    // Infrastructure errors
    DependencyUnavailable,
    DatabaseError,
    CacheError,
    SerializationFailed,
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::InvalidQuantity => "INVALID_QUANTITY",
            ErrorCode::InvalidAmount => "INVALID_AMOUNT",
            ErrorCode::InsufficientStock => "INSUFFICIENT_STOCK",
            ErrorCode::HoldNotFound => "HOLD_NOT_FOUND",
            ErrorCode::Backpressure => "BACKPRESSURE",
            ErrorCode::InvalidStateTransfer => "INVALID_STATE_TRANSFER",
            ErrorCode::OrderNotFound => "ORDER_NOT_FOUND",
            ErrorCode::InvalidSignature => "INVALID_SIGNATURE",
            ErrorCode::InvalidPaymentStatus => "INVALID_PAYMENT_STATUS",
            ErrorCode::OrderViewNotFound => "ORDER_VIEW_NOT_FOUND",
            ErrorCode::DependencyUnavailable => "DEPENDENCY_UNAVAILABLE",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::CacheError => "CACHE_ERROR",
            ErrorCode::SerializationFailed => "SERIALIZATION_FAILED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Standard domain error with code, message, and optional details.
#[derive(Debug, Clone)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl DomainError {
    /// Creates a new domain error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Creates a validation error for a specific field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::ValidationFailed,
            message: message.into(),
            details: HashMap::new(),
        }
        .with_detail("field", field.into())
    }

    /// Adds a detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn invalid_quantity() -> Self {
        Self::new(ErrorCode::InvalidQuantity, "invalid quantity")
    }

    pub fn invalid_amount() -> Self {
        Self::new(ErrorCode::InvalidAmount, "invalid amount")
    }

    pub fn insufficient_stock() -> Self {
        Self::new(ErrorCode::InsufficientStock, "insufficient stock")
    }

    pub fn hold_not_found() -> Self {
        Self::new(ErrorCode::HoldNotFound, "hold not found")
    }

    pub fn backpressure() -> Self {
        Self::new(ErrorCode::Backpressure, "wal backpressure")
    }

    pub fn invalid_state_transfer() -> Self {
        Self::new(ErrorCode::InvalidStateTransfer, "invalid state transfer")
    }

    pub fn order_not_found(order_id: &str) -> Self {
        Self::new(ErrorCode::OrderNotFound, "order not found").with_detail("order_id", order_id)
    }

    pub fn invalid_signature() -> Self {
        Self::new(ErrorCode::InvalidSignature, "invalid payment signature")
    }

    pub fn invalid_payment_status(status: &str) -> Self {
        Self::new(ErrorCode::InvalidPaymentStatus, "invalid payment status")
            .with_detail("status", status)
    }

    pub fn order_view_not_found(order_id: &str) -> Self {
        Self::new(ErrorCode::OrderViewNotFound, "order view not found")
            .with_detail("order_id", order_id)
    }

    pub fn dependency(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DependencyUnavailable, message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CacheError, message)
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SerializationFailed, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}

impl From<ValidationError> for DomainError {
    fn from(err: ValidationError) -> Self {
        DomainError::new(ErrorCode::ValidationFailed, err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::serialization(err.to_string())
    }
}
