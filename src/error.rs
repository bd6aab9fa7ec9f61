use axum::http::StatusCode;
use thiserror::Error;

/// Application-wide error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or semantically invalid input. Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced resource (order, wallet, transfer, ...) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was violated (duplicate reference, account
    /// already linked).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A debit would take the wallet below zero.
    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        requested: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    },

    /// The upstream payment processor rejected or failed the call.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Webhook signature did not verify. The payload must not be applied.
    #[error("Invalid webhook signature")]
    Signature,

    /// The active provider does not support this capability.
    #[error("Operation not supported by provider: {0}")]
    Unsupported(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// HTTP status this error maps to at the API boundary.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Provider(_) => StatusCode::BAD_GATEWAY,
            AppError::Signature => StatusCode::UNAUTHORIZED,
            AppError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short machine-readable code used in API error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            AppError::Provider(_) => "PROVIDER_ERROR",
            AppError::Signature => "INVALID_SIGNATURE",
            AppError::Unsupported(_) => "UNSUPPORTED",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True when a sqlx error is a unique-constraint violation. Used to turn
    /// duplicate references into `Conflict` instead of a 500.
    pub fn is_unique_violation(err: &sqlx::Error) -> bool {
        matches!(
            err,
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("missing".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AppError::Signature.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::InsufficientFunds {
                requested: dec!(100),
                available: dec!(50),
            }
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_insufficient_funds_message() {
        let err = AppError::InsufficientFunds {
            requested: dec!(5000),
            available: dec!(100),
        };
        let msg = err.to_string();
        assert!(msg.contains("5000"));
        assert!(msg.contains("100"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::Conflict("dup".into()).code(), "CONFLICT");
        assert_eq!(AppError::Provider("down".into()).code(), "PROVIDER_ERROR");
        assert_eq!(AppError::Unsupported("wallet transfer").code(), "UNSUPPORTED");
    }
}
