//! Type-safe error codes for API responses.
//!
//! Each error code carries:
//! - String representation for client consumption (e.g., "MISSING_PARAMETER")
//! - Integer code for logging and monitoring (e.g., 1001)
//! - Default human-readable message
//!
//! # Example
//!
//! ```rust
//! use axum_helpers::errors::ErrorCode;
//!
//! let code = ErrorCode::MissingParameter;
//! assert_eq!(code.as_str(), "MISSING_PARAMETER");
//! assert_eq!(code.code(), 1001);
//! ```

use serde::{Deserialize, Serialize};

/// Standardized error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Client errors (1000-1999)
    /// A required query or body field is absent
    MissingParameter,

    /// Requested resource was not found
    NotFound,

    /// Generic client error
    BadRequest,

    // Server errors (1000s)
    /// An unexpected internal server error occurred
    InternalError,

    // Store errors (2000-2999)
    /// A read or write against the feedback store failed
    StoreError,

    // Upstream errors (3000-3999)
    /// The mail provider rejected or failed the call
    ProviderError,
}

impl ErrorCode {
    /// Get the string representation for client consumption.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingParameter => "MISSING_PARAMETER",
            Self::NotFound => "NOT_FOUND",
            Self::BadRequest => "BAD_REQUEST",
            Self::InternalError => "INTERNAL_ERROR",
            Self::StoreError => "STORE_ERROR",
            Self::ProviderError => "PROVIDER_ERROR",
        }
    }

    /// Get the integer code for logging and monitoring.
    ///
    /// Ranges:
    /// - 1000-1999: Client and generic server errors
    /// - 2000-2999: Feedback store errors
    /// - 3000-3999: Mail provider errors
    pub fn code(&self) -> i32 {
        match self {
            Self::MissingParameter => 1001,
            Self::BadRequest => 1003,
            Self::NotFound => 1004,
            Self::InternalError => 1005,

            Self::StoreError => 2001,

            Self::ProviderError => 3001,
        }
    }

    /// Get the default user-facing error message.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::MissingParameter => "A required parameter is missing",
            Self::NotFound => "Resource not found",
            Self::BadRequest => "Bad request",
            Self::InternalError => "An internal server error occurred",
            Self::StoreError => "Feedback store operation failed",
            Self::ProviderError => "Mail provider call failed",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_string_representation() {
        assert_eq!(ErrorCode::MissingParameter.as_str(), "MISSING_PARAMETER");
        assert_eq!(ErrorCode::StoreError.as_str(), "STORE_ERROR");
        assert_eq!(ErrorCode::ProviderError.to_string(), "PROVIDER_ERROR");
    }

    #[test]
    fn test_error_code_ranges() {
        assert_eq!(ErrorCode::MissingParameter.code(), 1001);
        assert_eq!(ErrorCode::StoreError.code(), 2001);
        assert_eq!(ErrorCode::ProviderError.code(), 3001);
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::MissingParameter).unwrap();
        assert_eq!(json, "\"MISSING_PARAMETER\"");
        let code: ErrorCode = serde_json::from_str("\"STORE_ERROR\"").unwrap();
        assert_eq!(code, ErrorCode::StoreError);
    }
}
