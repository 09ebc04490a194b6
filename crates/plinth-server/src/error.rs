//! Error taxonomy for request handling.
//!
//! Every failure the dispatcher can surface maps to one of these variants.
//! `HandlerTimeout` and `HandlerFault` produce the same response shape and
//! differ only in logs; transform failures for script requests never become
//! HTTP errors at all (see [`crate::transform::error_script`]).

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `ServerError` as the default error type.
pub type Result<T, E = ServerError> = std::result::Result<T, E>;

/// Request-level failures.
#[derive(Debug, Error)]
pub enum ServerError {
    /// No page, API, or route file resolves for the URL
    #[error("No route matches: {0}")]
    NotFound(String),

    /// A nested route handler exists but lacks the requested method export
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Handler code failed, either synchronously or from an asynchronous
    /// continuation
    #[error("Handler fault: {0}")]
    HandlerFault(String),

    /// The response never completed within the configured bound
    #[error("Handler timed out")]
    HandlerTimeout,

    /// The compiler collaborator rejected a source file
    #[error("Transform error in {}: {message}", .file.display())]
    TransformFault {
        /// File that failed to compile
        file: PathBuf,
        /// Compiler message
        message: String,
    },
}

/// Failures inside handler execution, before they are mapped to responses.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Handler code returned or threw an error
    #[error("{0}")]
    Fault(String),

    /// Response completion never arrived within the bound
    #[error("handler timed out")]
    Timeout,

    /// The response was dropped without a terminal call, so completion can
    /// never arrive
    #[error("response dropped without completing")]
    Incomplete,

    /// The requested HTTP method has no export on the resolved module
    #[error("no handler exported for method {0}")]
    MethodNotAllowed(String),

    /// Module loading failed
    #[error("failed to load handler module: {0}")]
    Load(String),

    /// JSON serialization inside a handler failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_fault_names_the_file() {
        let err = ServerError::TransformFault {
            file: PathBuf::from("/app/page.tsx"),
            message: "unexpected token".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/app/page.tsx"));
        assert!(msg.contains("unexpected token"));
    }

    #[test]
    fn method_not_allowed_is_distinct_from_not_found() {
        let not_allowed = ServerError::MethodNotAllowed("POST".to_string());
        let not_found = ServerError::NotFound("/api/x".to_string());
        assert_ne!(not_allowed.to_string(), not_found.to_string());
    }
}
