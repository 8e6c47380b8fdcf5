/// Error Handling Module
///
/// Every failure of the rotation flow lands in one of three buckets:
/// 1. Client input errors (malformed body, missing field, wrong verb)
/// 2. Authentication failures (unknown, consumed or raced refresh token)
/// 3. Internal faults (token generation, store, configuration)
///
/// `AppError` folds them together; `ErrorContext::respond` turns one into a
/// single log event plus a single HTTP response.

use actix_web::{http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Problems with the shape of the request itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    UnsupportedMethod(String),
    MalformedRequest(String),
    MissingParameter(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::UnsupportedMethod(method) => write!(f, "unsupported method {}", method),
            ClientError::MalformedRequest(detail) => write!(f, "malformed request body: {}", detail),
            ClientError::MissingParameter(field) => write!(f, "{} is required", field),
        }
    }
}

impl StdError for ClientError {}

/// Authentication failures.
///
/// Unknown, consumed and raced tokens all map to the one variant; callers must
/// not be able to tell them apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    InvalidRefreshToken,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidRefreshToken => write!(f, "Invalid refresh token"),
        }
    }
}

impl StdError for AuthError {}

/// Session store faults
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A unique column (access token, refresh token, device identity) is already taken
    Conflict(String),
    Unavailable(String),
    Timeout(u64),
    Query(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Conflict(what) => write!(f, "Duplicate entry: {}", what),
            StoreError::Unavailable(msg) => write!(f, "Session store unavailable: {}", msg),
            StoreError::Timeout(ms) => write!(f, "Session store call exceeded {}ms", ms),
            StoreError::Query(msg) => write!(f, "Query error: {}", msg),
        }
    }
}

impl StdError for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                StoreError::Conflict(
                    db_err
                        .constraint()
                        .unwrap_or("unique constraint")
                        .to_string(),
                )
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Query(err.to_string()),
        }
    }
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config value: {}", msg),
        }
    }
}

impl StdError for ConfigError {}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

#[derive(Debug)]
pub enum AppError {
    Client(ClientError),
    Auth(AuthError),
    Store(StoreError),
    Config(ConfigError),
    /// Token generation failures and anything else that is our fault
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Client(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Store(e) => write!(f, "{}", e),
            AppError::Config(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl From<ClientError> for AppError {
    fn from(err: ClientError) -> Self {
        AppError::Client(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Store(err.into())
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Human-readable error message
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    /// HTTP status code
    pub status: u16,
    /// Timestamp when error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl AppError {
    fn status_code_and_body(&self) -> (StatusCode, &'static str, &'static str) {
        match self {
            // Unknown verbs get 405 with a not-found errcode, as Matrix homeservers answer them
            AppError::Client(ClientError::UnsupportedMethod(_)) => {
                (StatusCode::METHOD_NOT_ALLOWED, "M_NOT_FOUND", "Bad method")
            }
            AppError::Client(ClientError::MalformedRequest(_)) => {
                (StatusCode::BAD_REQUEST, "M_BAD_JSON", "Invalid JSON")
            }
            AppError::Client(ClientError::MissingParameter(_)) => (
                StatusCode::BAD_REQUEST,
                "M_MISSING_PARAM",
                "refresh_token is required",
            ),
            AppError::Auth(AuthError::InvalidRefreshToken) => {
                (StatusCode::FORBIDDEN, "M_FORBIDDEN", "Invalid refresh token")
            }
            AppError::Store(_) | AppError::Config(_) | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "M_UNKNOWN",
                "Internal server error",
            ),
        }
    }
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let (status, code, message) = self.status_code_and_body();
        let error_response = ErrorResponse::new(
            request_id.to_string(),
            message.to_string(),
            code.to_string(),
            status.as_u16(),
        );
        (status, error_response)
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Client(e) => {
                tracing::info!(request_id = request_id, error = %e, "Rejected client request");
            }
            AppError::Auth(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Authentication error");
            }
            AppError::Store(e) => {
                tracing::error!(request_id = request_id, error = %e, "Session store error");
            }
            AppError::Config(e) => {
                tracing::error!(request_id = request_id, error = %e, "Configuration error");
            }
            AppError::Internal(msg) => {
                tracing::error!(request_id = request_id, error = %msg, "Internal error");
            }
        }
    }
}

// ============================================================================
// 4. ERROR CONTEXT
// ============================================================================

/// Per-request context carried through a handler so its log lines and its
/// error body share one request id
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Log `error` once and render it
    pub fn respond(&self, error: &AppError) -> HttpResponse {
        error.log_error(&self.request_id);
        let (status, body) = <AppError as ErrorHandler>::error_response(error, &self.request_id);
        HttpResponse::build(status).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_display() {
        let err = ClientError::MissingParameter("refresh_token".to_string());
        assert_eq!(err.to_string(), "refresh_token is required");
    }

    #[test]
    fn test_status_mapping() {
        let cases = vec![
            (AppError::from(ClientError::UnsupportedMethod("GET".into())), 405, "M_NOT_FOUND"),
            (AppError::from(ClientError::MalformedRequest("eof".into())), 400, "M_BAD_JSON"),
            (AppError::from(ClientError::MissingParameter("refresh_token".into())), 400, "M_MISSING_PARAM"),
            (AppError::from(AuthError::InvalidRefreshToken), 403, "M_FORBIDDEN"),
            (AppError::from(StoreError::Timeout(10)), 500, "M_UNKNOWN"),
            (AppError::Internal("rng".into()), 500, "M_UNKNOWN"),
        ];

        for (err, status, code) in cases {
            let (got_status, body) = <AppError as ErrorHandler>::error_response(&err, "req-1");
            assert_eq!(got_status.as_u16(), status, "{}", err);
            assert_eq!(body.code, code);
            assert_eq!(body.status, status);
            assert_eq!(body.error_id, "req-1");
        }
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let err = AppError::from(StoreError::Query("relation \"devices\" does not exist".into()));
        let (_, body) = <AppError as ErrorHandler>::error_response(&err, "req-2");
        assert_eq!(body.message, "Internal server error");
        assert!(!body.message.contains("devices"));
    }

    #[tokio::test]
    async fn test_error_body_carries_context_request_id() {
        let ctx = ErrorContext::new();
        let response = ctx.respond(&AppError::from(AuthError::InvalidRefreshToken));
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let bytes = actix_web::body::to_bytes(response.into_body()).await.unwrap();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error_id, ctx.request_id);
        assert_eq!(body.code, "M_FORBIDDEN");
    }

    #[test]
    fn test_each_context_gets_its_own_request_id() {
        assert_ne!(ErrorContext::new().request_id, ErrorContext::new().request_id);
    }
}
