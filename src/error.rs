// HTTP API error types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::db::session::StoreError;
use crate::db::schema::SchemaError;
use crate::domain::DomainError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 404 Not Found (also covers "exists but not yours")
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::InternalServerError(msg)
            | ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "error": true,
            "message": self.message(),
            "code": self.error_code()
        })
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => {
                // Absent and not-owned are reported identically
                ApiError::not_found("Record not found")
            }
            StoreError::Connection(_) => {
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            StoreError::UniqueViolation(msg) => ApiError::conflict(msg),
            StoreError::CheckViolation(msg) => ApiError::bad_request(msg),
            StoreError::Sqlx(sqlx_err) => {
                // Log the real error but return a generic message
                tracing::error!("sqlx error: {}", sqlx_err);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound => ApiError::not_found("Record not found"),
            DomainError::PortfolioNotEmpty { investment_count } => ApiError::conflict(format!(
                "Portfolio still holds {} investment(s); delete them first",
                investment_count
            )),
            DomainError::CrossTenantAssociation => {
                ApiError::bad_request("Investment and label belong to different users")
            }
            DomainError::NegativeAmount(field) => {
                ApiError::bad_request(format!("{} must be non-negative", field))
            }
            DomainError::DuplicateName(what) => {
                ApiError::conflict(format!("A {} with that name already exists", what))
            }
            DomainError::Store(e) => e.into(),
        }
    }
}

impl From<crate::auth::IdentityError> for ApiError {
    fn from(err: crate::auth::IdentityError) -> Self {
        match err {
            crate::auth::IdentityError::Unauthorized(msg) => ApiError::unauthorized(msg),
            crate::auth::IdentityError::NotConfigured => {
                tracing::error!("identity resolution not configured in this deployment mode");
                ApiError::internal_server_error("Identity resolution is not configured")
            }
        }
    }
}

impl From<SchemaError> for ApiError {
    fn from(err: SchemaError) -> Self {
        tracing::error!("schema initialization error: {}", err);
        ApiError::service_unavailable("Service is being updated, please try again later")
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_variants() {
        assert_eq!(ApiError::bad_request("x").status_code(), 400);
        assert_eq!(ApiError::not_found("x").status_code(), 404);
        assert_eq!(ApiError::conflict("x").status_code(), 409);
        assert_eq!(ApiError::service_unavailable("x").status_code(), 503);
    }

    #[test]
    fn not_found_and_not_owned_share_one_message() {
        let absent: ApiError = StoreError::NotFound.into();
        let foreign: ApiError = DomainError::NotFound.into();
        assert_eq!(absent.message(), foreign.message());
        assert_eq!(absent.error_code(), "NOT_FOUND");
    }

    #[test]
    fn json_body_shape() {
        let err = ApiError::conflict("duplicate");
        let body = err.to_json();
        assert_eq!(body["error"], true);
        assert_eq!(body["code"], "CONFLICT");
        assert_eq!(body["message"], "duplicate");
    }
}
