use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use railway_core::{CoreError, FieldError, GeocodeError, StoreError};
use railway_order::{OrderError, TicketFieldError};

/// One rejected input attribute. `index` points into the request's ticket list.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub field: String,
    pub message: String,
}

impl From<FieldError> for ErrorDetail {
    fn from(err: FieldError) -> Self {
        Self { index: None, field: err.field, message: err.message }
    }
}

impl From<TicketFieldError> for ErrorDetail {
    fn from(err: TicketFieldError) -> Self {
        Self { index: Some(err.index), field: err.field, message: err.message }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    AuthenticationError(String),
    #[error("{0}")]
    AuthorizationError(String),
    #[error("{message}")]
    ValidationError { message: String, details: Vec<ErrorDetail> },
    #[error("{0}")]
    NotFoundError(String),
    #[error("{0}")]
    InternalServerError(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>, details: Vec<ErrorDetail>) -> Self {
        AppError::ValidationError { message: message.into(), details }
    }

    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        Self::validation(
            "Invalid request",
            vec![ErrorDetail { index: None, field: field.to_string(), message: message.into() }],
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            AppError::ValidationError { message, details } => {
                (StatusCode::BAD_REQUEST, json!({ "error": message, "details": details }))
            }
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Internal Server Error" }))
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::validation(
            "Invalid request body",
            vec![ErrorDetail { index: None, field: "body".to_string(), message: rejection.body_text() }],
        )
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => {
                AppError::invalid_field(entity, format!("Invalid pk \"{}\" - object does not exist.", id))
            }
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(errors) => {
                AppError::validation("Invalid request", errors.into_iter().map(ErrorDetail::from).collect())
            }
            CoreError::NotFound { entity, id } => AppError::NotFoundError(format!("{} not found: {}", entity, id)),
            CoreError::Store(err) => err.into(),
            CoreError::Geocode(GeocodeError::NotFound(name)) => {
                AppError::invalid_field("name", format!("No location found for '{}'.", name))
            }
            // Provider detail is logged, not returned
            CoreError::Geocode(err) => AppError::InternalServerError(format!("Geocoding failed: {}", err)),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::EmptyOrder => AppError::invalid_field("tickets", err.to_string()),
            OrderError::Invalid(errors) => AppError::validation(
                format!("Order rejected: {} invalid ticket field(s)", errors.len()),
                errors.into_iter().map(ErrorDetail::from).collect(),
            ),
            OrderError::SeatTaken { index, journey_id, cargo, seat } => AppError::validation(
                "Seat already taken",
                vec![ErrorDetail {
                    index: Some(index),
                    field: "seat".to_string(),
                    message: format!(
                        "Seat {} in cargo {} is already taken on journey {}",
                        seat, cargo, journey_id
                    ),
                }],
            ),
            OrderError::NotFound(id) => AppError::NotFoundError(format!("Order not found: {}", id)),
            OrderError::Storage(err) => AppError::InternalServerError(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_seat_conflict_is_bad_request() {
        let err: AppError = OrderError::SeatTaken { index: 1, journey_id: Uuid::new_v4(), cargo: 1, seat: 2 }.into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_storage_failure_is_internal() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
        let err: AppError = OrderError::Storage(StoreError::backend(io)).into();
        assert!(matches!(err, AppError::InternalServerError(_)));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_missing_record_is_not_found() {
        let err: AppError = CoreError::NotFound { entity: "journey", id: Uuid::new_v4() }.into();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
