use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failure returned to the caller of a procedure.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProcedureError {
    #[error("invalid input: {message}")]
    InvalidInput {
        field: Option<String>,
        message: String,
    },

    #[error("authentication required")]
    Unauthorized,

    #[error("admin role required")]
    Forbidden,

    #[error("no procedure named '{0}'")]
    NotFound(String),

    #[error("procedure '{0}' is a mutation and must be called with POST")]
    MethodNotSupported(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProcedureError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ProcedureError::InvalidInput {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ProcedureError::InvalidInput { .. } => "INVALID_INPUT",
            ProcedureError::Unauthorized => "UNAUTHORIZED",
            ProcedureError::Forbidden => "FORBIDDEN",
            ProcedureError::NotFound(_) => "NOT_FOUND",
            ProcedureError::MethodNotSupported(_) => "METHOD_NOT_SUPPORTED",
            ProcedureError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ProcedureError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            ProcedureError::Unauthorized => StatusCode::UNAUTHORIZED,
            ProcedureError::Forbidden => StatusCode::FORBIDDEN,
            ProcedureError::NotFound(_) => StatusCode::NOT_FOUND,
            ProcedureError::MethodNotSupported(_) => StatusCode::METHOD_NOT_ALLOWED,
            ProcedureError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

impl IntoResponse for ProcedureError {
    fn into_response(self) -> Response {
        let field = match &self {
            ProcedureError::InvalidInput { field, .. } => field.clone(),
            _ => None,
        };
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code(),
                message: self.to_string(),
                field,
            },
        };

        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_input_response_names_field() {
        let response = ProcedureError::invalid("email", "must be a valid email address").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "INVALID_INPUT");
        assert_eq!(body["error"]["field"], "email");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ProcedureError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ProcedureError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ProcedureError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ProcedureError::MethodNotSupported("x".into()).status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }
}
