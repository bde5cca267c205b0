//! Error types for the node API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use deepchain_ledger::{InferenceError, LedgerError};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Signature does not recover to a signer")]
    InvalidSignature,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl AppError {
    /// Stable kind reported to clients; ledger failures keep their taxonomy name.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NotFound",
            AppError::BadRequest(_) => "BadRequest",
            AppError::InvalidSignature => "InvalidSignature",
            AppError::Ledger(err) => err.kind(),
            AppError::Inference(InferenceError::NotFound(_)) => "NotFound",
            AppError::Inference(InferenceError::Malformed(_)) => "Malformed",
            AppError::Inference(InferenceError::ShapeMismatch { .. }) => "ShapeMismatch",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidSignature => StatusCode::UNAUTHORIZED,
            AppError::Ledger(LedgerError::WrongChain { .. } | LedgerError::InvalidNonce { .. }) => {
                StatusCode::CONFLICT
            }
            AppError::Ledger(_) => StatusCode::BAD_REQUEST,
            AppError::Inference(InferenceError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Inference(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!(kind = self.kind(), error = %self, "request rejected");

        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}
