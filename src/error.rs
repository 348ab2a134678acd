use crate::backend::RemoteError;
use crate::domain::{BonusInfoError, Decimal, StatusTransitionError, UserId};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Errors produced by wallet operations, shared by every backend.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("wallet not found for user {0}")]
    NotFound(UserId),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },
    #[error(transparent)]
    InvalidTransition(#[from] StatusTransitionError),
    #[error("invalid bonus policy: {0}")]
    InvalidPolicy(#[from] BonusInfoError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("storage error: {0}")]
    Storage(String),
}

impl WalletError {
    /// Machine-readable code carried in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::NotFound(_) => "not_found",
            WalletError::InvalidAmount(_) => "invalid_amount",
            WalletError::InsufficientBalance { .. } => "insufficient_balance",
            WalletError::InvalidTransition(_) => "invalid_transition",
            WalletError::InvalidPolicy(_) => "invalid_policy",
            WalletError::Remote(_) => "remote_error",
            WalletError::Storage(_) => "storage_error",
        }
    }

    /// Domain errors are expected outcomes the caller shows to the user.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            WalletError::NotFound(_)
                | WalletError::InvalidAmount(_)
                | WalletError::InsufficientBalance { .. }
        )
    }

    pub fn status(&self) -> StatusCode {
        match self {
            WalletError::NotFound(_) => StatusCode::NOT_FOUND,
            WalletError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
            WalletError::InsufficientBalance { .. } | WalletError::InvalidTransition(_) => {
                StatusCode::CONFLICT
            }
            WalletError::Remote(_) => StatusCode::BAD_GATEWAY,
            WalletError::InvalidPolicy(_) | WalletError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Structured fields needed to rebuild the error on the other side of
    /// the wire.
    pub fn details(&self) -> Map<String, Value> {
        let mut details = Map::new();
        match self {
            WalletError::NotFound(user_id) => {
                details.insert("userId".into(), json!(user_id));
            }
            WalletError::InvalidAmount(reason) => {
                details.insert("reason".into(), json!(reason));
            }
            WalletError::InsufficientBalance {
                requested,
                available,
            } => {
                details.insert("requested".into(), json!(requested));
                details.insert("available".into(), json!(available));
            }
            WalletError::InvalidTransition(_)
            | WalletError::InvalidPolicy(_)
            | WalletError::Remote(_)
            | WalletError::Storage(_) => {}
        }
        details
    }
}

impl From<crate::db::StoreError> for WalletError {
    fn from(err: crate::db::StoreError) -> Self {
        WalletError::Storage(err.to_string())
    }
}

/// HTTP-facing error for the API layer.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Wallet(#[from] WalletError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BadRequest(msg) => {
                let mut body = Map::new();
                body.insert("code".into(), json!("bad_request"));
                body.insert("error".into(), json!(msg));
                (StatusCode::BAD_REQUEST, body)
            }
            AppError::Wallet(err) => {
                let mut body = err.details();
                body.insert("code".into(), json!(err.code()));
                body.insert("error".into(), json!(err.to_string()));
                (err.status(), body)
            }
        };

        (status, Json(Value::Object(body))).into_response()
    }
}
