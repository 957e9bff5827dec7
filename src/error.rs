use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::OrderStatus;
use crate::response::{ApiResponse, Meta};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("No transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order is closed")]
    OrderClosed,

    #[error("Order was already claimed by another driver")]
    AlreadyClaimed,

    #[error("Order is busy, retry shortly")]
    Retryable,

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("ORM error")]
    OrmError(sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine code so polling clients can tell expected race
    /// outcomes (refresh silently) from hard failures (surface to the user).
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::Forbidden => "forbidden",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::OrderClosed => "order_closed",
            AppError::AlreadyClaimed => "already_claimed",
            AppError::Retryable => "retryable",
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => "internal",
        }
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        // Lock waits are bounded by `lock_timeout`; Postgres reports expiry,
        // deadlocks and serialization failures as transient conditions the
        // client may simply resubmit.
        let text = err.to_string();
        if text.contains("lock timeout")
            || text.contains("deadlock detected")
            || text.contains("could not serialize access")
        {
            return AppError::Retryable;
        }
        AppError::OrmError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::OrderClosed => StatusCode::CONFLICT,
            AppError::AlreadyClaimed => StatusCode::CONFLICT,
            AppError::Retryable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ApiResponse::failure(self.to_string(), self.code(), Some(Meta::empty()));

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
