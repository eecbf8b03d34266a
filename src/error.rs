use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::db::DbError;
use crate::render::RenderError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("File not found")]
    NotFound,

    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid request body: {0}")]
    Body(#[from] JsonRejection),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "message": "File not found" })),
            )
                .into_response(),
            err => {
                tracing::error!("Request failed: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "message": "Internal Server Error",
                        "error": err.to_string(),
                    })),
                )
                    .into_response()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
