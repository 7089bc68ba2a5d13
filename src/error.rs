use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::data::{export::ExportError, filter::QueryError, loader::LoadError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    InvalidQuery(#[from] QueryError),

    #[error("Cutoff data is unavailable: {0}")]
    Degraded(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Failed to load cutoff data: {0}")]
    Load(#[from] LoadError),

    #[error("Failed to export results: {0}")]
    Export(#[from] ExportError),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            AppError::Degraded(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Load(_) | AppError::Export(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
