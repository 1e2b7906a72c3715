//! Error types for the store, the examiner client, the session controller and
//! the HTTP surface.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use thiserror::Error;

use crate::protocol::ErrorOut;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("store io: {0}")]
  Io(#[from] std::io::Error),
  #[error("store encoding: {0}")]
  Json(#[from] serde_json::Error),
  #[error("store lock poisoned")]
  Poisoned,
}

/// Anything that went wrong talking to the generation service.
#[derive(Debug, Error)]
pub enum ExaminerError {
  #[error("request failed: {0}")]
  Transport(#[from] reqwest::Error),
  #[error("service returned HTTP {status}: {message}")]
  Status { status: u16, message: String },
  #[error("unexpected response: {0}")]
  Malformed(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
  /// Missing or out-of-range user input. Shown as-is, never retried.
  #[error("{0}")]
  InvalidInput(String),
  #[error(transparent)]
  Upstream(#[from] ExaminerError),
}

/// Errors returned by the HTTP handlers, rendered as `{error, details?}`.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  BadRequest(String),
  #[error("{summary}: {details}")]
  Upstream { summary: &'static str, details: String },
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, body) = match self {
      ApiError::BadRequest(error) => (StatusCode::BAD_REQUEST, ErrorOut { error, details: None }),
      ApiError::Upstream { summary, details } => (
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorOut { error: summary.to_string(), details: Some(details) },
      ),
    };
    (status, Json(body)).into_response()
  }
}
