//! HTTP endpoint handlers. These are thin proxies: validate, forward to the
//! examiner, relay its text verbatim. No parsing happens here.

use std::sync::Arc;

use axum::{
  extract::{rejection::JsonRejection, State},
  response::IntoResponse,
  Json,
};
use tracing::{error, info, instrument};

use crate::error::ApiError;
use crate::protocol::*;
use crate::state::AppState;

pub const MSG_GENERATE_INPUT: &str = "Bab 1, Bab 2, dan Bab 3 harus diisi";
pub const MSG_GENERATE_FAILED: &str = "Terjadi kesalahan saat menghasilkan pertanyaan";
pub const MSG_EVALUATE_INPUT: &str = "Pertanyaan dan jawaban harus diisi";
pub const MSG_EVALUATE_FAILED: &str = "Terjadi kesalahan saat mengevaluasi jawaban";

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { ok: true })
}

#[instrument(level = "info", skip_all)]
pub async fn http_generate_questions(
  State(state): State<Arc<AppState>>,
  body: Result<Json<GenerateIn>, JsonRejection>,
) -> Result<Json<GenerateOut>, ApiError> {
  let chapters = body
    .ok()
    .and_then(|Json(b)| b.into_chapters())
    .ok_or_else(|| ApiError::BadRequest(MSG_GENERATE_INPUT.into()))?;

  match state.examiner.generate_questions(&chapters).await {
    Ok(questions) => {
      info!(target: "sempro_backend", response_len = questions.len(), "Questions generated");
      Ok(Json(GenerateOut { success: true, questions }))
    }
    Err(e) => {
      error!(target: "sempro_backend", error = %e, "Question generation failed");
      Err(ApiError::Upstream { summary: MSG_GENERATE_FAILED, details: e.to_string() })
    }
  }
}

#[instrument(level = "info", skip_all)]
pub async fn http_evaluate_answer(
  State(state): State<Arc<AppState>>,
  body: Result<Json<EvaluateIn>, JsonRejection>,
) -> Result<Json<EvaluateOut>, ApiError> {
  let present = |s: Option<String>| s.filter(|s| !s.trim().is_empty());
  let (question, answer) = body
    .ok()
    .and_then(|Json(b)| Some((present(b.question)?, present(b.answer)?)))
    .ok_or_else(|| ApiError::BadRequest(MSG_EVALUATE_INPUT.into()))?;

  match state.examiner.evaluate_answer(&question, &answer).await {
    Ok(evaluation) => {
      info!(target: "sempro_backend", response_len = evaluation.len(), "Answer evaluated");
      Ok(Json(EvaluateOut { success: true, evaluation }))
    }
    Err(e) => {
      error!(target: "sempro_backend", error = %e, "Answer evaluation failed");
      Err(ApiError::Upstream { summary: MSG_EVALUATE_FAILED, details: e.to_string() })
    }
  }
}
