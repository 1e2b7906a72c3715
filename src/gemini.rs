//! Minimal client for the generative-language service.
//!
//! We only call `models/{model}:generateContent` with one text part and relay the
//! first candidate's text verbatim. Calls are instrumented with model name,
//! latency and response size. Contents only show up truncated at debug level.
//!
//! NOTE: the API key travels as a query parameter; it is never logged.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::config::{Prompts, Settings};
use crate::domain::Chapters;
use crate::error::ExaminerError;
use crate::util::{fill_template, trunc_for_log};

/// The examiner behind both proxy endpoints and the rehearsal session.
#[async_trait]
pub trait Examiner: Send + Sync {
  /// Raw candidate-question text for three chapters.
  async fn generate_questions(&self, chapters: &Chapters) -> Result<String, ExaminerError>;
  /// Raw feedback text for one answer.
  async fn evaluate_answer(&self, question: &str, answer: &str) -> Result<String, ExaminerError>;
}

#[derive(Clone)]
pub struct GeminiClient {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
  prompts: Prompts,
}

impl GeminiClient {
  pub fn new(settings: &Settings) -> Result<Self, ExaminerError> {
    let client = reqwest::Client::builder().timeout(settings.gemini_timeout).build()?;
    Ok(Self {
      client,
      api_key: settings.gemini_api_key.clone(),
      base_url: settings.gemini_base_url.clone(),
      model: settings.gemini_model.clone(),
      prompts: settings.prompts.clone(),
    })
  }

  pub fn has_api_key(&self) -> bool {
    !self.api_key.is_empty()
  }

  /// One prompt in, first candidate's text out.
  #[instrument(level = "info", skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
  async fn generate_content(&self, prompt: &str) -> Result<String, ExaminerError> {
    let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
    let req = GenerateContentRequest {
      contents: vec![Content { parts: vec![Part { text: prompt.to_string() }] }],
    };

    let start = Instant::now();
    let res = self
      .client
      .post(&url)
      .query(&[("key", self.api_key.as_str())])
      .header(USER_AGENT, "sempro-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .json(&req)
      .send()
      .await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_service_error(&body).unwrap_or(body);
      error!(status = status.as_u16(), elapsed = ?start.elapsed(), body = %trunc_for_log(&message, 300), "Generation service returned an error");
      return Err(ExaminerError::Status { status: status.as_u16(), message });
    }

    let body: GenerateContentResponse = res.json().await?;
    if let Some(usage) = &body.usage_metadata {
      info!(prompt_tokens = ?usage.prompt_token_count, candidates_tokens = ?usage.candidates_token_count, total_tokens = ?usage.total_token_count, "Generation usage");
    }
    let text = first_candidate_text(body)?;
    info!(elapsed = ?start.elapsed(), response_len = text.len(), "Generation response received");
    debug!(preview = %trunc_for_log(&text, 120), "Generation response preview");
    Ok(text)
  }
}

#[async_trait]
impl Examiner for GeminiClient {
  #[instrument(level = "info", skip_all, fields(bab1_len = chapters.bab1.len(), bab2_len = chapters.bab2.len(), bab3_len = chapters.bab3.len()))]
  async fn generate_questions(&self, chapters: &Chapters) -> Result<String, ExaminerError> {
    let prompt = fill_template(
      &self.prompts.generate_questions,
      &[("bab1", chapters.bab1.as_str()), ("bab2", chapters.bab2.as_str()), ("bab3", chapters.bab3.as_str())],
    );
    self.generate_content(&prompt).await
  }

  #[instrument(level = "info", skip_all, fields(question_len = question.len(), answer_len = answer.len()))]
  async fn evaluate_answer(&self, question: &str, answer: &str) -> Result<String, ExaminerError> {
    let prompt = fill_template(&self.prompts.evaluate_answer, &[("question", question), ("answer", answer)]);
    self.generate_content(&prompt).await
  }
}

// --- generateContent DTOs ---

#[derive(Serialize)]
struct GenerateContentRequest {
  contents: Vec<Content>,
}

#[derive(Serialize, Deserialize)]
struct Content {
  #[serde(default)]
  parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
  #[serde(default)]
  text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
  #[serde(default)]
  usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
  content: Option<Content>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)]
  prompt_token_count: Option<u32>,
  #[serde(default)]
  candidates_token_count: Option<u32>,
  #[serde(default)]
  total_token_count: Option<u32>,
}

fn first_candidate_text(body: GenerateContentResponse) -> Result<String, ExaminerError> {
  body
    .candidates
    .into_iter()
    .next()
    .and_then(|c| c.content)
    .and_then(|c| c.parts.into_iter().next())
    .map(|p| p.text)
    .ok_or_else(|| ExaminerError::Malformed("response has no candidate text".into()))
}

/// Try to extract a clean error message from the service's error body.
fn extract_service_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap {
    error: EObj,
  }
  #[derive(Deserialize)]
  struct EObj {
    message: String,
  }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reads_first_candidate_text() {
    let body: GenerateContentResponse = serde_json::from_str(
      r#"{"candidates":[{"content":{"parts":[{"text":"1. Apa?"},{"text":"ignored"}]}},{"content":{"parts":[{"text":"second"}]}}],
          "usageMetadata":{"promptTokenCount":10,"totalTokenCount":20}}"#,
    )
    .unwrap();
    assert_eq!(first_candidate_text(body).unwrap(), "1. Apa?");
  }

  #[test]
  fn empty_candidates_are_malformed() {
    let body: GenerateContentResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
    assert!(matches!(first_candidate_text(body), Err(ExaminerError::Malformed(_))));
    let body: GenerateContentResponse = serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
    assert!(matches!(first_candidate_text(body), Err(ExaminerError::Malformed(_))));
  }

  #[test]
  fn service_error_message_is_extracted() {
    let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
    assert_eq!(extract_service_error(body).as_deref(), Some("API key not valid."));
    assert_eq!(extract_service_error("<html>"), None);
  }

  #[test]
  fn request_body_has_the_expected_shape() {
    let req = GenerateContentRequest {
      contents: vec![Content { parts: vec![Part { text: "halo".into() }] }],
    };
    let json = serde_json::to_value(&req).unwrap();
    assert_eq!(json, serde_json::json!({"contents":[{"parts":[{"text":"halo"}]}]}));
  }
}
