//! Rehearsal controller: one method per user action.
//!
//! A `DefenseSession` owns everything one rehearsal needs (chapter drafts, the
//! current question set, the answering position, progress and the speech
//! queue). It is driven by a single task, so none of it needs locking. Durable
//! data goes through the `PersistenceGateway`; the examiner is any `Examiner`.

use std::{collections::BTreeSet, sync::Arc};

use chrono::{SecondsFormat, Utc};
use tracing::{info, instrument, warn};

use crate::domain::{ChapterRole, Chapters, Progress, SessionState, StorageStatus};
use crate::error::SessionError;
use crate::extractor::{extract_with_tier, Extraction, Tier};
use crate::gemini::Examiner;
use crate::normalizer::normalize;
use crate::speech::{SpeechCommand, SpeechQueue};
use crate::store::{PersistenceGateway, StorageKey};

pub const MSG_CHAPTERS_REQUIRED: &str = "Harap isi semua bab proposal (Bab 1, Bab 2, dan Bab 3) terlebih dahulu!";
pub const MSG_ANSWER_REQUIRED: &str = "Harap isi jawaban terlebih dahulu!";
pub const MSG_NO_QUESTIONS: &str = "Belum ada pertanyaan yang dihasilkan.";

/// Result of a successful generation.
#[derive(Clone, Debug, PartialEq)]
pub struct Generated {
  pub questions: Vec<String>,
  pub tier: Tier,
  /// False if the store refused the new set; the set is still usable in memory.
  pub persisted: bool,
}

/// What `load_saved` found in the store.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadedData {
  pub chapters: Chapters,
  pub restored_chapters: Vec<ChapterRole>,
  pub questions: Option<Vec<String>>,
}

impl LoadedData {
  pub fn found_anything(&self) -> bool {
    !self.restored_chapters.is_empty() || self.questions.is_some()
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Evaluated {
  pub index: usize,
  /// Feedback with markdown and symbols stripped for display/speech.
  pub evaluation: String,
  pub progress: Progress,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NextQuestion {
  Question { index: usize, question: String },
  Finished,
}

pub struct DefenseSession {
  examiner: Arc<dyn Examiner>,
  gateway: PersistenceGateway,
  drafts: Chapters,
  questions: Vec<String>,
  current_index: usize,
  answered: BTreeSet<usize>,
  speech: SpeechQueue,
}

impl DefenseSession {
  pub fn new(examiner: Arc<dyn Examiner>, gateway: PersistenceGateway) -> Self {
    Self {
      examiner,
      gateway,
      drafts: Chapters::default(),
      questions: Vec::new(),
      current_index: 0,
      answered: BTreeSet::new(),
      speech: SpeechQueue::default(),
    }
  }

  pub fn chapters(&self) -> &Chapters {
    &self.drafts
  }

  pub fn questions(&self) -> &[String] {
    &self.questions
  }

  pub fn state(&self) -> SessionState {
    SessionState { current_index: self.current_index, playing: self.speech.is_active() }
  }

  pub fn progress(&self) -> Progress {
    Progress { answered: self.answered.len(), total: self.questions.len() }
  }

  pub fn set_chapter(&mut self, role: ChapterRole, text: String) {
    self.drafts.set(role, text);
  }

  // --- persistence ---

  /// Save every non-empty chapter and stamp the time. False if any write failed.
  #[instrument(level = "debug", skip(self))]
  pub fn autosave(&self) -> bool {
    let mut ok = true;
    for role in ChapterRole::ALL {
      let text = self.drafts.get(role).trim();
      if !text.is_empty() {
        ok &= self.gateway.save(role.storage_key(), text);
      }
    }
    ok &= self.touch_timestamp();
    ok
  }

  /// Restore chapters and questions from the store. Missing slots are left alone.
  #[instrument(level = "info", skip(self))]
  pub fn load_saved(&mut self) -> LoadedData {
    let mut restored = Vec::new();
    for role in ChapterRole::ALL {
      if let Some(text) = self.gateway.load::<String>(role.storage_key()).filter(|t| !t.is_empty()) {
        self.drafts.set(role, text);
        restored.push(role);
      }
    }

    let questions = self
      .gateway
      .load::<Vec<String>>(StorageKey::Questions)
      .filter(|q| !q.is_empty());
    if let Some(qs) = &questions {
      self.replace_questions(qs.clone());
    }

    info!(target: "session", chapters = restored.len(), questions = questions.as_ref().map_or(0, Vec::len), "Saved data loaded");
    LoadedData { chapters: self.drafts.clone(), restored_chapters: restored, questions }
  }

  /// Forget everything, in the store and in memory.
  #[instrument(level = "info", skip(self))]
  pub fn clear_all(&mut self) -> bool {
    let ok = StorageKey::ALL.into_iter().fold(true, |ok, key| self.gateway.remove(key) & ok);
    self.drafts = Chapters::default();
    self.replace_questions(Vec::new());
    ok
  }

  pub fn storage_status(&self) -> StorageStatus {
    let saved_chapters = ChapterRole::ALL
      .into_iter()
      .filter(|r| self.gateway.load::<String>(r.storage_key()).is_some_and(|t| !t.is_empty()))
      .collect();
    StorageStatus {
      saved_chapters,
      question_count: self.gateway.load::<Vec<String>>(StorageKey::Questions).map(|q| q.len()),
      last_saved: self.gateway.load::<String>(StorageKey::Timestamp),
    }
  }

  // --- examiner round-trips ---

  /// Ask the examiner for a fresh question set, replacing the old one.
  #[instrument(level = "info", skip(self))]
  pub async fn generate_questions(&mut self) -> Result<Generated, SessionError> {
    let chapters = self.drafts.trimmed();
    if !chapters.missing().is_empty() {
      return Err(SessionError::InvalidInput(MSG_CHAPTERS_REQUIRED.into()));
    }

    // the old set is discarded before the request, not merged afterwards
    self.gateway.remove(StorageKey::Questions);
    self.replace_questions(Vec::new());
    self.autosave();

    let raw = self.examiner.generate_questions(&chapters).await?;
    let Extraction { questions, tier } = extract_with_tier(&raw);
    info!(target: "session", ?tier, count = questions.len(), "Questions generated");

    self.replace_questions(questions.clone());
    let persisted = self.gateway.save(StorageKey::Questions, &self.questions) & self.touch_timestamp();
    if !persisted {
      warn!(target: "session", "Generated questions could not be saved");
    }
    Ok(Generated { questions, tier, persisted })
  }

  /// Evaluate `answer` against the current question.
  #[instrument(level = "info", skip(self, answer), fields(index = self.current_index, answer_len = answer.len()))]
  pub async fn submit_answer(&mut self, answer: &str) -> Result<Evaluated, SessionError> {
    let answer = answer.trim();
    if answer.is_empty() {
      return Err(SessionError::InvalidInput(MSG_ANSWER_REQUIRED.into()));
    }
    let index = self.current_index;
    let question = self
      .questions
      .get(index)
      .cloned()
      .ok_or_else(|| SessionError::InvalidInput(MSG_NO_QUESTIONS.into()))?;

    let raw = self.examiner.evaluate_answer(&question, answer).await?;
    self.answered.insert(index);
    Ok(Evaluated { index, evaluation: normalize(&raw), progress: self.progress() })
  }

  // --- navigation ---

  pub fn select_question(&mut self, index: usize) -> Result<&str, SessionError> {
    if index >= self.questions.len() {
      return Err(question_not_found(index));
    }
    self.current_index = index;
    Ok(&self.questions[index])
  }

  pub fn next_question(&mut self) -> NextQuestion {
    let next = self.current_index + 1;
    if next < self.questions.len() {
      self.current_index = next;
      NextQuestion::Question { index: next, question: self.questions[next].clone() }
    } else {
      NextQuestion::Finished
    }
  }

  // --- speech ---

  pub fn play_question(&mut self, index: usize) -> Result<Vec<SpeechCommand>, SessionError> {
    let question = self
      .questions
      .get(index)
      .ok_or_else(|| question_not_found(index))?;
    Ok(self.speech.speak_now(question))
  }

  pub fn play_all(&mut self) -> Vec<SpeechCommand> {
    self.speech.play_all(&self.questions)
  }

  pub fn stop_speech(&mut self) -> SpeechCommand {
    self.speech.stop()
  }

  pub fn speech_finished(&mut self) -> Option<SpeechCommand> {
    self.speech.on_finished()
  }

  pub fn resume_speech(&mut self) -> Option<SpeechCommand> {
    self.speech.resume()
  }

  /// Swap in a new question set. Queued speech belongs to the old set and is dropped.
  fn replace_questions(&mut self, questions: Vec<String>) {
    self.speech.stop();
    self.questions = questions;
    self.current_index = 0;
    self.answered.clear();
  }

  fn touch_timestamp(&self) -> bool {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    self.gateway.save(StorageKey::Timestamp, &now)
  }
}

fn question_not_found(index: usize) -> SessionError {
  SessionError::InvalidInput(format!("Pertanyaan {} tidak ditemukan.", index.saturating_add(1)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Mutex;

  use async_trait::async_trait;

  use crate::error::ExaminerError;
  use crate::store::{KvStore, MemoryStore};

  /// Examiner with canned replies that records what it was asked.
  #[derive(Default)]
  struct FakeExaminer {
    questions_reply: Mutex<Option<String>>,
    evaluation_reply: Mutex<Option<String>>,
    generate_calls: Mutex<Vec<Chapters>>,
    evaluate_calls: Mutex<Vec<(String, String)>>,
  }

  impl FakeExaminer {
    fn replying(questions: &str, evaluation: &str) -> Self {
      Self {
        questions_reply: Mutex::new(Some(questions.into())),
        evaluation_reply: Mutex::new(Some(evaluation.into())),
        ..Default::default()
      }
    }
  }

  #[async_trait]
  impl Examiner for FakeExaminer {
    async fn generate_questions(&self, chapters: &Chapters) -> Result<String, ExaminerError> {
      self.generate_calls.lock().unwrap().push(chapters.clone());
      self.questions_reply.lock().unwrap().clone().ok_or(ExaminerError::Status {
        status: 503,
        message: "overloaded".into(),
      })
    }

    async fn evaluate_answer(&self, question: &str, answer: &str) -> Result<String, ExaminerError> {
      self.evaluate_calls.lock().unwrap().push((question.into(), answer.into()));
      self.evaluation_reply.lock().unwrap().clone().ok_or(ExaminerError::Malformed("empty".into()))
    }
  }

  const RAW: &str = "1. Apa dasar teori Anda? 2. Mengapa metode ini dipilih?";

  fn session_with(examiner: Arc<FakeExaminer>) -> (DefenseSession, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let gateway = PersistenceGateway::new(store.clone());
    (DefenseSession::new(examiner, gateway), store)
  }

  fn fill_chapters(s: &mut DefenseSession) {
    s.set_chapter(ChapterRole::Introduction, "  Latar belakang  ".into());
    s.set_chapter(ChapterRole::LiteratureReview, "Teori X".into());
    s.set_chapter(ChapterRole::Methodology, "Kualitatif".into());
  }

  #[tokio::test]
  async fn generation_requires_all_chapters() {
    let examiner = Arc::new(FakeExaminer::replying(RAW, "Baik."));
    let (mut s, _) = session_with(examiner.clone());
    s.set_chapter(ChapterRole::Introduction, "Latar".into());
    s.set_chapter(ChapterRole::LiteratureReview, "   ".into());

    let err = s.generate_questions().await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidInput(ref m) if m == MSG_CHAPTERS_REQUIRED));
    assert!(examiner.generate_calls.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn generation_extracts_persists_and_trims() {
    let examiner = Arc::new(FakeExaminer::replying(RAW, "Baik."));
    let (mut s, store) = session_with(examiner.clone());
    fill_chapters(&mut s);

    let generated = s.generate_questions().await.unwrap();
    assert_eq!(generated.tier, Tier::NumberedList);
    assert!(generated.persisted);
    assert_eq!(s.questions(), ["Apa dasar teori Anda?", "Mengapa metode ini dipilih?"]);

    let sent = examiner.generate_calls.lock().unwrap()[0].clone();
    assert_eq!(sent.bab1, "Latar belakang");

    let status = s.storage_status();
    assert_eq!(status.saved_chapters.len(), 3);
    assert_eq!(status.question_count, Some(2));
    assert!(status.last_saved.is_some());
    assert!(store.get(StorageKey::Bab1.as_str()).unwrap().unwrap().contains("Latar belakang"));
  }

  #[tokio::test]
  async fn failed_generation_leaves_no_stale_questions() {
    let examiner = Arc::new(FakeExaminer::replying(RAW, "Baik."));
    let (mut s, _) = session_with(examiner.clone());
    fill_chapters(&mut s);
    s.generate_questions().await.unwrap();

    *examiner.questions_reply.lock().unwrap() = None;
    let err = s.generate_questions().await.unwrap_err();
    assert!(matches!(err, SessionError::Upstream(ExaminerError::Status { status: 503, .. })));
    assert!(s.questions().is_empty());
    assert_eq!(s.storage_status().question_count, None);
    // chapters were still saved before the call
    assert_eq!(s.storage_status().saved_chapters.len(), 3);
  }

  #[tokio::test]
  async fn unparseable_reply_falls_back_to_defaults() {
    let examiner = Arc::new(FakeExaminer::replying("", "Baik."));
    let (mut s, _) = session_with(examiner);
    fill_chapters(&mut s);
    let generated = s.generate_questions().await.unwrap();
    assert_eq!(generated.tier, Tier::Defaults);
    assert_eq!(generated.questions.len(), 5);
  }

  #[tokio::test]
  async fn answering_tracks_progress_and_cleans_feedback() {
    let examiner = Arc::new(FakeExaminer::replying(RAW, "**Baik**: jawaban *cukup* jelas."));
    let (mut s, _) = session_with(examiner.clone());
    fill_chapters(&mut s);
    s.generate_questions().await.unwrap();

    let err = s.submit_answer("   ").await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidInput(ref m) if m == MSG_ANSWER_REQUIRED));

    let ev = s.submit_answer("Karena teori X relevan").await.unwrap();
    assert_eq!(ev.index, 0);
    assert_eq!(ev.evaluation, "Baik jawaban cukup jelas");
    assert_eq!(ev.progress, Progress { answered: 1, total: 2 });

    // answering the same question again does not double count
    s.submit_answer("Jawaban kedua").await.unwrap();
    assert_eq!(s.progress().answered, 1);

    assert_eq!(
      s.next_question(),
      NextQuestion::Question { index: 1, question: "Mengapa metode ini dipilih?".into() }
    );
    let ev = s.submit_answer("Karena sesuai").await.unwrap();
    assert_eq!(ev.progress, Progress { answered: 2, total: 2 });
    assert_eq!(s.next_question(), NextQuestion::Finished);

    let calls = examiner.evaluate_calls.lock().unwrap();
    assert_eq!(calls[0].0, "Apa dasar teori Anda?");
    assert_eq!(calls.last().unwrap().0, "Mengapa metode ini dipilih?");
  }

  #[tokio::test]
  async fn answer_without_questions_is_rejected() {
    let (mut s, _) = session_with(Arc::new(FakeExaminer::replying(RAW, "Baik.")));
    let err = s.submit_answer("Jawaban").await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidInput(ref m) if m == MSG_NO_QUESTIONS));
  }

  #[tokio::test]
  async fn reload_restores_chapters_and_questions() {
    let store = Arc::new(MemoryStore::new());
    let examiner = Arc::new(FakeExaminer::replying(RAW, "Baik."));
    {
      let mut s = DefenseSession::new(examiner.clone(), PersistenceGateway::new(store.clone()));
      fill_chapters(&mut s);
      s.generate_questions().await.unwrap();
    }
    let mut s = DefenseSession::new(examiner, PersistenceGateway::new(store));
    let loaded = s.load_saved();
    assert!(loaded.found_anything());
    assert_eq!(loaded.restored_chapters, ChapterRole::ALL.to_vec());
    assert_eq!(loaded.chapters.bab2, "Teori X");
    assert_eq!(s.questions().len(), 2);
    assert_eq!(s.state(), SessionState { current_index: 0, playing: false });
  }

  #[tokio::test]
  async fn clear_all_wipes_store_and_memory() {
    let examiner = Arc::new(FakeExaminer::replying(RAW, "Baik."));
    let (mut s, _) = session_with(examiner);
    fill_chapters(&mut s);
    s.generate_questions().await.unwrap();

    assert!(s.clear_all());
    assert!(s.storage_status().is_empty());
    assert!(s.questions().is_empty());
    assert_eq!(s.chapters(), &Chapters::default());
    assert!(!s.load_saved().found_anything());
  }

  #[test]
  fn autosave_skips_blank_chapters() {
    let (mut s, store) = session_with(Arc::new(FakeExaminer::default()));
    s.set_chapter(ChapterRole::Methodology, "Survei".into());
    assert!(s.autosave());
    assert_eq!(store.get(StorageKey::Bab1.as_str()).unwrap(), None);
    assert_eq!(store.get(StorageKey::Bab3.as_str()).unwrap().as_deref(), Some("\"Survei\""));
    assert!(store.get(StorageKey::Timestamp.as_str()).unwrap().is_some());
  }

  #[tokio::test]
  async fn navigation_and_speech() {
    let (mut s, _) = session_with(Arc::new(FakeExaminer::replying(RAW, "Baik.")));
    fill_chapters(&mut s);
    s.generate_questions().await.unwrap();

    assert!(s.select_question(5).is_err());
    assert_eq!(s.select_question(1).unwrap(), "Mengapa metode ini dipilih?");
    assert_eq!(s.state().current_index, 1);

    let cmds = s.play_question(0).unwrap();
    assert!(matches!(&cmds[..], [SpeechCommand::Speak(u)] if u.text == "Apa dasar teori Anda?"));
    assert!(s.state().playing);
    assert!(s.play_all().is_empty());
    assert_eq!(s.stop_speech(), SpeechCommand::Cancel);

    let cmds = s.play_all();
    assert!(matches!(&cmds[..], [SpeechCommand::Speak(u)] if u.text.starts_with("Pertanyaan 1.")));
    assert!(matches!(s.speech_finished(), Some(SpeechCommand::Wait(_))));
    assert!(matches!(s.resume_speech(), Some(SpeechCommand::Speak(u)) if u.text.starts_with("Pertanyaan 2.")));
    assert_eq!(s.speech_finished(), None);
    assert!(!s.state().playing);
  }

  #[tokio::test]
  async fn huge_index_is_rejected_without_overflow() {
    let (mut s, _) = session_with(Arc::new(FakeExaminer::replying(RAW, "Baik.")));
    fill_chapters(&mut s);
    s.generate_questions().await.unwrap();

    let err = s.select_question(usize::MAX).unwrap_err();
    assert!(matches!(err, SessionError::InvalidInput(ref m) if m == &format!("Pertanyaan {} tidak ditemukan.", usize::MAX)));
    assert!(s.play_question(usize::MAX).is_err());
    assert_eq!(s.state().current_index, 0);
  }

  #[tokio::test]
  async fn new_question_set_drops_queued_speech() {
    let examiner = Arc::new(FakeExaminer::replying("1. Apa teori lama yang dipakai? 2. Mengapa metode lama dipilih?", "Baik."));
    let (mut s, _) = session_with(examiner.clone());
    fill_chapters(&mut s);
    s.generate_questions().await.unwrap();

    s.play_all();
    assert!(matches!(s.speech_finished(), Some(SpeechCommand::Wait(_))));

    *examiner.questions_reply.lock().unwrap() = Some("1. Bagaimana sampel baru ditentukan? 2. Apa batasan penelitian baru?".into());
    s.generate_questions().await.unwrap();
    assert!(!s.state().playing);
    assert_eq!(s.resume_speech(), None);

    // same for a reload from the store
    s.play_all();
    assert!(matches!(s.speech_finished(), Some(SpeechCommand::Wait(_))));
    s.load_saved();
    assert!(!s.state().playing);
    assert_eq!(s.resume_speech(), None);
  }
}
