//! Domain models: chapters, session state, storage status and progress.

use serde::{Deserialize, Serialize};

use crate::store::StorageKey;

/// The three proposal chapters, in the order they are written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChapterRole {
  /// Bab 1 - Pendahuluan.
  #[serde(rename = "bab1")]
  Introduction,
  /// Bab 2 - Tinjauan Pustaka / Landasan Teori.
  #[serde(rename = "bab2")]
  LiteratureReview,
  /// Bab 3 - Metodologi.
  #[serde(rename = "bab3")]
  Methodology,
}

impl ChapterRole {
  pub const ALL: [ChapterRole; 3] = [
    ChapterRole::Introduction,
    ChapterRole::LiteratureReview,
    ChapterRole::Methodology,
  ];

  pub fn storage_key(self) -> StorageKey {
    match self {
      ChapterRole::Introduction => StorageKey::Bab1,
      ChapterRole::LiteratureReview => StorageKey::Bab2,
      ChapterRole::Methodology => StorageKey::Bab3,
    }
  }

  /// Human label used in messages ("Bab 1").
  pub fn label(self) -> &'static str {
    match self {
      ChapterRole::Introduction => "Bab 1",
      ChapterRole::LiteratureReview => "Bab 2",
      ChapterRole::Methodology => "Bab 3",
    }
  }
}

/// Chapter texts, also the wire shape of the generate request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapters {
  #[serde(default)]
  pub bab1: String,
  #[serde(default)]
  pub bab2: String,
  #[serde(default)]
  pub bab3: String,
}

impl Chapters {
  pub fn get(&self, role: ChapterRole) -> &str {
    match role {
      ChapterRole::Introduction => &self.bab1,
      ChapterRole::LiteratureReview => &self.bab2,
      ChapterRole::Methodology => &self.bab3,
    }
  }

  pub fn set(&mut self, role: ChapterRole, text: String) {
    match role {
      ChapterRole::Introduction => self.bab1 = text,
      ChapterRole::LiteratureReview => self.bab2 = text,
      ChapterRole::Methodology => self.bab3 = text,
    }
  }

  /// Copy with every chapter trimmed.
  pub fn trimmed(&self) -> Chapters {
    Chapters {
      bab1: self.bab1.trim().to_string(),
      bab2: self.bab2.trim().to_string(),
      bab3: self.bab3.trim().to_string(),
    }
  }

  /// Chapters that are blank after trimming.
  pub fn missing(&self) -> Vec<ChapterRole> {
    ChapterRole::ALL
      .into_iter()
      .filter(|r| self.get(*r).trim().is_empty())
      .collect()
  }
}

/// UI state of one rehearsal. Lost when the session ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
  pub current_index: usize,
  pub playing: bool,
}

/// What the store currently holds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StorageStatus {
  pub saved_chapters: Vec<ChapterRole>,
  pub question_count: Option<usize>,
  pub last_saved: Option<String>,
}

impl StorageStatus {
  pub fn is_empty(&self) -> bool {
    self.saved_chapters.is_empty() && self.question_count.is_none()
  }

  /// One-line summary, e.g. "Bab 1, Bab 2, 5 Pertanyaan".
  pub fn summary(&self) -> String {
    if self.is_empty() {
      return "Belum ada data tersimpan".into();
    }
    let mut items: Vec<String> = self.saved_chapters.iter().map(|r| r.label().to_string()).collect();
    if let Some(n) = self.question_count {
      items.push(format!("{n} Pertanyaan"));
    }
    items.join(", ")
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
  pub answered: usize,
  pub total: usize,
}
