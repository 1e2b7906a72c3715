//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{ChapterRole, Chapters, Progress, StorageStatus};
use crate::extractor::Tier;
use crate::speech::Utterance;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    ChapterInput {
        role: ChapterRole,
        text: String,
    },
    SaveNow,
    LoadSaved,
    ClearAll,
    StorageStatus,
    GenerateQuestions,
    SelectQuestion {
        index: usize,
    },
    SubmitAnswer {
        answer: String,
    },
    NextQuestion,
    PlayQuestion {
        index: usize,
    },
    PlayAll,
    StopSpeech,
    SpeechEnded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
    Info,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Loading {
        active: bool,
    },
    Questions {
        questions: Vec<String>,
        tier: Tier,
    },
    Loaded {
        chapters: Chapters,
        restored_chapters: Vec<ChapterRole>,
        questions: Option<Vec<String>>,
    },
    Cleared,
    Status {
        #[serde(flatten)]
        status: StorageStatus,
        summary: String,
    },
    CurrentQuestion {
        index: usize,
        question: String,
    },
    Evaluation {
        index: usize,
        evaluation: String,
    },
    Progress(Progress),
    Finished,
    Speak {
        utterance: Utterance,
    },
    CancelSpeech,
    Notification {
        level: NoticeLevel,
        message: String,
    },
    Error {
        message: String,
    },
}

impl ServerWsMessage {
    pub fn notify(level: NoticeLevel, message: impl Into<String>) -> Self {
        ServerWsMessage::Notification { level, message: message.into() }
    }

    pub fn status(status: StorageStatus) -> Self {
        let summary = status.summary();
        ServerWsMessage::Status { status, summary }
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct GenerateIn {
    #[serde(default)]
    pub bab1: Option<String>,
    #[serde(default)]
    pub bab2: Option<String>,
    #[serde(default)]
    pub bab3: Option<String>,
}

impl GenerateIn {
    /// All three chapters, or None if any is missing or blank.
    pub fn into_chapters(self) -> Option<Chapters> {
        let keep = |s: Option<String>| s.filter(|s| !s.trim().is_empty());
        Some(Chapters { bab1: keep(self.bab1)?, bab2: keep(self.bab2)?, bab3: keep(self.bab3)? })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateOut {
    pub success: bool,
    pub questions: String,
}

#[derive(Debug, Deserialize)]
pub struct EvaluateIn {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EvaluateOut {
    pub success: bool,
    pub evaluation: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorOut {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_use_snake_case_tags() {
        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"chapter_input","role":"bab2","text":"Teori"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::ChapterInput { role: ChapterRole::LiteratureReview, .. }));
        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"speech_ended"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::SpeechEnded));
    }

    #[test]
    fn status_message_is_flat() {
        let msg = ServerWsMessage::status(StorageStatus {
            saved_chapters: vec![ChapterRole::Introduction],
            question_count: Some(3),
            last_saved: Some("2026-10-16T08:00:00.000Z".into()),
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["saved_chapters"][0], "bab1");
        assert_eq!(json["question_count"], 3);
        assert_eq!(json["summary"], "Bab 1, 3 Pertanyaan");
    }

    #[test]
    fn progress_message_carries_counts() {
        let json = serde_json::to_value(ServerWsMessage::Progress(Progress { answered: 1, total: 4 })).unwrap();
        assert_eq!(json, serde_json::json!({"type": "progress", "answered": 1, "total": 4}));
    }

    #[test]
    fn blank_chapter_is_missing() {
        let body: GenerateIn = serde_json::from_str(r#"{"bab1":"a","bab2":"  ","bab3":"c"}"#).unwrap();
        assert!(body.into_chapters().is_none());
        let body: GenerateIn = serde_json::from_str(r#"{"bab1":"a","bab2":"b"}"#).unwrap();
        assert!(body.into_chapters().is_none());
        let body: GenerateIn = serde_json::from_str(r#"{"bab1":"a","bab2":"b","bab3":"c"}"#).unwrap();
        assert_eq!(body.into_chapters().unwrap().bab3, "c");
    }
}
