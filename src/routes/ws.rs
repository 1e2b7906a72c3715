//! WebSocket upgrade + rehearsal loop. Each connection owns one
//! `DefenseSession`; client messages are parsed as JSON, dispatched to it, and
//! answered with zero or more server messages. Autosave ticks and speech pauses
//! are driven from the same loop so the session never needs a lock.

use std::{future::pending, pin::Pin, sync::Arc, time::Duration};

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::time::{sleep, Sleep};
use tracing::{debug, error, info, instrument, warn};

use crate::autosave::Debouncer;
use crate::error::SessionError;
use crate::protocol::{ClientWsMessage, NoticeLevel, ServerWsMessage};
use crate::session::{DefenseSession, NextQuestion};
use crate::speech::SpeechCommand;
use crate::state::AppState;

const MSG_SAVED: &str = "Data disimpan secara manual!";
const MSG_SAVE_FAILED: &str = "Gagal menyimpan data!";
const MSG_LOADED: &str = "Data berhasil dimuat dari penyimpanan!";
const MSG_NOTHING_SAVED: &str = "Belum ada data tersimpan.";
const MSG_CLEARED: &str = "Semua data berhasil dihapus dari penyimpanan!";
const MSG_GENERATED: &str = "Pertanyaan berhasil dihasilkan dan disimpan!";
const MSG_GENERATED_UNSAVED: &str = "Pertanyaan berhasil dihasilkan, tetapi gagal disimpan.";
const MSG_GENERATE_FAILED: &str = "Gagal menghasilkan pertanyaan!";
const MSG_EVALUATED: &str = "Jawaban berhasil dievaluasi!";
const MSG_EVALUATE_FAILED: &str = "Gagal mengevaluasi jawaban!";
const MSG_FINISHED: &str = "Simulasi selesai! Terima kasih telah berlatih.";

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "sempro_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// What the speech pause timer should do after a dispatch.
#[derive(Debug, Default, PartialEq)]
enum PauseChange {
  #[default]
  Keep,
  Arm(Duration),
  Clear,
}

/// Replies produced by one dispatch.
#[derive(Debug, Default)]
struct Outbox {
  messages: Vec<ServerWsMessage>,
  pause: PauseChange,
}

impl Outbox {
  fn push(&mut self, msg: ServerWsMessage) {
    self.messages.push(msg);
  }

  fn notify(&mut self, level: NoticeLevel, message: &str) {
    self.push(ServerWsMessage::notify(level, message));
  }

  fn speech(&mut self, cmd: SpeechCommand) {
    match cmd {
      SpeechCommand::Cancel => {
        self.pause = PauseChange::Clear;
        self.push(ServerWsMessage::CancelSpeech);
      }
      SpeechCommand::Speak(utterance) => self.push(ServerWsMessage::Speak { utterance }),
      SpeechCommand::Wait(d) => self.pause = PauseChange::Arm(d),
    }
  }

  fn speech_all(&mut self, cmds: Vec<SpeechCommand>) {
    cmds.into_iter().for_each(|c| self.speech(c));
  }

  /// Invalid input is the user's to fix; anything upstream is an error.
  fn failure(&mut self, err: SessionError, summary: &str) {
    match err {
      SessionError::InvalidInput(message) => self.notify(NoticeLevel::Error, &message),
      SessionError::Upstream(e) => {
        self.push(ServerWsMessage::Error { message: format!("Terjadi kesalahan: {e}") });
        self.notify(NoticeLevel::Error, summary);
      }
    }
  }
}

async fn wait_pause(pause: &mut Option<Pin<Box<Sleep>>>) {
  match pause {
    Some(s) => s.as_mut().await,
    None => pending().await,
  }
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "sempro_backend", "WebSocket connected");
  let mut session = state.new_session();
  let (debouncer, mut autosave_due) = Debouncer::spawn(state.settings.autosave_quiet);
  let mut pause: Option<Pin<Box<Sleep>>> = None;

  loop {
    let outbox = tokio::select! {
      incoming = socket.recv() => {
        let txt = match incoming {
          Some(Ok(Message::Text(txt))) => txt,
          Some(Ok(Message::Ping(payload))) => {
            let _ = socket.send(Message::Pong(payload)).await;
            continue;
          }
          Some(Ok(Message::Close(_))) | None => break,
          Some(Err(e)) => {
            warn!(target: "sempro_backend", error = %e, "WS receive error");
            break;
          }
          Some(Ok(_)) => continue,
        };

        match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "sempro_backend", "WS received: {:?}", &incoming);
            if calls_examiner(&incoming)
              && !send(&mut socket, &ServerWsMessage::Loading { active: true }).await
            {
              break;
            }
            dispatch(incoming, &mut session, &debouncer).await
          }
          Err(e) => Outbox {
            messages: vec![ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) }],
            ..Default::default()
          },
        }
      }

      Some(()) = autosave_due.recv() => {
        let mut out = Outbox::default();
        if !session.autosave() {
          out.notify(NoticeLevel::Error, MSG_SAVE_FAILED);
        }
        out.push(ServerWsMessage::status(session.storage_status()));
        out
      }

      _ = wait_pause(&mut pause) => {
        pause = None;
        let mut out = Outbox::default();
        if let Some(cmd) = session.resume_speech() {
          out.speech(cmd);
        }
        out
      }
    };

    match outbox.pause {
      PauseChange::Keep => {}
      PauseChange::Arm(d) => pause = Some(Box::pin(sleep(d))),
      PauseChange::Clear => pause = None,
    }

    let mut open = true;
    for msg in &outbox.messages {
      if !send(&mut socket, msg).await {
        open = false;
        break;
      }
    }
    if !open {
      break;
    }
  }

  // flush any pending edit before the session goes away
  if !session.autosave() {
    warn!(target: "session", "Final autosave failed");
  }
  info!(target: "sempro_backend", "WebSocket disconnected");
}

/// Serialize and send; false once the socket is unusable.
async fn send(socket: &mut WebSocket, msg: &ServerWsMessage) -> bool {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  match socket.send(Message::Text(out)).await {
    Ok(()) => true,
    Err(e) => {
      error!(target: "sempro_backend", error = %e, "WS send error");
      false
    }
  }
}

fn calls_examiner(msg: &ClientWsMessage) -> bool {
  matches!(msg, ClientWsMessage::GenerateQuestions | ClientWsMessage::SubmitAnswer { .. })
}

#[instrument(level = "debug", skip(session, debouncer))]
async fn dispatch(msg: ClientWsMessage, session: &mut DefenseSession, debouncer: &Debouncer) -> Outbox {
  let mut out = Outbox::default();
  match msg {
    ClientWsMessage::Ping => out.push(ServerWsMessage::Pong),

    ClientWsMessage::ChapterInput { role, text } => {
      session.set_chapter(role, text);
      debouncer.touch();
    }

    ClientWsMessage::SaveNow => {
      if session.autosave() {
        out.notify(NoticeLevel::Info, MSG_SAVED);
      } else {
        out.notify(NoticeLevel::Error, MSG_SAVE_FAILED);
      }
      out.push(ServerWsMessage::status(session.storage_status()));
    }

    ClientWsMessage::LoadSaved => {
      let was_playing = session.state().playing;
      let loaded = session.load_saved();
      cancel_if_dropped(&mut out, was_playing, session);
      if loaded.found_anything() {
        let has_questions = loaded.questions.is_some();
        out.push(ServerWsMessage::Loaded {
          chapters: loaded.chapters,
          restored_chapters: loaded.restored_chapters,
          questions: loaded.questions,
        });
        if has_questions {
          push_current(&mut out, session);
        }
        out.notify(NoticeLevel::Success, MSG_LOADED);
      } else {
        out.notify(NoticeLevel::Info, MSG_NOTHING_SAVED);
      }
      out.push(ServerWsMessage::status(session.storage_status()));
    }

    ClientWsMessage::ClearAll => {
      out.speech(session.stop_speech());
      if session.clear_all() {
        out.notify(NoticeLevel::Info, MSG_CLEARED);
      } else {
        out.notify(NoticeLevel::Error, MSG_SAVE_FAILED);
      }
      out.push(ServerWsMessage::Cleared);
      out.push(ServerWsMessage::status(session.storage_status()));
    }

    ClientWsMessage::StorageStatus => out.push(ServerWsMessage::status(session.storage_status())),

    ClientWsMessage::GenerateQuestions => {
      let was_playing = session.state().playing;
      let result = session.generate_questions().await;
      cancel_if_dropped(&mut out, was_playing, session);
      match result {
        Ok(generated) => {
          info!(target: "session", tier = ?generated.tier, count = generated.questions.len(), "WS questions served");
          out.push(ServerWsMessage::Questions { questions: generated.questions, tier: generated.tier });
          push_current(&mut out, session);
          if generated.persisted {
            out.notify(NoticeLevel::Success, MSG_GENERATED);
          } else {
            out.notify(NoticeLevel::Error, MSG_GENERATED_UNSAVED);
          }
        }
        Err(e) => {
          warn!(target: "session", error = %e, "WS generate_questions failed");
          out.failure(e, MSG_GENERATE_FAILED);
        }
      }
      out.push(ServerWsMessage::Loading { active: false });
      out.push(ServerWsMessage::status(session.storage_status()));
    }

    ClientWsMessage::SelectQuestion { index } => match session.select_question(index) {
      Ok(question) => out.push(ServerWsMessage::CurrentQuestion { index, question: question.to_string() }),
      Err(e) => out.failure(e, MSG_EVALUATE_FAILED),
    },

    ClientWsMessage::SubmitAnswer { answer } => {
      match session.submit_answer(&answer).await {
        Ok(ev) => {
          out.push(ServerWsMessage::Evaluation { index: ev.index, evaluation: ev.evaluation });
          out.push(ServerWsMessage::Progress(ev.progress));
          out.notify(NoticeLevel::Success, MSG_EVALUATED);
        }
        Err(e) => {
          warn!(target: "session", error = %e, "WS submit_answer failed");
          out.failure(e, MSG_EVALUATE_FAILED);
        }
      }
      out.push(ServerWsMessage::Loading { active: false });
    }

    ClientWsMessage::NextQuestion => match session.next_question() {
      NextQuestion::Question { index, question } => out.push(ServerWsMessage::CurrentQuestion { index, question }),
      NextQuestion::Finished => {
        out.push(ServerWsMessage::Finished);
        out.notify(NoticeLevel::Success, MSG_FINISHED);
      }
    },

    ClientWsMessage::PlayQuestion { index } => match session.play_question(index) {
      Ok(cmds) => out.speech_all(cmds),
      Err(e) => out.failure(e, MSG_EVALUATE_FAILED),
    },

    ClientWsMessage::PlayAll => out.speech_all(session.play_all()),

    ClientWsMessage::StopSpeech => out.speech(session.stop_speech()),

    ClientWsMessage::SpeechEnded => {
      if let Some(cmd) = session.speech_finished() {
        out.speech(cmd);
      }
    }
  }
  out
}

/// The session drops queued speech when its question set is replaced.
fn cancel_if_dropped(out: &mut Outbox, was_playing: bool, session: &DefenseSession) {
  if was_playing && !session.state().playing {
    out.speech(SpeechCommand::Cancel);
  }
}

fn push_current(out: &mut Outbox, session: &DefenseSession) {
  let index = session.state().current_index;
  if let Some(question) = session.questions().get(index) {
    out.push(ServerWsMessage::CurrentQuestion { index, question: question.clone() });
  }
  out.push(ServerWsMessage::Progress(session.progress()));
}
