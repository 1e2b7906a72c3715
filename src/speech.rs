//! Playback queue for spoken questions.
//!
//! The client owns the actual text-to-speech engine. This queue decides what it
//! should say next: at most one utterance is active, starting a new one cancels
//! the current one first, and "play all" drains the queue one item at a time,
//! advancing only after the client reports that the current utterance ended and
//! a fixed pause has passed.

use std::{collections::VecDeque, time::Duration};

use serde::Serialize;

pub const DEFAULT_PAUSE: Duration = Duration::from_millis(1500);

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VoiceProfile {
  pub voice: String,
  pub rate: f32,
  pub pitch: f32,
  pub volume: f32,
}

impl Default for VoiceProfile {
  fn default() -> Self {
    Self { voice: "Indonesian Female".into(), rate: 1.2, pitch: 1.0, volume: 1.0 }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Utterance {
  pub text: String,
  #[serde(flatten)]
  pub voice: VoiceProfile,
}

/// Instruction for whoever drives the speech engine.
#[derive(Clone, Debug, PartialEq)]
pub enum SpeechCommand {
  /// Stop whatever is being spoken.
  Cancel,
  Speak(Utterance),
  /// Call `resume` after this long.
  Wait(Duration),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
  Idle,
  Speaking,
  Pausing,
}

#[derive(Debug)]
pub struct SpeechQueue {
  pending: VecDeque<String>,
  phase: Phase,
  voice: VoiceProfile,
  pause: Duration,
}

impl Default for SpeechQueue {
  fn default() -> Self {
    Self::new(VoiceProfile::default(), DEFAULT_PAUSE)
  }
}

impl SpeechQueue {
  pub fn new(voice: VoiceProfile, pause: Duration) -> Self {
    Self { pending: VecDeque::new(), phase: Phase::Idle, voice, pause }
  }

  /// True while speaking or pausing between queued items.
  pub fn is_active(&self) -> bool {
    self.phase != Phase::Idle
  }

  /// Speak `text` right away, dropping anything queued.
  pub fn speak_now(&mut self, text: &str) -> Vec<SpeechCommand> {
    let mut out = Vec::with_capacity(2);
    if self.is_active() {
      out.push(SpeechCommand::Cancel);
    }
    self.pending.clear();
    out.push(self.start(text.to_string()));
    out
  }

  /// Queue every question with its spoken number. Ignored while already active.
  pub fn play_all(&mut self, questions: &[String]) -> Vec<SpeechCommand> {
    if self.is_active() || questions.is_empty() {
      return Vec::new();
    }
    self.pending = questions
      .iter()
      .enumerate()
      .map(|(i, q)| format!("Pertanyaan {}. {}", i + 1, q))
      .collect();
    self.next_speak().into_iter().collect()
  }

  /// The current utterance ended.
  pub fn on_finished(&mut self) -> Option<SpeechCommand> {
    if self.phase != Phase::Speaking {
      return None;
    }
    if self.pending.is_empty() {
      self.phase = Phase::Idle;
      None
    } else {
      self.phase = Phase::Pausing;
      Some(SpeechCommand::Wait(self.pause))
    }
  }

  /// The pause after a finished item elapsed. `None` if the queue was cancelled meanwhile.
  pub fn resume(&mut self) -> Option<SpeechCommand> {
    if self.phase != Phase::Pausing {
      return None;
    }
    self.next_speak()
  }

  pub fn stop(&mut self) -> SpeechCommand {
    self.pending.clear();
    self.phase = Phase::Idle;
    SpeechCommand::Cancel
  }

  fn next_speak(&mut self) -> Option<SpeechCommand> {
    match self.pending.pop_front() {
      Some(text) => Some(self.start(text)),
      None => {
        self.phase = Phase::Idle;
        None
      }
    }
  }

  fn start(&mut self, text: String) -> SpeechCommand {
    self.phase = Phase::Speaking;
    SpeechCommand::Speak(Utterance { text, voice: self.voice.clone() })
  }
}
