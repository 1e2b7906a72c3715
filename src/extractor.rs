//! Turn free-form model output into an ordered, deduplicated list of questions.
//!
//! Three tiers are tried in priority order, each less structured than the one
//! before it:
//!
//! 1. numbered list (`1. … 2. …`)
//! 2. lines/sentences that look like questions (a `?` or an Indonesian cue word)
//! 3. plain split on `?`
//!
//! The first tier that yields anything wins. Its output is deduplicated and
//! filtered by length. If nothing is left, a fixed default set is returned, so
//! callers always get at least one question.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::sanitizer::sanitize;
use crate::util::char_len;

/// Final band (exclusive on both ends, in chars).
pub const MIN_QUESTION_CHARS: usize = 15;
pub const MAX_QUESTION_CHARS: usize = 500;

/// Line tier: sentences shorter than this are not considered.
const MIN_LINE_CHARS: usize = 20;
/// Question-mark tier: fragments must be longer than this.
const MIN_FRAGMENT_CHARS: usize = 20;

const CUE_WORDS: &[&str] = &[
  "apa", "mengapa", "bagaimana", "kapan", "dimana", "siapa",
  "jelaskan", "sebutkan", "uraikan", "analisis", "bandingkan",
  "evaluasi", "apakah", "bisakah", "dapatkah", "sejauh mana",
];

pub const DEFAULT_QUESTIONS: [&str; 5] = [
  "Apa latar belakang masalah yang mendorong penelitian ini?",
  "Bagaimana metodologi penelitian yang akan Anda gunakan?",
  "Apa kontribusi dan kebaruan dari penelitian ini?",
  "Bagaimana Anda mengatasi keterbatasan penelitian?",
  "Sejauh mana relevansi teori yang Anda gunakan?",
];

static RE_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").unwrap());
static RE_SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]\s+").unwrap());

/// Which strategy produced the questions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
  NumberedList,
  Lines,
  QuestionMarks,
  Defaults,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extraction {
  pub questions: Vec<String>,
  pub tier: Tier,
}

type TierFn = fn(&str) -> Vec<String>;

const TIERS: [(Tier, TierFn); 3] = [
  (Tier::NumberedList, numbered_tier),
  (Tier::Lines, line_tier),
  (Tier::QuestionMarks, question_mark_tier),
];

/// Extract questions from raw model text. Never empty.
pub fn extract(raw: &str) -> Vec<String> {
  extract_with_tier(raw).questions
}

#[instrument(level = "debug", skip(raw), fields(raw_len = raw.len()))]
pub fn extract_with_tier(raw: &str) -> Extraction {
  let picked = TIERS
    .iter()
    .map(|(tier, run)| (*tier, run(raw)))
    .find(|(_, found)| !found.is_empty());

  if let Some((tier, found)) = picked {
    let candidates = found.len();
    let questions = finalize(found);
    debug!(target: "extractor", ?tier, candidates, kept = questions.len(), "Tier matched");
    if !questions.is_empty() {
      return Extraction { questions, tier };
    }
  }

  debug!(target: "extractor", "No usable questions; serving defaults");
  Extraction { questions: default_questions(), tier: Tier::Defaults }
}

pub fn default_questions() -> Vec<String> {
  DEFAULT_QUESTIONS.iter().map(|q| q.to_string()).collect()
}

/// Order-preserving dedup, then the length band.
fn finalize(found: Vec<String>) -> Vec<String> {
  let mut seen = HashSet::new();
  found
    .into_iter()
    .filter(|q| seen.insert(q.clone()))
    .filter(|q| {
      let n = char_len(q);
      n > MIN_QUESTION_CHARS && n < MAX_QUESTION_CHARS
    })
    .collect()
}

fn numbered_tier(raw: &str) -> Vec<String> {
  numbered_segments(raw).into_iter().filter_map(sanitize).collect()
}

// Length and cue checks run per sentence, not per line, so a line of two short
// sentences that would pass as a whole is dropped.
fn line_tier(raw: &str) -> Vec<String> {
  RE_NEWLINES
    .split(raw)
    .flat_map(sentences)
    .map(str::trim)
    .filter(|s| char_len(s) >= MIN_LINE_CHARS && looks_like_question(s))
    .filter_map(sanitize)
    .filter(|q| char_len(q) > MIN_QUESTION_CHARS)
    .collect()
}

fn question_mark_tier(raw: &str) -> Vec<String> {
  raw
    .split('?')
    .map(str::trim)
    .filter(|part| char_len(part) > MIN_FRAGMENT_CHARS)
    .filter_map(|part| sanitize(&format!("{part}?")))
    .collect()
}

fn looks_like_question(s: &str) -> bool {
  if s.contains('?') {
    return true;
  }
  let lower = s.to_lowercase();
  CUE_WORDS.iter().any(|w| lower.contains(w))
}

/// Split one line into sentences, keeping the terminal punctuation.
fn sentences(line: &str) -> Vec<&str> {
  let mut out = Vec::new();
  let mut start = 0;
  for m in RE_SENTENCE_END.find_iter(line) {
    // terminal punctuation is one ASCII byte
    out.push(&line[start..m.start() + 1]);
    start = m.end();
  }
  out.push(&line[start..]);
  out
}

/// Segments shaped like `12. body`, where the body is a run of non-digits that
/// ends exactly at the next `N.` marker or at the end of the text. A body cut
/// short by a stray digit does not match at that position; the scan then moves
/// on by one byte.
fn numbered_segments(text: &str) -> Vec<&str> {
  let bytes = text.as_bytes();
  let mut out = Vec::new();
  let mut start = 0;
  while start < bytes.len() {
    match segment_end(bytes, start) {
      Some(end) => {
        out.push(&text[start..end]);
        start = end;
      }
      None => start += 1,
    }
  }
  out
}

fn segment_end(bytes: &[u8], start: usize) -> Option<usize> {
  let body = marker_end(bytes, start)?;
  let stop = bytes[body..]
    .iter()
    .position(u8::is_ascii_digit)
    .map_or(bytes.len(), |i| body + i);
  if stop == body {
    return None;
  }
  if stop == bytes.len() || marker_end(bytes, stop).is_some() {
    Some(stop)
  } else {
    None
  }
}

/// If `at` starts a `digits.` marker, the index right after the dot.
fn marker_end(bytes: &[u8], at: usize) -> Option<usize> {
  let digits = bytes[at..].iter().take_while(|b| b.is_ascii_digit()).count();
  if digits == 0 {
    return None;
  }
  let dot = at + digits;
  (bytes.get(dot) == Some(&b'.')).then_some(dot + 1)
}
