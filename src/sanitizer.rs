//! Per-candidate cleanup: turns one raw fragment into a question, or rejects it.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::normalizer::{strip_emphasis, strip_symbols};
use crate::util::{capitalize_first, char_len, collapse_whitespace};

static RE_NUMBER_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+\.\s*").unwrap());
static RE_BULLET_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-•*]\s*").unwrap());

/// Narrower than the normalizer's list: the question mark must survive.
pub const SANITIZER_SYMBOLS: &[char] = &[
  '#', '@', '$', '%', '^', '&', '*', '(', ')', '_', '+', '=', '[', ']', '{', '}', '|', '\\',
  ':', '"', ';', '\'', '<', '>', ',', '.', '/', '~', '`',
];

/// Candidates shorter than this (in chars, after cleanup) are not questions.
pub const MIN_SANITIZED_CHARS: usize = 15;

/// Clean one candidate. `None` means "skip it", never an error.
pub fn sanitize(candidate: &str) -> Option<String> {
  let s = RE_NUMBER_PREFIX.replace(candidate, "");
  let s = RE_BULLET_PREFIX.replace(&s, "");
  let s = strip_emphasis(&s);
  let s = strip_symbols(&s, SANITIZER_SYMBOLS);
  let cleaned = collapse_whitespace(&s);

  if char_len(&cleaned) < MIN_SANITIZED_CHARS {
    return None;
  }

  let mut question = capitalize_first(&cleaned);
  if !question.ends_with('?') {
    question.push('?');
  }
  Some(question)
}
