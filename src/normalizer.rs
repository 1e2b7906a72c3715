//! Strip markdown and symbol artifacts from raw model output.
//!
//! Stage order matters: emphasis markers go before the symbol blacklist (or the
//! asterisks vanish and the wrapped text gets glued to its neighbours), and
//! fenced code blocks go before inline code.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::util::collapse_whitespace;

static RE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static RE_ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*]+)\*").unwrap());
static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"#{1,6}\s*").unwrap());
static RE_CODE_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[^`]*```").unwrap());
static RE_INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").unwrap());
static RE_LIST_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*[-*+]\s*").unwrap());

/// Symbols dropped from evaluation text. Digits always survive.
pub const NORMALIZER_SYMBOLS: &[char] = &[
  '#', '@', '$', '%', '^', '&', '*', '(', ')', '_', '+', '=', '[', ']', '{', '}', '|', '\\',
  ':', '"', ';', '\'', '<', '>', '?', ',', '.', '/', '~', '`',
];

/// `**x**` → `x`, then `*x*` → `x`. Shared with the sanitizer.
pub fn strip_emphasis(text: &str) -> String {
  let unbold = RE_BOLD.replace_all(text, "$1");
  RE_ITALIC.replace_all(&unbold, "$1").into_owned()
}

/// Remove every char of `blacklist` from `text`.
pub fn strip_symbols(text: &str, blacklist: &[char]) -> String {
  text.chars().filter(|c| !blacklist.contains(c)).collect()
}

/// Clean model output for display. Empty input is returned as-is.
pub fn normalize(text: &str) -> String {
  if text.is_empty() {
    return String::new();
  }

  let s = strip_emphasis(text);
  let s = RE_HEADING.replace_all(&s, "");
  let s = RE_CODE_BLOCK.replace_all(&s, "");
  let s = RE_INLINE_CODE.replace_all(&s, "$1");
  let s = RE_LIST_BULLET.replace_all(&s, "");
  let s = strip_symbols(&s, NORMALIZER_SYMBOLS);
  collapse_whitespace(&s)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn strips_markdown_and_symbols() {
    assert_eq!(normalize("**Penting**: ini #catatan `kode`"), "Penting ini catatan kode");
  }

  #[test]
  fn empty_input_is_untouched() {
    assert_eq!(normalize(""), "");
  }

  #[test]
  fn code_blocks_are_deleted_with_content() {
    let out = normalize("Sebelum\n```\nlet x = 1;\n```\nsesudah");
    assert_eq!(out, "Sebelum sesudah");
  }

  #[test]
  fn list_bullets_and_headings_are_removed() {
    let raw = "## Evaluasi\n- Jawaban cukup baik\n* Perlu data tambahan\n+ Semangat";
    assert_eq!(normalize(raw), "Evaluasi Jawaban cukup baik Perlu data tambahan Semangat");
  }

  #[test]
  fn digits_survive_while_punctuation_goes() {
    assert_eq!(normalize("Skor: 80/100, (baik)."), "Skor 80100 baik");
  }

  #[test]
  fn italic_text_keeps_its_words_apart() {
    assert_eq!(normalize("Gunakan *purposive sampling* saja"), "Gunakan purposive sampling saja");
  }
}
