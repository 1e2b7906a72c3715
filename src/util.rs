//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Collapse every whitespace run into a single space and trim both ends.
pub fn collapse_whitespace(s: &str) -> String {
  s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Length in characters; all question length bounds are expressed in chars, not bytes.
pub fn char_len(s: &str) -> usize {
  s.chars().count()
}

/// Uppercase the first character, leave the rest untouched.
pub fn capitalize_first(s: &str) -> String {
  let mut chars = s.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max_chars: usize) -> String {
  if char_len(s) <= max_chars {
    s.to_string()
  } else {
    let head: String = s.chars().take(max_chars).collect();
    format!("{}… ({} bytes total)", head, s.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fills_all_placeholders() {
    let out = fill_template("Q: {question}\nA: {answer}", &[("question", "Kenapa?"), ("answer", "Karena.")]);
    assert_eq!(out, "Q: Kenapa?\nA: Karena.");
  }

  #[test]
  fn collapses_mixed_whitespace() {
    assert_eq!(collapse_whitespace("  a \t b\n\n c  "), "a b c");
    assert_eq!(collapse_whitespace("   "), "");
  }

  #[test]
  fn capitalizes_non_ascii_first_char() {
    assert_eq!(capitalize_first("élan vital"), "Élan vital");
    assert_eq!(capitalize_first(""), "");
  }

  #[test]
  fn truncation_respects_char_boundaries() {
    let s = "ééééé";
    assert_eq!(trunc_for_log(s, 10), s);
    assert!(trunc_for_log(s, 2).starts_with("éé…"));
  }
}
