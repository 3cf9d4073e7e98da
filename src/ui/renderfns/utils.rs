use chrono::{DateTime, Local};
use ratatui::prelude::Color;

/// Truncate a string to a maximum character count, adding "..." if truncated.
/// Counts chars, not bytes; server-provided text is not ASCII-only.
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Traffic-light color for a completion percentage
pub fn progress_color(progress: u8) -> Color {
  match progress {
    70..=u8::MAX => Color::Green,
    40..=69 => Color::Yellow,
    _ => Color::Red,
  }
}

/// Render a fixed-width progress bar like `[=====     ] 50%`
pub fn progress_bar(progress: u8, width: usize) -> String {
  let progress = progress.min(100) as usize;
  let filled = progress * width / 100;
  format!(
    "[{}{}] {:>3}%",
    "=".repeat(filled),
    " ".repeat(width - filled),
    progress
  )
}

/// Checkbox marker for done/pending items
pub fn done_mark(done: bool) -> &'static str {
  if done {
    "[x]"
  } else {
    "[ ]"
  }
}

/// Render a server timestamp (RFC 3339) in local time, short form.
/// Unparseable input is shown as-is rather than hidden.
pub fn format_timestamp(raw: &str) -> String {
  match DateTime::parse_from_rfc3339(raw) {
    Ok(dt) => dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
    Err(_) => raw.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
  }

  #[test]
  fn test_truncate_exact_length() {
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_multibyte_text() {
    // The cut must land on a char boundary, not a byte offset
    assert_eq!(
      truncate("Strategieüberprüfung für die Müller GmbH", 20),
      "Strategieüberprüf..."
    );
    assert_eq!(truncate("café", 10), "café");
  }

  #[test]
  fn test_progress_color_thresholds() {
    assert_eq!(progress_color(0), Color::Red);
    assert_eq!(progress_color(39), Color::Red);
    assert_eq!(progress_color(40), Color::Yellow);
    assert_eq!(progress_color(69), Color::Yellow);
    assert_eq!(progress_color(70), Color::Green);
    assert_eq!(progress_color(100), Color::Green);
  }

  #[test]
  fn test_format_timestamp_falls_back_to_raw() {
    assert_eq!(format_timestamp("yesterday"), "yesterday");
    // Valid RFC 3339 parses to the short form (exact local time varies)
    let formatted = format_timestamp("2026-03-01T12:30:00Z");
    assert_eq!(formatted.len(), "2026-03-01 12:30".len());
  }

  #[test]
  fn test_progress_bar() {
    assert_eq!(progress_bar(50, 10), "[=====     ]  50%");
    assert_eq!(progress_bar(0, 10), "[          ]   0%");
    assert_eq!(progress_bar(100, 10), "[==========] 100%");
    // Values above 100 are clamped
    assert_eq!(progress_bar(130, 10), "[==========] 100%");
  }
}
