use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Events emitted by a prompt that the parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptResult {
  /// Value submitted
  Submitted(String),
  /// Prompt dismissed without a value
  Cancelled,
}

/// Modal single-line prompt for free-form values (names, comments, ids).
///
/// A view opens it with `open`, then routes keys to it while `is_active`.
#[derive(Debug, Clone, Default)]
pub struct Prompt {
  input: TextInput,
  title: String,
  active: bool,
}

impl Prompt {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  /// Open the prompt with a title and an optional initial value
  pub fn open(&mut self, title: &str, initial: &str) {
    self.active = true;
    self.title = title.to_string();
    self.input.clear();
    for c in initial.chars() {
      self.input.handle_key(KeyEvent::from(crossterm::event::KeyCode::Char(c)));
    }
  }

  /// Handle a key event while active
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<PromptResult> {
    if !self.active {
      return KeyResult::NotHandled;
    }

    match self.input.handle_key(key) {
      InputResult::Submitted(value) => {
        self.active = false;
        self.input.clear();
        KeyResult::Event(PromptResult::Submitted(value))
      }
      InputResult::Cancelled => {
        self.active = false;
        self.input.clear();
        KeyResult::Event(PromptResult::Cancelled)
      }
      InputResult::Consumed => KeyResult::Handled,
      InputResult::NotHandled => KeyResult::Handled, // swallow everything while modal
    }
  }

  /// Render the prompt overlay if active
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let width = (area.width * 60 / 100).clamp(30, 60);
    let height = 3;

    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + area.height / 3;

    let overlay_area = Rect::new(x, y, width, height);

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(format!(" {} ", self.title));

    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    if inner.height == 0 {
      return;
    }

    let input_line = Line::from(vec![
      Span::styled("> ", Style::default().fg(Color::Yellow)),
      Span::raw(self.input.value()),
      Span::styled("_", Style::default().fg(Color::Yellow)), // Cursor
    ]);
    frame.render_widget(Paragraph::new(input_line), inner);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::{KeyCode, KeyModifiers};

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn test_open_and_submit() {
    let mut prompt = Prompt::new();
    assert!(!prompt.is_active());

    prompt.open("New objective", "");
    assert!(prompt.is_active());

    prompt.handle_key(key(KeyCode::Char('h')));
    prompt.handle_key(key(KeyCode::Char('i')));
    let result = prompt.handle_key(key(KeyCode::Enter));
    assert_eq!(result, KeyResult::Event(PromptResult::Submitted("hi".to_string())));
    assert!(!prompt.is_active());
  }

  #[test]
  fn test_cancel_discards_input() {
    let mut prompt = Prompt::new();
    prompt.open("Rename", "old name");

    let result = prompt.handle_key(key(KeyCode::Esc));
    assert_eq!(result, KeyResult::Event(PromptResult::Cancelled));
    assert!(!prompt.is_active());
  }

  #[test]
  fn test_initial_value_editable() {
    let mut prompt = Prompt::new();
    prompt.open("Rename", "ab");

    prompt.handle_key(key(KeyCode::Char('c')));
    let result = prompt.handle_key(key(KeyCode::Enter));
    assert_eq!(
      result,
      KeyResult::Event(PromptResult::Submitted("abc".to_string()))
    );
  }

  #[test]
  fn test_inactive_ignores_keys() {
    let mut prompt = Prompt::new();
    let result = prompt.handle_key(key(KeyCode::Char('x')));
    assert_eq!(result, KeyResult::NotHandled);
  }
}
