use crossterm::event::KeyEvent;
use ratatui::prelude::*;

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone)]
pub struct Shortcut {
  pub key: &'static str,
  pub label: &'static str,
}

impl Shortcut {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self { key, label }
  }
}

/// Actions that a view can request in response to user input
pub enum ViewAction {
  /// No action needed
  None,
  /// Push a new view onto the stack
  Push(Box<dyn View>),
  /// Pop current view from stack (go back)
  Pop,
  /// Login completed; the app swaps in the role's root view
  LoggedIn,
}

/// Trait for view behavior
///
/// Views handle their own input modes (prompts, filters) and return actions
/// for the App to execute. This creates a clean delegation chain:
/// App → View → Components
///
/// Views that load data asynchronously use Query<T> internally and poll it
/// in the tick() method; mutations go through Mutation<T> the same way.
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  /// Render the view to the frame
  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Get the breadcrumb label for this view
  fn breadcrumb_label(&self) -> String;

  /// Called on each tick to allow views to poll async queries and mutations.
  /// Mutations that finish between key events report their outcome here,
  /// e.g. a completed login.
  fn tick(&mut self) -> ViewAction {
    ViewAction::None
  }

  /// True while the view is capturing free-form text (a prompt or filter is
  /// open), so the app keeps the command palette out of the way
  fn wants_text_input(&self) -> bool {
    false
  }

  /// Get keyboard shortcuts to display in the header
  /// Override this to provide view-specific shortcuts
  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new(":", "command"),
      Shortcut::new("q", "back"),
    ]
  }
}
