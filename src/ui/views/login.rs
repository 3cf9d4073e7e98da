use crate::api::types::{LoginRequest, LoginResponse, RegisterRequest};
use crate::api::ApiClient;
use crate::cache::ResourceCache;
use crate::query::Mutation;
use crate::session::SessionStore;
use crate::ui::components::{InputResult, TextInput};
use crate::ui::view::{Shortcut, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
  Login,
  Register,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
  FirstName,
  LastName,
  Email,
  Password,
}

/// Auth form: login by default, Ctrl-R switches to registration and
/// Ctrl-F requests a password reset for the typed email.
///
/// A rejected submission (wrong password, deactivated account, taken email)
/// shows the server's message below the form and leaves every field
/// populated.
pub struct LoginView {
  api: ApiClient,
  cache: ResourceCache,
  session: SessionStore,
  mode: Mode,
  first_name: TextInput,
  last_name: TextInput,
  email: TextInput,
  password: TextInput,
  focus: Field,
  first_name_error: Option<String>,
  last_name_error: Option<String>,
  email_error: Option<String>,
  password_error: Option<String>,
  server_error: Option<String>,
  info: Option<String>,
  auth: Mutation<LoginResponse>,
  forgot: Mutation<()>,
}

impl LoginView {
  pub fn new(api: ApiClient, cache: ResourceCache, session: SessionStore) -> Self {
    Self {
      api,
      cache,
      session,
      mode: Mode::Login,
      first_name: TextInput::new(),
      last_name: TextInput::new(),
      email: TextInput::new(),
      password: TextInput::new(),
      focus: Field::Email,
      first_name_error: None,
      last_name_error: None,
      email_error: None,
      password_error: None,
      server_error: None,
      info: None,
      auth: Mutation::idle(),
      forgot: Mutation::idle(),
    }
  }

  fn fields(&self) -> &'static [Field] {
    match self.mode {
      Mode::Login => &[Field::Email, Field::Password],
      Mode::Register => &[
        Field::FirstName,
        Field::LastName,
        Field::Email,
        Field::Password,
      ],
    }
  }

  fn move_focus(&mut self, forward: bool) {
    let fields = self.fields();
    let pos = fields.iter().position(|f| *f == self.focus).unwrap_or(0);
    let next = if forward {
      (pos + 1) % fields.len()
    } else {
      (pos + fields.len() - 1) % fields.len()
    };
    self.focus = fields[next];
  }

  fn toggle_mode(&mut self) {
    self.mode = match self.mode {
      Mode::Login => Mode::Register,
      Mode::Register => Mode::Login,
    };
    self.focus = match self.mode {
      Mode::Login => Field::Email,
      Mode::Register => Field::FirstName,
    };
    self.first_name_error = None;
    self.last_name_error = None;
    self.email_error = None;
    self.password_error = None;
    self.server_error = None;
    self.info = None;
  }

  /// Check the visible fields, filling in the inline errors. Returns true
  /// when the form may be submitted.
  fn validate(&mut self) -> bool {
    self.email_error = validate_email(self.email.value());
    self.password_error = validate_password(self.password.value());
    let mut ok = self.email_error.is_none() && self.password_error.is_none();

    if self.mode == Mode::Register {
      self.first_name_error = validate_required(self.first_name.value());
      self.last_name_error = validate_required(self.last_name.value());
      ok = ok && self.first_name_error.is_none() && self.last_name_error.is_none();
    }
    ok
  }

  fn submit(&mut self) {
    if !self.validate() || self.auth.in_flight() {
      return;
    }
    self.server_error = None;
    self.info = None;

    let api = self.api.clone();
    // Neither call invalidates anything: the cache is empty before the first
    // login and the app resets it on logout.
    match self.mode {
      Mode::Login => {
        let request = LoginRequest {
          email: self.email.value().trim().to_string(),
          password: self.password.value().to_string(),
        };
        self
          .auth
          .run(&self.cache, &[], async move { api.login(&request).await });
      }
      Mode::Register => {
        let request = RegisterRequest {
          first_name: self.first_name.value().trim().to_string(),
          last_name: self.last_name.value().trim().to_string(),
          email: self.email.value().trim().to_string(),
          password: self.password.value().to_string(),
        };
        self
          .auth
          .run(&self.cache, &[], async move { api.register(&request).await });
      }
    }
  }

  fn request_password_reset(&mut self) {
    self.email_error = validate_email(self.email.value());
    if self.email_error.is_some() || self.forgot.in_flight() {
      return;
    }
    self.server_error = None;
    self.info = None;

    let api = self.api.clone();
    let email = self.email.value().trim().to_string();
    self
      .forgot
      .run(&self.cache, &[], async move { api.forgot_password(&email).await });
  }

  fn focused_input(&mut self) -> &mut TextInput {
    match self.focus {
      Field::FirstName => &mut self.first_name,
      Field::LastName => &mut self.last_name,
      Field::Email => &mut self.email,
      Field::Password => &mut self.password,
    }
  }

  fn any_error_flagged(&self) -> bool {
    self.first_name_error.is_some()
      || self.last_name_error.is_some()
      || self.email_error.is_some()
      || self.password_error.is_some()
  }

  fn render_field(
    &self,
    frame: &mut Frame,
    area: Rect,
    label: &str,
    value: String,
    focused: bool,
    error: Option<&String>,
  ) {
    let border = if focused { Color::Yellow } else { Color::DarkGray };
    let block = Block::default()
      .title(format!(" {} ", label))
      .borders(Borders::ALL)
      .border_style(Style::default().fg(border));

    let mut spans = vec![Span::raw(value)];
    if focused {
      spans.push(Span::styled("_", Style::default().fg(Color::Yellow)));
    }
    if let Some(error) = error {
      spans.push(Span::styled(
        format!("  {}", error),
        Style::default().fg(Color::Red),
      ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
  }
}

impl View for LoginView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
      match key.code {
        KeyCode::Char('r') => {
          self.toggle_mode();
          return ViewAction::None;
        }
        KeyCode::Char('f') => {
          self.request_password_reset();
          return ViewAction::None;
        }
        _ => {}
      }
    }

    match key.code {
      KeyCode::Tab | KeyCode::Down => {
        self.move_focus(true);
        return ViewAction::None;
      }
      KeyCode::BackTab | KeyCode::Up => {
        self.move_focus(false);
        return ViewAction::None;
      }
      KeyCode::Enter => {
        self.submit();
        return ViewAction::None;
      }
      _ => {}
    }

    match self.focused_input().handle_key(key) {
      InputResult::Consumed => {
        // Re-validate as the user types, but only once a field has already
        // been flagged; a pristine form stays clean.
        if self.any_error_flagged() {
          self.validate();
        }
      }
      InputResult::Cancelled | InputResult::Submitted(_) | InputResult::NotHandled => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let form_width = (area.width * 50 / 100).clamp(30, 50);
    let x = area.x + (area.width.saturating_sub(form_width)) / 2;
    let y = area.y + area.height / 5;
    let form_height = match self.mode {
      Mode::Login => 8,
      Mode::Register => 14,
    };
    let form = Rect::new(x, y, form_width, form_height.min(area.height));

    let mut constraints = Vec::new();
    if self.mode == Mode::Register {
      constraints.push(Constraint::Length(3)); // First name
      constraints.push(Constraint::Length(3)); // Last name
    }
    constraints.push(Constraint::Length(3)); // Email
    constraints.push(Constraint::Length(3)); // Password
    constraints.push(Constraint::Length(1)); // Status line
    constraints.push(Constraint::Length(1)); // Message line

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints(constraints)
      .split(form);

    let mut idx = 0;
    if self.mode == Mode::Register {
      self.render_field(
        frame,
        chunks[idx],
        "First name",
        self.first_name.value().to_string(),
        self.focus == Field::FirstName,
        self.first_name_error.as_ref(),
      );
      idx += 1;
      self.render_field(
        frame,
        chunks[idx],
        "Last name",
        self.last_name.value().to_string(),
        self.focus == Field::LastName,
        self.last_name_error.as_ref(),
      );
      idx += 1;
    }
    self.render_field(
      frame,
      chunks[idx],
      "Email",
      self.email.value().to_string(),
      self.focus == Field::Email,
      self.email_error.as_ref(),
    );
    idx += 1;
    self.render_field(
      frame,
      chunks[idx],
      "Password",
      self.password.masked_value(),
      self.focus == Field::Password,
      self.password_error.as_ref(),
    );
    idx += 1;

    let status = if self.auth.in_flight() {
      Span::styled(
        match self.mode {
          Mode::Login => "Logging in...",
          Mode::Register => "Registering...",
        },
        Style::default().fg(Color::Yellow),
      )
    } else {
      Span::styled(
        match self.mode {
          Mode::Login => "Enter: log in   Ctrl-R: register   Ctrl-F: forgot password",
          Mode::Register => "Enter: register   Ctrl-R: back to login",
        },
        Style::default().fg(Color::DarkGray),
      )
    };
    frame.render_widget(Paragraph::new(Line::from(status)), chunks[idx]);
    idx += 1;

    let message = if let Some(error) = &self.server_error {
      Some(Span::styled(error.clone(), Style::default().fg(Color::Red)))
    } else {
      self
        .info
        .as_ref()
        .map(|info| Span::styled(info.clone(), Style::default().fg(Color::Green)))
    };
    if let Some(message) = message {
      frame.render_widget(Paragraph::new(Line::from(message)), chunks[idx]);
    }
  }

  fn breadcrumb_label(&self) -> String {
    match self.mode {
      Mode::Login => "Login".to_string(),
      Mode::Register => "Register".to_string(),
    }
  }

  fn wants_text_input(&self) -> bool {
    true
  }

  fn tick(&mut self) -> ViewAction {
    if let Some(result) = self.auth.poll() {
      match result {
        Ok(response) => {
          if let Err(e) = self.session.set_credentials(response.user, response.token) {
            tracing::warn!("failed to persist session: {}", e);
          }
          return ViewAction::LoggedIn;
        }
        Err(e) => {
          // Keep the typed values so the user can correct and resubmit.
          self.server_error = Some(e.to_string());
        }
      }
    }
    if let Some(result) = self.forgot.poll() {
      match result {
        Ok(()) => {
          self.info = Some("Password reset requested, check your email".to_string());
        }
        Err(e) => {
          self.server_error = Some(e.to_string());
        }
      }
    }
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("Tab", "switch field"),
      Shortcut::new("Enter", "submit"),
      Shortcut::new("Ctrl-R", "login/register"),
      Shortcut::new("Ctrl-C", "quit"),
    ]
  }
}

fn validate_required(value: &str) -> Option<String> {
  if value.trim().is_empty() {
    Some("required".to_string())
  } else {
    None
  }
}

fn validate_email(value: &str) -> Option<String> {
  let value = value.trim();
  if value.is_empty() {
    return Some("required".to_string());
  }
  // Same shallow shape check the server's form uses; the server re-validates.
  let Some((local, domain)) = value.split_once('@') else {
    return Some("not an email address".to_string());
  };
  if local.is_empty() || !domain.contains('.') {
    return Some("not an email address".to_string());
  }
  None
}

fn validate_password(value: &str) -> Option<String> {
  if value.is_empty() {
    return Some("required".to_string());
  }
  if value.len() < MIN_PASSWORD_LEN {
    return Some(format!("at least {} characters", MIN_PASSWORD_LEN));
  }
  None
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::ApiError;
  use crate::config::{ApiConfig, Config};

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn ctrl_key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::CONTROL)
  }

  fn test_view() -> LoginView {
    let dir = tempfile::tempdir().expect("tempdir");
    let session =
      SessionStore::open_at(dir.path().join("session.json")).expect("session store opens");
    let config = Config {
      api: ApiConfig {
        base_url: "http://localhost:9/api/".to_string(),
      },
      title: None,
      tick_rate_ms: 250,
    };
    let api = ApiClient::new(&config, session.clone()).expect("client builds");
    LoginView::new(api, ResourceCache::new(), session)
  }

  fn type_str(view: &mut LoginView, s: &str) {
    for c in s.chars() {
      view.handle_key(key(KeyCode::Char(c)));
    }
  }

  #[test]
  fn test_invalid_form_blocks_submission() {
    let mut view = test_view();
    type_str(&mut view, "not-an-email");
    view.handle_key(key(KeyCode::Enter));

    assert!(view.email_error.is_some());
    assert!(view.password_error.is_some());
    assert!(!view.auth.in_flight());
  }

  #[test]
  fn test_register_mode_requires_names() {
    let mut view = test_view();
    view.handle_key(ctrl_key(KeyCode::Char('r')));
    assert_eq!(view.mode, Mode::Register);
    assert_eq!(view.focus, Field::FirstName);

    // Skip the name fields, fill only email and password
    view.handle_key(key(KeyCode::Tab));
    view.handle_key(key(KeyCode::Tab));
    type_str(&mut view, "user@example.com");
    view.handle_key(key(KeyCode::Tab));
    type_str(&mut view, "hunter22");
    view.handle_key(key(KeyCode::Enter));

    assert!(view.first_name_error.is_some());
    assert!(view.last_name_error.is_some());
    assert!(!view.auth.in_flight());
  }

  #[test]
  fn test_forgot_password_requires_valid_email() {
    let mut view = test_view();
    type_str(&mut view, "nope");
    view.handle_key(ctrl_key(KeyCode::Char('f')));

    assert!(view.email_error.is_some());
    assert!(!view.forgot.in_flight());
  }

  #[tokio::test]
  async fn test_failed_login_keeps_fields_and_shows_message() {
    let mut view = test_view();
    type_str(&mut view, "user@example.com");
    view.handle_key(key(KeyCode::Tab));
    type_str(&mut view, "hunter22");

    let cache = view.cache.clone();
    view.auth.run(&cache, &[], async {
      Err::<LoginResponse, _>(ApiError::Server {
        status: 401,
        message: "invalid credentials".into(),
      })
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert!(matches!(view.tick(), ViewAction::None));
    assert_eq!(
      view.server_error.as_deref(),
      Some("server error (401): invalid credentials")
    );
    assert_eq!(view.email.value(), "user@example.com");
    assert_eq!(view.password.value(), "hunter22");
    assert!(!view.session.is_logged_in());
  }

  #[test]
  fn test_email_validation() {
    assert!(validate_email("").is_some());
    assert!(validate_email("no-at-sign").is_some());
    assert!(validate_email("@example.com").is_some());
    assert!(validate_email("user@nodot").is_some());
    assert!(validate_email("user@example.com").is_none());
    assert!(validate_email("  user@example.com  ").is_none());
  }

  #[test]
  fn test_password_validation() {
    assert!(validate_password("").is_some());
    assert!(validate_password("short").is_some());
    assert!(validate_password("long enough").is_none());
  }
}
