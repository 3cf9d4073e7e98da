use crate::api::types::{RegisterRequest, Role, User};
use crate::api::ApiClient;
use crate::cache::{QueryKey, ResourceCache, Tag};
use crate::query::{Mutation, Query, QueryState};
use crate::ui::components::{KeyResult, Prompt, PromptResult};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::truncate;
use crate::ui::view::{Shortcut, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

fn next_role(role: Role) -> Role {
  match role {
    Role::Staff => Role::Admin,
    Role::Admin => Role::SuperAdmin,
    Role::SuperAdmin => Role::Staff,
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptKind {
  NewUser,
  AssignDepartment,
}

/// User administration: creation, activation, role and department
/// assignment.
pub struct UsersView {
  api: ApiClient,
  cache: ResourceCache,
  query: Query<Vec<User>>,
  list_state: ListState,
  prompt: Prompt,
  prompt_kind: PromptKind,
  mutation: Mutation<()>,
  notice: Option<String>,
}

impl UsersView {
  pub fn new(api: ApiClient, cache: ResourceCache) -> Self {
    let api_for_query = api.clone();
    let mut query = Query::new(&cache, QueryKey::bare("users"), &[Tag::User], move || {
      let api = api_for_query.clone();
      async move { api.list_users().await }
    });
    query.fetch();

    Self {
      api,
      cache,
      query,
      list_state: ListState::default(),
      prompt: Prompt::new(),
      prompt_kind: PromptKind::NewUser,
      mutation: Mutation::idle(),
      notice: None,
    }
  }

  fn users(&self) -> &[User] {
    self.query.data().map(|v| v.as_slice()).unwrap_or(&[])
  }

  fn selected_user(&self) -> Option<&User> {
    self.list_state.selected().and_then(|i| self.users().get(i))
  }

  fn run<Fut>(&mut self, invalidates: &[Tag], fut: Fut)
  where
    Fut: std::future::Future<Output = crate::api::ApiResult<()>> + Send + 'static,
  {
    self.notice = None;
    self.mutation.run(&self.cache, invalidates, fut);
  }

  fn toggle_selected_active(&mut self) {
    let Some(user) = self.selected_user() else {
      return;
    };
    let (id, active) = (user.id, user.active);
    let api = self.api.clone();
    self.run(&[Tag::User], async move {
      api.set_user_active(id, !active).await.map(|_| ())
    });
  }

  fn cycle_selected_role(&mut self) {
    let Some(user) = self.selected_user() else {
      return;
    };
    let (id, role) = (user.id, next_role(user.role));
    let api = self.api.clone();
    self.run(&[Tag::User], async move {
      api.set_user_role(id, role).await.map(|_| ())
    });
  }

  /// Create a user from a one-line prompt: `first last email password`.
  fn create_user(&mut self, input: String) {
    let Some(request) = parse_new_user(&input) else {
      self.notice = Some("expected: first last email password".to_string());
      return;
    };
    let api = self.api.clone();
    self.run(&[Tag::User], async move {
      api.create_user(&request).await.map(|_| ())
    });
  }

  fn assign_department(&mut self, input: String) {
    let Some(user) = self.selected_user() else {
      return;
    };
    let id = user.id;
    let Ok(department_id) = input.trim().parse::<u64>() else {
      self.notice = Some(format!("not a department id: {}", input.trim()));
      return;
    };
    let api = self.api.clone();
    // Department membership counts change with the assignment.
    self.run(&[Tag::User, Tag::Department], async move {
      api.set_user_department(id, department_id).await.map(|_| ())
    });
  }

  fn delete_selected(&mut self) {
    let Some(user) = self.selected_user() else {
      return;
    };
    let id = user.id;
    let api = self.api.clone();
    self.run(&[Tag::User, Tag::Department], async move {
      api.delete_user(id).await
    });
  }
}

impl View for UsersView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.prompt.handle_key(key) {
      KeyResult::Handled => return ViewAction::None,
      KeyResult::Event(PromptResult::Submitted(value)) => {
        match self.prompt_kind {
          PromptKind::NewUser => self.create_user(value),
          PromptKind::AssignDepartment => self.assign_department(value),
        }
        return ViewAction::None;
      }
      KeyResult::Event(PromptResult::Cancelled) => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.list_state.select_next();
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.list_state.select_previous();
      }
      KeyCode::Char('r') => {
        self.query.refetch();
      }
      KeyCode::Char('a') => {
        self.toggle_selected_active();
      }
      KeyCode::Char('t') => {
        self.cycle_selected_role();
      }
      KeyCode::Char('n') => {
        self.prompt_kind = PromptKind::NewUser;
        self.prompt.open("New user (first last email password)", "");
      }
      KeyCode::Char('d') => {
        if self.selected_user().is_some() {
          self.prompt_kind = PromptKind::AssignDepartment;
          self.prompt.open("Assign department (id)", "");
        }
      }
      KeyCode::Char('x') => {
        self.delete_selected();
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Min(0), Constraint::Length(1)])
      .split(area);

    let users = self.users();
    let len = users.len();

    let title = match self.query.state() {
      QueryState::Loading => " Users (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Users (error: {}) ", e),
      _ => format!(" Users ({}) ", len),
    };
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if users.is_empty() && !self.query.is_loading() {
      let content = if self.query.is_error() {
        "Failed to load users. Press 'r' to retry."
      } else {
        "No users."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, chunks[0]);
    } else {
      let items: Vec<ListItem> = users
        .iter()
        .map(|user| {
          let name_style = if user.active {
            Style::default().fg(Color::White)
          } else {
            Style::default().fg(Color::DarkGray).crossed_out()
          };
          let line = Line::from(vec![
            Span::styled(format!("{:<24}", truncate(&user.display_name(), 24)), name_style),
            Span::styled(
              format!("{:<28}", truncate(&user.email, 28)),
              Style::default().fg(Color::DarkGray),
            ),
            Span::styled(format!("{:<12}", user.role), Style::default().fg(Color::Cyan)),
            Span::styled(
              user
                .department_id
                .map(|d| format!("dept {}", d))
                .unwrap_or_else(|| "no dept".to_string()),
              Style::default().fg(Color::DarkGray),
            ),
          ]);
          ListItem::new(line)
        })
        .collect();

      ensure_valid_selection(&mut self.list_state, len);

      let list = List::new(items)
        .block(block)
        .highlight_style(
          Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

      frame.render_stateful_widget(list, chunks[0], &mut self.list_state);
    }

    let status = if let Some(notice) = &self.notice {
      Line::from(Span::styled(notice.clone(), Style::default().fg(Color::Red)))
    } else if self.mutation.in_flight() {
      Line::from(Span::styled("Saving...", Style::default().fg(Color::Yellow)))
    } else {
      Line::default()
    };
    frame.render_widget(Paragraph::new(status), chunks[1]);

    self.prompt.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Users".to_string()
  }

  fn wants_text_input(&self) -> bool {
    self.prompt.is_active()
  }

  fn tick(&mut self) -> ViewAction {
    self.query.poll();
    if let Some(Err(e)) = self.mutation.poll() {
      self.notice = Some(e.to_string());
    }
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("n", "new user"),
      Shortcut::new("a", "toggle active"),
      Shortcut::new("t", "cycle role"),
      Shortcut::new("d", "department"),
      Shortcut::new("x", "delete"),
    ]
  }
}

fn parse_new_user(input: &str) -> Option<RegisterRequest> {
  let mut parts = input.split_whitespace();
  let first_name = parts.next()?.to_string();
  let last_name = parts.next()?.to_string();
  let email = parts.next()?.to_string();
  let password = parts.next()?.to_string();
  if parts.next().is_some() || !email.contains('@') {
    return None;
  }
  Some(RegisterRequest {
    first_name,
    last_name,
    email,
    password,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_role_cycle_covers_all_roles() {
    assert_eq!(next_role(Role::Staff), Role::Admin);
    assert_eq!(next_role(Role::Admin), Role::SuperAdmin);
    assert_eq!(next_role(Role::SuperAdmin), Role::Staff);
  }

  #[test]
  fn test_parse_new_user() {
    let request = parse_new_user("Ada Lovelace ada@example.com secret1").expect("parses");
    assert_eq!(request.first_name, "Ada");
    assert_eq!(request.last_name, "Lovelace");
    assert_eq!(request.email, "ada@example.com");
    assert_eq!(request.password, "secret1");

    assert!(parse_new_user("too few args").is_none());
    assert!(parse_new_user("Ada Lovelace not-an-email secret1").is_none());
    assert!(parse_new_user("one two three four five").is_none());
  }
}
