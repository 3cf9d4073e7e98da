use crate::api::types::{Department, NewDepartment};
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptKind {
  Create,
  Rename(u64),
}

/// Department administration.
pub struct DepartmentsView {
  api: ApiClient,
  cache: ResourceCache,
  query: Query<Vec<Department>>,
  list_state: ListState,
  prompt: Prompt,
  prompt_kind: PromptKind,
  mutation: Mutation<()>,
  notice: Option<String>,
}

impl DepartmentsView {
  pub fn new(api: ApiClient, cache: ResourceCache) -> Self {
    let api_for_query = api.clone();
    let mut query = Query::new(
      &cache,
      QueryKey::bare("departments"),
      &[Tag::Department],
      move || {
        let api = api_for_query.clone();
        async move { api.list_departments().await }
      },
    );
    query.fetch();

    Self {
      api,
      cache,
      query,
      list_state: ListState::default(),
      prompt: Prompt::new(),
      prompt_kind: PromptKind::Create,
      mutation: Mutation::idle(),
      notice: None,
    }
  }

  fn departments(&self) -> &[Department] {
    self.query.data().map(|v| v.as_slice()).unwrap_or(&[])
  }

  fn selected_department(&self) -> Option<&Department> {
    self
      .list_state
      .selected()
      .and_then(|i| self.departments().get(i))
  }

  /// Names are compared trimmed and case-insensitively; renaming a
  /// department to its own current name (any casing) is allowed.
  fn name_taken(&self, name: &str, exclude: Option<u64>) -> bool {
    let name = name.trim().to_lowercase();
    self
      .departments()
      .iter()
      .any(|d| Some(d.id) != exclude && d.name.trim().to_lowercase() == name)
  }

  fn submit_prompt(&mut self, value: String) {
    let name = value.trim().to_string();
    if name.is_empty() {
      return;
    }

    let exclude = match self.prompt_kind {
      PromptKind::Create => None,
      PromptKind::Rename(id) => Some(id),
    };
    if self.name_taken(&name, exclude) {
      self.notice = Some(format!("a department named \"{}\" already exists", name));
      return;
    }

    self.notice = None;
    let api = self.api.clone();
    match self.prompt_kind {
      PromptKind::Create => {
        self.mutation.run(&self.cache, &[Tag::Department], async move {
          api.create_department(&NewDepartment { name }).await.map(|_| ())
        });
      }
      PromptKind::Rename(id) => {
        self.mutation.run(&self.cache, &[Tag::Department], async move {
          api.rename_department(id, &name).await.map(|_| ())
        });
      }
    }
  }

  fn delete_selected(&mut self) {
    let Some(department) = self.selected_department() else {
      return;
    };
    let id = department.id;
    self.notice = None;
    let api = self.api.clone();
    // Members of a deleted department fall back to "no department".
    self
      .mutation
      .run(&self.cache, &[Tag::Department, Tag::User], async move {
        api.delete_department(id).await
      });
  }
}

impl View for DepartmentsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.prompt.handle_key(key) {
      KeyResult::Handled => return ViewAction::None,
      KeyResult::Event(PromptResult::Submitted(value)) => {
        self.submit_prompt(value);
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
        self.prompt_kind = PromptKind::Create;
        self.prompt.open("New department", "");
      }
      KeyCode::Char('e') => {
        if let Some(department) = self.selected_department() {
          let (id, name) = (department.id, department.name.clone());
          self.prompt_kind = PromptKind::Rename(id);
          self.prompt.open("Rename department", &name);
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

    let departments = self.departments();
    let len = departments.len();

    let title = match self.query.state() {
      QueryState::Loading => " Departments (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Departments (error: {}) ", e),
      _ => format!(" Departments ({}) ", len),
    };
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if departments.is_empty() && !self.query.is_loading() {
      let content = if self.query.is_error() {
        "Failed to load departments. Press 'r' to retry."
      } else {
        "No departments. Press 'a' to add one."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, chunks[0]);
    } else {
      let items: Vec<ListItem> = departments
        .iter()
        .map(|department| {
          let line = Line::from(vec![
            Span::styled(
              format!("{:<6}", department.id),
              Style::default().fg(Color::DarkGray),
            ),
            Span::raw(format!("{:<32}", truncate(&department.name, 32))),
            Span::styled(
              format!("{} members", department.member_count),
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
    "Departments".to_string()
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
      Shortcut::new("a", "add"),
      Shortcut::new("e", "rename"),
      Shortcut::new("x", "delete"),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{ApiConfig, Config};
  use crate::session::SessionStore;

  fn department(id: u64, name: &str) -> Department {
    Department {
      id,
      name: name.to_string(),
      member_count: 0,
    }
  }

  fn test_view_with(departments: Vec<Department>) -> DepartmentsView {
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
    let api = ApiClient::new(&config, session).expect("client builds");
    let cache = ResourceCache::new();

    let mut view = DepartmentsView::new(api, cache);
    view.query = {
      let mut query = Query::new(
        &view.cache,
        QueryKey::bare("departments-fixture"),
        &[Tag::Department],
        move || {
          let departments = departments.clone();
          async move { Ok(departments) }
        },
      );
      query.fetch();
      query
    };
    view
  }

  #[tokio::test]
  async fn test_duplicate_name_check_is_case_insensitive() {
    let mut view = test_view_with(vec![department(1, "Engineering"), department(2, "Sales ")]);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    view.tick();

    assert!(view.name_taken("engineering", None));
    assert!(view.name_taken("  SALES ", None));
    assert!(!view.name_taken("Marketing", None));
  }

  #[tokio::test]
  async fn test_rename_to_own_name_is_allowed() {
    let mut view = test_view_with(vec![department(1, "Engineering")]);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    view.tick();

    assert!(!view.name_taken("ENGINEERING", Some(1)));
    assert!(view.name_taken("ENGINEERING", None));
  }

  #[tokio::test]
  async fn test_duplicate_submission_sets_notice_without_request() {
    let mut view = test_view_with(vec![department(1, "Engineering")]);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    view.tick();

    view.prompt_kind = PromptKind::Create;
    view.submit_prompt("  engineering ".to_string());

    assert!(view.notice.is_some());
    assert!(!view.mutation.in_flight());
  }
}
