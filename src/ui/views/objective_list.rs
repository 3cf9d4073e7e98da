use crate::api::types::{NewObjective, Objective};
use crate::api::ApiClient;
use crate::cache::{QueryKey, ResourceCache, Tag};
use crate::query::{Mutation, Query, QueryState};
use crate::ui::components::{InputResult, KeyResult, Prompt, PromptResult, TextInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{progress_bar, progress_color, truncate};
use crate::ui::view::{Shortcut, View, ViewAction};
use crate::ui::views::ObjectiveDetailView;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortMode {
  /// Server order (most recently updated first)
  Server,
  /// Case-insensitive by title
  Title,
  /// Least progress first
  Progress,
}

impl SortMode {
  fn next(self) -> Self {
    match self {
      SortMode::Server => SortMode::Title,
      SortMode::Title => SortMode::Progress,
      SortMode::Progress => SortMode::Server,
    }
  }

  fn label(self) -> &'static str {
    match self {
      SortMode::Server => "updated",
      SortMode::Title => "title",
      SortMode::Progress => "progress",
    }
  }
}

/// Objective list with client-side filter and sort.
pub struct ObjectiveListView {
  api: ApiClient,
  cache: ResourceCache,
  query: Query<Vec<Objective>>,
  list_state: ListState,
  filter: TextInput,
  filtering: bool,
  sort: SortMode,
  prompt: Prompt,
  mutation: Mutation<()>,
  notice: Option<String>,
}

impl ObjectiveListView {
  pub fn new(api: ApiClient, cache: ResourceCache) -> Self {
    let api_for_query = api.clone();
    let mut query = Query::new(
      &cache,
      QueryKey::bare("objectives"),
      &[Tag::Objective],
      move || {
        let api = api_for_query.clone();
        async move { api.list_objectives().await }
      },
    );
    query.fetch();

    Self {
      api,
      cache,
      query,
      list_state: ListState::default(),
      filter: TextInput::new(),
      filtering: false,
      sort: SortMode::Server,
      prompt: Prompt::new(),
      mutation: Mutation::idle(),
      notice: None,
    }
  }

  /// Objectives after the client-side filter and sort are applied.
  ///
  /// The sort is stable and case-insensitive, so objectives differing only
  /// in case keep their server order relative to each other.
  fn visible(&self) -> Vec<&Objective> {
    let needle = self.filter.value().trim().to_lowercase();
    let mut items: Vec<&Objective> = self
      .query
      .data()
      .map(|v| v.as_slice())
      .unwrap_or(&[])
      .iter()
      .filter(|o| needle.is_empty() || o.title.to_lowercase().contains(&needle))
      .collect();

    match self.sort {
      SortMode::Server => {}
      SortMode::Title => items.sort_by_key(|o| o.title.to_lowercase()),
      SortMode::Progress => items.sort_by_key(|o| o.progress),
    }
    items
  }

  fn selected_id(&self) -> Option<u64> {
    let idx = self.list_state.selected()?;
    self.visible().get(idx).map(|o| o.id)
  }

  fn create_objective(&mut self, title: String) {
    let title = title.trim().to_string();
    if title.is_empty() {
      return;
    }
    self.notice = None;
    let api = self.api.clone();
    self.mutation.run(&self.cache, &[Tag::Objective], async move {
      api
        .create_objective(&NewObjective {
          title,
          description: None,
          due_date: None,
        })
        .await
        .map(|_| ())
    });
  }

  fn delete_selected(&mut self) {
    let Some(id) = self.selected_id() else {
      return;
    };
    self.notice = None;
    let api = self.api.clone();
    self.mutation.run(&self.cache, &[Tag::Objective], async move {
      api.delete_objective(id).await
    });
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let visible = self.visible();
    let len = visible.len();

    let title = match self.query.state() {
      QueryState::Loading => " Objectives (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Objectives (error: {}) ", e),
      _ if self.filter.is_empty() => format!(" Objectives ({}) [sort: {}] ", len, self.sort.label()),
      _ => format!(
        " Objectives ({}) [filter: {}] [sort: {}] ",
        len,
        self.filter.value(),
        self.sort.label()
      ),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if visible.is_empty() && !self.query.is_loading() {
      let content = if self.query.is_error() {
        "Failed to load objectives. Press 'r' to retry."
      } else if !self.filter.is_empty() {
        "No objectives match the filter."
      } else {
        "No objectives yet. Press 'a' to add one."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = visible
      .iter()
      .map(|objective| {
        let color = progress_color(objective.progress);
        let accepted = match objective.accepted {
          Some(true) => Span::styled("✓", Style::default().fg(Color::Green)),
          Some(false) => Span::styled("✗", Style::default().fg(Color::Red)),
          None => Span::styled("?", Style::default().fg(Color::DarkGray)),
        };

        let line = Line::from(vec![
          accepted,
          Span::raw(" "),
          Span::raw(format!("{:<40}", truncate(&objective.title, 40))),
          Span::raw(" "),
          Span::styled(progress_bar(objective.progress, 10), Style::default().fg(color)),
          Span::raw(" "),
          Span::styled(
            objective.owner_name.clone().unwrap_or_default(),
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

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl View for ObjectiveListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.prompt.handle_key(key) {
      KeyResult::Handled => return ViewAction::None,
      KeyResult::Event(PromptResult::Submitted(title)) => {
        self.create_objective(title);
        return ViewAction::None;
      }
      KeyResult::Event(PromptResult::Cancelled) => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    if self.filtering {
      match self.filter.handle_key(key) {
        InputResult::Submitted(_) => self.filtering = false,
        InputResult::Cancelled => {
          self.filtering = false;
          self.filter.clear();
        }
        InputResult::Consumed | InputResult::NotHandled => {}
      }
      return ViewAction::None;
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
      KeyCode::Char('/') => {
        self.filtering = true;
        self.filter.clear();
      }
      KeyCode::Char('s') => {
        self.sort = self.sort.next();
      }
      KeyCode::Char('a') => {
        self.prompt.open("New objective", "");
      }
      KeyCode::Char('d') => {
        self.delete_selected();
      }
      KeyCode::Enter => {
        if let Some(id) = self.selected_id() {
          return ViewAction::Push(Box::new(ObjectiveDetailView::new(
            id,
            self.api.clone(),
            self.cache.clone(),
          )));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => {
        if !self.filter.is_empty() {
          self.filter.clear();
        } else {
          return ViewAction::Pop;
        }
      }
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Min(0), Constraint::Length(1)])
      .split(area);

    self.render_list(frame, chunks[0]);

    let status = if self.filtering {
      Line::from(vec![
        Span::styled("/", Style::default().fg(Color::Yellow)),
        Span::raw(self.filter.value()),
        Span::styled("_", Style::default().fg(Color::Yellow)),
      ])
    } else if let Some(notice) = &self.notice {
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
    "Objectives".to_string()
  }

  fn wants_text_input(&self) -> bool {
    self.filtering || self.prompt.is_active()
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
      Shortcut::new("d", "delete"),
      Shortcut::new("/", "filter"),
      Shortcut::new("s", "sort"),
      Shortcut::new(":", "command"),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn objective(id: u64, title: &str, progress: u8) -> Objective {
    Objective {
      id,
      title: title.to_string(),
      description: None,
      owner_id: 1,
      owner_name: None,
      department_id: None,
      progress,
      accepted: None,
      due_date: None,
      updated_at: None,
    }
  }

  #[test]
  fn test_sort_mode_cycles() {
    assert_eq!(SortMode::Server.next(), SortMode::Title);
    assert_eq!(SortMode::Title.next(), SortMode::Progress);
    assert_eq!(SortMode::Progress.next(), SortMode::Server);
  }

  #[tokio::test]
  async fn test_title_sort_is_case_insensitive_and_stable() {
    let cache = ResourceCache::new();
    let data = vec![
      objective(1, "beta", 10),
      objective(2, "Alpha", 20),
      objective(3, "BETA", 30),
    ];
    let mut query: Query<Vec<Objective>> = Query::new(
      &cache,
      QueryKey::bare("objectives"),
      &[Tag::Objective],
      move || {
        let data = data.clone();
        async move { Ok(data) }
      },
    );
    query.fetch();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    query.poll();

    let items = query.data().expect("loaded");
    let mut sorted: Vec<&Objective> = items.iter().collect();
    sorted.sort_by_key(|o| o.title.to_lowercase());

    // "beta" (id 1) keeps its place ahead of "BETA" (id 3)
    let ids: Vec<u64> = sorted.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![2, 1, 3]);
  }
}
