use crate::api::types::RatingSummary;
use crate::api::ApiClient;
use crate::cache::{QueryKey, ResourceCache, Tag};
use crate::query::{Query, QueryState};
use crate::session::SessionStore;
use crate::ui::view::{Shortcut, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

const RATING_SCALE: f64 = 5.0;

/// Rating analytics for the logged-in user, their department, and the
/// organization. Each panel degrades independently on failure.
pub struct RatingsView {
  user: Option<Query<RatingSummary>>,
  department: Option<Query<RatingSummary>>,
  organization: Query<RatingSummary>,
}

impl RatingsView {
  pub fn new(api: ApiClient, cache: ResourceCache, session: &SessionStore) -> Self {
    let (user_id, department_id) = match session.user() {
      Some(user) => (Some(user.id), user.department_id),
      None => (None, None),
    };

    let user = user_id.map(|id| {
      let api = api.clone();
      let mut query = Query::new(
        &cache,
        QueryKey::new("user-rating", &id),
        &[Tag::Rating],
        move || {
          let api = api.clone();
          async move { api.user_rating(id).await }
        },
      );
      query.fetch();
      query
    });

    let department = department_id.map(|id| {
      let api = api.clone();
      let mut query = Query::new(
        &cache,
        QueryKey::new("department-rating", &id),
        &[Tag::Rating],
        move || {
          let api = api.clone();
          async move { api.department_rating(id).await }
        },
      );
      query.fetch();
      query
    });

    let mut organization = Query::new(
      &cache,
      QueryKey::bare("organization-rating"),
      &[Tag::Rating, Tag::Organization],
      move || {
        let api = api.clone();
        async move { api.organization_rating().await }
      },
    );
    organization.fetch();

    Self {
      user,
      department,
      organization,
    }
  }

  fn render_panel(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    query: Option<&Query<RatingSummary>>,
    missing: &str,
  ) {
    let block = Block::default()
      .title(format!(" {} ", title))
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let lines = match query.map(Query::state) {
      None => vec![Line::from(Span::styled(
        missing.to_string(),
        Style::default().fg(Color::DarkGray),
      ))],
      Some(QueryState::Idle) | Some(QueryState::Loading) => vec![Line::from(Span::styled(
        "Loading...",
        Style::default().fg(Color::DarkGray),
      ))],
      Some(QueryState::Error(e)) => vec![Line::from(Span::styled(
        format!("Error: {}", e),
        Style::default().fg(Color::Red),
      ))],
      Some(QueryState::Success(summary)) => {
        let filled = (summary.average / RATING_SCALE * 10.0).round() as usize;
        let stars = format!("{}{}", "★".repeat(filled.min(10)), "☆".repeat(10 - filled.min(10)));
        vec![
          Line::from(vec![
            Span::styled(
              format!("{:.1}", summary.average),
              Style::default().fg(Color::Yellow).bold(),
            ),
            Span::styled(
              format!(" / {:.0}", RATING_SCALE),
              Style::default().fg(Color::DarkGray),
            ),
          ]),
          Line::from(Span::styled(stars, Style::default().fg(Color::Yellow))),
          Line::from(Span::styled(
            format!("{} ratings", summary.count),
            Style::default().fg(Color::DarkGray),
          )),
        ]
      }
    };

    frame.render_widget(Paragraph::new(lines).block(block), area);
  }
}

impl View for RatingsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => {
        if let Some(query) = &mut self.user {
          query.refetch();
        }
        if let Some(query) = &mut self.department {
          query.refetch();
        }
        self.organization.refetch();
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([
        Constraint::Percentage(33),
        Constraint::Percentage(33),
        Constraint::Percentage(34),
      ])
      .split(area);

    Self::render_panel(frame, chunks[0], "You", self.user.as_ref(), "Not logged in");
    Self::render_panel(
      frame,
      chunks[1],
      "Department",
      self.department.as_ref(),
      "No department assigned",
    );
    Self::render_panel(frame, chunks[2], "Organization", Some(&self.organization), "");
  }

  fn breadcrumb_label(&self) -> String {
    "Ratings".to_string()
  }

  fn tick(&mut self) -> ViewAction {
    if let Some(query) = &mut self.user {
      query.poll();
    }
    if let Some(query) = &mut self.department {
      query.poll();
    }
    self.organization.poll();
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![Shortcut::new("r", "refresh"), Shortcut::new("q", "back")]
  }
}
