use crate::api::types::{Notification, UnreadCount};
use crate::api::ApiClient;
use crate::cache::{QueryKey, ResourceCache, Tag};
use crate::query::{Mutation, Query, QueryState};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{format_timestamp, truncate};
use crate::ui::view::{Shortcut, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// Notification inbox: the list plus the unread counter, both tagged so a
/// mark-read anywhere refreshes both.
pub struct NotificationsView {
  api: ApiClient,
  cache: ResourceCache,
  query: Query<Vec<Notification>>,
  unread: Query<UnreadCount>,
  list_state: ListState,
  mutation: Mutation<()>,
  notice: Option<String>,
}

impl NotificationsView {
  pub fn new(api: ApiClient, cache: ResourceCache) -> Self {
    let api_list = api.clone();
    let mut query = Query::new(
      &cache,
      QueryKey::bare("notifications"),
      &[Tag::Notification],
      move || {
        let api = api_list.clone();
        async move { api.notifications().await }
      },
    );
    query.fetch();

    let api_count = api.clone();
    let mut unread = Query::new(
      &cache,
      QueryKey::bare("notifications/unread-count"),
      &[Tag::Notification],
      move || {
        let api = api_count.clone();
        async move { api.unread_count().await }
      },
    );
    unread.fetch();

    Self {
      api,
      cache,
      query,
      unread,
      list_state: ListState::default(),
      mutation: Mutation::idle(),
      notice: None,
    }
  }

  fn notifications(&self) -> &[Notification] {
    self.query.data().map(|v| v.as_slice()).unwrap_or(&[])
  }

  fn mark_selected_read(&mut self) {
    let Some(notification) = self
      .list_state
      .selected()
      .and_then(|i| self.notifications().get(i))
    else {
      return;
    };
    if notification.read {
      return;
    }
    let id = notification.id;

    // Optimistic: flip the row locally so the list updates on this tick; the
    // invalidation after the request reconciles with the server.
    if let Some(list) = self.query.data() {
      let updated: Vec<Notification> = list
        .iter()
        .map(|n| {
          let mut n = n.clone();
          if n.id == id {
            n.read = true;
          }
          n
        })
        .collect();
      if let Ok(value) = serde_json::to_value(updated) {
        self.cache.write(&QueryKey::bare("notifications"), value);
      }
    }

    self.notice = None;
    let api = self.api.clone();
    self.mutation.run(&self.cache, &[Tag::Notification], async move {
      api.mark_notification_read(id).await.map(|_| ())
    });
  }

  fn mark_all_read(&mut self) {
    self.notice = None;
    let api = self.api.clone();
    self.mutation.run(&self.cache, &[Tag::Notification], async move {
      api.mark_all_notifications_read().await
    });
  }
}

impl View for NotificationsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.list_state.select_next();
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.list_state.select_previous();
      }
      KeyCode::Char('r') => {
        self.query.refetch();
        self.unread.refetch();
      }
      KeyCode::Char('m') | KeyCode::Enter => {
        self.mark_selected_read();
      }
      KeyCode::Char('M') => {
        self.mark_all_read();
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

    let unread = self.unread.data().map(|c| c.count).unwrap_or(0);
    let title = match self.query.state() {
      QueryState::Loading => " Notifications (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Notifications (error: {}) ", e),
      _ => format!(" Notifications ({} unread) ", unread),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let notifications = self.notifications();
    let len = notifications.len();
    if notifications.is_empty() && !self.query.is_loading() {
      let content = if self.query.is_error() {
        "Failed to load notifications. Press 'r' to retry."
      } else {
        "No notifications."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, chunks[0]);
    } else {
      let items: Vec<ListItem> = notifications
        .iter()
        .map(|notification| {
          let style = if notification.read {
            Style::default().fg(Color::DarkGray)
          } else {
            Style::default().fg(Color::White).bold()
          };
          let marker = if notification.read { "  " } else { "● " };
          let line = Line::from(vec![
            Span::styled(marker, Style::default().fg(Color::Cyan)),
            Span::styled(truncate(&notification.message, 70), style),
            Span::styled(
              notification
                .created_at
                .as_deref()
                .map(|d| format!("  {}", format_timestamp(d)))
                .unwrap_or_default(),
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
  }

  fn breadcrumb_label(&self) -> String {
    "Notifications".to_string()
  }

  fn tick(&mut self) -> ViewAction {
    self.query.poll();
    self.unread.poll();
    if let Some(Err(e)) = self.mutation.poll() {
      self.notice = Some(e.to_string());
    }
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("m", "mark read"),
      Shortcut::new("M", "mark all read"),
      Shortcut::new("r", "refresh"),
    ]
  }
}
