use crate::api::types::Role;
use crate::api::ApiClient;
use crate::cache::{EntryStatus, QueryKey, ResourceCache, Subscription, Tag};
use crate::commands;
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::session::SessionStore;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::renderfns::{draw_footer, draw_header};
use crate::ui::view::{View, ViewAction};
use crate::ui::views::{
  DepartmentsView, LoginView, NotificationsView, ObjectiveListView, RatingsView, UsersView,
};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tracing::info;

/// Main application: owns the view stack, the command palette, and the
/// shared cache.
pub struct App {
  config: Config,
  api: ApiClient,
  cache: ResourceCache,
  session: SessionStore,
  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,
  command: CommandInput,
  /// App-wide unread-notification badge; shares the cache entry with the
  /// notifications view.
  unread: Option<Subscription>,
  should_quit: bool,
}

impl App {
  pub fn new(config: Config, session: SessionStore) -> Result<Self> {
    let api = ApiClient::new(&config, session.clone())?;
    let cache = ResourceCache::new();

    let root: Box<dyn View> = if session.is_logged_in() {
      info!(user = ?session.user().map(|u| u.email), "resuming session");
      Box::new(ObjectiveListView::new(api.clone(), cache.clone()))
    } else {
      Box::new(LoginView::new(api.clone(), cache.clone(), session.clone()))
    };

    let mut app = Self {
      config,
      api,
      cache,
      session,
      view_stack: vec![root],
      command: CommandInput::new(),
      unread: None,
      should_quit: false,
    };
    if app.session.is_logged_in() {
      app.subscribe_unread_badge();
    }
    Ok(app)
  }

  fn subscribe_unread_badge(&mut self) {
    let api = self.api.clone();
    let sub = self.cache.register(
      QueryKey::bare("notifications/unread-count"),
      &[Tag::Notification],
      move || {
        let api = api.clone();
        async move {
          let count = api.unread_count().await?;
          serde_json::to_value(count)
            .map_err(|e| crate::api::ApiError::Network(format!("invalid response body: {}", e)))
        }
      },
    );
    self.unread = Some(sub);
  }

  fn unread_count(&self) -> Option<u64> {
    let sub = self.unread.as_ref()?;
    let snap = self.cache.snapshot(sub.key())?;
    snap.value?.get("count")?.as_u64()
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(Duration::from_millis(self.config.tick_rate_ms));

    // Main loop
    while !self.should_quit {
      terminal.draw(|frame| self.draw(frame))?;

      if let Some(event) = events.next().await {
        match event {
          Event::Key(key) => self.handle_key(key),
          Event::Tick => self.on_tick(),
        }
      }
    }

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
  }

  fn role(&self) -> Role {
    self.session.role().unwrap_or(Role::Staff)
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    // The command palette only exists once logged in, and never steals keys
    // from a view that is capturing text.
    let logged_in = self.session.is_logged_in();
    let capturing = self
      .view_stack
      .last()
      .map(|v| v.wants_text_input())
      .unwrap_or(false);

    if logged_in && (self.command.is_active() || !capturing) {
      match self.command.handle_key(key, self.role()) {
        KeyResult::Handled => return,
        KeyResult::Event(CommandEvent::Submitted(cmd)) => {
          self.execute_command(&cmd);
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) => return,
        KeyResult::NotHandled => {}
      }
    }

    let Some(view) = self.view_stack.last_mut() else {
      return;
    };
    let action = view.handle_key(key);
    self.apply_action(action);
  }

  fn apply_action(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.view_stack.push(view),
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
      ViewAction::LoggedIn => {
        info!(user = ?self.session.user().map(|u| u.email), "logged in");
        self.subscribe_unread_badge();
        self.reset_to(Box::new(ObjectiveListView::new(
          self.api.clone(),
          self.cache.clone(),
        )));
      }
    }
  }

  fn reset_to(&mut self, root: Box<dyn View>) {
    self.view_stack.clear();
    self.view_stack.push(root);
  }

  fn execute_command(&mut self, cmd: &str) {
    // get_suggestions already filters by role, but the palette passes raw
    // text through on Enter, so re-check here.
    let allowed = commands::COMMANDS
      .iter()
      .find(|c| c.name == cmd)
      .map(|c| self.role() >= c.min_role)
      .unwrap_or(false);
    if !allowed {
      return;
    }

    match cmd {
      "objectives" => {
        self.reset_to(Box::new(ObjectiveListView::new(
          self.api.clone(),
          self.cache.clone(),
        )));
      }
      "notifications" => {
        self.reset_to(Box::new(NotificationsView::new(
          self.api.clone(),
          self.cache.clone(),
        )));
      }
      "ratings" => {
        self.reset_to(Box::new(RatingsView::new(
          self.api.clone(),
          self.cache.clone(),
          &self.session,
        )));
      }
      "users" => {
        self.reset_to(Box::new(UsersView::new(self.api.clone(), self.cache.clone())));
      }
      "departments" => {
        self.reset_to(Box::new(DepartmentsView::new(
          self.api.clone(),
          self.cache.clone(),
        )));
      }
      "logout" => self.logout(),
      "quit" => {
        self.should_quit = true;
      }
      _ => {}
    }
  }

  fn logout(&mut self) {
    info!("logging out");

    // Best-effort server-side invalidation; the local session is cleared
    // regardless of the outcome.
    let api = self.api.clone();
    tokio::spawn(async move {
      if let Err(e) = api.logout().await {
        tracing::debug!("server logout failed: {}", e);
      }
    });

    if let Err(e) = self.session.logout() {
      tracing::warn!("failed to clear session file: {}", e);
    }

    // Drop every cached resource along with the old views. The badge
    // subscription goes first; it points into the old cache.
    self.unread = None;
    self.cache = ResourceCache::new();
    self.reset_to(Box::new(LoginView::new(
      self.api.clone(),
      self.cache.clone(),
      self.session.clone(),
    )));
  }

  fn on_tick(&mut self) {
    // Every view on the stack keeps polling, so a background list picks up
    // invalidations triggered from a detail view before the user returns.
    let mut action = ViewAction::None;
    let last = self.view_stack.len().saturating_sub(1);
    for (i, view) in self.view_stack.iter_mut().enumerate() {
      let a = view.tick();
      if i == last {
        action = a;
      }
    }
    self.apply_action(action);

    // Keep the unread badge current. Only stale or never-fetched entries
    // trigger a read; a rejected fetch stays rejected until the next
    // invalidation rather than retrying every tick.
    if let Some(sub) = &self.unread {
      let needs_fetch = self
        .cache
        .snapshot(sub.key())
        .map(|s| s.stale || s.status == EntryStatus::Uninitialized)
        .unwrap_or(false);
      if needs_fetch {
        let cache = self.cache.clone();
        let key = sub.key().clone();
        tokio::spawn(async move {
          let _ = cache.read(&key).await;
        });
      }
    }

    self.cache.sweep();
  }

  fn draw(&mut self, frame: &mut Frame) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(1), // Header
        Constraint::Min(0),    // Content
        Constraint::Length(1), // Footer
      ])
      .split(frame.area());

    let title = self.config.title.as_deref().unwrap_or("pmdash");
    let user = self.session.user();
    let shortcuts = self
      .view_stack
      .last()
      .map(|v| v.shortcuts())
      .unwrap_or_default();
    draw_header(
      frame,
      chunks[0],
      title,
      &self.config.api.base_url,
      user.as_ref(),
      self.unread_count(),
      &shortcuts,
    );

    if let Some(view) = self.view_stack.last_mut() {
      view.render(frame, chunks[1]);
    }

    let breadcrumbs: Vec<String> = self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect();
    draw_footer(frame, chunks[2], &breadcrumbs);

    self.command.render_overlay(frame, chunks[1], self.role());
  }
}
