use crate::api::types::{Comment, NewTask, Objective, Task};
use crate::api::ApiClient;
use crate::cache::{QueryKey, ResourceCache, Tag};
use crate::query::{Mutation, Query, QueryState};
use crate::ui::components::{KeyResult, Prompt, PromptResult};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{done_mark, progress_bar, progress_color, truncate};
use crate::ui::view::{Shortcut, View, ViewAction};
use crate::ui::views::TaskDetailView;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

const PROGRESS_STEP: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptKind {
  NewTask,
  NewComment,
}

/// Single objective with its tasks and comments.
pub struct ObjectiveDetailView {
  api: ApiClient,
  cache: ResourceCache,
  id: u64,
  objective: Query<Objective>,
  tasks: Query<Vec<Task>>,
  comments: Query<Vec<Comment>>,
  task_state: ListState,
  prompt: Prompt,
  prompt_kind: PromptKind,
  mutation: Mutation<()>,
  notice: Option<String>,
}

impl ObjectiveDetailView {
  pub fn new(id: u64, api: ApiClient, cache: ResourceCache) -> Self {
    let api_objective = api.clone();
    let mut objective = Query::new(
      &cache,
      QueryKey::new("objective", &id),
      &[Tag::Objective],
      move || {
        let api = api_objective.clone();
        async move { api.get_objective(id).await }
      },
    );
    objective.fetch();

    let api_tasks = api.clone();
    let mut tasks = Query::new(
      &cache,
      QueryKey::new("objective-tasks", &id),
      &[Tag::Task],
      move || {
        let api = api_tasks.clone();
        async move { api.tasks_for_objective(id).await }
      },
    );
    tasks.fetch();

    let api_comments = api.clone();
    let mut comments = Query::new(
      &cache,
      QueryKey::new("objective-comments", &id),
      &[Tag::Comment],
      move || {
        let api = api_comments.clone();
        async move { api.objective_comments(id).await }
      },
    );
    comments.fetch();

    Self {
      api,
      cache,
      id,
      objective,
      tasks,
      comments,
      task_state: ListState::default(),
      prompt: Prompt::new(),
      prompt_kind: PromptKind::NewTask,
      mutation: Mutation::idle(),
      notice: None,
    }
  }

  fn task_list(&self) -> &[Task] {
    self.tasks.data().map(|v| v.as_slice()).unwrap_or(&[])
  }

  fn selected_task(&self) -> Option<&Task> {
    self.task_state.selected().and_then(|i| self.task_list().get(i))
  }

  fn run<Fut>(&mut self, invalidates: &[Tag], fut: Fut)
  where
    Fut: std::future::Future<Output = crate::api::ApiResult<()>> + Send + 'static,
  {
    self.notice = None;
    self.mutation.run(&self.cache, invalidates, fut);
  }

  fn toggle_selected_task(&mut self) {
    let Some(task) = self.selected_task() else {
      return;
    };
    let (id, done) = (task.id, task.done);
    let api = self.api.clone();
    // Toggling a task moves the objective's progress too.
    self.run(&[Tag::Task, Tag::Objective], async move {
      api.set_task_done(id, !done).await.map(|_| ())
    });
  }

  fn delete_selected_task(&mut self) {
    let Some(task) = self.selected_task() else {
      return;
    };
    let id = task.id;
    let api = self.api.clone();
    self.run(&[Tag::Task, Tag::Objective], async move {
      api.delete_task(id).await
    });
  }

  fn submit_prompt(&mut self, value: String) {
    let value = value.trim().to_string();
    if value.is_empty() {
      return;
    }
    let api = self.api.clone();
    let objective_id = self.id;
    match self.prompt_kind {
      PromptKind::NewTask => {
        self.run(&[Tag::Task, Tag::Objective], async move {
          api
            .create_task(&NewTask {
              objective_id,
              title: value,
            })
            .await
            .map(|_| ())
        });
      }
      PromptKind::NewComment => {
        self.run(&[Tag::Comment], async move {
          api.add_objective_comment(objective_id, &value).await.map(|_| ())
        });
      }
    }
  }

  fn adjust_progress(&mut self, delta: i16) {
    let Some(objective) = self.objective.data() else {
      return;
    };
    let progress = (objective.progress as i16 + delta).clamp(0, 100) as u8;
    if progress == objective.progress {
      return;
    }
    let api = self.api.clone();
    let id = self.id;
    self.run(&[Tag::Objective], async move {
      api.set_objective_progress(id, progress).await.map(|_| ())
    });
  }

  fn accept(&mut self, accept: bool) {
    let api = self.api.clone();
    let id = self.id;
    // No emailed token at hand in the dashboard; the client falls back to
    // the direct endpoint.
    self.run(&[Tag::Objective], async move {
      let result = if accept {
        api.accept_objective(id, "").await
      } else {
        api.decline_objective(id, "").await
      };
      result.map(|_| ())
    });
  }

  fn render_summary(&self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(" Objective ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let lines = match self.objective.state() {
      QueryState::Idle | QueryState::Loading => vec![Line::from(Span::styled(
        "Loading...",
        Style::default().fg(Color::DarkGray),
      ))],
      QueryState::Error(e) => vec![Line::from(Span::styled(
        format!("Error: {}", e),
        Style::default().fg(Color::Red),
      ))],
      QueryState::Success(objective) => {
        let accepted = match objective.accepted {
          Some(true) => Span::styled("accepted", Style::default().fg(Color::Green)),
          Some(false) => Span::styled("declined", Style::default().fg(Color::Red)),
          None => Span::styled("pending acceptance", Style::default().fg(Color::DarkGray)),
        };
        let mut lines = vec![
          Line::from(Span::styled(
            objective.title.clone(),
            Style::default().bold(),
          )),
          Line::from(vec![
            Span::styled(
              progress_bar(objective.progress, 20),
              Style::default().fg(progress_color(objective.progress)),
            ),
            Span::raw("  "),
            accepted,
          ]),
        ];
        if let Some(description) = &objective.description {
          lines.push(Line::from(Span::raw(description.clone())));
        }
        if let Some(due) = &objective.due_date {
          lines.push(Line::from(Span::styled(
            format!("due {}", due),
            Style::default().fg(Color::DarkGray),
          )));
        }
        lines
      }
    };

    frame.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: true }), area);
  }

  fn render_tasks(&mut self, frame: &mut Frame, area: Rect) {
    let tasks = self.task_list();
    let len = tasks.len();

    let title = match self.tasks.state() {
      QueryState::Loading => " Tasks (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Tasks (error: {}) ", e),
      _ => format!(" Tasks ({}) ", len),
    };
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if tasks.is_empty() && !self.tasks.is_loading() {
      let paragraph = Paragraph::new("No tasks. Press 'n' to add one.")
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = tasks
      .iter()
      .map(|task| {
        let line = Line::from(vec![
          Span::styled(
            done_mark(task.done),
            Style::default().fg(if task.done { Color::Green } else { Color::DarkGray }),
          ),
          Span::raw(" "),
          Span::raw(truncate(&task.title, 50)),
          Span::raw(" "),
          Span::styled(
            task.assignee_name.clone().unwrap_or_default(),
            Style::default().fg(Color::DarkGray),
          ),
        ]);
        ListItem::new(line)
      })
      .collect();

    ensure_valid_selection(&mut self.task_state, len);

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.task_state);
  }

  fn render_comments(&self, frame: &mut Frame, area: Rect) {
    let title = match self.comments.state() {
      QueryState::Loading => " Comments (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Comments (error: {}) ", e),
      QueryState::Success(comments) => format!(" Comments ({}) ", comments.len()),
      QueryState::Idle => " Comments ".to_string(),
    };
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let lines: Vec<Line> = self
      .comments
      .data()
      .map(|comments| {
        comments
          .iter()
          .map(|comment| {
            Line::from(vec![
              Span::styled(
                format!("{}: ", comment.author_name),
                Style::default().fg(Color::Cyan),
              ),
              Span::raw(comment.body.clone()),
            ])
          })
          .collect()
      })
      .unwrap_or_default();

    frame.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: true }), area);
  }
}

impl View for ObjectiveDetailView {
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
        self.task_state.select_next();
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.task_state.select_previous();
      }
      KeyCode::Char('r') => {
        self.objective.refetch();
        self.tasks.refetch();
        self.comments.refetch();
      }
      KeyCode::Char(' ') | KeyCode::Char('t') => {
        self.toggle_selected_task();
      }
      KeyCode::Char('n') => {
        self.prompt_kind = PromptKind::NewTask;
        self.prompt.open("New task", "");
      }
      KeyCode::Char('x') => {
        self.delete_selected_task();
      }
      KeyCode::Char('c') => {
        self.prompt_kind = PromptKind::NewComment;
        self.prompt.open("New comment", "");
      }
      KeyCode::Char('+') => {
        self.adjust_progress(PROGRESS_STEP as i16);
      }
      KeyCode::Char('-') => {
        self.adjust_progress(-(PROGRESS_STEP as i16));
      }
      KeyCode::Char('A') => {
        self.accept(true);
      }
      KeyCode::Char('D') => {
        self.accept(false);
      }
      KeyCode::Enter => {
        if let Some(task) = self.selected_task() {
          return ViewAction::Push(Box::new(TaskDetailView::new(
            task.id,
            self.api.clone(),
            self.cache.clone(),
          )));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(6),      // Summary
        Constraint::Min(5),         // Tasks
        Constraint::Percentage(30), // Comments
        Constraint::Length(1),      // Status line
      ])
      .split(area);

    self.render_summary(frame, chunks[0]);
    self.render_tasks(frame, chunks[1]);
    self.render_comments(frame, chunks[2]);

    let status = if let Some(notice) = &self.notice {
      Line::from(Span::styled(notice.clone(), Style::default().fg(Color::Red)))
    } else if self.mutation.in_flight() {
      Line::from(Span::styled("Saving...", Style::default().fg(Color::Yellow)))
    } else {
      Line::default()
    };
    frame.render_widget(Paragraph::new(status), chunks[3]);

    self.prompt.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    match self.objective.data() {
      Some(objective) => truncate(&objective.title, 24),
      None => format!("Objective #{}", self.id),
    }
  }

  fn wants_text_input(&self) -> bool {
    self.prompt.is_active()
  }

  fn tick(&mut self) -> ViewAction {
    self.objective.poll();
    self.tasks.poll();
    self.comments.poll();
    if let Some(Err(e)) = self.mutation.poll() {
      self.notice = Some(e.to_string());
    }
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("Space", "toggle task"),
      Shortcut::new("n", "new task"),
      Shortcut::new("c", "comment"),
      Shortcut::new("+/-", "progress"),
      Shortcut::new("A/D", "accept/decline"),
    ]
  }
}
