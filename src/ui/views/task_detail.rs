use crate::api::types::{Comment, SubTask, Task};
use crate::api::ApiClient;
use crate::cache::{QueryKey, ResourceCache, Tag};
use crate::query::{Mutation, Query, QueryState};
use crate::ui::components::{KeyResult, Prompt, PromptResult};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{done_mark, truncate};
use crate::ui::view::{Shortcut, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptKind {
  NewSubTask,
  NewComment,
}

/// Single task with its sub-tasks and comments.
pub struct TaskDetailView {
  api: ApiClient,
  cache: ResourceCache,
  id: u64,
  task: Query<Task>,
  subtasks: Query<Vec<SubTask>>,
  comments: Query<Vec<Comment>>,
  subtask_state: ListState,
  prompt: Prompt,
  prompt_kind: PromptKind,
  mutation: Mutation<()>,
  notice: Option<String>,
}

impl TaskDetailView {
  pub fn new(id: u64, api: ApiClient, cache: ResourceCache) -> Self {
    let api_task = api.clone();
    let mut task = Query::new(
      &cache,
      QueryKey::new("task", &id),
      &[Tag::Task],
      move || {
        let api = api_task.clone();
        async move { api.get_task(id).await }
      },
    );
    task.fetch();

    let api_subtasks = api.clone();
    let mut subtasks = Query::new(
      &cache,
      QueryKey::new("task-subtasks", &id),
      &[Tag::SubTask],
      move || {
        let api = api_subtasks.clone();
        async move { api.subtasks_for_task(id).await }
      },
    );
    subtasks.fetch();

    let api_comments = api.clone();
    let mut comments = Query::new(
      &cache,
      QueryKey::new("task-comments", &id),
      &[Tag::Comment],
      move || {
        let api = api_comments.clone();
        async move { api.task_comments(id).await }
      },
    );
    comments.fetch();

    Self {
      api,
      cache,
      id,
      task,
      subtasks,
      comments,
      subtask_state: ListState::default(),
      prompt: Prompt::new(),
      prompt_kind: PromptKind::NewSubTask,
      mutation: Mutation::idle(),
      notice: None,
    }
  }

  fn subtask_list(&self) -> &[SubTask] {
    self.subtasks.data().map(|v| v.as_slice()).unwrap_or(&[])
  }

  fn selected_subtask(&self) -> Option<&SubTask> {
    self
      .subtask_state
      .selected()
      .and_then(|i| self.subtask_list().get(i))
  }

  fn run<Fut>(&mut self, invalidates: &[Tag], fut: Fut)
  where
    Fut: std::future::Future<Output = crate::api::ApiResult<()>> + Send + 'static,
  {
    self.notice = None;
    self.mutation.run(&self.cache, invalidates, fut);
  }

  fn toggle_task_done(&mut self) {
    let Some(task) = self.task.data() else {
      return;
    };
    let (id, done) = (task.id, task.done);
    let api = self.api.clone();
    // Task completion feeds the objective's progress.
    self.run(&[Tag::Task, Tag::Objective], async move {
      api.set_task_done(id, !done).await.map(|_| ())
    });
  }

  fn toggle_selected_subtask(&mut self) {
    let Some(subtask) = self.selected_subtask() else {
      return;
    };
    let (id, done) = (subtask.id, subtask.done);
    let api = self.api.clone();
    self.run(&[Tag::SubTask, Tag::Task], async move {
      api.set_subtask_done(id, !done).await.map(|_| ())
    });
  }

  fn delete_selected_subtask(&mut self) {
    let Some(subtask) = self.selected_subtask() else {
      return;
    };
    let id = subtask.id;
    let api = self.api.clone();
    self.run(&[Tag::SubTask, Tag::Task], async move {
      api.delete_subtask(id).await
    });
  }

  fn submit_prompt(&mut self, value: String) {
    let value = value.trim().to_string();
    if value.is_empty() {
      return;
    }
    let api = self.api.clone();
    let task_id = self.id;
    match self.prompt_kind {
      PromptKind::NewSubTask => {
        self.run(&[Tag::SubTask, Tag::Task], async move {
          api.create_subtask(task_id, &value).await.map(|_| ())
        });
      }
      PromptKind::NewComment => {
        self.run(&[Tag::Comment], async move {
          api.add_task_comment(task_id, &value).await.map(|_| ())
        });
      }
    }
  }

  fn render_summary(&self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(" Task ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let lines = match self.task.state() {
      QueryState::Idle | QueryState::Loading => vec![Line::from(Span::styled(
        "Loading...",
        Style::default().fg(Color::DarkGray),
      ))],
      QueryState::Error(e) => vec![Line::from(Span::styled(
        format!("Error: {}", e),
        Style::default().fg(Color::Red),
      ))],
      QueryState::Success(task) => {
        let mut spans = vec![
          Span::styled(
            done_mark(task.done),
            Style::default().fg(if task.done { Color::Green } else { Color::DarkGray }),
          ),
          Span::raw(" "),
          Span::styled(task.title.clone(), Style::default().bold()),
        ];
        if let Some(assignee) = &task.assignee_name {
          spans.push(Span::styled(
            format!("  ({})", assignee),
            Style::default().fg(Color::DarkGray),
          ));
        }
        let mut lines = vec![Line::from(spans)];
        if let Some(due) = &task.due_date {
          lines.push(Line::from(Span::styled(
            format!("due {}", due),
            Style::default().fg(Color::DarkGray),
          )));
        }
        lines
      }
    };

    frame.render_widget(Paragraph::new(lines).block(block), area);
  }

  fn render_subtasks(&mut self, frame: &mut Frame, area: Rect) {
    let subtasks = self.subtask_list();
    let len = subtasks.len();

    let title = match self.subtasks.state() {
      QueryState::Loading => " Sub-tasks (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Sub-tasks (error: {}) ", e),
      _ => format!(" Sub-tasks ({}) ", len),
    };
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if subtasks.is_empty() && !self.subtasks.is_loading() {
      let paragraph = Paragraph::new("No sub-tasks. Press 'n' to add one.")
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = subtasks
      .iter()
      .map(|subtask| {
        let line = Line::from(vec![
          Span::styled(
            done_mark(subtask.done),
            Style::default().fg(if subtask.done { Color::Green } else { Color::DarkGray }),
          ),
          Span::raw(" "),
          Span::raw(truncate(&subtask.title, 50)),
        ]);
        ListItem::new(line)
      })
      .collect();

    ensure_valid_selection(&mut self.subtask_state, len);

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.subtask_state);
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

impl View for TaskDetailView {
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
        self.subtask_state.select_next();
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.subtask_state.select_previous();
      }
      KeyCode::Char('r') => {
        self.task.refetch();
        self.subtasks.refetch();
        self.comments.refetch();
      }
      KeyCode::Char(' ') => {
        self.toggle_selected_subtask();
      }
      KeyCode::Char('t') => {
        self.toggle_task_done();
      }
      KeyCode::Char('n') => {
        self.prompt_kind = PromptKind::NewSubTask;
        self.prompt.open("New sub-task", "");
      }
      KeyCode::Char('x') => {
        self.delete_selected_subtask();
      }
      KeyCode::Char('c') => {
        self.prompt_kind = PromptKind::NewComment;
        self.prompt.open("New comment", "");
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
        Constraint::Length(4),      // Summary
        Constraint::Min(5),         // Sub-tasks
        Constraint::Percentage(30), // Comments
        Constraint::Length(1),      // Status line
      ])
      .split(area);

    self.render_summary(frame, chunks[0]);
    self.render_subtasks(frame, chunks[1]);
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
    match self.task.data() {
      Some(task) => truncate(&task.title, 24),
      None => format!("Task #{}", self.id),
    }
  }

  fn wants_text_input(&self) -> bool {
    self.prompt.is_active()
  }

  fn tick(&mut self) -> ViewAction {
    self.task.poll();
    self.subtasks.poll();
    self.comments.poll();
    if let Some(Err(e)) = self.mutation.poll() {
      self.notice = Some(e.to_string());
    }
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("Space", "toggle sub-task"),
      Shortcut::new("t", "toggle done"),
      Shortcut::new("n", "new sub-task"),
      Shortcut::new("c", "comment"),
    ]
  }
}
