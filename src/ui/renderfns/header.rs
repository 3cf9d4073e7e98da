use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::api::types::User;
use crate::ui::view::Shortcut;

/// Draw the header bar with logo, API domain, current user, unread badge,
/// and shortcuts
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  title: &str,
  api_url: &str,
  user: Option<&User>,
  unread: Option<u64>,
  shortcuts: &[Shortcut],
) {
  let domain = extract_domain(api_url);

  let mut spans = vec![
    Span::styled(format!(" {} ", title), Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", domain), Style::default().fg(Color::White)),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
  ];

  match user {
    Some(user) => {
      spans.push(Span::styled(
        format!(" {} ", user.display_name()),
        Style::default().fg(Color::Yellow).bold(),
      ));
      spans.push(Span::styled(
        format!("({}) ", user.role),
        Style::default().fg(Color::DarkGray),
      ));
    }
    None => {
      spans.push(Span::styled(
        " not logged in ",
        Style::default().fg(Color::DarkGray),
      ));
    }
  }

  if let Some(unread) = unread.filter(|n| *n > 0) {
    spans.push(Span::styled(
      format!(" {}🔔 ", unread),
      Style::default().fg(Color::Red).bold(),
    ));
  }

  spans.push(Span::raw("  "));
  for shortcut in shortcuts {
    spans.push(Span::styled(
      format!("<{}>", shortcut.key),
      Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::styled(
      format!(" {}", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
    spans.push(Span::raw("   "));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}

/// Extract domain from the API URL
fn extract_domain(url: &str) -> &str {
  url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url)
    .split('/')
    .next()
    .unwrap_or(url)
}
