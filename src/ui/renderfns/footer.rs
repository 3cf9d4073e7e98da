use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the status bar with the breadcrumb trail and key hints
pub fn draw_footer(frame: &mut Frame, area: Rect, breadcrumbs: &[String]) {
  let trail = breadcrumbs.join(" > ");
  let line = Line::from(vec![
    Span::styled(format!(" {} ", trail), Style::default().fg(Color::White)),
    Span::styled(
      " :command  j/k:nav  Enter:select  r:refresh  q:back  Ctrl-C:quit",
      Style::default().fg(Color::DarkGray),
    ),
  ]);

  frame.render_widget(Paragraph::new(line), area);
}
