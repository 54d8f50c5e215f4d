use crate::ui::view::ShortcutInfo;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the header bar with logo, backend context, and the active view's
/// shortcuts
pub fn draw_header(frame: &mut Frame, area: Rect, api_url: &str, title: Option<&str>, shortcuts: &[ShortcutInfo]) {
  let context = match title {
    Some(t) => t.to_string(),
    None => extract_domain(api_url).to_string(),
  };

  let mut spans = vec![
    Span::styled(" l9s ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", context), Style::default().fg(Color::White)),
    Span::raw("  "),
  ];

  let mut sorted: Vec<&ShortcutInfo> = shortcuts.iter().collect();
  sorted.sort_by_key(|s| s.priority);

  for (i, shortcut) in sorted.iter().enumerate() {
    if i > 0 {
      spans.push(Span::raw("   "));
    }
    spans.push(Span::styled(
      format!("<{}>", shortcut.key),
      Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::styled(
      format!(" {}", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
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

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_extract_domain() {
    assert_eq!(extract_domain("https://api.lawbie.com"), "api.lawbie.com");
    assert_eq!(
      extract_domain("https://lawbie.com/api/v1"),
      "lawbie.com"
    );
    assert_eq!(extract_domain("http://localhost:4000"), "localhost:4000");
  }
}
