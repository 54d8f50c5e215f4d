use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the footer bar with the view-stack breadcrumb.
pub fn draw_footer(frame: &mut Frame, area: Rect, breadcrumb: &[String]) {
  let paragraph =
    Paragraph::new(breadcrumb_line(breadcrumb)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

/// One span per crumb, separated by `›`; the active view is highlighted.
fn breadcrumb_line(breadcrumb: &[String]) -> Line<'static> {
  let mut spans = vec![Span::raw(" ")];
  let last = breadcrumb.len().saturating_sub(1);

  for (i, part) in breadcrumb.iter().enumerate() {
    if i > 0 {
      spans.push(Span::styled(" › ", Style::default().fg(Color::DarkGray)));
    }
    let style = if i == last {
      Style::default().fg(Color::Cyan).bold()
    } else {
      Style::default().fg(Color::White)
    };
    spans.push(Span::styled(part.clone(), style));
  }

  Line::from(spans)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn crumbs(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
  }

  #[test]
  fn test_only_the_active_crumb_is_highlighted() {
    let line = breadcrumb_line(&crumbs(&["Products", "NDA Template"]));
    let highlighted: Vec<&str> = line
      .spans
      .iter()
      .filter(|s| s.style.fg == Some(Color::Cyan))
      .map(|s| s.content.as_ref())
      .collect();
    assert_eq!(highlighted, vec!["NDA Template"]);
  }

  #[test]
  fn test_crumbs_are_separated() {
    let line = breadcrumb_line(&crumbs(&["Sales", "Order", "Receipt"]));
    let text = line
      .spans
      .iter()
      .map(|s| s.content.as_ref())
      .collect::<String>();
    assert_eq!(text, " Sales › Order › Receipt");
  }

  #[test]
  fn test_single_crumb_has_no_separator() {
    let line = breadcrumb_line(&crumbs(&["Categories"]));
    let text = line
      .spans
      .iter()
      .map(|s| s.content.as_ref())
      .collect::<String>();
    assert_eq!(text, " Categories");
  }
}
