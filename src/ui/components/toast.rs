use std::collections::VecDeque;
use std::time::{Duration, Instant};

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

const MAX_VISIBLE: usize = 4;

/// Notification severity, mapped to border color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
  Info,
  Success,
  Error,
}

/// A transient notification raised by views and mutations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
  pub kind: NoticeKind,
  pub text: String,
}

impl Notice {
  pub fn info(text: impl Into<String>) -> Self {
    Self {
      kind: NoticeKind::Info,
      text: text.into(),
    }
  }

  pub fn success(text: impl Into<String>) -> Self {
    Self {
      kind: NoticeKind::Success,
      text: text.into(),
    }
  }

  pub fn error(text: impl Into<String>) -> Self {
    Self {
      kind: NoticeKind::Error,
      text: text.into(),
    }
  }
}

#[derive(Debug)]
struct ActiveToast {
  notice: Notice,
  shown_at: Instant,
}

/// Fire-and-forget toast stack rendered over the top-right corner.
///
/// Views push notices and forget about them; the stack expires them
/// after a few seconds and caps how many are shown at once.
#[derive(Debug)]
pub struct Toasts {
  queue: VecDeque<ActiveToast>,
  ttl: Duration,
}

impl Default for Toasts {
  fn default() -> Self {
    Self::new()
  }
}

impl Toasts {
  pub fn new() -> Self {
    Self::with_ttl(Duration::from_secs(4))
  }

  pub fn with_ttl(ttl: Duration) -> Self {
    Self {
      queue: VecDeque::new(),
      ttl,
    }
  }

  pub fn push(&mut self, notice: Notice) {
    self.queue.push_back(ActiveToast {
      notice,
      shown_at: Instant::now(),
    });
    while self.queue.len() > MAX_VISIBLE {
      self.queue.pop_front();
    }
  }

  pub fn is_empty(&self) -> bool {
    self.queue.is_empty()
  }

  pub fn len(&self) -> usize {
    self.queue.len()
  }

  /// Drop expired toasts. Called once per tick; toasts expire in the
  /// order they arrived.
  pub fn tick(&mut self) {
    while self
      .queue
      .front()
      .is_some_and(|t| t.shown_at.elapsed() >= self.ttl)
    {
      self.queue.pop_front();
    }
  }

  /// Render the stack over the given area, newest on top
  pub fn render(&self, frame: &mut Frame, area: Rect) {
    if self.queue.is_empty() {
      return;
    }

    let width = (area.width / 3).clamp(24, 44).min(area.width);
    let height = 3;
    let x = area.x + area.width.saturating_sub(width + 1);
    let mut y = area.y + 1;

    for toast in self.queue.iter().rev() {
      if y + height > area.y + area.height {
        break;
      }

      let color = match toast.notice.kind {
        NoticeKind::Info => Color::Blue,
        NoticeKind::Success => Color::Green,
        NoticeKind::Error => Color::Red,
      };

      let toast_area = Rect::new(x, y, width, height);
      frame.render_widget(Clear, toast_area);

      let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color));
      let inner = block.inner(toast_area);
      frame.render_widget(block, toast_area);

      let paragraph = Paragraph::new(toast.notice.text.clone()).wrap(Wrap { trim: true });
      frame.render_widget(paragraph, inner);

      y += height;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_toasts_expire_in_arrival_order() {
    let mut toasts = Toasts::with_ttl(Duration::ZERO);
    toasts.push(Notice::info("first"));
    toasts.push(Notice::error("second"));
    assert_eq!(toasts.len(), 2);

    toasts.tick();
    assert!(toasts.is_empty());
  }

  #[test]
  fn test_stack_is_capped() {
    let mut toasts = Toasts::new();
    for i in 0..10 {
      toasts.push(Notice::info(format!("notice {}", i)));
    }
    assert_eq!(toasts.len(), MAX_VISIBLE);
  }

  #[test]
  fn test_fresh_toasts_survive_tick() {
    let mut toasts = Toasts::new();
    toasts.push(Notice::success("Saved"));
    toasts.tick();
    assert_eq!(toasts.len(), 1);
  }
}
