use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Events emitted by the confirm dialog that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmEvent {
  /// User confirmed the action
  Confirmed,
  /// User backed out
  Cancelled,
}

/// Modal yes/no dialog for destructive actions
#[derive(Debug, Clone, Default)]
pub struct ConfirmDialog {
  active: bool,
  message: String,
}

impl ConfirmDialog {
  pub fn new() -> Self {
    Self::default()
  }

  /// Check if the dialog is currently open
  pub fn is_active(&self) -> bool {
    self.active
  }

  /// Open the dialog with the given message
  pub fn show(&mut self, message: String) {
    self.active = true;
    self.message = message;
  }

  /// Close the dialog
  pub fn hide(&mut self) {
    self.active = false;
    self.message.clear();
  }

  /// Handle a key event. The dialog is modal while open.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<ConfirmEvent> {
    if !self.active {
      return KeyResult::NotHandled;
    }

    match key.code {
      KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
        self.hide();
        KeyResult::Event(ConfirmEvent::Confirmed)
      }
      KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc | KeyCode::Char('q') => {
        self.hide();
        KeyResult::Event(ConfirmEvent::Cancelled)
      }
      _ => KeyResult::Handled,
    }
  }

  /// Render the confirm overlay if open
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let width = (self.message.len() as u16 + 6).min(area.width.saturating_sub(4)).max(30);
    let height = 4;

    // Center the overlay
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;

    let overlay_area = Rect::new(x, y, width, height);

    // Clear the area behind the overlay
    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Red))
      .title(" Confirm ");

    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    if inner.height < 2 {
      return;
    }

    let lines = vec![
      Line::from(Span::raw(self.message.clone())),
      Line::from(vec![
        Span::styled("y", Style::default().fg(Color::Red).bold()),
        Span::styled(" confirm   ", Style::default().fg(Color::DarkGray)),
        Span::styled("n", Style::default().fg(Color::Cyan).bold()),
        Span::styled(" cancel", Style::default().fg(Color::DarkGray)),
      ]),
    ];
    frame.render_widget(Paragraph::new(lines), inner);
  }
}
