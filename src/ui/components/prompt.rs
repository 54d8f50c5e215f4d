use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Events emitted by the prompt that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptEvent {
  /// Enter pressed with the final text
  Submitted(String),
  /// Escape pressed
  Cancelled,
}

/// One-line modal input for create and rename flows
#[derive(Debug, Clone, Default)]
pub struct Prompt {
  input: TextInput,
  active: bool,
  title: String,
}

impl Prompt {
  pub fn new() -> Self {
    Self::default()
  }

  /// Check if the prompt is currently open
  pub fn is_active(&self) -> bool {
    self.active
  }

  /// Open the prompt. `initial` prefills the buffer (rename flows).
  pub fn show(&mut self, title: &str, initial: &str) {
    self.active = true;
    self.title = title.to_string();
    self.input.set_value(initial);
  }

  /// Close and reset the prompt
  pub fn hide(&mut self) {
    self.active = false;
    self.input.clear();
  }

  /// Handle a key event. While open the prompt is modal and swallows
  /// everything it does not use itself.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<PromptEvent> {
    if !self.active {
      return KeyResult::NotHandled;
    }

    match self.input.handle_key(key) {
      InputResult::Submitted(text) => {
        self.hide();
        KeyResult::Event(PromptEvent::Submitted(text))
      }
      InputResult::Cancelled => {
        self.hide();
        KeyResult::Event(PromptEvent::Cancelled)
      }
      InputResult::Consumed | InputResult::NotHandled => KeyResult::Handled,
    }
  }

  /// Render the prompt overlay if open
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let width = (area.width * 50 / 100).min(50).max(30);
    let height = 3;

    // Center the overlay
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;

    let overlay_area = Rect::new(x, y, width, height);

    // Clear the area behind the overlay
    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(format!(" {} ", self.title));

    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    if inner.height == 0 {
      return;
    }

    let input_line = Line::from(vec![
      Span::raw(self.input.value()),
      Span::styled("_", Style::default().fg(Color::Yellow)), // Cursor
    ]);
    frame.render_widget(Paragraph::new(input_line), inner);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::{KeyCode, KeyModifiers};

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn test_prefill_is_editable() {
    let mut prompt = Prompt::new();
    prompt.show("Rename category", "Family Law");
    prompt.handle_key(key(KeyCode::Backspace));
    prompt.handle_key(key(KeyCode::Char('w')));

    let result = prompt.handle_key(key(KeyCode::Enter));
    assert_eq!(
      result,
      KeyResult::Event(PromptEvent::Submitted("Family Law".to_string()))
    );
    assert!(!prompt.is_active());
  }

  #[test]
  fn test_escape_cancels() {
    let mut prompt = Prompt::new();
    prompt.show("New category", "");
    prompt.handle_key(key(KeyCode::Char('x')));

    assert_eq!(
      prompt.handle_key(key(KeyCode::Esc)),
      KeyResult::Event(PromptEvent::Cancelled)
    );
    assert!(!prompt.is_active());
  }

  #[test]
  fn test_modal_swallows_unused_keys() {
    let mut prompt = Prompt::new();
    prompt.show("New category", "");
    assert_eq!(prompt.handle_key(key(KeyCode::F(5))), KeyResult::Handled);
  }

  #[test]
  fn test_inactive_prompt_passes_keys_through() {
    let mut prompt = Prompt::new();
    assert_eq!(
      prompt.handle_key(key(KeyCode::Char('q'))),
      KeyResult::NotHandled
    );
  }
}
