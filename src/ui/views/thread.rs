use std::time::Duration;

use crate::api::{ApiClient, Message};
use crate::query::{Family, Mutation, Query, QueryCache, QueryKey, QueryState};
use crate::ui::components::{InputResult, Notice, TextInput};
use crate::ui::renderfns::{format_date, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

/// How long a fetched thread counts as fresh. Ticks past this age kick
/// off a background refresh, which is what keeps the chat near-live.
const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// One customer conversation: scrollback plus an always-armed reply
/// box. Letters go into the draft, so leaving the view is Esc, not 'q'.
pub struct ThreadView {
  api: ApiClient,
  conversation_id: String,
  customer: String,
  query: Query<Vec<Message>>,
  input: TextInput,
  send: Mutation,
  /// Draft shown at the tail of the thread while the send is in flight
  outbox: Option<String>,
}

impl ThreadView {
  pub fn new(api: ApiClient, cache: QueryCache, conversation_id: String, customer: String) -> Self {
    let enabled = api.is_ready();
    let send = Mutation::new(cache.clone());
    let api_for_query = api.clone();
    let id_for_query = conversation_id.clone();
    let mut query = Query::new(cache, QueryKey::thread(conversation_id.clone()), move || {
      let api = api_for_query.clone();
      let id = id_for_query.clone();
      async move { api.messages(&id).await.map_err(|e| e.to_string()) }
    })
    .with_stale_time(POLL_INTERVAL)
    .with_enabled(enabled);
    query.fetch();

    Self {
      api,
      conversation_id,
      customer,
      query,
      input: TextInput::new(),
      send,
      outbox: None,
    }
  }

  fn send_message(&mut self, text: String) {
    let trimmed = text.trim().to_string();
    if trimmed.is_empty() || self.send.is_pending() {
      return;
    }
    self.input.clear();
    self.outbox = Some(trimmed.clone());

    let api = self.api.clone();
    let id = self.conversation_id.clone();
    self.send.start(Family::Conversations, async move {
      api
        .send_message(&id, &trimmed)
        .await
        .map_err(|e| e.to_string())
    });
  }

  fn render_messages(&self, frame: &mut Frame, area: Rect) {
    let title = match self.query.state() {
      QueryState::Loading => format!(" {} (loading...) ", self.customer),
      QueryState::Error(e) => format!(" {} (error: {}) ", self.customer, truncate(e, 40)),
      _ => format!(" {} ", self.customer),
    };
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let messages = self.query.data().map(|v| v.as_slice()).unwrap_or(&[]);
    if messages.is_empty() && self.outbox.is_none() {
      let text = if !self.query.is_enabled() {
        "Not authenticated. Set L9S_TOKEN or LAWBIE_API_TOKEN."
      } else if self.query.is_loading() {
        "Loading messages..."
      } else {
        "No messages yet. Type below and press Enter."
      };
      let paragraph = Paragraph::new(text).style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, inner);
      return;
    }

    let width = inner.width.saturating_sub(2) as usize;
    let mut lines: Vec<Line> = messages.iter().map(|m| message_line(m, width)).collect();
    if let Some(draft) = &self.outbox {
      lines.push(
        Line::from(Span::styled(
          format!("{} (sending...)", truncate(draft, width.saturating_sub(14))),
          Style::default().fg(Color::DarkGray),
        ))
        .alignment(Alignment::Right),
      );
    }

    // Pin the tail of the thread to the bottom of the pane.
    let scroll = lines.len().saturating_sub(inner.height as usize) as u16;
    frame.render_widget(Paragraph::new(lines).scroll((scroll, 0)), inner);
  }

  fn render_input(&self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(" Reply (Enter to send, Esc to leave) ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let line = Line::from(vec![
      Span::raw(self.input.value()),
      Span::styled("_", Style::default().fg(Color::Yellow)), // Cursor
    ]);
    frame.render_widget(Paragraph::new(line), inner);
  }
}

fn message_line(message: &Message, width: usize) -> Line<'static> {
  let body = truncate(&message.body, width.saturating_sub(16));
  let stamp = Span::styled(
    format!("  {}", format_date(&message.created_at)),
    Style::default().fg(Color::DarkGray),
  );
  if message.from_admin {
    Line::from(vec![
      Span::styled(body, Style::default().fg(Color::Cyan)),
      stamp,
    ])
    .alignment(Alignment::Right)
  } else {
    Line::from(vec![
      Span::styled(
        format!("{}: ", message.sender),
        Style::default().fg(Color::Yellow),
      ),
      Span::raw(body),
      stamp,
    ])
  }
}

impl View for ThreadView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.input.handle_key(key) {
      InputResult::Submitted(text) => {
        self.send_message(text);
        ViewAction::None
      }
      InputResult::Cancelled => {
        // First Esc clears the draft, a second one leaves the thread.
        if self.input.is_empty() {
          ViewAction::Pop
        } else {
          self.input.clear();
          ViewAction::None
        }
      }
      InputResult::Consumed | InputResult::NotHandled => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Min(1), Constraint::Length(3)])
      .split(area);
    self.render_messages(frame, chunks[0]);
    self.render_input(frame, chunks[1]);
  }

  fn breadcrumb_label(&self) -> String {
    self.customer.clone()
  }

  fn tick(&mut self, notices: &mut Vec<Notice>) {
    // No-op while the thread is fresh; refetches once POLL_INTERVAL has
    // passed, or immediately after a send invalidated it.
    self.query.fetch();
    self.query.poll();
    if let Some(error) = self.query.take_error_notice() {
      notices.push(Notice::error(error));
    }

    if let Some(outcome) = self.send.poll() {
      match outcome {
        Ok(()) => {
          self.outbox = None;
        }
        Err(error) => {
          // Hand the draft back so it can be retried.
          if let Some(draft) = self.outbox.take() {
            if self.input.is_empty() {
              self.input.set_value(&draft);
            }
          }
          notices.push(Notice::error(format!("Send failed: {}", error)));
        }
      }
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("Enter", "send").with_priority(20),
      ShortcutInfo::new("Esc", "back").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{ApiConfig, Config};
  use crossterm::event::{KeyCode, KeyModifiers};

  fn test_client() -> ApiClient {
    std::env::set_var("L9S_TOKEN", "test-token");
    let config = Config {
      api: ApiConfig {
        url: "https://api.lawbie.test".to_string(),
      },
      title: None,
      stale_secs: None,
    };
    ApiClient::new(&config).unwrap()
  }

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn seed_thread(cache: &QueryCache, conversation: &str) {
    let key = QueryKey::thread(conversation);
    let ticket = cache.begin_fetch(&key).unwrap().unwrap();
    let messages = vec![Message {
      id: "m1".into(),
      sender: "Dana".into(),
      body: "Hi, quick question".into(),
      from_admin: false,
      created_at: String::new(),
    }];
    cache.store(&key, ticket, &messages).unwrap();
  }

  fn view(cache: QueryCache) -> ThreadView {
    ThreadView::new(
      test_client(),
      cache,
      "conv1".to_string(),
      "Dana".to_string(),
    )
  }

  #[tokio::test]
  async fn test_blank_drafts_are_not_sent() {
    let cache = QueryCache::new();
    seed_thread(&cache, "conv1");
    let mut v = view(cache);

    v.handle_key(key(KeyCode::Char(' ')));
    v.handle_key(key(KeyCode::Enter));

    assert!(!v.send.is_pending());
    assert!(v.outbox.is_none());
  }

  #[tokio::test]
  async fn test_send_clears_input_and_stashes_the_draft() {
    let cache = QueryCache::new();
    seed_thread(&cache, "conv1");
    let mut v = view(cache);

    v.handle_key(key(KeyCode::Char('h')));
    v.handle_key(key(KeyCode::Char('i')));
    v.handle_key(key(KeyCode::Enter));

    assert!(v.send.is_pending());
    assert!(v.input.is_empty());
    assert_eq!(v.outbox.as_deref(), Some("hi"));

    // A second Enter while pending is a no-op.
    v.handle_key(key(KeyCode::Char('x')));
    v.handle_key(key(KeyCode::Enter));
    assert_eq!(v.input.value(), "x");
  }

  #[tokio::test]
  async fn test_escape_clears_draft_then_leaves() {
    let cache = QueryCache::new();
    seed_thread(&cache, "conv1");
    let mut v = view(cache);

    v.handle_key(key(KeyCode::Char('h')));
    assert!(matches!(v.handle_key(key(KeyCode::Esc)), ViewAction::None));
    assert!(v.input.is_empty());
    assert!(matches!(v.handle_key(key(KeyCode::Esc)), ViewAction::Pop));
  }
}
