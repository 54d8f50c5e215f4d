use crate::api::{ApiClient, Conversation};
use crate::query::{Family, Query, QueryCache, QueryKey, QueryState};
use crate::ui::components::{Column, DataTable, KeyResult, Notice, PageState, Paging, TableEvent};
use crate::ui::renderfns::{format_date, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::ThreadView;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use ratatui::widgets::Cell;

const PAGE_SIZE: u64 = 12;

fn columns() -> Vec<Column<Conversation>> {
  vec![
    Column::new("customer", "Customer", Constraint::Length(24)),
    Column::new("last_message", "Last Message", Constraint::Min(30))
      .with_render(|v, _| Cell::from(truncate(v.unwrap_or_default(), 48))),
    Column::new("updated_at", "Updated", Constraint::Length(12))
      .with_render(|v, _| Cell::from(format_date(v.unwrap_or_default()))),
  ]
}

/// Inbox of customer conversations. Enter opens the message thread.
pub struct ConversationListView {
  api: ApiClient,
  cache: QueryCache,
  query: Query<Vec<Conversation>>,
  table: DataTable<Conversation>,
  page: PageState,
}

impl ConversationListView {
  pub fn new(api: ApiClient, cache: QueryCache) -> Self {
    let enabled = api.is_ready();
    let api_for_query = api.clone();
    let mut query = Query::new(
      cache.clone(),
      QueryKey::list(Family::Conversations),
      move || {
        let api = api_for_query.clone();
        async move {
          api
            .list::<Conversation>(Family::Conversations)
            .await
            .map_err(|e| e.to_string())
        }
      },
    )
    .with_enabled(enabled);
    query.fetch();

    let mut view = Self {
      table: DataTable::new(columns(), Paging::Client),
      page: PageState::new(1, PAGE_SIZE, 0),
      query,
      api,
      cache,
    };
    view.sync_page();
    view
  }

  fn sync_page(&mut self) {
    if let Some(rows) = self.query.data() {
      self.page = PageState::new(self.page.current(), PAGE_SIZE, rows.len() as u64);
    }
  }
}

impl View for ConversationListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    let page = self.page;
    let rows = self.query.data().map(|v| v.as_slice()).unwrap_or(&[]);
    match self.table.handle_key(key, rows, &page) {
      KeyResult::Event(TableEvent::Open(convo)) => {
        return ViewAction::Push(Box::new(ThreadView::new(
          self.api.clone(),
          self.cache.clone(),
          convo.id,
          convo.customer,
        )));
      }
      KeyResult::Event(TableEvent::PageChange(target)) => {
        self.page.set_page(target);
      }
      KeyResult::Event(TableEvent::Refresh) => self.query.refetch(),
      KeyResult::Event(TableEvent::Back) => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let title = match self.query.state() {
      QueryState::Loading => " Conversations (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Conversations (error: {}) ", truncate(e, 40)),
      QueryState::Success(rows) => format!(" Conversations ({}) ", rows.len()),
      QueryState::Idle => " Conversations ".to_string(),
    };
    let empty_text = if !self.query.is_enabled() {
      "Not authenticated. Set L9S_TOKEN or LAWBIE_API_TOKEN."
    } else if self.query.is_error() {
      "Failed to load conversations. Press 'r' to retry."
    } else {
      "No conversations yet."
    };

    let loading = self.query.is_loading();
    let page = self.page;
    let rows = self.query.data().map(|v| v.as_slice()).unwrap_or(&[]);
    self
      .table
      .render(frame, area, rows, &page, &title, empty_text, loading);
  }

  fn breadcrumb_label(&self) -> String {
    "Conversations".to_string()
  }

  fn tick(&mut self, notices: &mut Vec<Notice>) {
    if self.query.poll() {
      self.sync_page();
    }
    if let Some(error) = self.query.take_error_notice() {
      notices.push(Notice::error(error));
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("Enter", "open").with_priority(20),
      ShortcutInfo::new("r", "refresh").with_priority(50),
      ShortcutInfo::new("q", "back").with_priority(90),
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

  fn seed(cache: &QueryCache, n: usize) {
    let convos: Vec<Conversation> = (0..n)
      .map(|i| Conversation {
        id: format!("conv{}", i),
        customer: format!("Customer {}", i),
        last_message: Some("Thanks!".to_string()),
        updated_at: String::new(),
      })
      .collect();
    let key = QueryKey::list(Family::Conversations);
    let ticket = cache.begin_fetch(&key).unwrap().unwrap();
    cache.store(&key, ticket, &convos).unwrap();
  }

  #[tokio::test]
  async fn test_enter_opens_the_selected_thread() {
    let cache = QueryCache::new();
    seed(&cache, 3);
    let mut view = ConversationListView::new(test_client(), cache);

    view.handle_key(key(KeyCode::Char('g')));
    view.handle_key(key(KeyCode::Char('j')));
    let action = view.handle_key(key(KeyCode::Enter));

    match action {
      ViewAction::Push(pushed) => assert_eq!(pushed.breadcrumb_label(), "Customer 1"),
      _ => panic!("expected a pushed thread view"),
    }
  }

  #[tokio::test]
  async fn test_inbox_pages_client_side() {
    let cache = QueryCache::new();
    seed(&cache, 30);
    let mut view = ConversationListView::new(test_client(), cache);

    assert_eq!(view.page.total_pages(), 3);
    view.handle_key(key(KeyCode::Char('l')));
    assert_eq!(view.page.current(), 2);
    assert!(matches!(view.query.key(), QueryKey::List { .. }));
  }
}
