use crate::api::{ApiClient, Paged, Question};
use crate::query::{Family, Mutation, Query, QueryCache, QueryKey, QueryState};
use crate::resources::Resource;
use crate::ui::components::{
  DataTable, KeyResult, Notice, PageState, Paging, Prompt, PromptEvent, TableEvent,
};
use crate::ui::renderfns::truncate;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::DetailView;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;

/// Customer questions, newest first, a server page at a time. Pending
/// rows can be answered in place with 'a'; the status column flips to
/// "answered" before the reply reaches the server.
pub struct QuestionListView {
  api: ApiClient,
  cache: QueryCache,
  query: Query<Paged<Question>>,
  table: DataTable<Question>,
  page: PageState,
  prompt: Prompt,
  /// Id of the question the answer prompt was opened for
  answering: Option<String>,
  reply: Mutation,
}

impl QuestionListView {
  pub fn new(api: ApiClient, cache: QueryCache) -> Self {
    let mut query = Self::page_query(&api, &cache, 1);
    query.fetch();

    let mut view = Self {
      table: DataTable::new(Question::columns(), Paging::Server),
      page: PageState::new(1, Question::PAGE_SIZE, 0),
      prompt: Prompt::new(),
      answering: None,
      reply: Mutation::new(cache.clone()),
      query,
      api,
      cache,
    };
    view.sync_page();
    view
  }

  fn page_query(api: &ApiClient, cache: &QueryCache, page: u64) -> Query<Paged<Question>> {
    let enabled = api.is_ready();
    let api_for_query = api.clone();
    Query::new(
      cache.clone(),
      QueryKey::page(Family::Questions, page as usize),
      move || {
        let api = api_for_query.clone();
        async move {
          api
            .list_page::<Question>(Family::Questions, page, Question::PAGE_SIZE)
            .await
            .map_err(|e| e.to_string())
        }
      },
    )
    .with_enabled(enabled)
  }

  fn rekey(&mut self, page: u64) {
    let mut query = Self::page_query(&self.api, &self.cache, page);
    query.fetch();
    self.query = query;
    self.sync_page();
  }

  fn sync_page(&mut self) {
    let Some(total) = self.query.data().map(|p| p.total) else {
      return;
    };
    let requested = self.page.current();
    self.page = PageState::new(requested, Question::PAGE_SIZE, total);
    if self.page.current() != requested {
      self.rekey(self.page.current());
    }
  }

  fn change_page(&mut self, target: u64) {
    if self.page.set_page(target) {
      self.rekey(target);
    }
  }

  fn ask_answer(&mut self, row: &Question) -> ViewAction {
    if row.answer.is_some() {
      return ViewAction::Notify(Notice::info("Already answered"));
    }
    if self.reply.is_pending() {
      return ViewAction::None;
    }
    self.answering = Some(row.id.clone());
    self
      .prompt
      .show(&format!("Answer: {}", truncate(&row.question, 40)), "");
    ViewAction::None
  }

  fn submit_answer(&mut self, text: String) -> ViewAction {
    let trimmed = text.trim().to_string();
    if trimmed.is_empty() {
      self.answering = None;
      return ViewAction::Notify(Notice::error("Answer cannot be empty"));
    }
    let Some(id) = self.answering.take() else {
      return ViewAction::None;
    };

    let api = self.api.clone();
    let id_for_op = id.clone();
    let answer = trimmed.clone();
    self.reply.start_optimistic::<Paged<Question>, _, _>(
      Family::Questions,
      move |mut paged| {
        let row = paged.items.iter_mut().find(|q| q.id == id)?;
        row.answer = Some(trimmed.clone());
        Some(paged)
      },
      async move {
        api
          .reply_question(&id_for_op, &answer)
          .await
          .map_err(|e| e.to_string())
      },
    );
    ViewAction::None
  }
}

impl View for QuestionListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.prompt.handle_key(key) {
      KeyResult::Event(PromptEvent::Submitted(text)) => return self.submit_answer(text),
      KeyResult::Event(PromptEvent::Cancelled) => {
        self.answering = None;
        return ViewAction::None;
      }
      KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    let rows = self.query.data().map(|p| p.items.as_slice()).unwrap_or(&[]);

    if key.code == KeyCode::Char('a') {
      // Server paging renders the fetched page as-is, so the table's
      // selection indexes straight into it.
      let selected = self.table.selected().and_then(|i| rows.get(i)).cloned();
      if let Some(row) = selected {
        return self.ask_answer(&row);
      }
      return ViewAction::None;
    }

    let page = self.page;
    match self.table.handle_key(key, rows, &page) {
      KeyResult::Event(TableEvent::Open(question)) => {
        return ViewAction::Push(Box::new(DetailView::<Question>::new(
          self.api.clone(),
          self.cache.clone(),
          question.id.clone(),
          truncate(&question.question, 40),
        )));
      }
      KeyResult::Event(TableEvent::PageChange(target)) => self.change_page(target),
      KeyResult::Event(TableEvent::Refresh) => self.query.refetch(),
      KeyResult::Event(TableEvent::Back) => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let title = match self.query.state() {
      QueryState::Loading => " Questions (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Questions (error: {}) ", truncate(e, 40)),
      QueryState::Success(paged) => format!(" Questions ({}) ", paged.total),
      QueryState::Idle => " Questions ".to_string(),
    };

    let empty_text = if !self.query.is_enabled() {
      "Not authenticated. Set L9S_TOKEN or LAWBIE_API_TOKEN."
    } else if self.query.is_error() {
      "Failed to load questions. Press 'r' to retry."
    } else {
      "No questions yet."
    };

    let loading = self.query.is_loading();
    let page = self.page;
    let rows = self.query.data().map(|p| p.items.as_slice()).unwrap_or(&[]);
    self
      .table
      .render(frame, area, rows, &page, &title, empty_text, loading);

    self.prompt.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Questions".to_string()
  }

  fn tick(&mut self, notices: &mut Vec<Notice>) {
    if self.query.poll() {
      self.sync_page();
    }
    if let Some(error) = self.query.take_error_notice() {
      notices.push(Notice::error(error));
    }

    if let Some(outcome) = self.reply.poll() {
      match outcome {
        Ok(()) => notices.push(Notice::success("Answer sent")),
        Err(error) => notices.push(Notice::error(format!("Reply failed: {}", error))),
      }
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("a", "answer").with_priority(20),
      ShortcutInfo::new("r", "refresh").with_priority(50),
      ShortcutInfo::new("h/l", "page").with_priority(60),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{ApiConfig, Config};
  use crate::ui::components::NoticeKind;
  use crossterm::event::KeyModifiers;

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

  fn question(id: &str, answer: Option<&str>) -> Question {
    Question {
      id: id.to_string(),
      customer: "Dana".to_string(),
      question: "Can I dispute this?".to_string(),
      answer: answer.map(str::to_string),
      created_at: String::new(),
    }
  }

  fn seed_page(cache: &QueryCache, items: Vec<Question>) {
    let key = QueryKey::page(Family::Questions, 1);
    let ticket = cache.begin_fetch(&key).unwrap().unwrap();
    let total = items.len() as u64;
    let paged = Paged {
      items,
      total,
      page: 1,
      total_pages: 1,
      limit: Question::PAGE_SIZE,
    };
    cache.store(&key, ticket, &paged).unwrap();
  }

  #[tokio::test]
  async fn test_answered_questions_cannot_be_answered_again() {
    let cache = QueryCache::new();
    seed_page(&cache, vec![question("q1", Some("Yes, within 14 days."))]);
    let mut view = QuestionListView::new(test_client(), cache);

    view.handle_key(key(KeyCode::Char('g')));
    let action = view.handle_key(key(KeyCode::Char('a')));

    assert!(matches!(
      action,
      ViewAction::Notify(Notice {
        kind: NoticeKind::Info,
        ..
      })
    ));
    assert!(!view.prompt.is_active());
  }

  #[tokio::test]
  async fn test_answer_marks_the_row_before_the_reply_lands() {
    let cache = QueryCache::new();
    seed_page(&cache, vec![question("q1", None), question("q2", None)]);
    let mut view = QuestionListView::new(test_client(), cache.clone());

    view.handle_key(key(KeyCode::Char('g')));
    view.handle_key(key(KeyCode::Char('a')));
    assert!(view.prompt.is_active());
    assert_eq!(view.answering.as_deref(), Some("q1"));

    for c in "Yes".chars() {
      view.handle_key(key(KeyCode::Char(c)));
    }
    view.handle_key(key(KeyCode::Enter));

    assert!(view.reply.is_pending());
    let snap = cache
      .get::<Paged<Question>>(&QueryKey::page(Family::Questions, 1))
      .unwrap()
      .unwrap();
    assert_eq!(snap.data.items[0].answer.as_deref(), Some("Yes"));
    assert_eq!(snap.data.items[1].answer, None);
  }

  #[tokio::test]
  async fn test_empty_answer_is_rejected() {
    let cache = QueryCache::new();
    seed_page(&cache, vec![question("q1", None)]);
    let mut view = QuestionListView::new(test_client(), cache);

    view.handle_key(key(KeyCode::Char('g')));
    view.handle_key(key(KeyCode::Char('a')));
    let action = view.handle_key(key(KeyCode::Enter));

    assert!(matches!(
      action,
      ViewAction::Notify(Notice {
        kind: NoticeKind::Error,
        ..
      })
    ));
    assert!(!view.reply.is_pending());
    assert!(view.answering.is_none());
  }
}
