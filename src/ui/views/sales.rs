use crate::api::{ApiClient, Sale};
use crate::query::{Family, Query, QueryCache, QueryKey, QueryState};
use crate::resources::Resource;
use crate::ui::components::{
  DataTable, KeyResult, Notice, PageState, Paging, SearchEvent, SearchInput, TableEvent,
};
use crate::ui::renderfns::{format_money, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::DetailView;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Sales ledger with live search and a revenue summary strip.
///
/// Each search term is its own cache entry, so flipping back to a
/// recent term renders instantly. Typing rekeys the query per
/// keystroke; superseded requests are cancelled when their handle is
/// dropped, so only the last term's response ever lands.
pub struct SalesView {
  api: ApiClient,
  cache: QueryCache,
  query: Query<Vec<Sale>>,
  table: DataTable<Sale>,
  page: PageState,
  search: SearchInput,
  term: String,
}

impl SalesView {
  pub fn new(api: ApiClient, cache: QueryCache) -> Self {
    let mut query = Self::search_query(&api, &cache, "");
    query.fetch();

    let mut view = Self {
      table: DataTable::new(Sale::columns(), Paging::Client),
      page: PageState::new(1, Sale::PAGE_SIZE, 0),
      search: SearchInput::new(),
      term: String::new(),
      query,
      api,
      cache,
    };
    view.sync_page();
    view
  }

  fn search_query(api: &ApiClient, cache: &QueryCache, term: &str) -> Query<Vec<Sale>> {
    let enabled = api.is_ready();
    let key = if term.trim().is_empty() {
      QueryKey::list(Family::Sales)
    } else {
      QueryKey::search(Family::Sales, term)
    };
    let api_for_query = api.clone();
    let term = term.trim().to_string();
    Query::new(cache.clone(), key, move || {
      let api = api_for_query.clone();
      let term = term.clone();
      async move { api.search_sales(&term).await.map_err(|e| e.to_string()) }
    })
    .with_enabled(enabled)
  }

  fn set_term(&mut self, term: String) {
    if term == self.term {
      return;
    }
    self.term = term;
    let mut query = Self::search_query(&self.api, &self.cache, &self.term);
    query.fetch();
    self.query = query;
    // A new term always starts back at the first page.
    self.page = PageState::new(1, Sale::PAGE_SIZE, 0);
    self.sync_page();
  }

  fn sync_page(&mut self) {
    if let Some(rows) = self.query.data() {
      self.page = PageState::new(self.page.current(), Sale::PAGE_SIZE, rows.len() as u64);
    }
  }

  fn render_summary(&self, frame: &mut Frame, area: Rect) {
    let rows = self.query.data().map(|v| v.as_slice()).unwrap_or(&[]);
    frame.render_widget(Paragraph::new(summary_line(rows, &self.term)), area);
  }
}

/// Build the revenue strip shown above the table.
fn summary_line(rows: &[Sale], term: &str) -> Line<'static> {
  let gross: f64 = rows.iter().map(|s| s.amount).sum();

  let mut spans = vec![
    Span::styled(" Orders: ", Style::default().fg(Color::DarkGray)),
    Span::styled(rows.len().to_string(), Style::default().fg(Color::White).bold()),
    Span::styled("   Revenue: ", Style::default().fg(Color::DarkGray)),
    Span::styled(format_money(gross), Style::default().fg(Color::Green).bold()),
  ];
  if !term.is_empty() {
    spans.push(Span::styled(
      format!("   Search: {}", term),
      Style::default().fg(Color::Cyan),
    ));
  }
  Line::from(spans)
}

impl View for SalesView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.search.handle_key(key) {
      KeyResult::Event(SearchEvent::Changed(term) | SearchEvent::Submitted(term)) => {
        self.set_term(term);
        return ViewAction::None;
      }
      KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    let page = self.page;
    let rows = self.query.data().map(|v| v.as_slice()).unwrap_or(&[]);
    match self.table.handle_key(key, rows, &page) {
      KeyResult::Event(TableEvent::Open(sale)) => {
        return ViewAction::Push(Box::new(DetailView::<Sale>::new(
          self.api.clone(),
          self.cache.clone(),
          sale.id.clone(),
          sale.item.clone(),
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
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(1), Constraint::Min(1)])
      .split(area);

    self.render_summary(frame, chunks[0]);

    let title = match self.query.state() {
      QueryState::Loading => " Sales (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Sales (error: {}) ", truncate(e, 40)),
      QueryState::Success(rows) => format!(" Sales ({}) ", rows.len()),
      QueryState::Idle => " Sales ".to_string(),
    };
    let empty_text = if !self.query.is_enabled() {
      "Not authenticated. Set L9S_TOKEN or LAWBIE_API_TOKEN.".to_string()
    } else if self.query.is_error() {
      "Failed to load sales. Press 'r' to retry.".to_string()
    } else if self.term.is_empty() {
      "No sales found.".to_string()
    } else {
      format!("No sales match \"{}\".", self.term)
    };

    let loading = self.query.is_loading();
    let page = self.page;
    let rows = self.query.data().map(|v| v.as_slice()).unwrap_or(&[]);
    self
      .table
      .render(frame, chunks[1], rows, &page, &title, &empty_text, loading);

    self.search.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    if self.term.is_empty() {
      "Sales".to_string()
    } else {
      format!("Sales [{}]", self.term)
    }
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
      ShortcutInfo::new("/", "search").with_priority(20),
      ShortcutInfo::new("r", "refresh").with_priority(50),
      ShortcutInfo::new("h/l", "page").with_priority(60),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
