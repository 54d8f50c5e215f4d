use crate::api::ApiClient;
use crate::query::{Query, QueryCache, QueryKey, QueryState};
use crate::resources::Resource;
use crate::ui::components::Notice;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

/// Read-only field pane for a single row, fetched by id.
///
/// Reopening the same row is served straight from the cache while a
/// background refresh runs.
pub struct DetailView<R: Resource> {
  name: String,
  query: Query<R>,
}

impl<R: Resource> DetailView<R> {
  pub fn new(api: ApiClient, cache: QueryCache, id: String, name: String) -> Self {
    let enabled = api.is_ready();
    let api_for_query = api.clone();
    let id_for_query = id.clone();
    let mut query = Query::new(cache, QueryKey::detail(R::FAMILY, id), move || {
      let api = api_for_query.clone();
      let id = id_for_query.clone();
      async move {
        api
          .detail::<R>(R::FAMILY, &id)
          .await
          .map_err(|e| e.to_string())
      }
    })
    .with_enabled(enabled);

    query.fetch();

    Self { name, query }
  }

  fn render_detail(&self, frame: &mut Frame, area: Rect) {
    let title = match self.query.state() {
      QueryState::Loading => format!(" {} (loading...) ", self.name),
      QueryState::Error(e) => format!(" {} (error: {}) ", self.name, e),
      _ => format!(" {} ", self.name),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if self.query.is_loading() {
      let paragraph =
        Paragraph::new("Loading details...").style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, inner);
      return;
    }

    if let Some(error) = self.query.error() {
      let paragraph = Paragraph::new(format!("Error: {}\n\nPress 'r' to retry.", error))
        .style(Style::default().fg(Color::Red));
      frame.render_widget(paragraph, inner);
      return;
    }

    let row = match self.query.data() {
      Some(row) => row,
      None => return,
    };

    let lines: Vec<Line> = R::detail_fields()
      .iter()
      .map(|(label, field)| {
        let value = row.field(field).unwrap_or_else(|| "-".to_string());
        Line::from(vec![
          Span::styled(
            format!("{:<12}", format!("{}:", label)),
            Style::default().fg(Color::DarkGray),
          ),
          Span::raw(value),
        ])
      })
      .collect();

    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, inner);
  }
}

impl<R: Resource> View for DetailView<R> {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => {
        self.query.refetch();
        ViewAction::None
      }
      KeyCode::Char('q') | KeyCode::Esc => ViewAction::Pop,
      _ => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_detail(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    self.name.clone()
  }

  fn tick(&mut self, notices: &mut Vec<Notice>) {
    self.query.poll();
    if let Some(error) = self.query.take_error_notice() {
      notices.push(Notice::error(error));
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("r", "refresh").with_priority(50),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::Category;
  use crate::config::{ApiConfig, Config};
  use crate::query::Family;

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

  #[tokio::test]
  async fn test_cached_detail_is_adopted_without_fetching() {
    let cache = QueryCache::new();
    let key = QueryKey::detail(Family::Categories, "c1");
    let ticket = cache.begin_fetch(&key).unwrap().unwrap();
    cache
      .store(
        &key,
        ticket,
        &Category {
          id: "c1".into(),
          name: "Contracts".into(),
          created_at: "2024-03-01T00:00:00Z".into(),
        },
      )
      .unwrap();

    let view: DetailView<Category> = DetailView::new(
      test_client(),
      cache,
      "c1".to_string(),
      "Contracts".to_string(),
    );

    assert_eq!(view.query.data().map(|c| c.name.as_str()), Some("Contracts"));
  }

  #[tokio::test]
  async fn test_back_pops_the_view() {
    let cache = QueryCache::new();
    let key = QueryKey::detail(Family::Categories, "c2");
    let ticket = cache.begin_fetch(&key).unwrap().unwrap();
    cache
      .store(
        &key,
        ticket,
        &Category {
          id: "c2".into(),
          name: "Tax".into(),
          created_at: String::new(),
        },
      )
      .unwrap();

    let mut view: DetailView<Category> =
      DetailView::new(test_client(), cache, "c2".to_string(), "Tax".to_string());

    let action = view.handle_key(KeyEvent::new(
      KeyCode::Esc,
      crossterm::event::KeyModifiers::NONE,
    ));
    assert!(matches!(action, ViewAction::Pop));
  }
}
