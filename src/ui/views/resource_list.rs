use crate::api::{ApiClient, Paged};
use crate::query::{Mutation, Query, QueryCache, QueryKey, QueryState};
use crate::resources::Resource;
use crate::ui::components::{
  ConfirmDialog, ConfirmEvent, DataTable, KeyResult, Notice, PageState, Paging, Prompt,
  PromptEvent, TableEvent,
};
use crate::ui::renderfns::truncate;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::DetailView;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;

/// What the prompt overlay is currently collecting input for.
enum PromptPurpose {
  Create,
  Rename { id: String },
}

/// Generic list screen for one resource family.
///
/// Everything family-specific comes from the [`Resource`] descriptor:
/// columns, page size, whether rows can be created, renamed, or
/// deleted, and whether pages are sliced locally or fetched one at a
/// time from the server. The categories, practice-areas, and
/// resource-types screens are all this view with different type
/// parameters.
pub struct ResourceListView<R: Resource> {
  api: ApiClient,
  cache: QueryCache,
  query: Query<Paged<R>>,
  table: DataTable<R>,
  page: PageState,
  prompt: Prompt,
  purpose: PromptPurpose,
  confirm: ConfirmDialog,
  /// Id awaiting delete confirmation
  pending_delete: Option<String>,
  save: Mutation,
  save_notice: Option<String>,
  remove: Mutation,
}

impl<R: Resource> ResourceListView<R> {
  pub fn new(api: ApiClient, cache: QueryCache) -> Self {
    let mut query = Self::page_query(&api, &cache, 1);
    query.fetch();

    let mut view = Self {
      table: DataTable::new(R::columns(), R::PAGING).with_actions(R::CAN_RENAME, R::CAN_DELETE),
      page: PageState::new(1, R::PAGE_SIZE, 0),
      prompt: Prompt::new(),
      purpose: PromptPurpose::Create,
      confirm: ConfirmDialog::new(),
      pending_delete: None,
      save: Mutation::new(cache.clone()),
      save_notice: None,
      remove: Mutation::new(cache.clone()),
      query,
      api,
      cache,
    };
    // A fresh cache hit is adopted synchronously in fetch()
    view.sync_page();
    view
  }

  fn page_query(api: &ApiClient, cache: &QueryCache, page: u64) -> Query<Paged<R>> {
    let enabled = api.is_ready();
    let api_for_query = api.clone();
    let query = match R::PAGING {
      Paging::Client => Query::new(cache.clone(), QueryKey::list(R::FAMILY), move || {
        let api = api_for_query.clone();
        async move {
          api
            .list::<R>(R::FAMILY)
            .await
            .map(Paged::full)
            .map_err(|e| e.to_string())
        }
      }),
      Paging::Server => Query::new(
        cache.clone(),
        QueryKey::page(R::FAMILY, page as usize),
        move || {
          let api = api_for_query.clone();
          async move {
            api
              .list_page::<R>(R::FAMILY, page, R::PAGE_SIZE)
              .await
              .map_err(|e| e.to_string())
          }
        },
      ),
    };
    query.with_enabled(enabled)
  }

  /// Swap the query for another server page. Dropping the old query
  /// cancels its in-flight fetch, so a fast page flip never lets the
  /// slow page's response land.
  fn rekey(&mut self, page: u64) {
    let mut query = Self::page_query(&self.api, &self.cache, page);
    query.fetch();
    self.query = query;
    self.sync_page();
  }

  /// Reconcile local page state with the totals the query holds.
  fn sync_page(&mut self) {
    let Some(total) = self.query.data().map(|p| p.total) else {
      return;
    };
    let requested = self.page.current();
    self.page = PageState::new(requested, R::PAGE_SIZE, total);
    // The requested page fell off the end (say, the last row of the
    // last page was deleted): fetch the page that still exists.
    if R::PAGING == Paging::Server && self.page.current() != requested {
      self.rekey(self.page.current());
    }
  }

  fn change_page(&mut self, target: u64) {
    if !self.page.set_page(target) {
      return;
    }
    if R::PAGING == Paging::Server {
      self.rekey(target);
    }
  }

  fn request_delete(&mut self, row: R) {
    self.pending_delete = Some(row.id().to_string());
    self.confirm.show(format!(
      "Delete {} \"{}\"?",
      R::FAMILY.label(),
      truncate(row.name(), 40)
    ));
  }

  fn run_delete(&mut self, id: String) {
    let api = self.api.clone();
    let id_for_op = id.clone();
    self.remove.start_optimistic::<Paged<R>, _, _>(
      R::FAMILY,
      move |mut paged| {
        let before = paged.items.len();
        paged.items.retain(|item| item.id() != id.as_str());
        if paged.items.len() == before {
          // This page never held the row; settlement invalidation
          // refreshes it anyway.
          return None;
        }
        paged.total = paged.total.saturating_sub(1);
        Some(paged)
      },
      async move {
        api
          .delete(R::FAMILY, &id_for_op)
          .await
          .map_err(|e| e.to_string())
      },
    );
    self.table.set_deleting(true);
  }

  fn submit_prompt(&mut self, text: String) -> ViewAction {
    let trimmed = text.trim();
    if trimmed.is_empty() {
      return ViewAction::Notify(Notice::error("Name cannot be empty"));
    }
    let api = self.api.clone();
    match std::mem::replace(&mut self.purpose, PromptPurpose::Create) {
      PromptPurpose::Create => {
        let body = R::create_body(trimmed);
        self.save_notice = Some(format!("Created {} \"{}\"", R::FAMILY.label(), trimmed));
        self.save.start(R::FAMILY, async move {
          api.create(R::FAMILY, body).await.map_err(|e| e.to_string())
        });
      }
      PromptPurpose::Rename { id } => {
        let name = trimmed.to_string();
        self.save_notice = Some(format!("Renamed to \"{}\"", name));
        self.save.start(R::FAMILY, async move {
          api
            .rename(R::FAMILY, &id, &name)
            .await
            .map_err(|e| e.to_string())
        });
      }
    }
    ViewAction::None
  }
}

impl<R: Resource> View for ResourceListView<R> {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.prompt.handle_key(key) {
      KeyResult::Event(PromptEvent::Submitted(text)) => return self.submit_prompt(text),
      KeyResult::Event(PromptEvent::Cancelled) | KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match self.confirm.handle_key(key) {
      KeyResult::Event(ConfirmEvent::Confirmed) => {
        if let Some(id) = self.pending_delete.take() {
          self.run_delete(id);
        }
        return ViewAction::None;
      }
      KeyResult::Event(ConfirmEvent::Cancelled) => {
        self.pending_delete = None;
        return ViewAction::None;
      }
      KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    if key.code == KeyCode::Char('a') && R::CAN_CREATE {
      if !self.save.is_pending() {
        self.purpose = PromptPurpose::Create;
        self.prompt.show(&format!("New {}", R::FAMILY.label()), "");
      }
      return ViewAction::None;
    }

    let page = self.page;
    let rows = self.query.data().map(|p| p.items.as_slice()).unwrap_or(&[]);
    match self.table.handle_key(key, rows, &page) {
      KeyResult::Event(TableEvent::Open(row)) => {
        return ViewAction::Push(Box::new(DetailView::<R>::new(
          self.api.clone(),
          self.cache.clone(),
          row.id().to_string(),
          row.name().to_string(),
        )));
      }
      KeyResult::Event(TableEvent::Edit(row)) => {
        if !self.save.is_pending() {
          self.purpose = PromptPurpose::Rename {
            id: row.id().to_string(),
          };
          self
            .prompt
            .show(&format!("Rename {}", R::FAMILY.label()), row.name());
        }
      }
      KeyResult::Event(TableEvent::Delete(row)) => self.request_delete(row),
      KeyResult::Event(TableEvent::PageChange(target)) => self.change_page(target),
      KeyResult::Event(TableEvent::Refresh) => self.query.refetch(),
      KeyResult::Event(TableEvent::Back) => return ViewAction::Pop,
      KeyResult::Handled | KeyResult::NotHandled => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let title = match self.query.state() {
      QueryState::Loading => format!(" {} (loading...) ", R::TITLE),
      QueryState::Error(e) => format!(" {} (error: {}) ", R::TITLE, truncate(e, 40)),
      QueryState::Success(paged) => format!(" {} ({}) ", R::TITLE, paged.total),
      QueryState::Idle => format!(" {} ", R::TITLE),
    };

    let empty_text = if !self.query.is_enabled() {
      "Not authenticated. Set L9S_TOKEN or LAWBIE_API_TOKEN.".to_string()
    } else if self.query.is_error() {
      format!(
        "Failed to load {}. Press 'r' to retry.",
        R::TITLE.to_lowercase()
      )
    } else {
      format!("No {} found.", R::TITLE.to_lowercase())
    };

    let loading = self.query.is_loading();
    let page = self.page;
    let rows = self.query.data().map(|p| p.items.as_slice()).unwrap_or(&[]);
    self
      .table
      .render(frame, area, rows, &page, &title, &empty_text, loading);

    self.prompt.render_overlay(frame, area);
    self.confirm.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    R::TITLE.to_string()
  }

  fn tick(&mut self, notices: &mut Vec<Notice>) {
    if self.query.poll() {
      self.sync_page();
    }
    if let Some(error) = self.query.take_error_notice() {
      notices.push(Notice::error(error));
    }

    if let Some(outcome) = self.save.poll() {
      match outcome {
        Ok(()) => {
          let text = self
            .save_notice
            .take()
            .unwrap_or_else(|| "Saved".to_string());
          notices.push(Notice::success(text));
        }
        Err(error) => {
          self.save_notice = None;
          notices.push(Notice::error(error));
        }
      }
    }

    if let Some(outcome) = self.remove.poll() {
      self.table.set_deleting(false);
      match outcome {
        Ok(()) => notices.push(Notice::success(format!("Deleted {}", R::FAMILY.label()))),
        Err(error) => notices.push(Notice::error(format!("Delete failed: {}", error))),
      }
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    let mut shortcuts = vec![ShortcutInfo::new(":", "command").with_priority(10)];
    if R::CAN_CREATE {
      shortcuts.push(ShortcutInfo::new("a", "add").with_priority(20));
    }
    if R::CAN_RENAME {
      shortcuts.push(ShortcutInfo::new("e", "rename").with_priority(30));
    }
    if R::CAN_DELETE {
      shortcuts.push(ShortcutInfo::new("d", "delete").with_priority(40));
    }
    shortcuts.push(ShortcutInfo::new("r", "refresh").with_priority(50));
    shortcuts.push(ShortcutInfo::new("h/l", "page").with_priority(60));
    shortcuts.push(ShortcutInfo::new("q", "back").with_priority(90));
    shortcuts
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::{Category, Product};
  use crate::config::{ApiConfig, Config};
  use crate::query::Family;
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

  fn categories(n: usize) -> Vec<Category> {
    (0..n)
      .map(|i| Category {
        id: format!("c{}", i),
        name: format!("Category {}", i),
        created_at: String::new(),
      })
      .collect()
  }

  fn seed_list(cache: &QueryCache, items: Vec<Category>) {
    let key = QueryKey::list(Family::Categories);
    let ticket = cache.begin_fetch(&key).unwrap().unwrap();
    cache.store(&key, ticket, &Paged::full(items)).unwrap();
  }

  #[tokio::test]
  async fn test_client_paging_flips_without_refetching() {
    let cache = QueryCache::new();
    seed_list(&cache, categories(25));

    let mut view: ResourceListView<Category> = ResourceListView::new(test_client(), cache);
    assert_eq!(view.page.total_items(), 25);
    assert_eq!(view.page.total_pages(), 3);
    assert!(matches!(view.query.key(), QueryKey::List { .. }));

    view.handle_key(key(KeyCode::Char('l')));
    assert_eq!(view.page.current(), 2);
    // Still the same collection query; only the slice moved.
    assert!(matches!(view.query.key(), QueryKey::List { .. }));
  }

  #[tokio::test]
  async fn test_server_page_change_swaps_the_query_key() {
    let cache = QueryCache::new();
    let key1 = QueryKey::page(Family::Products, 1);
    let ticket = cache.begin_fetch(&key1).unwrap().unwrap();
    let page1 = Paged {
      items: vec![Product {
        id: "p1".into(),
        name: "Template".into(),
        price: 10.0,
        category: None,
        status: "active".into(),
        created_at: String::new(),
      }],
      total: 30,
      page: 1,
      total_pages: 3,
      limit: Product::PAGE_SIZE,
    };
    cache.store(&key1, ticket, &page1).unwrap();

    let mut view: ResourceListView<Product> = ResourceListView::new(test_client(), cache);
    assert_eq!(view.page.total_pages(), 3);

    view.handle_key(key(KeyCode::Char('l')));
    assert_eq!(view.page.current(), 2);
    assert_eq!(view.query.key(), &QueryKey::page(Family::Products, 2));
  }

  #[tokio::test]
  async fn test_empty_name_is_rejected_before_the_network() {
    let cache = QueryCache::new();
    seed_list(&cache, categories(1));
    let mut view: ResourceListView<Category> = ResourceListView::new(test_client(), cache);

    view.handle_key(key(KeyCode::Char('a')));
    assert!(view.prompt.is_active());
    view.handle_key(key(KeyCode::Char(' ')));
    let action = view.handle_key(key(KeyCode::Enter));

    assert!(matches!(
      action,
      ViewAction::Notify(Notice { kind: NoticeKind::Error, .. })
    ));
    assert!(!view.save.is_pending());
  }

  #[tokio::test]
  async fn test_delete_asks_before_removing() {
    let cache = QueryCache::new();
    seed_list(&cache, categories(3));
    let mut view: ResourceListView<Category> = ResourceListView::new(test_client(), cache);

    view.handle_key(key(KeyCode::Char('g')));
    view.handle_key(key(KeyCode::Char('d')));
    assert!(view.confirm.is_active());
    assert_eq!(view.pending_delete.as_deref(), Some("c0"));

    view.handle_key(key(KeyCode::Char('n')));
    assert!(view.pending_delete.is_none());
    assert!(!view.remove.is_pending());
  }

  #[tokio::test]
  async fn test_confirmed_delete_rewrites_the_cache_immediately() {
    let cache = QueryCache::new();
    seed_list(&cache, categories(3));
    let mut view: ResourceListView<Category> =
      ResourceListView::new(test_client(), cache.clone());

    view.handle_key(key(KeyCode::Char('g')));
    view.handle_key(key(KeyCode::Char('j')));
    view.handle_key(key(KeyCode::Char('d')));
    view.handle_key(key(KeyCode::Char('y')));

    assert!(view.remove.is_pending());
    assert!(view.table.is_deleting());

    // The optimistic rewrite already removed the row from the cache.
    let snap = cache
      .get::<Paged<Category>>(&QueryKey::list(Family::Categories))
      .unwrap()
      .unwrap();
    assert_eq!(snap.data.total, 2);
    assert!(snap.data.items.iter().all(|c| c.id != "c1"));
  }

  #[tokio::test]
  async fn test_rename_prefills_the_prompt() {
    let cache = QueryCache::new();
    seed_list(&cache, categories(2));
    let mut view: ResourceListView<Category> = ResourceListView::new(test_client(), cache);

    view.handle_key(key(KeyCode::Char('g')));
    view.handle_key(key(KeyCode::Char('e')));
    assert!(view.prompt.is_active());
    assert!(matches!(&view.purpose, PromptPurpose::Rename { id } if id == "c0"));
  }
}
