use crate::api::{
  ApiClient, Blog, Category, PracticeArea, Product, PromoCode, ResourceType, Service,
};
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::query::QueryCache;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult, Notice, Toasts};
use crate::ui::renderfns::{draw_footer, draw_header};
use crate::ui::view::{View, ViewAction};
use crate::ui::views::{ConversationListView, QuestionListView, ResourceListView, SalesView};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tracing::info;

/// Main application state: a stack of views over one shared API client
/// and query cache.
///
/// The root view is swapped via `:` commands; detail and thread views
/// are pushed on top and popped with q/Esc. Dropping a view drops its
/// query handles, which cancels whatever they still had in flight.
pub struct App {
  config: Config,
  api: ApiClient,
  cache: QueryCache,

  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// The `:` overlay
  command: CommandInput,

  toasts: Toasts,

  should_quit: bool,
}

impl App {
  pub fn new(config: Config, initial_resource: Option<&str>) -> Result<Self> {
    let api = ApiClient::new(&config)?;
    let cache = QueryCache::new().with_stale_time(config.stale_time());

    let root = match initial_resource {
      Some(name) => root_view(name, &api, &cache)
        .ok_or_else(|| eyre!("Unknown resource: {} (try 'categories' or 'products')", name))?,
      None => root_view("categories", &api, &cache)
        .ok_or_else(|| eyre!("default view missing from the command table"))?,
    };

    let mut toasts = Toasts::new();
    if !api.is_ready() {
      toasts.push(Notice::info(
        "No session token. Set L9S_TOKEN to enable requests.",
      ));
    }

    Ok(Self {
      config,
      api,
      cache,
      view_stack: vec![root],
      command: CommandInput::new(),
      toasts,
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(Duration::from_millis(250));

    // Main loop
    while !self.should_quit {
      terminal.draw(|frame| self.draw(frame))?;

      match events.next().await {
        Some(Event::Key(key)) => self.handle_key(key),
        Some(Event::Tick) => self.tick(),
        Some(Event::Resize) => {}
        None => break,
      }
    }

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
  }

  fn draw(&mut self, frame: &mut Frame) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(1), // Header
        Constraint::Min(1),    // Content
        Constraint::Length(1), // Breadcrumb footer
      ])
      .split(frame.area());

    let shortcuts = self
      .view_stack
      .last()
      .map(|v| v.shortcuts())
      .unwrap_or_default();
    draw_header(
      frame,
      chunks[0],
      &self.config.api.url,
      self.config.title.as_deref(),
      &shortcuts,
    );

    if let Some(view) = self.view_stack.last_mut() {
      view.render(frame, chunks[1]);
    }

    let breadcrumb: Vec<String> = self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect();
    draw_footer(frame, chunks[2], &breadcrumb);

    self.command.render_overlay(frame, chunks[1]);
    self.toasts.render(frame, chunks[1]);
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    // The command overlay owns the keyboard while it is open, and
    // handles its own ':' activation.
    match self.command.handle_key(key) {
      KeyResult::Event(CommandEvent::Submitted(cmd)) => {
        self.execute_command(&cmd);
        return;
      }
      KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
      KeyResult::NotHandled => {}
    }

    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key),
      None => ViewAction::None,
    };
    self.apply(action);
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.view_stack.push(view),
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
      ViewAction::Notify(notice) => self.toasts.push(notice),
    }
  }

  /// Every view in the stack keeps polling: a list under a pushed
  /// detail view still has to settle its mutations.
  fn tick(&mut self) {
    let mut notices = Vec::new();
    for view in self.view_stack.iter_mut() {
      view.tick(&mut notices);
    }
    for notice in notices {
      self.toasts.push(notice);
    }
    self.toasts.tick();
  }

  fn execute_command(&mut self, cmd: &str) {
    if cmd.is_empty() {
      return;
    }
    if cmd == "quit" {
      self.should_quit = true;
      return;
    }
    match root_view(cmd, &self.api, &self.cache) {
      Some(view) => {
        info!(command = cmd, "switching root view");
        self.view_stack.clear();
        self.view_stack.push(view);
      }
      None => {
        self
          .toasts
          .push(Notice::error(format!("Unknown command: {}", cmd)));
      }
    }
  }
}

/// Build the root view for a command name. Names must match the
/// entries in [`crate::commands::COMMANDS`].
fn root_view(name: &str, api: &ApiClient, cache: &QueryCache) -> Option<Box<dyn View>> {
  let api = api.clone();
  let cache = cache.clone();
  let view: Box<dyn View> = match name {
    "categories" => Box::new(ResourceListView::<Category>::new(api, cache)),
    "practices" => Box::new(ResourceListView::<PracticeArea>::new(api, cache)),
    "resource-types" => Box::new(ResourceListView::<ResourceType>::new(api, cache)),
    "products" => Box::new(ResourceListView::<Product>::new(api, cache)),
    "services" => Box::new(ResourceListView::<Service>::new(api, cache)),
    "blogs" => Box::new(ResourceListView::<Blog>::new(api, cache)),
    "promos" => Box::new(ResourceListView::<PromoCode>::new(api, cache)),
    "sales" => Box::new(SalesView::new(api, cache)),
    "messages" => Box::new(ConversationListView::new(api, cache)),
    "questions" => Box::new(QuestionListView::new(api, cache)),
    _ => return None,
  };
  Some(view)
}
