use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};

/// Row types expose their fields by flat key.
///
/// `field` returns the displayable value for a column key, or `None`
/// for keys that only exist as render-only columns. Dotted paths are
/// not supported.
pub trait TableRow {
  fn field(&self, key: &str) -> Option<String>;
}

/// Caller-supplied cell formatter.
///
/// Receives the looked-up field value (if any) plus the whole row, so
/// formatters can build cells from several fields (money, dates,
/// status badges) without the table knowing the entity shape.
pub type CellRender<T> = fn(Option<&str>, &T) -> Cell<'static>;

/// Column descriptor: flat field key, header label, width constraint,
/// and an optional renderer that bypasses default stringification.
pub struct Column<T> {
  pub key: &'static str,
  pub label: &'static str,
  pub width: Constraint,
  pub render: Option<CellRender<T>>,
}

impl<T> Column<T> {
  pub const fn new(key: &'static str, label: &'static str, width: Constraint) -> Self {
    Self {
      key,
      label,
      width,
      render: None,
    }
  }

  pub const fn with_render(mut self, render: CellRender<T>) -> Self {
    self.render = Some(render);
    self
  }
}

/// Whether the caller hands the table the full collection (the table
/// slices out the current page itself) or one pre-sliced server page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paging {
  Client,
  Server,
}

/// 1-based pagination state.
///
/// `total_pages` is always `ceil(total_items / per_page)`, floored at 1
/// so an empty table still has a current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageState {
  current: u64,
  per_page: u64,
  total_items: u64,
}

impl PageState {
  pub fn new(current: u64, per_page: u64, total_items: u64) -> Self {
    let mut state = Self {
      current: 1,
      per_page: per_page.max(1),
      total_items,
    };
    state.current = current.clamp(1, state.total_pages());
    state
  }

  pub fn current(&self) -> u64 {
    self.current
  }

  pub fn per_page(&self) -> u64 {
    self.per_page
  }

  pub fn total_items(&self) -> u64 {
    self.total_items
  }

  pub fn total_pages(&self) -> u64 {
    self.total_items.div_ceil(self.per_page).max(1)
  }

  pub fn has_prev(&self) -> bool {
    self.current > 1
  }

  pub fn has_next(&self) -> bool {
    self.current < self.total_pages()
  }

  /// Move to `page`. Requests outside `[1, total_pages]` or for the
  /// already-current page are ignored. Returns whether it changed.
  pub fn set_page(&mut self, page: u64) -> bool {
    if page < 1 || page > self.total_pages() || page == self.current {
      return false;
    }
    self.current = page;
    true
  }

  /// Number of rows the current page shows.
  pub fn visible_rows(&self) -> u64 {
    let before = (self.current - 1) * self.per_page;
    self.total_items.saturating_sub(before).min(self.per_page)
  }

  /// Slice a full collection down to the current page.
  pub fn slice<'a, T>(&self, all: &'a [T]) -> &'a [T] {
    let start = ((self.current - 1) * self.per_page) as usize;
    if start >= all.len() {
      return &[];
    }
    let end = (start + self.per_page as usize).min(all.len());
    &all[start..end]
  }
}

/// Events emitted by the table that parent views need to handle
#[derive(Debug, Clone, PartialEq)]
pub enum TableEvent<T> {
  /// Enter on a row
  Open(T),
  /// 'e' on a row
  Edit(T),
  /// 'd' on a row
  Delete(T),
  /// h/l moved to another page
  PageChange(u64),
  /// 'r' pressed
  Refresh,
  /// q/Esc pressed
  Back,
}

/// Generic entity table: configurable columns, row selection, page
/// controls, and optional edit/delete actions.
///
/// The table owns only transient UI state (cursor position). Data and
/// page position stay with the parent view, which passes them into
/// both [`DataTable::handle_key`] and [`DataTable::render`].
pub struct DataTable<T: TableRow + Clone> {
  columns: Vec<Column<T>>,
  paging: Paging,
  state: TableState,
  can_edit: bool,
  can_delete: bool,
  deleting: bool,
}

impl<T: TableRow + Clone> DataTable<T> {
  pub fn new(columns: Vec<Column<T>>, paging: Paging) -> Self {
    Self {
      columns,
      paging,
      state: TableState::default(),
      can_edit: false,
      can_delete: false,
      deleting: false,
    }
  }

  pub fn with_actions(mut self, edit: bool, delete: bool) -> Self {
    self.can_edit = edit;
    self.can_delete = delete;
    self
  }

  /// Mark the table busy while a delete is in flight. Blocks further
  /// 'd' presses and shows the busy state in the actions column.
  pub fn set_deleting(&mut self, deleting: bool) {
    self.deleting = deleting;
  }

  pub fn is_deleting(&self) -> bool {
    self.deleting
  }

  pub fn selected(&self) -> Option<usize> {
    self.state.selected()
  }

  fn visible<'a>(&self, data: &'a [T], page: &PageState) -> &'a [T] {
    match self.paging {
      Paging::Client => page.slice(data),
      Paging::Server => data,
    }
  }

  fn selected_row(&self, data: &[T], page: &PageState) -> Option<T> {
    let visible = self.visible(data, page);
    self.state.selected().and_then(|i| visible.get(i)).cloned()
  }

  fn move_selection(&mut self, delta: i64, len: usize) {
    if len == 0 {
      self.state.select(None);
      return;
    }
    let current = self.state.selected().unwrap_or(0) as i64;
    let next = (current + delta).clamp(0, len as i64 - 1) as usize;
    self.state.select(Some(next));
  }

  /// Handle a key event against the same data slice that will be
  /// rendered this frame.
  pub fn handle_key(
    &mut self,
    key: KeyEvent,
    data: &[T],
    page: &PageState,
  ) -> KeyResult<TableEvent<T>> {
    let len = self.visible(data, page).len();

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.move_selection(1, len);
        KeyResult::Handled
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.move_selection(-1, len);
        KeyResult::Handled
      }
      KeyCode::Char('g') => {
        if len > 0 {
          self.state.select(Some(0));
        }
        KeyResult::Handled
      }
      KeyCode::Char('G') => {
        if len > 0 {
          self.state.select(Some(len - 1));
        }
        KeyResult::Handled
      }
      KeyCode::Char('h') | KeyCode::Left => {
        if page.has_prev() {
          KeyResult::Event(TableEvent::PageChange(page.current() - 1))
        } else {
          KeyResult::Handled
        }
      }
      KeyCode::Char('l') | KeyCode::Right => {
        if page.has_next() {
          KeyResult::Event(TableEvent::PageChange(page.current() + 1))
        } else {
          KeyResult::Handled
        }
      }
      KeyCode::Char('r') => KeyResult::Event(TableEvent::Refresh),
      KeyCode::Enter => match self.selected_row(data, page) {
        Some(row) => KeyResult::Event(TableEvent::Open(row)),
        None => KeyResult::Handled,
      },
      KeyCode::Char('e') if self.can_edit => match self.selected_row(data, page) {
        Some(row) => KeyResult::Event(TableEvent::Edit(row)),
        None => KeyResult::Handled,
      },
      KeyCode::Char('d') if self.can_delete => {
        if self.deleting {
          // A delete is already in flight; no double submission
          return KeyResult::Handled;
        }
        match self.selected_row(data, page) {
          Some(row) => KeyResult::Event(TableEvent::Delete(row)),
          None => KeyResult::Handled,
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => KeyResult::Event(TableEvent::Back),
      _ => KeyResult::NotHandled,
    }
  }

  /// Render the table, pagination strip, and (when empty) the caller's
  /// empty-state text.
  pub fn render(
    &mut self,
    frame: &mut Frame,
    area: Rect,
    data: &[T],
    page: &PageState,
    title: &str,
    empty_text: &str,
    loading: bool,
  ) {
    let block = Block::default()
      .title(title.to_string())
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let visible = self.visible(data, page);

    // Keep the cursor on a real row when the data shrinks
    match self.state.selected() {
      Some(_) if visible.is_empty() => self.state.select(None),
      Some(i) if i >= visible.len() => self.state.select(Some(visible.len() - 1)),
      None if !visible.is_empty() => self.state.select(Some(0)),
      _ => {}
    }

    if visible.is_empty() && !loading {
      let paragraph = Paragraph::new(empty_text.to_string())
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Min(1),    // Rows
        Constraint::Length(1), // Pagination strip
      ])
      .split(inner);

    let has_actions = self.can_edit || self.can_delete;

    let mut header_cells: Vec<Cell> = self
      .columns
      .iter()
      .map(|col| Cell::from(col.label).style(Style::default().fg(Color::Cyan).bold()))
      .collect();
    if has_actions {
      header_cells.push(Cell::from("Actions").style(Style::default().fg(Color::Cyan).bold()));
    }

    let rows: Vec<Row> = visible
      .iter()
      .map(|row| {
        let mut cells: Vec<Cell> = self
          .columns
          .iter()
          .map(|col| {
            let value = row.field(col.key);
            match col.render {
              Some(render) => render(value.as_deref(), row),
              None => Cell::from(value.unwrap_or_default()),
            }
          })
          .collect();
        if has_actions {
          cells.push(self.actions_cell());
        }
        Row::new(cells)
      })
      .collect();

    let mut widths: Vec<Constraint> = self.columns.iter().map(|col| col.width).collect();
    if has_actions {
      widths.push(Constraint::Length(14));
    }

    let table = Table::new(rows, widths)
      .header(Row::new(header_cells).bottom_margin(1))
      .row_highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(table, chunks[0], &mut self.state);

    self.render_page_strip(frame, chunks[1], page);
  }

  fn actions_cell(&self) -> Cell<'static> {
    if self.deleting {
      return Cell::from("deleting...").style(Style::default().fg(Color::Yellow));
    }
    let mut spans = Vec::new();
    if self.can_edit {
      spans.push(Span::styled("e", Style::default().fg(Color::Cyan)));
      spans.push(Span::styled("dit", Style::default().fg(Color::DarkGray)));
    }
    if self.can_edit && self.can_delete {
      spans.push(Span::raw(" "));
    }
    if self.can_delete {
      spans.push(Span::styled("d", Style::default().fg(Color::Cyan)));
      spans.push(Span::styled("el", Style::default().fg(Color::DarkGray)));
    }
    Cell::from(Line::from(spans))
  }

  fn render_page_strip(&self, frame: &mut Frame, area: Rect, page: &PageState) {
    let prev_style = if page.has_prev() {
      Style::default().fg(Color::Cyan)
    } else {
      Style::default().fg(Color::DarkGray)
    };
    let next_style = if page.has_next() {
      Style::default().fg(Color::Cyan)
    } else {
      Style::default().fg(Color::DarkGray)
    };

    let line = Line::from(vec![
      Span::raw(" "),
      Span::styled("< h", prev_style),
      Span::styled(
        format!("  Page {}/{}  ", page.current(), page.total_pages()),
        Style::default().fg(Color::White),
      ),
      Span::styled("l >", next_style),
      Span::styled(
        format!("   {} items", page.total_items()),
        Style::default().fg(Color::DarkGray),
      ),
    ]);

    frame.render_widget(Paragraph::new(line), area);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  #[derive(Debug, Clone, PartialEq)]
  struct Item {
    id: String,
    name: String,
  }

  impl TableRow for Item {
    fn field(&self, key: &str) -> Option<String> {
      match key {
        "id" => Some(self.id.clone()),
        "name" => Some(self.name.clone()),
        _ => None,
      }
    }
  }

  fn items(n: usize) -> Vec<Item> {
    (0..n)
      .map(|i| Item {
        id: format!("id{}", i),
        name: format!("item {}", i),
      })
      .collect()
  }

  fn table() -> DataTable<Item> {
    DataTable::new(
      vec![
        Column::new("id", "ID", Constraint::Length(8)),
        Column::new("name", "Name", Constraint::Min(10)),
      ],
      Paging::Client,
    )
    .with_actions(true, true)
  }

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn test_total_pages_is_ceiling() {
    assert_eq!(PageState::new(1, 10, 25).total_pages(), 3);
    assert_eq!(PageState::new(1, 10, 30).total_pages(), 3);
    assert_eq!(PageState::new(1, 10, 31).total_pages(), 4);
    assert_eq!(PageState::new(1, 10, 0).total_pages(), 1);
  }

  #[test]
  fn test_last_page_shows_remainder() {
    // 25 items at 10 per page: 3 pages, page 3 shows 5 rows
    let page = PageState::new(3, 10, 25);
    assert_eq!(page.total_pages(), 3);
    assert_eq!(page.visible_rows(), 5);

    let all = items(25);
    assert_eq!(page.slice(&all).len(), 5);
    assert_eq!(page.slice(&all)[0].id, "id20");
  }

  #[test]
  fn test_out_of_range_pages_are_ignored() {
    let mut page = PageState::new(2, 10, 25);
    assert!(!page.set_page(0));
    assert_eq!(page.current(), 2);
    assert!(!page.set_page(4));
    assert_eq!(page.current(), 2);
    assert!(!page.set_page(2));
    assert!(page.set_page(3));
    assert_eq!(page.current(), 3);
  }

  #[test]
  fn test_constructor_clamps_current_page() {
    assert_eq!(PageState::new(9, 10, 25).current(), 3);
    assert_eq!(PageState::new(0, 10, 25).current(), 1);
    assert_eq!(PageState::new(5, 10, 0).current(), 1);
  }

  #[test]
  fn test_page_keys_emit_changes_within_bounds() {
    let mut t = table();
    let all = items(25);
    let page = PageState::new(1, 10, 25);

    // At the first page, prev is a no-op
    assert_eq!(t.handle_key(key(KeyCode::Char('h')), &all, &page), KeyResult::Handled);
    assert_eq!(
      t.handle_key(key(KeyCode::Char('l')), &all, &page),
      KeyResult::Event(TableEvent::PageChange(2))
    );

    let last = PageState::new(3, 10, 25);
    assert_eq!(t.handle_key(key(KeyCode::Char('l')), &all, &last), KeyResult::Handled);
    assert_eq!(
      t.handle_key(key(KeyCode::Char('h')), &all, &last),
      KeyResult::Event(TableEvent::PageChange(2))
    );
  }

  #[test]
  fn test_selection_follows_visible_slice() {
    let mut t = table();
    let all = items(25);
    let page = PageState::new(3, 10, 25);

    // Page 3 holds id20..id24; G jumps to the last visible row
    t.handle_key(key(KeyCode::Char('G')), &all, &page);
    match t.handle_key(key(KeyCode::Enter), &all, &page) {
      KeyResult::Event(TableEvent::Open(row)) => assert_eq!(row.id, "id24"),
      other => panic!("expected Open, got {:?}", other),
    }
  }

  #[test]
  fn test_delete_is_suppressed_while_deleting() {
    let mut t = table();
    let all = items(3);
    let page = PageState::new(1, 10, 3);

    t.handle_key(key(KeyCode::Char('j')), &all, &page);
    match t.handle_key(key(KeyCode::Char('d')), &all, &page) {
      KeyResult::Event(TableEvent::Delete(row)) => assert_eq!(row.id, "id1"),
      other => panic!("expected Delete, got {:?}", other),
    }

    t.set_deleting(true);
    assert_eq!(
      t.handle_key(key(KeyCode::Char('d')), &all, &page),
      KeyResult::Handled
    );
  }

  #[test]
  fn test_actions_disabled_without_handlers() {
    let mut t = DataTable::new(
      vec![Column::new("id", "ID", Constraint::Length(8))],
      Paging::Client,
    );
    let all = items(2);
    let page = PageState::new(1, 10, 2);

    t.handle_key(key(KeyCode::Char('j')), &all, &page);
    assert_eq!(
      t.handle_key(key(KeyCode::Char('d')), &all, &page),
      KeyResult::NotHandled
    );
    assert_eq!(
      t.handle_key(key(KeyCode::Char('e')), &all, &page),
      KeyResult::NotHandled
    );
  }

  #[test]
  fn test_server_paging_uses_rows_as_given() {
    let mut t = DataTable::new(
      vec![Column::new("id", "ID", Constraint::Length(8))],
      Paging::Server,
    );
    // Server already sliced: 5 rows of page 3
    let rows = items(5);
    let page = PageState::new(3, 10, 25);

    t.handle_key(key(KeyCode::Char('G')), &rows, &page);
    match t.handle_key(key(KeyCode::Enter), &rows, &page) {
      KeyResult::Event(TableEvent::Open(row)) => assert_eq!(row.id, "id4"),
      other => panic!("expected Open, got {:?}", other),
    }
  }
}
