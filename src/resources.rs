//! Resource descriptors: everything the generic list page needs to
//! serve one entity family (columns, capabilities, page mode).
//!
//! The categories, practice-areas, and resource-types screens are the
//! same page with different descriptors; products, services, and blogs
//! reuse it read-mostly with server-side pagination.

use ratatui::prelude::*;
use ratatui::widgets::Cell;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api::{
  Blog, Category, Conversation, PracticeArea, Product, PromoCode, Question, ResourceType, Sale,
  Service,
};
use crate::query::Family;
use crate::ui::components::{Column, Paging, TableRow};
use crate::ui::renderfns::{format_date, format_money, status_color, truncate};

/// A resource family the generic list page can drive.
///
/// Capabilities are consts so a page can be declared in one impl
/// block. Rows that support renaming are edited through a one-line
/// prompt that PUTs `{ "name": ... }` back.
pub trait Resource:
  TableRow + Clone + Send + Sync + Serialize + DeserializeOwned + 'static
{
  const FAMILY: Family;
  const TITLE: &'static str;
  const PAGE_SIZE: u64;
  const PAGING: Paging;
  const CAN_CREATE: bool = false;
  const CAN_RENAME: bool = false;
  const CAN_DELETE: bool = true;

  fn id(&self) -> &str;

  /// Human label used in confirm dialogs and notices
  fn name(&self) -> &str;

  fn columns() -> Vec<Column<Self>>;

  /// Label/field pairs shown in the detail pane
  fn detail_fields() -> &'static [(&'static str, &'static str)];

  /// Body for the create endpoint, built from the prompt input
  fn create_body(input: &str) -> serde_json::Value {
    serde_json::json!({ "name": input })
  }
}

// Shared cell formatters for render-only columns

fn status_cell(value: Option<&str>) -> Cell<'static> {
  let text = value.unwrap_or_default().to_string();
  let color = status_color(&text);
  Cell::from(Span::styled(text, Style::default().fg(color)))
}

fn date_cell(value: Option<&str>) -> Cell<'static> {
  Cell::from(format_date(value.unwrap_or_default()))
}

// ============================================================================
// Taxonomy families: full CRUD through the prompt
// ============================================================================

impl TableRow for Category {
  fn field(&self, key: &str) -> Option<String> {
    match key {
      "id" => Some(self.id.clone()),
      "name" => Some(self.name.clone()),
      "created_at" => Some(self.created_at.clone()),
      _ => None,
    }
  }
}

impl Resource for Category {
  const FAMILY: Family = Family::Categories;
  const TITLE: &'static str = "Categories";
  const PAGE_SIZE: u64 = 10;
  const PAGING: Paging = Paging::Client;
  const CAN_CREATE: bool = true;
  const CAN_RENAME: bool = true;

  fn id(&self) -> &str {
    &self.id
  }

  fn name(&self) -> &str {
    &self.name
  }

  fn columns() -> Vec<Column<Self>> {
    vec![
      Column::new("name", "Name", Constraint::Min(24)),
      Column::new("created_at", "Created", Constraint::Length(12))
        .with_render(|v, _| date_cell(v)),
    ]
  }

  fn detail_fields() -> &'static [(&'static str, &'static str)] {
    &[("ID", "id"), ("Name", "name"), ("Created", "created_at")]
  }
}

impl TableRow for PracticeArea {
  fn field(&self, key: &str) -> Option<String> {
    match key {
      "id" => Some(self.id.clone()),
      "name" => Some(self.name.clone()),
      "created_at" => Some(self.created_at.clone()),
      _ => None,
    }
  }
}

impl Resource for PracticeArea {
  const FAMILY: Family = Family::PracticeAreas;
  const TITLE: &'static str = "Practice Areas";
  const PAGE_SIZE: u64 = 10;
  const PAGING: Paging = Paging::Client;
  const CAN_CREATE: bool = true;
  const CAN_RENAME: bool = true;

  fn id(&self) -> &str {
    &self.id
  }

  fn name(&self) -> &str {
    &self.name
  }

  fn columns() -> Vec<Column<Self>> {
    vec![
      Column::new("name", "Name", Constraint::Min(24)),
      Column::new("created_at", "Created", Constraint::Length(12))
        .with_render(|v, _| date_cell(v)),
    ]
  }

  fn detail_fields() -> &'static [(&'static str, &'static str)] {
    &[("ID", "id"), ("Name", "name"), ("Created", "created_at")]
  }
}

impl TableRow for ResourceType {
  fn field(&self, key: &str) -> Option<String> {
    match key {
      "id" => Some(self.id.clone()),
      "name" => Some(self.name.clone()),
      "created_at" => Some(self.created_at.clone()),
      _ => None,
    }
  }
}

impl Resource for ResourceType {
  const FAMILY: Family = Family::ResourceTypes;
  const TITLE: &'static str = "Resource Types";
  const PAGE_SIZE: u64 = 10;
  const PAGING: Paging = Paging::Client;
  const CAN_CREATE: bool = true;
  const CAN_RENAME: bool = true;

  fn id(&self) -> &str {
    &self.id
  }

  fn name(&self) -> &str {
    &self.name
  }

  fn columns() -> Vec<Column<Self>> {
    vec![
      Column::new("name", "Name", Constraint::Min(24)),
      Column::new("created_at", "Created", Constraint::Length(12))
        .with_render(|v, _| date_cell(v)),
    ]
  }

  fn detail_fields() -> &'static [(&'static str, &'static str)] {
    &[("ID", "id"), ("Name", "name"), ("Created", "created_at")]
  }
}

// ============================================================================
// Promo codes: list and delete
// ============================================================================

impl TableRow for PromoCode {
  fn field(&self, key: &str) -> Option<String> {
    match key {
      "id" => Some(self.id.clone()),
      "code" => Some(self.code.clone()),
      "discount_percent" => Some(self.discount_percent.to_string()),
      "status" => Some(self.status.clone()),
      "expires_at" => self.expires_at.clone(),
      _ => None,
    }
  }
}

impl Resource for PromoCode {
  const FAMILY: Family = Family::PromoCodes;
  const TITLE: &'static str = "Promo Codes";
  const PAGE_SIZE: u64 = 10;
  const PAGING: Paging = Paging::Client;

  fn id(&self) -> &str {
    &self.id
  }

  fn name(&self) -> &str {
    &self.code
  }

  fn columns() -> Vec<Column<Self>> {
    vec![
      Column::new("code", "Code", Constraint::Length(16)),
      Column::new("discount_percent", "Discount", Constraint::Length(10))
        .with_render(|_, row| Cell::from(format!("{}%", row.discount_percent))),
      Column::new("status", "Status", Constraint::Length(10)).with_render(|v, _| status_cell(v)),
      Column::new("expires_at", "Expires", Constraint::Length(12)).with_render(|v, _| date_cell(v)),
    ]
  }

  fn detail_fields() -> &'static [(&'static str, &'static str)] {
    &[
      ("ID", "id"),
      ("Code", "code"),
      ("Discount", "discount_percent"),
      ("Status", "status"),
      ("Expires", "expires_at"),
    ]
  }
}

// ============================================================================
// Marketplace listings: server-paginated, delete only
// ============================================================================

impl TableRow for Product {
  fn field(&self, key: &str) -> Option<String> {
    match key {
      "id" => Some(self.id.clone()),
      "name" => Some(self.name.clone()),
      "price" => Some(self.price.to_string()),
      "category" => self.category.clone(),
      "status" => Some(self.status.clone()),
      "created_at" => Some(self.created_at.clone()),
      _ => None,
    }
  }
}

impl Resource for Product {
  const FAMILY: Family = Family::Products;
  const TITLE: &'static str = "Products";
  const PAGE_SIZE: u64 = 12;
  const PAGING: Paging = Paging::Server;

  fn id(&self) -> &str {
    &self.id
  }

  fn name(&self) -> &str {
    &self.name
  }

  fn columns() -> Vec<Column<Self>> {
    vec![
      Column::new("name", "Name", Constraint::Min(24)),
      Column::new("price", "Price", Constraint::Length(12))
        .with_render(|_, row| Cell::from(format_money(row.price))),
      Column::new("category", "Category", Constraint::Length(16)),
      Column::new("status", "Status", Constraint::Length(10)).with_render(|v, _| status_cell(v)),
      Column::new("created_at", "Created", Constraint::Length(12))
        .with_render(|v, _| date_cell(v)),
    ]
  }

  fn detail_fields() -> &'static [(&'static str, &'static str)] {
    &[
      ("ID", "id"),
      ("Name", "name"),
      ("Price", "price"),
      ("Category", "category"),
      ("Status", "status"),
      ("Created", "created_at"),
    ]
  }
}

impl TableRow for Service {
  fn field(&self, key: &str) -> Option<String> {
    match key {
      "id" => Some(self.id.clone()),
      "name" => Some(self.name.clone()),
      "price" => Some(self.price.to_string()),
      "lawyer" => self.lawyer.clone(),
      "status" => Some(self.status.clone()),
      "created_at" => Some(self.created_at.clone()),
      _ => None,
    }
  }
}

impl Resource for Service {
  const FAMILY: Family = Family::Services;
  const TITLE: &'static str = "Services";
  const PAGE_SIZE: u64 = 12;
  const PAGING: Paging = Paging::Server;

  fn id(&self) -> &str {
    &self.id
  }

  fn name(&self) -> &str {
    &self.name
  }

  fn columns() -> Vec<Column<Self>> {
    vec![
      Column::new("name", "Name", Constraint::Min(24)),
      Column::new("price", "Price", Constraint::Length(12))
        .with_render(|_, row| Cell::from(format_money(row.price))),
      Column::new("lawyer", "Lawyer", Constraint::Length(18)),
      Column::new("status", "Status", Constraint::Length(10)).with_render(|v, _| status_cell(v)),
      Column::new("created_at", "Created", Constraint::Length(12))
        .with_render(|v, _| date_cell(v)),
    ]
  }

  fn detail_fields() -> &'static [(&'static str, &'static str)] {
    &[
      ("ID", "id"),
      ("Name", "name"),
      ("Price", "price"),
      ("Lawyer", "lawyer"),
      ("Status", "status"),
      ("Created", "created_at"),
    ]
  }
}

impl TableRow for Blog {
  fn field(&self, key: &str) -> Option<String> {
    match key {
      "id" => Some(self.id.clone()),
      "title" => Some(self.title.clone()),
      "author" => Some(self.author.clone()),
      "status" => Some(self.status.clone()),
      "created_at" => Some(self.created_at.clone()),
      _ => None,
    }
  }
}

impl Resource for Blog {
  const FAMILY: Family = Family::Blogs;
  const TITLE: &'static str = "Blogs";
  const PAGE_SIZE: u64 = 8;
  const PAGING: Paging = Paging::Server;

  fn id(&self) -> &str {
    &self.id
  }

  fn name(&self) -> &str {
    &self.title
  }

  fn columns() -> Vec<Column<Self>> {
    vec![
      Column::new("title", "Title", Constraint::Min(28)),
      Column::new("author", "Author", Constraint::Length(16)),
      Column::new("status", "Status", Constraint::Length(10)).with_render(|v, _| status_cell(v)),
      Column::new("created_at", "Created", Constraint::Length(12))
        .with_render(|v, _| date_cell(v)),
    ]
  }

  fn detail_fields() -> &'static [(&'static str, &'static str)] {
    &[
      ("ID", "id"),
      ("Title", "title"),
      ("Author", "author"),
      ("Status", "status"),
      ("Created", "created_at"),
    ]
  }
}

// ============================================================================
// Read-only families driven by the custom views (sales, questions)
// ============================================================================

impl TableRow for Sale {
  fn field(&self, key: &str) -> Option<String> {
    match key {
      "id" => Some(self.id.clone()),
      "customer" => Some(self.customer.clone()),
      "item" => Some(self.item.clone()),
      "amount" => Some(self.amount.to_string()),
      "status" => Some(self.status.clone()),
      "created_at" => Some(self.created_at.clone()),
      _ => None,
    }
  }
}

impl Resource for Sale {
  const FAMILY: Family = Family::Sales;
  const TITLE: &'static str = "Sales";
  const PAGE_SIZE: u64 = 12;
  const PAGING: Paging = Paging::Client;
  const CAN_DELETE: bool = false;

  fn id(&self) -> &str {
    &self.id
  }

  fn name(&self) -> &str {
    &self.item
  }

  fn columns() -> Vec<Column<Self>> {
    vec![
      Column::new("customer", "Customer", Constraint::Length(20)),
      Column::new("item", "Item", Constraint::Min(24)),
      Column::new("amount", "Amount", Constraint::Length(12))
        .with_render(|_, row| Cell::from(format_money(row.amount))),
      Column::new("status", "Status", Constraint::Length(12)).with_render(|v, _| status_cell(v)),
      Column::new("created_at", "Date", Constraint::Length(12)).with_render(|v, _| date_cell(v)),
    ]
  }

  fn detail_fields() -> &'static [(&'static str, &'static str)] {
    &[
      ("ID", "id"),
      ("Customer", "customer"),
      ("Item", "item"),
      ("Amount", "amount"),
      ("Status", "status"),
      ("Date", "created_at"),
    ]
  }
}

impl TableRow for Conversation {
  fn field(&self, key: &str) -> Option<String> {
    match key {
      "id" => Some(self.id.clone()),
      "customer" => Some(self.customer.clone()),
      "last_message" => self.last_message.clone(),
      "updated_at" => Some(self.updated_at.clone()),
      _ => None,
    }
  }
}

impl TableRow for Question {
  fn field(&self, key: &str) -> Option<String> {
    match key {
      "id" => Some(self.id.clone()),
      "customer" => Some(self.customer.clone()),
      "question" => Some(self.question.clone()),
      "answer" => self.answer.clone(),
      // Derived: a question with no answer is pending
      "status" => Some(if self.answer.is_some() {
        "answered".to_string()
      } else {
        "pending".to_string()
      }),
      "created_at" => Some(self.created_at.clone()),
      _ => None,
    }
  }
}

impl Resource for Question {
  const FAMILY: Family = Family::Questions;
  const TITLE: &'static str = "Questions";
  const PAGE_SIZE: u64 = 10;
  const PAGING: Paging = Paging::Server;
  const CAN_DELETE: bool = false;

  fn id(&self) -> &str {
    &self.id
  }

  fn name(&self) -> &str {
    &self.question
  }

  fn columns() -> Vec<Column<Self>> {
    vec![
      Column::new("customer", "Customer", Constraint::Length(20)),
      Column::new("question", "Question", Constraint::Min(30))
        .with_render(|v, _| Cell::from(truncate(v.unwrap_or_default(), 60))),
      Column::new("status", "Status", Constraint::Length(10)).with_render(|v, _| status_cell(v)),
      Column::new("created_at", "Asked", Constraint::Length(12)).with_render(|v, _| date_cell(v)),
    ]
  }

  fn detail_fields() -> &'static [(&'static str, &'static str)] {
    &[
      ("ID", "id"),
      ("Customer", "customer"),
      ("Question", "question"),
      ("Answer", "answer"),
      ("Status", "status"),
      ("Asked", "created_at"),
    ]
  }
}
