//! Domain types for the Lawbie admin backend.
//!
//! Every type here round-trips through JSON: rows are decoded from the
//! wire and re-encoded into the query cache, so field attributes keep
//! the backend's camelCase names (and accept Mongo's `_id`).

use serde::{Deserialize, Serialize};

/// One page of rows plus the pagination metadata that came with it.
///
/// `page` and `total_pages` are 1-based. Endpoints that return the whole
/// collection in one response are wrapped with [`Paged::full`] and sliced
/// by the table at render time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paged<T> {
  pub items: Vec<T>,
  pub total: u64,
  pub page: u64,
  pub total_pages: u64,
  pub limit: u64,
}

impl<T> Paged<T> {
  /// Wrap an unpaginated collection as a single logical page.
  pub fn full(items: Vec<T>) -> Self {
    let total = items.len() as u64;
    Paged {
      items,
      total,
      page: 1,
      total_pages: 1,
      limit: total.max(1),
    }
  }
}

/// Product category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
  #[serde(alias = "_id")]
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub created_at: String,
}

/// Legal practice area (taxonomy for services and lawyers)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeArea {
  #[serde(alias = "_id")]
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub created_at: String,
}

/// Resource type (taxonomy for downloadable resources)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceType {
  #[serde(alias = "_id")]
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub created_at: String,
}

/// Marketplace product listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
  #[serde(alias = "_id")]
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub price: f64,
  #[serde(default)]
  pub category: Option<String>,
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub created_at: String,
}

/// Legal service offered by a lawyer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
  #[serde(alias = "_id")]
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub price: f64,
  #[serde(default)]
  pub lawyer: Option<String>,
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub created_at: String,
}

/// Blog post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
  #[serde(alias = "_id")]
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub author: String,
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub created_at: String,
}

/// Discount code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoCode {
  #[serde(alias = "_id")]
  pub id: String,
  pub code: String,
  #[serde(default)]
  pub discount_percent: f64,
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub expires_at: Option<String>,
}

/// A completed or pending order, as reported by the revenue endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
  #[serde(alias = "_id")]
  pub id: String,
  #[serde(default)]
  pub customer: String,
  #[serde(default)]
  pub item: String,
  #[serde(default)]
  pub amount: f64,
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub created_at: String,
}

/// Support conversation between a customer and the admin team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
  #[serde(alias = "_id")]
  pub id: String,
  #[serde(default)]
  pub customer: String,
  #[serde(default)]
  pub last_message: Option<String>,
  #[serde(default)]
  pub updated_at: String,
}

/// One message inside a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
  #[serde(alias = "_id")]
  pub id: String,
  #[serde(default)]
  pub sender: String,
  #[serde(default)]
  pub body: String,
  #[serde(default)]
  pub from_admin: bool,
  #[serde(default)]
  pub created_at: String,
}

/// Customer question awaiting an admin answer. A question with no
/// `answer` is pending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
  #[serde(alias = "_id")]
  pub id: String,
  #[serde(default)]
  pub customer: String,
  #[serde(default)]
  pub question: String,
  #[serde(default)]
  pub answer: Option<String>,
  #[serde(default)]
  pub created_at: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_decodes_mongo_id_alias() {
    let json = r#"{"_id":"abc123","name":"Family Law","createdAt":"2024-01-05"}"#;
    let area: PracticeArea = serde_json::from_str(json).unwrap();
    assert_eq!(area.id, "abc123");
    assert_eq!(area.name, "Family Law");
    assert_eq!(area.created_at, "2024-01-05");
  }

  #[test]
  fn test_missing_optional_fields_default() {
    let json = r#"{"id":"p1","name":"Contract template"}"#;
    let product: Product = serde_json::from_str(json).unwrap();
    assert_eq!(product.price, 0.0);
    assert!(product.category.is_none());
    assert!(product.status.is_empty());
  }

  #[test]
  fn test_full_wraps_collection_as_one_page() {
    let paged = Paged::full(vec![1, 2, 3]);
    assert_eq!(paged.total, 3);
    assert_eq!(paged.page, 1);
    assert_eq!(paged.total_pages, 1);
    assert_eq!(paged.items, vec![1, 2, 3]);
  }

  #[test]
  fn test_rows_survive_a_cache_round_trip() {
    let q = Question {
      id: "q1".into(),
      customer: "Dana".into(),
      question: "Is the retainer refundable?".into(),
      answer: None,
      created_at: "2024-03-01".into(),
    };
    let value = serde_json::to_value(&q).unwrap();
    let back: Question = serde_json::from_value(value).unwrap();
    assert_eq!(back, q);
  }
}
