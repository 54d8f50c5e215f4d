//! Serde types matching the Lawbie backend's response envelopes.
//!
//! These are separate from domain types so wire quirks (nested `data`
//! blocks, optional pagination, `{ message }` error bodies) stay out of
//! the structs the rest of the app works with.

use serde::Deserialize;

use super::types::Paged;

/// List responses arrive as `{ "data": { "items": [...], "pagination": {...} } }`.
#[derive(Debug, Deserialize)]
pub struct ApiListResponse<T> {
  pub data: ApiListData<T>,
}

#[derive(Debug, Deserialize)]
pub struct ApiListData<T> {
  // A plain `default` here would also put a `T: Default` bound on the
  // derived impl, which the row types don't carry.
  #[serde(default = "Vec::new")]
  pub items: Vec<T>,
  pub pagination: Option<ApiPagination>,
}

#[derive(Debug, Deserialize)]
pub struct ApiPagination {
  #[serde(default)]
  pub total: u64,
  #[serde(default = "first_page")]
  pub page: u64,
  #[serde(rename = "totalPages")]
  pub total_pages: Option<u64>,
  #[serde(default)]
  pub limit: u64,
}

fn first_page() -> u64 {
  1
}

/// Detail responses arrive as `{ "data": {...} }`.
#[derive(Debug, Deserialize)]
pub struct ApiDetailResponse<T> {
  pub data: T,
}

/// Error bodies carry a human-readable `message` when the backend has one.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
  pub message: Option<String>,
}

impl<T> ApiListResponse<T> {
  /// Flatten the envelope into a [`Paged`] set.
  ///
  /// Some endpoints omit `totalPages` or the whole pagination block;
  /// those gaps are filled in from `requested_limit` and the item count.
  pub fn into_paged(self, requested_limit: u64) -> Paged<T> {
    let items = self.data.items;
    match self.data.pagination {
      Some(p) => {
        let limit = if p.limit == 0 { requested_limit } else { p.limit };
        let total_pages = p
          .total_pages
          .unwrap_or_else(|| if limit == 0 { 1 } else { p.total.div_ceil(limit) });
        Paged {
          items,
          total: p.total,
          page: p.page.max(1),
          total_pages: total_pages.max(1),
          limit,
        }
      }
      None => Paged::full(items),
    }
  }
}

/// Pull a displayable error out of a failed response.
///
/// Prefers the body's `message` field, falling back to the HTTP status.
pub fn extract_error_message(status: reqwest::StatusCode, body: &[u8]) -> String {
  if let Ok(err) = serde_json::from_slice::<ApiErrorBody>(body) {
    if let Some(message) = err.message.filter(|m| !m.trim().is_empty()) {
      return message;
    }
  }
  format!("Request failed with status {}", status)
}
