//! Typed cache keys for queries.
//!
//! Every cached request is identified by a [`QueryKey`]: the entity family
//! it belongs to plus whatever parameters shape the response (page number,
//! search term, entity id). Keys are plain values, so two requests for the
//! same data always collide on the same cache entry, and a whole family can
//! be invalidated by matching on [`QueryKey::family`].

use std::fmt;

/// An entity family served by the admin API.
///
/// Each family maps to one REST collection and groups all cache entries
/// that a mutation against that collection can affect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
  Categories,
  PracticeAreas,
  ResourceTypes,
  Products,
  Services,
  Blogs,
  PromoCodes,
  Sales,
  Conversations,
  Questions,
}

impl Family {
  /// The REST path segment for this family's collection.
  pub fn path(&self) -> &'static str {
    match self {
      Family::Categories => "categories",
      Family::PracticeAreas => "practice-areas",
      Family::ResourceTypes => "resource-types",
      Family::Products => "products",
      Family::Services => "services",
      Family::Blogs => "blogs",
      Family::PromoCodes => "promo-codes",
      Family::Sales => "sales",
      Family::Conversations => "conversations",
      Family::Questions => "questions",
    }
  }

  /// Singular label for notices ("category deleted", ...).
  pub fn label(&self) -> &'static str {
    match self {
      Family::Categories => "category",
      Family::PracticeAreas => "practice area",
      Family::ResourceTypes => "resource type",
      Family::Products => "product",
      Family::Services => "service",
      Family::Blogs => "blog",
      Family::PromoCodes => "promo code",
      Family::Sales => "sale",
      Family::Conversations => "conversation",
      Family::Questions => "question",
    }
  }
}

impl fmt::Display for Family {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.path())
  }
}

/// Identity of one cached request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
  /// The full collection of a family (client-paged screens).
  List { family: Family },
  /// One server-side page of a family.
  Page { family: Family, page: usize },
  /// A filtered collection, keyed by normalized search term.
  Search { family: Family, term: String },
  /// A single entity.
  Detail { family: Family, id: String },
  /// The message thread of one conversation.
  Thread { conversation: String },
}

impl QueryKey {
  pub fn list(family: Family) -> Self {
    QueryKey::List { family }
  }

  pub fn page(family: Family, page: usize) -> Self {
    QueryKey::Page { family, page }
  }

  /// Search key with a normalized term: surrounding whitespace and case
  /// differences hit the same cache entry.
  pub fn search(family: Family, term: &str) -> Self {
    QueryKey::Search {
      family,
      term: normalize_term(term),
    }
  }

  pub fn detail(family: Family, id: impl Into<String>) -> Self {
    QueryKey::Detail {
      family,
      id: id.into(),
    }
  }

  pub fn thread(conversation: impl Into<String>) -> Self {
    QueryKey::Thread {
      conversation: conversation.into(),
    }
  }

  /// The family this key belongs to, used for family-wide invalidation.
  pub fn family(&self) -> Family {
    match self {
      QueryKey::List { family }
      | QueryKey::Page { family, .. }
      | QueryKey::Search { family, .. }
      | QueryKey::Detail { family, .. } => *family,
      QueryKey::Thread { .. } => Family::Conversations,
    }
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      QueryKey::List { family } => write!(f, "{}:all", family),
      QueryKey::Page { family, page } => write!(f, "{}:page:{}", family, page),
      QueryKey::Search { family, term } => write!(f, "{}:search:{}", family, term),
      QueryKey::Detail { family, id } => write!(f, "{}:{}", family, id),
      QueryKey::Thread { conversation } => write!(f, "conversations:{}:messages", conversation),
    }
  }
}

fn normalize_term(term: &str) -> String {
  term.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_search_term_is_normalized() {
    let a = QueryKey::search(Family::Sales, "  Order-42 ");
    let b = QueryKey::search(Family::Sales, "order-42");
    assert_eq!(a, b);
  }

  #[test]
  fn test_page_keys_are_distinct() {
    let a = QueryKey::page(Family::Products, 1);
    let b = QueryKey::page(Family::Products, 2);
    assert_ne!(a, b);
  }

  #[test]
  fn test_thread_key_belongs_to_conversations() {
    let key = QueryKey::thread("conv-9");
    assert_eq!(key.family(), Family::Conversations);
  }

  #[test]
  fn test_display_includes_parameters() {
    assert_eq!(
      QueryKey::page(Family::Blogs, 3).to_string(),
      "blogs:page:3"
    );
    assert_eq!(
      QueryKey::thread("c1").to_string(),
      "conversations:c1:messages"
    );
  }
}
