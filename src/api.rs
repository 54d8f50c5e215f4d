//! HTTP layer for the Lawbie admin backend: domain types, response
//! envelopes, and the [`ApiClient`] the views fetch through.

mod api_types;
mod client;
mod types;

pub use client::ApiClient;
pub use types::{
  Blog, Category, Conversation, Message, Paged, PracticeArea, Product, PromoCode, Question,
  ResourceType, Sale, Service,
};
