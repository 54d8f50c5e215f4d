use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use url::Url;

use crate::api::api_types::{extract_error_message, ApiDetailResponse, ApiListResponse};
use crate::api::types::{Message, Paged, Sale};
use crate::config::Config;
use crate::query::Family;

/// Lawbie admin API client wrapper.
///
/// Cheap to clone; every view's fetch closures capture their own copy.
/// Constructed without a token the client is "not ready" and views keep
/// their queries disabled instead of firing requests that would 401.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base: Url,
  token: Option<String>,
}

impl ApiClient {
  pub fn new(config: &Config) -> Result<Self> {
    let base = Url::parse(&config.api.url)
      .map_err(|e| eyre!("Invalid API url {}: {}", config.api.url, e))?;

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base,
      token: Config::api_token(),
    })
  }

  /// Whether a session token is available. Queries stay idle until it is.
  pub fn is_ready(&self) -> bool {
    self.token.is_some()
  }

  /// Fetch a whole collection for a resource the backend does not
  /// paginate server side.
  pub async fn list<T: DeserializeOwned>(&self, family: Family) -> Result<Vec<T>> {
    let url = self.endpoint(family.path())?;
    let resp = self.parse::<ApiListResponse<T>>(self.http.get(url), family).await?;
    Ok(resp.data.items)
  }

  /// Fetch one page of a server-paginated resource.
  pub async fn list_page<T: DeserializeOwned>(
    &self,
    family: Family,
    page: u64,
    limit: u64,
  ) -> Result<Paged<T>> {
    let mut url = self.endpoint(family.path())?;
    url
      .query_pairs_mut()
      .append_pair("page", &page.to_string())
      .append_pair("limit", &limit.to_string());
    let resp = self.parse::<ApiListResponse<T>>(self.http.get(url), family).await?;
    Ok(resp.into_paged(limit))
  }

  /// Fetch a single row by id.
  pub async fn detail<T: DeserializeOwned>(&self, family: Family, id: &str) -> Result<T> {
    let url = self.endpoint(&format!("{}/{}", family.path(), id))?;
    let resp = self.parse::<ApiDetailResponse<T>>(self.http.get(url), family).await?;
    Ok(resp.data)
  }

  /// Search sales by customer or item. An empty term returns everything.
  pub async fn search_sales(&self, term: &str) -> Result<Vec<Sale>> {
    let mut url = self.endpoint(Family::Sales.path())?;
    if !term.is_empty() {
      url.query_pairs_mut().append_pair("search", term);
    }
    let resp = self
      .parse::<ApiListResponse<Sale>>(self.http.get(url), Family::Sales)
      .await?;
    Ok(resp.data.items)
  }

  /// Create a new row in a resource family.
  pub async fn create(&self, family: Family, body: serde_json::Value) -> Result<()> {
    let url = self.endpoint(family.path())?;
    self.check(self.http.post(url).json(&body), family).await
  }

  /// Rename an existing row.
  pub async fn rename(&self, family: Family, id: &str, name: &str) -> Result<()> {
    let url = self.endpoint(&format!("{}/{}", family.path(), id))?;
    let body = serde_json::json!({ "name": name });
    self.check(self.http.put(url).json(&body), family).await
  }

  /// Delete a row by id.
  pub async fn delete(&self, family: Family, id: &str) -> Result<()> {
    let url = self.endpoint(&format!("{}/{}", family.path(), id))?;
    self.check(self.http.delete(url), family).await
  }

  /// Fetch the message history of one conversation.
  pub async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
    let url = self.endpoint(&format!("conversations/{}/messages", conversation_id))?;
    let resp = self
      .parse::<ApiListResponse<Message>>(self.http.get(url), Family::Conversations)
      .await?;
    Ok(resp.data.items)
  }

  /// Post an admin reply into a conversation.
  pub async fn send_message(&self, conversation_id: &str, text: &str) -> Result<()> {
    let url = self.endpoint(&format!("conversations/{}/messages", conversation_id))?;
    let body = serde_json::json!({ "message": text });
    self
      .check(self.http.post(url).json(&body), Family::Conversations)
      .await
  }

  /// Answer a customer question.
  pub async fn reply_question(&self, question_id: &str, answer: &str) -> Result<()> {
    let url = self.endpoint(&format!("questions/{}/reply", question_id))?;
    let body = serde_json::json!({ "answer": answer });
    self
      .check(self.http.post(url).json(&body), Family::Questions)
      .await
  }

  fn endpoint(&self, path: &str) -> Result<Url> {
    let mut url = self.base.clone();
    url
      .path_segments_mut()
      .map_err(|_| eyre!("API url cannot be a base: {}", self.base))?
      .pop_if_empty()
      .extend(path.split('/'));
    Ok(url)
  }

  fn bearer(&self) -> Result<&str> {
    self
      .token
      .as_deref()
      .ok_or_else(|| eyre!("Not authenticated. Set L9S_TOKEN or LAWBIE_API_TOKEN."))
  }

  async fn parse<T: DeserializeOwned>(&self, req: RequestBuilder, family: Family) -> Result<T> {
    let resp = req
      .bearer_auth(self.bearer()?)
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch {}: {}", family, e))?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.bytes().await.unwrap_or_default();
      return Err(eyre!("{}", extract_error_message(status, &body)));
    }

    resp
      .json::<T>()
      .await
      .map_err(|e| eyre!("Failed to parse {} response: {}", family, e))
  }

  async fn check(&self, req: RequestBuilder, family: Family) -> Result<()> {
    let resp = req
      .bearer_auth(self.bearer()?)
      .send()
      .await
      .map_err(|e| eyre!("Failed to reach {}: {}", family, e))?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.bytes().await.unwrap_or_default();
      return Err(eyre!("{}", extract_error_message(status, &body)));
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::ApiConfig;

  fn client(url: &str) -> ApiClient {
    let config = Config {
      api: ApiConfig {
        url: url.to_string(),
      },
      title: None,
      stale_secs: None,
    };
    ApiClient::new(&config).unwrap()
  }

  #[test]
  fn test_endpoint_joins_resource_paths() {
    let c = client("https://api.lawbie.test");
    let url = c.endpoint("practice-areas").unwrap();
    assert_eq!(url.as_str(), "https://api.lawbie.test/practice-areas");
  }

  #[test]
  fn test_endpoint_keeps_base_path_prefix() {
    let c = client("https://lawbie.test/api/v1/");
    let url = c.endpoint("conversations/c1/messages").unwrap();
    assert_eq!(
      url.as_str(),
      "https://lawbie.test/api/v1/conversations/c1/messages"
    );
  }

  #[test]
  fn test_page_params_are_appended() {
    let c = client("https://api.lawbie.test");
    let mut url = c.endpoint("blogs").unwrap();
    url
      .query_pairs_mut()
      .append_pair("page", "3")
      .append_pair("limit", "10");
    assert_eq!(url.as_str(), "https://api.lawbie.test/blogs?page=3&limit=10");
  }
}
