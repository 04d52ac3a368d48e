//! Publisher gateway client.
//!
//! All external collaborators (gauge catalog, execution connector,
//! RPC endpoints, cron service) are reached through one API gateway
//! that proxies requests to named publishers. This module provides
//! the HTTP client plus the `PublisherGateway` trait the rest of the
//! crate depends on, so collaborators can be mocked in tests.

pub mod resolver;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::types::TraderError;

/// Request timeout for all gateway calls. A timeout is treated
/// identically to the corresponding stage's failure mode.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Page size when walking the publisher catalog.
const CATALOG_PAGE_LIMIT: u32 = 100;

/// Catalog pagination stops after this many pages.
const CATALOG_MAX_PAGES: u32 = 5;

// ---------------------------------------------------------------------------
// Catalog entry
// ---------------------------------------------------------------------------

/// One publisher as listed by the catalog. Only the fields used for
/// RPC discovery are deserialized.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PublisherInfo {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct CatalogPage {
    #[serde(default)]
    data: Vec<PublisherInfo>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    count: Option<u32>,
}

// ---------------------------------------------------------------------------
// Gateway trait
// ---------------------------------------------------------------------------

/// Access to the publisher gateway: proxied calls plus the catalog read.
#[async_trait]
pub trait PublisherGateway: Send + Sync {
    /// Call `path` on a named publisher through the gateway proxy.
    async fn call(
        &self,
        publisher: &str,
        method: &str,
        path: &str,
        body: &Value,
    ) -> Result<Value, TraderError>;

    /// List all publishers registered in the catalog.
    async fn list_publishers(&self) -> Result<Vec<PublisherInfo>, TraderError>;
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// HTTP client for the publisher gateway.
pub struct PublisherClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl PublisherClient {
    /// Create a new client.
    ///
    /// The base URL is normalised: trailing slashes and an accidental
    /// `/publishers` (or `/v1/publishers`) suffix are stripped so that
    /// endpoint paths compose correctly.
    pub fn new(api_key: String, base_url: &str) -> Result<Self, TraderError> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| TraderError::Config(format!("Failed to build HTTP client: {e}")))?;

        let mut normalized = base_url.trim_end_matches('/').to_string();
        for suffix in ["/v1/publishers", "/publishers"] {
            if let Some(stripped) = normalized.strip_suffix(suffix) {
                normalized = stripped.to_string();
            }
        }

        Ok(Self {
            http,
            api_key,
            base_url: normalized.trim_end_matches('/').to_string(),
        })
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        body: &Value,
    ) -> Result<Value, TraderError> {
        let normalized_path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        let url = format!("{}{normalized_path}", self.base_url);

        let method = reqwest::Method::from_bytes(method.to_uppercase().as_bytes())
            .map_err(|_| TraderError::Config(format!("Unsupported HTTP method: {method}")))?;
        let is_get = method == reqwest::Method::GET;

        debug!(%url, method = %method, "Gateway request");

        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json");
        if !is_get {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| TraderError::Connector {
            publisher: "gateway".to_string(),
            message: format!("Connection failed on {normalized_path}: {e}"),
        })?;

        let status = response.status();
        let raw = response.text().await.map_err(|e| TraderError::Connector {
            publisher: "gateway".to_string(),
            message: format!("Failed to read body from {normalized_path}: {e}"),
        })?;

        if !status.is_success() {
            return Err(TraderError::Connector {
                publisher: "gateway".to_string(),
                message: format!("HTTP {status} on {normalized_path}: {}", truncate(&raw, 200)),
            });
        }

        let parsed: Value = serde_json::from_str(&raw).map_err(|_| TraderError::Connector {
            publisher: "gateway".to_string(),
            message: format!("Invalid JSON from {normalized_path}: {}", truncate(&raw, 200)),
        })?;
        if !parsed.is_object() {
            return Err(TraderError::Connector {
                publisher: "gateway".to_string(),
                message: format!("Response from {normalized_path} was not an object"),
            });
        }
        Ok(parsed)
    }
}

#[async_trait]
impl PublisherGateway for PublisherClient {
    async fn call(
        &self,
        publisher: &str,
        method: &str,
        path: &str,
        body: &Value,
    ) -> Result<Value, TraderError> {
        let normalized_path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        self.request(
            method,
            &format!("/publishers/{publisher}{normalized_path}"),
            body,
        )
        .await
        .map_err(|e| match e {
            TraderError::Connector { message, .. } => TraderError::Connector {
                publisher: publisher.to_string(),
                message,
            },
            other => other,
        })
    }

    async fn list_publishers(&self) -> Result<Vec<PublisherInfo>, TraderError> {
        let mut publishers: Vec<PublisherInfo> = Vec::new();
        let mut offset: u32 = 0;

        for page_index in 0..CATALOG_MAX_PAGES {
            let path = format!("/publishers?limit={CATALOG_PAGE_LIMIT}&offset={offset}");
            let payload = self.request("GET", &path, &Value::Null).await?;
            let page: CatalogPage =
                serde_json::from_value(payload).map_err(|e| TraderError::Connector {
                    publisher: "gateway".to_string(),
                    message: format!("Invalid publisher catalog response: {e}"),
                })?;

            let page_len = page.data.len() as u32;
            publishers.extend(page.data);

            let has_more = page.pagination.as_ref().map(|p| p.has_more).unwrap_or(false);
            if !has_more || page_len == 0 {
                break;
            }
            offset += match page.pagination.and_then(|p| p.count) {
                Some(count) if count > 0 => count,
                _ => page_len,
            };

            if page_index + 1 == CATALOG_MAX_PAGES {
                warn!(pages = CATALOG_MAX_PAGES, "Publisher catalog pagination cap hit");
            }
        }

        debug!(count = publishers.len(), "Publisher catalog fetched");
        Ok(publishers)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
