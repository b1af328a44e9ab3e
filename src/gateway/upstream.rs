//! Upstream OSINT search provider.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::UpstreamConfig;
use crate::error::{GateError, Result};

/// Longest query accepted.
const MAX_QUERY_LEN: usize = 512;

/// A search request as received from clients and forwarded upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// The selector to look up (email, username, phone, wallet...)
    pub query: String,
    /// Optional provider-specific lookup type
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub search_type: Option<String>,
}

impl SearchQuery {
    pub fn validate(&self) -> Result<()> {
        let query = self.query.trim();
        if query.is_empty() {
            return Err(GateError::BadRequest("query must not be empty".to_string()));
        }
        if query.len() > MAX_QUERY_LEN {
            return Err(GateError::BadRequest(format!(
                "query must be at most {} bytes",
                MAX_QUERY_LEN
            )));
        }
        Ok(())
    }
}

/// Something that can answer search queries.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<serde_json::Value>;
}

/// HTTP client for the provider API.
#[derive(Debug, Clone)]
pub struct HttpSearchProvider {
    client: reqwest::Client,
    endpoint: String,
    api_token: String,
}

impl HttpSearchProvider {
    pub fn new(base_url: &str, api_token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GateError::Config(format!("failed to build upstream client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/search", base_url.trim_end_matches('/')),
            api_token: api_token.into(),
        })
    }

    /// Build the provider, or `None` when no API token is configured.
    pub fn from_config(config: &UpstreamConfig) -> Result<Option<Self>> {
        match config.api_token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => {
                info!(base_url = %config.base_url, "Upstream search provider configured");
                Self::new(&config.base_url, token, config.timeout()).map(Some)
            }
            _ => {
                info!("No upstream API token configured, search is disabled");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl SearchProvider for HttpSearchProvider {
    async fn search(&self, query: &SearchQuery) -> Result<serde_json::Value> {
        debug!(endpoint = %self.endpoint, search_type = ?query.search_type, "Forwarding search upstream");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_token)
            .json(query)
            .send()
            .await
            .map_err(|e| GateError::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GateError::Upstream(format!(
                "provider answered with status {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| GateError::Upstream(format!("invalid provider response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use serde_json::json;

    #[test]
    fn test_query_validation() {
        let ok = SearchQuery {
            query: "alice@example.com".to_string(),
            search_type: Some("email".to_string()),
        };
        assert!(ok.validate().is_ok());

        let blank = SearchQuery {
            query: "   ".to_string(),
            search_type: None,
        };
        assert!(matches!(blank.validate(), Err(GateError::BadRequest(_))));

        let long = SearchQuery {
            query: "a".repeat(MAX_QUERY_LEN + 1),
            search_type: None,
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_query_wire_format() {
        let query: SearchQuery =
            serde_json::from_str(r#"{"query": "alice", "type": "username"}"#).unwrap();
        assert_eq!(query.search_type.as_deref(), Some("username"));

        let json = serde_json::to_string(&SearchQuery {
            query: "alice".to_string(),
            search_type: None,
        })
        .unwrap();
        assert_eq!(json, r#"{"query":"alice"}"#);
    }

    #[test]
    fn test_from_config_without_token() {
        let config = UpstreamConfig::default();
        assert!(HttpSearchProvider::from_config(&config).unwrap().is_none());

        let blank = UpstreamConfig {
            api_token: Some("  ".to_string()),
            ..UpstreamConfig::default()
        };
        assert!(HttpSearchProvider::from_config(&blank).unwrap().is_none());
    }

    async fn stub_provider() -> String {
        async fn search(headers: HeaderMap, Json(body): Json<serde_json::Value>) -> (StatusCode, Json<serde_json::Value>) {
            let authorized = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                == Some("Bearer upstream-token");
            if !authorized {
                return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad token"})));
            }
            (StatusCode::OK, Json(json!({"echo": body, "results": []})))
        }

        let app = Router::new().route("/v2/search", post(search));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/v2/", addr)
    }

    #[tokio::test]
    async fn test_forwards_query_with_bearer_token() {
        let base = stub_provider().await;
        let provider =
            HttpSearchProvider::new(&base, "upstream-token", Duration::from_secs(5)).unwrap();

        let result = provider
            .search(&SearchQuery {
                query: "alice".to_string(),
                search_type: Some("username".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(result["echo"]["query"], "alice");
        assert_eq!(result["echo"]["type"], "username");
    }

    #[tokio::test]
    async fn test_error_status_is_upstream_error() {
        let base = stub_provider().await;
        let provider = HttpSearchProvider::new(&base, "wrong", Duration::from_secs(5)).unwrap();

        let err = provider
            .search(&SearchQuery {
                query: "alice".to_string(),
                search_type: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, GateError::Upstream(_)));
    }
}
