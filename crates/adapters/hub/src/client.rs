//! Hand-crafted async HTTP client for the hub's REST API.
//!
//! Endpoints used:
//! - `GET /api/` — liveness/auth probe
//! - `GET /api/states` — full entity enumeration
//! - `POST /api/services/{domain}/{service}` — action execution
//!
//! Auth: `Authorization: Bearer <token>` on every request.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;

use crate::config::HubConfig;
use crate::error::HubApiError;

/// One entity state as the hub reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct HubState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Async client for the hub REST API.
pub struct HubClient {
    http: reqwest::Client,
    base_url: String,
}

impl HubClient {
    /// Build a client with the bearer token installed as a default header.
    ///
    /// # Errors
    ///
    /// Returns [`HubApiError::InvalidBaseUrl`] when the token cannot form a
    /// header value or the HTTP client cannot be constructed.
    pub fn new(config: &HubConfig) -> Result<Self, HubApiError> {
        let mut headers = HeaderMap::new();
        let mut value = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|err| HubApiError::InvalidBaseUrl(err.to_string()))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn check(status: StatusCode) -> Result<(), HubApiError> {
        match status {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(HubApiError::Unauthorized),
            status => Err(HubApiError::Status {
                status: status.as_u16(),
            }),
        }
    }

    /// Probe the API root, verifying reachability and the access token.
    ///
    /// # Errors
    ///
    /// Returns a transport, auth, or status error.
    pub async fn ping(&self) -> Result<(), HubApiError> {
        let response = self.http.get(self.url("/api/")).send().await?;
        Self::check(response.status())
    }

    /// Fetch the full list of entity states.
    ///
    /// # Errors
    ///
    /// Returns a transport, auth, or status error.
    pub async fn states(&self) -> Result<Vec<HubState>, HubApiError> {
        let response = self.http.get(self.url("/api/states")).send().await?;
        Self::check(response.status())?;
        Ok(response.json().await?)
    }

    /// Call a hub service (e.g. `light.turn_on`) against one entity.
    ///
    /// `data` is merged into the payload next to `entity_id`.
    ///
    /// # Errors
    ///
    /// Returns a transport, auth, or status error.
    pub async fn call_service(
        &self,
        domain: &str,
        service: &str,
        entity_id: &str,
        data: serde_json::Value,
    ) -> Result<(), HubApiError> {
        let mut payload = match data {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        payload.insert(
            "entity_id".to_string(),
            serde_json::Value::String(entity_id.to_string()),
        );

        tracing::debug!(domain, service, entity_id, "calling hub service");
        let response = self
            .http
            .post(self.url(&format!("/api/services/{domain}/{service}")))
            .json(&payload)
            .send()
            .await?;
        Self::check(response.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_strip_trailing_slash_from_base_url() {
        let client = HubClient::new(&HubConfig::new("http://hub.local:8123/", "t")).unwrap();
        assert_eq!(client.url("/api/states"), "http://hub.local:8123/api/states");
    }

    #[test]
    fn should_map_unauthorized_status() {
        assert!(matches!(
            HubClient::check(StatusCode::UNAUTHORIZED),
            Err(HubApiError::Unauthorized)
        ));
        assert!(matches!(
            HubClient::check(StatusCode::INTERNAL_SERVER_ERROR),
            Err(HubApiError::Status { status: 500 })
        ));
        assert!(HubClient::check(StatusCode::OK).is_ok());
    }

    #[test]
    fn should_deserialize_state_with_missing_optional_fields() {
        let state: HubState = serde_json::from_str(
            r#"{"entity_id": "light.kitchen", "state": "on"}"#,
        )
        .unwrap();
        assert_eq!(state.entity_id, "light.kitchen");
        assert!(state.attributes.is_empty());
        assert!(state.last_updated.is_none());
    }
}
