//! Backend / indexer HTTP client.
//!
//! Turns HTTP outcomes into [`FetchError`]s the query client can classify.
//! Every request carries a fresh `x-request-id` and, when configured, a
//! bearer token.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::config::BackendConfig;
use crate::query::FetchError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest error body kept in a [`FetchError::Status`] message.
const MAX_ERROR_BODY: usize = 256;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid backend URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid auth token header")]
    InvalidToken,

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        Url::parse(&config.base_url).map_err(|e| BackendError::InvalidUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;

        let mut headers = HeaderMap::new();
        if let Some(token) = &config.auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| BackendError::InvalidToken)?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn get_json(&self, path: &str) -> Result<Value, FetchError> {
        self.send(self.http.get(self.url(path))).await
    }

    pub async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, FetchError> {
        self.send(self.http.post(self.url(path)).json(body)).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, FetchError> {
        let request_id = Uuid::new_v4().to_string();
        let response = request
            .header(REQUEST_ID_HEADER, &request_id)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        tracing::debug!(
            request_id = %request_id,
            url = %response.url(),
            status = status.as_u16(),
            "Backend response"
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::status(status.as_u16(), error_message(status, &body)));
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }

        let bytes = response.bytes().await.map_err(transport_error)?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

fn transport_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(e.to_string())
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return status.canonical_reason().unwrap_or("unknown status").to_string();
    }
    body.chars().take(MAX_ERROR_BODY).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, token: Option<&str>) -> BackendClient {
        BackendClient::new(&BackendConfig {
            base_url: format!("{}/api/v1/", server.uri()),
            auth_token: token.map(str::to_string),
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_sends_token_and_request_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/certificates"))
            .and(header("authorization", "Bearer secret"))
            .and(header_exists(REQUEST_ID_HEADER))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1 }])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("secret"));
        let value = client.get_json("/certificates").await.unwrap();
        assert_eq!(value, json!([{ "id": 1 }]));
    }

    #[tokio::test]
    async fn test_status_errors_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/certificates"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/unchanged"))
            .respond_with(ResponseTemplate::new(304))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let err = client.post_json("certificates", &json!({ "name": "x" })).await.unwrap_err();
        assert_eq!(err, FetchError::status(403, "forbidden"));

        let err = client.get_json("unchanged").await.unwrap_err();
        assert!(err.is_not_modified());
    }

    #[tokio::test]
    async fn test_empty_body_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        assert_eq!(client.post_json("revoke", &json!({})).await.unwrap(), Value::Null);
    }

    #[test]
    fn test_invalid_base_url() {
        let config = BackendConfig {
            base_url: "not a url".into(),
            ..BackendConfig::default()
        };
        assert!(matches!(BackendClient::new(&config), Err(BackendError::InvalidUrl { .. })));
    }
}
