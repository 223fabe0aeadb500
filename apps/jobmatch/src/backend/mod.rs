//! Backend client: the single point of entry for all calls to the jobs API.
//!
//! Every request goes through `BackendClient::send`, which attaches the session
//! token and classifies failures into `ClientError`. No other module talks to
//! reqwest directly. There is no retry loop here: the resolver's single
//! fallback is the only second attempt a match request ever gets.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::ClientError;

pub mod jobs;
pub mod resume;

pub use self::jobs::{HttpJobActions, JobActions};
pub use self::resume::ActiveResumeSource;

/// Longest error body carried into a `ClientError::Server` message.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "detail")]
    error: String,
}

/// List responses arrive either bare or wrapped in a paginated envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Page { results: Vec<T> },
    Bare(Vec<T>),
}

impl<T> Listing<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Page { results } => results,
            Listing::Bare(items) => items,
        }
    }
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl BackendClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends a request and turns every non-success outcome into a `ClientError`.
    async fn send(&self, builder: RequestBuilder) -> Result<Response, ClientError> {
        let response = builder.send().await.map_err(classify_transport)?;
        let status = response.status();

        if status.is_success() {
            debug!("{} {}", status.as_u16(), response.url().path());
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!("Jobs API returned {status}: {}", truncate(&body));
        Err(classify_status(status, &body))
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let response = self.send(self.request(Method::GET, path).query(query)).await?;
        let status = response.status().as_u16();
        response.json::<T>().await.map_err(|e| ClientError::Server {
            status,
            message: format!("Unexpected response body: {e}"),
        })
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<(), ClientError> {
        let mut builder = self.request(Method::POST, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        self.send(builder).await.map(|_| ())
    }

    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.send(self.request(Method::DELETE, path)).await.map(|_| ())
    }
}

fn classify_transport(e: reqwest::Error) -> ClientError {
    if let Some(status) = e.status() {
        return classify_status(status, "");
    }
    if e.is_decode() {
        return ClientError::Server {
            status: 200,
            message: format!("Unexpected response body: {e}"),
        };
    }
    ClientError::Network(e.to_string())
}

fn classify_status(status: StatusCode, body: &str) -> ClientError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Auth,
        _ => {
            let message = match serde_json::from_str::<ErrorBody>(body) {
                Ok(parsed) => truncate(&parsed.error).to_string(),
                Err(_) => truncate(body).to_string(),
            };
            ClientError::Server {
                status: status.as_u16(),
                message,
            }
        }
    }
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> BackendClient {
        BackendClient::new(
            &server.uri(),
            Some("tok-123".to_string()),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_classify_auth_statuses() {
        assert_eq!(classify_status(StatusCode::UNAUTHORIZED, ""), ClientError::Auth);
        assert_eq!(classify_status(StatusCode::FORBIDDEN, ""), ClientError::Auth);
    }

    #[test]
    fn test_classify_server_error_uses_error_body() {
        let err = classify_status(
            StatusCode::SERVICE_UNAVAILABLE,
            r#"{"error": "matcher offline"}"#,
        );
        assert_eq!(
            err,
            ClientError::Server {
                status: 503,
                message: "matcher offline".to_string()
            }
        );
    }

    #[test]
    fn test_truncate_long_bodies() {
        let body = "x".repeat(MAX_ERROR_BODY + 10);
        assert_eq!(truncate(&body).len(), MAX_ERROR_BODY);
        assert_eq!(truncate("short"), "short");
    }

    #[test]
    fn test_long_error_message_in_json_body_is_truncated() {
        let body = json!({"detail": "y".repeat(MAX_ERROR_BODY * 2)}).to_string();
        match classify_status(StatusCode::BAD_GATEWAY, &body) {
            ClientError::Server { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "y".repeat(MAX_ERROR_BODY));
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[test]
    fn test_listing_accepts_both_shapes() {
        let page: Listing<u32> = serde_json::from_value(json!({"results": [1, 2]})).unwrap();
        let bare: Listing<u32> = serde_json::from_value(json!([3])).unwrap();
        assert_eq!(page.into_vec(), vec![1, 2]);
        assert_eq!(bare.into_vec(), vec![3]);
    }

    #[tokio::test]
    async fn test_get_json_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cv/active/"))
            .and(header("authorization", "Bearer tok-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "cv_v1"})))
            .expect(1)
            .mount(&server)
            .await;

        let body: serde_json::Value = client_for(&server)
            .get_json("cv/active/", &[])
            .await
            .unwrap();
        assert_eq!(body["id"], "cv_v1");
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_auth() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/applications/a1/"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .delete("applications/a1/")
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::Auth);
    }

    #[tokio::test]
    async fn test_unreachable_host_maps_to_network() {
        // Port 9 (discard) on localhost is not listening in test environments
        let client = BackendClient::new("http://127.0.0.1:9", None, Duration::from_secs(2));
        let err = client.delete("applications/a1/").await.unwrap_err();
        assert!(matches!(err, ClientError::Network(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_undecodable_body_is_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs/ai-match/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .get_json::<serde_json::Value>("jobs/ai-match/", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Server { status: 200, .. }));
    }
}
