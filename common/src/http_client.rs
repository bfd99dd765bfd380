use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Why an upstream GET did not produce a usable body
#[derive(Error, Debug, Clone)]
pub enum UpstreamFailure {
    #[error("upstream responded with HTTP {status}")]
    Status { status: u16, body: Option<Value> },

    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),

    #[error("could not connect to upstream: {0}")]
    Connect(String),

    #[error("upstream payload could not be decoded: {0}")]
    Decode(String),

    #[error("upstream transport error: {0}")]
    Transport(String),
}

impl UpstreamFailure {
    fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            return Self::Timeout(timeout);
        }
        // The URL may carry credentials in its query string.
        let err = err.without_url();
        if err.is_connect() {
            Self::Connect(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// HTTP client that bounds every request by a timeout and never retries
pub struct HttpClient {
    client: Client,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Issue a single GET and decode a successful body as JSON.
    ///
    /// `url` is not recorded on the span; callers log a redacted form themselves.
    #[instrument(skip_all, fields(timeout_ms = self.timeout.as_millis() as u64))]
    pub async fn get_json<T>(&self, url: &str) -> Result<T, UpstreamFailure>
    where
        T: DeserializeOwned,
    {
        let outcome = tokio::time::timeout(self.timeout, self.fetch(url))
            .await
            .map_err(|_elapsed| UpstreamFailure::Timeout(self.timeout))?;

        match &outcome {
            Ok(_) => debug!("Upstream request succeeded"),
            Err(failure) => warn!(error = %failure, "Upstream request failed"),
        }
        outcome
    }

    async fn fetch<T>(&self, url: &str) -> Result<T, UpstreamFailure>
    where
        T: DeserializeOwned,
    {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| UpstreamFailure::from_reqwest(e, self.timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| UpstreamFailure::from_reqwest(e, self.timeout))?;

        if !status.is_success() {
            return Err(UpstreamFailure::Status {
                status: status.as_u16(),
                body: error_body(text),
            });
        }

        serde_json::from_str(&text).map_err(|e| UpstreamFailure::Decode(e.to_string()))
    }
}

/// Error bodies are kept as JSON when they parse, otherwise as plain text.
fn error_body(text: String) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    #[derive(Debug, Deserialize)]
    struct Reading {
        value: i32,
    }

    #[tokio::test]
    async fn decodes_success_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": 7 })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new(Duration::from_secs(2)).unwrap();
        let reading: Reading = client.get_json(&format!("{}/ok", server.uri())).await.unwrap();

        assert_eq!(reading.value, 7);
    }

    #[tokio::test]
    async fn keeps_json_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "cod": "404", "message": "city not found" })),
            )
            .mount(&server)
            .await;

        let client = HttpClient::new(Duration::from_secs(2)).unwrap();
        let failure = client.get_json::<Reading>(&server.uri()).await.unwrap_err();

        match failure {
            UpstreamFailure::Status { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body.unwrap()["message"], "city not found");
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[tokio::test]
    async fn keeps_plain_text_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let client = HttpClient::new(Duration::from_secs(2)).unwrap();
        let failure = client.get_json::<Reading>(&server.uri()).await.unwrap_err();

        assert!(matches!(
            failure,
            UpstreamFailure::Status { status: 502, body: Some(Value::String(ref s)) } if s == "Bad Gateway"
        ));
    }

    #[tokio::test]
    async fn malformed_success_body_is_a_decode_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": true })))
            .mount(&server)
            .await;

        let client = HttpClient::new(Duration::from_secs(2)).unwrap();
        let failure = client.get_json::<Reading>(&server.uri()).await.unwrap_err();

        assert!(matches!(failure, UpstreamFailure::Decode(_)));
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "value": 1 }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = HttpClient::new(Duration::from_millis(100)).unwrap();
        let failure = client.get_json::<Reading>(&server.uri()).await.unwrap_err();

        assert!(matches!(failure, UpstreamFailure::Timeout(_)));
    }

    #[tokio::test]
    async fn refused_connection_is_a_connect_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpClient::new(Duration::from_secs(2)).unwrap();
        let failure = client.get_json::<Reading>(&format!("http://{addr}/")).await.unwrap_err();

        assert!(matches!(failure, UpstreamFailure::Connect(_)));
    }
}
