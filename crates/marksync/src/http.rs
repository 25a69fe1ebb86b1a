//! Transport seam between the API clients and the network.
//!
//! Raindrop and Notion clients never touch reqwest directly: they build an
//! [`HttpRequest`] and hand it to an [`HttpTransport`]. Production code uses
//! [`reqwest_transport::ReqwestTransport`]; unit tests script replies with
//! [`MockTransport`].

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

/// The verbs the two vendor APIs need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered header list. Lookups ignore ASCII case.
pub type HttpHeaders = Vec<(String, String)>;

/// Outgoing request. An empty body is sent without a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

/// Status, headers and raw body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// First value of the named header.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }

    /// 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status / 100 == 2
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    /// Connection, TLS, timeout or body read failure.
    #[error("request could not be completed: {0}")]
    Transport(String),

    #[error("mock transport has no reply queued for {method} {url}")]
    NoMockResponse { method: String, url: String },
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

#[must_use]
pub fn header_get<'a>(headers: &'a HttpHeaders, name: &str) -> Option<&'a str> {
    headers.iter().find_map(|(key, value)| {
        key.eq_ignore_ascii_case(name)
            .then_some(value.as_str())
    })
}

pub mod reqwest_transport {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::{HttpError, HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpTransport};

    impl From<HttpMethod> for reqwest::Method {
        fn from(method: HttpMethod) -> Self {
            match method {
                HttpMethod::Get => reqwest::Method::GET,
                HttpMethod::Post => reqwest::Method::POST,
                HttpMethod::Patch => reqwest::Method::PATCH,
            }
        }
    }

    fn transport_error(err: reqwest::Error) -> HttpError {
        HttpError::Transport(err.to_string())
    }

    /// Sends requests over a shared `reqwest::Client`.
    #[derive(Clone)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new(client: reqwest::Client) -> Self {
            Self { client }
        }

        /// Client with a whole-request timeout, used for both vendor APIs.
        pub fn with_timeout(timeout: Duration) -> Result<Self, HttpError> {
            reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map(Self::new)
                .map_err(transport_error)
        }
    }

    #[async_trait]
    impl HttpTransport for ReqwestTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            let HttpRequest {
                method,
                url,
                headers,
                body,
            } = request;

            let builder = headers.iter().fold(
                self.client.request(method.into(), url.as_str()),
                |builder, (name, value)| builder.header(name.as_str(), value.as_str()),
            );
            let builder = if body.is_empty() {
                builder
            } else {
                builder.body(body)
            };

            let response = builder.send().await.map_err(transport_error)?;
            let status = response.status().as_u16();

            // Non-UTF-8 header values are dropped; none of the callers read them.
            let headers: HttpHeaders = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_owned(), v.to_owned()))
                })
                .collect();

            let body = response.bytes().await.map_err(transport_error)?.to_vec();

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }
}

#[cfg(test)]
pub use mock::MockTransport;

#[cfg(test)]
mod mock {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

    use async_trait::async_trait;

    use super::{HttpError, HttpMethod, HttpRequest, HttpResponse, HttpTransport};

    type Reply = Result<HttpResponse, String>;

    struct Route {
        method: HttpMethod,
        url: String,
        replies: VecDeque<Reply>,
    }

    #[derive(Default)]
    struct Script {
        routes: Vec<Route>,
        sent: Vec<HttpRequest>,
    }

    /// Replays queued replies per method and URL, first in first out, and
    /// keeps every request it was handed.
    #[derive(Clone, Default)]
    pub struct MockTransport {
        script: Arc<Mutex<Script>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        fn script(&self) -> MutexGuard<'_, Script> {
            self.script.lock().unwrap_or_else(PoisonError::into_inner)
        }

        fn enqueue(&self, method: HttpMethod, url: String, reply: Reply) {
            let mut script = self.script();
            match script
                .routes
                .iter_mut()
                .find(|route| route.method == method && route.url == url)
            {
                Some(route) => route.replies.push_back(reply),
                None => script.routes.push(Route {
                    method,
                    url,
                    replies: VecDeque::from([reply]),
                }),
            }
        }

        pub fn push_response(
            &self,
            method: HttpMethod,
            url: impl Into<String>,
            response: HttpResponse,
        ) {
            self.enqueue(method, url.into(), Ok(response));
        }

        /// Queue a JSON body with the given status.
        pub fn push_json(
            &self,
            method: HttpMethod,
            url: impl Into<String>,
            status: u16,
            body: serde_json::Value,
        ) {
            let response = HttpResponse {
                status,
                headers: vec![("content-type".into(), "application/json".into())],
                body: serde_json::to_vec(&body).unwrap_or_default(),
            };
            self.push_response(method, url, response);
        }

        /// Queue a failure that never produced a response.
        pub fn push_transport_error(
            &self,
            method: HttpMethod,
            url: impl Into<String>,
            message: &str,
        ) {
            self.enqueue(method, url.into(), Err(message.to_owned()));
        }

        /// Requests seen so far, oldest first.
        #[must_use]
        pub fn requests(&self) -> Vec<HttpRequest> {
            self.script().sent.clone()
        }
    }

    #[async_trait]
    impl HttpTransport for MockTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            let mut script = self.script();
            let (method, url) = (request.method, request.url.clone());
            script.sent.push(request);

            let reply = script
                .routes
                .iter_mut()
                .find(|route| route.method == method && route.url == url)
                .and_then(|route| route.replies.pop_front());

            match reply {
                Some(reply) => reply.map_err(HttpError::Transport),
                None => Err(HttpError::NoMockResponse {
                    method: method.to_string(),
                    url,
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    const NOTION_PAGES: &str = "https://api.notion.com/v1/pages";

    fn post(url: &str, body: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Post,
            url: url.to_owned(),
            headers: vec![("Notion-Version".into(), "2022-06-28".into())],
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn header_lookup_ignores_case_and_prefers_first() {
        let response = HttpResponse {
            status: 429,
            headers: vec![
                ("Retry-After".into(), "2".into()),
                ("RETRY-AFTER".into(), "30".into()),
            ],
            body: Vec::new(),
        };
        assert_eq!(response.header("retry-after"), Some("2"));
        assert_eq!(response.header("x-ratelimit-remaining"), None);
    }

    #[test]
    fn only_2xx_counts_as_success() {
        let status = |status| HttpResponse {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        };
        assert!(status(200).is_success());
        assert!(status(202).is_success());
        assert!(!status(199).is_success());
        assert!(!status(301).is_success());
        assert!(!status(429).is_success());
    }

    #[test]
    fn method_displays_as_verb() {
        assert_eq!(HttpMethod::Patch.to_string(), "PATCH");
        assert_eq!(format!("{} /pages", HttpMethod::Post), "POST /pages");
    }

    #[tokio::test]
    async fn mock_replays_per_route_in_order_and_records_requests() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Post, NOTION_PAGES, 429, json!({}));
        transport.push_json(HttpMethod::Post, NOTION_PAGES, 200, json!({"id": "p1"}));
        transport.push_json(HttpMethod::Patch, format!("{NOTION_PAGES}/p1"), 200, json!({}));

        let create = post(NOTION_PAGES, r#"{"properties":{}}"#);
        let first = transport.send(create.clone()).await.unwrap();
        let second = transport.send(create.clone()).await.unwrap();

        assert_eq!(first.status, 429);
        assert_eq!(second.status, 200);
        let body: serde_json::Value = serde_json::from_slice(&second.body).unwrap();
        assert_eq!(body["id"], "p1");
        assert_eq!(transport.requests(), vec![create.clone(), create]);
    }

    #[tokio::test]
    async fn mock_transport_error_and_missing_route() {
        let transport = MockTransport::new();
        transport.push_transport_error(HttpMethod::Post, NOTION_PAGES, "connection reset");

        let err = transport.send(post(NOTION_PAGES, "{}")).await.unwrap_err();
        assert!(matches!(err, HttpError::Transport(ref m) if m == "connection reset"));

        // The queue for this route is now drained.
        let err = transport.send(post(NOTION_PAGES, "{}")).await.unwrap_err();
        match err {
            HttpError::NoMockResponse { method, url } => {
                assert_eq!(method, "POST");
                assert_eq!(url, NOTION_PAGES);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn reqwest_transport_reports_bad_urls_as_transport_errors() {
        let transport =
            reqwest_transport::ReqwestTransport::with_timeout(Duration::from_secs(1)).unwrap();
        let err = transport
            .send(HttpRequest {
                method: HttpMethod::Get,
                url: "raindrop without a scheme".to_owned(),
                headers: Vec::new(),
                body: Vec::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::Transport(_)));
    }
}
