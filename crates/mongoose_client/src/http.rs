//! HTTP client abstraction.
//!
//! The transport only needs one capability: send a request, get back a
//! status and a body. That capability is a trait so the production client
//! (reqwest), in-process loopback servers and test doubles are
//! interchangeable.

use async_trait::async_trait;
use mongoose_protocol::{Method, Params};

/// An outgoing gateway request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL, without query string.
    pub url: String,
    /// Parameters: query string for GET, form body for POST.
    pub params: Params,
}

/// A raw gateway response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

impl HttpResponse {
    /// Creates a `200 OK` response with the given body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport.
/// Network-level failures are reported as `Err` with a description;
/// non-2xx answers are `Ok` and left for the transport to judge.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String>;
}

#[cfg(feature = "reqwest")]
pub use self::reqwest_client::ReqwestClient;

#[cfg(feature = "reqwest")]
mod reqwest_client {
    use super::{HttpClient, HttpRequest, HttpResponse};
    use crate::error::{ClientError, ClientResult};
    use async_trait::async_trait;
    use mongoose_protocol::Method;
    use reqwest::header::ACCEPT;
    use reqwest::Client;

    /// [`HttpClient`] backed by `reqwest`.
    #[derive(Debug, Clone)]
    pub struct ReqwestClient {
        client: Client,
    }

    impl ReqwestClient {
        /// Creates a client with the crate's user agent.
        pub fn new() -> ClientResult<Self> {
            let client = Client::builder()
                .user_agent(concat!("mongoose-client/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| ClientError::transport(e.to_string()))?;
            Ok(Self { client })
        }

        /// Wraps an existing `reqwest` client.
        pub fn with_client(client: Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl HttpClient for ReqwestClient {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
            let builder = match request.method {
                Method::Get => self.client.get(&request.url).query(&request.params),
                Method::Post => self.client.post(&request.url).form(&request.params),
            };

            let response = builder
                .header(ACCEPT, "application/json")
                .send()
                .await
                .map_err(|e| e.to_string())?;

            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| e.to_string())?;
            Ok(HttpResponse { status, body })
        }
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer {
    /// Handles a request for `path` and returns the response.
    fn handle(&self, method: Method, path: &str, params: &Params) -> HttpResponse;
}

/// A loopback HTTP client that routes requests directly to a server.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// Returns the server behind this client.
    pub fn server(&self) -> &S {
        &self.server
    }
}

/// Returns the path part of an absolute URL (`/` if there is none).
pub(crate) fn path_of(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.find('/').map_or("/", |i| &rest[i..])
}

#[async_trait]
impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        Ok(self
            .server
            .handle(request.method, path_of(&request.url), &request.params))
    }
}
