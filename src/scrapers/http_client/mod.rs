//! HTTP client for direct media downloads.

mod response;

pub use response::{ByteStream, StreamResponse};

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Proxy};
use tracing::debug;

/// Opens streamed GET requests.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn get_stream(&self, url: &str) -> anyhow::Result<StreamResponse>;
}

/// reqwest-backed [`MediaFetcher`].
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client.
    ///
    /// Only the connect phase is bounded; bodies of large assets may take
    /// arbitrarily long to stream.
    pub fn new(
        user_agent: &str,
        connect_timeout: Duration,
        proxy: Option<&str>,
    ) -> anyhow::Result<Self> {
        let mut builder = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(connect_timeout)
            .gzip(true)
            .brotli(true);

        if let Some(proxy_url) = proxy {
            debug!("Routing downloads through proxy {}", proxy_url);
            builder = builder.proxy(Proxy::all(proxy_url)?);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl MediaFetcher for HttpClient {
    async fn get_stream(&self, url: &str) -> anyhow::Result<StreamResponse> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        // Extract response headers
        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.to_string(), v.to_string());
            }
        }
        debug!("GET {} -> {} ({:?} bytes)", url, status, headers.get("content-length"));

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(anyhow::Error::from))
            .boxed();

        Ok(StreamResponse {
            status,
            headers,
            body,
        })
    }
}
