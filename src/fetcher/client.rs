use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, ClientBuilder, Response};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::config::Config;
use crate::fetcher::{errors::FetchError, types::ResponseHead};

/// Starts transfers. The returned [`Transfer`] has already received the
/// response header; the body is pulled chunk by chunk.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn start(&self, url: &Url) -> Result<Box<dyn Transfer>, FetchError>;
}

/// One in-flight response body.
#[async_trait]
pub trait Transfer: Send {
    fn head(&self) -> &ResponseHead;

    /// Next body chunk, `None` once the body is exhausted or the transfer was
    /// cancelled.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, FetchError>;

    /// Stops the transfer. No further chunks are delivered and no error is
    /// raised for it.
    fn cancel(&mut self);
}

pub fn build_client(config: &Config) -> Result<Client, FetchError> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
    );

    ClientBuilder::new()
        .connect_timeout(config.connect_timeout())
        .timeout(config.transfer_timeout())
        .user_agent(config.user_agent())
        .redirect(reqwest::redirect::Policy::limited(10))
        .default_headers(headers)
        .build()
        .map_err(FetchError::from_reqwest_error)
}

/// [`Transport`] over a shared reqwest client.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        Ok(Self::new(build_client(config)?))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip_all, fields(url = %url))]
    async fn start(&self, url: &Url) -> Result<Box<dyn Transfer>, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(FetchError::from_reqwest_error)?;

        let head = ResponseHead {
            url_final: response.url().clone(),
            status: response.status(),
            content_type: response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|ct| ct.to_str().ok())
                .map(str::to_string),
        };
        debug!(status = %head.status, content_type = ?head.content_type, "response header received");

        Ok(Box::new(HttpTransfer {
            head,
            response: Some(response),
        }))
    }
}

struct HttpTransfer {
    head: ResponseHead,
    response: Option<Response>,
}

#[async_trait]
impl Transfer for HttpTransfer {
    fn head(&self) -> &ResponseHead {
        &self.head
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>, FetchError> {
        let Some(response) = self.response.as_mut() else {
            return Ok(None);
        };
        response.chunk().await.map_err(FetchError::from_reqwest_error)
    }

    fn cancel(&mut self) {
        // Dropping the response closes the connection (or resets the stream)
        // without reading the rest of the body.
        self.response = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client_from_default_config() {
        assert!(build_client(&Config::default()).is_ok());
    }
}
