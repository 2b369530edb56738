use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::Client;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::Config;
use crate::fetcher::{FetchError, build_client};

/// Downloads the image attached to a preview.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch_image(&self, url: &Url) -> Option<Bytes>;
}

/// [`ImageFetcher`] over reqwest. Refuses non-image responses and bodies
/// larger than the configured cap.
#[derive(Clone)]
pub struct HttpImageFetcher {
    client: Client,
    max_bytes: usize,
}

impl HttpImageFetcher {
    pub fn new(client: Client, max_bytes: usize) -> Self {
        Self { client, max_bytes }
    }

    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        Ok(Self::new(build_client(config)?, config.max_image_bytes()))
    }

    async fn download(&self, url: &Url) -> Result<Bytes, FetchError> {
        let mut response = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "image/*")
            .send()
            .await
            .map_err(FetchError::from_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http { status });
        }

        if let Some(content_type) = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            && !content_type.to_lowercase().starts_with("image/")
        {
            return Err(FetchError::UnsupportedContentType(content_type.to_string()));
        }

        if let Some(content_length) = response.content_length()
            && content_length > self.max_bytes as u64
        {
            return Err(FetchError::Io(format!(
                "image too large ({content_length} bytes)"
            )));
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(FetchError::from_reqwest_error)?
        {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(FetchError::Io(format!(
                    "image exceeds {} bytes",
                    self.max_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }

        if body.is_empty() {
            return Err(FetchError::Io("empty image body".to_string()));
        }
        Ok(body.freeze())
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    #[instrument(skip_all, fields(url = %url))]
    async fn fetch_image(&self, url: &Url) -> Option<Bytes> {
        match self.download(url).await {
            Ok(data) => {
                debug!(size = data.len(), "image downloaded");
                Some(data)
            }
            Err(e) => {
                warn!(error = %e, "image download failed");
                None
            }
        }
    }
}
