pub mod blacklist;
pub mod errors;
pub mod links;

pub use blacklist::Blacklist;
pub use errors::PreviewError;
pub use links::{DetectedLink, detect_links, detect_links_filtered};

use std::ops::Range;
use std::sync::Arc;
use tracing::{Instrument, debug, error, info, info_span, warn};
use url::Url;

use crate::config::Config;
use crate::fetcher::{FetchError, HttpTransport, PreviewDownloader, Transport};
use crate::image::{HttpImageFetcher, ImageFetcher};
use crate::preview::{Preview, assemble};
use crate::queue::ResultsQueue;

/// Finds the first link in a text and builds its preview.
///
/// The preview data comes from the [Open Graph](https://ogp.me) tags in the
/// head of the linked page. Only the first link of a text is looked at, and
/// only the first image of its preview is downloaded.
#[derive(Clone)]
pub struct LinkPreviewDetector {
    blacklist: Arc<Blacklist>,
    downloader: Arc<PreviewDownloader>,
    images: Arc<dyn ImageFetcher>,
    results: ResultsQueue,
}

impl LinkPreviewDetector {
    pub fn new(
        transport: Arc<dyn Transport>,
        images: Arc<dyn ImageFetcher>,
        results: ResultsQueue,
        config: &Config,
    ) -> Self {
        Self {
            blacklist: Arc::new(Blacklist::default()),
            downloader: Arc::new(PreviewDownloader::new(transport, config)),
            images,
            results,
        }
    }

    /// A detector backed by reqwest for both pages and images.
    pub fn from_config(config: &Config, results: ResultsQueue) -> Result<Self, FetchError> {
        let transport = HttpTransport::from_config(config)?;
        let images = HttpImageFetcher::new(transport.client().clone(), config.max_image_bytes());
        Ok(Self::new(
            Arc::new(transport),
            Arc::new(images),
            results,
            config,
        ))
    }

    pub fn with_blacklist(mut self, blacklist: Blacklist) -> Self {
        self.blacklist = Arc::new(blacklist);
        self
    }

    pub fn downloader(&self) -> &PreviewDownloader {
        &self.downloader
    }

    pub fn results_queue(&self) -> &ResultsQueue {
        &self.results
    }

    pub fn contains_link(&self, text: &str) -> bool {
        !detect_links(text).is_empty()
    }

    pub fn contained_links(&self, text: &str) -> Vec<DetectedLink> {
        detect_links(text)
    }

    /// Builds the preview for the first link in `text` and hands it to
    /// `completion` on the results queue. `completion` runs exactly once,
    /// with `None` when there is no preview.
    pub fn extract_preview<C>(&self, text: impl Into<String>, completion: C)
    where
        C: FnOnce(Option<Preview>) + Send + 'static,
    {
        self.extract_preview_filtered(text, |_: &Url, _: Range<usize>, _: &str| true, completion);
    }

    /// Like [`extract_preview`](Self::extract_preview), with `filter` able to
    /// veto individual links before the first one is picked.
    pub fn extract_preview_filtered<F, C>(&self, text: impl Into<String>, filter: F, completion: C)
    where
        F: Fn(&Url, Range<usize>, &str) -> bool + Send + 'static,
        C: FnOnce(Option<Preview>) + Send + 'static,
    {
        let text = text.into();
        let worker = self.clone();
        let results = self.results.clone();

        tokio::spawn(
            async move {
                // The work runs in its own task so that a panic in it still
                // ends in a completion.
                let preview = tokio::spawn(async move {
                    worker.download_preview_filtered(&text, filter).await
                })
                .await
                .unwrap_or_else(|e| {
                    error!(error = %e, "preview task failed");
                    None
                });

                if !results.dispatch(move || completion(preview)) {
                    error!(queue = results.name(), "results queue is gone, completion dropped");
                }
            }
            .instrument(info_span!("extract_preview")),
        );
    }

    pub async fn download_preview(&self, text: &str) -> Option<Preview> {
        self.download_preview_filtered(text, |_: &Url, _: Range<usize>, _: &str| true)
            .await
    }

    pub async fn download_preview_filtered<F>(&self, text: &str, filter: F) -> Option<Preview>
    where
        F: Fn(&Url, Range<usize>, &str) -> bool,
    {
        match self.try_download_preview(text, filter).await {
            Ok(preview) => Some(preview),
            Err(PreviewError::Fetch(e)) if e.is_transfer_failure() => {
                warn!(error = %e, "preview transfer failed");
                None
            }
            Err(PreviewError::Fetch(e @ FetchError::AlreadyInFlight(_))) => {
                warn!(error = %e, "preview request rejected");
                None
            }
            Err(reason) => {
                debug!(%reason, "no preview");
                None
            }
        }
    }

    pub async fn try_download_preview<F>(&self, text: &str, filter: F) -> Result<Preview, PreviewError>
    where
        F: Fn(&Url, Range<usize>, &str) -> bool,
    {
        let link = detect_links_filtered(text, filter)
            .into_iter()
            .next()
            .ok_or(PreviewError::NoLinkFound)?;

        if self.blacklist.is_blacklisted(&link.url) {
            return Err(PreviewError::Blacklisted(
                link.url.host_str().unwrap_or_default().to_string(),
            ));
        }

        let result = self.downloader.try_fetch(&link.url).await?;
        if result.truncated {
            debug!(url = %link.url, "head never closed, preview is best effort");
        }

        let mut preview = assemble(&link, &result);

        if let Some(image_url) = preview.primary_image_url().cloned()
            && let Some(data) = self.images.fetch_image(&image_url).await
        {
            preview.attach_image(data);
        }

        info!(
            url = %link.url,
            images = preview.image_urls.len(),
            image_attached = !preview.image_data().is_empty(),
            "preview assembled"
        );
        Ok(preview)
    }
}
