use dashmap::{DashMap, mapref::entry::Entry};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::Config;
use crate::fetcher::{
    client::{Transfer, Transport},
    errors::FetchError,
    pipeline::{accepts_content_type, build_scan_result, header_encoding},
    types::{ScanResult, TransferId},
};
use crate::scanner::{HeadState, ScanBuffer};

/// Downloads just enough of a document to read its head, then cancels the
/// transfer.
///
/// At most one transfer per URL runs at a time. A second request for a URL
/// that is still in flight is rejected with [`FetchError::AlreadyInFlight`].
pub struct PreviewDownloader {
    transport: Arc<dyn Transport>,
    in_flight: DashMap<Url, InFlight>,
    max_head_bytes: usize,
    transfer_timeout: Duration,
}

#[derive(Debug)]
struct InFlight {
    id: TransferId,
    cancel: CancellationToken,
}

/// Removes a transfer's entry from the in-flight table when dropped.
///
/// Removal matches on the transfer id, so it only ever clears its own entry
/// and running it on several exit paths cannot clear a newer transfer.
struct InFlightGuard<'a> {
    table: &'a DashMap<Url, InFlight>,
    url: Url,
    id: TransferId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.table.remove_if(&self.url, |_, entry| entry.id == self.id);
    }
}

impl PreviewDownloader {
    pub fn new(transport: Arc<dyn Transport>, config: &Config) -> Self {
        Self::with_limits(transport, config.max_head_bytes(), config.transfer_timeout())
    }

    pub fn with_limits(
        transport: Arc<dyn Transport>,
        max_head_bytes: usize,
        transfer_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            in_flight: DashMap::new(),
            max_head_bytes,
            transfer_timeout,
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_in_flight(&self, url: &Url) -> bool {
        self.in_flight.contains_key(url)
    }

    /// Cancels the transfer for `url` from outside. The pending fetch
    /// completes with no result. Returns false when nothing was in flight.
    pub fn cancel(&self, url: &Url) -> bool {
        match self.in_flight.get(url) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Fetches the Open Graph data for `url`, or `None` when there is none to
    /// be had. Failures are logged, never returned.
    pub async fn fetch(&self, url: &Url) -> Option<ScanResult> {
        match self.try_fetch(url).await {
            Ok(result) => Some(result),
            Err(FetchError::AlreadyInFlight(url)) => {
                warn!(%url, "rejected duplicate request for a url already in flight");
                None
            }
            Err(e) if e.is_transfer_failure() => {
                warn!(%url, error = %e, "transfer failed");
                None
            }
            Err(e) => {
                debug!(%url, reason = %e, "no preview data");
                None
            }
        }
    }

    #[instrument(skip_all, fields(url = %url))]
    pub async fn try_fetch(&self, url: &Url) -> Result<ScanResult, FetchError> {
        let (id, token) = self.register(url)?;
        let _guard = InFlightGuard {
            table: &self.in_flight,
            url: url.clone(),
            id,
        };
        debug!(transfer = %id, "starting transfer");

        match tokio::time::timeout(self.transfer_timeout, self.run_transfer(url, &token)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(FetchError::RequestTimeout),
        }
    }

    fn register(&self, url: &Url) -> Result<(TransferId, CancellationToken), FetchError> {
        match self.in_flight.entry(url.clone()) {
            Entry::Occupied(_) => Err(FetchError::AlreadyInFlight(url.clone())),
            Entry::Vacant(vacant) => {
                let id = TransferId::new();
                let token = CancellationToken::new();
                vacant.insert(InFlight {
                    id,
                    cancel: token.clone(),
                });
                Ok((id, token))
            }
        }
    }

    async fn run_transfer(
        &self,
        url: &Url,
        token: &CancellationToken,
    ) -> Result<ScanResult, FetchError> {
        let started = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            started = self.transport.start(url) => Some(started),
        };
        let mut transfer = started.ok_or(FetchError::Cancelled)??;
        let head = transfer.head().clone();

        if !head.status.is_success() {
            transfer.cancel();
            return Err(FetchError::Http {
                status: head.status,
            });
        }

        if !accepts_content_type(head.content_type.as_deref()) {
            transfer.cancel();
            return Err(FetchError::UnsupportedContentType(
                head.content_type.unwrap_or_default(),
            ));
        }

        let mut buffer = ScanBuffer::new(self.max_head_bytes);
        if let Some(encoding) = header_encoding(&head) {
            buffer = buffer.with_encoding(encoding);
        }
        let mut received = 0usize;

        loop {
            let chunk = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                chunk = transfer.next_chunk() => Some(chunk),
            };
            let Some(chunk) = chunk else {
                transfer.cancel();
                return Err(FetchError::Cancelled);
            };

            match chunk? {
                Some(bytes) => {
                    received += bytes.len();
                    if buffer.append(&bytes) == HeadState::Complete {
                        stop_early(transfer.as_mut(), received);
                        break;
                    }
                }
                None => {
                    buffer.finish();
                    break;
                }
            }
        }

        if buffer.reached_limit() {
            debug!(
                limit = self.max_head_bytes,
                "head never closed, using the metadata collected so far"
            );
        }

        build_scan_result(&head, buffer)
    }
}

fn stop_early(transfer: &mut dyn Transfer, received: usize) {
    debug!(received, "head complete, cancelling the rest of the transfer");
    transfer.cancel();
}
