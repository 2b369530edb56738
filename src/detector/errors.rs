use thiserror::Error;

use crate::fetcher::FetchError;

/// Why no preview was produced for a text.
#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("no link found in text")]
    NoLinkFound,

    #[error("host is blacklisted: {0}")]
    Blacklisted(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}
