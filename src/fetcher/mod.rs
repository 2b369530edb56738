pub mod client;
pub mod downloader;
pub mod errors;
pub mod pipeline;
pub mod types;

pub use client::{HttpTransport, Transfer, Transport, build_client};
pub use downloader::PreviewDownloader;
pub use errors::FetchError;
pub use types::{ResponseHead, ScanResult, TransferId};
