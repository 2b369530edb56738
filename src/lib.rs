pub mod config;
pub mod detector;
pub mod fetcher;
pub mod image;
pub mod preview;
pub mod queue;
pub mod scanner;

pub use config::Config;
pub use detector::LinkPreviewDetector;
pub use preview::{Preview, PreviewKind};
pub use queue::ResultsQueue;
