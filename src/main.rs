use anyhow::{Result, bail};
use linkpreview::{Config, LinkPreviewDetector, ResultsQueue};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let text = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if text.trim().is_empty() {
        bail!("usage: linkpreview <text containing a link>");
    }

    let config = Config::from_env()?;
    let detector = LinkPreviewDetector::from_config(&config, ResultsQueue::spawn("cli"))?;

    match detector.download_preview(&text).await {
        Some(preview) => println!("{}", serde_json::to_string_pretty(&preview)?),
        None => println!("null"),
    }

    Ok(())
}
