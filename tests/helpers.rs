#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use linkpreview::fetcher::{FetchError, ResponseHead, Transfer, Transport};

/// How the fake server answers one URL.
#[derive(Debug, Clone)]
pub struct Script {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub chunks: Vec<Bytes>,
    /// Refuse the connection instead of answering.
    pub refuse: bool,
    /// Stop delivering after this many chunks and never finish.
    pub stall_after: Option<usize>,
}

impl Script {
    pub fn html<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            status: StatusCode::OK,
            content_type: Some("text/html; charset=utf-8".to_string()),
            chunks: chunks
                .into_iter()
                .map(|chunk| Bytes::from(chunk.into()))
                .collect(),
            refuse: false,
            stall_after: None,
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    pub fn refused() -> Self {
        Self {
            refuse: true,
            ..Self::html(Vec::<String>::new())
        }
    }

    pub fn stalling_after(mut self, chunks: usize) -> Self {
        self.stall_after = Some(chunks);
        self
    }
}

/// What the fake server observed.
#[derive(Debug, Default)]
pub struct TransportLog {
    pub started: Mutex<Vec<Url>>,
    pub cancels: AtomicUsize,
    pub chunks_delivered: AtomicUsize,
}

impl TransportLog {
    pub fn starts(&self) -> usize {
        self.started.lock().unwrap().len()
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    pub fn chunks_delivered(&self) -> usize {
        self.chunks_delivered.load(Ordering::SeqCst)
    }
}

/// In-memory [`Transport`] answering from per-URL scripts. Unknown URLs are
/// refused.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<Url, Script>>,
    pub log: Arc<TransportLog>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(self, url: &str, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(Url::parse(url).unwrap(), script);
        self
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn start(&self, url: &Url) -> Result<Box<dyn Transfer>, FetchError> {
        self.log.started.lock().unwrap().push(url.clone());

        let script = self.scripts.lock().unwrap().get(url).cloned();
        let Some(script) = script else {
            return Err(FetchError::Connect(format!("no route to {url}")));
        };
        if script.refuse {
            return Err(FetchError::Connect("connection refused".to_string()));
        }

        Ok(Box::new(ScriptedTransfer {
            head: ResponseHead {
                url_final: url.clone(),
                status: script.status,
                content_type: script.content_type,
            },
            chunks: script.chunks.into(),
            stall_after: script.stall_after,
            delivered: 0,
            cancelled: false,
            log: self.log.clone(),
        }))
    }
}

struct ScriptedTransfer {
    head: ResponseHead,
    chunks: VecDeque<Bytes>,
    stall_after: Option<usize>,
    delivered: usize,
    cancelled: bool,
    log: Arc<TransportLog>,
}

#[async_trait]
impl Transfer for ScriptedTransfer {
    fn head(&self) -> &ResponseHead {
        &self.head
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>, FetchError> {
        if self.cancelled {
            return Ok(None);
        }
        if self.stall_after == Some(self.delivered) {
            std::future::pending::<()>().await;
        }
        // Give other tasks a chance to observe the transfer between chunks.
        tokio::task::yield_now().await;

        let chunk = self.chunks.pop_front();
        if chunk.is_some() {
            self.delivered += 1;
            self.log.chunks_delivered.fetch_add(1, Ordering::SeqCst);
        }
        Ok(chunk)
    }

    fn cancel(&mut self) {
        self.cancelled = true;
        self.log.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// Polls `condition` until it holds, failing the test after a few seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

pub const ARTICLE_HEAD: &str = concat!(
    "<html><head>",
    "<title>Fallback title</title>",
    "<meta property=\"og:type\" content=\"article\">",
    "<meta property=\"og:title\" content=\"Wire is here\">",
    "<meta property=\"og:description\" content=\"Secure messaging for everyone\">",
    "<meta property=\"og:url\" content=\"https://wire.example.com/blog/wire-is-here\">",
    "<meta property=\"og:image\" content=\"https://img.example.com/wire.png\">",
    "</head>",
);
