use bytes::Bytes;
use serde::Serialize;
use url::Url;

/// A link preview for one URL found in a text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preview {
    /// The URL exactly as it appeared in the text.
    pub original_url: String,
    /// Offset of `original_url` in the text, in Unicode scalar values.
    pub offset: usize,
    /// Offset of `original_url` in UTF-16 code units, for callers that index
    /// text the way NSString or JavaScript do.
    pub utf16_offset: usize,
    pub permanent_url: Url,
    pub resolved_url: Url,
    pub image_urls: Vec<Url>,
    #[serde(skip)]
    image_data: Vec<Bytes>,
    #[serde(flatten)]
    pub kind: PreviewKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PreviewKind {
    Article(Article),
    Location(Location),
    Picture(Picture),
    Status(Status),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Article {
    pub title: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Location {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Picture {
    pub title: Option<String>,
    pub subtitle: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Status {
    pub message: Option<String>,
    pub author_handle: Option<String>,
    pub author_name: Option<String>,
}

impl Preview {
    pub fn new(
        original_url: impl Into<String>,
        offset: usize,
        permanent_url: Url,
        resolved_url: Url,
        image_urls: Vec<Url>,
        kind: PreviewKind,
    ) -> Self {
        Self {
            original_url: original_url.into(),
            offset,
            utf16_offset: offset,
            permanent_url,
            resolved_url,
            image_urls,
            image_data: Vec::new(),
            kind,
        }
    }

    /// Sets the UTF-16 offset. [`Preview::new`] assumes it equals `offset`,
    /// which holds unless the text before the link has astral characters.
    pub fn with_utf16_offset(mut self, utf16_offset: usize) -> Self {
        self.utf16_offset = utf16_offset;
        self
    }

    pub fn primary_image_url(&self) -> Option<&Url> {
        self.image_urls.first()
    }

    pub fn image_data(&self) -> &[Bytes] {
        &self.image_data
    }

    /// Attaches the downloaded primary image. Only one image is ever kept;
    /// returns false if one was attached already.
    pub fn attach_image(&mut self, data: Bytes) -> bool {
        if !self.image_data.is_empty() {
            return false;
        }
        self.image_data.push(data);
        true
    }

    /// The headline of the preview, whatever its kind.
    pub fn title(&self) -> Option<&str> {
        match &self.kind {
            PreviewKind::Article(article) => article.title.as_deref(),
            PreviewKind::Location(location) => location.title.as_deref(),
            PreviewKind::Picture(picture) => picture.title.as_deref(),
            PreviewKind::Status(status) => status.author_name.as_deref(),
        }
    }
}
