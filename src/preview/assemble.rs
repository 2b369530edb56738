use crate::detector::DetectedLink;
use crate::fetcher::ScanResult;
use crate::preview::model::{Article, Location, Picture, Preview, PreviewKind, Status};

const TITLE: [&str; 2] = ["og:title", "twitter:title"];
const DESCRIPTION: [&str; 3] = ["og:description", "twitter:description", "description"];
const LATITUDE: [&str; 3] = [
    "place:location:latitude",
    "og:latitude",
    "playfoursquare:location:latitude",
];
const LONGITUDE: [&str; 3] = [
    "place:location:longitude",
    "og:longitude",
    "playfoursquare:location:longitude",
];
const AUTHOR_HANDLE: [&str; 3] = ["twitter:creator", "article:author", "twitter:site"];

const STATUS_TITLE_SUFFIXES: [&str; 2] = [" on Twitter", " on X"];
const QUOTES: [char; 3] = ['“', '”', '"'];

/// The preview variant a document declares through `og:type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewType {
    Article,
    Location,
    Picture,
    Status,
}

impl PreviewType {
    /// Anything missing or unrecognized is an article.
    pub fn from_declared(declared: Option<&str>) -> Self {
        let Some(declared) = declared else {
            return Self::Article;
        };

        match declared.trim().to_lowercase().as_str() {
            "place" | "business.business" | "restaurant.restaurant" | "playfoursquare:venue" => {
                Self::Location
            }
            "photo" | "image" | "instapp:photo" => Self::Picture,
            "status" | "tweet" | "twitter:status" | "social.post" => Self::Status,
            _ => Self::Article,
        }
    }
}

/// Builds the typed preview for `link` from its scanned head data.
pub fn assemble(link: &DetectedLink, result: &ScanResult) -> Preview {
    let preview_type = PreviewType::from_declared(result.get("og:type"));

    let title = result
        .first_of(&TITLE)
        .or(result.title.as_deref())
        .map(str::to_string);
    let description = result.first_of(&DESCRIPTION).map(str::to_string);

    let kind = match preview_type {
        PreviewType::Article => PreviewKind::Article(Article {
            title,
            summary: description,
        }),
        PreviewType::Location => PreviewKind::Location(Location {
            title,
            subtitle: description,
            latitude: coordinate(result, &LATITUDE),
            longitude: coordinate(result, &LONGITUDE),
        }),
        PreviewType::Picture => PreviewKind::Picture(Picture {
            title,
            subtitle: description,
        }),
        PreviewType::Status => PreviewKind::Status(Status {
            message: description.map(|message| strip_quotes(&message)),
            author_handle: result.first_of(&AUTHOR_HANDLE).map(str::to_string),
            author_name: title.map(|name| strip_status_suffix(&name)),
        }),
    };

    Preview::new(
        link.original.clone(),
        link.offset,
        result.permanent_url.clone(),
        result.resolved_url.clone(),
        result.image_urls.clone(),
        kind,
    )
    .with_utf16_offset(link.utf16_offset)
}

fn coordinate(result: &ScanResult, properties: &[&str]) -> Option<f64> {
    result
        .first_of(properties)?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

fn strip_quotes(message: &str) -> String {
    message.trim().trim_matches(QUOTES).trim().to_string()
}

fn strip_status_suffix(name: &str) -> String {
    STATUS_TITLE_SUFFIXES
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .unwrap_or(name)
        .trim()
        .to_string()
}
