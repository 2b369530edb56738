use url::Url;

/// Hosts whose pages are not worth previewing, usually because the page is a
/// player shell with no useful Open Graph data.
///
/// Entries with a dot match the host or any of its subdomains. Entries
/// without one match any single label of the host, so `youtube` covers
/// `youtube.com`, `m.youtube.com` and `youtube.co.uk`.
const BLACKLISTED_HOSTS: [&str; 7] = [
    "soundcloud",
    "spotify",
    "youtube",
    "youtu.be",
    "y2u.be",
    "giphy",
    "vimeo",
];

#[derive(Debug, Clone)]
pub struct Blacklist {
    hosts: Vec<String>,
}

impl Blacklist {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts
                .into_iter()
                .map(|host| host.into().to_lowercase())
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self { hosts: Vec::new() }
    }

    pub fn is_blacklisted(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_lowercase();

        self.hosts.iter().any(|entry| {
            if entry.contains('.') {
                host == *entry || host.ends_with(&format!(".{entry}"))
            } else {
                host.split('.').any(|label| label == entry)
            }
        })
    }
}

impl Default for Blacklist {
    fn default() -> Self {
        Self::new(BLACKLISTED_HOSTS)
    }
}
