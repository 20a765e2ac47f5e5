use std::fmt;

const UNKNOWN_TITLE: &str = "untitled";
const UNKNOWN_ARTIST: &str = "unknown artist";
const UNKNOWN_ALBUM: &str = "unknown album";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Catalog-assigned id. Numeric ids are kept in their decimal form.
    pub id: String,
    pub title: String,
    pub artists: Vec<String>,
    pub album: String,
}

impl Track {
    pub fn display_title(&self) -> &str {
        non_empty_or(&self.title, UNKNOWN_TITLE)
    }

    pub fn display_artists(&self) -> String {
        let names: Vec<&str> = self
            .artists
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .collect();
        if names.is_empty() {
            UNKNOWN_ARTIST.to_string()
        } else {
            names.join("/")
        }
    }

    pub fn display_album(&self) -> &str {
        non_empty_or(&self.album, UNKNOWN_ALBUM)
    }
}

/// `<title> - <artists> [<album>]`
impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} [{}]",
            self.display_title(),
            self.display_artists(),
            self.display_album()
        )
    }
}

/// Optional knobs forwarded to the direct-link endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkOptions {
    pub level: Option<String>,
    pub cookie: Option<String>,
}

impl LinkOptions {
    pub fn new(level: Option<String>, cookie: Option<String>) -> Self {
        Self {
            level: level.filter(|v| !v.trim().is_empty()),
            cookie: cookie.filter(|v| !v.trim().is_empty()),
        }
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() { fallback } else { trimmed }
}
