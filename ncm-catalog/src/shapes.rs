//! Normalization of the catalog's response bodies.
//!
//! Deployments of the catalog API disagree on where they put things, so each
//! lookup is an ordered list of extraction strategies; the first one that
//! yields something wins.

use crate::types::Track;
use serde_json::Value;

/// Where a search response keeps its song list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SongListShape {
    /// `{ "songs": [...] }`
    TopLevel,
    /// `{ "result": { "songs": [...] } }`
    UnderResult,
    /// `{ "data": { "songs": [...] } }`
    UnderData,
}

impl SongListShape {
    pub const PRIORITY: [Self; 3] = [Self::TopLevel, Self::UnderResult, Self::UnderData];

    fn songs(self, body: &Value) -> Option<&Vec<Value>> {
        let container = match self {
            Self::TopLevel => body,
            Self::UnderResult => body.get("result")?,
            Self::UnderData => body.get("data")?,
        };
        container.get("songs")?.as_array()
    }
}

/// Field names that may hold the direct link inside a link entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkField {
    Url,
    Data,
    Mp3,
}

impl LinkField {
    pub const PRIORITY: [Self; 3] = [Self::Url, Self::Data, Self::Mp3];

    fn key(self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Data => "data",
            Self::Mp3 => "mp3",
        }
    }
}

pub fn extract_tracks(body: &Value) -> Vec<Track> {
    let Some((shape, songs)) = SongListShape::PRIORITY
        .iter()
        .find_map(|shape| shape.songs(body).filter(|s| !s.is_empty()).map(|s| (shape, s)))
    else {
        return Vec::new();
    };
    tracing::trace!(?shape, count = songs.len(), "matched song list shape");
    songs.iter().filter_map(parse_track).collect()
}

pub fn extract_link(body: &Value) -> Option<String> {
    let entry = match body.get("data")? {
        Value::Array(items) => items.first()?,
        Value::String(link) => return non_empty(link),
        other => other,
    };
    LinkField::PRIORITY
        .iter()
        .find_map(|field| entry.get(field.key()).and_then(Value::as_str).and_then(non_empty))
}

fn parse_track(song: &Value) -> Option<Track> {
    let id = match song.get("id")? {
        Value::Number(n) => n.to_string(),
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => return None,
    };
    let title = first_str(song, &["name", "title"]).unwrap_or_default();
    let artists = first_present(song, &["artists", "ar"])
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(name_of).collect())
        .unwrap_or_default();
    let album = first_present(song, &["album", "al"])
        .and_then(name_of)
        .unwrap_or_default();

    Some(Track {
        id,
        title,
        artists,
        album,
    })
}

/// Artist and album entries come either as `{ "name": .. }` objects or bare strings.
fn name_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(_) => value.get("name").and_then(Value::as_str).map(str::to_owned),
        _ => None,
    }
}

fn first_present<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|k| value.get(*k).filter(|v| !v.is_null()))
}

fn first_str(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .map(str::to_owned)
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
