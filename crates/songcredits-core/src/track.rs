//! Track model shared by every provider.
//!
//! A [`Track`] is built fresh on every successful fetch and never mutated
//! afterwards. Field identifiers are matched case-insensitively; identifiers
//! that are not well-known are kept as opaque string pairs.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Playback state reported by a provider
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    EnumString,
    IntoStaticStr,
    Display,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
    #[default]
    Stopped,
}

/// Well-known metadata fields
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumString,
    IntoStaticStr,
    Display,
    EnumIter,
)]
pub enum Field {
    #[strum(serialize = "title")]
    Title,
    #[strum(to_string = "artists", serialize = "artist")]
    Artist,
    #[strum(serialize = "album")]
    Album,
    #[strum(serialize = "release_date")]
    Release,
    #[strum(serialize = "release_day")]
    ReleaseDay,
    #[strum(serialize = "release_month")]
    ReleaseMonth,
    #[strum(serialize = "release_year")]
    ReleaseYear,
    #[strum(serialize = "cover_path")]
    Cover,
    #[strum(serialize = "lyrics")]
    Lyrics,
    #[strum(serialize = "duration")]
    Duration,
    #[strum(serialize = "explicit")]
    Explicit,
    #[strum(serialize = "disc_number")]
    DiscNumber,
    #[strum(serialize = "track_number")]
    TrackNumber,
    #[strum(serialize = "status_id")]
    Status,
    #[strum(serialize = "record_label")]
    Label,
    #[strum(serialize = "file_name")]
    FileName,
    #[strum(serialize = "genre")]
    Genre,
    #[strum(serialize = "copyright")]
    Copyright,
    #[strum(serialize = "description")]
    Description,
    #[strum(serialize = "rating")]
    Rating,
    #[strum(serialize = "date")]
    Date,
    #[strum(serialize = "url")]
    Url,
    #[strum(serialize = "language")]
    Language,
    #[strum(serialize = "publisher")]
    Publisher,
    #[strum(serialize = "artwork_url")]
    ArtworkUrl,
    #[strum(serialize = "track_total")]
    TrackTotal,
    #[strum(serialize = "actors")]
    Actors,
    #[strum(serialize = "disc_total")]
    DiscTotal,
    #[strum(serialize = "encoded_by")]
    EncodedBy,
}

impl Field {
    /// Canonical identifier used in templates (e.g. `"artists"`)
    pub fn id(&self) -> &'static str {
        self.into()
    }

    /// Resolve an identifier (case-insensitive) to a well-known field
    pub fn resolve(id: &str) -> Option<Self> {
        Self::from_str(&id.to_lowercase()).ok()
    }
}

/// Metadata of the item currently playing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Track {
    known: BTreeMap<Field, String>,
    extra: BTreeMap<String, String>,
}

impl Track {
    pub fn builder() -> TrackBuilder {
        TrackBuilder::default()
    }

    /// Look up a value by identifier, case-insensitively
    pub fn get(&self, id: &str) -> Option<&str> {
        let id = id.to_lowercase();
        match Field::from_str(&id) {
            Ok(field) => self.known.get(&field),
            Err(_) => self.extra.get(&id),
        }
        .map(String::as_str)
    }

    pub fn field(&self, field: Field) -> Option<&str> {
        self.known.get(&field).map(String::as_str)
    }

    pub fn has(&self, field: Field) -> bool {
        self.known.contains_key(&field)
    }

    pub fn title(&self) -> Option<&str> {
        self.field(Field::Title)
    }

    pub fn artist(&self) -> Option<&str> {
        self.field(Field::Artist)
    }

    /// URL of the cover image, preferring `cover_path` over `artwork_url`
    pub fn cover_url(&self) -> Option<&str> {
        self.field(Field::Cover).or_else(|| self.field(Field::ArtworkUrl))
    }

    /// All fields as `(identifier, value)` pairs, well-known fields first
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.known
            .iter()
            .map(|(field, value)| (field.id(), value.as_str()))
            .chain(self.extra.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    pub fn len(&self) -> usize {
        self.known.len() + self.extra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short human readable description for logs
    pub fn describe(&self) -> String {
        match (self.artist(), self.title()) {
            (Some(artist), Some(title)) => format!("{} - {}", artist, title),
            (None, Some(title)) => title.to_string(),
            _ => self
                .field(Field::FileName)
                .unwrap_or("<untitled>")
                .to_string(),
        }
    }
}

/// Builder for [`Track`]
#[derive(Debug, Clone, Default)]
pub struct TrackBuilder {
    track: Track,
}

impl TrackBuilder {
    /// Set a well-known field
    pub fn field(mut self, field: Field, value: impl Into<String>) -> Self {
        self.track.known.insert(field, value.into());
        self
    }

    /// Set a field by identifier, keeping unknown identifiers as extra fields
    pub fn insert(mut self, id: &str, value: impl Into<String>) -> Self {
        let id = id.to_lowercase();
        match Field::from_str(&id) {
            Ok(field) => {
                self.track.known.insert(field, value.into());
            }
            Err(_) => {
                self.track.extra.insert(id, value.into());
            }
        }
        self
    }

    pub fn has(&self, field: Field) -> bool {
        self.track.has(field)
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.track.field(field)
    }

    /// Value of a provider-specific field
    pub fn get_extra(&self, id: &str) -> Option<&str> {
        self.track.extra.get(&id.to_lowercase()).map(String::as_str)
    }

    pub fn build(self) -> Track {
        self.track
    }
}
