//! Spotify Web API response types and their mapping onto [`Track`].

use serde::Deserialize;

use crate::track::{Field, PlaybackState, Track};

/// `GET /v1/me/player/currently-playing`
#[derive(Debug, Deserialize)]
pub(super) struct CurrentlyPlaying {
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub item: Option<ItemRef>,
    #[serde(default)]
    pub actions: Option<Actions>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ItemRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct Actions {
    #[serde(default)]
    pub disallows: Disallows,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct Disallows {
    #[serde(default)]
    pub pausing: bool,
}

impl CurrentlyPlaying {
    fn pausing_disallowed(&self) -> bool {
        self.actions
            .as_ref()
            .is_some_and(|actions| actions.disallows.pausing)
    }

    /// Map the player flags to a playback state.
    ///
    /// Spotify has no explicit "paused" flag. A player that is not playing
    /// but refuses a pause command is taken to be paused; this is a heuristic.
    pub fn state(&self, count_paused_as_stopped: bool) -> PlaybackState {
        if self.is_playing {
            PlaybackState::Playing
        } else if !count_paused_as_stopped && self.pausing_disallowed() {
            PlaybackState::Paused
        } else {
            PlaybackState::Stopped
        }
    }
}

/// `GET /v1/tracks/{id}`
#[derive(Debug, Deserialize)]
pub(super) struct TrackObject {
    pub name: String,
    #[serde(default)]
    pub artists: Vec<Named>,
    #[serde(default)]
    pub album: Option<Album>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub explicit: bool,
    #[serde(default)]
    pub disc_number: Option<u32>,
    #[serde(default)]
    pub track_number: Option<u32>,
    #[serde(default)]
    pub external_urls: Option<ExternalUrls>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Named {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct Album {
    pub name: String,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub total_tracks: Option<u32>,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Image {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ExternalUrls {
    #[serde(default)]
    pub spotify: Option<String>,
}

impl TrackObject {
    pub fn into_track(self) -> Track {
        let mut builder = Track::builder()
            .field(Field::Title, self.name.clone())
            .field(Field::FileName, self.name)
            .field(Field::Explicit, if self.explicit { "Yes" } else { "No" });

        if !self.artists.is_empty() {
            let artists: Vec<&str> = self.artists.iter().map(|a| a.name.as_str()).collect();
            builder = builder.field(Field::Artist, artists.join(", "));
        }
        if let Some(duration) = self.duration_ms {
            builder = builder.field(Field::Duration, (duration / 1000).to_string());
        }
        if let Some(disc) = self.disc_number {
            builder = builder.field(Field::DiscNumber, disc.to_string());
        }
        if let Some(number) = self.track_number {
            builder = builder.field(Field::TrackNumber, number.to_string());
        }
        if let Some(url) = self.external_urls.and_then(|urls| urls.spotify) {
            builder = builder.field(Field::Url, url);
        }

        if let Some(album) = self.album {
            builder = builder.field(Field::Album, album.name);
            if let Some(total) = album.total_tracks {
                builder = builder.field(Field::TrackTotal, total.to_string());
            }
            if let Some(date) = album.release_date.filter(|d| !d.is_empty()) {
                let mut parts = date.split('-');
                let fields = [Field::ReleaseYear, Field::ReleaseMonth, Field::ReleaseDay];
                for field in fields {
                    match parts.next() {
                        Some(part) => builder = builder.field(field, part),
                        None => break,
                    }
                }
                builder = builder.field(Field::Release, date);
            }
            let largest = album
                .images
                .into_iter()
                .max_by_key(|image| image.width.unwrap_or(0) * image.height.unwrap_or(0));
            if let Some(image) = largest {
                builder = builder
                    .field(Field::ArtworkUrl, image.url.clone())
                    .field(Field::Cover, image.url);
            }
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACK: &str = r#"{
        "id": "4uLU6hMCjMI75M1A2tKUQC",
        "name": "Never Gonna Give You Up",
        "artists": [{"name": "Rick Astley"}, {"name": "Someone Else"}],
        "album": {
            "name": "Whenever You Need Somebody",
            "release_date": "1987-11-12",
            "total_tracks": 10,
            "images": [
                {"url": "https://i.scdn.co/small", "width": 64, "height": 64},
                {"url": "https://i.scdn.co/large", "width": 640, "height": 640},
                {"url": "https://i.scdn.co/medium", "width": 300, "height": 300}
            ]
        },
        "duration_ms": 213573,
        "explicit": false,
        "disc_number": 1,
        "track_number": 1,
        "external_urls": {"spotify": "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC"}
    }"#;

    #[test]
    fn test_track_mapping() {
        let object: TrackObject = serde_json::from_str(TRACK).unwrap();
        let track = object.into_track();

        assert_eq!(track.title(), Some("Never Gonna Give You Up"));
        assert_eq!(track.artist(), Some("Rick Astley, Someone Else"));
        assert_eq!(track.get("album"), Some("Whenever You Need Somebody"));
        assert_eq!(track.get("release_date"), Some("1987-11-12"));
        assert_eq!(track.get("release_year"), Some("1987"));
        assert_eq!(track.get("release_month"), Some("11"));
        assert_eq!(track.get("release_day"), Some("12"));
        assert_eq!(track.get("duration"), Some("213"));
        assert_eq!(track.get("explicit"), Some("No"));
        assert_eq!(track.get("disc_number"), Some("1"));
        assert_eq!(track.get("track_total"), Some("10"));
        assert_eq!(track.get("cover_path"), Some("https://i.scdn.co/large"));
        assert_eq!(track.get("artwork_url"), Some("https://i.scdn.co/large"));
        assert_eq!(track.get("file_name"), Some("Never Gonna Give You Up"));
    }

    #[test]
    fn test_year_only_release_date() {
        let object: TrackObject = serde_json::from_str(
            r#"{"name": "X", "album": {"name": "Y", "release_date": "1999", "images": []}}"#,
        )
        .unwrap();
        let track = object.into_track();
        assert_eq!(track.get("release_year"), Some("1999"));
        assert_eq!(track.get("release_month"), None);
        assert_eq!(track.get("cover_path"), None);
    }

    #[test]
    fn test_paused_heuristic() {
        let paused: CurrentlyPlaying = serde_json::from_str(
            r#"{"is_playing": false, "actions": {"disallows": {"pausing": true}}}"#,
        )
        .unwrap();
        assert_eq!(paused.state(false), PlaybackState::Paused);
        assert_eq!(paused.state(true), PlaybackState::Stopped);

        let idle: CurrentlyPlaying =
            serde_json::from_str(r#"{"is_playing": false, "actions": {"disallows": {}}}"#)
                .unwrap();
        assert_eq!(idle.state(false), PlaybackState::Stopped);

        let playing: CurrentlyPlaying =
            serde_json::from_str(r#"{"is_playing": true, "item": null}"#).unwrap();
        assert_eq!(playing.state(true), PlaybackState::Playing);
    }
}
