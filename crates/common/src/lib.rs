use std::fmt;

use serde::{Deserialize, Serialize};

mod codec;

pub use codec::{decode_genres, encode_genres, CodecError, GENRE_SEP};

pub type TrackId = u64;
pub type GenreId = u64;

/// A cataloged audio file as stored.
///
/// `genres` holds the raw encoded id list; go through [`Track::genre_ids`]
/// and [`Track::set_genre_ids`] to read or replace it as a sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub genres: String,
    pub length: u32,
    pub path: String,
}

impl Track {
    pub fn genre_ids(&self) -> Result<Vec<GenreId>, CodecError> {
        decode_genres(&self.genres)
    }

    pub fn set_genre_ids(&mut self, ids: &[GenreId]) {
        self.genres = encode_genres(ids);
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[TRACK] {} - {} - {}", self.id, self.artist, self.title)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: GenreId,
    pub name: String,
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[GENRE] {} - {}", self.id, self.name)
    }
}

/// Plain browsing record handed to front ends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRow {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub genres: String,
    pub length: String,
    pub path: String,
}

/// Renders seconds as `minutes:seconds`. Seconds are not zero-padded, so
/// 125 renders as `2:5`.
pub fn format_length(seconds: u32) -> String {
    format!("{}:{}", seconds / 60, seconds % 60)
}
