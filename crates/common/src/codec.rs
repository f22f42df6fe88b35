use std::fmt;

use crate::GenreId;

/// Delimiter between ids in an encoded genre field.
pub const GENRE_SEP: char = ';';

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodecError {
    pub segment: String,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid genre id segment: {:?}", self.segment)
    }
}

impl std::error::Error for CodecError {}

pub fn encode_genres(ids: &[GenreId]) -> String {
    let mut out = String::new();
    for (idx, id) in ids.iter().enumerate() {
        if idx > 0 {
            out.push(GENRE_SEP);
        }
        out.push_str(&id.to_string());
    }
    out
}

/// Splits an encoded field back into ids, preserving order. The empty
/// string decodes to an empty list; any other segment must be a plain
/// base-10 id.
pub fn decode_genres(raw: &str) -> Result<Vec<GenreId>, CodecError> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    raw.split(GENRE_SEP)
        .map(|segment| {
            if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                return Err(CodecError {
                    segment: segment.to_string(),
                });
            }
            segment.parse::<GenreId>().map_err(|_| CodecError {
                segment: segment.to_string(),
            })
        })
        .collect()
}
