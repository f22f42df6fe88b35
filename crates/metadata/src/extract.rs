use std::path::Path;

use tracing::info;

use crate::{TagInfo, TagReader};

/// Best-effort metadata for one file. `length` is whole seconds, 0 when the
/// duration is unknown.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub length: u32,
}

/// Reads tags through `reader` and fills gaps from the file name.
///
/// Never fails: an unreadable file is logged and treated as carrying no tags.
/// The file name is only consulted when both title and artist are missing.
pub fn extract_metadata(reader: &dyn TagReader, path: &Path) -> TrackMetadata {
    let tag = match reader.read_tags(path) {
        Ok(tag) => tag,
        Err(err) => {
            info!("No readable tags in {:?}: {}", path, err);
            TagInfo::default()
        }
    };

    let mut title = tag.title.filter(|value| !value.is_empty());
    let mut artist = tag.artist.filter(|value| !value.is_empty());

    if title.is_none() && artist.is_none() {
        if let Some(name) = path.file_name().map(|s| s.to_string_lossy().to_string()) {
            let (fallback_title, fallback_artist) = split_file_name(&name);
            title = fallback_title;
            artist = fallback_artist;
        }
    }

    TrackMetadata {
        title,
        artist,
        length: tag.duration_ms.map(|ms| ms / 1000).unwrap_or(0),
    }
}

/// `Artist - Title.ext` gives both fields, `Title.ext` gives only a title.
/// Names with more than one dash are ambiguous and give nothing.
fn split_file_name(name: &str) -> (Option<String>, Option<String>) {
    let stem = strip_extension(name);
    match stem.matches('-').count() {
        0 => (Some(stem.trim().to_string()), None),
        1 => match stem.split_once('-') {
            Some((left, right)) => (
                Some(right.trim().to_string()),
                Some(left.trim().to_string()),
            ),
            None => (None, None),
        },
        _ => (None, None),
    }
}

fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => name,
    }
}
