use std::fs;
use std::path::Path;

use common::{Genre, GenreId, Track, TrackId};
use redb::{Database, ReadTransaction, ReadableTable, TableDefinition, WriteTransaction};
use serde::{Deserialize, Serialize};

use crate::LibraryError;

pub const SCHEMA_VERSION: u64 = 1;

const META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("meta");
const TRACKS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("tracks");
const TRACKS_BY_PATH_TABLE: TableDefinition<&str, u64> = TableDefinition::new("tracks_by_path");
const GENRES_TABLE: TableDefinition<u64, &str> = TableDefinition::new("genres");
const GENRES_BY_NAME_TABLE: TableDefinition<&str, u64> = TableDefinition::new("genres_by_name");

const META_VERSION_KEY: &str = "version";
const META_NEXT_TRACK_KEY: &str = "next_track_id";
const META_NEXT_GENRE_KEY: &str = "next_genre_id";

/// Track fields known before the store assigns an id.
#[derive(Debug)]
pub(crate) struct NewTrack {
    pub title: String,
    pub artist: String,
    pub length: u32,
    pub path: String,
}

pub(crate) fn open_or_create_db(path: &Path) -> Result<Database, LibraryError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    if path.exists() {
        Ok(Database::open(path)?)
    } else {
        Ok(Database::create(path)?)
    }
}

/// Creates missing tables and stamps the schema version. A database written
/// with another schema version is refused.
pub(crate) fn init_tables(db: &Database) -> Result<(), LibraryError> {
    let write_txn = db.begin_write()?;
    {
        let mut meta = write_txn.open_table(META_TABLE)?;
        let version = meta.get(META_VERSION_KEY)?.map(|value| value.value());
        match version {
            Some(version) if version != SCHEMA_VERSION => {
                return Err(LibraryError::VersionMismatch(version));
            }
            Some(_) => {}
            None => {
                meta.insert(META_VERSION_KEY, SCHEMA_VERSION)?;
            }
        }
        let _ = write_txn.open_table(TRACKS_TABLE)?;
        let _ = write_txn.open_table(TRACKS_BY_PATH_TABLE)?;
        let _ = write_txn.open_table(GENRES_TABLE)?;
        let _ = write_txn.open_table(GENRES_BY_NAME_TABLE)?;
    }
    write_txn.commit()?;
    Ok(())
}

fn next_id(txn: &WriteTransaction, key: &str) -> Result<u64, LibraryError> {
    let mut meta = txn.open_table(META_TABLE)?;
    let next = meta.get(key)?.map(|value| value.value()).unwrap_or(1);
    meta.insert(key, next + 1)?;
    Ok(next)
}

pub(crate) fn track_id_by_path(
    txn: &WriteTransaction,
    path: &str,
) -> Result<Option<TrackId>, LibraryError> {
    let table = txn.open_table(TRACKS_BY_PATH_TABLE)?;
    let id = table.get(path)?.map(|value| value.value());
    Ok(id)
}

pub(crate) fn load_track(
    txn: &WriteTransaction,
    track_id: TrackId,
) -> Result<Option<Track>, LibraryError> {
    let table = txn.open_table(TRACKS_TABLE)?;
    let track = match table.get(track_id)? {
        Some(value) => Some(decode_value(value.value())?),
        None => None,
    };
    Ok(track)
}

pub(crate) fn insert_track(txn: &WriteTransaction, draft: NewTrack) -> Result<Track, LibraryError> {
    let id = next_id(txn, META_NEXT_TRACK_KEY)?;
    let track = Track {
        id,
        title: draft.title,
        artist: draft.artist,
        genres: String::new(),
        length: draft.length,
        path: draft.path,
    };
    update_track(txn, &track)?;
    let mut by_path = txn.open_table(TRACKS_BY_PATH_TABLE)?;
    by_path.insert(track.path.as_str(), id)?;
    Ok(track)
}

/// Overwrites the stored row for `track.id`. The path index is left alone,
/// so callers must not change `path`.
pub(crate) fn update_track(txn: &WriteTransaction, track: &Track) -> Result<(), LibraryError> {
    let bytes = encode_value(track)?;
    let mut table = txn.open_table(TRACKS_TABLE)?;
    table.insert(track.id, bytes.as_slice())?;
    Ok(())
}

pub(crate) fn genre_id_by_name(
    txn: &WriteTransaction,
    name: &str,
) -> Result<Option<GenreId>, LibraryError> {
    let table = txn.open_table(GENRES_BY_NAME_TABLE)?;
    let id = table.get(name)?.map(|value| value.value());
    Ok(id)
}

pub(crate) fn genre_exists(txn: &WriteTransaction, genre_id: GenreId) -> Result<bool, LibraryError> {
    let table = txn.open_table(GENRES_TABLE)?;
    let exists = table.get(genre_id)?.is_some();
    Ok(exists)
}

pub(crate) fn insert_genre(txn: &WriteTransaction, name: &str) -> Result<Genre, LibraryError> {
    let id = next_id(txn, META_NEXT_GENRE_KEY)?;
    {
        let mut genres = txn.open_table(GENRES_TABLE)?;
        genres.insert(id, name)?;
    }
    let mut by_name = txn.open_table(GENRES_BY_NAME_TABLE)?;
    by_name.insert(name, id)?;
    Ok(Genre {
        id,
        name: name.to_string(),
    })
}

pub(crate) fn remove_genre(txn: &WriteTransaction, genre: &Genre) -> Result<(), LibraryError> {
    {
        let mut genres = txn.open_table(GENRES_TABLE)?;
        genres.remove(genre.id)?;
    }
    let mut by_name = txn.open_table(GENRES_BY_NAME_TABLE)?;
    by_name.remove(genre.name.as_str())?;
    Ok(())
}

pub(crate) fn find_track(
    txn: &ReadTransaction,
    track_id: TrackId,
) -> Result<Option<Track>, LibraryError> {
    let table = txn.open_table(TRACKS_TABLE)?;
    let track = match table.get(track_id)? {
        Some(value) => Some(decode_value(value.value())?),
        None => None,
    };
    Ok(track)
}

pub(crate) fn find_track_by_path(
    txn: &ReadTransaction,
    path: &str,
) -> Result<Option<Track>, LibraryError> {
    let by_path = txn.open_table(TRACKS_BY_PATH_TABLE)?;
    let id = match by_path.get(path)? {
        Some(value) => value.value(),
        None => return Ok(None),
    };
    find_track(txn, id)
}

/// Tracks whose path starts with `prefix`, in path order.
pub(crate) fn tracks_with_prefix(
    txn: &ReadTransaction,
    prefix: &str,
) -> Result<Vec<Track>, LibraryError> {
    let by_path = txn.open_table(TRACKS_BY_PATH_TABLE)?;
    let track_table = txn.open_table(TRACKS_TABLE)?;

    let mut tracks = Vec::new();

    // Keys are sorted, so matches form one run starting at `prefix`.
    for entry in by_path.range(prefix..)? {
        let (key, value) = entry?;
        if !key.value().starts_with(prefix) {
            break;
        }
        let track_id = value.value();
        if let Some(value) = track_table.get(track_id)? {
            let track: Track = decode_value(value.value())?;
            tracks.push(track);
        }
    }

    Ok(tracks)
}

pub(crate) fn count_tracks(txn: &ReadTransaction) -> Result<u64, LibraryError> {
    let table = txn.open_table(TRACKS_TABLE)?;
    let count = table.len()?;
    Ok(count)
}

pub(crate) fn find_genre(
    txn: &ReadTransaction,
    genre_id: GenreId,
) -> Result<Option<Genre>, LibraryError> {
    let table = txn.open_table(GENRES_TABLE)?;
    let genre = table.get(genre_id)?.map(|value| Genre {
        id: genre_id,
        name: value.value().to_string(),
    });
    Ok(genre)
}

pub(crate) fn find_genre_by_name(
    txn: &ReadTransaction,
    name: &str,
) -> Result<Option<Genre>, LibraryError> {
    let by_name = txn.open_table(GENRES_BY_NAME_TABLE)?;
    let id = match by_name.get(name)? {
        Some(value) => value.value(),
        None => return Ok(None),
    };
    find_genre(txn, id)
}

/// All genres in id order.
pub(crate) fn list_genres(txn: &ReadTransaction) -> Result<Vec<Genre>, LibraryError> {
    let table = txn.open_table(GENRES_TABLE)?;
    let mut genres = Vec::new();
    for entry in table.iter()? {
        let entry = entry?;
        genres.push(Genre {
            id: entry.0.value(),
            name: entry.1.value().to_string(),
        });
    }
    Ok(genres)
}

fn encode_value<T: Serialize>(value: &T) -> Result<Vec<u8>, LibraryError> {
    Ok(bincode::serialize(value)?)
}

fn decode_value<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, LibraryError> {
    Ok(bincode::deserialize(bytes)?)
}

#[cfg(test)]
mod tests {
    use common::Track;

    use super::{
        find_genre_by_name, find_track, find_track_by_path, init_tables, insert_genre,
        insert_track, list_genres, open_or_create_db, remove_genre, track_id_by_path,
        tracks_with_prefix, NewTrack,
    };

    fn draft(path: &str) -> NewTrack {
        NewTrack {
            title: "T".to_string(),
            artist: "A".to_string(),
            length: 10,
            path: path.to_string(),
        }
    }

    fn paths(tracks: &[Track]) -> Vec<&str> {
        tracks.iter().map(|track| track.path.as_str()).collect()
    }

    #[test]
    fn prefix_scan_respects_string_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_or_create_db(&dir.path().join("catalog.redb")).unwrap();
        init_tables(&db).unwrap();

        let write_txn = db.begin_write().unwrap();
        for path in [
            "/music/rock/b.mp3",
            "/music/jazz/a.mp3",
            "/music/rock/a.mp3",
            "/musical/x.mp3",
            "/other/y.mp3",
        ] {
            insert_track(&write_txn, draft(path)).unwrap();
        }
        write_txn.commit().unwrap();

        let read_txn = db.begin_read().unwrap();
        let rock = tracks_with_prefix(&read_txn, "/music/rock").unwrap();
        assert_eq!(paths(&rock), vec!["/music/rock/a.mp3", "/music/rock/b.mp3"]);
        let jazz = tracks_with_prefix(&read_txn, "/music/jazz").unwrap();
        assert_eq!(paths(&jazz), vec!["/music/jazz/a.mp3"]);
        let music = tracks_with_prefix(&read_txn, "/music/").unwrap();
        assert_eq!(music.len(), 3);
        let all = tracks_with_prefix(&read_txn, "").unwrap();
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn prefix_scan_includes_highest_code_point() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_or_create_db(&dir.path().join("catalog.redb")).unwrap();
        init_tables(&db).unwrap();

        let write_txn = db.begin_write().unwrap();
        for path in ["/m/a.mp3", "/m/\u{10ffff}.mp3", "/m\u{10ffff}x.mp3", "/n/b.mp3"] {
            insert_track(&write_txn, draft(path)).unwrap();
        }
        write_txn.commit().unwrap();

        let read_txn = db.begin_read().unwrap();
        let under_m = tracks_with_prefix(&read_txn, "/m/").unwrap();
        assert_eq!(paths(&under_m), vec!["/m/a.mp3", "/m/\u{10ffff}.mp3"]);
        let m = tracks_with_prefix(&read_txn, "/m").unwrap();
        assert_eq!(m.len(), 3);
    }

    #[test]
    fn assigns_sequential_ids_and_indexes_paths() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_or_create_db(&dir.path().join("catalog.redb")).unwrap();
        init_tables(&db).unwrap();

        let write_txn = db.begin_write().unwrap();
        let first = insert_track(&write_txn, draft("/m/1.mp3")).unwrap();
        let second = insert_track(&write_txn, draft("/m/2.mp3")).unwrap();
        assert_eq!((first.id, second.id), (1, 2));
        assert_eq!(track_id_by_path(&write_txn, "/m/2.mp3").unwrap(), Some(2));
        assert_eq!(track_id_by_path(&write_txn, "/m/3.mp3").unwrap(), None);
        write_txn.commit().unwrap();

        let read_txn = db.begin_read().unwrap();
        assert_eq!(find_track(&read_txn, 1).unwrap(), Some(first));
        assert_eq!(
            find_track_by_path(&read_txn, "/m/2.mp3").unwrap(),
            Some(second)
        );
    }

    #[test]
    fn uncommitted_writes_are_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_or_create_db(&dir.path().join("catalog.redb")).unwrap();
        init_tables(&db).unwrap();

        {
            let write_txn = db.begin_write().unwrap();
            insert_track(&write_txn, draft("/m/1.mp3")).unwrap();
            insert_genre(&write_txn, "Rock").unwrap();
        }

        let read_txn = db.begin_read().unwrap();
        assert!(tracks_with_prefix(&read_txn, "").unwrap().is_empty());
        assert!(list_genres(&read_txn).unwrap().is_empty());
    }

    #[test]
    fn genre_ids_are_never_reused() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_or_create_db(&dir.path().join("catalog.redb")).unwrap();
        init_tables(&db).unwrap();

        let write_txn = db.begin_write().unwrap();
        let rock = insert_genre(&write_txn, "Rock").unwrap();
        remove_genre(&write_txn, &rock).unwrap();
        let jazz = insert_genre(&write_txn, "Jazz").unwrap();
        write_txn.commit().unwrap();

        assert_eq!(rock.id, 1);
        assert_eq!(jazz.id, 2);
        let read_txn = db.begin_read().unwrap();
        assert_eq!(find_genre_by_name(&read_txn, "Rock").unwrap(), None);
        assert_eq!(list_genres(&read_txn).unwrap(), vec![jazz]);
    }
}
