use std::path::{Path, PathBuf};

use common::{format_length, Genre, GenreId, Track, TrackId, TrackRow};
use metadata::{extract_metadata, LoftyReader, TagReader, TrackMetadata};
use redb::{
    CommitError, Database, DatabaseError, ReadTransaction, StorageError, TableError,
    TransactionError,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

mod progress;
mod scan;
mod store;

pub use progress::{NoProgress, ProgressCell, ProgressSink, PROGRESS_DONE, PROGRESS_START};
pub use scan::{collect_dirs, collect_files, file_extension, normalize_extensions};
pub use store::SCHEMA_VERSION;

use progress::mid_run_progress;
use store::NewTrack;

/// The catalog: owns the database handle and runs every catalog operation.
pub struct Library {
    root: PathBuf,
    audio_types: Vec<String>,
    db: Database,
    reader: Box<dyn TagReader>,
}

impl Library {
    pub fn open(
        root: PathBuf,
        audio_types: &[String],
        db_path: &Path,
    ) -> Result<Self, LibraryError> {
        let db = store::open_or_create_db(db_path)?;
        store::init_tables(&db)?;
        info!("Catalog database ready at {:?}", db_path);

        Ok(Self {
            root,
            audio_types: normalize_extensions(audio_types),
            db,
            reader: Box::new(LoftyReader),
        })
    }

    /// Replaces the tag reader used by import and refresh.
    pub fn with_tag_reader(mut self, reader: impl TagReader + 'static) -> Self {
        self.reader = Box::new(reader);
        self
    }

    /// Closes the database.
    pub fn shutdown(self) {
        info!("Closing catalog database");
        drop(self);
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn audio_types(&self) -> &[String] {
        &self.audio_types
    }

    pub fn list_dirs(&self) -> Vec<String> {
        let dirs: Vec<String> = collect_dirs(&self.root)
            .into_iter()
            .map(|dir| dir.to_string_lossy().to_string())
            .collect();
        info!("Found {} directories", dirs.len());
        dirs
    }

    pub fn list_genres(&self) -> Result<Vec<String>, LibraryError> {
        let read_txn = self.db.begin_read()?;
        let genres = store::list_genres(&read_txn)?;
        Ok(genres.into_iter().map(|genre| genre.name).collect())
    }

    pub fn find_genre(&self, name: &str) -> Result<Option<Genre>, LibraryError> {
        let read_txn = self.db.begin_read()?;
        store::find_genre_by_name(&read_txn, name)
    }

    /// Resolves genre names to ids, in order. Unknown names are logged and
    /// left out.
    pub fn genre_ids_by_name(&self, names: &[String]) -> Result<Vec<GenreId>, LibraryError> {
        let read_txn = self.db.begin_read()?;
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            match store::find_genre_by_name(&read_txn, name)? {
                Some(genre) => ids.push(genre.id),
                None => warn!("Genre with name {:?} is not in database", name),
            }
        }
        Ok(ids)
    }

    /// Adds a genre unless one with exactly this name exists. Returns whether
    /// a row was added.
    pub fn add_genre(&self, name: &str) -> Result<bool, LibraryError> {
        if name.is_empty() {
            warn!("Refusing to add a genre with an empty name");
            return Ok(false);
        }

        let write_txn = self.db.begin_write()?;
        if store::genre_id_by_name(&write_txn, name)?.is_some() {
            warn!("Genre with name {:?} is already in database", name);
            return Ok(false);
        }
        let genre = store::insert_genre(&write_txn, name)?;
        write_txn.commit()?;
        info!("Genre {} was added", genre);
        Ok(true)
    }

    /// Removes the genre with exactly this name. Tracks keep referencing its
    /// id. Returns whether a row was removed.
    pub fn remove_genre(&self, name: &str) -> Result<bool, LibraryError> {
        let write_txn = self.db.begin_write()?;
        let genre = match store::genre_id_by_name(&write_txn, name)? {
            Some(id) => Genre {
                id,
                name: name.to_string(),
            },
            None => {
                warn!("Genre with name {:?} is not in database", name);
                return Ok(false);
            }
        };
        store::remove_genre(&write_txn, &genre)?;
        write_txn.commit()?;
        info!("Genre {} was removed", genre);
        Ok(true)
    }

    pub fn get_track(&self, track_id: TrackId) -> Result<Option<Track>, LibraryError> {
        let read_txn = self.db.begin_read()?;
        store::find_track(&read_txn, track_id)
    }

    pub fn get_track_by_path(&self, path: &str) -> Result<Option<Track>, LibraryError> {
        let read_txn = self.db.begin_read()?;
        store::find_track_by_path(&read_txn, path)
    }

    pub fn track_count(&self) -> Result<u64, LibraryError> {
        let read_txn = self.db.begin_read()?;
        store::count_tracks(&read_txn)
    }

    /// Replaces a track's genre list. Ids without a genre row are dropped.
    /// Returns `false` when the track does not exist.
    pub fn set_track_genres(
        &self,
        track_id: TrackId,
        genre_ids: &[GenreId],
    ) -> Result<bool, LibraryError> {
        let write_txn = self.db.begin_write()?;
        let mut track = match store::load_track(&write_txn, track_id)? {
            Some(track) => track,
            None => {
                warn!("Track with id {} is not in database", track_id);
                return Ok(false);
            }
        };

        let mut kept = Vec::with_capacity(genre_ids.len());
        for &genre_id in genre_ids {
            if store::genre_exists(&write_txn, genre_id)? {
                kept.push(genre_id);
            } else {
                warn!("Genre with id {} was not found; not assigned", genre_id);
            }
        }

        track.set_genre_ids(&kept);
        store::update_track(&write_txn, &track)?;
        write_txn.commit()?;
        info!("Track {} has genres {:?}", track, track.genres);
        Ok(true)
    }

    /// Browsing rows for every track whose path starts with `prefix`.
    pub fn list_tracks(&self, prefix: &str) -> Result<Vec<TrackRow>, LibraryError> {
        let read_txn = self.db.begin_read()?;
        let tracks = store::tracks_with_prefix(&read_txn, prefix)?;

        let mut rows = Vec::with_capacity(tracks.len());
        for track in tracks {
            let genres = render_genres(&read_txn, &track)?;
            rows.push(TrackRow {
                id: track.id,
                title: track.title,
                artist: track.artist,
                genres,
                length: format_length(track.length),
                path: track.path,
            });
        }

        info!("Loaded {} tracks", rows.len());
        Ok(rows)
    }

    /// Adds every recognized audio file under `dir` that is not cataloged
    /// yet. Everything is committed at once when the walk finishes.
    pub fn import_tracks(
        &self,
        dir: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<ImportStats, LibraryError> {
        progress.set_progress(PROGRESS_START);
        let files = collect_files(dir);
        let total = files.len();
        let mut stats = ImportStats {
            scanned: total,
            ..ImportStats::default()
        };

        let write_txn = self.db.begin_write()?;
        for (index, file) in files.iter().enumerate() {
            let file_name = file
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();

            match file.to_str() {
                // Stored paths must name the file exactly.
                None => {
                    warn!("Track with path {:?} is not valid UTF-8", file);
                    stats.invalid += 1;
                }
                Some(path) if store::track_id_by_path(&write_txn, path)?.is_some() => {
                    info!("Track with path {:?} is already imported", file_name);
                    stats.existing += 1;
                }
                Some(path) if self.is_audio_file(file) => {
                    let meta = extract_metadata(&*self.reader, file);
                    let track =
                        store::insert_track(&write_txn, new_track(meta, path.to_string()))?;
                    info!("Track {} was imported", track);
                    stats.imported += 1;
                }
                Some(_) => {
                    warn!("Track with path {:?} has no valid audio type", file_name);
                    stats.invalid += 1;
                }
            }

            if let Some(value) = mid_run_progress(index, total) {
                progress.set_progress(value);
            }
        }
        write_txn.commit()?;
        progress.set_progress(PROGRESS_DONE);

        info!(
            "Import of {:?} finished: {} imported, {} already present, {} invalid",
            dir, stats.imported, stats.existing, stats.invalid
        );
        Ok(stats)
    }

    /// Re-reads metadata for every cataloged track under `prefix` and
    /// overwrites title, artist and length. Genres, ids and paths stay put.
    pub fn refresh_tracks(
        &self,
        prefix: &str,
        progress: &dyn ProgressSink,
    ) -> Result<RefreshStats, LibraryError> {
        progress.set_progress(PROGRESS_START);
        let tracks = {
            let read_txn = self.db.begin_read()?;
            store::tracks_with_prefix(&read_txn, prefix)?
        };
        let total = tracks.len();

        let write_txn = self.db.begin_write()?;
        for (index, mut track) in tracks.into_iter().enumerate() {
            let meta = extract_metadata(&*self.reader, Path::new(&track.path));
            track.title = meta.title.unwrap_or_default();
            track.artist = meta.artist.unwrap_or_default();
            track.length = meta.length;
            store::update_track(&write_txn, &track)?;
            info!("Track {} was updated", track);

            if let Some(value) = mid_run_progress(index, total) {
                progress.set_progress(value);
            }
        }
        write_txn.commit()?;
        progress.set_progress(PROGRESS_DONE);

        info!("Refresh of {:?} finished: {} updated", prefix, total);
        Ok(RefreshStats { updated: total })
    }

    fn is_audio_file(&self, path: &Path) -> bool {
        file_extension(path)
            .map(|ext| self.audio_types.iter().any(|allowed| *allowed == ext))
            .unwrap_or(false)
    }
}

fn new_track(meta: TrackMetadata, path: String) -> NewTrack {
    NewTrack {
        title: meta.title.unwrap_or_default(),
        artist: meta.artist.unwrap_or_default(),
        length: meta.length,
        path,
    }
}

/// Joins the names of a track's genres. Ids without a genre row, and fields
/// that do not decode, contribute nothing.
fn render_genres(txn: &ReadTransaction, track: &Track) -> Result<String, LibraryError> {
    let genre_ids = match track.genre_ids() {
        Ok(ids) => ids,
        Err(err) => {
            warn!("Track {} has an unreadable genre field: {}", track, err);
            return Ok(String::new());
        }
    };

    let mut names = Vec::with_capacity(genre_ids.len());
    for genre_id in genre_ids {
        match store::find_genre(txn, genre_id)? {
            Some(genre) => names.push(genre.name),
            None => warn!("Genre with id {} was not found", genre_id),
        }
    }
    Ok(names.join(", "))
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStats {
    pub scanned: usize,
    pub imported: usize,
    pub existing: usize,
    pub invalid: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshStats {
    pub updated: usize,
}

#[derive(Debug)]
pub enum LibraryError {
    Io(std::io::Error),
    Redb(redb::Error),
    Bincode(Box<bincode::ErrorKind>),
    VersionMismatch(u64),
}

impl std::fmt::Display for LibraryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryError::Io(err) => write!(f, "io error: {}", err),
            LibraryError::Redb(err) => write!(f, "db error: {}", err),
            LibraryError::Bincode(err) => write!(f, "bincode error: {}", err),
            LibraryError::VersionMismatch(version) => write!(
                f,
                "catalog schema version mismatch: found {}, expected {}",
                version, SCHEMA_VERSION
            ),
        }
    }
}

impl std::error::Error for LibraryError {}

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        LibraryError::Io(err)
    }
}

impl From<redb::Error> for LibraryError {
    fn from(err: redb::Error) -> Self {
        LibraryError::Redb(err)
    }
}

impl From<DatabaseError> for LibraryError {
    fn from(err: DatabaseError) -> Self {
        LibraryError::Redb(err.into())
    }
}

impl From<TableError> for LibraryError {
    fn from(err: TableError) -> Self {
        LibraryError::Redb(err.into())
    }
}

impl From<TransactionError> for LibraryError {
    fn from(err: TransactionError) -> Self {
        LibraryError::Redb(err.into())
    }
}

impl From<StorageError> for LibraryError {
    fn from(err: StorageError) -> Self {
        LibraryError::Redb(err.into())
    }
}

impl From<CommitError> for LibraryError {
    fn from(err: CommitError) -> Self {
        LibraryError::Redb(err.into())
    }
}

impl From<Box<bincode::ErrorKind>> for LibraryError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        LibraryError::Bincode(err)
    }
}
