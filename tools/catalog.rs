use std::env;
use std::path::PathBuf;

use common::TrackId;
use library::{Library, ProgressSink};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{config_path_from_env, load_config, resolve_path, save_config, CatalogConfig};

const USAGE: &str = "usage: catalog <init|dirs|import [DIR]|refresh [DIR]|tracks [DIR]|genres|genre-add NAME|genre-remove NAME|tag TRACK_ID [GENRE...]>";

/// Logs every progress update of a run.
struct LogProgress;

impl ProgressSink for LogProgress {
    fn set_progress(&self, value: f64) {
        info!("Progress: {}", value);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = env::args().skip(1);
    let command = args.next().ok_or(USAGE)?;
    let rest: Vec<String> = args.collect();
    let config_path = config_path_from_env();

    if command == "init" {
        if config_path.exists() {
            warn!("Config already exists at {:?}", config_path);
        } else {
            save_config(&config_path, &CatalogConfig::starter())?;
            info!("Wrote default config to {:?}; set root_dir before use", config_path);
        }
        return Ok(());
    }

    let config = load_config(&config_path)?;
    let db_path = resolve_path(&config_path, &config.db_path);
    let root = PathBuf::from(&config.root_dir);
    let library = Library::open(root.clone(), &config.audio_types, &db_path)?;
    let dir_arg = || {
        rest.first()
            .map(PathBuf::from)
            .unwrap_or_else(|| root.clone())
    };

    match command.as_str() {
        "dirs" => {
            for dir in library.list_dirs() {
                println!("{}", dir);
            }
        }
        "import" => {
            let dir = dir_arg();
            let stats = library.import_tracks(&dir, &LogProgress)?;
            println!(
                "Imported {} tracks ({} already cataloged, {} skipped, {} files scanned)",
                stats.imported, stats.existing, stats.invalid, stats.scanned
            );
        }
        "refresh" => {
            let dir = dir_arg();
            let stats = library.refresh_tracks(&dir.to_string_lossy(), &LogProgress)?;
            println!("Refreshed {} tracks", stats.updated);
        }
        "tracks" => {
            let dir = dir_arg();
            let rows = library.list_tracks(&dir.to_string_lossy())?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        "genres" => {
            for genre in library.list_genres()? {
                println!("{}", genre);
            }
        }
        "genre-add" => {
            let name = rest.first().ok_or("genre-add needs a NAME")?;
            if library.add_genre(name)? {
                println!("Added genre {}", name);
            }
        }
        "genre-remove" => {
            let name = rest.first().ok_or("genre-remove needs a NAME")?;
            if library.remove_genre(name)? {
                println!("Removed genre {}", name);
            }
        }
        "tag" => {
            let track_id: TrackId = rest.first().ok_or("tag needs a TRACK_ID")?.parse()?;
            let ids = library.genre_ids_by_name(&rest[1..])?;
            if !library.set_track_genres(track_id, &ids)? {
                return Err(format!("no track with id {}", track_id).into());
            }
            if let Some(track) = library.get_track(track_id)? {
                println!("{}", track);
            }
        }
        _ => {
            library.shutdown();
            return Err(USAGE.into());
        }
    }

    library.shutdown();
    Ok(())
}
