use std::fs;
use std::path::Path;

use library::{Library, ProgressCell, PROGRESS_DONE};

fn write_file(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"not really audio").unwrap();
}

#[test]
fn browse_import_tag_and_refresh() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("music");
    write_file(&root.join("rock/Artist - Title.mp3"));
    write_file(&root.join("rock/OnlyTitle.flac"));
    write_file(&root.join("jazz/A - B - C.mp3"));
    write_file(&root.join("jazz/cover.jpg"));

    let types = vec!["mp3".to_string(), "flac".to_string()];
    let db_path = dir.path().join("catalog.redb");
    let library = Library::open(root.clone(), &types, &db_path).unwrap();

    let dirs = library.list_dirs();
    assert_eq!(dirs.len(), 3);

    let progress = ProgressCell::new();
    let stats = library.import_tracks(&root, &progress).unwrap();
    assert_eq!(progress.get(), PROGRESS_DONE);
    assert_eq!(stats.scanned, 4);
    assert_eq!(stats.imported, 3);
    assert_eq!(stats.invalid, 1);

    let rock = root.join("rock").to_string_lossy().to_string();
    let rows = library.list_tracks(&rock).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].artist, "Artist");
    assert_eq!(rows[0].title, "Title");
    assert_eq!(rows[0].length, "0:0");
    assert_eq!(rows[1].artist, "");
    assert_eq!(rows[1].title, "OnlyTitle");

    let jazz = root.join("jazz").to_string_lossy().to_string();
    let rows = library.list_tracks(&jazz).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title, "");
    assert_eq!(rows[0].artist, "");

    library.add_genre("Rock").unwrap();
    library.add_genre("Live").unwrap();
    let ids = library
        .genre_ids_by_name(&["Rock".to_string(), "Live".to_string()])
        .unwrap();
    let track_id = library.list_tracks(&rock).unwrap()[0].id;
    assert!(library.set_track_genres(track_id, &ids).unwrap());

    let stats = library
        .refresh_tracks(&root.to_string_lossy(), &progress)
        .unwrap();
    assert_eq!(stats.updated, 3);
    assert_eq!(progress.get(), PROGRESS_DONE);

    let rows = library.list_tracks(&rock).unwrap();
    assert_eq!(rows[0].genres, "Rock, Live");
    assert_eq!(rows[0].title, "Title");

    let again = library.import_tracks(&root, &progress).unwrap();
    assert_eq!(again.imported, 0);
    assert_eq!(again.existing, 3);
    assert_eq!(library.track_count().unwrap(), 3);

    library.shutdown();
}
