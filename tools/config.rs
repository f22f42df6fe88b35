use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use library::normalize_extensions;
use serde::{Deserialize, Deserializer, Serialize};

pub const CONFIG_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub version: u32,
    pub root_dir: String,
    #[serde(deserialize_with = "deserialize_audio_types")]
    pub audio_types: Vec<String>,
    pub db_path: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            root_dir: "".to_string(),
            audio_types: Vec::new(),
            db_path: "catalog.redb".to_string(),
        }
    }
}

impl CatalogConfig {
    /// Config written by `catalog init`: common audio types, root left blank.
    pub fn starter() -> Self {
        Self {
            audio_types: vec!["mp3".to_string(), "flac".to_string()],
            ..Self::default()
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
    Missing(PathBuf),
    MissingKey(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
            ConfigError::Missing(path) => write!(f, "no config file at {:?}", path),
            ConfigError::MissingKey(key) => write!(f, "config key '{}' is missing or empty", key),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

/// `audio_types` may be a YAML list or a single comma-separated string.
#[derive(Deserialize)]
#[serde(untagged)]
enum AudioTypesValue {
    List(Vec<String>),
    Joined(String),
}

fn deserialize_audio_types<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match AudioTypesValue::deserialize(deserializer)? {
        AudioTypesValue::List(values) => values,
        AudioTypesValue::Joined(value) => value.split(',').map(str::to_string).collect(),
    };
    Ok(normalize_extensions(&raw))
}

pub fn config_path_from_env() -> PathBuf {
    match env::var("CATALOG_CONFIG") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default_config_path(),
    }
}

fn default_config_path() -> PathBuf {
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join("config.yaml"))
            .unwrap_or_else(|| PathBuf::from("config.yaml")),
        Err(_) => PathBuf::from("config.yaml"),
    }
}

/// Loads and validates the config. A missing file or a missing required key
/// is an error; nothing is created implicitly.
pub fn load_config(path: &Path) -> Result<CatalogConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::Missing(path.to_path_buf()));
    }
    let contents = fs::read_to_string(path)?;
    let mut config: CatalogConfig = serde_yaml::from_str(&contents)?;

    config.root_dir = config.root_dir.trim().to_string();
    if config.root_dir.is_empty() {
        return Err(ConfigError::MissingKey("root_dir"));
    }
    if config.audio_types.is_empty() {
        return Err(ConfigError::MissingKey("audio_types"));
    }
    if config.db_path.trim().is_empty() {
        config.db_path = "catalog.redb".to_string();
    }
    if config.version < CONFIG_VERSION {
        config.version = CONFIG_VERSION;
    }
    Ok(config)
}

pub fn save_config(path: &Path, config: &CatalogConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    fs::write(path, contents)?;
    Ok(())
}

pub fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let raw = PathBuf::from(value);
    if raw.is_absolute() {
        return raw;
    }
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    base.join(raw)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::{load_config, resolve_path, save_config, CatalogConfig, ConfigError};

    fn write(dir: &Path, contents: &str) -> std::path::PathBuf {
        let path = dir.join("config.yaml");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("config.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "audio_types: [mp3]\n");
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey("root_dir")));
    }

    #[test]
    fn absent_audio_types_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "root_dir: /music\n");
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey("audio_types")));
    }

    #[test]
    fn empty_audio_types_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "root_dir: /music\naudio_types: \"\"\n");
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey("audio_types")));
    }

    #[test]
    fn accepts_comma_separated_audio_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "root_dir: /music\naudio_types: \"MP3, .flac,ogg\"\n",
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.root_dir, "/music");
        assert_eq!(config.audio_types, vec!["mp3", "flac", "ogg"]);
        assert_eq!(config.db_path, "catalog.redb");
    }

    #[test]
    fn accepts_audio_type_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "root_dir: /music\naudio_types:\n  - Flac\n  - wav\ndb_path: data/c.redb\n",
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.audio_types, vec!["flac", "wav"]);
        assert_eq!(
            resolve_path(&path, &config.db_path),
            dir.path().join("data/c.redb")
        );
    }

    #[test]
    fn saved_default_needs_a_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        save_config(&path, &CatalogConfig::starter()).unwrap();
        assert!(matches!(
            load_config(&path).unwrap_err(),
            ConfigError::MissingKey("root_dir")
        ));

        let config = CatalogConfig {
            root_dir: "/music".to_string(),
            ..CatalogConfig::starter()
        };
        save_config(&path, &config).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.audio_types, vec!["mp3", "flac"]);
    }

    #[test]
    fn absolute_paths_are_kept() {
        assert_eq!(
            resolve_path(Path::new("/etc/catalog/config.yaml"), "/var/catalog.redb"),
            Path::new("/var/catalog.redb")
        );
        assert_eq!(
            resolve_path(Path::new("config.yaml"), "catalog.redb"),
            Path::new("./catalog.redb")
        );
    }
}
