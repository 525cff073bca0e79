//! Integration tests for loading configuration files from disk.

#![allow(unsafe_code)]
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]

use std::{fs, path::PathBuf, time::Duration};

use nowplaying::{
    NowPlayingError,
    config::{Config, ConfigPaths, LogLevel},
};
use tempfile::TempDir;

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn loads_every_section_from_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[general]
log_level = "trace"

[media]
ignored_apps = ["msedge"]
thumbnail_timeout_ms = 250
hash_track_ids = false
"#,
    );

    let config = Config::load_from(&path).unwrap();

    assert_eq!(config.general.log_level, LogLevel::Trace);
    assert_eq!(config.media.ignored_apps, vec!["msedge"]);
    assert_eq!(config.media.thumbnail_timeout(), Duration::from_millis(250));
    assert!(!config.media.hash_track_ids);
}

#[test]
fn parse_errors_name_the_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[media\nthumbnail_timeout_ms = ");

    match Config::load_from(&path) {
        Err(NowPlayingError::TomlParseError { location, .. }) => {
            assert!(location.ends_with("config.toml"), "location was {location}");
        }
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn missing_explicit_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    assert!(matches!(
        Config::load_from(&path),
        Err(NowPlayingError::IoError { .. })
    ));
}

#[test]
fn default_location_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();

    unsafe {
        std::env::set_var("XDG_CONFIG_HOME", dir.path());
    }

    assert_eq!(
        ConfigPaths::main_config().unwrap(),
        dir.path().join("nowplaying").join("config.toml")
    );
    assert_eq!(Config::load().unwrap(), Config::default());

    let config_dir = dir.path().join("nowplaying");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.toml"),
        "[general]\nlog_level = \"warn\"\n",
    )
    .unwrap();

    assert_eq!(Config::load().unwrap().general.log_level, LogLevel::Warn);
}
