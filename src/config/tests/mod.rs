//! Unit tests for config module
//!
//! Tests configuration types, defaults, and serialization.
//! No filesystem dependencies - all in-memory.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use crate::{
    NowPlayingError,
    config::{Config, LogLevel, MediaConfig},
};

#[test]
fn config_default() {
    let config = Config::default();

    assert_eq!(config.general.log_level, LogLevel::Info);
    assert!(config.media.ignored_apps.is_empty());
    assert_eq!(config.media.thumbnail_timeout(), Duration::from_secs(5));
    assert!(config.media.hash_track_ids);
}

#[test]
fn config_serialize_toml() {
    let config = Config::default();

    let toml_str = toml::to_string(&config).unwrap();
    assert!(toml_str.contains("[general]"));
    assert!(toml_str.contains("[media]"));
    assert!(toml_str.contains("thumbnail_timeout_ms = 5000"));
}

#[test]
fn config_deserialize_toml() {
    let toml_str = r#"
        [general]
        log_level = "debug"

        [media]
        ignored_apps = ["chrome", "msedge"]
        thumbnail_timeout_ms = 1500
        hash_track_ids = false
    "#;

    let config = Config::from_toml_str(toml_str).unwrap();

    assert_eq!(config.general.log_level, LogLevel::Debug);
    assert_eq!(config.media.ignored_apps, vec!["chrome", "msedge"]);
    assert_eq!(config.media.thumbnail_timeout(), Duration::from_millis(1500));
    assert!(!config.media.hash_track_ids);
}

#[test]
fn config_serialize_roundtrip() {
    let original = Config::default();

    let toml_str = toml::to_string(&original).unwrap();
    let deserialized: Config = toml::from_str(&toml_str).unwrap();

    assert_eq!(original, deserialized);
}

#[test]
fn config_partial_media_section_keeps_defaults() {
    let config = Config::from_toml_str(
        r#"
        [media]
        ignored_apps = ["firefox"]
    "#,
    )
    .unwrap();

    assert_eq!(config.media.thumbnail_timeout_ms, 5000);
    assert!(config.media.hash_track_ids);
}

#[test]
fn config_empty_toml() {
    let config = Config::from_toml_str("").unwrap();

    assert_eq!(config, Config::default());
}

#[test]
fn config_invalid_toml() {
    let invalid_toml = r#"
        [general
        invalid syntax here
    "#;

    let result = Config::from_toml_str(invalid_toml);

    assert!(matches!(
        result,
        Err(NowPlayingError::TomlParseError { ref location, .. }) if location == "string"
    ));
}

#[test]
fn config_rejects_zero_thumbnail_timeout() {
    let result = Config::from_toml_str(
        r#"
        [media]
        thumbnail_timeout_ms = 0
    "#,
    );

    assert!(matches!(
        result,
        Err(NowPlayingError::InvalidConfigField { ref field, .. }) if field == "thumbnail_timeout_ms"
    ));
}

#[test]
fn config_unknown_fields() {
    let toml_with_unknown = r#"
        [general]
        log_level = "info"
        unknown_field = "should be ignored"

        [unknown_section]
        some_field = "ignored"
    "#;

    let config = Config::from_toml_str(toml_with_unknown).unwrap();
    assert_eq!(config.general.log_level, LogLevel::Info);
}

#[test]
fn log_level_directive_matches_serde_name() {
    for level in [
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
    ] {
        let toml_str = format!("log_level = \"{level}\"");
        let general: crate::config::GeneralConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(general.log_level, level);
    }
}

#[test]
fn media_config_ignores_by_substring() {
    let media = MediaConfig {
        ignored_apps: vec!["chrome".to_string(), String::new()],
        ..MediaConfig::default()
    };

    assert!(media.is_ignored("chrome.exe"));
    assert!(media.is_ignored("com.google.chrome"));
    assert!(!media.is_ignored("Spotify.exe"));
}

#[test]
fn media_config_patterns_match_inside_longer_ids() {
    let media = MediaConfig {
        ignored_apps: vec!["spotify".to_string()],
        ..MediaConfig::default()
    };

    assert!(media.is_ignored("com.spotify.Client"));
    assert!(!media.is_ignored("Spotify.exe"));

    let exact = MediaConfig {
        ignored_apps: vec!["Spotify.exe".to_string()],
        ..MediaConfig::default()
    };
    assert!(exact.is_ignored("Spotify.exe"));
    assert!(!exact.is_ignored("com.spotify.Client"));
}
