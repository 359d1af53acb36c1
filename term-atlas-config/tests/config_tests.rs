//! Integration tests for term-atlas-config loading and saving.

use term_atlas_config::{AtlasConfig, ConfigError, LogLevel};

#[test]
fn test_config_defaults() {
    let config = AtlasConfig::default();
    assert_eq!(config.cell_width, 16);
    assert_eq!(config.cell_height, 32);
    assert_eq!(config.capacity, 2880);
    assert_eq!(config.headroom_percent, 50);
    assert_eq!(config.label, "glyph atlas");
    assert_eq!(config.log_level, LogLevel::Off);
}

#[test]
fn test_config_builders() {
    let config = AtlasConfig::new()
        .with_cell_size(9, 18)
        .with_capacity(64)
        .with_label("pane 1");
    assert_eq!((config.cell_width, config.cell_height), (9, 18));
    assert_eq!(config.capacity, 64);
    assert_eq!(config.label, "pane 1");
}

#[test]
fn test_config_yaml_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("atlas.yaml");

    let config = AtlasConfig::new().with_capacity(128).with_label("saved");
    config.save_to(&path).unwrap();
    assert!(path.exists());
    assert!(!path.with_extension("yaml.tmp").exists());

    let loaded = AtlasConfig::load_from(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_config_partial_yaml_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("atlas.yaml");
    std::fs::write(&path, "capacity: 300\nlog_level: debug\n").unwrap();

    let config = AtlasConfig::load_from(&path).unwrap();
    assert_eq!(config.capacity, 300);
    assert_eq!(config.log_level, LogLevel::Debug);
    assert_eq!(config.cell_width, 16);
    assert_eq!(config.label, "glyph atlas");
}

#[test]
fn test_config_invalid_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("atlas.yaml");
    std::fs::write(&path, "capacity: [not a number\n").unwrap();

    assert!(matches!(
        AtlasConfig::load_from(&path),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn test_config_validation_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("atlas.yaml");
    std::fs::write(&path, "cell_width: 0\n").unwrap();

    assert!(matches!(
        AtlasConfig::load_from(&path),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn test_config_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        AtlasConfig::load_from(&dir.path().join("absent.yaml")),
        Err(ConfigError::Io(_))
    ));
}

#[test]
fn test_config_path_under_config_dir() {
    let path = AtlasConfig::config_path();
    assert!(path.ends_with("term-atlas/atlas.yaml"));
    assert!(path.starts_with(AtlasConfig::config_dir()));
}
