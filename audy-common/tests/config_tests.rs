//! Configuration loading and root folder resolution tests
//!
//! Tests that touch AUDY_ROOT_FOLDER run under #[serial] so they do not
//! race on the process environment.

use audy_common::config::{
    default_root_folder, load_toml_config, write_toml_config, LibraryConfig, LoggingConfig,
    RootFolderResolver, TomlConfig, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_missing_toml_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("does-not-exist.toml");

    let config = load_toml_config(&path).expect("Missing file must not be fatal");
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_invalid_toml_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("audy.toml");
    std::fs::write(&path, "port = \"not a number\"").unwrap();

    let err = load_toml_config(&path).unwrap_err();
    assert!(matches!(err, audy_common::Error::Config(_)));
}

#[test]
fn test_write_then_load_preserves_values() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("audy.toml");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/srv/audy")),
        port: 8181,
        bind: "127.0.0.1".to_string(),
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
        library: LibraryConfig {
            chunk_size: 1024,
            ..LibraryConfig::default()
        },
    };

    write_toml_config(&config, &path).unwrap();
    let loaded = load_toml_config(&path).unwrap();

    assert_eq!(loaded, config);
    assert!(!path.with_extension("toml.tmp").exists());
}

#[test]
#[serial]
fn test_resolver_prefers_cli_argument() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/audy-env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/audy-toml")),
        ..TomlConfig::default()
    };

    let resolver = RootFolderResolver::new(Some(PathBuf::from("/tmp/audy-cli")), &toml);
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/audy-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_env_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/audy-env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/audy-toml")),
        ..TomlConfig::default()
    };

    let resolver = RootFolderResolver::new(None, &toml);
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/audy-env"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_falls_back_to_toml_then_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/audy-toml")),
        ..TomlConfig::default()
    };
    assert_eq!(
        RootFolderResolver::new(None, &toml).resolve(),
        PathBuf::from("/tmp/audy-toml")
    );

    let resolver = RootFolderResolver::new(None, &TomlConfig::default());
    assert_eq!(resolver.resolve(), default_root_folder());
}
