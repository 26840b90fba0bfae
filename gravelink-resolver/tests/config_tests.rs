//! Integration tests for loading resolver settings from a config file

use gravelink_common::config::{load_config, TomlConfig, CONFIG_ENV_VAR};
use gravelink_resolver::{ResolverConfig, SourceCollection};
use serial_test::serial;
use std::env;
use std::time::Duration;
use tempfile::TempDir;

#[test]
#[serial]
fn test_resolver_section_from_env_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("gravelink.toml");
    std::fs::write(
        &path,
        r#"
[logging]
level = "gravelink_resolver=debug"

[resolver]
min_person_batch_size = 5
max_person_batch_size = 20
person_batch_interval_ms = 2000
source_collection = "billion_graves"
web_base_url = "http://localhost:8080/"
"#,
    )
    .unwrap();

    env::set_var(CONFIG_ENV_VAR, &path);
    let toml_config = load_config(None);
    env::remove_var(CONFIG_ENV_VAR);

    let toml_config = toml_config.unwrap();
    assert_eq!(toml_config.logging.level, "gravelink_resolver=debug");

    let config = ResolverConfig::from_toml(&toml_config).unwrap();
    assert_eq!(config.min_person_batch_size, 5);
    assert_eq!(config.max_person_batch_size, 20);
    assert_eq!(config.person_batch_interval(), Duration::from_secs(2));
    assert_eq!(config.source_collection, SourceCollection::BillionGraves);
    assert_eq!(config.base_url(), "http://localhost:8080");
    // Untouched keys keep their defaults
    assert_eq!(config.max_requests_per_second, 2);
    assert_eq!(config.anonymous_session_max_age(), Duration::from_secs(600));
}

#[test]
fn test_empty_file_gives_default_resolver() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("empty.toml");
    std::fs::write(&path, "").unwrap();

    let toml_config = load_config(Some(&path)).unwrap();
    assert_eq!(toml_config, TomlConfig::default());
    assert_eq!(
        ResolverConfig::from_toml(&toml_config).unwrap(),
        ResolverConfig::default()
    );
}

#[test]
fn test_inconsistent_batch_sizes_rejected() {
    let toml_config = TomlConfig::from_toml_str(
        r#"
[resolver]
min_person_batch_size = 30
max_person_batch_size = 10
"#,
    )
    .unwrap();

    let err = ResolverConfig::from_toml(&toml_config).unwrap_err();
    assert!(err.to_string().contains("max_person_batch_size"));
}

#[test]
fn test_unknown_collection_rejected() {
    let toml_config = TomlConfig::from_toml_str(
        r#"
[resolver]
source_collection = "ancestry"
"#,
    )
    .unwrap();

    assert!(ResolverConfig::from_toml(&toml_config).is_err());
}
