//! Config save/load roundtrip integration tests.
//!
//! These tests verify that configuration can be serialized, written to disk,
//! loaded back, and used to open a working keystore.

use oubliette_core::config::{Config, ConfigBuilder, HardwareBackend, LogLevel, StoreBackend};
use oubliette_core::Accessibility;
use oubliette_keystore::{ItemDescriptor, Keystore};
use std::path::Path;
use tempfile::TempDir;

#[test]
fn test_config_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("oubliette.json5");

    let config = Config::default();
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.store.backend, config.store.backend);
    assert_eq!(loaded.hardware.backend, config.hardware.backend);
    assert_eq!(loaded.keystore.label_prefix, config.keystore.label_prefix);
    assert_eq!(
        loaded.keystore.default_accessibility,
        config.keystore.default_accessibility
    );
}

#[test]
fn test_config_modify_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("oubliette.json5");

    let config = ConfigBuilder::new()
        .store_backend(StoreBackend::Memory)
        .label_prefix("work")
        .default_accessibility(Accessibility::AfterFirstUnlock)
        .log_level(LogLevel::Debug)
        .build();
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.store.backend, StoreBackend::Memory);
    assert_eq!(loaded.keystore.label_prefix, "work");
    assert_eq!(
        loaded.keystore.default_accessibility,
        Accessibility::AfterFirstUnlock
    );
    assert_eq!(loaded.logging.level, LogLevel::Debug);
}

#[test]
fn test_config_json5_with_comments() {
    let config = Config::parse(
        r#"{
            // keep items in memory for this test
            store: { backend: 'memory' },
            keystore: { default_accessibility: 'whenUnlocked', },
        }"#,
    )
    .unwrap();
    assert_eq!(config.store.backend, StoreBackend::Memory);
    assert_eq!(config.keystore.default_accessibility, Accessibility::WhenUnlocked);
    assert_eq!(config.keystore.label_prefix, "oubliette");
    config.validate().unwrap();
}

#[test]
fn test_config_load_nonexistent() {
    let result = Config::load(Path::new("/nonexistent/oubliette.json5"));
    assert!(result.is_err());
}

#[test]
fn test_config_parse_invalid() {
    let result = Config::parse("not valid json");
    assert!(result.is_err());
}

#[tokio::test]
async fn test_loaded_config_opens_persistent_keystore() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("oubliette.json5");
    ConfigBuilder::new()
        .store_backend(StoreBackend::File)
        .store_path(dir.path().join("items"))
        .hardware_backend(HardwareBackend::Software)
        .key_dir(dir.path().join("keys"))
        .build()
        .save(&path)
        .unwrap();

    let config = Config::load(&path).unwrap();
    config.validate().unwrap();
    let token = ItemDescriptor::new("token")
        .unwrap()
        .with_service("svc")
        .with_hardware_protection(true);

    let writer = Keystore::from_config(&config).unwrap();
    writer.add(token.clone(), "secret123".into()).await.unwrap();
    writer.shutdown();

    let reader = Keystore::from_config(&config).unwrap();
    let value = reader.read(token).await.unwrap().unwrap();
    assert_eq!(value.expose_secret(), b"secret123");
}
