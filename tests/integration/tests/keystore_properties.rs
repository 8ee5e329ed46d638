//! End-to-end properties of the keystore engine.

use std::sync::Arc;

use oubliette_integration_tests::{memory_keystore, BreakableHardware, ScriptedStore};
use oubliette_keystore::scheme::{envelope, V1_PARAMS};
use oubliette_keystore::{
    Accessibility, EncryptionScheme, HardwareError, HardwareScheme, ItemDescriptor, Keystore,
    KeystoreError, MemoryItemStore, SchemeRegistry, SecureHardware, SoftwareHardware,
    StoreStatus, WipeLedger,
};
use serde_json::json;

fn item(alias: &str) -> ItemDescriptor {
    ItemDescriptor::new(alias).unwrap().with_service("svc")
}

fn hw_item(alias: &str) -> ItemDescriptor {
    item(alias).with_hardware_protection(true)
}

#[tokio::test]
async fn test_hardware_round_trip_for_many_payloads() {
    let (ks, _store, _ledger) = memory_keystore();
    let payloads: Vec<Vec<u8>> = vec![
        Vec::new(),
        b"x".to_vec(),
        b"secret123".to_vec(),
        (0u8..=255).collect(),
        vec![0xA5; 1024],
    ];

    for (i, payload) in payloads.iter().enumerate() {
        let alias = format!("item-{i}");
        ks.add(hw_item(&alias), payload.clone().into()).await.unwrap();
        let read = ks.read(hw_item(&alias)).await.unwrap().unwrap();
        assert_eq!(read.expose_secret(), payload.as_slice(), "payload {i}");
    }
}

#[tokio::test]
async fn test_update_not_duplicate() {
    let (ks, store, _ledger) = memory_keystore();
    ks.add(hw_item("token"), "first".into()).await.unwrap();
    ks.add(hw_item("token"), "second".into()).await.unwrap();

    assert_eq!(store.len(), 1);
    let read = ks.read(hw_item("token")).await.unwrap().unwrap();
    assert_eq!(read.expose_secret(), b"second");
}

#[tokio::test]
async fn test_update_keeps_original_accessibility() {
    let (ks, store, _ledger) = memory_keystore();
    ks.add(
        item("token").with_accessibility(Accessibility::AfterFirstUnlockThisDeviceOnly),
        "a".into(),
    )
    .await
    .unwrap();
    ks.add(item("token").with_accessibility(Accessibility::WhenUnlocked), "b".into())
        .await
        .unwrap();

    let attrs = store.record_attributes(Some("svc"), "token").unwrap();
    assert_eq!(
        attrs.accessibility,
        Some(Accessibility::AfterFirstUnlockThisDeviceOnly)
    );
}

#[tokio::test]
async fn test_idempotent_delete() {
    let (ks, _store, _ledger) = memory_keystore();
    ks.delete(item("never-stored")).await.unwrap();
    ks.add(item("token"), "x".into()).await.unwrap();
    ks.delete(item("token")).await.unwrap();
    ks.delete(item("token")).await.unwrap();
    assert!(ks.read(item("token")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_version_durability() {
    let store = Arc::new(MemoryItemStore::new());
    let hardware: Arc<dyn SecureHardware> = Arc::new(SoftwareHardware::in_memory());

    let v1_only = Keystore::builder()
        .shared_store(store.clone())
        .registry(SchemeRegistry::standard(hardware.clone(), "durable"))
        .build()
        .unwrap();
    v1_only.add(hw_item("token"), "written-under-v1".into()).await.unwrap();
    v1_only.shutdown();

    let hw1 = hardware.clone();
    let hw2 = hardware.clone();
    let registry = SchemeRegistry::builder(2)
        .register(1, move || {
            Arc::new(HardwareScheme::v1(hw1.clone(), "durable")) as Arc<dyn EncryptionScheme>
        })
        .register(2, move || {
            Arc::new(HardwareScheme::new(2, V1_PARAMS, hw2.clone(), "durable"))
                as Arc<dyn EncryptionScheme>
        })
        .build()
        .unwrap();
    let upgraded = Keystore::builder()
        .shared_store(store.clone())
        .registry(registry)
        .build()
        .unwrap();
    assert_eq!(upgraded.current_scheme_version(), 2);

    // Old record still decrypts through its own version.
    let old = upgraded.read(hw_item("token")).await.unwrap().unwrap();
    assert_eq!(old.expose_secret(), b"written-under-v1");

    // New writes carry the new version.
    upgraded.add(hw_item("fresh"), "written-under-v2".into()).await.unwrap();
    let raw = upgraded.read(item("fresh")).await.unwrap().unwrap();
    assert_eq!(envelope::split(raw.expose_secret()).unwrap().0, 2);
    let fresh = upgraded.read(hw_item("fresh")).await.unwrap().unwrap();
    assert_eq!(fresh.expose_secret(), b"written-under-v2");

    // Rolling back to a v1-only build cannot read v2 data, and says so.
    let rolled_back = Keystore::builder()
        .shared_store(store)
        .registry(SchemeRegistry::standard(hardware, "durable"))
        .build()
        .unwrap();
    assert!(matches!(
        rolled_back.read(hw_item("fresh")).await,
        Err(KeystoreError::UnsupportedSchemeVersion(2))
    ));
}

#[tokio::test]
async fn test_exists_independent_of_decryptability() {
    let hardware = BreakableHardware::new();
    let ks = Keystore::builder()
        .store(MemoryItemStore::new())
        .shared_hardware(hardware.clone())
        .build()
        .unwrap();

    ks.add(hw_item("token"), "secret".into()).await.unwrap();
    hardware.break_keys();

    assert!(ks.exists(hw_item("token")).await.unwrap());
    assert!(matches!(
        ks.read(hw_item("token")).await,
        Err(KeystoreError::HardwareFailure(HardwareError::DecryptionFailed(_)))
    ));
}

#[tokio::test]
async fn test_memory_hygiene_on_success_and_failure() {
    let hardware = BreakableHardware::new();
    let ledger = WipeLedger::new();
    let ks = Keystore::builder()
        .store(MemoryItemStore::new())
        .shared_hardware(hardware.clone())
        .wipe_observer(ledger.clone())
        .build()
        .unwrap();

    ks.add(hw_item("token"), "secret123".into()).await.unwrap();
    ks.read(hw_item("token")).await.unwrap();
    ks.add(item("plain"), "visible".into()).await.unwrap();
    ks.read(item("plain")).await.unwrap();
    let after_success = ledger.acquired_count();
    assert!(after_success > 0);
    assert_eq!(ledger.outstanding(), 0);

    // Failure paths: broken key, oversized payload, corrupted record.
    hardware.break_keys();
    assert!(ks.read(hw_item("token")).await.is_err());
    assert!(ks.add(hw_item("big"), vec![1u8; 4096].into()).await.is_err());
    ks.add(item("short"), vec![0u8; 3].into()).await.unwrap();
    assert!(ks.read(hw_item("short")).await.is_err());

    assert!(ledger.acquired_count() > after_success);
    assert_eq!(ledger.outstanding(), 0);
    assert_eq!(ledger.unwiped(), 0);
}

#[tokio::test]
async fn test_add_then_delete_ordering() {
    let (ks, _store, _ledger) = memory_keystore();

    for round in 0..50 {
        let alias = format!("race-{round}");
        // Issue both before awaiting either.
        let add = ks.add(item(&alias), "A".into());
        let delete = ks.delete(item(&alias));
        let (deleted, added) = tokio::join!(delete, add);
        added.unwrap();
        deleted.unwrap();
        assert!(!ks.exists(item(&alias)).await.unwrap(), "round {round}");
    }
}

#[tokio::test]
async fn test_concurrent_callers_share_one_key_pair() {
    let (ks, _store, _ledger) = memory_keystore();
    let ks = Arc::new(ks);

    let mut handles = Vec::new();
    for i in 0..16 {
        let ks = ks.clone();
        handles.push(tokio::spawn(async move {
            let alias = format!("token-{i}");
            ks.add(hw_item(&alias), format!("value-{i}").as_str().into())
                .await
                .unwrap();
            ks.read(hw_item(&alias)).await.unwrap().unwrap()
        }));
    }
    for (i, handle) in handles.into_iter().enumerate() {
        let value = handle.await.unwrap();
        assert_eq!(value.expose_secret(), format!("value-{i}").as_bytes());
    }
}

#[tokio::test]
async fn test_token_scenario() {
    let (ks, _store, ledger) = memory_keystore();
    let args = json!({
        "alias": "token",
        "service": "svc",
        "hardwareProtection": true,
        "data": "c2VjcmV0MTIz"
    });

    ks.add_with_args(&args).await.unwrap();
    let value = ks
        .read_with_args(&json!({ "alias": "token", "service": "svc", "hardwareProtection": true }))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(value.expose_secret(), b"secret123");
    assert!(ks
        .exists_with_args(&json!({ "alias": "token", "service": "svc" }))
        .await
        .unwrap());

    ks.delete_with_args(&json!({ "alias": "token", "service": "svc" }))
        .await
        .unwrap();
    assert!(ks
        .read_with_args(&json!({ "alias": "token", "service": "svc", "hardwareProtection": true }))
        .await
        .unwrap()
        .is_none());
    assert!(!ks
        .exists_with_args(&json!({ "alias": "token", "service": "svc" }))
        .await
        .unwrap());
    assert_eq!(ledger.outstanding(), 0);
}

#[tokio::test]
async fn test_authentication_outcomes_are_distinct() {
    let store = ScriptedStore::new();
    let ks = Keystore::builder().shared_store(store.clone()).build().unwrap();
    ks.add(item("token"), "x".into()).await.unwrap();

    store.fail_next(StoreStatus::USER_CANCELED);
    assert!(matches!(
        ks.read(item("token")).await,
        Err(KeystoreError::AuthCancelled)
    ));

    store.fail_next(StoreStatus::AUTH_FAILED);
    assert!(matches!(
        ks.read(item("token")).await,
        Err(KeystoreError::AuthFailed)
    ));

    store.fail_next(StoreStatus::INTERACTION_NOT_ALLOWED);
    assert!(matches!(
        ks.read(item("token")).await,
        Err(KeystoreError::InteractionBlocked)
    ));

    store.fail_next(StoreStatus(-34018));
    match ks.read(item("token")).await {
        Err(KeystoreError::StoreFailure { status, context }) => {
            assert_eq!(status.code(), -34018);
            assert_eq!(context, "read");
        }
        other => panic!("unexpected {other:?}"),
    }

    // No retries: the next call succeeds on its own.
    assert!(ks.read(item("token")).await.unwrap().is_some());
}

#[tokio::test]
async fn test_store_failure_on_delete_is_not_swallowed() {
    let store = ScriptedStore::new();
    let ks = Keystore::builder().shared_store(store.clone()).build().unwrap();

    store.fail_next(StoreStatus::IO);
    assert!(matches!(
        ks.delete(item("token")).await,
        Err(KeystoreError::StoreFailure { .. })
    ));
}

#[tokio::test]
async fn test_update_race_reports_not_found() {
    let store = ScriptedStore::new();
    let ks = Keystore::builder().shared_store(store.clone()).build().unwrap();

    // The create reports a duplicate, then the item is gone for the update.
    store.fail_next(StoreStatus::DUPLICATE_ITEM);
    assert!(matches!(
        ks.add(item("token"), "x".into()).await,
        Err(KeystoreError::NotFound)
    ));
}

#[tokio::test]
async fn test_services_are_isolated() {
    let (ks, _store, _ledger) = memory_keystore();
    let a = ItemDescriptor::new("token").unwrap().with_service("a");
    let b = ItemDescriptor::new("token").unwrap().with_service("b");
    let default = ItemDescriptor::new("token").unwrap();

    ks.add(a.clone().with_hardware_protection(true), "in-a".into()).await.unwrap();
    ks.add(default.clone(), "in-default".into()).await.unwrap();

    assert!(ks.read(b).await.unwrap().is_none());
    assert_eq!(
        ks.read(default).await.unwrap().unwrap().expose_secret(),
        b"in-default"
    );
    assert_eq!(
        ks.read(a.with_hardware_protection(true))
            .await
            .unwrap()
            .unwrap()
            .expose_secret(),
        b"in-a"
    );
}

#[tokio::test]
async fn test_bad_arguments() {
    let (ks, _store, _ledger) = memory_keystore();
    for args in [json!({}), json!({ "alias": 7 }), json!({ "alias": "" }), json!("token")] {
        assert!(
            matches!(ks.exists_with_args(&args).await, Err(KeystoreError::BadArguments(_))),
            "{args}"
        );
    }
}

#[tokio::test]
async fn test_shutdown_drains_pending_work() {
    let (ks, store, _ledger) = memory_keystore();
    let pending: Vec<_> = (0..10)
        .map(|i| ks.add(item(&format!("queued-{i}")), "v".into()))
        .collect();
    ks.shutdown();
    assert_eq!(store.len(), 10);
    for p in pending {
        p.await.unwrap();
    }
    assert!(matches!(
        ks.read(item("queued-0")).await,
        Err(KeystoreError::EngineUnavailable(_))
    ));
}
