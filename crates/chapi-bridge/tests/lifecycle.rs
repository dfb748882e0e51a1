mod common;

use std::sync::Arc;

use chapi_bridge::error::{BridgeError, LifecycleError};
use chapi_bridge::{
    BridgeConfig, EngineLocking, LifecycleState, RegistryLifecycle, RegistryStore, SearchField,
};
use common::{open_with, stored, MemoryEngine};
use pretty_assertions::assert_eq;

fn counts(engine: &MemoryEngine) -> (usize, usize) {
    let st = engine.state.lock();
    (st.inits, st.finalizes)
}

#[test]
fn stores_share_one_engine_initialization() {
    let engine = MemoryEngine::new();
    let lifecycle = Arc::new(RegistryLifecycle::new());

    let a = RegistryStore::open(engine.clone(), lifecycle.clone(), BridgeConfig::default()).unwrap();
    let b = RegistryStore::open(engine.clone(), lifecycle.clone(), BridgeConfig::default()).unwrap();
    assert_eq!(lifecycle.state(), LifecycleState::Active(2));
    assert_eq!(counts(&engine), (1, 0));

    drop(a);
    assert_eq!(counts(&engine), (1, 0));
    assert!(lifecycle.is_active());

    b.close().unwrap();
    assert_eq!(counts(&engine), (1, 1));
    assert_eq!(lifecycle.state(), LifecycleState::Uninitialized);

    // Closing again, and the drop that follows, must not finalize twice.
    b.close().unwrap();
    drop(b);
    assert_eq!(counts(&engine), (1, 1));
    assert_eq!(
        engine.calls(),
        vec!["initialize", "check_internal_handlers", "finalize"]
    );
}

#[test]
fn failed_initialization_opens_nothing() {
    let engine = MemoryEngine::new();
    engine.state.lock().fail_init = true;
    let lifecycle = Arc::new(RegistryLifecycle::new());

    let err = RegistryStore::open(engine.clone(), lifecycle.clone(), BridgeConfig::default())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        BridgeError::Lifecycle(LifecycleError::InitFailed(_))
    ));
    assert_eq!(lifecycle.state(), LifecycleState::Uninitialized);
    assert_eq!(counts(&engine), (0, 0));
}

#[test]
fn internal_handler_check_is_configurable() {
    let engine = MemoryEngine::new();
    let config = BridgeConfig {
        check_internal_handlers: false,
        ..Default::default()
    };
    let (_store, _) = open_with(&engine, config);
    assert!(!engine.calls().contains(&"check_internal_handlers"));
}

#[test]
fn unbalanced_finalize_is_reported_distinctly() {
    let engine = MemoryEngine::new();
    let lifecycle = RegistryLifecycle::new();

    let err = lifecycle.finalize(engine.as_ref()).unwrap_err();
    assert_eq!(err, LifecycleError::Unbalanced);
    assert!(BridgeError::from(err).is_unbalanced_lifecycle());
    assert_eq!(counts(&engine), (0, 0));
}

#[test]
fn closed_store_refuses_operations() {
    let engine = MemoryEngine::new();
    let (store, _) = open_with(&engine, BridgeConfig::default());
    store.close().unwrap();

    assert!(matches!(
        store.find_handler(None, SearchField::Id, "app://x"),
        Err(BridgeError::Closed)
    ));
    assert!(matches!(store.unregister("app://x"), Err(BridgeError::Closed)));
    assert!(!store.is_open());
}

#[test]
fn shared_reads_allow_concurrent_queries() {
    let engine = MemoryEngine::with(vec![stored("app://x", 1, "com.example.X")]);
    let config = BridgeConfig {
        locking: EngineLocking::SharedReads,
        ..Default::default()
    };
    let (store, _) = open_with(&engine, config);
    let store = Arc::new(store);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..50 {
                    let found = store.find_handlers(None, SearchField::Id, "app://x").unwrap();
                    assert_eq!(found.len(), 1);
                    assert!(!store.unregister("app://none").unwrap());
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(engine.calls().len(), 2 + 4 * 50 * 2);
}

#[test]
fn global_guard_is_shared() {
    let a = RegistryLifecycle::global();
    let b = RegistryLifecycle::global();
    assert!(Arc::ptr_eq(&a, &b));
}
