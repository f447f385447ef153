//! Integration tests for the subscription store.

use location_subscriptions::{
    StoreConfig, SubscriptionId, SubscriptionRequest, SubscriptionStore,
};
use tempfile::TempDir;

fn test_store(dir: &TempDir) -> SubscriptionStore {
    SubscriptionStore::open(StoreConfig {
        path: dir.path().join("store"),
        ..Default::default()
    })
    .unwrap()
}

fn req(provider: &str, max_delay: u64, min_distance: f64) -> SubscriptionRequest {
    SubscriptionRequest::new(provider, max_delay, min_distance)
}

// --- Realistic Workflow Tests ---

#[test]
fn test_gps_and_network_workflow() {
    let dir = TempDir::new().unwrap();
    let store = test_store(&dir);

    store.insert(req("gps", 1000, 10.0)).unwrap();
    store.insert(req("gps", 5000, 0.0)).unwrap();
    store.insert(req("network", 60000, 100.0)).unwrap();

    assert_eq!(store.foremost("gps").unwrap(), Some(req("gps", 1000, 0.0)));
    assert_eq!(
        store.foremost("network").unwrap(),
        Some(req("network", 60000, 100.0))
    );

    assert_eq!(store.delete(&req("gps", 5000, 0.0)).unwrap(), 1);
    assert_eq!(store.foremost("gps").unwrap(), Some(req("gps", 1000, 10.0)));
}

#[test]
fn test_duplicates_are_kept() {
    let dir = TempDir::new().unwrap();
    let store = test_store(&dir);

    let a = store.insert(req("P", 100, 5.0)).unwrap();
    let b = store.insert(req("P", 100, 5.0)).unwrap();
    assert_ne!(a, b);
    assert_eq!(store.len(), 2);
    assert_eq!(store.foremost("P").unwrap(), Some(req("P", 100, 5.0)));

    assert_eq!(store.delete(&req("P", 100, 5.0)).unwrap(), 1);
    assert_eq!(store.len(), 1);
    assert_eq!(store.foremost("P").unwrap(), Some(req("P", 100, 5.0)));
}

#[test]
fn test_minima_come_from_different_records() {
    let dir = TempDir::new().unwrap();
    let store = test_store(&dir);

    store.insert(req("P", 100, 50.0)).unwrap();
    store.insert(req("P", 500, 5.0)).unwrap();

    let foremost = store.foremost("P").unwrap().unwrap();
    assert_eq!(foremost, req("P", 100, 5.0));

    // Neither stored record is returned verbatim.
    assert_eq!(store.find_matching_id(&foremost).unwrap(), None);
}

#[test]
fn test_foremost_without_subscribers() {
    let dir = TempDir::new().unwrap();
    let store = test_store(&dir);

    assert_eq!(store.foremost("gps").unwrap(), None);

    store.insert(req("gps", 100, 1.0)).unwrap();
    store.delete(&req("gps", 100, 1.0)).unwrap();
    assert_eq!(store.foremost("gps").unwrap(), None);
}

#[test]
fn test_delete_removes_oldest_match() {
    let dir = TempDir::new().unwrap();
    let store = test_store(&dir);

    let first = store.insert(req("P", 100, 5.0)).unwrap();
    let second = store.insert(req("P", 100, 5.0)).unwrap();
    assert!(first < second);

    assert_eq!(store.find_matching_id(&req("P", 100, 5.0)).unwrap(), Some(first));
    assert_eq!(store.delete(&req("P", 100, 5.0)).unwrap(), 1);
    assert_eq!(store.find_matching_id(&req("P", 100, 5.0)).unwrap(), Some(second));

    assert_eq!(store.delete(&req("P", 100, 5.0)).unwrap(), 1);
    assert_eq!(store.delete(&req("P", 100, 5.0)).unwrap(), 0);
    assert_eq!(store.find_matching_id(&req("P", 100, 5.0)).unwrap(), None);
}

#[test]
fn test_delete_requires_exact_match() {
    let dir = TempDir::new().unwrap();
    let store = test_store(&dir);

    store.insert(req("gps", 100, 5.0)).unwrap();

    assert_eq!(store.delete(&req("GPS", 100, 5.0)).unwrap(), 0);
    assert_eq!(store.delete(&req("gps", 101, 5.0)).unwrap(), 0);
    assert_eq!(store.delete(&req("gps", 100, 5.5)).unwrap(), 0);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_provider_isolation() {
    let dir = TempDir::new().unwrap();
    let store = test_store(&dir);

    store.insert(req("B", 10_000, 100.0)).unwrap();
    store.insert(req("A", 1, 0.0)).unwrap();
    store.insert(req("A", 2, 0.5)).unwrap();

    assert_eq!(store.foremost("B").unwrap(), Some(req("B", 10_000, 100.0)));
    assert_eq!(store.foremost("a").unwrap(), None);
    assert_eq!(
        store.providers().unwrap(),
        vec!["A".to_string(), "B".to_string()]
    );
}

#[test]
fn test_clear_forgets_everything() {
    let dir = TempDir::new().unwrap();
    let store = test_store(&dir);

    let inserted = vec![
        req("gps", 1000, 10.0),
        req("gps", 5000, 0.0),
        req("network", 60000, 100.0),
    ];
    for request in &inserted {
        store.insert(request.clone()).unwrap();
    }

    store.clear().unwrap();

    assert!(store.is_empty());
    for request in &inserted {
        assert_eq!(store.foremost(&request.provider).unwrap(), None);
        assert_eq!(store.find_matching_id(request).unwrap(), None);
    }

    // Ids issued before the clear stay retired.
    let id = store.insert(req("gps", 1, 1.0)).unwrap();
    assert_eq!(id, SubscriptionId(4));
}

#[test]
fn test_subscriptions_snapshot_in_id_order() {
    let dir = TempDir::new().unwrap();
    let store = test_store(&dir);

    store.insert(req("network", 3, 3.0)).unwrap();
    store.insert(req("gps", 1, 1.0)).unwrap();
    store.insert(req("network", 2, 2.0)).unwrap();
    store.delete(&req("gps", 1, 1.0)).unwrap();

    let rows = store.subscriptions().unwrap();
    let ids: Vec<u64> = rows.iter().map(|row| row.id.0).collect();
    assert_eq!(ids, vec![1, 3]);
    assert_eq!(rows[1].request, req("network", 2, 2.0));
}

// --- Persistence Tests ---

#[test]
fn test_reopen_keeps_subscriptions() {
    let dir = TempDir::new().unwrap();

    let (first, second) = {
        let store = test_store(&dir);
        let first = store.insert(req("gps", 1000, 10.0)).unwrap();
        let second = store.insert(req("gps", 1000, 10.0)).unwrap();
        store.insert(req("network", 60000, 100.0)).unwrap();
        store.delete(&req("network", 60000, 100.0)).unwrap();
        (first, second)
    };

    let store = test_store(&dir);
    assert_eq!(store.len(), 2);
    assert_eq!(store.foremost("gps").unwrap(), Some(req("gps", 1000, 10.0)));
    assert_eq!(store.foremost("network").unwrap(), None);
    assert_eq!(store.find_matching_id(&req("gps", 1000, 10.0)).unwrap(), Some(first));

    store.delete(&req("gps", 1000, 10.0)).unwrap();
    assert_eq!(store.find_matching_id(&req("gps", 1000, 10.0)).unwrap(), Some(second));

    // The deleted network row's id is not handed out again.
    let next = store.insert(req("passive", 0, 0.0)).unwrap();
    assert_eq!(next, SubscriptionId(4));
}

#[test]
fn test_reset_all_on_open() {
    let dir = TempDir::new().unwrap();

    {
        let store = test_store(&dir);
        store.insert(req("gps", 1000, 10.0)).unwrap();
        store.insert(req("network", 60000, 100.0)).unwrap();
    }

    let store = SubscriptionStore::open(StoreConfig {
        path: dir.path().join("store"),
        reset_all: true,
        ..Default::default()
    })
    .unwrap();

    assert!(store.is_empty());
    assert_eq!(store.foremost("gps").unwrap(), None);
    assert_eq!(store.insert(req("gps", 1, 1.0)).unwrap(), SubscriptionId(3));
    drop(store);

    let store = test_store(&dir);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_unsynced_writes_survive_close() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig {
        path: dir.path().join("store"),
        sync_writes: false,
        ..Default::default()
    };

    {
        let store = SubscriptionStore::open(config.clone()).unwrap();
        for i in 0..50 {
            store.insert(req("gps", 1000 + i, 1.0)).unwrap();
        }
        store.sync().unwrap();
        store.close();
    }

    let store = SubscriptionStore::open(config).unwrap();
    assert_eq!(store.len(), 50);
    assert_eq!(store.foremost("gps").unwrap(), Some(req("gps", 1000, 1.0)));
}

#[test]
fn test_in_memory_store() {
    let store = SubscriptionStore::open_in_memory(true);
    assert!(store.path().is_none());

    store.insert(req("gps", 1000, 10.0)).unwrap();
    store.insert(req("gps", 5000, 0.0)).unwrap();

    assert_eq!(store.foremost("gps").unwrap(), Some(req("gps", 1000, 0.0)));
    assert_eq!(store.stats().journal_entries, 0);
}
