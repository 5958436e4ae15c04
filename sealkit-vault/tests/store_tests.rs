//! Expiring key-value store behaviour through the public trait.

mod common;

use std::sync::Arc;
use std::thread;

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use sealkit_vault::{KeyValueStore, ManualClock, MemoryStore};

fn store() -> (Arc<MemoryStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    (Arc::new(MemoryStore::with_clock(clock.clone())), clock)
}

// ── Basic Operations ──

#[test]
fn put_get_replace() {
    let (store, _) = store();
    assert_eq!(store.get("missing").unwrap(), None);
    store.put("k", b"one".to_vec(), None).unwrap();
    store.put("k", b"two".to_vec(), None).unwrap();
    assert_eq!(store.get("k").unwrap(), Some(b"two".to_vec()));
    assert_eq!(store.len(), 1);
}

#[test]
fn take_removes_entry() {
    let (store, _) = store();
    store.put("k", b"v".to_vec(), None).unwrap();
    assert_eq!(store.take("k").unwrap(), Some(b"v".to_vec()));
    assert_eq!(store.take("k").unwrap(), None);
    assert!(store.is_empty());
}

#[test]
fn delete_reports_whether_live_entry_existed() {
    let (store, clock) = store();
    store.put("live", vec![1], None).unwrap();
    store.put("stale", vec![2], Some(Duration::seconds(1))).unwrap();
    clock.advance(Duration::seconds(1));

    assert!(store.delete("live").unwrap());
    assert!(!store.delete("live").unwrap());
    assert!(!store.delete("stale").unwrap());
    assert!(store.is_empty());
}

// ── Expiry ──

#[test]
fn expired_entries_are_invisible_before_purge() {
    let (store, clock) = store();
    store.put("k", b"v".to_vec(), Some(Duration::minutes(5))).unwrap();
    clock.advance(Duration::minutes(5));

    assert_eq!(store.get("k").unwrap(), None);
    assert_eq!(store.take("k").unwrap(), None);
    assert!(store.is_empty());
}

#[test]
fn purge_drops_only_expired() {
    let (store, clock) = store();
    for i in 0..5 {
        store
            .put(&format!("short-{i}"), vec![i], Some(Duration::seconds(10)))
            .unwrap();
    }
    store.put("kept", vec![9], Some(Duration::hours(1))).unwrap();
    clock.advance(Duration::seconds(30));

    assert_eq!(store.purge_expired().unwrap(), 5);
    assert_eq!(store.purge_expired().unwrap(), 0);
    assert_eq!(store.len(), 1);
    assert!(store.contains("kept").unwrap());
}

// ── Concurrency ──

#[test]
fn take_hands_out_each_entry_once() {
    common::init_tracing();
    let (store, _) = store();
    store.put("ticket", b"only one".to_vec(), None).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            thread::spawn(move || store.take("ticket").unwrap())
        })
        .collect();
    let winners = handles
        .into_iter()
        .filter_map(|h| h.join().unwrap())
        .count();
    assert_eq!(winners, 1);
}

#[test]
fn put_if_absent_has_one_winner() {
    let (store, _) = store();
    let handles: Vec<_> = (0..8u8)
        .map(|i| {
            let store = store.clone();
            thread::spawn(move || store.put_if_absent("slot", vec![i], None).unwrap())
        })
        .collect();
    let inserted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(inserted, 1);
}
