//! Behaviour Contract Test: Traffic Accounting
//!
//! Constraints verified:
//! - Monthly totals telescope to (last - first) + first over a month of
//!   monotone samples
//! - A counter that goes backwards counts the full new reading
//! - The first sample of an entity counts its full cumulative value
//! - Concurrent samples for the same entity never double count
//!
//! If this test fails, the ledger is over- or under-counting traffic.

mod common;

use common::*;
use routerstats_core::TrafficAccountant;
use routerstats_core::state::MemoryTrafficStore;
use routerstats_core::traits::TrafficStore;
use std::sync::Arc;

#[tokio::test]
async fn end_to_end_sequence_with_reboot() {
    let store = MemoryTrafficStore::new();
    let accountant = TrafficAccountant::new(Box::new(store.clone()));
    let mac = "aa:bb:cc:dd:ee:ff";

    accountant
        .record_sample(mac, 1000, 200, ts("2025-03-10 10:00:00"))
        .await
        .unwrap();
    accountant
        .record_sample(mac, 1500, 250, ts("2025-03-10 10:05:00"))
        .await
        .unwrap();
    // Device rebooted between samples
    let outcome = accountant
        .record_sample(mac, 100, 50, ts("2025-03-10 10:10:00"))
        .await
        .unwrap();
    assert!(outcome.counter_reset);

    let monthly = store.get_monthly(mac).await.unwrap().unwrap();
    assert_eq!((monthly.rx_bytes, monthly.tx_bytes), (1600, 300));
    assert_eq!(monthly.timestamp, ts("2025-03-10 10:10:00"));

    let counter = store.get_counter(mac).await.unwrap().unwrap();
    assert_eq!((counter.rx_bytes, counter.tx_bytes), (100, 50));
}

#[tokio::test]
async fn monotone_samples_telescope() {
    let store = MemoryTrafficStore::new();
    let accountant = TrafficAccountant::new(Box::new(store.clone()));

    let samples: [(u64, u64); 6] = [
        (4_000, 900),
        (4_000, 900),
        (7_250, 1_100),
        (9_000, 1_100),
        (1_000_000, 20_000),
        (1_000_001, 20_003),
    ];

    for (minute, (rx, tx)) in samples.iter().enumerate() {
        let now = ts(&format!("2025-08-14 09:{:02}:00", minute * 5));
        accountant.record_sample("main_wan", *rx, *tx, now).await.unwrap();
    }

    let (first, last) = (samples[0], samples[samples.len() - 1]);
    let monthly = store.get_monthly("main_wan").await.unwrap().unwrap();
    assert_eq!(monthly.rx_bytes, (last.0 - first.0) + first.0);
    assert_eq!(monthly.tx_bytes, (last.1 - first.1) + first.1);
}

#[tokio::test]
async fn counter_reset_counts_new_reading() {
    let store = MemoryTrafficStore::new();
    store.put_counter("main_wan", 100, 100).await.unwrap();
    let accountant = TrafficAccountant::new(Box::new(store.clone()));

    let outcome = accountant
        .record_sample("main_wan", 30, 130, ts("2025-05-01 12:00:00"))
        .await
        .unwrap();

    assert_eq!((outcome.delta_rx, outcome.delta_tx), (30, 30));
    assert!(outcome.counter_reset);
    assert!(!outcome.first_observation);
}

#[tokio::test]
async fn first_sample_counts_full_value() {
    let store = MemoryTrafficStore::new();
    let accountant = TrafficAccountant::new(Box::new(store.clone()));

    accountant
        .record_sample("11:22:33:44:55:66", 500, 40, ts("2025-05-01 12:00:00"))
        .await
        .unwrap();

    let monthly = store.get_monthly("11:22:33:44:55:66").await.unwrap().unwrap();
    assert_eq!((monthly.rx_bytes, monthly.tx_bytes), (500, 40));
    let counter = store.get_counter("11:22:33:44:55:66").await.unwrap().unwrap();
    assert_eq!((counter.rx_bytes, counter.tx_bytes), (500, 40));
}

#[tokio::test]
async fn entities_are_accounted_independently() {
    let store = MemoryTrafficStore::new();
    let accountant = TrafficAccountant::new(Box::new(store.clone()));
    let now = ts("2025-05-01 12:00:00");

    accountant.record_sample("main_wan", 1000, 100, now).await.unwrap();
    accountant.record_sample("aa:aa:aa:aa:aa:aa", 10, 1, now).await.unwrap();
    accountant.record_sample("main_wan", 1500, 150, now).await.unwrap();

    let wan = store.get_monthly("main_wan").await.unwrap().unwrap();
    let client = store.get_monthly("aa:aa:aa:aa:aa:aa").await.unwrap().unwrap();
    assert_eq!((wan.rx_bytes, wan.tx_bytes), (1500, 150));
    assert_eq!((client.rx_bytes, client.tx_bytes), (10, 1));

    let mut entities = store.list_entities().await.unwrap();
    entities.sort();
    assert_eq!(entities, vec!["aa:aa:aa:aa:aa:aa", "main_wan"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_samples_for_one_entity_are_serialized() {
    // Every task reports the same cumulative reading. Only the first one to
    // run may see no baseline; the rest must see a zero delta.
    let store = MemoryTrafficStore::new();
    let accountant = Arc::new(TrafficAccountant::new(Box::new(store.clone())));
    let now = ts("2025-05-01 12:00:00");

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let accountant = Arc::clone(&accountant);
            tokio::spawn(async move {
                accountant
                    .record_sample("main_wan", 5_000, 700, now)
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut first_observations = 0;
    for handle in handles {
        if handle.await.unwrap().first_observation {
            first_observations += 1;
        }
    }

    assert_eq!(first_observations, 1);
    let monthly = store.get_monthly("main_wan").await.unwrap().unwrap();
    assert_eq!((monthly.rx_bytes, monthly.tx_bytes), (5_000, 700));
}
