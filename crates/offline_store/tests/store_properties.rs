//! Property tests for the record store
//!
//! Random sequences of inserts, acknowledgments and cleanups are applied to
//! both backends and checked against a simple model.

use offline_store::{
    Collection, FileRecordStore, MemoryRecordStore, Payload, RecordId, RecordStore,
};
use proptest::prelude::*;
use serde_json::json;

#[derive(Clone, Debug)]
enum Step {
    Insert(i64),
    MarkSynced(usize),
    ClearSynced,
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => (1i64..500).prop_map(Step::Insert),
        2 => (0usize..32).prop_map(Step::MarkSynced),
        1 => Just(Step::ClearSynced),
    ]
}

fn payload(exercise: i64) -> Payload {
    json!({ "uebung_id": exercise }).as_object().cloned().unwrap()
}

/// Apply the steps and return (expected unsynced ids, observed unsynced ids)
async fn run_steps<S: RecordStore>(store: &S, steps: &[Step]) -> (Vec<RecordId>, Vec<RecordId>) {
    // Model: (id, synced) in insertion order
    let mut model: Vec<(RecordId, bool)> = Vec::new();

    for step in steps {
        match step {
            Step::Insert(exercise) => {
                let id = store
                    .insert(Collection::TrainingData, payload(*exercise))
                    .await
                    .unwrap();
                model.push((id, false));
            }
            Step::MarkSynced(index) => {
                if model.is_empty() {
                    continue;
                }
                let slot = index % model.len();
                store
                    .mark_synced(Collection::TrainingData, model[slot].0)
                    .await
                    .unwrap();
                model[slot].1 = true;
            }
            Step::ClearSynced => {
                let expected = model.iter().filter(|(_, synced)| *synced).count();
                let deleted = store
                    .clear_where_synced(Collection::TrainingData)
                    .await
                    .unwrap();
                assert_eq!(deleted, expected);
                model.retain(|(_, synced)| !synced);
            }
        }
    }

    let expected = model
        .iter()
        .filter(|(_, synced)| !synced)
        .map(|(id, _)| *id)
        .collect();
    let observed = store
        .filter_by_synced(Collection::TrainingData, false)
        .await
        .unwrap()
        .into_iter()
        .map(|record| record.id)
        .collect();
    (expected, observed)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn prop_filter_by_synced_matches_model(steps in prop::collection::vec(step_strategy(), 0..40)) {
        let (expected, observed) = runtime().block_on(async {
            let store = MemoryRecordStore::new();
            run_steps(&store, &steps).await
        });
        prop_assert_eq!(expected, observed);
    }

    #[test]
    fn prop_timestamps_follow_insertion_order(count in 1usize..30) {
        let records = runtime().block_on(async {
            let store = MemoryRecordStore::new();
            for i in 0..count {
                store.insert(Collection::TrainingData, payload(i as i64 + 1)).await.unwrap();
            }
            store.get_all(Collection::TrainingData).await.unwrap()
        });

        for pair in records.windows(2) {
            prop_assert!(pair[0].id < pair[1].id);
            prop_assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_file_store_matches_model(steps in prop::collection::vec(step_strategy(), 0..20)) {
        let temp_dir = tempfile::tempdir().unwrap();
        let (expected, observed) = runtime().block_on(async {
            let store = FileRecordStore::new(temp_dir.path());
            let result = run_steps(&store, &steps).await;
            store.close().await.unwrap();

            // Same answer after reopening from disk
            let reopened = FileRecordStore::new(temp_dir.path());
            let after_restart: Vec<RecordId> = reopened
                .filter_by_synced(Collection::TrainingData, false)
                .await
                .unwrap()
                .into_iter()
                .map(|record| record.id)
                .collect();
            assert_eq!(after_restart, result.1);
            result
        });
        prop_assert_eq!(expected, observed);
    }
}

#[tokio::test]
async fn test_concurrent_mark_synced_has_no_lost_updates() {
    let store = std::sync::Arc::new(MemoryRecordStore::new());
    let mut ids = Vec::new();
    for i in 0..20 {
        ids.push(
            store
                .insert(Collection::TrainingData, payload(i + 1))
                .await
                .unwrap(),
        );
    }

    let mut handles = Vec::new();
    for chunk in ids.chunks(5) {
        let store = store.clone();
        let chunk = chunk.to_vec();
        handles.push(tokio::spawn(async move {
            for id in chunk {
                store.mark_synced(Collection::TrainingData, id).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let unsynced = store
        .filter_by_synced(Collection::TrainingData, false)
        .await
        .unwrap();
    assert!(unsynced.is_empty());
}
