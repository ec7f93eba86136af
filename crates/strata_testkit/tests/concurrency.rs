//! Many threads sharing one repository.

use std::sync::Arc;
use std::thread;
use strata_core::StoreError;
use strata_testkit::prelude::*;

#[test]
fn concurrent_saves_keep_versions_gapless() {
    let db = TestDatabase::memory();
    let tasks = Arc::new(db.repository::<Task>().build());
    let shared = tasks.save(Task::new("shared")).unwrap().into_entity();

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let tasks = Arc::clone(&tasks);
            let mut task = shared.clone();
            thread::spawn(move || {
                for round in 0..10 {
                    task.title = format!("w{worker} r{round}");
                    task = tasks.save(task).unwrap().into_entity();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let numbers: Vec<u64> = tasks
        .history(shared.uuid())
        .unwrap()
        .iter()
        .map(|r| r.version_number)
        .collect();
    assert_eq!(numbers, (1..=41).collect::<Vec<_>>());
    assert_eq!(tasks.count().unwrap(), 1);
}

#[test]
fn nested_transaction_is_rejected() {
    let db = TestDatabase::memory();
    let tasks = db.repository::<Task>().build();

    let err = db
        .transaction(&["task"], |_ctx| {
            tasks.save(Task::new("inner")).map(|outcome| outcome.into_entity())
        })
        .unwrap_err();

    assert!(matches!(err, StoreError::NestedTransaction));
    assert_eq!(tasks.count().unwrap(), 0);
}
