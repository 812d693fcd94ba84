//! Mutation coordinator behavior: rollback atomicity, narrow
//! invalidation, and the full optimistic write round trip

use async_trait::async_trait;
use quokka_cache::{
    source_fetcher, CachePolicy, CacheStore, DataSource, FetchStatus, MutationCoordinator,
    MutationError, MutationSpec, OptimisticUpdate, QueryKey, QueryKeys, SourceError, WriteCommand,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::advance;

fn policy() -> CachePolicy {
    CachePolicy::new(Duration::from_secs(60), Duration::from_secs(300)).unwrap()
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// In-memory stand-in for the QuokkaQ backend with per-key fetch counts
struct StubSource {
    course_names: Mutex<HashMap<String, String>>,
    fetch_counts: Mutex<HashMap<String, u32>>,
    fail_next_execute: AtomicBool,
}

impl StubSource {
    fn new() -> Self {
        let mut course_names = HashMap::new();
        course_names.insert("C1".to_string(), "Intro".to_string());
        Self {
            course_names: Mutex::new(course_names),
            fetch_counts: Mutex::new(HashMap::new()),
            fail_next_execute: AtomicBool::new(false),
        }
    }

    fn fetch_count(&self, key: &QueryKey) -> u32 {
        self.fetch_counts
            .lock()
            .unwrap()
            .get(&key.to_string())
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl DataSource for StubSource {
    async fn fetch(&self, key: &QueryKey) -> Result<Value, SourceError> {
        *self
            .fetch_counts
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_insert(0) += 1;

        match key.entity() {
            "course" => {
                let id = key.text_at(1).unwrap_or_default();
                let name = self
                    .course_names
                    .lock()
                    .unwrap()
                    .get(id)
                    .cloned()
                    .ok_or_else(|| SourceError::NotFound(key.to_string()))?;
                Ok(json!({ "id": id, "name": name }))
            }
            "instructorDashboard" => Ok(json!({
                "userId": key.text_at(1).unwrap_or_default(),
                "openThreads": 3,
            })),
            _ => Err(SourceError::NotFound(key.to_string())),
        }
    }

    async fn execute(&self, command: WriteCommand) -> Result<Value, SourceError> {
        if self.fail_next_execute.swap(false, Ordering::SeqCst) {
            return Err(SourceError::Unavailable("injected failure".to_string()));
        }
        match command.operation.as_str() {
            "endorse_answer" => Ok(json!({
                "threadId": command.payload["threadId"],
                "courseId": "C1",
                "instructorIds": ["I1", "I2"],
            })),
            "rename_course" => {
                let id = command.payload["courseId"].as_str().unwrap_or_default();
                let name = command.payload["name"].as_str().unwrap_or_default();
                self.course_names
                    .lock()
                    .unwrap()
                    .insert(id.to_string(), name.to_string());
                Ok(json!({ "courseId": id, "name": name }))
            }
            other => Err(SourceError::Rejected(format!(
                "unknown operation: {}",
                other
            ))),
        }
    }
}

fn dashboard_keys_from_result(result: &Value) -> Vec<QueryKey> {
    let mut keys = Vec::new();
    if let Some(ids) = result["instructorIds"].as_array() {
        for id in ids.iter().filter_map(|v| v.as_str()) {
            keys.push(QueryKeys::instructor_dashboard(id));
        }
    }
    keys
}

#[tokio::test]
async fn test_rollback_restores_every_target_together() {
    let store = CacheStore::new();
    let coordinator = MutationCoordinator::new(store.clone());
    let thread_key = QueryKeys::thread("t1");
    let answer_key = QueryKeys::ai_answer("t1");

    store.set_optimistic(&thread_key, |_| json!({ "status": "open" }));
    store.set_optimistic(&answer_key, |_| json!({ "totalEndorsements": 4 }));

    let spec = MutationSpec::new(|| async {
        Err(SourceError::Unavailable("backend down".to_string()))
    })
    .optimistic(OptimisticUpdate::new(thread_key.clone(), |_| {
        json!({ "status": "answered" })
    }))
    .optimistic(OptimisticUpdate::new(answer_key.clone(), |old| {
        let mut value = old.cloned().unwrap_or_else(|| json!({}));
        value["totalEndorsements"] = json!(5);
        value
    }));

    let err = coordinator.mutate(spec).await.unwrap_err();
    assert!(matches!(err, MutationError::Source(_)));

    // never just one: both targets are back at their pre-mutation values
    assert_eq!(
        store.snapshot(&thread_key).unwrap().value,
        Some(json!({ "status": "open" }))
    );
    assert_eq!(
        store.snapshot(&answer_key).unwrap().value,
        Some(json!({ "totalEndorsements": 4 }))
    );
}

#[tokio::test(start_paused = true)]
async fn test_scoped_mutation_leaves_unrelated_dashboards_untouched() {
    let store = CacheStore::new();
    let coordinator = MutationCoordinator::new(store.clone());
    let source = Arc::new(StubSource::new());

    // three instructors system-wide; only I1 and I2 teach course C1
    let dashboards = ["I1", "I2", "I3"].map(|id| QueryKeys::instructor_dashboard(id));
    for key in &dashboards {
        let fetcher = source_fetcher(Arc::clone(&source) as Arc<dyn DataSource>, key.clone());
        store.get(key, policy(), fetcher);
    }
    settle().await;
    for key in &dashboards {
        assert_eq!(source.fetch_count(key), 1);
    }
    let i3_fetched_at = store.snapshot(&dashboards[2]).unwrap().fetched_at;

    advance(Duration::from_millis(10)).await;

    let spec = MutationSpec::via_source(
        Arc::clone(&source) as Arc<dyn DataSource>,
        WriteCommand::new("endorse_answer", json!({ "threadId": "t1" })),
    )
    .invalidates(dashboard_keys_from_result);
    coordinator.mutate(spec).await.unwrap();
    settle().await;

    // re-reading every dashboard refetches only the affected instructors
    for key in &dashboards {
        let fetcher = source_fetcher(Arc::clone(&source) as Arc<dyn DataSource>, key.clone());
        store.get(key, policy(), fetcher);
    }
    settle().await;

    assert_eq!(source.fetch_count(&dashboards[0]), 2);
    assert_eq!(source.fetch_count(&dashboards[1]), 2);
    assert_eq!(
        source.fetch_count(&dashboards[2]),
        1,
        "unrelated instructor dashboard was refetched"
    );
    assert_eq!(
        store.snapshot(&dashboards[2]).unwrap().fetched_at,
        i3_fetched_at,
        "unrelated instructor dashboard was touched by the mutation"
    );
}

#[tokio::test]
async fn test_end_to_end_optimistic_write_rolls_back_on_failure() {
    let store = CacheStore::new();
    let coordinator = MutationCoordinator::new(store.clone());
    let source = Arc::new(StubSource::new());
    let key = QueryKeys::course("C1");

    // start with an empty cache; the first read fetches the course
    let fetcher = source_fetcher(Arc::clone(&source) as Arc<dyn DataSource>, key.clone());
    store.get(&key, policy(), fetcher);
    settle().await;

    let snapshot = store.snapshot(&key).unwrap();
    assert_eq!(snapshot.status, FetchStatus::Success);
    assert_eq!(snapshot.value, Some(json!({ "id": "C1", "name": "Intro" })));

    // optimistic rename, then the write fails
    source.fail_next_execute.store(true, Ordering::SeqCst);
    let spec = MutationSpec::via_source(
        Arc::clone(&source) as Arc<dyn DataSource>,
        WriteCommand::new(
            "rename_course",
            json!({ "courseId": "C1", "name": "Intro (updated)" }),
        ),
    )
    .optimistic(OptimisticUpdate::new(key.clone(), |old| {
        let mut value = old.cloned().unwrap_or_else(|| json!({}));
        value["name"] = json!("Intro (updated)");
        value
    }));

    let err = coordinator.mutate(spec).await.unwrap_err();
    assert!(err.to_string().contains("rolled back"));

    // the optimistic rename is visibly reverted
    let snapshot = store.snapshot(&key).unwrap();
    assert_eq!(snapshot.value, Some(json!({ "id": "C1", "name": "Intro" })));
}

#[tokio::test]
async fn test_successful_write_commits_and_refetch_sees_new_data() {
    let store = CacheStore::new();
    let coordinator = MutationCoordinator::new(store.clone());
    let source = Arc::new(StubSource::new());
    let key = QueryKeys::course("C1");

    let fetcher = source_fetcher(Arc::clone(&source) as Arc<dyn DataSource>, key.clone());
    store.get(&key, policy(), Arc::clone(&fetcher));
    settle().await;

    let spec = MutationSpec::via_source(
        Arc::clone(&source) as Arc<dyn DataSource>,
        WriteCommand::new(
            "rename_course",
            json!({ "courseId": "C1", "name": "Intro to CS" }),
        ),
    )
    .optimistic(OptimisticUpdate::new(key.clone(), |old| {
        let mut value = old.cloned().unwrap_or_else(|| json!({}));
        value["name"] = json!("Intro to CS");
        value
    }))
    .invalidates(|result| vec![QueryKeys::course(result["courseId"].as_str().unwrap_or(""))]);

    let result = coordinator.mutate(spec).await.unwrap();
    assert_eq!(result["name"], "Intro to CS");

    // invalidated: the next read refetches and the source now agrees with
    // the optimistic value
    store.get(&key, policy(), fetcher);
    settle().await;
    let snapshot = store.snapshot(&key).unwrap();
    assert_eq!(snapshot.status, FetchStatus::Success);
    assert_eq!(
        snapshot.value,
        Some(json!({ "id": "C1", "name": "Intro to CS" }))
    );
    assert_eq!(source.fetch_count(&key), 2);
}
