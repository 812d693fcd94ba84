//! Example: instructor dashboard with optimistic endorsement
//!
//! Wires the cache store, mutation coordinator, and mock source together
//! the way a dashboard view would.
//! Run with: cargo run --example dashboard

use quokka_cache::{
    policy, source_fetcher, CacheStore, DataSource, MutationCoordinator, QueryKeys,
};
use quokka_mock_source::{mutations, MockDataSource, Role};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let store = CacheStore::new();
    let coordinator = MutationCoordinator::new(store.clone());
    let source = Arc::new(MockDataSource::new());

    println!("QuokkaQ dashboard demo (seeded mock data)\n");

    // Subscribe to I1's dashboard and load it
    let dashboard_key = QueryKeys::instructor_dashboard("I1");
    let mut subscription = store.subscribe(&dashboard_key);
    store.get(
        &dashboard_key,
        policy::defaults::dashboard(),
        source_fetcher(
            Arc::clone(&source) as Arc<dyn DataSource>,
            dashboard_key.clone(),
        ),
    );

    let mut snapshot = subscription.changed().await;
    while snapshot.status != quokka_cache::FetchStatus::Success {
        snapshot = subscription.changed().await;
    }
    println!("dashboard loaded: {:?}", snapshot.status);
    if let Some(value) = &snapshot.value {
        println!("  courses: {}", value["courses"]);
    }

    // Load the AI answer on thread t1 (course C1, taught by I1 and I2)
    let answer_key = QueryKeys::ai_answer("t1");
    store.get(
        &answer_key,
        policy::defaults::threads(),
        source_fetcher(Arc::clone(&source) as Arc<dyn DataSource>, answer_key.clone()),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    let before = store.snapshot(&answer_key).unwrap();
    println!(
        "\nAI answer on t1 before endorsement: {} total endorsements",
        before.value.as_ref().map(|v| v["totalEndorsements"].clone()).unwrap_or_default()
    );

    // Endorse as instructor I1: optimistic bump, then commit invalidates
    // the answer, course C1's listings, and I1/I2's dashboards only
    println!("endorsing as I1...");
    let spec = mutations::endorse_answer(Arc::clone(&source), "t1", "I1", Role::Instructor);
    let result = coordinator.mutate(spec).await?;
    println!(
        "committed: courseId={}, instructors={}",
        result["courseId"], result["instructorIds"]
    );

    let optimistic = store.snapshot(&answer_key).unwrap();
    println!(
        "cached answer now shows {} total endorsements",
        optimistic.value.as_ref().map(|v| v["totalEndorsements"].clone()).unwrap_or_default()
    );

    // The dashboard entry was invalidated and refetches because it is
    // still subscribed
    let mut refreshed = subscription.changed().await;
    while refreshed.status != quokka_cache::FetchStatus::Success {
        refreshed = subscription.changed().await;
    }
    println!("\ndashboard refreshed: {:?}", refreshed.status);

    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("done");
    Ok(())
}
