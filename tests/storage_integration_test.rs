//! Integration tests for the link registry and the click event store
//!
//! Tests can be filtered by database backend using the DATABASE_BACKEND environment variable:
//! - `DATABASE_BACKEND=sqlite cargo test` - Run only SQLite tests
//! - `DATABASE_BACKEND=postgres cargo test` - Run only PostgreSQL tests
//! - By default, both backends are tested (PostgreSQL only when DATABASE_URL is set)

use linkmeter::links::generate_short_code;
use linkmeter::models::{DeviceType, Fingerprint, NewClickEvent, ReferrerCategory};
use linkmeter::storage::{
    PostgresStorage, SqliteStorage, StorageBackend, StorageError, Stores, TimeRange,
};
use std::sync::Arc;

/// Get the database backend to test from environment variable
fn should_test_backend(backend: &str) -> bool {
    match std::env::var("DATABASE_BACKEND") {
        Ok(val) => val.to_lowercase() == backend.to_lowercase(),
        Err(_) => true, // Test all backends if not specified
    }
}

/// Helper to create SQLite test stores
async fn create_sqlite_stores() -> Stores {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Stores::from_backend(Arc::new(storage))
}

/// Helper to create PostgreSQL test stores
async fn create_postgres_stores() -> Option<Stores> {
    let db_url = std::env::var("DATABASE_URL").ok()?;
    if !db_url.starts_with("postgres") {
        return None;
    }
    let storage = PostgresStorage::new(&db_url, 5).await.ok()?;
    storage.init().await.ok()?;
    Some(Stores::from_backend(Arc::new(storage)))
}

/// Codes and owners are unique per run so a shared PostgreSQL database works
fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, generate_short_code())
}

fn event(link_id: i64, fingerprint: &Fingerprint, clicked_at: i64) -> NewClickEvent {
    NewClickEvent {
        link_id,
        fingerprint: fingerprint.clone(),
        clicked_at,
        device_type: DeviceType::Mobile,
        browser: "Safari".to_string(),
        os: "iOS".to_string(),
        country: "United States".to_string(),
        city: "Seattle".to_string(),
        referrer: "https://t.co/x".to_string(),
        referrer_category: ReferrerCategory::Other,
    }
}

macro_rules! backend_tests {
    ($($name:ident),* $(,)?) => {
        mod sqlite {
            $(
                #[tokio::test]
                async fn $name() {
                    if !super::should_test_backend("sqlite") {
                        return;
                    }
                    super::$name(super::create_sqlite_stores().await).await;
                }
            )*
        }

        mod postgres {
            $(
                #[tokio::test]
                async fn $name() {
                    if !super::should_test_backend("postgres") {
                        return;
                    }
                    let Some(stores) = super::create_postgres_stores().await else {
                        return;
                    };
                    super::$name(stores).await;
                }
            )*
        }
    };
}

backend_tests!(
    create_and_lookup,
    duplicate_code_conflicts,
    concurrent_creation_single_winner,
    list_by_owner_newest_first,
    delete_only_own_link,
    concurrent_increments_are_not_lost,
    exists_since_bounds,
    events_for_links_filters_and_orders,
    events_preserve_enrichment,
);

async fn create_and_lookup(stores: Stores) {
    let code = unique("lookup");
    let owner = unique("owner");

    let link = stores
        .links
        .create_with_code(&code, "https://example.com/a", &owner, Some("Campaign"))
        .await
        .unwrap();
    assert!(link.id > 0);
    assert_eq!(link.clicks, 0);
    assert_eq!(link.name.as_deref(), Some("Campaign"));

    let found = stores.links.find_by_code(&code).await.unwrap().unwrap();
    assert_eq!(found, link);

    // Exact match only
    assert!(stores
        .links
        .find_by_code(&code.to_uppercase())
        .await
        .unwrap()
        .is_none());
}

async fn duplicate_code_conflicts(stores: Stores) {
    let code = unique("dup");
    stores
        .links
        .create_with_code(&code, "https://example.com/1", "a", None)
        .await
        .unwrap();

    let err = stores
        .links
        .create_with_code(&code, "https://example.com/2", "b", None)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let found = stores.links.find_by_code(&code).await.unwrap().unwrap();
    assert_eq!(found.destination_url, "https://example.com/1");
}

async fn concurrent_creation_single_winner(stores: Stores) {
    let code = unique("race");
    let mut handles = vec![];

    for i in 0..10 {
        let links = Arc::clone(&stores.links);
        let code = code.clone();
        handles.push(tokio::spawn(async move {
            links
                .create_with_code(&code, "https://example.com", &format!("user{}", i), None)
                .await
        }));
    }

    let mut success_count = 0;
    let mut conflict_count = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => success_count += 1,
            Err(StorageError::Conflict) => conflict_count += 1,
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    assert_eq!(success_count, 1, "Exactly one creation should succeed");
    assert_eq!(conflict_count, 9);
}

async fn list_by_owner_newest_first(stores: Stores) {
    let owner = unique("owner");
    let mut codes = Vec::new();
    for i in 0..3 {
        let code = unique(&format!("list{i}"));
        stores
            .links
            .create_with_code(&code, "https://example.com", &owner, None)
            .await
            .unwrap();
        codes.push(code);
    }
    stores
        .links
        .create_with_code(&unique("foreign"), "https://example.com", &unique("owner"), None)
        .await
        .unwrap();

    let listed: Vec<String> = stores
        .links
        .list_by_owner(&owner)
        .await
        .unwrap()
        .into_iter()
        .map(|l| l.short_code)
        .collect();

    codes.reverse();
    assert_eq!(listed, codes);
}

async fn delete_only_own_link(stores: Stores) {
    let code = unique("del");
    let owner = unique("owner");
    stores
        .links
        .create_with_code(&code, "https://example.com", &owner, None)
        .await
        .unwrap();

    assert!(!stores.links.delete("someone-else", &code).await.unwrap());
    assert!(stores.links.find_by_code(&code).await.unwrap().is_some());

    assert!(stores.links.delete(&owner, &code).await.unwrap());
    assert!(stores.links.find_by_code(&code).await.unwrap().is_none());
    assert!(!stores.links.delete(&owner, &code).await.unwrap());
}

async fn concurrent_increments_are_not_lost(stores: Stores) {
    let code = unique("count");
    let link = stores
        .links
        .create_with_code(&code, "https://example.com", "owner", None)
        .await
        .unwrap();

    let mut handles = vec![];
    for _ in 0..100 {
        let links = Arc::clone(&stores.links);
        handles.push(tokio::spawn(async move { links.increment_clicks(link.id).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let found = stores.links.find_by_code(&code).await.unwrap().unwrap();
    assert_eq!(found.clicks, 100);
}

async fn exists_since_bounds(stores: Stores) {
    let link = stores
        .links
        .create_with_code(&unique("window"), "https://example.com", "owner", None)
        .await
        .unwrap();
    let fp = Fingerprint::new("198.51.100.4", "Agent/1.0");
    stores.clicks.insert(&event(link.id, &fp, 10_000)).await.unwrap();

    let exists = |since, until| {
        let clicks = Arc::clone(&stores.clicks);
        let fp = fp.clone();
        async move { clicks.exists_since(link.id, &fp, since, until).await.unwrap() }
    };

    assert!(exists(10_000, 10_000).await);
    assert!(exists(9_100, 10_900).await);
    assert!(!exists(10_001, 11_000).await);
    assert!(!exists(9_000, 9_999).await);

    // Comparison is exact on both fingerprint parts
    assert!(!stores
        .clicks
        .exists_since(link.id, &Fingerprint::new("198.51.100.4", "agent/1.0"), 0, 20_000)
        .await
        .unwrap());
}

async fn events_for_links_filters_and_orders(stores: Stores) {
    let owner = unique("owner");
    let a = stores
        .links
        .create_with_code(&unique("ev-a"), "https://example.com/a", &owner, None)
        .await
        .unwrap();
    let b = stores
        .links
        .create_with_code(&unique("ev-b"), "https://example.com/b", &owner, None)
        .await
        .unwrap();
    let c = stores
        .links
        .create_with_code(&unique("ev-c"), "https://example.com/c", &owner, None)
        .await
        .unwrap();

    let fp = Fingerprint::new("198.51.100.4", "Agent/1.0");
    for (link_id, ts) in [(a.id, 300), (b.id, 100), (a.id, 200), (c.id, 150), (b.id, 400)] {
        stores.clicks.insert(&event(link_id, &fp, ts)).await.unwrap();
    }

    let all = stores
        .clicks
        .events_for_links(&[a.id, b.id], TimeRange::all())
        .await
        .unwrap();
    let times: Vec<i64> = all.iter().map(|e| e.clicked_at).collect();
    assert_eq!(times, vec![100, 200, 300, 400]);

    let ranged = stores
        .clicks
        .events_for_links(&[a.id, b.id, c.id], TimeRange::between(150, 300))
        .await
        .unwrap();
    let times: Vec<i64> = ranged.iter().map(|e| e.clicked_at).collect();
    assert_eq!(times, vec![150, 200, 300]);

    let open_start = stores
        .clicks
        .events_for_links(&[b.id], TimeRange { start: None, end: Some(100) })
        .await
        .unwrap();
    assert_eq!(open_start.len(), 1);

    assert!(stores
        .clicks
        .events_for_links(&[], TimeRange::all())
        .await
        .unwrap()
        .is_empty());
}

async fn events_preserve_enrichment(stores: Stores) {
    let link = stores
        .links
        .create_with_code(&unique("enriched"), "https://example.com", "owner", None)
        .await
        .unwrap();
    let fp = Fingerprint::new("2001:db8::1", "Mozilla/5.0 (iPhone)");
    let new_event = event(link.id, &fp, 42);
    let id = stores.clicks.insert(&new_event).await.unwrap();

    let events = stores
        .clicks
        .events_for_links(&[link.id], TimeRange::all())
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    let stored = &events[0];
    assert_eq!(stored.id, id);
    assert_eq!(stored.fingerprint, fp);
    assert_eq!(stored.device_type, DeviceType::Mobile);
    assert_eq!(stored.browser, "Safari");
    assert_eq!(stored.os, "iOS");
    assert_eq!(stored.country, "United States");
    assert_eq!(stored.city, "Seattle");
    assert_eq!(stored.referrer, "https://t.co/x");
    assert_eq!(stored.referrer_category, ReferrerCategory::Other);
}
