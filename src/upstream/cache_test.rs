use super::*;
use serde_json::json;

fn key(path: &str) -> CacheKey {
    CacheKey::new("GET", path, &[])
}

#[test]
fn key_ignores_param_order() {
    let a = CacheKey::new("get", "/driveways", &[("lng".into(), "1".into()), ("lat".into(), "2".into())]);
    let b = CacheKey::new("GET", "/driveways", &[("lat".into(), "2".into()), ("lng".into(), "1".into())]);
    assert_eq!(a, b);
    assert_eq!(a.as_str(), "GET /driveways?lat=2&lng=1");
}

#[test]
fn key_distinguishes_methods_and_paths() {
    assert_ne!(CacheKey::new("GET", "/driveways", &[]), CacheKey::new("POST", "/driveways", &[]));
    assert_ne!(key("/driveways"), key("/bookings"));
}

#[test]
fn value_available_before_ttl_and_missing_after() {
    let cache = ResponseCache::new(Duration::from_secs(300));
    let start = Instant::now();
    cache.insert_at(key("/driveways"), json!([1, 2]), Duration::from_secs(300), start);

    let before = start + Duration::from_secs(299);
    assert_eq!(cache.get_at(&key("/driveways"), before), Some(json!([1, 2])));

    let after = start + Duration::from_secs(300);
    assert_eq!(cache.get_at(&key("/driveways"), after), None);
    assert_eq!(cache.stats().entries, 0, "expired entry evicted on access");
}

#[test]
fn stats_count_hits_and_misses() {
    let cache = ResponseCache::new(Duration::from_secs(60));
    let now = Instant::now();
    assert!(cache.get_at(&key("/reviews"), now).is_none());
    cache.insert_at(key("/reviews"), json!({"ok": true}), Duration::from_secs(60), now);
    assert!(cache.get_at(&key("/reviews"), now).is_some());

    let stats = cache.stats();
    assert_eq!(stats, CacheStats { entries: 1, hits: 1, misses: 1 });
}

#[test]
fn sweep_evicts_only_expired_entries() {
    let cache = ResponseCache::new(Duration::from_secs(60));
    let now = Instant::now();
    cache.insert_at(key("/short"), json!(1), Duration::from_secs(1), now);
    cache.insert_at(key("/long"), json!(2), Duration::from_secs(600), now);

    let evicted = cache.sweep_at(now + Duration::from_secs(5));
    assert_eq!(evicted, 1);
    assert_eq!(cache.stats().entries, 1);
    assert!(cache.get_at(&key("/long"), now + Duration::from_secs(5)).is_some());
}

#[test]
fn clear_drops_everything() {
    let cache = ResponseCache::new(Duration::from_secs(60));
    cache.insert_at(key("/driveways"), json!([]), Duration::from_secs(60), Instant::now());
    cache.insert_at(key("/bookings"), json!([]), Duration::from_secs(5), Instant::now());
    cache.clear();
    assert!(cache.get(&key("/driveways")).is_none());
    assert!(cache.get(&key("/bookings")).is_none());
}

#[test]
fn insert_after_clear_is_refused_for_the_old_generation() {
    let cache = ResponseCache::new(Duration::from_secs(60));
    let before = cache.generation();
    cache.clear();

    assert!(!cache.insert_if_generation(key("/driveways"), json!(["stale"]), before));
    assert!(cache.get(&key("/driveways")).is_none());

    let current = cache.generation();
    assert_ne!(current, before);
    assert!(cache.insert_if_generation(key("/driveways"), json!(["fresh"]), current));
    assert_eq!(cache.get(&key("/driveways")), Some(json!(["fresh"])));
}

#[test]
fn invalidation_policy_covers_driveway_and_booking_mutations() {
    assert!(invalidates("POST", "/driveways"));
    assert!(invalidates("patch", "/bookings/b1"));
    assert!(invalidates("DELETE", "/driveways/dw1"));
    assert!(!invalidates("GET", "/driveways"));
    assert!(!invalidates("POST", "/payments/create-intent"));
    assert!(!invalidates("POST", "/upload/images"));
}

#[tokio::test]
async fn sweep_task_evicts_in_background() {
    let cache = ResponseCache::new(Duration::from_secs(60));
    cache.insert_at(key("/gone"), json!(1), Duration::from_millis(10), Instant::now());
    let handle = spawn_sweep_task(cache.clone(), Duration::from_millis(50));

    tokio::time::sleep(Duration::from_millis(120)).await;
    handle.abort();

    assert_eq!(cache.stats().entries, 0);
}
