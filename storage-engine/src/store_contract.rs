//! Behaviour every `FeedStore` backend must share, run by each backend's tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use feed::{CachedFeed, FeedStore, LocalFeedImage};
use shared::{Error, Result};
use std::sync::{Arc, Mutex};
use url::Url;
use uuid::Uuid;

pub fn unique_image() -> LocalFeedImage {
    LocalFeedImage::new(
        Uuid::new_v4(),
        Some("any description".to_string()),
        Some("any location".to_string()),
        Url::parse("https://any-url.com").unwrap(),
    )
}

pub fn unique_image_feed() -> Vec<LocalFeedImage> {
    vec![unique_image(), unique_image()]
}

pub fn any_timestamp() -> DateTime<Utc> {
    Utc.timestamp_opt(1_710_009_000, 987_654_321).unwrap()
}

async fn expect_retrieve(sut: &dyn FeedStore, expected: Option<CachedFeed>) {
    let retrieved = sut.retrieve().await.expect("retrieve should succeed");
    assert_eq!(retrieved, expected);
}

async fn insert(sut: &dyn FeedStore, feed: Vec<LocalFeedImage>, timestamp: DateTime<Utc>) {
    sut.insert(feed, timestamp)
        .await
        .expect("insert should succeed");
}

// -- retrieve --

pub async fn assert_retrieve_delivers_empty_on_empty_cache(sut: &dyn FeedStore) {
    expect_retrieve(sut, None).await;
}

pub async fn assert_retrieve_has_no_side_effects_on_empty_cache(sut: &dyn FeedStore) {
    expect_retrieve(sut, None).await;
    expect_retrieve(sut, None).await;
}

pub async fn assert_retrieve_delivers_found_values_on_non_empty_cache(sut: &dyn FeedStore) {
    let feed = unique_image_feed();
    let timestamp = any_timestamp();

    insert(sut, feed.clone(), timestamp).await;

    expect_retrieve(sut, Some(CachedFeed::new(feed, timestamp))).await;
}

pub async fn assert_retrieve_has_no_side_effects_on_non_empty_cache(sut: &dyn FeedStore) {
    let feed = unique_image_feed();
    let timestamp = any_timestamp();

    insert(sut, feed.clone(), timestamp).await;

    expect_retrieve(sut, Some(CachedFeed::new(feed.clone(), timestamp))).await;
    expect_retrieve(sut, Some(CachedFeed::new(feed, timestamp))).await;
}

pub async fn assert_retrieve_round_trips_optionals_and_order(sut: &dyn FeedStore) {
    let url = Url::parse("https://any-url.com/image.jpg?size=large").unwrap();
    let feed: Vec<LocalFeedImage> = (0..12)
        .map(|i| {
            let description = match i % 3 {
                0 => None,
                1 => Some(String::new()),
                _ => Some(format!("description {}", i)),
            };
            let location = (i % 2 == 0).then(|| format!("location {}", i));
            LocalFeedImage::new(Uuid::new_v4(), description, location, url.clone())
        })
        .collect();
    let timestamp = any_timestamp();

    insert(sut, feed.clone(), timestamp).await;

    expect_retrieve(sut, Some(CachedFeed::new(feed, timestamp))).await;
}

pub async fn assert_retrieve_delivers_decode_failure_twice(sut: &dyn FeedStore) {
    assert!(matches!(sut.retrieve().await, Err(Error::Decode(_))));
    assert!(matches!(sut.retrieve().await, Err(Error::Decode(_))));
}

// -- insert --

pub async fn assert_insert_delivers_no_error(sut: &dyn FeedStore) {
    let result = sut.insert(unique_image_feed(), any_timestamp()).await;
    assert_eq!(result, Ok(()));
}

pub async fn assert_insert_overrides_previously_cached_values(sut: &dyn FeedStore) {
    insert(sut, unique_image_feed(), any_timestamp()).await;

    let latest_feed = vec![unique_image()];
    let latest_timestamp = any_timestamp() + Duration::minutes(5);
    insert(sut, latest_feed.clone(), latest_timestamp).await;

    expect_retrieve(sut, Some(CachedFeed::new(latest_feed, latest_timestamp))).await;
}

pub async fn assert_insert_of_empty_feed_is_retrievable(sut: &dyn FeedStore) {
    insert(sut, Vec::new(), any_timestamp()).await;

    expect_retrieve(sut, Some(CachedFeed::new(Vec::new(), any_timestamp()))).await;
}

pub async fn assert_insert_fails_without_side_effects(sut: &dyn FeedStore) {
    let before = sut.retrieve().await;

    let result = sut.insert(unique_image_feed(), any_timestamp()).await;
    assert!(matches!(result, Err(Error::Storage(_))));

    assert_eq!(sut.retrieve().await, before);
}

// -- delete --

pub async fn assert_delete_has_no_side_effects_on_empty_cache(sut: &dyn FeedStore) {
    assert_eq!(sut.delete_cached_feed().await, Ok(()));
    expect_retrieve(sut, None).await;
}

pub async fn assert_delete_empties_previously_inserted_cache(sut: &dyn FeedStore) {
    insert(sut, unique_image_feed(), any_timestamp()).await;

    assert_eq!(sut.delete_cached_feed().await, Ok(()));
    expect_retrieve(sut, None).await;
}

pub async fn assert_failed_insert_keeps_previously_cached_values(
    sut: &dyn FeedStore,
    break_store: impl FnOnce(),
) {
    let feed = unique_image_feed();
    let timestamp = any_timestamp();
    insert(sut, feed.clone(), timestamp).await;

    break_store();
    let result = sut.insert(unique_image_feed(), timestamp + Duration::minutes(5)).await;

    assert!(matches!(result, Err(Error::Storage(_))));
    expect_retrieve(sut, Some(CachedFeed::new(feed, timestamp))).await;
}

// -- conditional delete --

pub async fn assert_delete_if_keeps_snapshot_the_check_declines(sut: &dyn FeedStore) {
    let feed = unique_image_feed();
    let timestamp = any_timestamp();
    insert(sut, feed.clone(), timestamp).await;

    let seen = Arc::new(Mutex::new(None));
    let recorder = seen.clone();
    let deleted = sut
        .delete_cached_feed_if(Box::new(move |retrieved: &Result<Option<CachedFeed>>| {
            *recorder.lock().unwrap() = Some(retrieved.clone());
            false
        }))
        .await;

    assert_eq!(deleted, Ok(false));
    assert_eq!(
        *seen.lock().unwrap(),
        Some(Ok(Some(CachedFeed::new(feed.clone(), timestamp))))
    );
    expect_retrieve(sut, Some(CachedFeed::new(feed, timestamp))).await;
}

pub async fn assert_delete_if_deletes_snapshot_the_check_accepts(sut: &dyn FeedStore) {
    insert(sut, unique_image_feed(), any_timestamp()).await;

    let deleted = sut.delete_cached_feed_if(Box::new(|_: &Result<Option<CachedFeed>>| true)).await;

    assert_eq!(deleted, Ok(true));
    expect_retrieve(sut, None).await;
}

/// Expects the store to hold undecodable data.
pub async fn assert_delete_if_hands_decode_failure_to_check(sut: &dyn FeedStore) {
    let deleted = sut
        .delete_cached_feed_if(Box::new(|retrieved: &Result<Option<CachedFeed>>| {
            matches!(retrieved, Err(Error::Decode(_)))
        }))
        .await;

    assert_eq!(deleted, Ok(true));
    expect_retrieve(sut, None).await;
}

/// A conditional delete issued before an insert never removes that insert.
pub async fn assert_delete_if_runs_in_issuance_order(sut: &dyn FeedStore) {
    insert(sut, unique_image_feed(), any_timestamp()).await;
    let latest_feed = unique_image_feed();

    let purge = sut.delete_cached_feed_if(Box::new(|_: &Result<Option<CachedFeed>>| true));
    let replace = sut.insert(latest_feed.clone(), any_timestamp());
    let (purged, replaced) = futures::future::join(purge, replace).await;

    assert_eq!((purged, replaced), (Ok(true), Ok(())));
    expect_retrieve(sut, Some(CachedFeed::new(latest_feed, any_timestamp()))).await;
}

// -- ordering --

/// Issue insert, delete, insert back to back and record completion order.
pub async fn assert_side_effects_run_serially(sut: &dyn FeedStore) {
    let completed = Arc::new(Mutex::new(Vec::new()));
    let last_feed = unique_image_feed();

    let op1 = sut.insert(unique_image_feed(), any_timestamp());
    let op2 = sut.delete_cached_feed();
    let op3 = sut.insert(last_feed.clone(), any_timestamp());

    let record = |id: u8, op: feed::StoreFuture<()>| {
        let completed = completed.clone();
        async move {
            let result = op.await;
            completed.lock().unwrap().push(id);
            result
        }
    };

    let (r1, r2, r3) = futures::future::join3(record(1, op1), record(2, op2), record(3, op3)).await;

    assert_eq!((r1, r2, r3), (Ok(()), Ok(()), Ok(())));
    assert_eq!(
        *completed.lock().unwrap(),
        vec![1, 2, 3],
        "Expected side-effects to run in order"
    );
    expect_retrieve(sut, Some(CachedFeed::new(last_feed, any_timestamp()))).await;
}

/// Two stores opened on one location behave like one store for ordering.
pub async fn assert_side_effects_run_serially_across_instances(
    first: &dyn FeedStore,
    second: &dyn FeedStore,
) {
    let large_feed: Vec<LocalFeedImage> = (0..5_000).map(|_| unique_image()).collect();
    let (inserted, deleted) = futures::future::join(
        first.insert(large_feed, any_timestamp()),
        second.delete_cached_feed(),
    )
    .await;

    assert_eq!((inserted, deleted), (Ok(()), Ok(())));
    expect_retrieve(first, None).await;

    let last_feed = unique_image_feed();
    let completed = Arc::new(Mutex::new(Vec::new()));
    let record = |id: u8, op: feed::StoreFuture<()>| {
        let completed = completed.clone();
        async move {
            let result = op.await;
            completed.lock().unwrap().push(id);
            result
        }
    };

    let op1 = first.insert(unique_image_feed(), any_timestamp());
    let op2 = second.delete_cached_feed();
    let op3 = second.insert(last_feed.clone(), any_timestamp());
    let (r1, r2, r3) = futures::future::join3(record(1, op1), record(2, op2), record(3, op3)).await;

    assert_eq!((r1, r2, r3), (Ok(()), Ok(()), Ok(())));
    assert_eq!(*completed.lock().unwrap(), vec![1, 2, 3]);
    expect_retrieve(first, Some(CachedFeed::new(last_feed, any_timestamp()))).await;
}
