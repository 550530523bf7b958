mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tornsync_core::error::ApiError;
use tornsync_core::notifications::{Category, CategoryState, NotificationState};
use tornsync_torn::Section;
use tornsync_worker::notify_loop::NotificationLoop;
use tornsync_worker::platform::PlatformError;

use common::{member, FakeEntityStore, FakePlatform, FakeTorn};

const MAIN_GUILD: u64 = 500;

fn energy_state() -> NotificationState {
    NotificationState::with_categories([Category::Energy])
}

fn energy_full_soon() -> serde_json::Value {
    json!({"energy": {"current": 140, "maximum": 150, "fulltime": 30}})
}

fn notifier(
    store: Arc<FakeEntityStore>,
    torn: Arc<FakeTorn>,
    platform: Arc<FakePlatform>,
) -> NotificationLoop {
    NotificationLoop::new(store, torn, platform, MAIN_GUILD, Duration::from_secs(60))
}

#[tokio::test]
async fn one_failing_entity_does_not_stop_the_batch() {
    let store = Arc::new(
        FakeEntityStore::default()
            .with_entity(1, 11, "key-one-00000001", &energy_state())
            .with_entity(2, 12, "key-two-00000002", &energy_state())
            .with_entity(3, 13, "key-three-000003", &energy_state()),
    );
    let torn = Arc::new(FakeTorn::default());
    torn.answer(Section::User, None, "key-one-00000001", energy_full_soon());
    torn.fail(
        Section::User,
        None,
        "key-two-00000002",
        ApiError::new(2, "Incorrect key key-two-00000002"),
    );
    torn.answer(Section::User, None, "key-three-000003", energy_full_soon());
    let platform = Arc::new(
        FakePlatform::new()
            .with_member(MAIN_GUILD, member(11, "a", &[]))
            .with_member(MAIN_GUILD, member(12, "b", &[]))
            .with_member(MAIN_GUILD, member(13, "c", &[])),
    );

    let report = notifier(store.clone(), torn, platform.clone())
        .tick(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.processed, 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].torn_id, 2);
    assert!(!report.failures[0].reason.contains("key-two-00000002"));

    assert_eq!(platform.direct_messages(11), vec!["Energy at 140 / 150"]);
    assert_eq!(platform.direct_messages(13), vec!["Energy at 140 / 150"]);
    assert_eq!(
        store.state_of(3).unwrap().get(Category::Energy),
        Some(&CategoryState::Threshold { notified: true })
    );
    assert_eq!(
        store.state_of(2).unwrap().get(Category::Energy),
        Some(&CategoryState::Threshold { notified: false })
    );
}

#[tokio::test]
async fn persisted_state_prevents_repeated_notifications() {
    let store = Arc::new(FakeEntityStore::default().with_entity(1, 11, "key-one-00000001", &energy_state()));
    let torn = Arc::new(FakeTorn::default());
    torn.answer(Section::User, None, "key-one-00000001", energy_full_soon());
    let platform = Arc::new(FakePlatform::new().with_member(MAIN_GUILD, member(11, "a", &[])));
    let notifier = notifier(store, torn.clone(), platform.clone());
    let cancel = CancellationToken::new();

    notifier.tick(&cancel).await.unwrap();
    notifier.tick(&cancel).await.unwrap();
    assert_eq!(platform.direct_messages(11).len(), 1);

    torn.answer(
        Section::User,
        None,
        "key-one-00000001",
        json!({"energy": {"current": 10, "maximum": 150, "fulltime": 5000}}),
    );
    notifier.tick(&cancel).await.unwrap();
    torn.answer(Section::User, None, "key-one-00000001", energy_full_soon());
    notifier.tick(&cancel).await.unwrap();

    assert_eq!(platform.direct_messages(11).len(), 2);
}

#[tokio::test]
async fn entity_that_left_the_main_group_is_reset() {
    let store = Arc::new(FakeEntityStore::default().with_entity(1, 11, "key-one-00000001", &energy_state()));
    let torn = Arc::new(FakeTorn::default());
    let platform = Arc::new(FakePlatform::new());

    let report = notifier(store.clone(), torn.clone(), platform.clone())
        .tick(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.reset, 1);
    assert!(report.failures.is_empty());
    assert_eq!(store.resets(), vec![1]);
    assert!(torn.requests().is_empty());
}

#[tokio::test]
async fn unreachable_main_group_keeps_state() {
    let store = Arc::new(FakeEntityStore::default().with_entity(1, 11, "key-one-00000001", &energy_state()));
    let torn = Arc::new(FakeTorn::default());
    let platform = Arc::new(FakePlatform::new().with_member(MAIN_GUILD, member(11, "a", &[])));
    platform.fail_lookups(PlatformError::NotFound(
        r#"{"message": "Unknown Guild", "code": 10004}"#.to_string(),
    ));

    let report = notifier(store.clone(), torn.clone(), platform)
        .tick(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.reset, 0);
    assert_eq!(report.failures.len(), 1);
    assert!(store.resets().is_empty());
    assert_eq!(store.state_of(1), Some(energy_state()));
    assert!(torn.requests().is_empty());
}

#[tokio::test]
async fn selections_follow_enabled_categories() {
    let state = NotificationState::with_categories([Category::Energy, Category::Award]);
    let store = Arc::new(FakeEntityStore::default().with_entity(1, 11, "key-one-00000001", &state));
    let torn = Arc::new(FakeTorn::default());
    let platform = Arc::new(FakePlatform::new().with_member(MAIN_GUILD, member(11, "a", &[])));

    notifier(store, torn.clone(), platform)
        .tick(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(torn.requests(), vec!["user/self@key-one-00000001?bars,notifications"]);
}

#[tokio::test]
async fn cancelled_tick_processes_nothing() {
    let store = Arc::new(FakeEntityStore::default().with_entity(1, 11, "key-one-00000001", &energy_state()));
    let torn = Arc::new(FakeTorn::default());
    let platform = Arc::new(FakePlatform::new().with_member(MAIN_GUILD, member(11, "a", &[])));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = notifier(store, torn.clone(), platform)
        .tick(&cancel)
        .await
        .unwrap();

    assert_eq!(report.processed, 0);
    assert!(torn.requests().is_empty());
}
