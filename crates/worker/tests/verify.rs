mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::json;
use tornsync_core::error::{ApiError, ReconcileError};
use tornsync_core::guild::GuildConfig;
use tornsync_core::identity::VerifyTarget;
use tornsync_torn::Section;
use tornsync_worker::dispatcher::ActionDispatcher;
use tornsync_worker::verify::IdentityReconciler;

use common::{member, FakePlatform, FakeTorn, KEY};

const GUILD: u64 = 1;
const VERIFIED: u64 = 10;
const FACTION_ROLE: u64 = 20;
const OLD_POSITION: u64 = 30;

fn config() -> GuildConfig {
    let mut config = GuildConfig::new(GUILD, "Club");
    config.verified_role = Some(VERIFIED);
    config.factions = BTreeMap::from([("33241".to_string(), vec![FACTION_ROLE])]);
    config.positions = BTreeMap::from([("33241".to_string(), true)]);
    config
}

fn platform() -> FakePlatform {
    FakePlatform::new()
        .with_member(GUILD, member(42, "alice", &[OLD_POSITION]))
        .with_role(GUILD, VERIFIED, "Verified")
        .with_role(GUILD, FACTION_ROLE, "Nuclear")
        .with_role(GUILD, OLD_POSITION, "Member of Nuclear")
}

fn linkage(torn_id: i64, discord_id: &str) -> serde_json::Value {
    json!({"discord": {"userID": torn_id, "discordID": discord_id}})
}

fn profile(torn_id: i64, discord_id: &str) -> serde_json::Value {
    json!({
        "player_id": torn_id,
        "name": "Alice",
        "faction": {"faction_id": 33241, "faction_name": "Nuclear", "position": "Leader"},
        "discord": {"userID": torn_id, "discordID": discord_id}
    })
}

fn linked_torn() -> FakeTorn {
    let torn = FakeTorn::default();
    torn.answer(Section::User, Some(42), KEY, linkage(1234, "42"));
    torn.answer(Section::User, Some(1234), KEY, profile(1234, "42"));
    torn
}

async fn verify(
    torn: FakeTorn,
    platform: Arc<FakePlatform>,
    target: VerifyTarget,
) -> tornsync_worker::verify::VerificationOutcome {
    let reconciler = IdentityReconciler::new(Arc::new(torn));
    let dispatcher = ActionDispatcher::new(platform);
    reconciler.verify(&dispatcher, &config(), KEY, 42, target).await
}

#[tokio::test]
async fn self_verification_sets_nickname_and_roles() {
    let platform = Arc::new(platform());
    let outcome = verify(linked_torn(), platform.clone(), VerifyTarget::SelfAuthor).await;

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(
        platform.mutations(),
        vec![
            "edit_nickname:1:42:Alice [1234]",
            "remove_role:1:42:30",
            "add_role:1:42:10",
            "add_role:1:42:20",
            "create_role:1:Leader of Nuclear",
            "add_role:1:42:9001",
        ]
    );
    assert!(outcome
        .message
        .starts_with("< alice >\nYou have been verified and are now known as < Alice [1234] >."));
    assert!(outcome.message.contains("- @Verified\n- @Nuclear\n- @Leader of Nuclear"));
}

#[tokio::test]
async fn remote_linkage_to_another_identity_is_rejected_without_side_effects() {
    let torn = FakeTorn::default();
    torn.answer(Section::User, Some(42), KEY, linkage(1234, "99"));
    let platform = Arc::new(platform());

    let outcome = verify(torn, platform.clone(), VerifyTarget::SelfAuthor).await;

    assert!(!outcome.success);
    assert_matches!(outcome.error, Some(ReconcileError::IdentityMismatch { .. }));
    assert!(platform.mutations().is_empty());
}

#[tokio::test]
async fn profile_declaring_another_identity_is_rejected_without_side_effects() {
    let torn = FakeTorn::default();
    torn.answer(Section::User, Some(42), KEY, linkage(1234, "42"));
    torn.answer(Section::User, Some(1234), KEY, profile(1234, "99"));
    let platform = Arc::new(platform());

    let outcome = verify(torn, platform.clone(), VerifyTarget::SelfAuthor).await;

    assert_matches!(outcome.error, Some(ReconcileError::IdentityMismatch { .. }));
    assert_eq!(outcome.message, "< error > That's odd... 42 != 99.");
    assert!(platform.mutations().is_empty());
}

#[tokio::test]
async fn unknown_account_id() {
    let torn = FakeTorn::default();
    torn.fail(Section::User, Some(555), KEY, ApiError::new(6, "Incorrect ID"));
    let platform = Arc::new(platform());

    let outcome = verify(torn, platform.clone(), VerifyTarget::TornId(555)).await;

    assert_matches!(outcome.error, Some(ReconcileError::UnknownAccount(555)));
    assert_eq!(outcome.message, "< error > Torn ID 555 is not known. Please check again.");
    assert!(platform.mutations().is_empty());
}

#[tokio::test]
async fn member_without_linkage_is_not_verified() {
    let torn = FakeTorn::default();
    torn.fail(Section::User, Some(42), KEY, ApiError::new(6, "Incorrect ID"));
    let platform = Arc::new(platform());

    let outcome = verify(torn, platform.clone(), VerifyTarget::Member(42)).await;

    assert_eq!(outcome.message, "alice is not officially verified by Torn");
    assert!(platform.mutations().is_empty());
}

#[tokio::test]
async fn account_of_someone_outside_the_group() {
    let torn = FakeTorn::default();
    torn.answer(Section::User, Some(777), KEY, profile(777, "5"));
    let platform = Arc::new(platform());

    let outcome = verify(torn, platform.clone(), VerifyTarget::TornId(777)).await;

    assert!(!outcome.success);
    assert!(outcome.message.contains("they didn't join this server"));
    assert!(platform.mutations().is_empty());
}

#[tokio::test]
async fn nickname_permission_gap_is_swallowed() {
    let platform = Arc::new(platform());
    platform.deny("edit_nickname");

    let outcome = verify(linked_torn(), platform.clone(), VerifyTarget::SelfAuthor).await;

    assert!(outcome.success);
    assert!(outcome.failures.is_empty());
    assert!(platform.member_roles(GUILD, 42).contains(&VERIFIED));
}

#[tokio::test]
async fn role_permission_failure_is_reported() {
    let platform = Arc::new(platform());
    platform.deny("add_role");

    let outcome = verify(linked_torn(), platform.clone(), VerifyTarget::SelfAuthor).await;

    assert!(!outcome.success);
    assert_matches!(outcome.error, Some(ReconcileError::PermissionDenied(_)));
    assert!(outcome.message.contains("< error > add_role failed: missing permission"));
    assert!(outcome.message.contains("You have not been given any role."));
    assert!(!outcome.message.contains("- @Verified"));
}

#[tokio::test]
async fn failed_role_creation_is_not_retried_by_the_same_dispatcher() {
    let platform = Arc::new(platform().with_member(GUILD, member(43, "bob", &[])));
    platform.deny("create_role");

    let torn = linked_torn();
    torn.answer(Section::User, Some(43), KEY, linkage(1235, "43"));
    torn.answer(Section::User, Some(1235), KEY, profile(1235, "43"));

    let reconciler = IdentityReconciler::new(Arc::new(torn));
    let dispatcher = ActionDispatcher::new(platform.clone());
    let config = config();

    let first = reconciler
        .verify(&dispatcher, &config, KEY, 42, VerifyTarget::Member(42))
        .await;
    let second = reconciler
        .verify(&dispatcher, &config, KEY, 43, VerifyTarget::Member(43))
        .await;

    assert!(!first.success);
    assert!(!second.success);
    let creations = platform
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("create_role:"))
        .count();
    assert_eq!(creations, 1);
}

#[tokio::test]
async fn missing_verified_role_is_refused() {
    let reconciler = IdentityReconciler::new(Arc::new(linked_torn()));
    let platform = Arc::new(platform());
    let dispatcher = ActionDispatcher::new(platform.clone());
    let mut config = config();
    config.verified_role = None;

    let outcome = reconciler
        .verify(&dispatcher, &config, KEY, 42, VerifyTarget::SelfAuthor)
        .await;

    assert_eq!(outcome.message, "< error > No verified role given");
    assert!(platform.calls().is_empty());
}
