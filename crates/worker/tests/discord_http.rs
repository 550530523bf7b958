use assert_matches::assert_matches;
use httpmock::prelude::*;
use serde_json::json;
use tornsync_worker::discord::DiscordRest;
use tornsync_worker::platform::{ChatPlatform, PlatformError};

fn client(server: &MockServer) -> DiscordRest {
    DiscordRest::new(reqwest::Client::new(), server.base_url(), "bot-token")
}

#[tokio::test]
async fn direct_message_opens_a_channel_first() {
    let server = MockServer::start();
    let open = server.mock(|when, then| {
        when.method(POST)
            .path("/users/@me/channels")
            .header("Authorization", "Bot bot-token")
            .json_body(json!({"recipient_id": "42"}));
        then.status(200).json_body(json!({"id": "555"}));
    });
    let send = server.mock(|when, then| {
        when.method(POST)
            .path("/channels/555/messages")
            .json_body(json!({"content": "Energy at 140 / 150"}));
        then.status(200).json_body(json!({"id": "1"}));
    });

    client(&server)
        .send_direct_message(42, "Energy at 140 / 150")
        .await
        .expect("dm should be sent");

    open.assert();
    send.assert();
}

#[tokio::test]
async fn forbidden_role_change_is_a_permission_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(PUT).path("/guilds/1/members/42/roles/10");
        then.status(403)
            .json_body(json!({"message": "Missing Permissions", "code": 50013}));
    });

    let err = client(&server).add_role(1, 42, 10).await.unwrap_err();

    assert_matches!(err, PlatformError::PermissionDenied(body) if body.contains("Missing Permissions"));
}

#[tokio::test]
async fn nickname_edit_patches_the_member() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(PATCH)
            .path("/guilds/1/members/42")
            .json_body(json!({"nick": "Kivou [2000607]"}));
        then.status(200).json_body(json!({}));
    });

    client(&server)
        .edit_nickname(1, 42, "Kivou [2000607]")
        .await
        .expect("nickname edit");

    mock.assert();
}

#[tokio::test]
async fn missing_member_is_none() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/guilds/1/members/42");
        then.status(404).json_body(json!({"message": "Unknown Member", "code": 10007}));
    });

    let member = client(&server).member(1, 42).await.expect("lookup");

    assert!(member.is_none());
}

#[tokio::test]
async fn unknown_guild_is_not_an_absent_member() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/guilds/1/members/42");
        then.status(404).json_body(json!({"message": "Unknown Guild", "code": 10004}));
    });

    let err = client(&server).member(1, 42).await.unwrap_err();

    assert_matches!(err, PlatformError::NotFound(body) if body.contains("Unknown Guild"));
}

#[tokio::test]
async fn members_are_listed_with_display_names() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/guilds/1/members")
            .query_param("limit", "1000")
            .query_param("after", "0");
        then.status(200).json_body(json!([
            {"user": {"id": "42", "username": "kivou", "global_name": "Kivou"}, "nick": "Kivou [2000607]", "roles": ["10", "20"]},
            {"user": {"id": "43", "username": "helper", "bot": true}, "roles": []}
        ]));
    });

    let members = client(&server).guild_members(1).await.expect("members");

    mock.assert();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].display_name, "Kivou [2000607]");
    assert!(members[0].has_role(20));
    assert_eq!(members[1].display_name, "helper");
    assert!(members[1].is_bot);
}

#[tokio::test]
async fn created_role_is_returned() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path("/guilds/1/roles")
            .json_body(json!({"name": "Leader of Nuclear"}));
        then.status(200)
            .json_body(json!({"id": "777", "name": "Leader of Nuclear", "color": 0}));
    });

    let role = client(&server)
        .create_role(1, "Leader of Nuclear")
        .await
        .expect("role creation");

    assert_eq!(role.id, 777);
    assert_eq!(role.name, "Leader of Nuclear");
}

#[tokio::test]
async fn server_error_is_a_request_failure() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/guilds/1/roles");
        then.status(500).body("boom");
    });

    let err = client(&server).guild_roles(1).await.unwrap_err();

    assert_eq!(err, PlatformError::Request("500: boom".to_string()));
}
