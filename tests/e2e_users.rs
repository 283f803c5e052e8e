//! E2E tests for the permission-gated user directory

mod common;

use common::TestServer;
use refactoriq::data::{EntityId, Role};
use serde_json::Value;

#[tokio::test]
async fn test_users_without_cookie_is_unauthorized() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/api/v1/users"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_users_with_client_cookie_is_forbidden() {
    let server = TestServer::new().await;
    let client = server.create_client(1001, "client-user").await;
    let cookie = server.session_cookie(&client.id, Role::Client);

    let response = server
        .client
        .get(server.url("/api/v1/users"))
        .header("cookie", cookie)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "FORBIDDEN");
    assert_eq!(body["error"]["message"], "Permission 'manage-users' required");
}

#[tokio::test]
async fn test_admin_lists_users_with_pagination() {
    let server = TestServer::new().await;
    server.create_admin("admin@example.com", "correct-horse").await;
    for n in 0..3 {
        server.create_client(2000 + n, &format!("client{n}")).await;
    }
    let cookie = server.login_admin("admin@example.com", "correct-horse").await;

    let response = server
        .client
        .get(server.url("/api/v1/users?page=1&size=2"))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["total"], 4);
    assert_eq!(body["data"]["pages"], 2);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["meta"]["pagination"]["has_next_page"], true);

    let response = server
        .client
        .get(server.url("/api/v1/users/?role=client"))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["total"], 3);
    assert!(
        body["data"]["items"]
            .as_array()
            .unwrap()
            .iter()
            .all(|user| user["role"] == "client")
    );
}

#[tokio::test]
async fn test_list_users_rejects_out_of_range_size() {
    let server = TestServer::new().await;
    let admin = server.create_admin("admin@example.com", "correct-horse").await;
    let cookie = server.session_cookie(&admin.id, Role::Admin);

    for query in ["size=0", "size=101", "page=0", "role=owner"] {
        let response = server
            .client
            .get(server.url(&format!("/api/v1/users?{query}")))
            .header("cookie", &cookie)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 422, "query {query}");
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }
}

#[tokio::test]
async fn test_admin_gets_updates_and_deletes_user() {
    let server = TestServer::new().await;
    let admin = server.create_admin("admin@example.com", "correct-horse").await;
    let client = server.create_client(3000, "target").await;
    let cookie = server.session_cookie(&admin.id, Role::Admin);
    let user_url = server.url(&format!("/api/v1/users/{}", client.id));

    let response = server
        .client
        .get(&user_url)
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["github_username"], "target");

    let response = server
        .client
        .patch(&user_url)
        .header("cookie", &cookie)
        .json(&serde_json::json!({ "display_name": "Renamed", "is_active": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["display_name"], "Renamed");
    assert_eq!(body["data"]["is_active"], false);

    let response = server
        .client
        .delete(&user_url)
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["message"], "User deleted successfully");

    let response = server
        .client
        .get(&user_url)
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(body["error"]["details"]["entity_type"], "user");
}

#[tokio::test]
async fn test_patch_rejects_unknown_fields() {
    let server = TestServer::new().await;
    let admin = server.create_admin("admin@example.com", "correct-horse").await;
    let cookie = server.session_cookie(&admin.id, Role::Admin);

    let response = server
        .client
        .patch(server.url(&format!("/api/v1/users/{}", admin.id)))
        .header("cookie", &cookie)
        .json(&serde_json::json!({ "password_hash": "x" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 422);
}

#[tokio::test]
async fn test_patch_into_taken_email_is_conflict() {
    let server = TestServer::new().await;
    let admin = server.create_admin("admin@example.com", "correct-horse").await;
    let other = server.create_admin("other@example.com", "correct-horse").await;
    let cookie = server.session_cookie(&admin.id, Role::Admin);

    let response = server
        .client
        .patch(server.url(&format!("/api/v1/users/{}", other.id)))
        .header("cookie", &cookie)
        .json(&serde_json::json!({ "email": "admin@example.com" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 409);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_deleted_caller_cannot_use_directory() {
    let server = TestServer::new().await;
    let ghost_id = EntityId::new().0;
    let cookie = server.session_cookie(&ghost_id, Role::Admin);

    let response = server
        .client
        .get(server.url("/api/v1/users"))
        .header("cookie", cookie)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let server = TestServer::new().await;
    let admin = server.create_admin("admin@example.com", "correct-horse").await;

    let expired = refactoriq::auth::TokenService::new(
        "test-secret-key-that-is-32-bytes!",
        "HS256",
        chrono::Duration::seconds(1),
    )
    .unwrap()
    .issue(&admin.id, Role::Admin)
    .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(2100)).await;

    let response = server
        .client
        .get(server.url("/api/v1/users"))
        .header("cookie", format!("access_token={expired}"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
}
