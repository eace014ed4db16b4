//! Authentication and scoping behavior in the Basic-auth modes.

mod common;

use common::{ALICE, BOB, TestServer};
use reqwest::StatusCode;

#[tokio::test]
async fn test_private_mode_challenges_without_credentials() {
    let server = TestServer::private().await;

    let resp = server.get("/").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.headers()
            .get("www-authenticate")
            .and_then(|v| v.to_str().ok()),
        Some("Basic realm=\"Check Login User\"")
    );
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let server = TestServer::private().await;
    let resp = server.get_as("/", ("alice", "wrong")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().get("www-authenticate").is_some());
}

#[tokio::test]
async fn test_unknown_user_is_unauthorized() {
    let server = TestServer::private().await;
    let resp = server.get_as("/", ("mallory", "correct horse")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_credential_store_is_unauthorized() {
    let server = TestServer::private().await;
    std::fs::remove_file(server.config_dir().join("users.json")).unwrap();

    // Indistinguishable from a wrong password.
    let resp = server.get_as("/", ALICE).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_credential_edits_apply_without_restart() {
    let server = TestServer::private().await;

    let resp = server.get_as("/", ("carol", "sekrit")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // Add carol to the store; the very next request must see her.
    let users = serde_json::json!({
        "Users": [{
            "name": "carol",
            "password": davbox_server::users::password_digest("sekrit"),
        }]
    });
    std::fs::write(server.config_dir().join("users.json"), users.to_string()).unwrap();

    let resp = server.get_as("/", ("carol", "sekrit")).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_private_mode_creates_and_scopes_to_user_directory() {
    let server = TestServer::private().await;

    let resp = server.get_as("/", ALICE).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(server.root().join("alice").is_dir());

    // A file outside alice's sandbox never shows up in her listing.
    std::fs::write(server.root().join("outside.txt"), b"top level").unwrap();
    std::fs::write(server.root().join("alice").join("mine.txt"), b"hers").unwrap();

    let page = server.get_as("/", ALICE).await.text().await.unwrap();
    assert!(page.contains("mine.txt"));
    assert!(!page.contains("outside.txt"));
}

#[tokio::test]
async fn test_private_mode_users_are_isolated() {
    let server = TestServer::private().await;

    server.get_as("/", ALICE).await;
    server.get_as("/", BOB).await;
    std::fs::write(server.root().join("alice").join("diary.txt"), b"private").unwrap();

    let resp = server.get_as("/diary.txt", BOB).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = server.get_as("/diary.txt", ALICE).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_shared_mode_serves_the_root_to_everyone() {
    let server = TestServer::shared().await;
    std::fs::write(server.root().join("board.txt"), b"shared").unwrap();

    for user in [ALICE, BOB] {
        let page = server.get_as("/", user).await.text().await.unwrap();
        assert!(page.contains("board.txt"));
    }
    // No per-user directories appear.
    assert!(!server.root().join("alice").exists());
}

#[tokio::test]
async fn test_listing_carries_disable_token_when_authenticated() {
    let server = TestServer::shared().await;
    let page = server.get_as("/", ALICE).await.text().await.unwrap();
    assert!(page.contains("<div>disable</div>"));
}
