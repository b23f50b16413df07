// End-to-end tests for the remote client against a live server on a
// loopback port.

use std::fs;
use std::path::Path;

use tokio::net::TcpListener;

use trespasser_backend::api::{self, AppState};
use trespasser_backend::client::{Client, ClientError, ClientOptions};
use trespasser_backend::games::{GameRegistry, GameSpec};
use trespasser_backend::identity::CredentialPolicy;
use trespasser_backend::lifecycle::AttemptState;

async fn spawn_server(base: &Path) -> String {
    let mut spec = GameSpec::new(base, "in_{user}_{attempt}", "out_{user}_{attempt}");
    spec.resources.insert("rules".into(), "rules.txt".into());
    let games = GameRegistry::from_specs([("g".to_string(), spec)]).unwrap();
    let app = api::router(AppState::new(games, CredentialPolicy::IdentifyOnly), 1024 * 1024);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn client(base_url: &str, user: &str) -> Client {
    let options = ClientOptions {
        basic_auth: Some((user.to_string(), "x".to_string())),
        ..ClientOptions::default()
    };
    Client::with_base_url(base_url, options).unwrap()
}

#[tokio::test]
async fn test_client_full_flow() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("rules.txt"), "no cheating").unwrap();
    let base_url = spawn_server(tmp.path()).await;
    let alice = client(&base_url, "alice");

    assert!(alice.game_exists("g").await.unwrap());
    assert!(!alice.game_exists("nope").await.unwrap());
    assert_eq!(
        alice.get_game_resource("g", "rules").await.unwrap(),
        "no cheating"
    );

    let attempt = alice.post_game_attempt("g", b"code".to_vec()).await.unwrap();
    assert_eq!(attempt, 1);
    assert!(alice.game_attempt_exists("g", attempt).await.unwrap());
    assert_eq!(
        alice.get_game_attempt_status("g", attempt).await.unwrap(),
        AttemptState::Waiting
    );
    assert_eq!(alice.get_game_attempt_results("g", attempt).await.unwrap(), None);

    fs::create_dir_all(tmp.path().join("working")).unwrap();
    fs::rename(
        tmp.path().join("input/in_alice_1"),
        tmp.path().join("working/in_alice_1"),
    )
    .unwrap();
    assert_eq!(
        alice.get_game_attempt_status("g", attempt).await.unwrap(),
        AttemptState::Processing
    );

    fs::create_dir_all(tmp.path().join("output")).unwrap();
    fs::write(tmp.path().join("output/out_alice_1"), b"win").unwrap();
    assert_eq!(
        alice.get_game_attempt_status("g", attempt).await.unwrap(),
        AttemptState::Finished
    );
    assert_eq!(
        alice.get_game_attempt_results("g", attempt).await.unwrap(),
        Some(b"win".to_vec())
    );

    assert_eq!(alice.post_game_attempt("g", b"v2".to_vec()).await.unwrap(), 2);
}

#[tokio::test]
async fn test_client_not_found_kinds() {
    let tmp = tempfile::tempdir().unwrap();
    let base_url = spawn_server(tmp.path()).await;
    let alice = client(&base_url, "alice");

    assert!(matches!(
        alice.get_game_resource("nope", "rules").await,
        Err(ClientError::GameNotFound(game)) if game == "nope"
    ));
    assert!(matches!(
        alice.post_game_attempt("nope", Vec::new()).await,
        Err(ClientError::GameNotFound(_))
    ));
    // Declared but missing on disk, and undeclared.
    assert!(matches!(
        alice.get_game_resource("g", "rules").await,
        Err(ClientError::ResourceNotFound(_))
    ));
    assert!(matches!(
        alice.get_game_resource("g", "other").await,
        Err(ClientError::ResourceNotFound(_))
    ));
    assert!(matches!(
        alice.get_game_attempt_status("g", 9).await,
        Err(ClientError::AttemptNotFound(9))
    ));
    assert!(matches!(
        alice.get_game_attempt_results("g", 9).await,
        Err(ClientError::AttemptNotFound(9))
    ));
}

#[tokio::test]
async fn test_client_attempts_are_per_user() {
    let tmp = tempfile::tempdir().unwrap();
    let base_url = spawn_server(tmp.path()).await;
    let alice = client(&base_url, "alice");
    let bob = client(&base_url, "bob");

    assert_eq!(alice.post_game_attempt("g", b"a".to_vec()).await.unwrap(), 1);
    assert!(!bob.game_attempt_exists("g", 1).await.unwrap());
    assert_eq!(bob.post_game_attempt("g", b"b".to_vec()).await.unwrap(), 1);
    assert!(bob.game_attempt_exists("g", 1).await.unwrap());
}

#[tokio::test]
async fn test_client_connection_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = Client::with_base_url(format!("http://{addr}"), ClientOptions::default()).unwrap();
    assert!(matches!(
        client.game_exists("g").await,
        Err(ClientError::Connection(_))
    ));
}
