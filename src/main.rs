use std::sync::Arc;

use trespasser_backend::{
    api::{self, AppState},
    config::Config,
    games::GameRegistry,
    identity::{self, CredentialPolicy, Credentials},
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::load();

    if let Some(password) = &config.hash_password {
        match identity::hash_password(password) {
            Ok(hash) => println!("{hash}"),
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        }
        return;
    }

    let games = GameRegistry::load(&config.games_path).expect("Failed to load game configuration");
    tracing::info!(
        "Loaded {} games from {}",
        games.len(),
        config.games_path.display()
    );

    let credentials = match &config.credentials_path {
        Some(path) => {
            let credentials = Credentials::load(path).expect("Failed to load credentials");
            tracing::info!("Verifying passwords for {} users", credentials.len());
            CredentialPolicy::Verify(Arc::new(credentials))
        }
        None => {
            tracing::warn!("No credentials configured; users are identified by name only");
            CredentialPolicy::IdentifyOnly
        }
    };

    let app = api::router(
        AppState::new(games, credentials),
        config.max_submission_bytes,
    );

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));

    tracing::info!("Trespasser backend listening on port {}", config.port);
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
