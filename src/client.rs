// Remote client for a Trespasser server: the game, resource and attempt
// endpoints as async calls, with transport failures folded into a few kinds.

use reqwest::{multipart, StatusCode};

use crate::api::ATTEMPT_FIELD;
use crate::lifecycle::AttemptState;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("could not reach the server: {0}")]
    Connection(#[source] reqwest::Error),
    /// TLS handshake failure or 403 from the server.
    #[error("the server rejected our identity")]
    Authentication,
    #[error("game `{0}` not found")]
    GameNotFound(String),
    #[error("resource `{0}` not found")]
    ResourceNotFound(String),
    #[error("attempt {0} not found")]
    AttemptNotFound(u64),
    #[error("unexpected response status {0}")]
    UnexpectedStatus(StatusCode),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid client configuration: {0}")]
    Configuration(#[source] reqwest::Error),
}

/// Connection options.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Skip server certificate verification.
    pub accept_invalid_certs: bool,
    /// PEM bundle (private key + certificate chain) presented to the server.
    pub identity_pem: Option<Vec<u8>>,
    /// User name and password sent as HTTP Basic credentials.
    pub basic_auth: Option<(String, String)>,
}

pub struct Client {
    http: reqwest::Client,
    base_url: String,
    basic_auth: Option<(String, String)>,
}

impl Client {
    /// Client for `https://host[:port]`; the port is left out when it is 443.
    pub fn new(host: &str, port: u16, options: ClientOptions) -> Result<Self, ClientError> {
        let port_part = if port == 443 {
            String::new()
        } else {
            format!(":{port}")
        };
        Self::with_base_url(format!("https://{host}{port_part}"), options)
    }

    /// Client for an explicit base URL such as `http://127.0.0.1:3000`.
    pub fn with_base_url(
        base_url: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let mut builder =
            reqwest::Client::builder().danger_accept_invalid_certs(options.accept_invalid_certs);
        if let Some(pem) = &options.identity_pem {
            let identity =
                reqwest::Identity::from_pem(pem).map_err(ClientError::Configuration)?;
            builder = builder.identity(identity);
        }
        let http = builder.build().map_err(ClientError::Configuration)?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            basic_auth: options.basic_auth,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let request = match &self.basic_auth {
            Some((user, password)) => request.basic_auth(user, Some(password)),
            None => request,
        };
        let response = request.send().await.map_err(classify)?;
        if response.status() == StatusCode::FORBIDDEN {
            return Err(ClientError::Authentication);
        }
        Ok(response)
    }

    pub async fn game_exists(&self, game: &str) -> Result<bool, ClientError> {
        let response = self.send(self.http.get(self.url(&format!("/{game}")))).await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(ClientError::UnexpectedStatus(status)),
        }
    }

    async fn require_game(&self, game: &str) -> Result<(), ClientError> {
        if self.game_exists(game).await? {
            Ok(())
        } else {
            Err(ClientError::GameNotFound(game.to_string()))
        }
    }

    pub async fn get_game_resource(&self, game: &str, resource: &str) -> Result<String, ClientError> {
        self.require_game(game).await?;

        let url = self.url(&format!("/{game}/resources/{resource}"));
        let response = self.send(self.http.get(url)).await?;
        match response.status() {
            StatusCode::OK => response.text().await.map_err(classify),
            StatusCode::NOT_FOUND => Err(ClientError::ResourceNotFound(resource.to_string())),
            status => Err(ClientError::UnexpectedStatus(status)),
        }
    }

    /// Submit an attempt and return the number the server assigned to it.
    pub async fn post_game_attempt(&self, game: &str, data: Vec<u8>) -> Result<u64, ClientError> {
        self.require_game(game).await?;

        let part = multipart::Part::bytes(data).file_name(ATTEMPT_FIELD);
        let form = multipart::Form::new().part(ATTEMPT_FIELD, part);
        let url = self.url(&format!("/{game}/attempts/"));
        let response = self.send(self.http.post(url).multipart(form)).await?;

        match response.status() {
            StatusCode::CREATED => {
                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| ClientError::InvalidResponse("missing Location header".into()))?;
                attempt_from_location(location).ok_or_else(|| {
                    ClientError::InvalidResponse(format!("bad Location header `{location}`"))
                })
            }
            status => Err(ClientError::UnexpectedStatus(status)),
        }
    }

    pub async fn game_attempt_exists(&self, game: &str, attempt: u64) -> Result<bool, ClientError> {
        let url = self.url(&format!("/{game}/attempts/{attempt}"));
        let response = self.send(self.http.get(url)).await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(ClientError::UnexpectedStatus(status)),
        }
    }

    pub async fn get_game_attempt_status(
        &self,
        game: &str,
        attempt: u64,
    ) -> Result<AttemptState, ClientError> {
        self.require_game(game).await?;
        if !self.game_attempt_exists(game, attempt).await? {
            return Err(ClientError::AttemptNotFound(attempt));
        }

        let url = self.url(&format!("/{game}/attempts/{attempt}/status"));
        let response = self.send(self.http.get(url)).await?;
        match response.status() {
            StatusCode::OK => response
                .json::<AttemptState>()
                .await
                .map_err(|e| ClientError::InvalidResponse(e.to_string())),
            // Gone between the existence check and the status read.
            StatusCode::NOT_FOUND => Err(ClientError::AttemptNotFound(attempt)),
            status => Err(ClientError::UnexpectedStatus(status)),
        }
    }

    /// Output of a finished attempt; `None` while it is not finished.
    pub async fn get_game_attempt_results(
        &self,
        game: &str,
        attempt: u64,
    ) -> Result<Option<Vec<u8>>, ClientError> {
        if self.get_game_attempt_status(game, attempt).await? != AttemptState::Finished {
            return Ok(None);
        }

        let url = self.url(&format!("/{game}/attempts/{attempt}/results"));
        let response = self.send(self.http.get(url)).await?;
        match response.status() {
            StatusCode::OK => {
                let bytes = response.bytes().await.map_err(classify)?;
                Ok(Some(bytes.to_vec()))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(ClientError::UnexpectedStatus(status)),
        }
    }
}

/// The attempt number is the last non-empty segment of the Location path.
pub fn attempt_from_location(location: &str) -> Option<u64> {
    location
        .split('/')
        .filter(|s| !s.is_empty())
        .last()?
        .parse()
        .ok()
}

fn classify(error: reqwest::Error) -> ClientError {
    if is_tls_failure(&error) {
        ClientError::Authentication
    } else {
        ClientError::Connection(error)
    }
}

/// TLS handshake errors reach us as `InvalidData` I/O errors somewhere in
/// the source chain.
fn is_tls_failure(error: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(error);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::InvalidData {
                return true;
            }
        }
        source = err.source();
    }
    false
}
