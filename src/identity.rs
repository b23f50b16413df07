// Request identity: user names from HTTP Basic credentials, optionally checked
// against argon2 password hashes.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderValue, StatusCode},
    Json,
};
use axum_extra::headers::{authorization::Basic, Authorization, Header};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name used for requests that carry no usable identity.
pub const NOBODY: &str = "nobody";

// ── User ─────────────────────────────────────────────────────────────

/// A user name made of `[0-9A-Za-z_-]`, never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct User(String);

impl User {
    pub fn parse(name: &str) -> Option<Self> {
        if name.is_empty() || !name.chars().all(is_user_char) {
            return None;
        }
        Some(Self(name.to_string()))
    }

    pub fn nobody() -> Self {
        Self(NOBODY.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_nobody(&self) -> bool {
        self.0 == NOBODY
    }
}

fn is_user_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Password hashing ─────────────────────────────────────────────────

pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| format!("Failed to hash password: {e}"))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, String> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| format!("Invalid password hash: {e}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

// ── Credentials ──────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("failed to read credentials {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid credentials file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// User name -> argon2 PHC hash.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    hashes: HashMap<String, String>,
}

impl Credentials {
    /// Load a JSON object mapping user names to password hashes.
    pub fn load(path: &Path) -> Result<Self, CredentialsError> {
        let contents = std::fs::read_to_string(path).map_err(|source| CredentialsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let hashes = serde_json::from_str(&contents).map_err(|source| CredentialsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { hashes })
    }

    pub fn from_hashes(hashes: HashMap<String, String>) -> Self {
        Self { hashes }
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Unknown users and malformed stored hashes both fail verification.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let Some(hash) = self.hashes.get(username) else {
            return false;
        };
        match verify_password(password, hash) {
            Ok(ok) => ok,
            Err(e) => {
                tracing::error!("Stored hash for {username} is unusable: {e}");
                false
            }
        }
    }
}

/// How much a Basic header is trusted.
#[derive(Debug, Clone, Default)]
pub enum CredentialPolicy {
    /// The user name is taken as given; the password is ignored.
    #[default]
    IdentifyOnly,
    /// The password must verify against the stored hash.
    Verify(Arc<Credentials>),
}

// ── Identification ───────────────────────────────────────────────────

/// A Basic header named a user whose password did not verify.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("credentials for `{0}` were rejected")]
pub struct IdentityRejected(pub String);

/// Work out who is asking from an `Authorization` header value.
///
/// Anything other than well-formed Basic credentials with a valid user name
/// identifies as [`User::nobody`].
pub fn identify(
    header: Option<&HeaderValue>,
    policy: &CredentialPolicy,
) -> Result<User, IdentityRejected> {
    let Some(value) = header else {
        return Ok(User::nobody());
    };
    let Ok(basic) = Authorization::<Basic>::decode(&mut std::iter::once(value)) else {
        return Ok(User::nobody());
    };
    let Some(user) = User::parse(basic.username()) else {
        return Ok(User::nobody());
    };

    match policy {
        CredentialPolicy::IdentifyOnly => Ok(user),
        CredentialPolicy::Verify(credentials) => {
            if credentials.verify(user.as_str(), basic.password()) {
                Ok(user)
            } else {
                tracing::warn!("Rejected credentials for {user}");
                Err(IdentityRejected(user.0))
            }
        }
    }
}

// ── Axum extractor: Identity ─────────────────────────────────────────

/// The requesting user. Usage: `Identity(user)` in handler parameters.
#[derive(Debug, Clone)]
pub struct Identity(pub User);

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
    CredentialPolicy: FromRef<S>,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let policy = CredentialPolicy::from_ref(state);
        let header = parts.headers.get(AUTHORIZATION).cloned();

        let identified = match policy {
            CredentialPolicy::IdentifyOnly => identify(header.as_ref(), &policy),
            // Password hashing is CPU-bound; keep it off the async workers.
            CredentialPolicy::Verify(_) => {
                tokio::task::spawn_blocking(move || identify(header.as_ref(), &policy))
                    .await
                    .map_err(|e| {
                        tracing::error!("Credential check failed: {e}");
                        (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            Json(serde_json::json!({ "error": "Internal server error" })),
                        )
                    })?
            }
        };

        identified.map(Identity).map_err(|e| {
            (
                StatusCode::FORBIDDEN,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
        })
    }
}
