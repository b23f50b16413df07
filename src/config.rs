// Application configuration, loaded from environment variables and CLI flags.

use std::path::PathBuf;

/// Default cap on a single submitted attempt.
pub const DEFAULT_MAX_SUBMISSION_BYTES: usize = 16 * 1024 * 1024;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// JSON file describing the configured games.
    pub games_path: PathBuf,
    /// Optional JSON file of user name -> argon2 hash. Without it users are
    /// identified by name only.
    pub credentials_path: Option<PathBuf>,
    /// Largest accepted request body for attempt submissions.
    pub max_submission_bytes: usize,
    /// When set, print a hash for this password and exit.
    pub hash_password: Option<String>,
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `PORT` - HTTP server port (default: 3000)
    /// - `TRESPASSER_GAMES` - Path to the games file (default: `games.json`)
    /// - `TRESPASSER_CREDENTIALS` - Path to a credentials file (optional)
    /// - `TRESPASSER_MAX_SUBMISSION_BYTES` - Submission size limit (default: 16 MiB)
    ///
    /// CLI flags:
    /// - `--port <PORT>` - Override the port
    /// - `--games <PATH>` - Override the games file
    /// - `--credentials <PATH>` - Override the credentials file
    /// - `--hash-password <PASSWORD>` - Print an argon2 hash and exit
    pub fn load() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |key| std::env::var(key).ok())
    }

    /// Build from explicit arguments and an environment lookup.
    pub fn from_sources(args: &[String], env: impl Fn(&str) -> Option<String>) -> Self {
        // CLI flag takes precedence, then env var, then default
        let port = Self::parse_cli_value(args, "--port")
            .and_then(|v| v.parse().ok())
            .or_else(|| env("PORT").and_then(|v| v.parse().ok()))
            .unwrap_or(3000);

        let games_path = Self::parse_cli_value(args, "--games")
            .or_else(|| env("TRESPASSER_GAMES"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("games.json"));

        let credentials_path = Self::parse_cli_value(args, "--credentials")
            .or_else(|| env("TRESPASSER_CREDENTIALS"))
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let max_submission_bytes = env("TRESPASSER_MAX_SUBMISSION_BYTES")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_SUBMISSION_BYTES);

        let hash_password = Self::parse_cli_value(args, "--hash-password");

        Config {
            port,
            games_path,
            credentials_path,
            max_submission_bytes,
            hash_password,
        }
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(&args(&["trespasser-backend"]), |_| None);
        assert_eq!(config.port, 3000);
        assert_eq!(config.games_path, PathBuf::from("games.json"));
        assert_eq!(config.credentials_path, None);
        assert_eq!(config.max_submission_bytes, DEFAULT_MAX_SUBMISSION_BYTES);
        assert_eq!(config.hash_password, None);
    }

    #[test]
    fn test_env_values() {
        let env = HashMap::from([
            ("PORT", "8080"),
            ("TRESPASSER_GAMES", "/etc/trespasser/games.json"),
            ("TRESPASSER_CREDENTIALS", "/etc/trespasser/users.json"),
            ("TRESPASSER_MAX_SUBMISSION_BYTES", "1024"),
        ]);
        let config = Config::from_sources(&args(&["bin"]), |k| {
            env.get(k).map(|v| v.to_string())
        });
        assert_eq!(config.port, 8080);
        assert_eq!(config.games_path, PathBuf::from("/etc/trespasser/games.json"));
        assert_eq!(
            config.credentials_path,
            Some(PathBuf::from("/etc/trespasser/users.json"))
        );
        assert_eq!(config.max_submission_bytes, 1024);
    }

    #[test]
    fn test_cli_overrides_env() {
        let config = Config::from_sources(
            &args(&["bin", "--port", "9000", "--games", "local.json"]),
            |k| match k {
                "PORT" => Some("8080".into()),
                "TRESPASSER_GAMES" => Some("env.json".into()),
                _ => None,
            },
        );
        assert_eq!(config.port, 9000);
        assert_eq!(config.games_path, PathBuf::from("local.json"));
    }

    #[test]
    fn test_invalid_port_falls_back() {
        let config = Config::from_sources(&args(&["bin", "--port", "nope"]), |_| None);
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_hash_password_flag() {
        let config = Config::from_sources(&args(&["bin", "--hash-password", "pw"]), |_| None);
        assert_eq!(config.hash_password.as_deref(), Some("pw"));
    }
}
