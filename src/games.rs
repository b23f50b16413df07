// Static game configuration, loaded once at startup from a JSON file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Error;
use crate::lifecycle::template::{Template, TemplateError, ATTEMPT, PLACEHOLDERS};

/// One game entry as written in the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct GameSpec {
    /// Root of the game's file area. Stage directories and resources are
    /// resolved relative to it.
    pub base_path: PathBuf,
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// File-name template shared by the input and working stages.
    pub input_name_format: String,
    pub output_name_format: String,
    /// Resource name -> path relative to `base_path`.
    #[serde(default)]
    pub resources: BTreeMap<String, PathBuf>,
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("input")
}

fn default_working_dir() -> PathBuf {
    PathBuf::from("working")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl GameSpec {
    /// An entry with the default `input`/`working`/`output` stage directories
    /// and no resources.
    pub fn new(
        base_path: impl Into<PathBuf>,
        input_name_format: impl Into<String>,
        output_name_format: impl Into<String>,
    ) -> Self {
        Self {
            base_path: base_path.into(),
            input_dir: default_input_dir(),
            working_dir: default_working_dir(),
            output_dir: default_output_dir(),
            input_name_format: input_name_format.into(),
            output_name_format: output_name_format.into(),
            resources: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GamesFile {
    games: BTreeMap<String, GameSpec>,
}

#[derive(Debug, thiserror::Error)]
pub enum GameConfigError {
    #[error("failed to read game configuration {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid game configuration {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid game key `{0}`")]
    InvalidKey(String),
    #[error("game `{game}`: template `{template}`: {source}")]
    Template {
        game: String,
        template: String,
        source: TemplateError,
    },
}

/// A validated game: templates parsed, placeholder names checked.
#[derive(Debug, Clone)]
pub struct Game {
    pub key: String,
    pub base_path: PathBuf,
    pub input_dir: PathBuf,
    pub working_dir: PathBuf,
    pub output_dir: PathBuf,
    pub input_name_format: Template,
    pub output_name_format: Template,
    pub resources: BTreeMap<String, PathBuf>,
}

impl Game {
    pub fn from_spec(key: &str, spec: GameSpec) -> Result<Self, GameConfigError> {
        if key.is_empty() || key.contains('/') {
            return Err(GameConfigError::InvalidKey(key.to_string()));
        }

        let input_name_format = checked_template(key, &spec.input_name_format)?;
        let output_name_format = checked_template(key, &spec.output_name_format)?;

        // Attempts are recovered from input/working names, so the number
        // has to be part of them.
        if !input_name_format.contains(ATTEMPT) {
            return Err(GameConfigError::Template {
                game: key.to_string(),
                template: spec.input_name_format,
                source: TemplateError::MissingCapture(ATTEMPT.to_string()),
            });
        }

        Ok(Self {
            key: key.to_string(),
            base_path: spec.base_path,
            input_dir: spec.input_dir,
            working_dir: spec.working_dir,
            output_dir: spec.output_dir,
            input_name_format,
            output_name_format,
            resources: spec.resources,
        })
    }

    /// Absolute location of a named resource, if the game declares it.
    pub fn resource_path(&self, name: &str) -> Option<PathBuf> {
        self.resources.get(name).map(|rel| self.base_path.join(rel))
    }
}

fn checked_template(game: &str, source: &str) -> Result<Template, GameConfigError> {
    let to_error = |source_err: TemplateError| GameConfigError::Template {
        game: game.to_string(),
        template: source.to_string(),
        source: source_err,
    };

    let template = Template::parse(source).map_err(to_error)?;
    if let Some(unknown) = template.placeholders().find(|p| !PLACEHOLDERS.contains(p)) {
        return Err(to_error(TemplateError::UnknownPlaceholder(unknown.to_string())));
    }
    // Attempts are found by listing the top level of a stage directory.
    if !template.is_file_name() {
        return Err(to_error(TemplateError::NotAFileName(source.to_string())));
    }
    Ok(template)
}

/// All configured games, keyed and sorted by name. Immutable after load.
#[derive(Debug, Clone, Default)]
pub struct GameRegistry {
    games: BTreeMap<String, Game>,
}

impl GameRegistry {
    /// Read and validate the games file at `path`.
    pub fn load(path: &Path) -> Result<Self, GameConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| GameConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: GamesFile =
            serde_json::from_str(&contents).map_err(|source| GameConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_specs(file.games)
    }

    pub fn from_specs(
        specs: impl IntoIterator<Item = (String, GameSpec)>,
    ) -> Result<Self, GameConfigError> {
        let mut games = BTreeMap::new();
        for (key, spec) in specs {
            let game = Game::from_spec(&key, spec)?;
            games.insert(key, game);
        }
        Ok(Self { games })
    }

    /// Look up a game, failing with `UnknownGame` for keys not configured.
    pub fn get(&self, key: &str) -> Result<&Game, Error> {
        self.games
            .get(key)
            .ok_or_else(|| Error::UnknownGame(key.to_string()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.games.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> GameSpec {
        GameSpec::new("/srv/g", "in_{user}_{attempt}", "out_{user}_{attempt}")
    }

    #[test]
    fn test_game_from_spec() {
        let game = Game::from_spec("g", spec()).unwrap();
        assert_eq!(game.key, "g");
        assert_eq!(game.input_dir, PathBuf::from("input"));
        assert_eq!(game.input_name_format.as_str(), "in_{user}_{attempt}");
    }

    #[test]
    fn test_game_rejects_unknown_placeholder() {
        let mut s = spec();
        s.output_name_format = "out_{team}_{attempt}".into();
        let err = Game::from_spec("g", s).unwrap_err();
        match err {
            GameConfigError::Template { source, .. } => {
                assert!(matches!(source, TemplateError::UnknownPlaceholder(n) if n == "team"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_game_requires_attempt_in_input_template() {
        let mut s = spec();
        s.input_name_format = "in_{user}".into();
        assert!(matches!(
            Game::from_spec("g", s),
            Err(GameConfigError::Template {
                source: TemplateError::MissingCapture(_),
                ..
            })
        ));
    }

    #[test]
    fn test_game_rejects_templates_with_paths() {
        let cases = [
            ("sub/{user}-{attempt}", "out_{user}_{attempt}"),
            ("in_{user}_{attempt}", "../out_{user}_{attempt}"),
            ("in\\{user}_{attempt}", "out_{user}_{attempt}"),
            ("in_{user}_{attempt}", ".."),
        ];
        for (input, output) in cases {
            let mut s = spec();
            s.input_name_format = input.into();
            s.output_name_format = output.into();
            assert!(
                matches!(
                    Game::from_spec("g", s),
                    Err(GameConfigError::Template {
                        source: TemplateError::NotAFileName(_),
                        ..
                    })
                ),
                "input {input} output {output}"
            );
        }
    }

    #[test]
    fn test_game_rejects_bad_keys() {
        assert!(matches!(
            Game::from_spec("", spec()),
            Err(GameConfigError::InvalidKey(_))
        ));
        assert!(matches!(
            Game::from_spec("a/b", spec()),
            Err(GameConfigError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_resource_path() {
        let mut s = spec();
        s.resources.insert("rules".into(), PathBuf::from("docs/rules.txt"));
        let game = Game::from_spec("g", s).unwrap();
        assert_eq!(
            game.resource_path("rules"),
            Some(PathBuf::from("/srv/g/docs/rules.txt"))
        );
        assert_eq!(game.resource_path("missing"), None);
    }

    #[test]
    fn test_registry_from_json() {
        let json = r#"{
            "games": {
                "zeta": {
                    "base_path": "/srv/zeta",
                    "input_name_format": "{user}-{attempt}.in",
                    "output_name_format": "{user}-{attempt}.out"
                },
                "alpha": {
                    "base_path": "/srv/alpha",
                    "input_dir": "queue",
                    "working_dir": "busy",
                    "output_dir": "done",
                    "input_name_format": "{attempt}_{user}",
                    "output_name_format": "{attempt}_{user}.json",
                    "resources": {"map": "map.txt"}
                }
            }
        }"#;
        let file: GamesFile = serde_json::from_str(json).unwrap();
        let registry = GameRegistry::from_specs(file.games).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.keys().collect::<Vec<_>>(), vec!["alpha", "zeta"]);

        let alpha = registry.get("alpha").unwrap();
        assert_eq!(alpha.working_dir, PathBuf::from("busy"));
        assert_eq!(alpha.resources.len(), 1);
    }

    #[test]
    fn test_registry_unknown_game() {
        let registry = GameRegistry::from_specs([("g".to_string(), spec())]).unwrap();
        assert!(matches!(registry.get("nope"), Err(Error::UnknownGame(k)) if k == "nope"));
    }

    #[test]
    fn test_registry_load_missing_file() {
        let err = GameRegistry::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, GameConfigError::Io { .. }));
    }
}
