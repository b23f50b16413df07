// Concrete file locations for a game's attempts.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::games::Game;
use crate::identity::User;
use crate::lifecycle::template::{Bindings, Template, TemplateError};

/// Where in its lifecycle a submitted file sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Submitted, waiting for the worker.
    Input,
    /// Picked up by the worker.
    Working,
    /// Results written by the worker.
    Output,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Input, Stage::Working, Stage::Output];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Input => "input",
            Stage::Working => "working",
            Stage::Output => "output",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Game {
    /// Input and working share the input template family.
    pub fn name_template(&self, stage: Stage) -> &Template {
        match stage {
            Stage::Input | Stage::Working => &self.input_name_format,
            Stage::Output => &self.output_name_format,
        }
    }

    /// `base_path/<stage dir>`
    pub fn stage_dir(&self, stage: Stage) -> PathBuf {
        let dir = match stage {
            Stage::Input => &self.input_dir,
            Stage::Working => &self.working_dir,
            Stage::Output => &self.output_dir,
        };
        self.base_path.join(dir)
    }
}

/// `base_path/<stage dir>/<rendered stage template>`
pub fn path_for(
    game: &Game,
    stage: Stage,
    user: &User,
    attempt: u64,
) -> Result<PathBuf, TemplateError> {
    let name = game
        .name_template(stage)
        .render(&Bindings::new(user.as_str(), attempt))?;
    Ok(game.stage_dir(stage).join(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::GameSpec;

    fn game() -> Game {
        let mut spec = GameSpec::new("/srv/g", "in_{user}_{attempt}", "{attempt}-{user}.out");
        spec.working_dir = PathBuf::from("busy");
        Game::from_spec("g", spec).unwrap()
    }

    #[test]
    fn test_path_for_each_stage() {
        let game = game();
        let alice = User::parse("alice").unwrap();
        assert_eq!(
            path_for(&game, Stage::Input, &alice, 3).unwrap(),
            PathBuf::from("/srv/g/input/in_alice_3")
        );
        assert_eq!(
            path_for(&game, Stage::Working, &alice, 3).unwrap(),
            PathBuf::from("/srv/g/busy/in_alice_3")
        );
        assert_eq!(
            path_for(&game, Stage::Output, &alice, 3).unwrap(),
            PathBuf::from("/srv/g/output/3-alice.out")
        );
    }

    #[test]
    fn test_stage_names() {
        let names: Vec<_> = Stage::ALL.iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["input", "working", "output"]);
        assert_eq!(serde_json::to_string(&Stage::Working).unwrap(), "\"working\"");
    }
}
