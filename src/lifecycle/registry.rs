// Attempt discovery: the attempts a user has are exactly the matching file
// names in the game's input and working directories.

use std::collections::BTreeSet;
use std::io::ErrorKind;

use crate::error::Error;
use crate::games::Game;
use crate::identity::User;
use crate::lifecycle::paths::Stage;
use crate::lifecycle::template::{Bindings, ATTEMPT};

/// Stages whose directories prove an attempt exists.
const KNOWN_STAGES: [Stage; 2] = [Stage::Input, Stage::Working];

/// Every attempt number `user` has in `game`, ascending.
///
/// A number present in both directories is reported once. Directories that
/// do not exist yet count as empty; entries that are not regular files or
/// whose names don't match the input template are skipped.
pub fn enumerate_attempts(game: &Game, user: &User) -> Result<BTreeSet<u64>, Error> {
    let matcher = game
        .input_name_format
        .matcher(ATTEMPT, &Bindings::user(user.as_str()))?;
    let mut attempts = BTreeSet::new();

    for stage in KNOWN_STAGES {
        let dir = game.stage_dir(stage);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("{} directory {} does not exist yet", stage, dir.display());
                continue;
            }
            Err(e) => return Err(Error::io(dir, e)),
        };

        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&dir, e))?;
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(attempt) = matcher.extract(name) {
                attempts.insert(attempt);
            }
        }
    }

    tracing::debug!(
        "Found {} attempts for {user} in {} (pattern {})",
        attempts.len(),
        game.key,
        matcher.pattern()
    );
    Ok(attempts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::GameSpec;
    use std::fs;
    use std::path::Path;

    fn game(base: &Path) -> Game {
        Game::from_spec("g", GameSpec::new(base, "in_{user}_{attempt}", "out_{user}_{attempt}"))
            .unwrap()
    }

    fn touch(dir: &Path, name: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn test_missing_directories_are_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let game = game(&tmp.path().join("not-created"));
        let alice = User::parse("alice").unwrap();
        assert!(enumerate_attempts(&game, &alice).unwrap().is_empty());
    }

    #[test]
    fn test_collects_from_input_and_working() {
        let tmp = tempfile::tempdir().unwrap();
        let game = game(tmp.path());
        touch(&tmp.path().join("input"), "in_alice_1");
        touch(&tmp.path().join("input"), "in_alice_4");
        touch(&tmp.path().join("working"), "in_alice_2");
        touch(&tmp.path().join("working"), "in_alice_4");
        // Output files do not make an attempt exist.
        touch(&tmp.path().join("output"), "in_alice_9");

        let alice = User::parse("alice").unwrap();
        let attempts = enumerate_attempts(&game, &alice).unwrap();
        assert_eq!(attempts.into_iter().collect::<Vec<_>>(), vec![1, 2, 4]);
    }

    #[test]
    fn test_ignores_other_users_and_unrelated_files() {
        let tmp = tempfile::tempdir().unwrap();
        let game = game(tmp.path());
        let input = tmp.path().join("input");
        touch(&input, "in_alice_1");
        touch(&input, "in_bob_2");
        touch(&input, "in_alice_3.tmp");
        touch(&input, "README");
        fs::create_dir_all(input.join("in_alice_5")).unwrap();

        let alice = User::parse("alice").unwrap();
        let attempts = enumerate_attempts(&game, &alice).unwrap();
        assert_eq!(attempts.into_iter().collect::<Vec<_>>(), vec![1]);
    }
}
