// Attempt state, derived from which stage directories hold the attempt's files.
//
// The worker moves a submission from input to working when it starts and
// writes the output file when it is done. Nothing here writes or moves files.

use std::fmt;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::games::Game;
use crate::identity::User;
use crate::lifecycle::paths::{path_for, Stage};
use crate::lifecycle::registry::enumerate_attempts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptState {
    Waiting,
    Processing,
    Finished,
}

impl AttemptState {
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptState::Waiting => "waiting",
            AttemptState::Processing => "processing",
            AttemptState::Finished => "finished",
        }
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state of one of `user`'s attempts.
pub fn resolve_status(game: &Game, user: &User, attempt: u64) -> Result<AttemptState, Error> {
    if !enumerate_attempts(game, user)?.contains(&attempt) {
        return Err(Error::AttemptNotFound(attempt));
    }
    state_of_known(game, user, attempt)
}

/// State of an attempt the registry has already listed.
///
/// | working | output | input | result           |
/// |---------|--------|-------|------------------|
/// | no      | -      | yes   | waiting          |
/// | no      | -      | no    | AttemptNotFound  |
/// | yes     | no     | -     | processing       |
/// | yes     | yes    | -     | finished         |
pub(crate) fn state_of_known(
    game: &Game,
    user: &User,
    attempt: u64,
) -> Result<AttemptState, Error> {
    let working = path_for(game, Stage::Working, user, attempt)?;
    if !exists(&working)? {
        let input = path_for(game, Stage::Input, user, attempt)?;
        if exists(&input)? {
            return Ok(AttemptState::Waiting);
        }
        // Listed a moment ago, gone now.
        tracing::warn!(
            "Attempt {attempt} of {user} in {} disappeared while resolving its status",
            game.key
        );
        return Err(Error::AttemptNotFound(attempt));
    }

    let output = path_for(game, Stage::Output, user, attempt)?;
    if exists(&output)? {
        Ok(AttemptState::Finished)
    } else {
        Ok(AttemptState::Processing)
    }
}

/// Output bytes of a finished attempt; `NotReady` for any other state.
pub fn resolve_results(game: &Game, user: &User, attempt: u64) -> Result<Vec<u8>, Error> {
    let state = resolve_status(game, user, attempt)?;
    read_results(game, user, attempt, state)
}

/// Read the output for an attempt last seen in `state`.
pub(crate) fn read_results(
    game: &Game,
    user: &User,
    attempt: u64,
    state: AttemptState,
) -> Result<Vec<u8>, Error> {
    if state != AttemptState::Finished {
        return Err(Error::NotReady(attempt));
    }

    let output = path_for(game, Stage::Output, user, attempt)?;
    match std::fs::read(&output) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!(
                "Output of attempt {attempt} of {user} in {} vanished before it was read",
                game.key
            );
            Err(Error::NotReady(attempt))
        }
        Err(e) => Err(Error::io(output, e)),
    }
}

/// Whether an output file is present, regardless of the other stages.
pub fn has_results(game: &Game, user: &User, attempt: u64) -> Result<bool, Error> {
    let output = path_for(game, Stage::Output, user, attempt)?;
    exists(&output)
}

fn exists(path: &Path) -> Result<bool, Error> {
    path.try_exists().map_err(|e| Error::io(path, e))
}
