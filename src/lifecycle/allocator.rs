// Attempt numbering and submission.
//
// Numbers are max(existing) + 1. Listing and writing are two separate steps,
// so submissions for the same (game, user) are serialised through
// `SubmissionLocks`. Writers in other processes are not covered.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::Error;
use crate::games::Game;
use crate::identity::User;
use crate::lifecycle::paths::{path_for, Stage};
use crate::lifecycle::registry::enumerate_attempts;

/// The number after the highest one in `existing`, or 1. `None` once
/// `u64::MAX` is taken.
pub fn next_attempt(existing: &BTreeSet<u64>) -> Option<u64> {
    match existing.last() {
        Some(max) => max.checked_add(1),
        None => Some(1),
    }
}

/// Next free attempt number for `user` in `game`.
///
/// Not atomic on its own: two callers may observe the same maximum. Use
/// [`submit`] to allocate and write under the per-user lock.
pub fn allocate(game: &Game, user: &User) -> Result<u64, Error> {
    let attempts = enumerate_attempts(game, user)?;
    next_attempt(&attempts).ok_or_else(|| Error::AttemptsExhausted {
        game: game.key.clone(),
        user: user.to_string(),
    })
}

/// Key for the lock map: (game key, user name).
type LockKey = (String, String);

/// One mutex per (game, user), created on first use.
#[derive(Debug, Clone, Default)]
pub struct SubmissionLocks {
    inner: Arc<Mutex<HashMap<LockKey, Arc<Mutex<()>>>>>,
}

impl SubmissionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &LockKey) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.entry(key.clone()).or_default().clone()
    }

    /// Hand back a slot; the entry goes once nobody else holds or waits on it.
    fn release(&self, key: &LockKey, slot: Arc<Mutex<()>>) {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        drop(slot);
        if map.get(key).is_some_and(|s| Arc::strong_count(s) == 1) {
            map.remove(key);
        }
    }

    /// Number of (game, user) pairs seen so far.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Allocate a new attempt number and store `contents` as its input file.
/// Returns the number.
pub fn submit(
    game: &Game,
    user: &User,
    contents: &[u8],
    locks: &SubmissionLocks,
) -> Result<u64, Error> {
    let key = (game.key.clone(), user.as_str().to_string());
    let slot = locks.slot(&key);
    let stored = {
        let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        store(game, user, contents)
    };
    locks.release(&key, slot);
    stored
}

fn store(game: &Game, user: &User, contents: &[u8]) -> Result<u64, Error> {
    let attempt = allocate(game, user)?;

    let input_dir = game.stage_dir(Stage::Input);
    std::fs::create_dir_all(&input_dir).map_err(|e| Error::io(&input_dir, e))?;

    let path = path_for(game, Stage::Input, user, attempt)?;
    std::fs::write(&path, contents).map_err(|e| Error::io(&path, e))?;

    tracing::info!(
        "Stored attempt {attempt} for {user} in {} ({} bytes)",
        game.key,
        contents.len()
    );
    Ok(attempt)
}
