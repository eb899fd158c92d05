//! Unseen-image selection and rotation.
//!
//! The server keeps no memory of what a viewer has already seen. The client
//! sends its seen-set with every request; the server picks uniformly from
//! the catalog entries that are not in it, or reports [`Selection::Exhausted`]
//! so the client can clear its seen-set and start a new cycle.
//!
//! Repeating this until exhaustion visits every image exactly once per
//! cycle (sampling without replacement).
//!
//! ## Rust concepts
//! - Lifetimes: `Selection<'a>` borrows from the catalog instead of cloning
//! - Generic `R: Rng + ?Sized` so tests can pass a seeded RNG
//! - `#[serde(transparent)]` newtype that serializes as a bare JSON array

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Outcome of one selection call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection<'a> {
    /// An image the caller has not seen yet.
    Picked(&'a Path),
    /// Every catalog entry is in the seen-set (or the catalog is empty).
    Exhausted,
}

/// Pick one catalog entry not present in `seen`, uniformly at random.
///
/// Seen paths that are no longer in the catalog are ignored. `seen` is
/// never modified; recording the result is the caller's job.
pub fn select_unseen<'a, P, R>(catalog: &'a [PathBuf], seen: &[P], rng: &mut R) -> Selection<'a>
where
    P: AsRef<Path>,
    R: Rng + ?Sized,
{
    let seen: HashSet<&Path> = seen.iter().map(|p| p.as_ref()).collect();

    let available: Vec<&PathBuf> = catalog
        .iter()
        .filter(|path| !seen.contains(path.as_path()))
        .collect();

    match available.choose(rng) {
        Some(&path) => Selection::Picked(path.as_path()),
        None => Selection::Exhausted,
    }
}

/// Client-side record of shown images.
///
/// This mirrors what the browser keeps in local storage: an ordered list
/// that only grows until it is cleared on exhaustion. Appends are
/// deduplicated by a membership check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeenSet(Vec<String>);

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `path` unless it is already present. Returns `true` if added.
    pub fn record(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        if self.contains(&path) {
            return false;
        }
        self.0.push(path);
        true
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.iter().any(|p| p == path)
    }

    /// Forget everything. Called when the server reports exhaustion.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for SeenSet {
    fn from(paths: Vec<String>) -> Self {
        Self(paths)
    }
}
