//! Keyed diff of two item sequences.
//!
//! Pure index bookkeeping: which previous items go, which next items are new,
//! and for items present in both whether their content must be re-diffed or
//! they merely changed position. Applying the result to a host is the
//! differ's job.

use std::collections::{HashMap, HashSet};

use crate::types::Key;

/// How a previous item relates to the next item with the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    /// Same content; at most a move.
    Same,
    /// Content changed; recurse.
    Changed,
    /// Cannot be reused (e.g. owned vs adopted); remove and add.
    Incompatible,
}

/// Relations between previous and next indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyedDiff {
    /// Next indices with no reusable previous item.
    pub added: Vec<usize>,
    /// Previous indices to drop, highest first.
    pub removed: Vec<usize>,
    /// `(previous, next)` pairs whose content changed.
    pub updated: Vec<(usize, usize)>,
    /// `(previous, next)` pairs with unchanged content at a new index.
    pub index_updated: Vec<(usize, usize)>,
    /// `(previous, next)` pairs with unchanged content at the same index.
    pub unchanged: Vec<(usize, usize)>,
}

impl KeyedDiff {
    /// Previous index reused for each next index, `None` for added items.
    pub fn sources(&self, len: usize) -> Vec<Option<usize>> {
        let mut sources = vec![None; len];
        for &(prev, next) in self
            .updated
            .iter()
            .chain(&self.index_updated)
            .chain(&self.unchanged)
        {
            sources[next] = Some(prev);
        }
        sources
    }
}

/// First key that occurs twice, if any.
pub fn find_duplicate(keys: &[Key]) -> Option<&Key> {
    let mut seen = HashSet::with_capacity(keys.len());
    keys.iter().find(|key| !seen.insert(*key))
}

/// Diff `previous` against `next`. Both must be free of duplicates.
pub fn diff_keys(
    previous: &[Key],
    next: &[Key],
    compare: impl Fn(usize, usize) -> Match,
) -> KeyedDiff {
    let previous_index: HashMap<&Key, usize> =
        previous.iter().enumerate().map(|(i, k)| (k, i)).collect();

    let mut diff = KeyedDiff::default();
    let mut kept = vec![false; previous.len()];

    for (j, key) in next.iter().enumerate() {
        let Some(&i) = previous_index.get(key) else {
            diff.added.push(j);
            continue;
        };
        match compare(i, j) {
            Match::Incompatible => {
                diff.added.push(j);
                continue;
            }
            Match::Changed => diff.updated.push((i, j)),
            Match::Same if i != j => diff.index_updated.push((i, j)),
            Match::Same => diff.unchanged.push((i, j)),
        }
        kept[i] = true;
    }

    diff.removed = (0..previous.len()).rev().filter(|&i| !kept[i]).collect();
    diff
}
