//! Content grouping and canonical source selection.
//!
//! # Overview
//!
//! After a bucket has been re-validated its survivors are split twice:
//!
//! 1. [`group_by_key`]: by content digest (files) so only identical content
//!    is ever linked together. Groups keep the bucket's tie-break order.
//! 2. [`split_by`]: optionally by file name. The group is stable-sorted by
//!    name and a new subgroup starts whenever the name changes, so the
//!    first entry of each subgroup (the best by tie-break order among
//!    entries with that name) becomes the canonical source.
//!
//! # Example
//!
//! ```
//! use rustdedup::dedup::{group_by_key, split_by};
//!
//! let groups = group_by_key(vec![(1, "a/x"), (2, "b/y"), (1, "c/x")]);
//! assert_eq!(groups, vec![vec!["a/x", "c/x"], vec!["b/y"]]);
//!
//! let named = split_by(vec!["b/y", "a/x", "c/x"], |p| p.rsplit('/').next().map(str::to_owned));
//! assert_eq!(named, vec![vec!["a/x", "c/x"], vec!["b/y"]]);
//! ```

use std::collections::HashMap;
use std::hash::Hash;

/// Group items by key, keeping first-seen order of keys and of items.
#[must_use]
pub fn group_by_key<K, T>(items: impl IntoIterator<Item = (K, T)>) -> Vec<Vec<T>>
where
    K: Eq + Hash,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<Vec<T>> = Vec::new();

    for (key, item) in items {
        match index.get(&key) {
            Some(&i) => groups[i].push(item),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![item]);
            }
        }
    }

    groups
}

/// Stable-sort `items` by `key` and split into runs of equal keys.
///
/// Items with equal keys keep their relative order, so the first item of
/// each run is the earliest one in the input.
#[must_use]
pub fn split_by<T, K, F>(mut items: Vec<T>, key: F) -> Vec<Vec<T>>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    items.sort_by_cached_key(|item| key(item));

    let mut runs: Vec<(K, Vec<T>)> = Vec::new();
    for item in items {
        let k = key(&item);
        match runs.last_mut() {
            Some((current, run)) if *current == k => run.push(item),
            _ => runs.push((k, vec![item])),
        }
    }

    runs.into_iter().map(|(_, run)| run).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_by_key_keeps_order() {
        let groups = group_by_key(vec![("h2", 1), ("h1", 2), ("h2", 3), ("h1", 4), ("h3", 5)]);
        assert_eq!(groups, vec![vec![1, 3], vec![2, 4], vec![5]]);
    }

    #[test]
    fn test_group_by_key_empty() {
        let groups: Vec<Vec<u8>> = group_by_key(Vec::<(u8, u8)>::new());
        assert!(groups.is_empty());
    }

    #[test]
    fn test_split_by_is_stable() {
        // Already in tie-break order; names interleave.
        let items = vec![("2", 0), ("1", 1), ("2", 2), ("1", 3)];
        let runs = split_by(items, |(name, _)| *name);
        assert_eq!(runs, vec![vec![("1", 1), ("1", 3)], vec![("2", 0), ("2", 2)]]);
    }

    #[test]
    fn test_split_by_single_key_is_one_run() {
        let runs = split_by(vec![3, 1, 2], |_| ());
        assert_eq!(runs, vec![vec![3, 1, 2]]);
    }
}
