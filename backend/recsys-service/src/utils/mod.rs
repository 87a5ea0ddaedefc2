// Utility functions for recsys-service

use std::collections::HashSet;
use std::hash::Hash;

/// Drop repeated items, keeping the first occurrence of each in place
pub fn unique_keep_order<T, I>(items: I) -> Vec<T>
where
    T: Copy + Eq + Hash,
    I: IntoIterator<Item = T>,
{
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(*item)).collect()
}
