//! Delta debugging for failing flow sequences.
//!
//! Partition the sequence into chunks, try dropping each chunk, keep any
//! removal that still reproduces the failure, then halve the chunk size.
//! Stops at chunk size 1 with nothing removable, or when the evaluation
//! budget is spent.

use serde::Serialize;

#[derive(Debug, Clone)]
pub struct ShrinkConfig {
    /// Maximum number of reproduction attempts. 0 = unlimited.
    pub max_evaluations: usize,
}

impl Default for ShrinkConfig {
    fn default() -> Self {
        Self {
            max_evaluations: 256,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShrinkStats {
    pub evaluations: usize,
    pub removed: usize,
    pub budget_exhausted: bool,
}

#[derive(Debug, Clone)]
pub struct Shrunk<T> {
    pub items: Vec<T>,
    pub stats: ShrinkStats,
}

/// Minimize `items` while `reproduces` keeps returning `true`.
///
/// The caller guarantees `reproduces(items)` holds for the full input; it is
/// not re-checked. An empty candidate is never proposed.
pub fn minimize<T, E, F>(items: &[T], config: &ShrinkConfig, mut reproduces: F) -> Result<Shrunk<T>, E>
where
    T: Clone,
    F: FnMut(&[T]) -> Result<bool, E>,
{
    let mut current: Vec<T> = items.to_vec();
    let mut stats = ShrinkStats::default();
    let budget_left = |stats: &ShrinkStats| {
        config.max_evaluations == 0 || stats.evaluations < config.max_evaluations
    };

    let mut chunk_size = (current.len() / 2).max(1);
    while current.len() > 1 {
        if !budget_left(&stats) {
            stats.budget_exhausted = true;
            break;
        }

        let mut changed = false;
        let mut start = 0;
        while start < current.len() {
            if !budget_left(&stats) {
                stats.budget_exhausted = true;
                break;
            }
            let end = (start + chunk_size).min(current.len());
            if end - start == current.len() {
                break;
            }

            let candidate: Vec<T> = current[..start]
                .iter()
                .chain(&current[end..])
                .cloned()
                .collect();
            stats.evaluations += 1;
            if reproduces(&candidate)? {
                stats.removed += end - start;
                current = candidate;
                changed = true;
                // Same granularity, same offset: the next chunk slid into place.
            } else {
                start = end;
            }
        }

        if stats.budget_exhausted {
            break;
        }
        if !changed {
            if chunk_size == 1 {
                break;
            }
            chunk_size /= 2;
        } else {
            chunk_size = chunk_size.min((current.len() / 2).max(1));
        }
    }

    tracing::debug!(
        original = items.len(),
        minimized = current.len(),
        evaluations = stats.evaluations,
        "shrink finished"
    );
    Ok(Shrunk {
        items: current,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn contains_all(needles: &'static [u32]) -> impl FnMut(&[u32]) -> Result<bool, Infallible> {
        move |candidate: &[u32]| Ok(needles.iter().all(|n| candidate.contains(n)))
    }

    #[test]
    fn test_reduces_to_single_culprit() {
        let items: Vec<u32> = (0..40).collect();
        let shrunk = minimize(&items, &ShrinkConfig::default(), contains_all(&[17])).unwrap();
        assert_eq!(shrunk.items, vec![17]);
        assert_eq!(shrunk.stats.removed, 39);
        assert!(!shrunk.stats.budget_exhausted);
    }

    #[test]
    fn test_keeps_every_required_item_in_order() {
        let items: Vec<u32> = (0..25).collect();
        let shrunk = minimize(&items, &ShrinkConfig::default(), contains_all(&[3, 11, 24])).unwrap();
        assert_eq!(shrunk.items, vec![3, 11, 24]);
    }

    #[test]
    fn test_order_dependent_failure() {
        // Fails only when 5 comes before 9 somewhere in the sequence.
        let items = vec![9, 1, 5, 2, 9, 3];
        let shrunk = minimize(&items, &ShrinkConfig::default(), |c: &[u32]| {
            let first_five = c.iter().position(|&x| x == 5);
            let last_nine = c.iter().rposition(|&x| x == 9);
            Ok::<_, Infallible>(matches!((first_five, last_nine), (Some(f), Some(n)) if f < n))
        })
        .unwrap();
        assert_eq!(shrunk.items, vec![5, 9]);
    }

    #[test]
    fn test_budget_is_respected() {
        let items: Vec<u32> = (0..64).collect();
        let config = ShrinkConfig { max_evaluations: 3 };
        let shrunk = minimize(&items, &config, contains_all(&[63])).unwrap();
        assert_eq!(shrunk.stats.evaluations, 3);
        assert!(shrunk.stats.budget_exhausted);
        assert!(shrunk.items.contains(&63));
    }

    #[test]
    fn test_errors_propagate() {
        let items = vec![1, 2, 3];
        let result = minimize(&items, &ShrinkConfig::default(), |_: &[u32]| Err::<bool, _>("boom"));
        assert_eq!(result.err(), Some("boom"));
    }

    #[test]
    fn test_single_item_is_left_alone() {
        let mut calls = 0;
        let shrunk = minimize(&[7u32], &ShrinkConfig::default(), |_: &[u32]| {
            calls += 1;
            Ok::<_, Infallible>(true)
        })
        .unwrap();
        assert_eq!(shrunk.items, vec![7]);
        assert_eq!(calls, 0);
    }
}
