// ============================================================
// Layer 4 — Train/Test Dataset Splitter
// ============================================================
// When no explicit train/test dataset lists are given, the
// prepared sample files are shuffled and split by dataset, so
// no window from a test recording is ever seen in training.
//
// A fixed seed keeps the split identical between `train` and
// a later `predict` on the same directory.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `items` with `seed` and split into (train, test).
///
/// With at least two items both sides are non-empty, whatever
/// `train_fraction` says.
pub fn split_train_test<T>(mut items: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    items.shuffle(&mut rng);

    let total    = items.len();
    let mut at   = ((total as f64) * train_fraction.clamp(0.0, 1.0)).round() as usize;
    if total >= 2 {
        at = at.clamp(1, total - 1);
    }
    let at   = at.min(total);
    let test = items.split_off(at);

    tracing::debug!("Dataset split: {} train, {} test", items.len(), test.len());
    (items, test)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sizes() {
        let (train, test) = split_train_test((0..10).collect::<Vec<_>>(), 0.8, 1);
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);
    }

    #[test]
    fn test_same_seed_same_split() {
        let a = split_train_test((0..20).collect::<Vec<_>>(), 0.5, 42);
        let b = split_train_test((0..20).collect::<Vec<_>>(), 0.5, 42);
        assert_eq!(a, b);
    }

    #[test]
    fn test_both_sides_non_empty() {
        let (train, test) = split_train_test(vec!["a", "b"], 1.0, 0);
        assert_eq!((train.len(), test.len()), (1, 1));
        let (train, test) = split_train_test(vec!["a", "b", "c"], 0.0, 0);
        assert_eq!((train.len(), test.len()), (1, 2));
    }

    #[test]
    fn test_single_item_goes_to_training() {
        let (train, test) = split_train_test(vec![1], 0.8, 0);
        assert_eq!(train, vec![1]);
        assert!(test.is_empty());
    }
}
