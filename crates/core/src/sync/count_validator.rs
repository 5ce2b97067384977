//! Count validation: the single authority on whether a sync is trustworthy.

use super::{CountSet, SyncCounts};

/// Structural equality across the added/modified/removed pairs.
///
/// Both the orchestrator (to close a session as `complete` vs `error`) and
/// the recovery trigger (to decide whether compensation is needed at all)
/// defer to this predicate; nothing else may decide sync success.
pub fn counts_match(counts: &SyncCounts) -> bool {
    count_set_matches(&counts.expected, &counts.actual)
}

fn count_set_matches(expected: &CountSet, actual: &CountSet) -> bool {
    expected.added == actual.added
        && expected.modified == actual.modified
        && expected.removed == actual.removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_counts_match() {
        let counts = SyncCounts {
            expected: CountSet::new(3, 0, 0),
            actual: CountSet::new(3, 0, 0),
        };
        assert!(counts_match(&counts));
    }

    #[test]
    fn any_divergent_pair_fails() {
        for (expected, actual) in [
            (CountSet::new(5, 0, 0), CountSet::new(4, 0, 0)),
            (CountSet::new(0, 2, 0), CountSet::new(0, 1, 0)),
            (CountSet::new(0, 0, 1), CountSet::new(0, 0, 0)),
        ] {
            assert!(!counts_match(&SyncCounts { expected, actual }));
        }
    }

    #[test]
    fn unasserted_fields_match_only_unasserted() {
        // Recovery sessions assert only `removed`.
        let recovery = SyncCounts {
            expected: CountSet {
                removed: Some(4),
                ..CountSet::default()
            },
            actual: CountSet {
                removed: Some(4),
                ..CountSet::default()
            },
        };
        assert!(counts_match(&recovery));

        // An expected count with no recorded actual is a mismatch — this is
        // what flags a crash between apply and close.
        let crashed = SyncCounts {
            expected: CountSet::new(5, 0, 0),
            actual: CountSet::default(),
        };
        assert!(!counts_match(&crashed));
    }

    #[test]
    fn default_counts_match() {
        // A legacy-migration session carries no asserted counts on either
        // side and must read as trustworthy.
        assert!(counts_match(&SyncCounts::default()));
    }
}
