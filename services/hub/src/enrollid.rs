//! Enrollid allocation (Open Question C.2): when a user arriving from a
//! third-party sync has no enrollid yet, the hub assigns the smallest
//! positive integer not already in use on that terminal. Paired with the
//! unique `(terminal_id, enrollid)` index in the schema, a race between
//! two allocations for the same terminal fails one side at insert time
//! rather than silently double-assigning.

/// `taken` need not be sorted; duplicates are tolerated.
pub fn smallest_free_enrollid(taken: &[i64]) -> i64 {
    let mut sorted: Vec<i64> = taken.iter().copied().filter(|&id| id > 0).collect();
    sorted.sort_unstable();
    sorted.dedup();
    let mut candidate = 1i64;
    for id in sorted {
        if id == candidate {
            candidate += 1;
        } else if id > candidate {
            break;
        }
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_allocates_one() {
        assert_eq!(smallest_free_enrollid(&[]), 1);
    }

    #[test]
    fn fills_gap_in_sequence() {
        assert_eq!(smallest_free_enrollid(&[1, 2, 4, 5]), 3);
    }

    #[test]
    fn continues_past_dense_prefix() {
        assert_eq!(smallest_free_enrollid(&[1, 2, 3]), 4);
    }

    #[test]
    fn ignores_unordered_input_and_duplicates() {
        assert_eq!(smallest_free_enrollid(&[5, 1, 1, 3, 2]), 4);
    }

    #[test]
    fn ignores_non_positive_ids() {
        assert_eq!(smallest_free_enrollid(&[0, -1, 1]), 2);
    }
}
