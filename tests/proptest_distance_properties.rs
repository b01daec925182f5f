//! Property-based tests for the weighted Damerau-Levenshtein distance.
//!
//! Small alphabets keep repeated symbols, and therefore transpositions, common.

use dl_distance_calculator::{bounded_distance, distance, EditWeights, CEILING_EXCEEDED};
use proptest::prelude::*;

fn arb_seq() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(0u32..4, 0..12)
}

fn arb_nonempty_seq() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(0u32..4, 1..12)
}

fn arb_weights() -> impl Strategy<Value = EditWeights> {
    (0.0f64..5.0, 0.0f64..5.0, 0.0f64..5.0, 0.0f64..5.0)
        .prop_map(|(d, i, s, t)| EditWeights::new(d, i, s, t).unwrap())
}

/// Unit indels with a transposition at least as dear as one of them.
fn arb_symmetric_weights() -> impl Strategy<Value = EditWeights> {
    (0.5f64..3.0, 1.0f64..3.0).prop_map(|(s, t)| EditWeights::new(1.0, 1.0, s, t).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn empty_source_gives_target_length(t in arb_seq(), w in arb_weights()) {
        prop_assert_eq!(distance(&[], &t, &w, 0.0), t.len() as f64);
    }

    #[test]
    fn empty_target_gives_source_length(s in arb_seq(), w in arb_weights()) {
        prop_assert_eq!(distance(&s, &[], &w, 0.0), s.len() as f64);
    }

    #[test]
    fn identity_is_zero(s in arb_nonempty_seq(), w in arb_weights()) {
        prop_assert_eq!(distance(&s, &s, &w, 0.0), 0.0);
    }

    #[test]
    fn distance_is_non_negative(s in arb_seq(), t in arb_seq(), w in arb_weights()) {
        prop_assert!(distance(&s, &t, &w, 0.0) >= 0.0);
    }

    #[test]
    fn symmetric_when_indels_match(s in arb_seq(), t in arb_seq(), w in arb_symmetric_weights()) {
        let d_st = distance(&s, &t, &w, 0.0);
        let d_ts = distance(&t, &s, &w, 0.0);
        prop_assert!((d_st - d_ts).abs() < 1e-9, "d(s,t) = {} but d(t,s) = {}", d_st, d_ts);
    }

    #[test]
    fn swapped_pair_is_one_transposition(a in 0u32..1000, b in 0u32..1000) {
        prop_assume!(a != b);
        prop_assert_eq!(distance(&[a, b], &[b, a], &EditWeights::default(), 0.0), 1.0);
    }

    #[test]
    fn unit_distance_bounded_by_longer_length(s in arb_seq(), t in arb_seq()) {
        let d = distance(&s, &t, &EditWeights::default(), 0.0);
        prop_assert!(d <= s.len().max(t.len()) as f64);
    }

    #[test]
    fn ceiling_is_exact_cutoff(s in arb_seq(), t in arb_seq(), w in arb_weights(), c in 0.01f64..15.0) {
        let d = distance(&s, &t, &w, 0.0);
        let capped = distance(&s, &t, &w, c);
        if d <= c {
            prop_assert_eq!(capped, d);
        } else {
            prop_assert_eq!(capped, CEILING_EXCEEDED);
        }
    }

    #[test]
    fn ceiling_at_distance_keeps_value(s in arb_seq(), t in arb_seq(), w in arb_weights()) {
        let d = distance(&s, &t, &w, 0.0);
        prop_assume!(d > 0.0);
        prop_assert_eq!(bounded_distance(&s, &t, &w, d), Some(d));
    }
}
