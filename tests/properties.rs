//! Property tests for the universal token contract of spec.md §8: every
//! index in `0..permutations()` is a legal `set_permutation` call, the index
//! exactly at `permutations()` is not, and `reset()` followed by
//! `set_permutation(0)` restores the token's construction-time rendering.

use proptest::prelude::*;
use tavor::token::Token;

proptest! {
    #[test]
    fn range_int_every_index_in_bounds_succeeds_and_one_past_the_end_fails(
        lo in -1000i64..1000,
        width in 0u64..50,
    ) {
        let hi = lo + width as i64;
        let tok = Token::range_int(lo, hi);
        let mut t = tok.lock().unwrap();
        prop_assert_eq!(t.permutations(), width + 1);
        for i in 0..=width {
            prop_assert!(t.set_permutation(i).is_ok());
            prop_assert_eq!(t.string(), (lo + i as i64).to_string());
        }
        prop_assert!(t.set_permutation(width + 1).is_err());
    }

    #[test]
    fn repeat_of_a_single_permutation_template_renders_count_copies(
        from in 0usize..5,
        extra in 0usize..5,
        idx_offset in 0u64..20,
    ) {
        let to = from + extra;
        let tok = Token::repeat(Token::const_str("a"), from, to);
        let span = (to - from + 1) as u64;
        let i = idx_offset % span;
        let mut t = tok.lock().unwrap();
        prop_assert!(t.set_permutation(i).is_ok());
        prop_assert_eq!(t.string(), "a".repeat(from + i as usize));
        prop_assert!(t.set_permutation(span).is_err());
    }

    #[test]
    fn optional_reset_then_zero_matches_fresh_construction(child in "[a-z]{0,8}") {
        let tok = Token::optional(Token::const_str(child));
        let fresh = tok.lock().unwrap().string();

        tok.lock().unwrap().set_permutation(1).unwrap();
        {
            let mut t = tok.lock().unwrap();
            t.reset();
            t.set_permutation(0).unwrap();
        }
        prop_assert_eq!(tok.lock().unwrap().string(), fresh);
    }

    #[test]
    fn one_alternation_reset_then_zero_matches_fresh_construction(
        branches in proptest::collection::vec("[a-z]{0,6}", 1..5),
    ) {
        let children: Vec<_> = branches.iter().map(|s| Token::const_str(s.clone())).collect();
        let tok = Token::one(children);
        let fresh = tok.lock().unwrap().string();
        let n = tok.lock().unwrap().permutations();

        tok.lock().unwrap().set_permutation(n - 1).unwrap();
        {
            let mut t = tok.lock().unwrap();
            t.reset();
            t.set_permutation(0).unwrap();
        }
        prop_assert_eq!(tok.lock().unwrap().string(), fresh);
    }
}
