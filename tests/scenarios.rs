//! The literal grammar-to-output scenarios of spec.md §8: each row parses a
//! grammar, drains `AlmostAllPermutations` (or `PermuteOptionals` for the
//! last one) to completion, and compares the full emitted sequence against
//! the table.

use tavor::parser::{parse_tavor, ParseOptions};
use tavor::strategy;

fn drain(src: &str) -> Vec<String> {
    let root = parse_tavor(src, &ParseOptions::default()).unwrap();
    let mut handle = strategy::new("AlmostAllPermutations", root).unwrap();
    let mut out = Vec::new();
    while let Some(s) = handle.next() {
        out.push(s);
        handle.resume();
    }
    out
}

#[test]
fn scenario_1_plain_literal() {
    assert_eq!(drain("START = \"a\"\n"), vec!["a"]);
}

#[test]
fn scenario_2_optional() {
    assert_eq!(drain("START = ?(\"1\")\n"), vec!["", "1"]);
}

#[test]
fn scenario_3_alternation() {
    assert_eq!(
        drain("START = \"1\" | \"2\" | \"3\"\n"),
        vec!["1", "2", "3"]
    );
}

#[test]
fn scenario_4_three_independent_optionals() {
    let src = "A=?(\"1\")\nB=?(\"2\")\nC=?(\"3\")\nSTART=A B C\n";
    assert_eq!(
        drain(src),
        vec!["", "1", "2", "12", "3", "13", "23", "123"]
    );
}

#[test]
fn scenario_5_bounded_repeat_of_a_sequence_counter() {
    let src = "$Id Sequence = start:0, step:2\nSTART = +1,5($Id.Next \" \")\n";
    assert_eq!(
        drain(src),
        vec!["0 ", "0 2 ", "0 2 4 ", "0 2 4 6 ", "0 2 4 6 8 "]
    );
}

#[test]
fn scenario_6_unique_cycles_through_a_lists_children() {
    let src = "Items = \"a\" \"b\" \"c\"\nSTART = Items \" -> \" $Items.Unique\n";
    assert_eq!(
        drain(src),
        vec!["abc -> a", "abc -> b", "abc -> c"]
    );
}

#[test]
fn permute_optionals_scenario_emits_every_joint_activation() {
    let root = parse_tavor("START = ?(\"a\") ?(\"b\")\n", &ParseOptions::default()).unwrap();
    let mut handle = strategy::new("PermuteOptionals", root).unwrap();
    let mut out = Vec::new();
    while let Some(s) = handle.next() {
        out.push(s);
        handle.resume();
    }
    out.sort();
    assert_eq!(out, vec!["", "a", "ab", "b"]);
}
