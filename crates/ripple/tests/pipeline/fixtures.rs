//! Whole-program fixture files.

use super::{assert_top, eval_to_strings};

#[test]
fn fixture_factorial() {
    let code = include_str!("../programs/factorial.rpl");
    assert_top(code, "120");
}

#[test]
fn fixture_gcd() {
    let code = include_str!("../programs/gcd.rpl");
    assert_top(code, "6");
}

#[test]
fn fixture_sum_list() {
    let code = include_str!("../programs/sum_list.rpl");
    assert_top(code, "15");
}

#[test]
fn fixture_nqueens() {
    // The classic eight-queens backtracker finds the lexicographically
    // first solution.
    let code = include_str!("../programs/nqueens.rpl");
    assert_top(code, "{ 1 5 8 6 3 7 2 4 }");
}

#[test]
fn fixtures_leave_clean_runtimes() {
    for code in [
        include_str!("../programs/factorial.rpl"),
        include_str!("../programs/gcd.rpl"),
        include_str!("../programs/sum_list.rpl"),
    ] {
        let stack = eval_to_strings(code);
        assert_eq!(stack.len(), 1, "one result for {:?}…", &code[..24]);
    }
}
