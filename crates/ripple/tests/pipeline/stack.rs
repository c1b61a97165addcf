//! Stack manipulation commands.

use super::{assert_error, assert_stack, assert_top};
use ripple::Error;

#[test]
fn dup_swap_drop() {
    assert_stack("1 2 swap", &["2", "1"]);
    assert_stack("5 dup", &["5", "5"]);
    assert_stack("1 2 drop", &["1"]);
    assert_stack("1 2 3 drop2", &["1"]);
    assert_stack("1 2 dup2", &["1", "2", "1", "2"]);
}

#[test]
fn push_then_drop_leaves_stack_identical() {
    assert_stack("1 2 3", &["1", "2", "3"]);
    assert_stack("1 2 3 42 drop", &["1", "2", "3"]);
    assert_stack("1 2 3 { 9 } drop", &["1", "2", "3"]);
}

#[test]
fn dup_swap_drop_identity() {
    for x in ["42", "2.5", "\"s\"", "{ 1 2 }", "'X+1'", "#FF", "(1;2)"] {
        let code = format!("{} dup swap drop", x);
        let direct = super::eval_to_strings(x);
        let teased = super::eval_to_strings(&code);
        assert_eq!(direct, teased, "identity failed for {}", x);
    }
}

#[test]
fn rot_over_roll() {
    assert_stack("1 2 3 rot", &["2", "3", "1"]);
    assert_stack("1 2 over", &["1", "2", "1"]);
    assert_stack("1 2 3 4 4 roll", &["2", "3", "4", "1"]);
    assert_stack("1 2 3 4 4 rolld", &["4", "1", "2", "3"]);
    assert_stack("1 2 3 3 pick", &["1", "2", "3", "1"]);
}

#[test]
fn depth_and_clear() {
    assert_top("depth", "0");
    assert_top("9 9 9 depth", "3");
    assert_stack("1 2 3 clear", &[]);
    assert_stack("1 2 3 2 dropn", &["1"]);
}

#[test]
fn last_arguments_restore() {
    assert_stack("3 4 + lastarg", &["7", "3", "4"]);
    assert_stack("5 neg lastarg", &["-5", "5"]);
}

#[test]
fn underflow_errors() {
    assert_error("drop", Error::MissingArgument);
    assert_error("1 swap", Error::MissingArgument);
    assert_error("1 2 3 roll", Error::MissingArgument);
}
