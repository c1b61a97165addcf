//! Literal objects evaluate to themselves and round-trip through text.

use super::{assert_stack, assert_top, eval_to_strings};

#[test]
fn numbers() {
    assert_top("42", "42");
    assert_top("-17", "-17");
    assert_top("3/4", "3/4");
    assert_top("-1/2", "-1/2");
    assert_top("2.5", "2.5");
    assert_top("1E3", "1000.");
    assert_top("#FF", "#FFh");
}

#[test]
fn big_numbers() {
    assert_top("18446744073709551616", "18446744073709551616");
    assert_top(
        "340282366920938463463374607431768211456",
        "340282366920938463463374607431768211456",
    );
}

#[test]
fn texts_and_symbols() {
    assert_top("\"hello world\"", "\"hello world\"");
    assert_top("'X'", "'X'");
    assert_top("radius", "radius");
}

#[test]
fn composites() {
    assert_top("{ 1 2 3 }", "{ 1 2 3 }");
    assert_top("[ 1 2 ]", "[ 1 2 ]");
    assert_top("« 1 2 + »", "« 1 2 + »");
    assert_top("{ 1 { 2 { 3 } } \"x\" }", "{ 1 { 2 { 3 } } \"x\" }");
    assert_top(":price: 10", ":price: 10");
    assert_top("(3;4)", "(3;4)");
}

#[test]
fn expressions() {
    assert_top("'X+1'", "'X+1'");
    assert_top("'(X+1)^2'", "'(X+1)^2'");
    assert_top("'sin(X)+cos(Y)'", "'sin(X)+cos(Y)'");
}

#[test]
fn ascii_aliases_normalize() {
    assert_top("<< 1 2 * >>", "« 1 2 · »");
    assert_top("'X<=2'", "'X≤2'");
}

#[test]
fn multiple_objects_fill_the_stack() {
    assert_stack("1 2.5 \"s\" { }", &["1", "2.5", "\"s\"", "{}"]);
}

#[test]
fn comments_are_dropped() {
    assert_stack("1 @ a comment\n2", &["1", "2"]);
}

#[test]
fn unicode_spellings() {
    assert_top("2 3 ×", "6");
    assert_top("6 3 ÷", "2");
    assert_top("2 √", "1.4142135623730951");
    assert_top("π", "3.141592653589793");
}

#[test]
fn long_form_spellings_parse() {
    assert_top("5 Duplicate Drop", "5");
    assert_top("42 Square", "1764");
}

#[test]
fn grob_roundtrips() {
    assert_top("grob 8 2 AA55", "grob 8 2 AA55");
}

#[test]
fn empty_source_is_fine() {
    assert_eq!(eval_to_strings(""), Vec::<String>::new());
    assert_eq!(eval_to_strings("   \n  "), Vec::<String>::new());
}
