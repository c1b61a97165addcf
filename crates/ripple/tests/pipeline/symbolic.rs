//! Symbolic expressions: building, rewriting, simplification.

use super::{assert_top, eval_to_strings};

#[test]
fn arithmetic_on_symbols_builds_expressions() {
    assert_top("'X' 1 +", "'X+1'");
    assert_top("1 'X' +", "'1+X'");
    assert_top("'X' 'Y' ·", "'X·Y'");
    assert_top("'X' 2 ^", "'X^2'");
    assert_top("'X' sin", "'sin(X)'");
    assert_top("'X' neg", "'-X'");
}

#[test]
fn auto_simplify_applies_identities() {
    assert_top("'X' 0 +", "'X'");
    assert_top("'X' 1 ·", "'X'");
    assert_top("'X' 0 ·", "0");
    assert_top("'X' 1 ^", "'X'");
    assert_top("'X' 'X' -", "0");
}

#[test]
fn seed_expand() {
    assert_top("'(X+1)^2' expand", "'X^2+2·X+1'");
}

#[test]
fn expand_other_shapes() {
    assert_top("'(A+B)·C' expand", "'A·C+B·C'");
    assert_top("'(X+1)·(X-1)' expand", "'X^2-1'");
    assert_top("'(X+2)^2' expand", "'X^2+4·X+4'");
}

#[test]
fn collect_combines_like_terms() {
    assert_top("'X+X' collect", "'2·X'");
    assert_top("'X+X+X' collect", "'3·X'");
    assert_top("'2·X+3·X' collect", "'5·X'");
    assert_top("'X·X' collect", "'X^2'");
    assert_top("'X+1+X+2' collect", "'2·X+3'");
}

#[test]
fn simplify_folds_constants() {
    assert_top("'2+3' simplify", "5");
    assert_top("'2·X+3·0' simplify", "'2·X'");
    assert_top("'1/2+1/2' simplify", "1");
}

#[test]
fn rewrite_rules_bind_subexpressions() {
    assert_top("'sin(X+1)' 'sin(a)' 'cos(a)' rewrite", "'cos(X+1)'");
    assert_top("'A+B' 'a+b' 'b+a' rewrite", "'B+A'");
    // No match leaves the expression alone.
    assert_top("'A·B' 'a+b' 'b+a' rewrite", "'A·B'");
}

#[test]
fn rewrite_binds_consistently() {
    // Pattern 'a+a' requires both operands equal.
    assert_top("'Q+Q' 'a+a' '2·a' rewrite", "'2·Q'");
    assert_top("'Q+R' 'a+a' '2·a' rewrite", "'Q+R'");
}

#[test]
fn maxrewrites_caps_each_top_level_call() {
    let mut session = ripple::Session::new();
    session.runtime_mut().settings.maxrewrites = 2;
    // Fully distributing (A+B)·(C+D) takes three rule applications.
    let err = session.eval("'(A+B)·(C+D)' expand").unwrap_err();
    assert_eq!(err.kind(), ripple::Error::TooManyRewrites);

    // The counter resets per call: a small job still fits afterwards.
    session.eval("clear").unwrap();
    assert_eq!(
        session.eval("'(A+B)·C' expand").unwrap().last().unwrap(),
        "'A·C+B·C'"
    );
}

#[test]
fn quoted_names_stay_symbolic() {
    assert_top("'X'", "'X'");
    assert_top("5 'X' sto 'X'", "'X'");
    assert_top("5 'X' sto 'X' eval", "5");
    assert_top("5 'X' sto 'X+1' eval", "6");
}

#[test]
fn seed_to_num() {
    assert_top("'sin(π/2)' →Num", "1.");
}

#[test]
fn to_num_substitutes_variables() {
    assert_top("3 'X' sto 'X^2+1' →Num", "10.");
}

#[test]
fn to_frac_conversions() {
    assert_top("0.25 →Q", "1/4");
    assert_top("0.333333333333 →Q", "1/3");
    assert_top("2 →Q", "2");
}

#[test]
fn deep_symbolic_chains() {
    let stack = eval_to_strings("'X' 1 + 2 · 'Y' -");
    assert_eq!(stack.last().unwrap(), "'(X+1)·2-Y'");
}
