//! Control structures, locals and program execution.

use super::{assert_error, assert_stack, assert_top};
use ripple::{Error, Session, TestHost};

#[test]
fn conditionals() {
    assert_top("if 1 then 42 end", "42");
    assert_stack("if 0 then 42 end", &[]);
    assert_top("if 0 then 1 else 2 end", "2");
    assert_top("if 3 4 < then 10 else 20 end", "10");
    assert_top("if 1 then if 0 then 1 else 2 end end", "2");
}

#[test]
fn counted_loops() {
    assert_top("0 1 100 for i i + next", "5050");
    assert_top("0 1 100 start 1 + next", "100");
    assert_top("0 1 100 for i i + 2 step", "2500");
    assert_top("0 10 1 for i i + -1 step", "55");
    assert_top("1 1 10 start 2 * next", "1024");
}

#[test]
fn conditional_loops() {
    assert_top("1 do 2 * until dup 100 > end", "128");
    assert_top("1 while dup 100 < repeat 2 * end", "128");
    assert_stack("while 0 repeat 1 end", &[]);
}

#[test]
fn loop_counter_is_local() {
    assert_top("0 1 5 for i i i * + next", "55");
    // Nested loops shadow correctly.
    assert_top("0 1 3 for i 1 3 for j i j * + next next", "36");
}

#[test]
fn locals_blocks() {
    assert_top("2 3 → a b « a b + »", "5");
    assert_top("2 3 → a b « b a - »", "1");
    assert_top("10 → n « n n * »", "100");
    // Locals from an outer frame remain visible inside.
    assert_top("1 2 → a b « 3 → c « a b c + + » »", "6");
}

#[test]
fn locals_underflow() {
    assert_error("1 → a b « a b + »", Error::MissingArgument);
}

#[test]
fn programs_as_values() {
    assert_top("« 2 * » 'dbl' sto 21 dbl", "42");
    assert_top("« 2 * » 21 swap eval", "42");
    // Quoted program stays put until eval.
    assert_top("« 1 2 + »", "« 1 2 + »");
}

#[test]
fn named_program_recursion() {
    let code = "
        « → n «
            if n 1 <= then
                1
            else
                n 1 - fib n 2 - fib +
            end
        » » 'fib' sto
        10 fib
    ";
    assert_top(code, "89");
}

#[test]
fn recursion_limit() {
    let mut session = Session::new();
    session.runtime_mut().set_max_recursion(32);
    let err = session.eval("« self » 'self' sto self").unwrap_err();
    assert_eq!(err.kind(), Error::Recursion);
}

#[test]
fn recursion_limit_is_configurable() {
    // The guard fires at the configured depth, deterministically.
    for limit in [16, 64] {
        let mut session = Session::new();
        session.runtime_mut().set_max_recursion(limit);
        let err = session.eval("« self » 'self' sto self").unwrap_err();
        assert_eq!(err.kind(), Error::Recursion);
        assert_eq!(session.runtime().recursion_depth(), 0);
    }
}

#[test]
fn interrupt_aborts_loops() {
    let host = TestHost::new();
    host.interrupt_after.set(10);
    let mut session = Session::with_host(Box::new(host));
    let err = session.eval("0 1 1000000 for i i + next").unwrap_err();
    assert_eq!(err.kind(), Error::Interrupted);
}

#[test]
fn seed_long_numeric_loop() {
    // 0 1 N for x x tan⁻¹ sin exp ∛ + next stays finite in radians.
    let mut session = Session::new();
    let stack = session
        .eval("0 1 100000 for x x tan⁻¹ sin exp ∛ + next")
        .unwrap();
    assert_eq!(stack.len(), 1);
    let value: f64 = stack[0].trim_end_matches('.').parse().unwrap();
    assert!(value.is_finite());
    assert!(value > 100000.0);
}

#[test]
fn error_inside_loop_propagates() {
    assert_error("1 5 for i i 0 / next", Error::ZeroDivide);
}
