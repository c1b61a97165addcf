//! End-to-end parse → evaluate → render tests.
//!
//! These drive the full pipeline through the session API. Tests are
//! organized into modules by functionality; fixture programs live in
//! `tests/programs/`.

use ripple::{Error, EvalError, Session};

mod arithmetic;
mod binary_int;
mod directory;
mod errors;
mod fixtures;
mod flow;
mod heap;
mod literals;
mod stack;
mod symbolic;

// ============================================================================
// Test Helpers
// ============================================================================

/// Evaluate code in a fresh session, returning the rendered stack.
pub fn eval_to_strings(code: &str) -> Vec<String> {
    let mut session = Session::new();
    session
        .eval(code)
        .unwrap_or_else(|e| panic!("eval failed for '{}': {}", code, e))
}

/// Check the whole stack, bottom to top.
pub fn assert_stack(code: &str, expected: &[&str]) {
    let actual = eval_to_strings(code);
    assert_eq!(
        actual, expected,
        "stack mismatch for '{}': expected {:?}, got {:?}",
        code, expected, actual
    );
}

/// Check only the top of the stack.
pub fn assert_top(code: &str, expected: &str) {
    let actual = eval_to_strings(code);
    let top = actual.last().unwrap_or_else(|| {
        panic!("empty stack for '{}', expected top '{}'", code, expected)
    });
    assert_eq!(
        top, expected,
        "top mismatch for '{}': expected '{}', got '{}'",
        code, expected, top
    );
}

/// Check that code fails with a specific error kind.
pub fn assert_error(code: &str, expected: Error) {
    let mut session = Session::new();
    match session.eval(code) {
        Ok(stack) => panic!(
            "expected {:?} for '{}', but evaluation succeeded with {:?}",
            expected, code, stack
        ),
        Err(e) => assert_eq!(
            e.kind(),
            expected,
            "wrong error for '{}': {:?}",
            code,
            e
        ),
    }
}

/// Check that code fails at parse time.
pub fn assert_parse_error(code: &str, expected: Error) {
    let mut session = Session::new();
    match session.eval(code) {
        Err(EvalError::Parse(state)) => assert_eq!(state.kind, expected),
        other => panic!("expected parse error for '{}', got {:?}", code, other),
    }
}

/// A small deterministic generator for the randomized property tests.
pub struct XorShift(pub u64);

impl XorShift {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// A value in `0..bound`.
    pub fn below(&mut self, bound: u64) -> u64 {
        self.next() % bound
    }
}
