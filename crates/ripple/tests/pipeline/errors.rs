//! The error slot, recovery, and iferr handling.

use super::{assert_error, assert_parse_error, assert_top};
use ripple::{Error, Session};

#[test]
fn arithmetic_errors() {
    assert_error("1 0 /", Error::ZeroDivide);
    assert_error("1 0 mod", Error::ZeroDivide);
    assert_error("0 inv", Error::ZeroDivide);
    assert_error("2 \"x\" +", Error::Type);
    assert_error("-1 √", Error::Domain);
    assert_error("-3 !", Error::Value);
}

#[test]
fn arity_errors() {
    assert_error("+", Error::MissingArgument);
    assert_error("1 +", Error::MissingArgument);
    assert_error("sto", Error::MissingArgument);
}

#[test]
fn parse_errors() {
    assert_parse_error("\"open", Error::Unterminated);
    assert_parse_error("« 1 2", Error::Unterminated);
    assert_parse_error("1E", Error::Exponent);
    assert_parse_error("1E2000", Error::ExponentRange);
    assert_parse_error("#GG", Error::BasedDigit);
    assert_parse_error(")", Error::Syntax);
}

#[test]
fn error_positions_point_at_the_source() {
    let mut session = Session::new();
    let err = session.eval("1 2 + \"oops").unwrap_err();
    match err {
        ripple::EvalError::Parse(state) => {
            assert_eq!(state.kind, Error::Unterminated);
            assert_eq!(state.pos.unwrap().offset(), 6);
        }
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[test]
fn error_slot_survives_until_cleared() {
    let mut session = Session::new();
    session.eval("1 0 /").unwrap_err();
    assert_eq!(
        session.runtime().last_error().unwrap().kind,
        Error::ZeroDivide
    );
    // errn and errm read the sticky slot.
    let n = Error::ZeroDivide.number().to_string();
    assert_eq!(session.eval("errn").unwrap().last().unwrap(), &n);
    assert_eq!(
        session.eval("errm").unwrap().last().unwrap(),
        "\"Divide by zero\""
    );
    session.eval("clerr").unwrap();
    assert_eq!(session.eval("errn").unwrap().last().unwrap(), "0");
}

#[test]
fn iferr_catches() {
    assert_top("iferr 1 0 / then 99 end", "99");
    assert_top("iferr 7 then 99 end", "7");
    assert_top("iferr 1 0 / then errn end", &Error::ZeroDivide.number().to_string());
    assert_top("iferr 5 then 1 else 2 end", "2");
}

#[test]
fn iferr_continues_after_recovery() {
    assert_top("iferr 1 0 / then 0 end 5 +", "5");
}

#[test]
fn doerr_raises_by_number() {
    let n = Error::ZeroDivide.number();
    assert_error(&format!("{} doerr", n), Error::ZeroDivide);
    assert_error("9999 doerr", Error::Value);
}

#[test]
fn failed_eval_unwinds_frames() {
    let mut session = Session::new();
    session.eval("1 2 → a b « a 0 / »").unwrap_err();
    assert_eq!(session.runtime().heap.frame_depth(), 0);
    assert_eq!(session.runtime().recursion_depth(), 0);
    // The session keeps working afterwards.
    assert_eq!(session.eval("3 4 +").unwrap().last().unwrap(), "7");
}

#[test]
fn out_of_memory_unwinds_cleanly() {
    let mut session = Session::new();
    // Doubling a text a few dozen times exhausts any heap.
    let err = session
        .eval("\"x\" 1 60 start dup + next")
        .unwrap_err();
    assert_eq!(err.kind(), Error::OutOfMemory);
    assert_eq!(session.eval("1 1 +").unwrap().last().unwrap(), "2");
}

#[test]
fn undefined_operation_reported_with_command() {
    let mut session = Session::new();
    session.eval("1 0 /").unwrap_err();
    let state = session.runtime().last_error().unwrap();
    assert_eq!(state.command, Some("÷"));
}
