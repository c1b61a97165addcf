//! The ripple evaluator: a `Runtime` bundling the heap and settings, an
//! evaluator over the operand stack, the command set, numeric dispatch
//! across the integer/fraction/decimal/complex tower, and the symbolic
//! expression engine.

pub mod arith;
pub mod eq;
pub mod eval;
pub mod host;
pub mod machine;
pub mod symbolic;
pub mod transcend;

pub use eval::{evaluate, run};
pub use host::{Host, SystemHost, TestHost};
pub use machine::Runtime;

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_core::{Error, Op, Settings};
    use ripple_lang::parse_source;

    /// Parse and run a source string on a fresh runtime.
    fn eval(rt: &mut Runtime, src: &str) -> ripple_core::Result<()> {
        let program = parse_source(&mut rt.heap, &rt.settings, src).map_err(|e| e.kind)?;
        run(rt, program)
    }

    fn eval_top(src: &str) -> String {
        let mut rt = Runtime::new();
        eval(&mut rt, src).unwrap_or_else(|e| panic!("eval failed for '{}': {}", src, e));
        let top = rt.heap.peek(0).unwrap();
        ripple_lang::render_to_string(&rt.heap, &rt.settings, top).unwrap()
    }

    fn eval_err(src: &str) -> Error {
        let mut rt = Runtime::new();
        eval(&mut rt, src).expect_err("expected error")
    }

    #[test]
    fn literal_evaluates_to_itself() {
        assert_eq!(eval_top("42"), "42");
        assert_eq!(eval_top("\"hi\""), "\"hi\"");
        assert_eq!(eval_top("{ 1 2 }"), "{ 1 2 }");
    }

    #[test]
    fn program_literal_pushes() {
        assert_eq!(eval_top("« 1 2 + »"), "« 1 2 + »");
        // eval runs it
        assert_eq!(eval_top("« 1 2 + » eval"), "3");
    }

    #[test]
    fn integer_arithmetic() {
        assert_eq!(eval_top("123 456 +"), "579");
        assert_eq!(eval_top("5 3 -"), "2");
        assert_eq!(eval_top("3 5 -"), "-2");
        assert_eq!(eval_top("6 7 *"), "42");
        assert_eq!(eval_top("84 2 /"), "42");
    }

    #[test]
    fn division_yields_exact_fractions() {
        assert_eq!(eval_top("3 4 /"), "3/4");
        assert_eq!(eval_top("4 8 /"), "1/2");
        assert_eq!(eval_top("1 2 / 1 3 / +"), "5/6");
        assert_eq!(eval_top("1 2 / 2 *"), "1");
    }

    #[test]
    fn promotion_to_bignum() {
        assert_eq!(
            eval_top("4294967296 4294967296 *"),
            "18446744073709551616"
        );
    }

    #[test]
    fn factorial_seed() {
        assert_eq!(eval_top("10 fact"), "3628800");
        assert_eq!(eval_top("10 !"), "3628800");
        assert_eq!(
            eval_top("25 !"),
            "15511210043330985984000000"
        );
    }

    #[test]
    fn mod_and_rem_sign_conventions() {
        // rem follows the dividend, mod the divisor
        assert_eq!(eval_top("7 3 rem"), "1");
        assert_eq!(eval_top("-7 3 rem"), "-1");
        assert_eq!(eval_top("7 -3 rem"), "1");
        assert_eq!(eval_top("7 3 mod"), "1");
        assert_eq!(eval_top("-7 3 mod"), "2");
        assert_eq!(eval_top("7 -3 mod"), "-2");
    }

    #[test]
    fn zero_divide() {
        assert_eq!(eval_err("1 0 /"), Error::ZeroDivide);
        assert_eq!(eval_err("1. 0. /"), Error::ZeroDivide);
    }

    #[test]
    fn stack_commands() {
        assert_eq!(eval_top("1 2 swap drop"), "2");
        assert_eq!(eval_top("5 dup +"), "10");
        assert_eq!(eval_top("1 2 over + +"), "4");
        assert_eq!(eval_top("1 2 3 rot drop drop"), "2");
        assert_eq!(eval_top("1 2 3 depth * +"), "11");
        assert_eq!(eval_top("1 2 3 3 pick + +"), "6");
    }

    #[test]
    fn dup_swap_drop_leaves_value() {
        // x Duplicate Swap Drop leaves x for every x
        for x in ["42", "\"s\"", "{ 1 }", "'X+1'", "3/4", "(1;2)"] {
            let src = format!("{} dup swap drop", x);
            assert_eq!(eval_top(&src), eval_top(x));
        }
    }

    #[test]
    fn missing_argument() {
        assert_eq!(eval_err("+"), Error::MissingArgument);
        assert_eq!(eval_err("1 +"), Error::MissingArgument);
        assert_eq!(eval_err("drop"), Error::MissingArgument);
    }

    #[test]
    fn type_errors() {
        assert_eq!(eval_err("1 \"x\" +"), Error::Type);
    }

    #[test]
    fn comparisons_and_logic() {
        assert_eq!(eval_top("1 2 <"), "1");
        assert_eq!(eval_top("2 1 <"), "0");
        assert_eq!(eval_top("2 2 <="), "1");
        assert_eq!(eval_top("1 1 =="), "1");
        assert_eq!(eval_top("1 1. =="), "1");
        assert_eq!(eval_top("1 2 ≠"), "1");
        assert_eq!(eval_top("1 0 and"), "0");
        assert_eq!(eval_top("1 0 or"), "1");
        assert_eq!(eval_top("1 not"), "0");
        assert_eq!(eval_top("{ 1 } { 1 } same"), "1");
        assert_eq!(eval_top("{ 1 } { 2 } same"), "0");
    }

    #[test]
    fn based_arithmetic_seed() {
        // #FF #F0 and with wordsize 16 is #F0
        assert_eq!(eval_top("16 stws #FF #F0 and"), "#F0h");
        assert_eq!(eval_top("#FF #1 +"), "#100h");
        assert_eq!(eval_top("8 stws #FF #1 +"), "#0h");
        assert_eq!(eval_top("#F0 not 8 stws"), "#FFFF_FFFF_FFFF_FF0Fh");
    }

    #[test]
    fn based_wraparound_subtraction() {
        assert_eq!(eval_top("8 stws #1 #2 -"), "#FFh");
    }

    #[test]
    fn conditionals() {
        assert_eq!(eval_top("if 1 then 42 end"), "42");
        assert_eq!(eval_top("1 if 0 then 42 end"), "1");
        assert_eq!(eval_top("if 0 then 1 else 2 end"), "2");
        assert_eq!(eval_top("if 1 2 < then 10 else 20 end"), "10");
    }

    #[test]
    fn loops() {
        // sum 1..5 with a for loop
        assert_eq!(eval_top("0 1 5 for i i + next"), "15");
        // start loop body runs end-start+1 times
        assert_eq!(eval_top("0 1 5 start 1 + next"), "5");
        // step loops
        assert_eq!(eval_top("0 1 10 for i i + 2 step"), "25");
        // do..until runs at least once
        assert_eq!(eval_top("0 do 1 + until dup 5 >= end"), "5");
        // while may run zero times
        assert_eq!(eval_top("7 while 0 repeat 1 + end"), "7");
        assert_eq!(eval_top("0 while dup 3 < repeat 1 + end"), "3");
    }

    #[test]
    fn locals_bind_and_shadow() {
        assert_eq!(eval_top("2 3 → a b « a b + »"), "5");
        assert_eq!(eval_top("1 → a « 2 → a « a » »"), "2");
        assert_eq!(eval_top("2 → x « x 'x' »"), "'x'");
    }

    #[test]
    fn variables_store_and_recall() {
        assert_eq!(eval_top("42 'x' sto x"), "42");
        assert_eq!(eval_top("42 'x' sto 'x' rcl"), "42");
        assert_eq!(eval_top("« 2 * » 'dbl' sto 21 dbl"), "42");
        assert_eq!(eval_err("'gone' rcl"), Error::UndefinedName);
        // After a purge the name is free again and defers.
        assert_eq!(eval_top("42 'x' sto 'x' purge x"), "x");
    }

    #[test]
    fn undefined_names_defer() {
        assert_eq!(eval_top("radius"), "radius");
    }

    #[test]
    fn symbolic_arithmetic_builds_expressions() {
        assert_eq!(eval_top("'X' 1 +"), "'X+1'");
        assert_eq!(eval_top("'X' 0 +"), "'X'");
        assert_eq!(eval_top("'X' 1 * "), "'X'");
        assert_eq!(eval_top("'X' 'Y' *"), "'X·Y'");
    }

    #[test]
    fn expand_seed() {
        assert_eq!(eval_top("'(X+1)^2' expand"), "'X^2+2·X+1'");
    }

    #[test]
    fn simplify_and_collect() {
        assert_eq!(eval_top("'X+X' simplify"), "'2·X'");
        assert_eq!(eval_top("'X·1+0' simplify"), "'X'");
        assert_eq!(eval_top("'2+3' simplify"), "5");
        assert_eq!(eval_top("'X+X+X' collect"), "'3·X'");
    }

    #[test]
    fn rewrite_command() {
        assert_eq!(
            eval_top("'sin(Q)^2' 'sin(a)' 'cos(a)' rewrite"),
            "'cos(Q)^2'"
        );
    }

    #[test]
    fn to_num_seed() {
        assert_eq!(eval_top("'sin(π/2)' →Num"), "1.");
        assert_eq!(eval_top("3 4 / →Num"), "0.75");
    }

    #[test]
    fn to_frac() {
        assert_eq!(eval_top("0.75 →Q"), "3/4");
        assert_eq!(eval_top("0.5 →Q"), "1/2");
        assert_eq!(eval_top("3. →Q"), "3");
    }

    #[test]
    fn text_conversions() {
        assert_eq!(eval_top("{ 1 2 } →Str"), "\"{ 1 2 }\"");
        assert_eq!(eval_top("\"1 2 +\" Str→ eval"), "3");
    }

    #[test]
    fn lists() {
        assert_eq!(eval_top("{ 1 2 3 } size"), "3");
        assert_eq!(eval_top("{ 7 8 9 } 2 get"), "8");
        assert_eq!(eval_top("{ 1 2 } 2 5 put"), "{ 1 5 }");
        assert_eq!(eval_top("1 2 3 3 →List"), "{ 1 2 3 }");
        assert_eq!(eval_top("{ 4 5 } List→ drop +"), "9");
        assert_eq!(eval_err("{ 1 } 2 get"), Error::Index);
    }

    #[test]
    fn recursion_limit_fires_deterministically() {
        let mut rt = Runtime::new();
        rt.set_max_recursion(16);
        // A self-evaluating name loops until the guard fires.
        let err = eval(&mut rt, "« loop » 'loop' sto loop").expect_err("must recurse");
        assert_eq!(err, Error::Recursion);
    }

    #[test]
    fn interrupt_terminates_promptly() {
        let host = TestHost::new();
        host.interrupt_after.set(5);
        let mut rt = Runtime::with_host(Box::new(host));
        let err = eval(&mut rt, "0 1 100000 for i i + next").expect_err("interrupted");
        assert_eq!(err, Error::Interrupted);
    }

    #[test]
    fn iferr_catches_and_reports() {
        assert_eq!(eval_top("iferr 1 0 / then 99 end"), "99");
        assert_eq!(eval_top("iferr 1 then 2 else 3 end"), "3");
        let zero_divide = Error::ZeroDivide.number().to_string();
        assert_eq!(eval_top("iferr 1 0 / then errn end"), zero_divide);
        assert_eq!(
            eval_top("iferr 1 0 / then errm end"),
            "\"Divide by zero\""
        );
    }

    #[test]
    fn last_arguments() {
        assert_eq!(eval_top("3 4 + lastarg - +"), "6");
    }

    #[test]
    fn error_slot_records_command() {
        let mut rt = Runtime::new();
        let err = eval(&mut rt, "1 0 /").unwrap_err();
        assert_eq!(err, Error::ZeroDivide);
        let state = rt.last_error().unwrap();
        assert_eq!(state.kind, Error::ZeroDivide);
        assert_eq!(state.command, Some("÷"));
    }

    #[test]
    fn wait_and_ticks_go_through_host() {
        let host = TestHost::new();
        let mut rt = Runtime::with_host(Box::new(host));
        eval(&mut rt, "0.5 wait ticks").unwrap();
        let top = rt.heap.peek(0).unwrap();
        assert_eq!(rt.heap.int_value(top).unwrap(), 500);
    }

    #[test]
    fn long_loop_stays_flat() {
        // Bounded duration, no recursion growth, finite result.
        let mut rt = Runtime::new();
        eval(&mut rt, "0 1 1000 for x x tan⁻¹ sin exp ∛ + next").unwrap();
        assert_eq!(rt.recursion_depth(), 0);
        let top = rt.heap.peek(0).unwrap();
        let v = rt.heap.decimal_value(top).unwrap();
        assert!(v.is_finite());
        assert!(v > 0.0);
    }

    #[test]
    fn settings_commands_take_effect() {
        // Parsing reads the base at parse time; display follows the
        // setting in force when rendering.
        assert_eq!(eval_top("dec #10d"), "#10d");
        assert_eq!(eval_top("dec #10"), "#16d");
        let mut rt = Runtime::new();
        eval(&mut rt, "2 fix").unwrap();
        assert_eq!(rt.settings.precision, 2);
        assert_eq!(
            rt.settings.display_mode,
            ripple_core::DisplayMode::Fix
        );
    }

    #[test]
    fn directory_navigation() {
        assert_eq!(
            eval_top("'sub' crdir path"),
            "{ HOME }"
        );
        assert_eq!(eval_top("1 'a' sto 2 'b' sto vars size"), "2");
    }

    #[test]
    fn type_of() {
        let tag = Op::Integer.tag().to_string();
        assert_eq!(eval_top("42 type"), tag);
        let tag = Op::List.tag().to_string();
        assert_eq!(eval_top("{ } type"), tag);
    }

    #[test]
    fn undo_restores_stack() {
        let mut rt = Runtime::new();
        eval(&mut rt, "1 2 3").unwrap();
        rt.heap.save_undo();
        eval(&mut rt, "drop drop drop 99").unwrap();
        eval(&mut rt, "undo").unwrap();
        assert_eq!(rt.heap.depth(), 3);
        let top = rt.heap.peek(0).unwrap();
        assert_eq!(rt.heap.int_value(top).unwrap(), 3);
    }

    #[test]
    fn factor_out_extracts_powers() {
        let mut rt = Runtime::new();
        eval(&mut rt, "'3·X^2·Y'").unwrap();
        let expr = rt.heap.pop().unwrap();
        let pin = rt.heap.pin(expr);
        let x = rt.heap.make_str(Op::Symbol, "X").unwrap();
        let expr = rt.heap.pinned(&pin).unwrap();
        rt.heap.unpin(pin);
        let (scale, exponent) = symbolic::factor_out(&mut rt, expr, x).unwrap();
        assert_eq!(rt.heap.int_value(exponent).unwrap(), 2);
        let text =
            ripple_lang::render_to_string(&rt.heap, &Settings::default(), scale).unwrap();
        assert_eq!(text, "'3·Y'");
    }

    #[test]
    fn as_difference_for_solve() {
        let mut rt = Runtime::new();
        eval(&mut rt, "'X=3'").unwrap();
        let expr = rt.heap.pop().unwrap();
        let diff = symbolic::as_difference_for_solve(&mut rt, expr).unwrap();
        let text =
            ripple_lang::render_to_string(&rt.heap, &Settings::default(), diff).unwrap();
        assert_eq!(text, "'X-3'");
    }
}
