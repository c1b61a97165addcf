//! The evaluator.
//!
//! Two entry points in the calculator tradition: [`evaluate`] pushes
//! immediate objects, resolves names and executes commands, while
//! [`run`] additionally iterates programs, blocks and expressions. A
//! program literal inside a program is therefore pushed, and only runs
//! through `eval` or by evaluating a name bound to it.
//!
//! Between the children of a running program the interrupt flag is
//! polled; a recursion counter guards `run` re-entry.

use ripple_core::{Error, ErrorState, Op, Result};
use ripple_mem::{Frame, ObjRef};

use crate::arith;
use crate::machine::Runtime;
use crate::symbolic;

/// Evaluate one object: immediates push, symbols resolve, commands
/// execute, control structures run.
pub fn evaluate(rt: &mut Runtime, obj: ObjRef) -> Result<()> {
    let op = rt.heap.op_of(obj)?;
    match op {
        Op::Symbol => resolve_symbol(rt, obj),
        Op::Local => {
            let index = rt.heap.local_index(obj)?;
            let value = rt.heap.local(index)?;
            rt.heap.push(value)
        }
        Op::Comment => Ok(()),
        Op::Locals => execute_locals(rt, obj),
        Op::Block => run_children(rt, obj),
        _ if op.is_command() => {
            execute_command(rt, op).map_err(|e| {
                rt.set_error(ErrorState::in_command(e, op.info().name));
                e
            })
        }
        _ if op.is_control() => execute_control(rt, op, obj),
        _ if op.is_immediate() => rt.heap.push(obj),
        _ => Err(Error::InvalidObject),
    }
}

/// Run an object: programs, blocks and expressions execute their
/// children; everything else evaluates.
pub fn run(rt: &mut Runtime, obj: ObjRef) -> Result<()> {
    match rt.heap.op_of(obj)? {
        Op::Program | Op::Block | Op::Expression => run_children(rt, obj),
        _ => evaluate(rt, obj),
    }
}

/// Execute the children of a composite in order, polling the interrupt
/// flag between steps. The composite is pinned and children re-derived
/// from it, so collection during a step cannot strand the walk.
fn run_children(rt: &mut Runtime, obj: ObjRef) -> Result<()> {
    rt.enter()?;
    let pin = rt.heap.pin(obj);
    let result = (|rt: &mut Runtime| -> Result<()> {
        let base = obj.offset();
        let rels: Vec<usize> = rt
            .heap
            .children_of(obj)?
            .iter()
            .map(|c| c.offset() - base)
            .collect();
        for rel in rels {
            if rt.host().interrupt_pending() {
                return Err(Error::Interrupted);
            }
            let parent = rt.heap.pinned(&pin).expect("strong pin");
            let child = rt.heap.child_ref(parent, rel);
            evaluate(rt, child)?;
        }
        Ok(())
    })(rt);
    rt.heap.unpin(pin);
    rt.leave();
    result
}

/// A free name: innermost locals first, then the directory walk. A
/// bound object runs; an unbound name pushes itself, deferred.
fn resolve_symbol(rt: &mut Runtime, sym: ObjRef) -> Result<()> {
    let name = rt.heap.str_value(sym)?.to_string();
    if let Some((_, value)) = rt.heap.local_by_name(&name) {
        return rt.heap.push(value);
    }
    match rt.heap.rcl_walk(&name) {
        Some(value) => run(rt, value),
        None => rt.heap.push(sym),
    }
}

/// `→ a b « body »`: bind stack values to named slots, run the body,
/// drop the frame.
fn execute_locals(rt: &mut Runtime, obj: ObjRef) -> Result<()> {
    let (name_refs, body) = rt.heap.locals_parts(obj)?;
    let mut names = Vec::with_capacity(name_refs.len());
    for r in name_refs {
        names.push(rt.heap.str_value(r)?.to_string());
    }
    if rt.heap.depth() < names.len() {
        return Err(Error::MissingArgument);
    }
    let mut values = Vec::with_capacity(names.len());
    for _ in 0..names.len() {
        values.push(rt.heap.pop()?);
    }
    values.reverse();

    let mut frame = Frame::new();
    for (name, value) in names.into_iter().zip(values) {
        frame.bind(name, value);
    }

    let pin = rt.heap.pin(obj);
    let body_rel = body.offset() - obj.offset();
    rt.heap.push_frame(frame);
    let parent = rt.heap.pinned(&pin).expect("strong pin");
    let body = rt.heap.child_ref(parent, body_rel);
    let result = run(rt, body);
    rt.heap.pop_frame();
    rt.heap.unpin(pin);
    result
}

// ============================================================================
// Control structures
// ============================================================================

/// Loop counters live as f64, exact for any counter a program can
/// reasonably reach; the bound object pushed for `for` variables demotes
/// to an integer when whole.
fn counter_object(rt: &mut Runtime, v: f64) -> Result<ObjRef> {
    if v.fract() == 0.0 && v.abs() < (1i64 << 53) as f64 {
        rt.heap.make_int(v as i64)
    } else {
        rt.heap.make_decimal(v)
    }
}

fn pop_loop_bounds(rt: &mut Runtime) -> Result<(f64, f64)> {
    let end_obj = rt.heap.pop()?;
    let end = arith::to_f64(rt, end_obj)?;
    let start_obj = rt.heap.pop()?;
    let start = arith::to_f64(rt, start_obj)?;
    Ok((start, end))
}

fn execute_control(rt: &mut Runtime, op: Op, obj: ObjRef) -> Result<()> {
    let pin = rt.heap.pin(obj);
    let base = obj.offset();
    let rels: Vec<usize> = match rt.heap.children_of(obj) {
        Ok(children) => children.iter().map(|c| c.offset() - base).collect(),
        Err(e) => {
            rt.heap.unpin(pin);
            return Err(e);
        }
    };
    let child = |rt: &Runtime, pin: &ripple_mem::PinHandle, i: usize| {
        let parent = rt.heap.pinned(pin).expect("strong pin");
        rt.heap.child_ref(parent, rels[i])
    };

    let result = (|rt: &mut Runtime| -> Result<()> {
        match op {
            Op::IfThen | Op::IfThenElse => {
                let cond = child(rt, &pin, 0);
                run(rt, cond)?;
                if rt.pop_truthy()? {
                    let body = child(rt, &pin, 1);
                    run(rt, body)?;
                } else if op == Op::IfThenElse {
                    let alt = child(rt, &pin, 2);
                    run(rt, alt)?;
                }
                Ok(())
            }
            Op::IfErrThen | Op::IfErrThenElse => {
                let tried = child(rt, &pin, 0);
                match run(rt, tried) {
                    Ok(()) => {
                        if op == Op::IfErrThenElse {
                            let ok_branch = child(rt, &pin, 2);
                            run(rt, ok_branch)?;
                        }
                        Ok(())
                    }
                    Err(e) => {
                        // Record for errn/errm, then recover and branch.
                        rt.set_error(ErrorState::new(e));
                        rt.clear_error();
                        let handler = child(rt, &pin, 1);
                        run(rt, handler)
                    }
                }
            }
            Op::DoUntil => loop {
                if rt.host().interrupt_pending() {
                    return Err(Error::Interrupted);
                }
                let body = child(rt, &pin, 0);
                run(rt, body)?;
                let cond = child(rt, &pin, 1);
                run(rt, cond)?;
                if rt.pop_truthy()? {
                    return Ok(());
                }
            },
            Op::WhileRepeat => loop {
                if rt.host().interrupt_pending() {
                    return Err(Error::Interrupted);
                }
                let cond = child(rt, &pin, 0);
                run(rt, cond)?;
                if !rt.pop_truthy()? {
                    return Ok(());
                }
                let body = child(rt, &pin, 1);
                run(rt, body)?;
            },
            Op::StartNext | Op::StartStep => {
                let (start, end) = pop_loop_bounds(rt)?;
                let mut counter = start;
                loop {
                    if rt.host().interrupt_pending() {
                        return Err(Error::Interrupted);
                    }
                    let body = child(rt, &pin, 0);
                    run(rt, body)?;
                    let step = if op == Op::StartStep {
                        let step_obj = rt.heap.pop()?;
                        arith::to_f64(rt, step_obj)?
                    } else {
                        1.0
                    };
                    counter += step;
                    let done = if step >= 0.0 {
                        counter > end
                    } else {
                        counter < end
                    };
                    if done {
                        return Ok(());
                    }
                }
            }
            Op::ForNext | Op::ForStep => {
                let (start, end) = pop_loop_bounds(rt)?;
                let name_ref = child(rt, &pin, 0);
                let name = rt.heap.str_value(name_ref)?.to_string();
                let mut counter = start;

                let value = counter_object(rt, counter)?;
                let mut frame = Frame::new();
                frame.bind(name, value);
                rt.heap.push_frame(frame);

                let result = (|rt: &mut Runtime| -> Result<()> {
                    loop {
                        if rt.host().interrupt_pending() {
                            return Err(Error::Interrupted);
                        }
                        let body = child(rt, &pin, 1);
                        run(rt, body)?;
                        let step = if op == Op::ForStep {
                            let step_obj = rt.heap.pop()?;
                            arith::to_f64(rt, step_obj)?
                        } else {
                            1.0
                        };
                        counter += step;
                        let done = if step >= 0.0 {
                            counter > end
                        } else {
                            counter < end
                        };
                        if done {
                            return Ok(());
                        }
                        let value = counter_object(rt, counter)?;
                        rt.heap.set_local(0, value)?;
                    }
                })(rt);
                rt.heap.pop_frame();
                result
            }
            _ => Err(Error::InvalidObject),
        }
    })(rt);
    rt.heap.unpin(pin);
    result
}

// ============================================================================
// Commands
// ============================================================================

fn execute_command(rt: &mut Runtime, op: Op) -> Result<()> {
    let arity = op.info().arity as usize;
    if rt.heap.depth() < arity {
        return Err(Error::MissingArgument);
    }
    // Snapshot the arguments for lastarg: reference copies only.
    if arity > 0 {
        let mut args = Vec::with_capacity(arity);
        for i in (0..arity).rev() {
            args.push(rt.heap.peek(i)?);
        }
        rt.heap.save_last_args(args);
    }

    match op {
        // Arithmetic
        Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod | Op::Rem | Op::Pow | Op::Min
        | Op::Max => arith::binary(rt, op),
        Op::Neg | Op::Inv | Op::Sq | Op::Abs | Op::Sign | Op::Fact | Op::Sqrt | Op::Cbrt
        | Op::Sin | Op::Cos | Op::Tan | Op::Asin | Op::Acos | Op::Atan | Op::Exp | Op::Ln
        | Op::Log => arith::unary(rt, op),
        Op::Pi => {
            let pi = rt.heap.make_decimal(std::f64::consts::PI)?;
            rt.heap.push(pi)
        }

        // Tests and logic
        Op::Same | Op::TestEq | Op::TestNe | Op::TestLt | Op::TestLe | Op::TestGt
        | Op::TestGe => arith::compare_command(rt, op),
        Op::And | Op::Or | Op::Xor | Op::Not => arith::logic(rt, op),

        // Stack
        Op::Dup => rt.heap.pick(1),
        Op::Dup2 => {
            let a = rt.heap.peek(1)?;
            let b = rt.heap.peek(0)?;
            rt.heap.push(a)?;
            rt.heap.push(b)
        }
        Op::Drop => rt.heap.pop().map(|_| ()),
        Op::Drop2 => rt.heap.drop_n(2),
        Op::DropN => {
            let n = rt.pop_count()?;
            rt.heap.drop_n(n)
        }
        Op::Swap => {
            let y = rt.heap.pop()?;
            let x = rt.heap.pop()?;
            rt.heap.push(y)?;
            rt.heap.push(x)
        }
        Op::Over => {
            let a = rt.heap.peek(1)?;
            rt.heap.push(a)
        }
        Op::Rot => rt.heap.roll(3),
        Op::Roll => {
            let n = rt.pop_count()?;
            rt.heap.roll(n)
        }
        Op::RollD => {
            let n = rt.pop_count()?;
            rt.heap.roll_down(n)
        }
        Op::Pick => {
            let n = rt.pop_count()?;
            rt.heap.pick(n)
        }
        Op::Depth => {
            let depth = rt.heap.depth() as i64;
            let obj = rt.heap.make_int(depth)?;
            rt.heap.push(obj)
        }
        Op::ClearStk => {
            rt.heap.clear_stack();
            Ok(())
        }
        Op::LastArg => rt.heap.push_last_args(),
        Op::Undo => {
            rt.heap.apply_undo();
            Ok(())
        }

        // Memory
        Op::Sto => {
            let name = rt.pop_name()?;
            let value = rt.heap.pop()?;
            rt.heap.sto(&name, value)
        }
        Op::Rcl => {
            let name = rt.pop_name()?;
            let value = rt.heap.rcl_walk(&name).ok_or(Error::UndefinedName)?;
            rt.heap.push(value)
        }
        Op::Purge => {
            let name = rt.pop_name()?;
            rt.heap.purge(&name)
        }
        Op::CrDir => {
            let name = rt.pop_name()?;
            if rt.heap.dirs_mut().create_subdir(name) {
                Ok(())
            } else {
                Err(Error::NameExists)
            }
        }
        Op::PgDir => {
            let name = rt.pop_name()?;
            rt.heap
                .dirs_mut()
                .remove_subdir(&name)
                .map_err(|msg| match msg {
                    "directory not found" => Error::NoDirectory,
                    _ => Error::Value,
                })
        }
        Op::UpDir => {
            rt.heap.dirs_mut().updir();
            Ok(())
        }
        Op::Home => {
            rt.heap.dirs_mut().home();
            Ok(())
        }
        Op::Path => {
            let mut names = vec!["HOME".to_string()];
            names.extend(rt.heap.dirs().path().iter().cloned());
            push_symbol_list(rt, &names)
        }
        Op::Vars => {
            let names = rt.heap.dirs().var_names();
            push_symbol_list(rt, &names)
        }

        // Evaluation and conversion
        Op::Eval => {
            let obj = rt.heap.pop()?;
            run(rt, obj)
        }
        Op::ToNum => {
            let obj = rt.heap.pop()?;
            to_num(rt, obj)
        }
        Op::ToText => {
            let obj = rt.heap.pop()?;
            let text = ripple_lang::render_to_string(&rt.heap, &rt.settings, obj)?;
            let out = rt.heap.make_str(Op::Text, &text)?;
            rt.heap.push(out)
        }
        Op::Compile => {
            let obj = rt.heap.pop()?;
            let text = rt.heap.str_value(obj)?.to_string();
            let program = ripple_lang::parse_source(&mut rt.heap, &rt.settings, &text)
                .map_err(|state| {
                    rt.set_error(state);
                    state.kind
                })?;
            let children = rt.heap.children_of(program)?;
            if children.len() == 1 {
                rt.heap.push(children[0])
            } else {
                rt.heap.push(program)
            }
        }
        Op::ToFrac => {
            let obj = rt.heap.pop()?;
            to_fraction(rt, obj)
        }
        Op::TypeOf => {
            let obj = rt.heap.pop()?;
            let tag = rt.heap.op_of(obj)?.tag() as i64;
            let out = rt.heap.make_int(tag)?;
            rt.heap.push(out)
        }

        // Lists
        Op::Size => {
            let obj = rt.heap.pop()?;
            let size = match rt.heap.op_of(obj)? {
                Op::List | Op::Array => rt.heap.children_of(obj)?.len(),
                Op::Text => rt.heap.str_value(obj)?.chars().count(),
                _ => 1,
            };
            let out = rt.heap.make_int(size as i64)?;
            rt.heap.push(out)
        }
        Op::Get => {
            let n = rt.pop_count()?;
            let list = rt.heap.pop()?;
            let children = rt.heap.children_of(list)?;
            if n == 0 || n > children.len() {
                return Err(Error::Index);
            }
            rt.heap.push(children[n - 1])
        }
        Op::Put => {
            let obj = rt.heap.pop()?;
            let n = rt.pop_count()?;
            let list = rt.heap.pop()?;
            let kind = rt.heap.op_of(list)?;
            if !matches!(kind, Op::List | Op::Array) {
                return Err(Error::Type);
            }
            let mut children = rt.heap.children_of(list)?;
            if n == 0 || n > children.len() {
                return Err(Error::Index);
            }
            children[n - 1] = obj;
            let out = rt.heap.make_composite(kind, &children)?;
            rt.heap.push(out)
        }
        Op::ToList => {
            let n = rt.pop_count()?;
            if rt.heap.depth() < n {
                return Err(Error::MissingArgument);
            }
            let mut children = Vec::with_capacity(n);
            for i in (0..n).rev() {
                children.push(rt.heap.peek(i)?);
            }
            rt.heap.drop_n(n)?;
            let out = rt.heap.make_composite(Op::List, &children)?;
            rt.heap.push(out)
        }
        Op::FromList => {
            let list = rt.heap.pop()?;
            if !matches!(rt.heap.op_of(list)?, Op::List | Op::Array) {
                return Err(Error::Type);
            }
            let children = rt.heap.children_of(list)?;
            let count = children.len();
            for child in children {
                rt.heap.push(child)?;
            }
            let out = rt.heap.make_int(count as i64)?;
            rt.heap.push(out)
        }

        // Expressions
        Op::Expand | Op::Collect | Op::Simplify => {
            let obj = rt.heap.pop()?;
            let kind = rt.heap.op_of(obj)?;
            if kind != Op::Expression {
                if kind.is_algebraic() {
                    return rt.heap.push(obj);
                }
                return Err(Error::Type);
            }
            let out = match op {
                Op::Expand => symbolic::expand(rt, obj)?,
                Op::Collect => symbolic::collect(rt, obj)?,
                _ => symbolic::simplify(rt, obj)?,
            };
            rt.heap.push(out)
        }
        Op::Rewrite => {
            let replacement = pop_expression(rt)?;
            let rpin = rt.heap.pin(replacement);
            let result = (|rt: &mut Runtime| -> Result<ObjRef> {
                let pattern = pop_expression(rt)?;
                let ppin = rt.heap.pin(pattern);
                let expr = pop_expression(rt);
                let pattern = rt.heap.pinned(&ppin).expect("strong pin");
                rt.heap.unpin(ppin);
                let replacement = rt.heap.pinned(&rpin).expect("strong pin");
                symbolic::rewrite(rt, expr?, pattern, replacement)
            })(rt);
            rt.heap.unpin(rpin);
            let out = result?;
            rt.heap.push(out)
        }

        // Base and word size
        Op::Bin => {
            rt.settings.base = 2;
            Ok(())
        }
        Op::Oct => {
            rt.settings.base = 8;
            Ok(())
        }
        Op::Dec => {
            rt.settings.base = 10;
            Ok(())
        }
        Op::Hex => {
            rt.settings.base = 16;
            Ok(())
        }
        Op::Stws => {
            let n = rt.pop_count()?;
            if !(1..=1024).contains(&n) {
                return Err(Error::BasedRange);
            }
            rt.settings.wordsize = n as u32;
            Ok(())
        }
        Op::Rcws => {
            let ws = rt.settings.wordsize as i64;
            let out = rt.heap.make_int(ws)?;
            rt.heap.push(out)
        }

        // Angle mode
        Op::Deg => {
            rt.settings.angle_mode = ripple_core::AngleMode::Degrees;
            Ok(())
        }
        Op::Rad => {
            rt.settings.angle_mode = ripple_core::AngleMode::Radians;
            Ok(())
        }
        Op::Grad => {
            rt.settings.angle_mode = ripple_core::AngleMode::Grads;
            Ok(())
        }
        Op::PiRad => {
            rt.settings.angle_mode = ripple_core::AngleMode::PiRadians;
            Ok(())
        }

        // Display mode
        Op::Std => {
            rt.settings.display_mode = ripple_core::DisplayMode::Standard;
            Ok(())
        }
        Op::Fix | Op::Sci | Op::Eng | Op::Sig => {
            let n = rt.pop_count()?;
            if n > 17 {
                return Err(Error::Value);
            }
            rt.settings.precision = n as u32;
            rt.settings.display_mode = match op {
                Op::Fix => ripple_core::DisplayMode::Fix,
                Op::Sci => ripple_core::DisplayMode::Sci,
                Op::Eng => ripple_core::DisplayMode::Eng,
                _ => ripple_core::DisplayMode::Sig,
            };
            Ok(())
        }

        // System
        Op::Wait => {
            let obj = rt.heap.pop()?;
            let seconds = arith::to_f64(rt, obj)?;
            if !(0.0..=86_400.0).contains(&seconds) {
                return Err(Error::Value);
            }
            rt.host().sleep((seconds * 1000.0) as u64);
            Ok(())
        }
        Op::Ticks => {
            let ticks = rt.host().ticks() as i64;
            let out = rt.heap.make_int(ticks)?;
            rt.heap.push(out)
        }
        Op::Mem => {
            let free = rt.heap.free() as i64;
            let out = rt.heap.make_int(free)?;
            rt.heap.push(out)
        }
        Op::Gc => {
            let reclaimed = rt.heap.gc() as i64;
            let out = rt.heap.make_int(reclaimed)?;
            rt.heap.push(out)
        }

        // Errors
        Op::ErrN => {
            let number = rt.last_error().map(|e| e.kind.number()).unwrap_or(0);
            let out = rt.heap.make_int(number as i64)?;
            rt.heap.push(out)
        }
        Op::ErrM => {
            let message = rt
                .last_error()
                .map(|e| e.kind.message())
                .unwrap_or_default();
            let out = rt.heap.make_str(Op::Text, &message)?;
            rt.heap.push(out)
        }
        Op::ClErr => {
            rt.clear_all_errors();
            Ok(())
        }
        Op::DoErr => {
            let n = rt.pop_count()?;
            match Error::from_number(n as u16) {
                Some(kind) => Err(kind),
                None => Err(Error::Value),
            }
        }

        _ => Err(Error::Unimplemented),
    }
}

/// Build and push a list of symbols from names.
fn push_symbol_list(rt: &mut Runtime, names: &[String]) -> Result<()> {
    let mut pins = Vec::with_capacity(names.len());
    let result = (|rt: &mut Runtime| -> Result<ObjRef> {
        for name in names {
            let sym = rt.heap.make_str(Op::Symbol, name)?;
            pins.push(rt.heap.pin(sym));
        }
        let children: Vec<ObjRef> = pins
            .iter()
            .map(|p| rt.heap.pinned(p).expect("strong pin"))
            .collect();
        rt.heap.make_composite(Op::List, &children)
    })(rt);
    rt.heap.unpin_all(pins);
    let list = result?;
    rt.heap.push(list)
}

/// Accept an expression operand, promoting bare algebraics (a symbol or
/// number) to a one-child expression.
fn pop_expression(rt: &mut Runtime) -> Result<ObjRef> {
    let obj = rt.heap.pop()?;
    let op = rt.heap.op_of(obj)?;
    if op == Op::Expression {
        return Ok(obj);
    }
    if op.is_algebraic() {
        return rt.heap.make_composite(Op::Expression, &[obj]);
    }
    Err(Error::Type)
}

/// `→Num`: reduce to a decimal, running symbolic content numerically.
fn to_num(rt: &mut Runtime, obj: ObjRef) -> Result<()> {
    let op = rt.heap.op_of(obj)?;
    if op.is_real() {
        let v = arith::to_f64(rt, obj)?;
        let out = rt.heap.make_decimal(v)?;
        return rt.heap.push(out);
    }
    if op.is_based() {
        let mag = rt.heap.magnitude_of(obj)?;
        let mut v = 0.0;
        for &b in mag.iter().rev() {
            v = v * 256.0 + b as f64;
        }
        let out = rt.heap.make_decimal(v)?;
        return rt.heap.push(out);
    }
    if op.is_complex() {
        return rt.heap.push(obj);
    }
    if op.is_symbolic() {
        run(rt, obj)?;
        let result = rt.heap.pop()?;
        if rt.heap.op_of(result)?.is_symbolic() {
            return Err(Error::UndefinedName);
        }
        return to_num(rt, result);
    }
    Err(Error::Type)
}

/// `→Q`: decimal to fraction by continued-fraction expansion, bounded
/// by the session iteration count.
fn to_fraction(rt: &mut Runtime, obj: ObjRef) -> Result<()> {
    let op = rt.heap.op_of(obj)?;
    if op.is_integer() || op.is_fraction() {
        return rt.heap.push(obj);
    }
    if op != Op::Decimal {
        return Err(Error::Type);
    }
    let value = rt.heap.decimal_value(obj)?;
    if !value.is_finite() || value.abs() >= 9e18 {
        return Err(Error::Value);
    }
    let negative = value < 0.0;
    let target = value.abs();
    let mut x = target;
    let tolerance = target.abs() * 1e-10 + 1e-12;

    let (mut p0, mut q0, mut p1, mut q1) = (1i64, 0i64, x.floor() as i64, 1i64);
    x -= x.floor();
    for _ in 0..rt.settings.frac_iterations {
        // Stop at the first convergent that reproduces the value to
        // working accuracy; continuing would only encode the float's
        // own rounding noise.
        if (p1 as f64 / q1 as f64 - target).abs() <= tolerance {
            break;
        }
        if x.abs() < 1e-15 {
            break;
        }
        x = 1.0 / x;
        let a = x.floor();
        if a >= i64::MAX as f64 {
            break;
        }
        let a = a as i64;
        let p2 = match a.checked_mul(p1).and_then(|v| v.checked_add(p0)) {
            Some(v) => v,
            None => break,
        };
        let q2 = match a.checked_mul(q1).and_then(|v| v.checked_add(q0)) {
            Some(v) => v,
            None => break,
        };
        p0 = p1;
        q0 = q1;
        p1 = p2;
        q1 = q2;
        x -= x.floor();
    }

    let out = if q1 == 1 {
        rt.heap.make_int(if negative { -p1 } else { p1 })?
    } else {
        let num = ripple_core::magnitude::from_u64(p1 as u64);
        let den = ripple_core::magnitude::from_u64(q1 as u64);
        rt.heap.make_fraction(negative && p1 != 0, &num, &den)?
    };
    rt.heap.push(out)
}
