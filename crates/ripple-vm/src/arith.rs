//! Arithmetic dispatch over the numeric tower.
//!
//! Operands promote upward: integer → fraction → decimal → complex, with
//! symbolic operands capturing the whole operation as an expression.
//! Results demote where they can: a bignum that fits 64 bits comes back
//! as a small integer, a fraction with denominator one as an integer.
//!
//! Every helper extracts owned values from its operands before any
//! allocation, so plain references never cross an allocation point.

use std::cmp::Ordering;

use ripple_core::magnitude::{self, Magnitude};
use ripple_core::{Error, Op, Result};
use ripple_mem::bignum;
use ripple_mem::ObjRef;

use crate::machine::Runtime;
use crate::symbolic;
use crate::transcend;

/// Execute a binary arithmetic command.
pub fn binary(rt: &mut Runtime, op: Op) -> Result<()> {
    let y = rt.heap.pop()?;
    let x = rt.heap.pop()?;
    let result = binary_on(rt, op, x, y)?;
    rt.heap.push(result)
}

pub(crate) fn binary_on(rt: &mut Runtime, op: Op, x: ObjRef, y: ObjRef) -> Result<ObjRef> {
    let xop = rt.heap.op_of(x)?;
    let yop = rt.heap.op_of(y)?;

    // `+` concatenates lists and texts, appending the other operand.
    if op == Op::Add {
        if xop == Op::List || yop == Op::List {
            return list_concat(rt, x, y);
        }
        if xop == Op::Text || yop == Op::Text {
            return text_concat(rt, x, y);
        }
    }

    if xop.is_symbolic() || yop.is_symbolic() {
        if !xop.is_algebraic() || !yop.is_algebraic() {
            return Err(Error::Type);
        }
        return symbolic::build_binary(rt, op, x, y);
    }
    if xop.is_complex() || yop.is_complex() {
        return complex_binary(rt, op, x, y);
    }
    if xop == Op::Decimal || yop == Op::Decimal {
        return decimal_binary(rt, op, x, y);
    }
    if xop.is_based() || yop.is_based() {
        if !xop.is_integer() || !yop.is_integer() {
            return Err(Error::Type);
        }
        return based_binary(rt, op, x, y);
    }
    if xop.is_fraction() || yop.is_fraction() {
        return fraction_binary(rt, op, x, y);
    }
    if xop.is_integer() && yop.is_integer() {
        return integer_binary(rt, op, x, y);
    }
    Err(Error::Type)
}

/// Execute a unary arithmetic command.
pub fn unary(rt: &mut Runtime, op: Op) -> Result<()> {
    let x = rt.heap.pop()?;
    let result = unary_on(rt, op, x)?;
    rt.heap.push(result)
}

pub(crate) fn unary_on(rt: &mut Runtime, op: Op, x: ObjRef) -> Result<ObjRef> {
    let xop = rt.heap.op_of(x)?;
    if xop.is_symbolic() {
        return symbolic::build_unary(rt, op, x);
    }
    match op {
        Op::Neg => negate(rt, x),
        Op::Inv => invert(rt, x),
        Op::Sq => binary_on(rt, Op::Mul, x, x),
        Op::Abs => absolute(rt, x),
        Op::Sign => {
            let sign = sign_of(rt, x)?;
            rt.heap.make_int(sign)
        }
        Op::Fact => factorial(rt, x),
        _ => transcend::unary_decimal(rt, op, x),
    }
}

// ============================================================================
// Operand extraction
// ============================================================================

/// Sign and magnitude of a plain integer kind.
fn int_parts(rt: &Runtime, obj: ObjRef) -> Result<(bool, Magnitude)> {
    let op = rt.heap.op_of(obj)?;
    if !op.is_integer() || op.is_based() {
        return Err(Error::Type);
    }
    Ok((op.is_neg(), rt.heap.magnitude_of(obj)?))
}

/// Any real as sign, numerator and denominator.
fn frac_parts(rt: &Runtime, obj: ObjRef) -> Result<(bool, Magnitude, Magnitude)> {
    let op = rt.heap.op_of(obj)?;
    if op.is_fraction() {
        let (num, den) = rt.heap.pair_of(obj)?;
        Ok((
            op.is_neg(),
            rt.heap.magnitude_of(num)?,
            rt.heap.magnitude_of(den)?,
        ))
    } else {
        let (neg, mag) = int_parts(rt, obj)?;
        Ok((neg, mag, magnitude::from_u64(1)))
    }
}

/// Magnitude of a based operand, or the two's-complement image of a
/// negative plain integer within the word size.
fn based_parts(rt: &Runtime, obj: ObjRef) -> Result<Magnitude> {
    let op = rt.heap.op_of(obj)?;
    let mut mag = rt.heap.magnitude_of(obj)?;
    if op.is_neg() {
        mag = twos_complement(&mag, rt.settings.wordsize);
    } else {
        magnitude::truncate_to_bits(&mut mag, rt.settings.wordsize);
    }
    Ok(mag)
}

/// Decimal view of any real operand.
pub(crate) fn to_f64(rt: &Runtime, obj: ObjRef) -> Result<f64> {
    let op = rt.heap.op_of(obj)?;
    match op {
        Op::Decimal => rt.heap.decimal_value(obj),
        _ if op.is_fraction() => {
            let (neg, num, den) = frac_parts(rt, obj)?;
            let v = mag_to_f64(&num) / mag_to_f64(&den);
            Ok(if neg { -v } else { v })
        }
        _ if op.is_integer() => {
            let v = mag_to_f64(&rt.heap.magnitude_of(obj)?);
            Ok(if op.is_neg() { -v } else { v })
        }
        _ => Err(Error::Type),
    }
}

fn mag_to_f64(mag: &[u8]) -> f64 {
    let mut v = 0.0;
    for &b in mag.iter().rev() {
        v = v * 256.0 + b as f64;
    }
    v
}

fn twos_complement(mag: &[u8], wordsize: u32) -> Magnitude {
    let wbytes = ((wordsize as usize) + 7) / 8;
    let mut out = Magnitude::new();
    let mut carry = 1u16;
    for i in 0..wbytes {
        let b = !mag.get(i).copied().unwrap_or(0);
        let v = b as u16 + carry;
        out.push(v as u8);
        carry = v >> 8;
    }
    magnitude::truncate_to_bits(&mut out, wordsize);
    out
}

// ============================================================================
// Integer arithmetic: sign-magnitude
// ============================================================================

/// Signed addition over magnitudes: compare to pick add or subtract and
/// the result sign.
fn signed_add(
    xneg: bool,
    xmag: &Magnitude,
    yneg: bool,
    ymag: &Magnitude,
) -> (bool, Magnitude) {
    if xneg == yneg {
        (xneg, magnitude::add(xmag, ymag))
    } else {
        match magnitude::cmp(xmag, ymag) {
            Ordering::Equal => (false, Magnitude::new()),
            Ordering::Greater => (xneg, magnitude::sub(xmag, ymag)),
            Ordering::Less => (yneg, magnitude::sub(ymag, xmag)),
        }
    }
}

fn integer_binary(rt: &mut Runtime, op: Op, x: ObjRef, y: ObjRef) -> Result<ObjRef> {
    let (xneg, xmag) = int_parts(rt, x)?;
    let (yneg, ymag) = int_parts(rt, y)?;
    let max_bits = rt.settings.maxbignum;

    match op {
        Op::Add => {
            let (neg, mag) = signed_add(xneg, &xmag, yneg, &ymag);
            rt.heap.make_integer(neg, &mag)
        }
        Op::Sub => {
            let (neg, mag) = signed_add(xneg, &xmag, !yneg, &ymag);
            rt.heap.make_integer(neg, &mag)
        }
        Op::Mul => {
            let mag = bignum::mul_mag(&mut rt.heap, &xmag, &ymag, max_bits, 0)?;
            rt.heap.make_integer(xneg ^ yneg, &mag)
        }
        Op::Div => {
            if magnitude::is_zero(&ymag) {
                return Err(Error::ZeroDivide);
            }
            let (quot, rem) = bignum::divrem_mag(&mut rt.heap, &xmag, &ymag)?;
            if rem.is_empty() {
                rt.heap.make_integer(xneg ^ yneg, &quot)
            } else {
                make_reduced_fraction(rt, xneg ^ yneg, xmag, ymag)
            }
        }
        Op::Rem => {
            // Remainder takes the dividend's sign.
            let (_, rem) = bignum::divrem_mag(&mut rt.heap, &xmag, &ymag)?;
            rt.heap.make_integer(xneg && !rem.is_empty(), &rem)
        }
        Op::Mod => {
            // Floored modulo takes the divisor's sign.
            let (_, rem) = bignum::divrem_mag(&mut rt.heap, &xmag, &ymag)?;
            if rem.is_empty() {
                rt.heap.make_integer(false, &rem)
            } else if xneg == yneg {
                rt.heap.make_integer(xneg, &rem)
            } else {
                let flipped = magnitude::sub(&ymag, &rem);
                rt.heap.make_integer(yneg, &flipped)
            }
        }
        Op::Pow => {
            if yneg {
                // Negative exponent: reciprocal fraction.
                let mag = bignum::pow_mag(&mut rt.heap, &xmag, &ymag, max_bits, 0)?;
                if magnitude::is_zero(&mag) {
                    return Err(Error::ZeroDivide);
                }
                let neg = xneg && exponent_is_odd(&ymag);
                return make_reduced_fraction(rt, neg, magnitude::from_u64(1), mag);
            }
            let mag = bignum::pow_mag(&mut rt.heap, &xmag, &ymag, max_bits, 0)?;
            let neg = xneg && exponent_is_odd(&ymag);
            rt.heap.make_integer(neg, &mag)
        }
        Op::Min | Op::Max => {
            let cmp = signed_cmp(xneg, &xmag, yneg, &ymag);
            let take_x = (cmp != Ordering::Greater) == (op == Op::Min);
            Ok(if take_x { x } else { y })
        }
        _ => Err(Error::UndefinedOperation),
    }
}

fn exponent_is_odd(mag: &[u8]) -> bool {
    mag.first().is_some_and(|b| b & 1 != 0)
}

fn signed_cmp(xneg: bool, xmag: &[u8], yneg: bool, ymag: &[u8]) -> Ordering {
    match (xneg, yneg) {
        (false, true) => Ordering::Greater,
        (true, false) => Ordering::Less,
        (false, false) => magnitude::cmp(xmag, ymag),
        (true, true) => magnitude::cmp(ymag, xmag),
    }
}

/// Greatest common divisor by Euclid's algorithm over the division
/// kernel.
fn gcd_mag(rt: &mut Runtime, a: &Magnitude, b: &Magnitude) -> Result<Magnitude> {
    let mut a = a.clone();
    let mut b = b.clone();
    while !magnitude::is_zero(&b) {
        let (_, rem) = bignum::divrem_mag(&mut rt.heap, &a, &b)?;
        a = b;
        b = rem;
    }
    Ok(a)
}

/// Build a fraction in lowest terms, collapsing to an integer when the
/// denominator reduces to one.
fn make_reduced_fraction(
    rt: &mut Runtime,
    neg: bool,
    num: Magnitude,
    den: Magnitude,
) -> Result<ObjRef> {
    if magnitude::is_zero(&den) {
        return Err(Error::ZeroDivide);
    }
    if magnitude::is_zero(&num) {
        return rt.heap.make_int(0);
    }
    let gcd = gcd_mag(rt, &num, &den)?;
    let (num, _) = bignum::divrem_mag(&mut rt.heap, &num, &gcd)?;
    let (den, _) = bignum::divrem_mag(&mut rt.heap, &den, &gcd)?;
    if magnitude::to_u64(&den) == Some(1) {
        rt.heap.make_integer(neg, &num)
    } else {
        rt.heap.make_fraction(neg, &num, &den)
    }
}

// ============================================================================
// Fractions
// ============================================================================

fn fraction_binary(rt: &mut Runtime, op: Op, x: ObjRef, y: ObjRef) -> Result<ObjRef> {
    let (xneg, xn, xd) = frac_parts(rt, x)?;
    let (yneg, yn, yd) = frac_parts(rt, y)?;
    let max_bits = rt.settings.maxbignum;

    match op {
        Op::Add | Op::Sub => {
            let t1 = bignum::mul_mag(&mut rt.heap, &xn, &yd, max_bits, 0)?;
            let t2 = bignum::mul_mag(&mut rt.heap, &yn, &xd, max_bits, 0)?;
            let t2neg = yneg ^ (op == Op::Sub);
            let (neg, num) = signed_add(xneg, &t1, t2neg, &t2);
            let den = bignum::mul_mag(&mut rt.heap, &xd, &yd, max_bits, 0)?;
            make_reduced_fraction(rt, neg, num, den)
        }
        Op::Mul => {
            let num = bignum::mul_mag(&mut rt.heap, &xn, &yn, max_bits, 0)?;
            let den = bignum::mul_mag(&mut rt.heap, &xd, &yd, max_bits, 0)?;
            make_reduced_fraction(rt, xneg ^ yneg, num, den)
        }
        Op::Div => {
            if magnitude::is_zero(&yn) {
                return Err(Error::ZeroDivide);
            }
            let num = bignum::mul_mag(&mut rt.heap, &xn, &yd, max_bits, 0)?;
            let den = bignum::mul_mag(&mut rt.heap, &xd, &yn, max_bits, 0)?;
            make_reduced_fraction(rt, xneg ^ yneg, num, den)
        }
        Op::Pow => {
            // Integer exponents stay exact; everything else goes decimal.
            let yop = rt.heap.op_of(y)?;
            if !yop.is_integer() {
                return decimal_binary(rt, op, x, y);
            }
            let (eneg, emag) = int_parts(rt, y)?;
            let pn = bignum::pow_mag(&mut rt.heap, &xn, &emag, max_bits, 0)?;
            let pd = bignum::pow_mag(&mut rt.heap, &xd, &emag, max_bits, 0)?;
            let neg = xneg && exponent_is_odd(&emag);
            if eneg {
                if magnitude::is_zero(&pn) {
                    return Err(Error::ZeroDivide);
                }
                make_reduced_fraction(rt, neg, pd, pn)
            } else {
                make_reduced_fraction(rt, neg, pn, pd)
            }
        }
        Op::Min | Op::Max => {
            // The exact comparison allocates, so track both operands.
            let xpin = rt.heap.pin(x);
            let ypin = rt.heap.pin(y);
            let cmp = num_cmp(rt, x, y);
            let x = rt.heap.pinned(&xpin).expect("strong pin");
            let y = rt.heap.pinned(&ypin).expect("strong pin");
            rt.heap.unpin(ypin);
            rt.heap.unpin(xpin);
            let take_x = (cmp? != Ordering::Greater) == (op == Op::Min);
            Ok(if take_x { x } else { y })
        }
        Op::Mod | Op::Rem => decimal_binary(rt, op, x, y),
        _ => Err(Error::UndefinedOperation),
    }
}

// ============================================================================
// Decimals
// ============================================================================

fn decimal_binary(rt: &mut Runtime, op: Op, x: ObjRef, y: ObjRef) -> Result<ObjRef> {
    let xv = to_f64(rt, x)?;
    let yv = to_f64(rt, y)?;
    let value = match op {
        Op::Add => xv + yv,
        Op::Sub => xv - yv,
        Op::Mul => xv * yv,
        Op::Div => {
            if yv == 0.0 {
                return Err(Error::ZeroDivide);
            }
            xv / yv
        }
        Op::Rem => {
            if yv == 0.0 {
                return Err(Error::ZeroDivide);
            }
            xv % yv
        }
        Op::Mod => {
            if yv == 0.0 {
                return Err(Error::ZeroDivide);
            }
            xv - yv * (xv / yv).floor()
        }
        Op::Pow => xv.powf(yv),
        Op::Min => xv.min(yv),
        Op::Max => xv.max(yv),
        _ => return Err(Error::UndefinedOperation),
    };
    if value.is_nan() {
        return Err(Error::UndefinedOperation);
    }
    if value.is_infinite() {
        return Err(Error::ExponentRange);
    }
    rt.heap.make_decimal(value)
}

// ============================================================================
// Based numbers: modular at the session word size
// ============================================================================

fn based_binary(rt: &mut Runtime, op: Op, x: ObjRef, y: ObjRef) -> Result<ObjRef> {
    let xmag = based_parts(rt, x)?;
    let ymag = based_parts(rt, y)?;
    let wbits = rt.settings.wordsize;
    let max_bits = rt.settings.maxbignum;

    let mut result = match op {
        Op::Add => magnitude::add(&xmag, &ymag),
        Op::Sub => {
            // Wraparound subtraction through the two's complement.
            let neg_y = twos_complement(&ymag, wbits);
            magnitude::add(&xmag, &neg_y)
        }
        Op::Mul => bignum::mul_mag(&mut rt.heap, &xmag, &ymag, max_bits, wbits)?,
        Op::Div => {
            let (quot, _) = bignum::divrem_mag(&mut rt.heap, &xmag, &ymag)?;
            quot
        }
        Op::Rem | Op::Mod => {
            let (_, rem) = bignum::divrem_mag(&mut rt.heap, &xmag, &ymag)?;
            rem
        }
        Op::Pow => bignum::pow_mag(&mut rt.heap, &xmag, &ymag, max_bits, wbits)?,
        Op::Min | Op::Max => {
            let take_x =
                (magnitude::cmp(&xmag, &ymag) != Ordering::Greater) == (op == Op::Min);
            if take_x {
                xmag
            } else {
                ymag
            }
        }
        _ => return Err(Error::UndefinedOperation),
    };
    magnitude::truncate_to_bits(&mut result, wbits);
    rt.heap.make_based(&result)
}

/// Bitwise operations on the stored bytes, ignoring the sign.
pub fn based_bitwise(rt: &mut Runtime, op: Op, x: ObjRef, y: Option<ObjRef>) -> Result<ObjRef> {
    let wbits = rt.settings.wordsize;
    let wbytes = rt.settings.wordbytes();
    let xmag = based_parts(rt, x)?;
    let ymag = match y {
        Some(y) => based_parts(rt, y)?,
        None => Magnitude::new(),
    };
    let mut out = Magnitude::new();
    for i in 0..wbytes {
        let a = xmag.get(i).copied().unwrap_or(0);
        let b = ymag.get(i).copied().unwrap_or(0);
        out.push(match op {
            Op::And => a & b,
            Op::Or => a | b,
            Op::Xor => a ^ b,
            Op::Not => !a,
            _ => return Err(Error::UndefinedOperation),
        });
    }
    magnitude::truncate_to_bits(&mut out, wbits);
    rt.heap.make_based(&out)
}

// ============================================================================
// List and text concatenation
// ============================================================================

fn list_concat(rt: &mut Runtime, x: ObjRef, y: ObjRef) -> Result<ObjRef> {
    let mut children = Vec::new();
    for operand in [x, y] {
        if rt.heap.op_of(operand)? == Op::List {
            children.extend(rt.heap.children_of(operand)?);
        } else {
            children.push(operand);
        }
    }
    rt.heap.make_composite(Op::List, &children)
}

fn text_concat(rt: &mut Runtime, x: ObjRef, y: ObjRef) -> Result<ObjRef> {
    let mut out = String::new();
    for operand in [x, y] {
        if rt.heap.op_of(operand)? == Op::Text {
            out.push_str(rt.heap.str_value(operand)?);
        } else {
            out.push_str(&ripple_lang::render_to_string(
                &rt.heap,
                &rt.settings,
                operand,
            )?);
        }
    }
    rt.heap.make_str(Op::Text, &out)
}

// ============================================================================
// Complex numbers
// ============================================================================

/// Rectangular decimal view of a complex (or real) operand.
fn complex_parts(rt: &Runtime, obj: ObjRef) -> Result<(f64, f64)> {
    let op = rt.heap.op_of(obj)?;
    match op {
        Op::Rectangular => {
            let (re, im) = rt.heap.pair_of(obj)?;
            Ok((to_f64(rt, re)?, to_f64(rt, im)?))
        }
        Op::Polar => {
            let (modulus, arg) = rt.heap.pair_of(obj)?;
            let m = to_f64(rt, modulus)?;
            let a = transcend::to_radians(rt, to_f64(rt, arg)?);
            Ok((m * a.cos(), m * a.sin()))
        }
        _ => Ok((to_f64(rt, obj)?, 0.0)),
    }
}

fn make_rectangular(rt: &mut Runtime, re: f64, im: f64) -> Result<ObjRef> {
    if !re.is_finite() || !im.is_finite() {
        return Err(Error::ExponentRange);
    }
    // A vanished imaginary part demotes to a plain decimal.
    if im == 0.0 {
        return rt.heap.make_decimal(re);
    }
    let re_obj = rt.heap.make_decimal(re)?;
    let pin = rt.heap.pin(re_obj);
    let im_obj = rt.heap.make_decimal(im);
    let re_obj = rt.heap.pinned(&pin).expect("strong pin");
    rt.heap.unpin(pin);
    rt.heap.make_complex(Op::Rectangular, re_obj, im_obj?)
}

fn complex_binary(rt: &mut Runtime, op: Op, x: ObjRef, y: ObjRef) -> Result<ObjRef> {
    let (xr, xi) = complex_parts(rt, x)?;
    let (yr, yi) = complex_parts(rt, y)?;
    let (re, im) = match op {
        Op::Add => (xr + yr, xi + yi),
        Op::Sub => (xr - yr, xi - yi),
        Op::Mul => (xr * yr - xi * yi, xr * yi + xi * yr),
        Op::Div => {
            let d = yr * yr + yi * yi;
            if d == 0.0 {
                return Err(Error::ZeroDivide);
            }
            ((xr * yr + xi * yi) / d, (xi * yr - xr * yi) / d)
        }
        _ => return Err(Error::Unimplemented),
    };
    make_rectangular(rt, re, im)
}

pub(crate) fn complex_negate(rt: &mut Runtime, x: ObjRef) -> Result<ObjRef> {
    let (re, im) = complex_parts(rt, x)?;
    make_rectangular(rt, -re, -im)
}

pub(crate) fn complex_abs(rt: &mut Runtime, x: ObjRef) -> Result<ObjRef> {
    let (re, im) = complex_parts(rt, x)?;
    rt.heap.make_decimal(re.hypot(im))
}

// ============================================================================
// Unary helpers
// ============================================================================

fn negate(rt: &mut Runtime, x: ObjRef) -> Result<ObjRef> {
    let op = rt.heap.op_of(x)?;
    match op {
        _ if op.is_based() => {
            let mag = based_parts(rt, x)?;
            let mut flipped = twos_complement(&mag, rt.settings.wordsize);
            magnitude::truncate_to_bits(&mut flipped, rt.settings.wordsize);
            rt.heap.make_based(&flipped)
        }
        _ if op.is_integer() => {
            let (neg, mag) = int_parts(rt, x)?;
            if magnitude::is_zero(&mag) {
                return rt.heap.make_int(0);
            }
            rt.heap.make_integer(!neg, &mag)
        }
        _ if op.is_fraction() => {
            let (neg, num, den) = frac_parts(rt, x)?;
            rt.heap.make_fraction(!neg, &num, &den)
        }
        Op::Decimal => {
            let v = rt.heap.decimal_value(x)?;
            rt.heap.make_decimal(-v)
        }
        _ if op.is_complex() => complex_negate(rt, x),
        _ => Err(Error::Type),
    }
}

fn invert(rt: &mut Runtime, x: ObjRef) -> Result<ObjRef> {
    let op = rt.heap.op_of(x)?;
    match op {
        _ if op.is_integer() && !op.is_based() => {
            let (neg, mag) = int_parts(rt, x)?;
            make_reduced_fraction(rt, neg, magnitude::from_u64(1), mag)
        }
        _ if op.is_fraction() => {
            let (neg, num, den) = frac_parts(rt, x)?;
            make_reduced_fraction(rt, neg, den, num)
        }
        Op::Decimal => {
            let v = rt.heap.decimal_value(x)?;
            if v == 0.0 {
                return Err(Error::ZeroDivide);
            }
            rt.heap.make_decimal(1.0 / v)
        }
        _ if op.is_complex() => {
            let (re, im) = complex_parts(rt, x)?;
            let d = re * re + im * im;
            if d == 0.0 {
                return Err(Error::ZeroDivide);
            }
            make_rectangular(rt, re / d, -im / d)
        }
        _ => Err(Error::Type),
    }
}

fn absolute(rt: &mut Runtime, x: ObjRef) -> Result<ObjRef> {
    let op = rt.heap.op_of(x)?;
    match op {
        _ if op.is_based() => Ok(x),
        _ if op.is_integer() => {
            let (_, mag) = int_parts(rt, x)?;
            rt.heap.make_integer(false, &mag)
        }
        _ if op.is_fraction() => {
            let (_, num, den) = frac_parts(rt, x)?;
            rt.heap.make_fraction(false, &num, &den)
        }
        Op::Decimal => {
            let v = rt.heap.decimal_value(x)?;
            rt.heap.make_decimal(v.abs())
        }
        _ if op.is_complex() => complex_abs(rt, x),
        _ => Err(Error::Type),
    }
}

fn factorial(rt: &mut Runtime, x: ObjRef) -> Result<ObjRef> {
    let n = rt.to_i64(x)?;
    let decimal_in = rt.heap.op_of(x)? == Op::Decimal;
    if n < 0 {
        return Err(Error::Value);
    }
    let max_bits = rt.settings.maxbignum;
    let mut acc = magnitude::from_u64(1);
    for k in 2..=n as u64 {
        acc = bignum::mul_mag(&mut rt.heap, &acc, &magnitude::from_u64(k), max_bits, 0)?;
    }
    // A decimal argument yields a decimal result.
    if decimal_in {
        let v = mag_to_f64(&acc);
        if !v.is_finite() {
            return Err(Error::ExponentRange);
        }
        return rt.heap.make_decimal(v);
    }
    rt.heap.make_integer(false, &acc)
}

// ============================================================================
// Comparison
// ============================================================================

/// Numeric ordering across the real tower; based numbers compare
/// unsigned.
pub(crate) fn num_cmp(rt: &mut Runtime, x: ObjRef, y: ObjRef) -> Result<Ordering> {
    let xop = rt.heap.op_of(x)?;
    let yop = rt.heap.op_of(y)?;
    if xop.is_based() || yop.is_based() {
        if !xop.is_integer() || !yop.is_integer() {
            return Err(Error::Type);
        }
        let xmag = based_parts(rt, x)?;
        let ymag = based_parts(rt, y)?;
        return Ok(magnitude::cmp(&xmag, &ymag));
    }
    if xop == Op::Decimal || yop == Op::Decimal {
        let xv = to_f64(rt, x)?;
        let yv = to_f64(rt, y)?;
        return xv.partial_cmp(&yv).ok_or(Error::UndefinedOperation);
    }
    if (xop.is_fraction() || yop.is_fraction()) && xop.is_real() && yop.is_real() {
        // Cross-multiply for an exact comparison.
        let (xneg, xn, xd) = frac_parts(rt, x)?;
        let (yneg, yn, yd) = frac_parts(rt, y)?;
        let max_bits = rt.settings.maxbignum;
        let lhs = bignum::mul_mag(&mut rt.heap, &xn, &yd, max_bits, 0)?;
        let rhs = bignum::mul_mag(&mut rt.heap, &yn, &xd, max_bits, 0)?;
        return Ok(signed_cmp(xneg, &lhs, yneg, &rhs));
    }
    if xop.is_real() && yop.is_real() {
        let (xneg, xmag) = int_parts(rt, x)?;
        let (yneg, ymag) = int_parts(rt, y)?;
        return Ok(signed_cmp(xneg, &xmag, yneg, &ymag));
    }
    Err(Error::Type)
}

fn sign_of(rt: &Runtime, x: ObjRef) -> Result<i64> {
    let op = rt.heap.op_of(x)?;
    match op {
        Op::Decimal => {
            let v = rt.heap.decimal_value(x)?;
            Ok(if v > 0.0 {
                1
            } else if v < 0.0 {
                -1
            } else {
                0
            })
        }
        _ if op.is_integer() => {
            if rt.heap.is_zero_int(x)? {
                Ok(0)
            } else if op.is_neg() {
                Ok(-1)
            } else {
                Ok(1)
            }
        }
        _ if op.is_fraction() => Ok(if op.is_neg() { -1 } else { 1 }),
        _ => Err(Error::Type),
    }
}

/// Execute a comparison command, pushing 1 or 0.
pub fn compare_command(rt: &mut Runtime, op: Op) -> Result<()> {
    let y = rt.heap.pop()?;
    let x = rt.heap.pop()?;
    let xop = rt.heap.op_of(x)?;
    let yop = rt.heap.op_of(y)?;

    let flag = match op {
        Op::Same => rt.heap.obj_eq(x, y)?,
        Op::TestEq | Op::TestNe => {
            let equal = if xop == Op::Text && yop == Op::Text {
                rt.heap.str_value(x)? == rt.heap.str_value(y)?
            } else if numeric_comparable(xop) && numeric_comparable(yop) {
                num_cmp(rt, x, y)? == Ordering::Equal
            } else {
                rt.heap.obj_eq(x, y)?
            };
            equal == (op == Op::TestEq)
        }
        Op::TestLt | Op::TestLe | Op::TestGt | Op::TestGe => {
            let cmp = if xop == Op::Text && yop == Op::Text {
                rt.heap.str_value(x)?.cmp(rt.heap.str_value(y)?)
            } else {
                num_cmp(rt, x, y)?
            };
            match op {
                Op::TestLt => cmp == Ordering::Less,
                Op::TestLe => cmp != Ordering::Greater,
                Op::TestGt => cmp == Ordering::Greater,
                _ => cmp != Ordering::Less,
            }
        }
        _ => return Err(Error::UndefinedOperation),
    };
    rt.push_flag(flag)
}

fn numeric_comparable(op: Op) -> bool {
    op.is_real() || op.is_based()
}

/// Execute a logic command: bitwise on based operands, truth values on
/// everything else.
pub fn logic(rt: &mut Runtime, op: Op) -> Result<()> {
    if op == Op::Not {
        let x = rt.heap.pop()?;
        if rt.heap.op_of(x)?.is_based() {
            let result = based_bitwise(rt, op, x, None)?;
            return rt.heap.push(result);
        }
        let truth = rt.is_truthy(x)?;
        return rt.push_flag(!truth);
    }

    let y = rt.heap.pop()?;
    let x = rt.heap.pop()?;
    if rt.heap.op_of(x)?.is_based() && rt.heap.op_of(y)?.is_based() {
        let result = based_bitwise(rt, op, x, Some(y))?;
        return rt.heap.push(result);
    }
    let a = rt.is_truthy(x)?;
    let b = rt.is_truthy(y)?;
    let flag = match op {
        Op::And => a && b,
        Op::Or => a || b,
        Op::Xor => a ^ b,
        _ => return Err(Error::UndefinedOperation),
    };
    rt.push_flag(flag)
}
