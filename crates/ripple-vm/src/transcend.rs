//! Transcendental functions at binary64 precision, honoring the angle
//! mode for the trigonometric commands.

use ripple_core::{AngleMode, Error, Op, Result};
use ripple_mem::ObjRef;

use crate::arith;
use crate::machine::Runtime;

/// Convert an angle in the session mode to radians.
pub fn to_radians(rt: &Runtime, v: f64) -> f64 {
    match rt.settings.angle_mode {
        AngleMode::Radians => v,
        AngleMode::Degrees => v.to_radians(),
        AngleMode::Grads => v * std::f64::consts::PI / 200.0,
        AngleMode::PiRadians => v * std::f64::consts::PI,
    }
}

/// Convert radians back to the session angle mode.
pub fn from_radians(rt: &Runtime, v: f64) -> f64 {
    match rt.settings.angle_mode {
        AngleMode::Radians => v,
        AngleMode::Degrees => v.to_degrees(),
        AngleMode::Grads => v * 200.0 / std::f64::consts::PI,
        AngleMode::PiRadians => v / std::f64::consts::PI,
    }
}

/// Execute a one-argument transcendental on a real operand.
pub fn unary_decimal(rt: &mut Runtime, op: Op, x: ObjRef) -> Result<ObjRef> {
    let v = arith::to_f64(rt, x)?;
    let value = match op {
        Op::Sin => to_radians(rt, v).sin(),
        Op::Cos => to_radians(rt, v).cos(),
        Op::Tan => to_radians(rt, v).tan(),
        Op::Asin => {
            if !(-1.0..=1.0).contains(&v) {
                return Err(Error::Domain);
            }
            from_radians(rt, v.asin())
        }
        Op::Acos => {
            if !(-1.0..=1.0).contains(&v) {
                return Err(Error::Domain);
            }
            from_radians(rt, v.acos())
        }
        Op::Atan => from_radians(rt, v.atan()),
        Op::Exp => v.exp(),
        Op::Ln => {
            if v <= 0.0 {
                return Err(Error::Domain);
            }
            v.ln()
        }
        Op::Log => {
            if v <= 0.0 {
                return Err(Error::Domain);
            }
            v.log10()
        }
        Op::Sqrt => {
            if v < 0.0 {
                return Err(Error::Domain);
            }
            v.sqrt()
        }
        Op::Cbrt => v.cbrt(),
        _ => return Err(Error::Unimplemented),
    };
    if value.is_nan() {
        return Err(Error::UndefinedOperation);
    }
    if value.is_infinite() {
        return Err(Error::ExponentRange);
    }
    rt.heap.make_decimal(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_core::AngleMode;

    fn eval(rt: &mut Runtime, op: Op, v: f64) -> Result<f64> {
        let x = rt.heap.make_decimal(v).unwrap();
        let r = unary_decimal(rt, op, x)?;
        rt.heap.decimal_value(r)
    }

    #[test]
    fn sine_in_radians() {
        let mut rt = Runtime::new();
        let v = eval(&mut rt, Op::Sin, std::f64::consts::FRAC_PI_2).unwrap();
        assert!((v - 1.0).abs() < 1e-15);
    }

    #[test]
    fn sine_in_degrees() {
        let mut rt = Runtime::new();
        rt.settings.angle_mode = AngleMode::Degrees;
        let v = eval(&mut rt, Op::Sin, 90.0).unwrap();
        assert!((v - 1.0).abs() < 1e-15);
    }

    #[test]
    fn sine_in_grads() {
        let mut rt = Runtime::new();
        rt.settings.angle_mode = AngleMode::Grads;
        let v = eval(&mut rt, Op::Sin, 100.0).unwrap();
        assert!((v - 1.0).abs() < 1e-15);
    }

    #[test]
    fn sine_in_pi_radians() {
        let mut rt = Runtime::new();
        rt.settings.angle_mode = AngleMode::PiRadians;
        let v = eval(&mut rt, Op::Sin, 0.5).unwrap();
        assert!((v - 1.0).abs() < 1e-15);
    }

    #[test]
    fn inverse_respects_mode() {
        let mut rt = Runtime::new();
        rt.settings.angle_mode = AngleMode::Degrees;
        let v = eval(&mut rt, Op::Atan, 1.0).unwrap();
        assert!((v - 45.0).abs() < 1e-12);
    }

    #[test]
    fn domain_errors() {
        let mut rt = Runtime::new();
        assert_eq!(eval(&mut rt, Op::Asin, 2.0), Err(Error::Domain));
        assert_eq!(eval(&mut rt, Op::Ln, 0.0), Err(Error::Domain));
        assert_eq!(eval(&mut rt, Op::Sqrt, -1.0), Err(Error::Domain));
    }

    #[test]
    fn cube_root_of_negative() {
        let mut rt = Runtime::new();
        let v = eval(&mut rt, Op::Cbrt, -8.0).unwrap();
        assert!((v + 2.0).abs() < 1e-15);
    }

    #[test]
    fn exp_overflow() {
        let mut rt = Runtime::new();
        assert_eq!(eval(&mut rt, Op::Exp, 1e9), Err(Error::ExponentRange));
    }

    #[test]
    fn works_on_integers_and_fractions() {
        let mut rt = Runtime::new();
        let x = rt.heap.make_int(0).unwrap();
        let r = unary_decimal(&mut rt, Op::Cos, x).unwrap();
        assert_eq!(rt.heap.decimal_value(r).unwrap(), 1.0);

        let half = rt
            .heap
            .make_fraction(
                false,
                &ripple_core::magnitude::from_u64(1),
                &ripple_core::magnitude::from_u64(2),
            )
            .unwrap();
        let r = unary_decimal(&mut rt, Op::Exp, half).unwrap();
        let v = rt.heap.decimal_value(r).unwrap();
        assert!((v - 0.5f64.exp()).abs() < 1e-15);
    }
}
