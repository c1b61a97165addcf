//! Arithmetic across the numeric tower, including the randomized law
//! checks over bignums and fractions.

use super::{assert_error, assert_top, eval_to_strings, XorShift};
use ripple::Error;

#[test]
fn seed_addition() {
    assert_top("123 456 +", "579");
}

#[test]
fn seed_factorial() {
    assert_top("10 fact", "3628800");
    assert_top("10 !", "3628800");
}

#[test]
fn integer_basics() {
    assert_top("5 3 -", "2");
    assert_top("3 5 -", "-2");
    assert_top("-4 -6 +", "-10");
    assert_top("7 -2 *", "-14");
    assert_top("0 5 *", "0");
    assert_top("5 neg", "-5");
    assert_top("-5 abs", "5");
    assert_top("-5 sign", "-1");
    assert_top("0 sign", "0");
}

#[test]
fn exact_rational_division() {
    assert_top("84 2 /", "42");
    assert_top("3 4 /", "3/4");
    assert_top("-6 4 /", "-3/2");
    assert_top("2 inv", "1/2");
}

#[test]
fn fraction_arithmetic() {
    assert_top("1/2 1/3 +", "5/6");
    assert_top("1/2 1/3 -", "1/6");
    assert_top("2/3 3/4 *", "1/2");
    assert_top("1/2 1/4 /", "2");
    assert_top("3/4 2 ^", "9/16");
    assert_top("1/2 -2 ^", "4");
    // Denominator one collapses to an integer.
    assert_top("1/2 1/2 +", "1");
    assert_top("4/8 2 *", "1");
}

#[test]
fn decimal_arithmetic() {
    assert_top("1.5 2.5 +", "4.");
    assert_top("1 2.5 +", "3.5");
    assert_top("10. 4. /", "2.5");
    assert_top("2. 10 ^", "1024.");
    assert_top("3.7 2 min", "2");
    assert_top("3.7 2 max", "3.7");
}

#[test]
fn powers() {
    assert_top("2 10 ^", "1024");
    assert_top("2 0 ^", "1");
    assert_top("-2 3 ^", "-8");
    assert_top("-2 2 ^", "4");
    assert_top("2 -3 ^", "1/8");
    assert_top("2 100 ^", "1267650600228229401496703205376");
}

#[test]
fn number_too_big() {
    // The default bignum cap stops runaway results.
    assert_error("2 100000 ^", Error::NumberTooBig);
}

#[test]
fn complex_arithmetic() {
    assert_top("(1;2) (3;4) +", "(4.;6.)");
    assert_top("(1;2) (3;4) *", "(-5.;10.)");
    assert_top("(0;1) (0;1) *", "-1.");
    assert_top("(3;4) abs", "5.");
    assert_top("(1;2) neg", "(-1.;-2.)");
}

#[test]
fn transcendentals() {
    assert_top("0 sin", "0.");
    assert_top("0 cos", "1.");
    assert_top("1 exp ln 1 - abs 1E-12 <", "1");
    assert_top("100 log", "2.");
    assert_top("27 ∛", "3.");
    assert_top("1 tan⁻¹ 4 *", "3.141592653589793");
}

#[test]
fn angle_modes() {
    assert_top("deg 90 sin", "1.");
    assert_top("grad 100 sin", "1.");
    assert_top("deg 1 tan⁻¹ 45 - abs 1E-9 <", "1");
}

#[test]
fn commutativity_and_associativity() {
    let mut rng = XorShift::new(0xB1C2_D3E4);
    for _ in 0..40 {
        // Operands big enough to exercise the bignum path.
        let a = rng.next() >> 8;
        let b = rng.next() >> 8;
        let c = rng.below(1 << 20);

        let plus_ab = eval_to_strings(&format!("{} {} +", a, b));
        let plus_ba = eval_to_strings(&format!("{} {} +", b, a));
        assert_eq!(plus_ab, plus_ba, "a+b = b+a for {} {}", a, b);

        let mul_ab = eval_to_strings(&format!("{} {} *", a, b));
        let mul_ba = eval_to_strings(&format!("{} {} *", b, a));
        assert_eq!(mul_ab, mul_ba, "a·b = b·a for {} {}", a, b);

        let assoc1 = eval_to_strings(&format!("{} {} + {} +", a, b, c));
        let assoc2 = eval_to_strings(&format!("{} {} {} + +", a, b, c));
        assert_eq!(assoc1, assoc2, "(a+b)+c = a+(b+c) for {} {} {}", a, b, c);
    }
}

#[test]
fn distributivity() {
    let mut rng = XorShift::new(0x5EED);
    for _ in 0..40 {
        let a = rng.below(1 << 40);
        let b = rng.below(1 << 40);
        let c = rng.below(1 << 40);
        let lhs = eval_to_strings(&format!("{} {} {} + *", a, b, c));
        let rhs = eval_to_strings(&format!("{} {} * {} {} * +", a, b, a, c));
        assert_eq!(lhs, rhs, "a·(b+c) = a·b+a·c for {} {} {}", a, b, c);
    }
}

#[test]
fn quotient_remainder_identity() {
    let mut rng = XorShift::new(0xD1CE);
    for _ in 0..60 {
        let a = rng.next() as i64 >> 2;
        let b = (rng.below(1 << 30) as i64 + 1) * if rng.below(2) == 0 { 1 } else { -1 };
        // (a - a rem b) / b · b + a rem b = a, and rem's sign follows a.
        let identity = eval_to_strings(&format!(
            "{a} {a} {b} rem - {b} / {b} * {a} {b} rem + {a} ==",
            a = a,
            b = b
        ));
        assert_eq!(identity.last().unwrap(), "1", "identity for {} {}", a, b);

        let rem = eval_to_strings(&format!("{} {} rem sign", a, b));
        let expected = (a % b).signum().to_string();
        assert_eq!(rem.last().unwrap(), &expected, "rem sign for {} {}", a, b);
    }
}

#[test]
fn power_law_over_exponent_sums() {
    let mut rng = XorShift::new(0xFACE);
    for _ in 0..20 {
        let a = rng.below(30) + 2;
        let b = rng.below(12);
        let c = rng.below(12);
        let lhs = eval_to_strings(&format!("{} {} {} + ^", a, b, c));
        let rhs = eval_to_strings(&format!("{} {} ^ {} {} ^ *", a, b, a, c));
        assert_eq!(lhs, rhs, "a^(b+c) = a^b·a^c for {} {} {}", a, b, c);
    }
}

#[test]
fn fraction_laws() {
    let mut rng = XorShift::new(0xF2AC);
    for _ in 0..40 {
        let (an, ad) = (rng.below(500) + 1, rng.below(500) + 1);
        let (bn, bd) = (rng.below(500) + 1, rng.below(500) + 1);
        let lhs = eval_to_strings(&format!("{}/{} {}/{} +", an, ad, bn, bd));
        let rhs = eval_to_strings(&format!("{}/{} {}/{} +", bn, bd, an, ad));
        assert_eq!(lhs, rhs, "fraction commutativity");

        // Multiplying by the inverse cancels exactly.
        let one = eval_to_strings(&format!("{n}/{d} {d}/{n} *", n = an, d = ad));
        assert_eq!(one.last().unwrap(), "1");
    }
}

#[test]
fn comparisons() {
    assert_top("1 2 <", "1");
    assert_top("1/2 0.5 ==", "1");
    assert_top("1/3 0.5 <", "1");
    assert_top("2 3/2 >", "1");
    assert_top("\"abc\" \"abd\" <", "1");
    assert_top("2 100 ^ 2 99 ^ >", "1");
}
