//! Based numbers: fixed-word-size arithmetic and bitwise operations.

use super::{assert_top, eval_to_strings, XorShift};

#[test]
fn seed_bitwise_and() {
    assert_top("16 stws #FF #F0 and", "#F0h");
}

#[test]
fn literals_in_every_base() {
    assert_top("#1010b", "#Ah");
    assert_top("#777o", "#1FFh");
    assert_top("#255d", "#FFh");
    assert_top("#FFh", "#FFh");
}

#[test]
fn display_base_follows_settings() {
    assert_top("#255d bin", "#1111_1111b");
    assert_top("#FF oct", "#377o");
    assert_top("#FF dec", "#255d");
}

#[test]
fn bitwise_operations() {
    assert_top("#F0F0 #0FF0 or", "#FFF0h");
    assert_top("#F0F0 #0FF0 xor", "#FF00h");
    assert_top("8 stws #F0 not", "#Fh");
}

#[test]
fn modular_arithmetic_wraps() {
    assert_top("8 stws #FF #1 +", "#0h");
    assert_top("8 stws #80 #2 *", "#0h");
    assert_top("8 stws #1 #2 -", "#FFh");
    assert_top("4 stws #F #1 +", "#0h");
}

#[test]
fn division_on_based() {
    assert_top("#64 #A /", "#Ah");
    assert_top("#65 #A rem", "#1h");
}

#[test]
fn word_size_commands() {
    assert_top("rcws", "64");
    assert_top("12 stws rcws", "12");
}

#[test]
fn mixed_with_plain_integers() {
    assert_top("#10 1 +", "#11h");
    assert_top("8 stws #10 -1 +", "#Fh");
}

#[test]
fn fixed_word_ops_agree_with_u128_model() {
    let mut rng = XorShift::new(0xBA5E);
    for &wordsize in &[8u32, 16, 24, 32, 48] {
        let mask = (1u128 << wordsize) - 1;
        for _ in 0..25 {
            let a = rng.next() as u128 & mask;
            let b = rng.next() as u128 & mask;

            let sum = eval_to_strings(&format!(
                "{} stws dec #{}d #{}d + →Num",
                wordsize, a, b
            ));
            assert_eq!(
                sum.last().unwrap(),
                &format!("{}.", (a + b) & mask),
                "add mod 2^{} for {} {}",
                wordsize,
                a,
                b
            );

            let prod = eval_to_strings(&format!(
                "{} stws dec #{}d #{}d · →Num",
                wordsize, a, b
            ));
            assert_eq!(
                prod.last().unwrap(),
                &format!("{}.", (a * b) & mask),
                "mul mod 2^{} for {} {}",
                wordsize,
                a,
                b
            );
        }
    }
}
