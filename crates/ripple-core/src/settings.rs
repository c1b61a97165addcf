//! Session settings affecting parse, render and evaluation.
//!
//! One flat struct; changes take effect on the next operation. The struct
//! serializes with serde so sessions can persist their configuration.

use serde::{Deserialize, Serialize};

/// How command names are rendered.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum CommandCase {
    /// `dup`
    #[default]
    Lower,
    /// `DUP`
    Upper,
    /// `Dup`
    Capitalized,
    /// `Duplicate`
    LongForm,
}

/// Interpretation of angles by the trigonometric commands.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum AngleMode {
    Degrees,
    #[default]
    Radians,
    Grads,
    /// Angles expressed as multiples of π.
    PiRadians,
}

/// Decimal display format.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum DisplayMode {
    /// Shortest representation that round-trips.
    #[default]
    Standard,
    /// Fixed number of fractional digits.
    Fix,
    /// Scientific notation.
    Sci,
    /// Engineering notation (exponent a multiple of 3).
    Eng,
    /// Fixed number of significant digits.
    Sig,
}

/// All tunable parameters in one place.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Settings {
    /// Display and entry base for based numbers: 2, 8, 10 or 16.
    pub base: u32,
    /// Word size in bits for based arithmetic (1..=1024).
    pub wordsize: u32,
    pub angle_mode: AngleMode,
    pub display_mode: DisplayMode,
    /// Digit count for Fix/Sci/Eng/Sig display.
    pub precision: u32,
    pub exponent_mark: char,
    pub decimal_mark: char,
    /// Digits between separators in the integer part (0 = no grouping).
    pub spacing_mantissa: u32,
    /// Digits between separators in the fractional part.
    pub spacing_fraction: u32,
    /// Digits between separators in based numbers.
    pub spacing_based: u32,
    /// Separator glyph for decimal grouping.
    pub space: char,
    /// Separator glyph for based grouping.
    pub space_based: char,
    pub command_case: CommandCase,
    /// Cap on bignum results, in bits.
    pub maxbignum: u32,
    /// Cap on rule applications per top-level rewrite call.
    pub maxrewrites: u32,
    /// Continued-fraction iterations for `→Q`.
    pub frac_iterations: u32,
    /// Run the simplification battery on freshly built expressions.
    pub auto_simplify: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base: 16,
            wordsize: 64,
            angle_mode: AngleMode::default(),
            display_mode: DisplayMode::default(),
            precision: 12,
            exponent_mark: 'E',
            decimal_mark: '.',
            spacing_mantissa: 0,
            spacing_fraction: 0,
            spacing_based: 4,
            space: ' ',
            space_based: '_',
            command_case: CommandCase::default(),
            maxbignum: 4096,
            maxrewrites: 1000,
            frac_iterations: 20,
            auto_simplify: true,
        }
    }
}

impl Settings {
    /// Exponent marks accepted on parse (the configured one plus both
    /// ASCII cases and the calculator glyph).
    pub fn is_exponent_mark(&self, c: char) -> bool {
        c == self.exponent_mark || c == 'e' || c == 'E' || c == '⁳'
    }

    /// Word size in whole bytes.
    pub fn wordbytes(&self) -> usize {
        (self.wordsize as usize + 7) / 8
    }
}
