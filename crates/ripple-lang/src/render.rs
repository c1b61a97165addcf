//! The renderer: any object to text, driven by the settings.
//!
//! Rendering is the inverse of parsing up to display-only settings:
//! capitalization, digit grouping and number formats may differ, but the
//! parsed result is the same object.

use ripple_core::magnitude::{self, Magnitude};
use ripple_core::{CommandCase, DisplayMode, Error, Op, Result, Settings};
use ripple_mem::{Heap, ObjRef};

use crate::sink::{BufferSink, Sink};

/// Render `r` into `sink`.
pub fn render(heap: &Heap, settings: &Settings, r: ObjRef, sink: &mut dyn Sink) -> Result<()> {
    let mut renderer = Renderer {
        heap,
        settings,
        locals: Vec::new(),
    };
    let text = renderer.obj_text(r)?;
    sink.put_str(&text);
    Ok(())
}

/// Render `r` to an owned string.
pub fn render_to_string(heap: &Heap, settings: &Settings, r: ObjRef) -> Result<String> {
    let mut sink = BufferSink::new();
    render(heap, settings, r, &mut sink)?;
    Ok(sink.into_string())
}

struct Renderer<'a> {
    heap: &'a Heap,
    settings: &'a Settings,
    /// Locals scopes entered while descending, innermost last. Resolves
    /// `local` slot indices back to their names.
    locals: Vec<Vec<String>>,
}

impl Renderer<'_> {
    fn obj_text(&mut self, r: ObjRef) -> Result<String> {
        let op = self.heap.op_of(r)?;
        match op {
            Op::Integer | Op::NegInteger | Op::Bignum | Op::NegBignum => self.integer_text(r, op),
            Op::BasedInteger | Op::BasedBignum => self.based_text(r),
            Op::Fraction | Op::NegFraction | Op::BigFraction | Op::NegBigFraction => {
                self.fraction_text(r, op)
            }
            Op::Decimal => Ok(self.decimal_text(self.heap.decimal_value(r)?)),
            Op::Rectangular | Op::Polar => self.complex_text(r, op),
            Op::Symbol => Ok(self.heap.str_value(r)?.to_string()),
            Op::Expression => {
                let body = self.infix_text(r)?;
                Ok(format!("'{}'", body))
            }
            Op::Text => Ok(format!("\"{}\"", self.heap.str_value(r)?)),
            Op::Comment => Ok(format!("@{}\n", self.heap.str_value(r)?)),
            Op::List => self.sequence_text(r, "{ ", " }"),
            Op::Array => self.sequence_text(r, "[ ", " ]"),
            Op::Program => self.sequence_text(r, "« ", " »"),
            Op::Block => {
                let parts = self.children_text(r)?;
                Ok(parts.join(" "))
            }
            Op::Tagged => self.tagged_text(r),
            Op::Grob => self.grob_text(r),
            Op::Directory => self.directory_text(r),
            Op::Locals => self.locals_text(r),
            Op::Local => {
                let index = self.heap.local_index(r)?;
                self.local_name(index).map(str::to_string)
            }
            _ if op.is_control() => self.control_text(r, op),
            _ if op.is_command() => Ok(self.command_name(op)),
            _ => Err(Error::InvalidObject),
        }
    }

    // ========================================================================
    // Numbers
    // ========================================================================

    /// Digits of a magnitude in `base`, grouped every `spacing` digits by
    /// `sep`. Digits come out of the division least-significant first;
    /// the reversal works on code points so multibyte separators survive.
    fn digits_text(&self, mut mag: Magnitude, base: u32, spacing: u32, sep: char) -> String {
        if magnitude::is_zero(&mag) {
            return "0".to_string();
        }
        let mut out = String::new();
        let mut count = 0;
        while !mag.is_empty() {
            let digit = magnitude::divmod_small(&mut mag, base);
            out.push(char::from_digit(digit, base).expect("digit below base").to_ascii_uppercase());
            count += 1;
            if spacing > 0 && count % spacing == 0 && !mag.is_empty() {
                out.push(sep);
            }
        }
        out.chars().rev().collect()
    }

    fn integer_text(&self, r: ObjRef, op: Op) -> Result<String> {
        let mag = self.heap.magnitude_of(r)?;
        let digits = self.digits_text(
            mag,
            10,
            self.settings.spacing_mantissa,
            self.settings.space,
        );
        Ok(if op.is_neg() {
            format!("-{}", digits)
        } else {
            digits
        })
    }

    fn based_text(&self, r: ObjRef) -> Result<String> {
        let mag = self.heap.magnitude_of(r)?;
        let digits = self.digits_text(
            mag,
            self.settings.base,
            self.settings.spacing_based,
            self.settings.space_based,
        );
        let suffix = match self.settings.base {
            2 => 'b',
            8 => 'o',
            10 => 'd',
            _ => 'h',
        };
        Ok(format!("#{}{}", digits, suffix))
    }

    fn fraction_text(&self, r: ObjRef, op: Op) -> Result<String> {
        let (num, den) = self.heap.pair_of(r)?;
        let num = self.digits_text(
            self.heap.magnitude_of(num)?,
            10,
            self.settings.spacing_mantissa,
            self.settings.space,
        );
        let den = self.digits_text(
            self.heap.magnitude_of(den)?,
            10,
            self.settings.spacing_mantissa,
            self.settings.space,
        );
        Ok(if op.is_neg() {
            format!("-{}/{}", num, den)
        } else {
            format!("{}/{}", num, den)
        })
    }

    fn decimal_text(&self, value: f64) -> String {
        let settings = self.settings;
        let prec = settings.precision as usize;
        let mut text = match settings.display_mode {
            DisplayMode::Standard => {
                let mut s = format!("{}", value);
                if !s.contains('.') && !s.contains('e') && !s.contains("inf") && !s.contains("NaN")
                {
                    s.push('.');
                }
                s
            }
            DisplayMode::Fix => format!("{:.*}", prec, value),
            DisplayMode::Sci => format!("{:.*e}", prec, value),
            DisplayMode::Sig => {
                let rounded: f64 = format!("{:.*e}", prec.saturating_sub(1), value)
                    .parse()
                    .unwrap_or(value);
                let mut s = format!("{}", rounded);
                if !s.contains('.') && !s.contains('e') {
                    s.push('.');
                }
                s
            }
            DisplayMode::Eng => {
                if value == 0.0 || !value.is_finite() {
                    format!("{:.*e}", prec, value)
                } else {
                    let exp = value.abs().log10().floor() as i32;
                    let eng = 3 * (exp as f64 / 3.0).floor() as i32;
                    let mantissa = value / 10f64.powi(eng);
                    format!("{:.*}e{}", prec, mantissa, eng)
                }
            }
        };
        if settings.spacing_mantissa > 0 || settings.spacing_fraction > 0 {
            text = self.group_decimal(&text);
        }
        if settings.decimal_mark != '.' {
            text = text.replace('.', &settings.decimal_mark.to_string());
        }
        if settings.exponent_mark != 'e' {
            text = text.replace('e', &settings.exponent_mark.to_string());
        }
        text
    }

    /// Insert grouping separators into a plain `int[.frac][e…]` image:
    /// the integer digits group from the right, fractional from the left.
    fn group_decimal(&self, text: &str) -> String {
        let settings = self.settings;
        let (mantissa, exponent) = match text.find('e') {
            Some(i) => text.split_at(i),
            None => (text, ""),
        };
        let (int_part, frac_part) = match mantissa.find('.') {
            Some(i) => (&mantissa[..i], &mantissa[i + 1..]),
            None => (mantissa, ""),
        };
        let (sign, digits) = match int_part.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", int_part),
        };

        let mut out = String::from(sign);
        let spacing = settings.spacing_mantissa as usize;
        for (i, c) in digits.chars().enumerate() {
            let remaining = digits.len() - i;
            out.push(c);
            if spacing > 0 && remaining > 1 && (remaining - 1) % spacing == 0 {
                out.push(settings.space);
            }
        }
        if mantissa.contains('.') {
            out.push('.');
            let spacing = settings.spacing_fraction as usize;
            for (i, c) in frac_part.chars().enumerate() {
                if spacing > 0 && i > 0 && i % spacing == 0 {
                    out.push(settings.space);
                }
                out.push(c);
            }
        }
        out.push_str(exponent);
        out
    }

    fn complex_text(&mut self, r: ObjRef, op: Op) -> Result<String> {
        let (first, second) = self.heap.pair_of(r)?;
        let first = self.obj_text(first)?;
        let second = self.obj_text(second)?;
        Ok(match op {
            Op::Polar => format!("({}∡{})", first, second),
            _ => format!("({};{})", first, second),
        })
    }

    // ========================================================================
    // Composites
    // ========================================================================

    fn children_text(&mut self, r: ObjRef) -> Result<Vec<String>> {
        let children = self.heap.children_of(r)?;
        children.into_iter().map(|c| self.obj_text(c)).collect()
    }

    fn sequence_text(&mut self, r: ObjRef, open: &str, close: &str) -> Result<String> {
        let parts = self.children_text(r)?;
        if parts.is_empty() {
            let mut s = open.trim_end().to_string();
            s.push_str(close.trim_start());
            return Ok(s);
        }
        Ok(format!("{}{}{}", open, parts.join(" "), close))
    }

    fn tagged_text(&mut self, r: ObjRef) -> Result<String> {
        let children = self.heap.children_of(r)?;
        if children.len() != 2 {
            return Err(Error::InvalidObject);
        }
        let label = self.heap.str_value(children[0])?.to_string();
        let obj = self.obj_text(children[1])?;
        Ok(format!(":{}: {}", label, obj))
    }

    fn grob_text(&self, r: ObjRef) -> Result<String> {
        let (w, h, data) = self.heap.grob_parts(r)?;
        let mut hex = String::with_capacity(data.len() * 2);
        for byte in data {
            hex.push_str(&format!("{:02X}", byte));
        }
        Ok(format!("{} {} {} {}", self.keyword("grob"), w, h, hex))
    }

    fn directory_text(&mut self, r: ObjRef) -> Result<String> {
        let parts = self.children_text(r)?;
        if parts.is_empty() {
            return Ok(format!("{} {{}}", self.keyword("directory")));
        }
        Ok(format!("{} {{ {} }}", self.keyword("directory"), parts.join(" ")))
    }

    fn locals_text(&mut self, r: ObjRef) -> Result<String> {
        let (names, body) = self.heap.locals_parts(r)?;
        let names: Vec<String> = names
            .iter()
            .map(|&n| self.heap.str_value(n).map(str::to_string))
            .collect::<Result<_>>()?;
        self.locals.push(names.clone());
        let body = self.obj_text(body);
        self.locals.pop();
        Ok(format!("→ {} {}", names.join(" "), body?))
    }

    fn local_name(&self, index: usize) -> Result<&str> {
        let mut idx = index;
        for scope in self.locals.iter().rev() {
            if idx < scope.len() {
                return Ok(&scope[idx]);
            }
            idx -= scope.len();
        }
        Err(Error::InvalidLocal)
    }

    fn control_text(&mut self, r: ObjRef, op: Op) -> Result<String> {
        let children = self.heap.children_of(r)?;
        match op {
            Op::IfThen | Op::IfThenElse | Op::IfErrThen | Op::IfErrThenElse => {
                let opening = if matches!(op, Op::IfThen | Op::IfThenElse) {
                    self.keyword("if")
                } else {
                    self.keyword("iferr")
                };
                let mut out = format!(
                    "{} {} {} {}",
                    opening,
                    self.obj_text(children[0])?,
                    self.keyword("then"),
                    self.obj_text(children[1])?
                );
                if matches!(op, Op::IfThenElse | Op::IfErrThenElse) {
                    out.push_str(&format!(
                        " {} {}",
                        self.keyword("else"),
                        self.obj_text(children[2])?
                    ));
                }
                out.push_str(&format!(" {}", self.keyword("end")));
                Ok(out)
            }
            Op::DoUntil => Ok(format!(
                "{} {} {} {} {}",
                self.keyword("do"),
                self.obj_text(children[0])?,
                self.keyword("until"),
                self.obj_text(children[1])?,
                self.keyword("end")
            )),
            Op::WhileRepeat => Ok(format!(
                "{} {} {} {} {}",
                self.keyword("while"),
                self.obj_text(children[0])?,
                self.keyword("repeat"),
                self.obj_text(children[1])?,
                self.keyword("end")
            )),
            Op::StartNext | Op::StartStep => {
                let tail = if op == Op::StartStep {
                    self.keyword("step")
                } else {
                    self.keyword("next")
                };
                Ok(format!(
                    "{} {} {}",
                    self.keyword("start"),
                    self.obj_text(children[0])?,
                    tail
                ))
            }
            Op::ForNext | Op::ForStep => {
                let name = self.heap.str_value(children[0])?.to_string();
                self.locals.push(vec![name.clone()]);
                let body = self.obj_text(children[1]);
                self.locals.pop();
                let tail = if op == Op::ForStep {
                    self.keyword("step")
                } else {
                    self.keyword("next")
                };
                Ok(format!(
                    "{} {} {} {}",
                    self.keyword("for"),
                    name,
                    body?,
                    tail
                ))
            }
            _ => Err(Error::InvalidObject),
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// Infix the postfix children of an expression, parenthesizing an
    /// operand only when its own precedence is lower than its context.
    fn infix_text(&mut self, expr: ObjRef) -> Result<String> {
        let children = self.heap.children_of(expr)?;
        let mut stack: Vec<(String, u8)> = Vec::new();
        for child in children {
            let op = self.heap.op_of(child)?;
            if op == Op::Expression {
                let inner = self.infix_text(child)?;
                stack.push((format!("({})", inner), ripple_core::opcode::prec::ATOM));
            } else if op.is_command() {
                self.infix_command(op, &mut stack)?;
            } else {
                let text = self.obj_text(child)?;
                let prec = if text.starts_with('-') {
                    ripple_core::opcode::prec::UNARY
                } else {
                    ripple_core::opcode::prec::ATOM
                };
                stack.push((text, prec));
            }
        }
        if stack.len() != 1 {
            return Err(Error::InvalidObject);
        }
        Ok(stack.pop().expect("checked").0)
    }

    fn infix_command(&mut self, op: Op, stack: &mut Vec<(String, u8)>) -> Result<()> {
        use ripple_core::opcode::prec;

        let pop = |stack: &mut Vec<(String, u8)>| stack.pop().ok_or(Error::InvalidObject);

        if op.is_binary_infix() {
            let p = op.precedence();
            let (rhs, rp) = pop(stack)?;
            let (lhs, lp) = pop(stack)?;
            let right_assoc = op.is_right_assoc();
            let lhs = if lp < p || (lp == p && right_assoc) {
                format!("({})", lhs)
            } else {
                lhs
            };
            let rhs = if rp < p || (rp == p && !right_assoc) {
                format!("({})", rhs)
            } else {
                rhs
            };
            // Alphabetic operators (mod, and, ...) need surrounding
            // spaces to survive reparsing.
            let spelling = op.info().name;
            let text = if spelling.chars().next().is_some_and(|c| c.is_alphabetic()) {
                format!("{} {} {}", lhs, self.apply_case(spelling), rhs)
            } else {
                format!("{}{}{}", lhs, spelling, rhs)
            };
            stack.push((text, p));
            return Ok(());
        }

        match op {
            Op::Neg => {
                let (operand, p) = pop(stack)?;
                // Parenthesize a leading '-' so "--5" never appears.
                let operand = if p < prec::UNARY || operand.starts_with('-') {
                    format!("({})", operand)
                } else {
                    operand
                };
                stack.push((format!("-{}", operand), prec::UNARY));
            }
            Op::Fact => {
                let (operand, p) = pop(stack)?;
                let operand = if p < prec::POSTFIX {
                    format!("({})", operand)
                } else {
                    operand
                };
                stack.push((format!("{}!", operand), prec::POSTFIX));
            }
            _ if op.is_algebraic_function() => {
                let (operand, _) = pop(stack)?;
                stack.push((
                    format!("{}({})", self.command_name(op), operand),
                    prec::ATOM,
                ));
            }
            _ if op.info().arity == 2 => {
                // Two-argument commands (min, max) call-render.
                let (second, _) = pop(stack)?;
                let (first, _) = pop(stack)?;
                stack.push((
                    format!("{}({};{})", self.command_name(op), first, second),
                    prec::ATOM,
                ));
            }
            _ => {
                // Zero-argument commands (π) are atoms.
                stack.push((self.command_name(op), prec::ATOM));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Spellings
    // ========================================================================

    /// Canonical spelling of a command, transformed by the case setting.
    /// Only alphabetic spellings transform; `+` stays `+`.
    fn command_name(&self, op: Op) -> String {
        let info = op.info();
        if self.settings.command_case == CommandCase::LongForm && !info.long.is_empty() {
            return info.long.to_string();
        }
        self.apply_case(info.name)
    }

    /// Case transform for structure keywords (`if`, `then`, ...).
    fn keyword(&self, word: &str) -> String {
        self.apply_case(word)
    }

    fn apply_case(&self, word: &str) -> String {
        if !word.chars().next().is_some_and(|c| c.is_alphabetic()) {
            return word.to_string();
        }
        match self.settings.command_case {
            CommandCase::Lower => word.to_string(),
            CommandCase::Upper => word.to_uppercase(),
            CommandCase::Capitalized | CommandCase::LongForm => {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        }
    }
}
