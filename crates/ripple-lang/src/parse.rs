//! The parser: UTF-8 text to objects, built directly into the heap.
//!
//! Top-level recursive descent. Object kinds are attempted in a fixed
//! order because prefixes overlap: comments and text first, then based
//! numbers behind `#`, then numbers (which own a leading `-` only when a
//! digit follows), the delimited kinds, and finally bare words, which
//! resolve to structure keywords, commands, locals in scope, or symbols,
//! in that order.
//!
//! Parse errors carry the byte offset where they were detected.

use ripple_core::magnitude::{self, Magnitude};
use ripple_core::{Error, ErrorState, Op, Pos, Settings};
use ripple_mem::{Heap, ObjRef, PinHandle};

/// Parse result carrying a positioned error.
pub type PResult<T> = std::result::Result<T, ErrorState>;

/// Parse a single object from `src`, returning it and the bytes consumed.
pub fn parse(heap: &mut Heap, settings: &Settings, src: &str) -> PResult<(ObjRef, usize)> {
    let mut parser = Parser::new(heap, settings, src);
    match parser.parse_object()? {
        Some(obj) => Ok((obj, parser.pos)),
        None => Err(parser.fail(Error::ArgumentExpected)),
    }
}

/// Parse a whole source text as a program body.
pub fn parse_source(heap: &mut Heap, settings: &Settings, src: &str) -> PResult<ObjRef> {
    let mut parser = Parser::new(heap, settings, src);
    let pins = parser.parse_sequence_to_eof()?;
    parser.finish_composite(Op::Program, pins)
}

struct Parser<'a> {
    heap: &'a mut Heap,
    settings: &'a Settings,
    src: &'a str,
    pos: usize,
    /// Lexical locals scopes, innermost last; names compile to slots.
    locals: Vec<Vec<String>>,
}

impl<'a> Parser<'a> {
    fn new(heap: &'a mut Heap, settings: &'a Settings, src: &'a str) -> Self {
        Self {
            heap,
            settings,
            src,
            pos: 0,
            locals: Vec::new(),
        }
    }

    // ========================================================================
    // Character-level helpers
    // ========================================================================

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, s: &str) -> bool {
        if self.rest().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn fail(&self, kind: Error) -> ErrorState {
        ErrorState::at(kind, Pos::new(self.pos as u32))
    }

    fn heap_err(&self, e: Error) -> ErrorState {
        ErrorState::at(e, Pos::new(self.pos as u32))
    }

    /// A word runs to whitespace or a structural delimiter.
    fn is_delimiter(c: char) -> bool {
        matches!(
            c,
            '{' | '}' | '[' | ']' | '«' | '»' | '"' | '\'' | '@' | '(' | ')' | ';' | ':' | ','
        )
    }

    fn peek_word(&self) -> &'a str {
        let rest = self.rest();
        let end = rest
            .char_indices()
            .find(|&(_, c)| c.is_whitespace() || Self::is_delimiter(c))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        &rest[..end]
    }

    fn eat_word(&mut self) -> &'a str {
        let word = self.peek_word();
        self.pos += word.len();
        word
    }

    /// Operator characters additionally break words inside expressions,
    /// where `π/2` is three tokens rather than one.
    fn is_operator_char(c: char) -> bool {
        matches!(
            c,
            '+' | '-' | '·' | '×' | '*' | '÷' | '/' | '^' | '<' | '>' | '=' | '≤' | '≥' | '≠'
                | '!'
        )
    }

    fn eat_expr_word(&mut self) -> &'a str {
        let rest = self.rest();
        let end = rest
            .char_indices()
            .find(|&(_, c)| {
                c.is_whitespace() || Self::is_delimiter(c) || Self::is_operator_char(c)
            })
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        self.pos += end;
        &rest[..end]
    }

    // ========================================================================
    // Object dispatch
    // ========================================================================

    /// Parse one object. `None` at end of input.
    fn parse_object(&mut self) -> PResult<Option<ObjRef>> {
        self.skip_ws();
        let Some(c) = self.peek() else {
            return Ok(None);
        };
        let obj = match c {
            '@' => self.parse_comment()?,
            '"' => self.parse_text()?,
            '#' => self.parse_based()?,
            '{' => {
                self.bump();
                let pins = self.parse_sequence(&["}"])?.0;
                self.finish_composite(Op::List, pins)?
            }
            '[' => {
                self.bump();
                let pins = self.parse_sequence(&["]"])?.0;
                self.finish_composite(Op::Array, pins)?
            }
            '«' => {
                self.bump();
                let pins = self.parse_sequence(&["»", ">>"])?.0;
                self.finish_composite(Op::Program, pins)?
            }
            '(' => self.parse_complex()?,
            '\'' => self.parse_expression()?,
            ':' => self.parse_tagged()?,
            _ if c.is_ascii_digit() => self.parse_number(false)?,
            '.' if self.second_is_digit() => self.parse_number(false)?,
            '-' if self.second_is_digit() || self.second_is_mark() => {
                self.bump();
                self.parse_number(true)?
            }
            '<' if self.rest().starts_with("<<") => {
                self.eat("<<");
                let pins = self.parse_sequence(&["»", ">>"])?.0;
                self.finish_composite(Op::Program, pins)?
            }
            '}' | ']' | '»' | ')' => return Err(self.fail(Error::Syntax)),
            _ => self.parse_word()?,
        };
        Ok(Some(obj))
    }

    fn second_is_digit(&self) -> bool {
        self.rest()
            .chars()
            .nth(1)
            .is_some_and(|c| c.is_ascii_digit())
    }

    fn second_is_mark(&self) -> bool {
        let mark = self.settings.decimal_mark;
        let mut chars = self.rest().chars();
        chars.next();
        match chars.next() {
            Some(c) if c == mark || c == '.' => chars.next().is_some_and(|c| c.is_ascii_digit()),
            _ => false,
        }
    }

    // ========================================================================
    // Sequences and composites
    // ========================================================================

    /// Parse objects until one of `closers` appears. Closers starting
    /// with a letter match as case-folded words, anything else as raw
    /// text. Returns the collected pins and which closer matched.
    fn parse_sequence(&mut self, closers: &[&str]) -> PResult<(Vec<PinHandle>, usize)> {
        let mut pins = Vec::new();
        loop {
            self.skip_ws();
            if self.peek().is_none() {
                self.unwind(pins);
                return Err(self.fail(Error::Unterminated));
            }
            if let Some(which) = self.try_closer(closers) {
                return Ok((pins, which));
            }
            match self.parse_one_into(&mut pins) {
                Ok(()) => {}
                Err(e) => {
                    self.unwind(pins);
                    return Err(e);
                }
            }
        }
    }

    fn parse_sequence_to_eof(&mut self) -> PResult<Vec<PinHandle>> {
        let mut pins = Vec::new();
        loop {
            self.skip_ws();
            if self.peek().is_none() {
                return Ok(pins);
            }
            match self.parse_one_into(&mut pins) {
                Ok(()) => {}
                Err(e) => {
                    self.unwind(pins);
                    return Err(e);
                }
            }
        }
    }

    /// Parse one object and pin it, dropping comments.
    fn parse_one_into(&mut self, pins: &mut Vec<PinHandle>) -> PResult<()> {
        let at = self.pos;
        match self.parse_object()? {
            Some(obj) => {
                if self.heap.op_of(obj).map_err(|e| self.heap_err(e))? != Op::Comment {
                    pins.push(self.heap.pin(obj));
                }
                Ok(())
            }
            None => {
                self.pos = at;
                Err(self.fail(Error::ArgumentExpected))
            }
        }
    }

    fn try_closer(&mut self, closers: &[&str]) -> Option<usize> {
        for (i, closer) in closers.iter().enumerate() {
            if closer.chars().next().is_some_and(|c| c.is_alphabetic()) {
                if self.peek_word().eq_ignore_ascii_case(closer) {
                    self.eat_word();
                    return Some(i);
                }
            } else if self.eat(closer) {
                return Some(i);
            }
        }
        None
    }

    fn finish_composite(&mut self, op: Op, pins: Vec<PinHandle>) -> PResult<ObjRef> {
        let children: Vec<ObjRef> = pins
            .iter()
            .map(|p| self.heap.pinned(p).expect("strong pin"))
            .collect();
        let result = self
            .heap
            .make_composite(op, &children)
            .map_err(|e| self.heap_err(e));
        self.unwind(pins);
        result
    }

    fn unwind(&mut self, pins: Vec<PinHandle>) {
        self.heap.unpin_all(pins);
    }

    // ========================================================================
    // Leaf kinds
    // ========================================================================

    fn parse_comment(&mut self) -> PResult<ObjRef> {
        self.bump(); // '@'
        let rest = self.rest();
        let end = rest.find('\n').unwrap_or(rest.len());
        let text = &rest[..end];
        self.pos += end;
        self.heap
            .make_str(Op::Comment, text)
            .map_err(|e| self.heap_err(e))
    }

    fn parse_text(&mut self) -> PResult<ObjRef> {
        let start = self.pos;
        self.bump(); // '"'
        let rest = self.rest();
        match rest.find('"') {
            Some(end) => {
                let text = &rest[..end];
                self.pos += end + 1;
                self.heap
                    .make_str(Op::Text, text)
                    .map_err(|e| self.heap_err(e))
            }
            None => Err(ErrorState::at(Error::Unterminated, Pos::new(start as u32))),
        }
    }

    /// `#digits[suffix]`: the suffix selects radix 2/8/10/16, otherwise
    /// the session base applies. Digits are base-checked.
    fn parse_based(&mut self) -> PResult<ObjRef> {
        self.bump(); // '#'
        let start = self.pos;
        let sep = self.settings.space_based;

        let mut run = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() {
                run.push(c);
                self.bump();
            } else if c == sep && !c.is_whitespace() && self.second_is_alnum() {
                self.bump(); // grouping separator
            } else {
                break;
            }
        }
        if run.is_empty() {
            return Err(ErrorState::at(Error::BasedNumber, Pos::new(start as u32)));
        }
        if !matches!(self.settings.base, 2 | 8 | 10 | 16) {
            return Err(ErrorState::at(Error::InvalidBase, Pos::new(start as u32)));
        }

        // An explicit suffix wins when the remaining digits fit its base;
        // otherwise the whole run is read in the session base.
        let suffix_base = match run.chars().last().map(|c| c.to_ascii_lowercase()) {
            Some('b') => Some(2),
            Some('o') => Some(8),
            Some('d') => Some(10),
            Some('h') => Some(16),
            _ => None,
        };
        let (digits, base) = match suffix_base {
            Some(base) if digits_fit(&run[..run.len() - 1], base) && run.len() > 1 => {
                (&run[..run.len() - 1], base)
            }
            _ => (run.as_str(), self.settings.base),
        };

        let mut mag = Magnitude::new();
        for c in digits.chars() {
            let digit = c
                .to_digit(base)
                .ok_or_else(|| ErrorState::at(Error::BasedDigit, Pos::new(start as u32)))?;
            magnitude::mul_small_add(&mut mag, base, digit);
        }
        magnitude::truncate_to_bits(&mut mag, self.settings.wordsize);
        self.heap.make_based(&mag).map_err(|e| self.heap_err(e))
    }

    fn second_is_alnum(&self) -> bool {
        self.rest()
            .chars()
            .nth(1)
            .is_some_and(|c| c.is_ascii_alphanumeric())
    }

    /// Integer, fraction or decimal. The leading sign was consumed by
    /// the caller.
    fn parse_number(&mut self, neg: bool) -> PResult<ObjRef> {
        let start = self.pos;
        let int_digits = self.digit_run();

        // Fraction: two integers joined by '/'.
        if self.peek() == Some('/') && self.second_is_digit() {
            self.bump();
            let den_digits = self.digit_run();
            let num = digits_to_mag(&int_digits);
            let den = digits_to_mag(&den_digits);
            if magnitude::is_zero(&den) {
                return Err(ErrorState::at(Error::ZeroDivide, Pos::new(start as u32)));
            }
            return self
                .heap
                .make_fraction(neg && !magnitude::is_zero(&num), &num, &den)
                .map_err(|e| self.heap_err(e));
        }

        // Decimal: fractional mark and/or exponent mark.
        let mark = self.peek() == Some(self.settings.decimal_mark) || self.peek() == Some('.');
        let exp_next = self
            .peek()
            .is_some_and(|c| self.settings.is_exponent_mark(c))
            && !int_digits.is_empty();
        if mark || exp_next {
            return self.parse_decimal(start, neg, int_digits, mark);
        }

        if int_digits.is_empty() {
            return Err(ErrorState::at(Error::Mantissa, Pos::new(start as u32)));
        }
        let mag = digits_to_mag(&int_digits);
        self.heap
            .make_integer(neg, &mag)
            .map_err(|e| self.heap_err(e))
    }

    fn parse_decimal(
        &mut self,
        start: usize,
        neg: bool,
        int_digits: String,
        mark: bool,
    ) -> PResult<ObjRef> {
        let mut text = String::new();
        if neg {
            text.push('-');
        }
        text.push_str(&int_digits);
        if mark {
            self.bump();
            let frac = self.digit_run();
            if int_digits.is_empty() && frac.is_empty() {
                return Err(ErrorState::at(Error::Mantissa, Pos::new(start as u32)));
            }
            text.push('.');
            text.push_str(&frac);
        }
        if self
            .peek()
            .is_some_and(|c| self.settings.is_exponent_mark(c))
        {
            self.bump();
            let mut exp = String::new();
            if matches!(self.peek(), Some('-') | Some('+')) {
                exp.push(self.bump().expect("peeked"));
            }
            let digits = self.digit_run();
            if digits.is_empty() {
                return Err(self.fail(Error::Exponent));
            }
            exp.push_str(&digits);
            let value: i32 = exp
                .parse()
                .map_err(|_| self.fail(Error::ExponentRange))?;
            if !(-308..=308).contains(&value) {
                return Err(self.fail(Error::ExponentRange));
            }
            text.push('e');
            text.push_str(&exp);
        }
        let value: f64 = text
            .parse()
            .map_err(|_| ErrorState::at(Error::Mantissa, Pos::new(start as u32)))?;
        if !value.is_finite() {
            return Err(ErrorState::at(Error::ExponentRange, Pos::new(start as u32)));
        }
        self.heap.make_decimal(value).map_err(|e| self.heap_err(e))
    }

    /// A run of digits, skipping the grouping separator between digits.
    fn digit_run(&mut self) -> String {
        let sep = self.settings.space;
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                out.push(c);
                self.bump();
            } else if c == sep && !c.is_whitespace() && self.second_is_digit() {
                self.bump();
            } else {
                break;
            }
        }
        out
    }

    /// `(re;im)` rectangular or `(mod∡arg)` polar.
    fn parse_complex(&mut self) -> PResult<ObjRef> {
        let start = self.pos;
        self.bump(); // '('
        let first = self.require_object()?;
        let first_pin = self.heap.pin(first);
        self.skip_ws();
        let op = if self.eat(";") || self.eat(",") {
            Op::Rectangular
        } else if self.eat("∡") {
            Op::Polar
        } else {
            self.unwind(vec![first_pin]);
            return Err(self.fail(Error::Syntax));
        };
        let second = match self.require_object() {
            Ok(obj) => obj,
            Err(e) => {
                self.unwind(vec![first_pin]);
                return Err(e);
            }
        };
        let second_pin = self.heap.pin(second);
        self.skip_ws();
        if !self.eat(")") {
            self.unwind(vec![first_pin, second_pin]);
            return Err(ErrorState::at(Error::Unterminated, Pos::new(start as u32)));
        }
        let first = self.heap.pinned(&first_pin).expect("strong pin");
        let second = self.heap.pinned(&second_pin).expect("strong pin");
        let result = self
            .heap
            .make_complex(op, first, second)
            .map_err(|e| self.heap_err(e));
        self.unwind(vec![first_pin, second_pin]);
        result
    }

    fn require_object(&mut self) -> PResult<ObjRef> {
        match self.parse_object()? {
            Some(obj) => Ok(obj),
            None => Err(self.fail(Error::ArgumentExpected)),
        }
    }

    /// `:label: object`
    fn parse_tagged(&mut self) -> PResult<ObjRef> {
        self.bump(); // ':'
        let label = self.eat_word().to_string();
        if label.is_empty() || !self.eat(":") {
            return Err(self.fail(Error::Syntax));
        }
        let sym = self
            .heap
            .make_str(Op::Symbol, &label)
            .map_err(|e| self.heap_err(e))?;
        let pin = self.heap.pin(sym);
        let obj = match self.require_object() {
            Ok(obj) => obj,
            Err(e) => {
                self.unwind(vec![pin]);
                return Err(e);
            }
        };
        let sym = self.heap.pinned(&pin).expect("strong pin");
        let result = self
            .heap
            .make_composite(Op::Tagged, &[sym, obj])
            .map_err(|e| self.heap_err(e));
        self.unwind(vec![pin]);
        result
    }

    // ========================================================================
    // Words: keywords, commands, locals, symbols
    // ========================================================================

    fn parse_word(&mut self) -> PResult<ObjRef> {
        let start = self.pos;
        let word = self.eat_word();
        if word.is_empty() {
            return Err(self.fail(Error::Syntax));
        }
        if word == "→" || word == "->" {
            return self.parse_locals();
        }
        let lower = word.to_lowercase();
        match lower.as_str() {
            "if" => return self.parse_if(Op::IfThen, Op::IfThenElse),
            "iferr" => return self.parse_if(Op::IfErrThen, Op::IfErrThenElse),
            "do" => return self.parse_do(),
            "while" => return self.parse_while(),
            "start" => return self.parse_counted(None),
            "for" => return self.parse_for(),
            "then" | "else" | "end" | "until" | "repeat" | "next" | "step" => {
                return Err(ErrorState::at(Error::Syntax, Pos::new(start as u32)));
            }
            "directory" => {
                self.skip_ws();
                if self.peek() == Some('{') {
                    return self.parse_directory();
                }
            }
            "grob" => return self.parse_grob(),
            _ => {}
        }
        if let Some(op) = Op::lookup(word) {
            return self.heap.make_command(op).map_err(|e| self.heap_err(e));
        }
        if let Some(index) = self.local_slot(word) {
            return self.heap.make_local(index).map_err(|e| self.heap_err(e));
        }
        if !is_valid_name(word) {
            return Err(ErrorState::at(Error::Syntax, Pos::new(start as u32)));
        }
        self.heap
            .make_str(Op::Symbol, word)
            .map_err(|e| self.heap_err(e))
    }

    /// Flat slot index of a name in the lexical scopes, innermost first.
    fn local_slot(&self, name: &str) -> Option<usize> {
        let mut base = 0;
        for scope in self.locals.iter().rev() {
            if let Some(i) = scope.iter().position(|n| n == name) {
                return Some(base + i);
            }
            base += scope.len();
        }
        None
    }

    /// `→ name… « body »` or `→ name… 'expr'`
    fn parse_locals(&mut self) -> PResult<ObjRef> {
        let mut names = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some('«') | Some('\'') => break,
                Some('<') if self.rest().starts_with("<<") => break,
                _ => {}
            }
            let word = self.eat_word();
            if word.is_empty() || !is_valid_name(word) {
                return Err(self.fail(Error::Syntax));
            }
            names.push(word.to_string());
        }
        if names.is_empty() {
            return Err(self.fail(Error::Syntax));
        }

        self.locals.push(names.clone());
        let body = self.require_object();
        self.locals.pop();
        let body = body?;

        let body_pin = self.heap.pin(body);
        let mut name_pins = Vec::new();
        for name in &names {
            match self.heap.make_str(Op::Symbol, name) {
                Ok(sym) => name_pins.push(self.heap.pin(sym)),
                Err(e) => {
                    self.unwind(name_pins);
                    self.heap.unpin(body_pin);
                    return Err(self.heap_err(e));
                }
            }
        }
        let name_refs: Vec<ObjRef> = name_pins
            .iter()
            .map(|p| self.heap.pinned(p).expect("strong pin"))
            .collect();
        let body = self.heap.pinned(&body_pin).expect("strong pin");
        let result = self
            .heap
            .make_locals(&name_refs, body)
            .map_err(|e| self.heap_err(e));
        self.unwind(name_pins);
        self.heap.unpin(body_pin);
        result
    }

    fn parse_if(&mut self, plain: Op, with_else: Op) -> PResult<ObjRef> {
        let cond = {
            let pins = self.parse_sequence(&["then"])?.0;
            self.finish_composite(Op::Block, pins)?
        };
        let cond_pin = self.heap.pin(cond);
        let result = (|this: &mut Self| -> PResult<(ObjRef, Option<ObjRef>)> {
            let (pins, which) = this.parse_sequence(&["else", "end"])?;
            let body = this.finish_composite(Op::Block, pins)?;
            if which == 0 {
                let body_pin = this.heap.pin(body);
                let alt = {
                    let pins = match this.parse_sequence(&["end"]) {
                        Ok((pins, _)) => pins,
                        Err(e) => {
                            this.heap.unpin(body_pin);
                            return Err(e);
                        }
                    };
                    this.finish_composite(Op::Block, pins)
                };
                let body = this.heap.pinned(&body_pin).expect("strong pin");
                this.heap.unpin(body_pin);
                Ok((body, Some(alt?)))
            } else {
                Ok((body, None))
            }
        })(self);
        let cond = self.heap.pinned(&cond_pin).expect("strong pin");
        self.heap.unpin(cond_pin);
        let (body, alt) = result?;
        match alt {
            Some(alt) => self
                .heap
                .make_composite(with_else, &[cond, body, alt])
                .map_err(|e| self.heap_err(e)),
            None => self
                .heap
                .make_composite(plain, &[cond, body])
                .map_err(|e| self.heap_err(e)),
        }
    }

    fn parse_do(&mut self) -> PResult<ObjRef> {
        let body = {
            let pins = self.parse_sequence(&["until"])?.0;
            self.finish_composite(Op::Block, pins)?
        };
        let body_pin = self.heap.pin(body);
        let cond = {
            let pins = match self.parse_sequence(&["end"]) {
                Ok((pins, _)) => pins,
                Err(e) => {
                    self.heap.unpin(body_pin);
                    return Err(e);
                }
            };
            self.finish_composite(Op::Block, pins)
        };
        let body = self.heap.pinned(&body_pin).expect("strong pin");
        self.heap.unpin(body_pin);
        let cond = cond?;
        self.heap
            .make_composite(Op::DoUntil, &[body, cond])
            .map_err(|e| self.heap_err(e))
    }

    fn parse_while(&mut self) -> PResult<ObjRef> {
        let cond = {
            let pins = self.parse_sequence(&["repeat"])?.0;
            self.finish_composite(Op::Block, pins)?
        };
        let cond_pin = self.heap.pin(cond);
        let body = {
            let pins = match self.parse_sequence(&["end"]) {
                Ok((pins, _)) => pins,
                Err(e) => {
                    self.heap.unpin(cond_pin);
                    return Err(e);
                }
            };
            self.finish_composite(Op::Block, pins)
        };
        let cond = self.heap.pinned(&cond_pin).expect("strong pin");
        self.heap.unpin(cond_pin);
        let body = body?;
        self.heap
            .make_composite(Op::WhileRepeat, &[cond, body])
            .map_err(|e| self.heap_err(e))
    }

    /// `start body next|step`, optionally with a loop variable for `for`.
    fn parse_counted(&mut self, var: Option<&str>) -> PResult<ObjRef> {
        if let Some(name) = var {
            self.locals.push(vec![name.to_string()]);
        }
        let parsed = self.parse_sequence(&["next", "step"]);
        if var.is_some() {
            self.locals.pop();
        }
        let (pins, which) = parsed?;
        let body = self.finish_composite(Op::Block, pins)?;
        match var {
            None => {
                let op = if which == 0 { Op::StartNext } else { Op::StartStep };
                self.heap
                    .make_composite(op, &[body])
                    .map_err(|e| self.heap_err(e))
            }
            Some(name) => {
                let body_pin = self.heap.pin(body);
                let sym = self.heap.make_str(Op::Symbol, name);
                let body = self.heap.pinned(&body_pin).expect("strong pin");
                self.heap.unpin(body_pin);
                let sym = sym.map_err(|e| self.heap_err(e))?;
                let op = if which == 0 { Op::ForNext } else { Op::ForStep };
                // The symbol was allocated after the body, so the body
                // reference read back above is still current.
                self.heap
                    .make_composite(op, &[sym, body])
                    .map_err(|e| self.heap_err(e))
            }
        }
    }

    fn parse_for(&mut self) -> PResult<ObjRef> {
        self.skip_ws();
        let name = self.eat_word();
        if name.is_empty() || !is_valid_name(name) {
            return Err(self.fail(Error::Syntax));
        }
        let name = name.to_string();
        self.parse_counted(Some(&name))
    }

    /// `directory { name obj … }`
    fn parse_directory(&mut self) -> PResult<ObjRef> {
        self.bump(); // '{'
        let start = self.pos;
        let pins = self.parse_sequence(&["}"])?.0;
        let children: Vec<ObjRef> = pins
            .iter()
            .map(|p| self.heap.pinned(p).expect("strong pin"))
            .collect();
        if children.len() % 2 != 0 {
            self.unwind(pins);
            return Err(ErrorState::at(Error::Syntax, Pos::new(start as u32)));
        }
        for pair in children.chunks(2) {
            match self.heap.op_of(pair[0]) {
                Ok(Op::Symbol) => {}
                _ => {
                    self.unwind(pins);
                    return Err(ErrorState::at(Error::Syntax, Pos::new(start as u32)));
                }
            }
        }
        self.finish_composite(Op::Directory, pins)
    }

    /// `grob width height hexbits`
    fn parse_grob(&mut self) -> PResult<ObjRef> {
        self.skip_ws();
        let w: u32 = self
            .eat_word()
            .parse()
            .map_err(|_| self.fail(Error::Syntax))?;
        self.skip_ws();
        let h: u32 = self
            .eat_word()
            .parse()
            .map_err(|_| self.fail(Error::Syntax))?;
        self.skip_ws();
        let hex = self.eat_word();
        let mut data = Vec::with_capacity(hex.len() / 2);
        if hex.len() % 2 != 0 {
            return Err(self.fail(Error::Syntax));
        }
        for pair in hex.as_bytes().chunks(2) {
            let s = std::str::from_utf8(pair).map_err(|_| self.fail(Error::Syntax))?;
            data.push(u8::from_str_radix(s, 16).map_err(|_| self.fail(Error::Syntax))?);
        }
        self.heap
            .make_grob(w, h, &data)
            .map_err(|e| self.heap_err(e))
    }

    // ========================================================================
    // Algebraic expressions
    // ========================================================================

    fn parse_expression(&mut self) -> PResult<ObjRef> {
        let start = self.pos;
        self.bump(); // '\''
        let mut pins = Vec::new();
        if let Err(e) = self.expr_bp(0, &mut pins) {
            self.unwind(pins);
            return Err(e);
        }
        self.skip_ws();
        if !self.eat("'") {
            self.unwind(pins);
            return Err(ErrorState::at(Error::Unterminated, Pos::new(start as u32)));
        }
        self.finish_composite(Op::Expression, pins)
    }

    fn push_expr(&mut self, pins: &mut Vec<PinHandle>, obj: ObjRef) {
        pins.push(self.heap.pin(obj));
    }

    fn push_expr_command(&mut self, pins: &mut Vec<PinHandle>, op: Op) -> PResult<()> {
        let cmd = self.heap.make_command(op).map_err(|e| self.heap_err(e))?;
        self.push_expr(pins, cmd);
        Ok(())
    }

    /// Precedence-climbing infix parser emitting postfix children.
    fn expr_bp(&mut self, min_bp: u8, pins: &mut Vec<PinHandle>) -> PResult<()> {
        self.expr_primary(pins)?;
        loop {
            self.skip_ws();
            let Some(op) = self.peek_infix_operator() else {
                break;
            };
            let p = op.precedence();
            if p < min_bp {
                break;
            }
            self.consume_infix_operator(op);
            let next = if op.is_right_assoc() { p } else { p + 1 };
            self.expr_bp(next, pins)?;
            self.push_expr_command(pins, op)?;
        }
        Ok(())
    }

    /// The infix operator at the cursor, if any. Multi-character
    /// spellings are tried longest first; alphabetic operators (mod,
    /// and, …) match as whole words.
    fn peek_infix_operator(&self) -> Option<Op> {
        const PUNCT: &[&str] = &[
            "==", "<=", ">=", "!=", "<>", "≠", "≤", "≥", "<", ">", "=", "+", "-", "·", "×", "*",
            "÷", "/", "^",
        ];
        for spelling in PUNCT {
            if self.rest().starts_with(spelling) {
                return Op::lookup(spelling).filter(|op| op.is_binary_infix());
            }
        }
        let word = self.peek_word();
        if !word.is_empty() && word.chars().next().is_some_and(|c| c.is_alphabetic()) {
            if let Some(op) = Op::lookup(word) {
                if op.is_binary_infix() {
                    return Some(op);
                }
            }
        }
        None
    }

    fn consume_infix_operator(&mut self, op: Op) {
        if self
            .peek()
            .is_some_and(|c| c.is_alphabetic())
        {
            self.eat_word();
        } else {
            let info = op.info();
            if !self.eat(info.name) {
                for alias in info.aliases {
                    if self.eat(alias) {
                        return;
                    }
                }
            }
        }
    }

    fn expr_primary(&mut self, pins: &mut Vec<PinHandle>) -> PResult<()> {
        self.skip_ws();
        let Some(c) = self.peek() else {
            return Err(self.fail(Error::ArgumentExpected));
        };
        match c {
            '(' => {
                self.bump();
                self.expr_bp(0, pins)?;
                self.skip_ws();
                if !self.eat(")") {
                    return Err(self.fail(Error::Unterminated));
                }
            }
            '-' => {
                self.bump();
                if self.peek().is_some_and(|c| c.is_ascii_digit())
                    || self.peek() == Some(self.settings.decimal_mark)
                    || self.peek() == Some('.')
                {
                    // A negative literal, not a Neg application.
                    let obj = self.parse_number(true)?;
                    self.push_expr(pins, obj);
                } else {
                    self.expr_primary(pins)?;
                    self.push_expr_command(pins, Op::Neg)?;
                }
            }
            '#' => {
                let obj = self.parse_based()?;
                self.push_expr(pins, obj);
            }
            _ if c.is_ascii_digit() || (c == '.' && self.second_is_digit()) => {
                let obj = self.parse_number(false)?;
                self.push_expr(pins, obj);
            }
            _ => {
                let word = self.eat_expr_word();
                if word.is_empty() {
                    return Err(self.fail(Error::PrefixExpected));
                }
                if let Some(op) = Op::lookup(word) {
                    self.expr_command(op, pins)?;
                } else if is_valid_name(word) {
                    // Names stay symbolic inside expressions, locals
                    // included: they resolve by name at evaluation time,
                    // so an expression can outlive the binding frame.
                    let obj = self
                        .heap
                        .make_str(Op::Symbol, word)
                        .map_err(|e| self.heap_err(e))?;
                    self.push_expr(pins, obj);
                } else {
                    return Err(self.fail(Error::Syntax));
                }
            }
        }
        // Postfix factorial, careful not to eat "!=".
        loop {
            self.skip_ws();
            if self.peek() == Some('!') && !self.rest().starts_with("!=") {
                self.bump();
                self.push_expr_command(pins, Op::Fact)?;
            } else {
                break;
            }
        }
        Ok(())
    }

    /// A command inside an expression: a constant, or a function with
    /// parenthesized arguments.
    fn expr_command(&mut self, op: Op, pins: &mut Vec<PinHandle>) -> PResult<()> {
        let arity = op.info().arity;
        if arity == 0 {
            return self.push_expr_command(pins, op);
        }
        if !op.is_algebraic_function() && !(arity == 2 && op.precedence() == 0) {
            return Err(self.fail(Error::Syntax));
        }
        self.skip_ws();
        if !self.eat("(") {
            return Err(self.fail(Error::ArgumentExpected));
        }
        for i in 0..arity {
            if i > 0 {
                self.skip_ws();
                if !self.eat(";") && !self.eat(",") {
                    return Err(self.fail(Error::ArgumentExpected));
                }
            }
            self.expr_bp(0, pins)?;
        }
        self.skip_ws();
        if !self.eat(")") {
            return Err(self.fail(Error::Unterminated));
        }
        self.push_expr_command(pins, op)
    }
}

/// Digit characters accumulated into a magnitude.
fn digits_to_mag(digits: &str) -> Magnitude {
    let mut mag = Magnitude::new();
    for c in digits.chars() {
        magnitude::mul_small_add(&mut mag, 10, c.to_digit(10).expect("digit run"));
    }
    mag
}

fn digits_fit(digits: &str, base: u32) -> bool {
    !digits.is_empty() && digits.chars().all(|c| c.to_digit(base).is_some())
}

/// Symbol names start with a letter or underscore and continue with
/// letters, digits and underscores.
fn is_valid_name(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}
