//! The runtime: heap, settings, error slot and host, bundled as the
//! explicit handle every operation works through. Tests construct a
//! fresh runtime per case; there is no global state.

use ripple_core::{Error, ErrorState, Result, Settings};
use ripple_mem::{Heap, ObjRef};

use crate::host::{Host, SystemHost};

/// Default evaluator recursion limit.
const DEFAULT_MAX_RECURSION: usize = 256;

pub struct Runtime {
    pub heap: Heap,
    pub settings: Settings,
    host: Box<dyn Host>,
    /// The process-wide error slot. Once set, evaluation fails until it
    /// is cleared.
    error: Option<ErrorState>,
    /// The most recent error, sticky across recovery for errn/errm.
    last_error: Option<ErrorState>,
    /// Current evaluator depth and its limit.
    depth: usize,
    max_recursion: usize,
    /// The text buffer being edited, converted to objects by parsing.
    editor: String,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_host(Box::new(SystemHost::new()))
    }

    pub fn with_host(host: Box<dyn Host>) -> Self {
        Self {
            heap: Heap::new(),
            settings: Settings::default(),
            host,
            error: None,
            last_error: None,
            depth: 0,
            max_recursion: DEFAULT_MAX_RECURSION,
            editor: String::new(),
        }
    }

    pub fn host(&self) -> &dyn Host {
        self.host.as_ref()
    }

    // ========================================================================
    // Error slot
    // ========================================================================

    /// Record an error. The first report wins until the slot is
    /// cleared: it is the innermost and carries the most context.
    pub fn set_error(&mut self, state: ErrorState) {
        if self.error.is_none() {
            self.error = Some(state);
            self.last_error = Some(state);
        }
    }

    pub fn error(&self) -> Option<ErrorState> {
        self.error
    }

    /// The most recent error, surviving recovery (for errn/errm).
    pub fn last_error(&self) -> Option<ErrorState> {
        self.last_error
    }

    /// Clear the error slot so evaluation can resume.
    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Forget the sticky error as well (clerr).
    pub fn clear_all_errors(&mut self) {
        self.error = None;
        self.last_error = None;
    }

    /// Unwind after a failed top-level evaluation: drop in-flight pins
    /// and locals frames, keep the stack for inspection.
    pub fn unwind(&mut self) {
        self.heap.clear_pins();
        while self.heap.pop_frame().is_some() {}
        self.depth = 0;
    }

    // ========================================================================
    // Recursion accounting
    // ========================================================================

    pub fn max_recursion(&self) -> usize {
        self.max_recursion
    }

    pub fn set_max_recursion(&mut self, limit: usize) {
        self.max_recursion = limit;
    }

    pub(crate) fn enter(&mut self) -> Result<()> {
        if self.depth >= self.max_recursion {
            return Err(Error::Recursion);
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        debug_assert!(self.depth > 0);
        self.depth -= 1;
    }

    pub fn recursion_depth(&self) -> usize {
        self.depth
    }

    // ========================================================================
    // Editor
    // ========================================================================

    pub fn editor(&self) -> &str {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut String {
        &mut self.editor
    }

    /// Position the editor cursor at the reported error offset, if any.
    pub fn error_cursor(&self) -> Option<usize> {
        self.error
            .and_then(|e| e.pos)
            .map(|p| p.offset() as usize)
            .map(|p| p.min(self.editor.len()))
    }

    // ========================================================================
    // Stack conveniences shared by the command implementations
    // ========================================================================

    /// Pop an object that names a variable: a symbol, a quoted symbol
    /// (an expression holding exactly one symbol), or a text.
    pub fn pop_name(&mut self) -> Result<String> {
        let obj = self.heap.pop()?;
        self.object_name(obj)
    }

    pub fn object_name(&self, obj: ObjRef) -> Result<String> {
        use ripple_core::Op;
        match self.heap.op_of(obj)? {
            Op::Symbol | Op::Text => Ok(self.heap.str_value(obj)?.to_string()),
            Op::Expression => {
                let children = self.heap.children_of(obj)?;
                if children.len() == 1 && self.heap.op_of(children[0])? == Op::Symbol {
                    Ok(self.heap.str_value(children[0])?.to_string())
                } else {
                    Err(Error::Type)
                }
            }
            _ => Err(Error::Type),
        }
    }

    /// Pop a small non-negative count.
    pub fn pop_count(&mut self) -> Result<usize> {
        let obj = self.heap.pop()?;
        let value = self.to_i64(obj)?;
        usize::try_from(value).map_err(|_| Error::Value)
    }

    /// Signed 64-bit view of an integer or whole decimal.
    pub fn to_i64(&self, obj: ObjRef) -> Result<i64> {
        use ripple_core::Op;
        match self.heap.op_of(obj)? {
            Op::Integer | Op::NegInteger => self.heap.int_value(obj),
            Op::BasedInteger => Ok(self.heap.small_value(obj)? as i64),
            Op::Decimal => {
                let v = self.heap.decimal_value(obj)?;
                if v.fract() != 0.0 || !v.is_finite() || v.abs() >= i64::MAX as f64 {
                    return Err(Error::Value);
                }
                Ok(v as i64)
            }
            Op::Bignum | Op::NegBignum => Err(Error::NumberTooBig),
            _ => Err(Error::Type),
        }
    }

    /// Truthiness of a condition: nonzero numbers are true.
    pub fn is_truthy(&self, obj: ObjRef) -> Result<bool> {
        use ripple_core::Op;
        match self.heap.op_of(obj)? {
            op if op.is_integer() => Ok(!self.heap.is_zero_int(obj)?),
            op if op.is_fraction() => Ok(true), // reduced fractions are never zero
            Op::Decimal => Ok(self.heap.decimal_value(obj)? != 0.0),
            _ => Err(Error::Type),
        }
    }

    pub fn pop_truthy(&mut self) -> Result<bool> {
        let obj = self.heap.pop()?;
        self.is_truthy(obj)
    }

    /// Push 1 or 0.
    pub fn push_flag(&mut self, flag: bool) -> Result<()> {
        let obj = self.heap.make_int(flag as i64)?;
        self.heap.push(obj)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
