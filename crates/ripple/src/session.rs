//! High-level session API.
//!
//! A [`Session`] wraps one runtime: parse source text, evaluate it
//! against the persistent operand stack and directories, and render the
//! results. The CLI binary and the integration tests both drive the
//! core through this type.
//!
//! ```
//! use ripple::Session;
//!
//! let mut session = Session::new();
//! let stack = session.eval("123 456 +").unwrap();
//! assert_eq!(stack, vec!["579".to_string()]);
//! ```

use ripple_core::{Error, ErrorState};
use ripple_lang::{parse_source, render_to_string};
use ripple_vm::{run, Host, Runtime};

/// Error from [`Session::eval`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EvalError {
    /// Parsing failed; the state carries the source position.
    Parse(ErrorState),
    /// Evaluation failed; the state may carry the failing command.
    Runtime(ErrorState),
}

impl EvalError {
    pub fn kind(&self) -> Error {
        match self {
            EvalError::Parse(state) | EvalError::Runtime(state) => state.kind,
        }
    }
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::Parse(state) => write!(f, "Parse error: {}", state),
            EvalError::Runtime(state) => write!(f, "Runtime error: {}", state),
        }
    }
}

impl std::error::Error for EvalError {}

pub struct Session {
    rt: Runtime,
}

impl Session {
    pub fn new() -> Self {
        Self { rt: Runtime::new() }
    }

    pub fn with_host(host: Box<dyn Host>) -> Self {
        Self {
            rt: Runtime::with_host(host),
        }
    }

    /// The underlying runtime, for direct inspection.
    pub fn runtime(&self) -> &Runtime {
        &self.rt
    }

    pub fn runtime_mut(&mut self) -> &mut Runtime {
        &mut self.rt
    }

    /// Parse and evaluate `source`, returning the rendered stack from
    /// bottom to top. The stack persists between calls; a failed
    /// evaluation leaves it for inspection and records the error.
    pub fn eval(&mut self, source: &str) -> Result<Vec<String>, EvalError> {
        self.rt.clear_error();
        // `undo` keeps pointing one evaluation back; the new snapshot
        // only takes over once this evaluation is done.
        self.rt.heap.stage_undo();

        let program = parse_source(&mut self.rt.heap, &self.rt.settings, source)
            .map_err(|state| {
                self.rt.set_error(state);
                EvalError::Parse(state)
            })?;

        let outcome = run(&mut self.rt, program);
        self.rt.heap.promote_undo();
        match outcome {
            Ok(()) => self.stack(),
            Err(kind) => {
                self.rt.set_error(ErrorState::new(kind));
                self.rt.unwind();
                let state = self.rt.error().unwrap_or(ErrorState::new(kind));
                Err(EvalError::Runtime(state))
            }
        }
    }

    /// Render the current stack, bottom to top.
    pub fn stack(&self) -> Result<Vec<String>, EvalError> {
        let depth = self.rt.heap.depth();
        let mut out = Vec::with_capacity(depth);
        for i in (0..depth).rev() {
            let obj = self.rt.heap.peek(i).expect("depth checked");
            let text = render_to_string(&self.rt.heap, &self.rt.settings, obj)
                .map_err(|e| EvalError::Runtime(ErrorState::new(e)))?;
            out.push(text);
        }
        Ok(out)
    }

    /// Rendered top of stack, if any.
    pub fn top(&self) -> Option<String> {
        self.stack().ok()?.pop()
    }

    /// Drop everything from the stack.
    pub fn clear(&mut self) {
        self.rt.heap.clear_stack();
    }

    /// The settings as a JSON document.
    pub fn settings_json(&self) -> String {
        serde_json::to_string_pretty(&self.rt.settings).expect("settings always serialize")
    }

    /// Replace the settings from a JSON document.
    pub fn load_settings_json(&mut self, json: &str) -> Result<(), EvalError> {
        self.rt.settings = serde_json::from_str(json)
            .map_err(|_| EvalError::Parse(ErrorState::new(Error::Syntax)))?;
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_returns_rendered_stack() {
        let mut session = Session::new();
        let stack = session.eval("1 2 3").unwrap();
        assert_eq!(stack, vec!["1", "2", "3"]);
    }

    #[test]
    fn stack_persists_between_evals() {
        let mut session = Session::new();
        session.eval("1 2").unwrap();
        let stack = session.eval("+").unwrap();
        assert_eq!(stack, vec!["3"]);
    }

    #[test]
    fn parse_errors_carry_positions() {
        let mut session = Session::new();
        let err = session.eval("1 2 )").unwrap_err();
        match err {
            EvalError::Parse(state) => {
                assert_eq!(state.kind, Error::Syntax);
                assert_eq!(state.pos.unwrap().offset(), 4);
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn runtime_errors_leave_stack() {
        let mut session = Session::new();
        session.eval("42").unwrap();
        let err = session.eval("1 0 /").unwrap_err();
        assert_eq!(err.kind(), Error::ZeroDivide);
        // The pre-error stack content is still there.
        assert!(session.runtime().heap.depth() >= 1);
    }

    #[test]
    fn error_clears_on_next_eval() {
        let mut session = Session::new();
        session.eval("1 0 /").unwrap_err();
        assert!(session.runtime().error().is_some());
        session.eval("5").unwrap();
        assert!(session.runtime().error().is_none());
    }

    #[test]
    fn undo_spans_one_eval() {
        let mut session = Session::new();
        session.eval("1 2 3").unwrap();
        session.eval("drop drop").unwrap();
        let stack = session.eval("undo").unwrap();
        assert_eq!(stack, vec!["1", "2", "3"]);
    }

    #[test]
    fn settings_json_roundtrip() {
        let mut session = Session::new();
        session.eval("hex 8 stws").unwrap();
        let json = session.settings_json();

        let mut other = Session::new();
        other.load_settings_json(&json).unwrap();
        assert_eq!(other.runtime().settings.wordsize, 8);
    }
}
