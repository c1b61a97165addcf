//! ripple: an RPL calculator runtime.
//!
//! An interactive, stack-based symbolic/numeric evaluator in the HP
//! tradition. Programs and expressions parse into tagged objects in a
//! single compacting heap, evaluate over an operand stack with named
//! variables and locals, and render back through one opcode table.
//!
//! This crate is the facade: [`Session`] for embedding, [`persist`] for
//! bit-exact state images, and the `ripple` binary for the command line.
//! The machinery lives in `ripple-core` (opcode table, errors,
//! settings), `ripple-mem` (heap, collector, bignum kernels),
//! `ripple-lang` (parser, renderer) and `ripple-vm` (evaluator).

pub mod persist;
pub mod session;

pub use ripple_core::{Error, ErrorState, Op, Settings};
pub use ripple_vm::{Host, Runtime, SystemHost, TestHost};
pub use session::{EvalError, Session};
