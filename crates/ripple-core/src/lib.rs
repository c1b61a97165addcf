//! Shared foundations of the ripple RPL runtime: the LEB128 codec, the
//! opcode table, source positions, the closed error enumeration and
//! the settings struct.
//!
//! Everything else in the workspace builds on this crate; it has no
//! knowledge of the heap or the evaluator.

pub mod error;
pub mod leb128;
pub mod magnitude;
pub mod opcode;
pub mod pos;
pub mod settings;

pub use error::{Error, ErrorState, Result};
pub use opcode::{Op, OpInfo, OP_COUNT, OPS};
pub use pos::Pos;
pub use settings::{AngleMode, CommandCase, DisplayMode, Settings};
