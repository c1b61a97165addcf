//! The ripple object heap.
//!
//! One contiguous region holds every object as a LEB128-tagged byte
//! sequence: globals owned by directory entries at the low end,
//! temporaries above them reclaimed by mark-compact collection, and a
//! LIFO scratchpad at the top for arithmetic kernels. The operand stack,
//! locals frames and pinned references are typed offsets into the
//! region, rewritten whenever objects move.

pub mod bignum;
pub mod directory;
mod gc;
pub mod heap;
mod make;
pub mod object;

pub use directory::{Directory, DirectoryTree};
pub use heap::{Frame, Heap, PinHandle, DEFAULT_CAPACITY};
pub use object::{size_at, tag_at, validate_at, Children, ObjRef};
