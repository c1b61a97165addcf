//! The text surface of the ripple runtime: a recursive-descent parser
//! producing objects directly into the heap, and a renderer that prints
//! any object back through a pluggable sink.
//!
//! Round trip: for any object `o`, `parse(render(o))` reproduces `o`
//! bit for bit, modulo display-only settings.

pub mod parse;
pub mod render;
pub mod sink;

pub use parse::{parse, parse_source, PResult};
pub use render::{render, render_to_string};
pub use sink::{BufferSink, FixedSink, Sink, StreamSink};
