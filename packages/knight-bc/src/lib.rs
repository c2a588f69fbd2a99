//! Definitions for Knight bytecode: labels, opcodes, code points and the
//! environment the labels resolve into.

pub mod env;
pub mod label;
pub mod op;
pub mod value;

pub use env::Environment;
pub use label::{Label, LabelCat};
pub use op::{CodePoint, OpCode, Operation, MAX_LABELS};
pub use value::{KnString, Number, Value};

/// One block of IR as produced by the parser. The first operation is always
/// `BlockData(n)` with the block's temporary count, and the last is a
/// `Return`. Lifted blocks carry a `Label` right after the header so call
/// sites can reach them; the top-level block needs none.
pub type Block = Vec<Operation>;
