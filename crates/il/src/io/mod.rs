//! Textual IL reading and writing.
//!
//! The serializer produces a canonical form (fixed field order, two-space
//! indentation, `%tN` temps) and the parser reads it back, interning temp
//! names to dense ids. `parse(serialize(m))` reproduces `m` up to the dense
//! renumbering the parser performs.

mod parser;
mod serializer;

pub use parser::parse_module;
pub use serializer::{serialize_module, write_module};
