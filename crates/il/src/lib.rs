//! Viper IL: typed SSA-form intermediate language.
//!
//! In-memory model (`Module` → `Function` → `BasicBlock` → `Instr`), an
//! insertion-point builder for frontends and tests, a deterministic text
//! serializer with a matching streaming parser, and the structural verifier
//! that must pass before the VM executes a module.
//!
//! Control flow uses basic blocks with typed block parameters instead of
//! φ-nodes: branch instructions carry one argument vector per successor.

pub mod block;
pub mod build;
pub mod func;
pub mod instr;
pub mod io;
pub mod module;
pub mod opcode;
pub mod types;
pub mod value;
pub mod verify;

pub use block::{BasicBlock, Param};
pub use build::IrBuilder;
pub use func::Function;
pub use instr::Instr;
pub use module::{Extern, Global, Module};
pub use opcode::{LabelShape, OpSignature, Opcode, OperandRule, ResultRule};
pub use types::Type;
pub use value::Value;
pub use verify::{verify, verify_all};
