//! Viper support layer
//!
//! Leaf crate shared by the IL, VM, and driver crates:
//! - `SourceLoc`: file/line/column coordinates (0 = unknown)
//! - `Symbol` / `StringInterner`: dense non-zero string handles
//! - `SourceManager`: normalized path registry with dense file ids
//! - `Diag` / `Expected`: located diagnostics for fallible API surfaces
//! - `Arena`: fixed-capacity bump allocator

pub mod arena;
pub mod diag;
pub mod interner;
pub mod source_loc;
pub mod source_manager;

pub use arena::Arena;
pub use diag::{Diag, DiagnosticEngine, Expected, Severity};
pub use interner::{StringInterner, Symbol};
pub use source_loc::SourceLoc;
pub use source_manager::{SourceManager, normalize_path};
