//! Function definitions.

use crate::block::{BasicBlock, Param};
use crate::types::Type;
use std::fmt;

/// Function definition: parameters plus one or more basic blocks.
///
/// The first block is the entry. Function parameters define the first dense
/// temp ids (0..n) on entry to that block.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub ret_type: Type,
    pub params: Vec<Param>,
    pub blocks: Vec<BasicBlock>,
}

impl Function {
    pub fn new(name: impl Into<String>, ret_type: Type, params: Vec<Param>) -> Self {
        Function {
            name: name.into(),
            ret_type,
            params,
            blocks: Vec::new(),
        }
    }

    /// The entry block, when any block exists.
    pub fn entry(&self) -> Option<&BasicBlock> {
        self.blocks.first()
    }

    /// Index of the block with the given label.
    pub fn block_index(&self, label: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.label == label)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "func @{}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} %{}", p.ty, p.name)?;
        }
        writeln!(f, ") -> {} {{", self.ret_type)?;
        for bb in &self.blocks {
            write!(f, "{}", bb)?;
        }
        writeln!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_index_lookup() {
        let mut func = Function::new("main", Type::I64, vec![]);
        func.blocks.push(BasicBlock::new("entry"));
        func.blocks.push(BasicBlock::new("body"));
        assert_eq!(func.block_index("body"), Some(1));
        assert_eq!(func.block_index("missing"), None);
        assert_eq!(func.entry().map(|b| b.label.as_str()), Some("entry"));
    }

    #[test]
    fn test_display_signature() {
        let func = Function::new(
            "max",
            Type::I64,
            vec![Param::new("a", Type::I64, 0), Param::new("b", Type::I64, 1)],
        );
        assert!(func.to_string().starts_with("func @max(i64 %a, i64 %b) -> i64 {"));
    }
}
