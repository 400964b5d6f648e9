//! Basic blocks and typed block parameters.

use crate::instr::Instr;
use crate::types::Type;
use std::fmt;

/// Typed parameter of a function or basic block.
///
/// Block parameters replace φ-nodes: every branch to the block supplies one
/// argument per parameter. `id` is the dense temp id the parameter defines.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    pub id: u32,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Type, id: u32) -> Self {
        Param {
            name: name.into(),
            ty,
            id,
        }
    }
}

/// Sequence of instructions ending in a terminator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BasicBlock {
    /// Label unique within the enclosing function.
    pub label: String,
    /// Typed block parameters; handler blocks carry exactly
    /// `(error, resume_tok)`.
    pub params: Vec<Param>,
    pub instructions: Vec<Instr>,
    /// Set once a terminator has been appended.
    pub terminated: bool,
}

impl BasicBlock {
    pub fn new(label: impl Into<String>) -> Self {
        BasicBlock {
            label: label.into(),
            params: Vec::new(),
            instructions: Vec::new(),
            terminated: false,
        }
    }

    pub fn with_params(label: impl Into<String>, params: Vec<Param>) -> Self {
        BasicBlock {
            label: label.into(),
            params,
            instructions: Vec::new(),
            terminated: false,
        }
    }

    /// Append an instruction, updating the terminated flag.
    pub fn push(&mut self, instr: Instr) {
        if instr.is_terminator() {
            self.terminated = true;
        }
        self.instructions.push(instr);
    }

    /// The terminator, when the block is well-formed.
    pub fn terminator(&self) -> Option<&Instr> {
        self.instructions.last().filter(|i| i.is_terminator())
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)?;
        if !self.params.is_empty() {
            write!(f, "(")?;
            for (i, p) in self.params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "%{}: {}", p.name, p.ty)?;
            }
            write!(f, ")")?;
        }
        writeln!(f, ":")?;
        for instr in &self.instructions {
            writeln!(f, "  {}", instr)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::Opcode;
    use crate::value::Value;

    #[test]
    fn test_push_tracks_termination() {
        let mut bb = BasicBlock::new("entry");
        assert!(!bb.terminated);
        let mut ret = Instr::new(Opcode::Ret);
        ret.operands.push(Value::const_int(0));
        bb.push(ret);
        assert!(bb.terminated);
        assert!(bb.terminator().is_some());
    }

    #[test]
    fn test_display_with_params() {
        let bb = BasicBlock::with_params(
            "handler",
            vec![
                Param::new("err", Type::Error, 0),
                Param::new("tok", Type::ResumeTok, 1),
            ],
        );
        assert!(
            bb.to_string()
                .starts_with("handler(%err: error, %tok: resume_tok):")
        );
    }
}
