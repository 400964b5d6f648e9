//! Instruction representation.

use crate::opcode::Opcode;
use crate::types::Type;
use crate::value::Value;
use std::fmt;
use viper_support::SourceLoc;

/// Instruction within a basic block.
///
/// `labels` and `br_args` run in parallel: `br_args[i]` is the block-argument
/// vector supplied to successor `labels[i]`. Non-branching opcodes leave both
/// empty (`eh.push` names a handler label but passes no arguments).
#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    /// Destination temp id, when the opcode produces a result.
    pub result: Option<u32>,
    pub op: Opcode,
    /// Result type, or the memory access type for `load`/`store`.
    pub ty: Type,
    pub operands: Vec<Value>,
    /// Callee symbol for `call`.
    pub callee: Option<String>,
    /// Successor block labels.
    pub labels: Vec<String>,
    /// Per-successor block-argument vectors, parallel to `labels`.
    pub br_args: Vec<Vec<Value>>,
    pub loc: SourceLoc,
}

impl Instr {
    /// A bare instruction with the given opcode and void type.
    pub fn new(op: Opcode) -> Self {
        Instr {
            result: None,
            op,
            ty: Type::Void,
            operands: Vec::new(),
            callee: None,
            labels: Vec::new(),
            br_args: Vec::new(),
            loc: SourceLoc::UNKNOWN,
        }
    }

    pub fn with_type(op: Opcode, ty: Type) -> Self {
        let mut instr = Instr::new(op);
        instr.ty = ty;
        instr
    }

    pub fn is_terminator(&self) -> bool {
        self.op.is_terminator()
    }
}

fn write_comma_separated(f: &mut fmt::Formatter<'_>, values: &[Value]) -> fmt::Result {
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", v)?;
    }
    Ok(())
}

fn write_target(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    args: Option<&Vec<Value>>,
) -> fmt::Result {
    write!(f, "{}", label)?;
    if let Some(args) = args {
        if !args.is_empty() {
            write!(f, "(")?;
            write_comma_separated(f, args)?;
            write!(f, ")")?;
        }
    }
    Ok(())
}

impl fmt::Display for Instr {
    /// Canonical textual form, matching the parser's operand order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(result) = self.result {
            write!(f, "%t{} = ", result)?;
        }
        write!(f, "{}", self.op)?;
        match self.op {
            Opcode::Call => {
                write!(f, " @{}(", self.callee.as_deref().unwrap_or(""))?;
                write_comma_separated(f, &self.operands)?;
                write!(f, ")")
            }
            Opcode::Load => {
                write!(f, " {}, {}", self.ty, self.operands[0])
            }
            Opcode::Store => {
                write!(f, " {}, {}, {}", self.ty, self.operands[0], self.operands[1])
            }
            Opcode::ConstNull => write!(f, " {}", self.ty),
            Opcode::Zext1 => write!(f, " {}, {}", self.ty, self.operands[0]),
            Opcode::Br => {
                write!(f, " ")?;
                write_target(f, &self.labels[0], self.br_args.first())
            }
            Opcode::CBr => {
                write!(f, " {}, ", self.operands[0])?;
                write_target(f, &self.labels[0], self.br_args.first())?;
                write!(f, ", ")?;
                write_target(f, &self.labels[1], self.br_args.get(1))
            }
            Opcode::EhPush => write!(f, " {}", self.labels[0]),
            Opcode::ResumeLabel => {
                write!(f, " {}, ", self.operands[0])?;
                write_target(f, &self.labels[0], self.br_args.first())
            }
            _ => {
                if !self.operands.is_empty() {
                    write!(f, " ")?;
                    write_comma_separated(f, &self.operands)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_binary() {
        let mut instr = Instr::with_type(Opcode::Add, Type::I64);
        instr.result = Some(2);
        instr.operands = vec![Value::temp(0), Value::const_int(5)];
        assert_eq!(instr.to_string(), "%t2 = add %t0, 5");
    }

    #[test]
    fn test_display_branch_with_args() {
        let mut instr = Instr::new(Opcode::Br);
        instr.labels = vec!["loop".into()];
        instr.br_args = vec![vec![Value::temp(1), Value::const_int(0)]];
        assert_eq!(instr.to_string(), "br loop(%t1, 0)");
    }

    #[test]
    fn test_display_cbr() {
        let mut instr = Instr::new(Opcode::CBr);
        instr.operands = vec![Value::temp(0)];
        instr.labels = vec!["then".into(), "else".into()];
        instr.br_args = vec![vec![], vec![Value::const_int(1)]];
        assert_eq!(instr.to_string(), "cbr %t0, then, else(1)");
    }

    #[test]
    fn test_display_memory_forms() {
        let mut load = Instr::with_type(Opcode::Load, Type::I64);
        load.result = Some(1);
        load.operands = vec![Value::temp(0)];
        assert_eq!(load.to_string(), "%t1 = load i64, %t0");

        let mut store = Instr::with_type(Opcode::Store, Type::I64);
        store.operands = vec![Value::temp(0), Value::const_int(9)];
        assert_eq!(store.to_string(), "store i64, %t0, 9");
    }

    #[test]
    fn test_display_call() {
        let mut call = Instr::with_type(Opcode::Call, Type::I64);
        call.result = Some(4);
        call.callee = Some("rt_len".into());
        call.operands = vec![Value::temp(3)];
        assert_eq!(call.to_string(), "%t4 = call @rt_len(%t3)");
    }
}
