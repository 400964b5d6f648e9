//! Instruction opcodes and their static signatures.
//!
//! Every opcode carries one entry in the signature table consulted by both
//! the verifier and the VM: operand arity and type rules, the result-type
//! rule, terminator status, and how many successor labels it names. Keeping
//! this in one place means the parser, verifier, and interpreter cannot
//! drift apart on an opcode's shape.

use crate::types::Type;
use std::fmt;

/// All instruction opcodes defined by the IL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    // Integer arithmetic (wrapping two's complement)
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    // Checked integer arithmetic: traps instead of wrapping / dividing by zero
    IAddChkOvf,
    ISubChkOvf,
    IMulChkOvf,
    SDivChk0,
    SDivChkOvf,
    SRemChk0,
    // Bitwise and shifts
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
    // Float arithmetic
    FAdd,
    FSub,
    FMul,
    FDiv,
    // Integer comparisons (produce i1)
    ICmpEq,
    ICmpNe,
    SCmpLt,
    SCmpLe,
    SCmpGt,
    SCmpGe,
    UCmpLt,
    UCmpLe,
    UCmpGt,
    UCmpGe,
    // Float comparisons (ordered, produce i1)
    FCmpEq,
    FCmpNe,
    FCmpLt,
    FCmpLe,
    FCmpGt,
    FCmpGe,
    // Conversions
    Sitofp,
    Fptosi,
    Zext1,
    Trunc1,
    // Memory
    Alloca,
    Load,
    Store,
    Gep,
    AddrOf,
    ConstStr,
    ConstNull,
    // Calls
    Call,
    // Control
    Br,
    CBr,
    Ret,
    Trap,
    // Exception handling
    EhPush,
    EhPop,
    EhEntry,
    TrapFromErr,
    TrapErr,
    TrapKind,
    ErrGetKind,
    ErrGetCode,
    ErrGetIp,
    ErrGetLine,
    ResumeSame,
    ResumeNext,
    ResumeLabel,
}

/// Count of opcodes, for dispatch tables indexed by `Opcode as usize`.
pub const OPCODE_COUNT: usize = Opcode::ResumeLabel as usize + 1;

/// Per-operand type requirement in an opcode signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandRule {
    /// Exactly this type.
    Exact(Type),
    /// Any of i16 / i32 / i64 (integer literals satisfy this).
    AnyInt,
    /// Must match the type of operand 0.
    SameAsFirst,
}

/// How an opcode's result type is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultRule {
    /// No result temp allowed.
    None,
    /// Always this type.
    Exact(Type),
    /// Result type equals the type of operand 0 (integer arith).
    SameAsOperand,
    /// Result type is the instruction's `ty` field (load, zext1, const_null).
    FromInstrType,
    /// Result type comes from the callee signature; result temp optional.
    FromCallee,
}

/// Successor-label arity for an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelShape {
    None,
    /// One target; carries one branch-argument vector (`br`, `resume.label`)
    /// or none (`eh.push`, which names a handler rather than branching).
    One,
    /// Two targets with two branch-argument vectors (`cbr`).
    Two,
}

/// Static description of an opcode's shape.
#[derive(Debug, Clone, Copy)]
pub struct OpSignature {
    pub mnemonic: &'static str,
    pub operands: &'static [OperandRule],
    pub result: ResultRule,
    pub terminator: bool,
    pub labels: LabelShape,
}

use self::LabelShape as L;
use self::OperandRule::*;
use self::ResultRule as R;

const fn sig(
    mnemonic: &'static str,
    operands: &'static [OperandRule],
    result: ResultRule,
    terminator: bool,
    labels: LabelShape,
) -> OpSignature {
    OpSignature {
        mnemonic,
        operands,
        result,
        terminator,
        labels,
    }
}

const INT_BIN: &[OperandRule] = &[AnyInt, SameAsFirst];
const FLOAT_BIN: &[OperandRule] = &[Exact(Type::F64), Exact(Type::F64)];
const ERR_OPERAND: &[OperandRule] = &[Exact(Type::Error)];
const TOK_OPERAND: &[OperandRule] = &[Exact(Type::ResumeTok)];

impl Opcode {
    /// The opcode's static signature.
    pub fn signature(self) -> &'static OpSignature {
        static SIGS: [OpSignature; OPCODE_COUNT] = [
            // Integer arithmetic
            sig("add", INT_BIN, R::SameAsOperand, false, L::None),
            sig("sub", INT_BIN, R::SameAsOperand, false, L::None),
            sig("mul", INT_BIN, R::SameAsOperand, false, L::None),
            sig("sdiv", INT_BIN, R::SameAsOperand, false, L::None),
            sig("udiv", INT_BIN, R::SameAsOperand, false, L::None),
            sig("srem", INT_BIN, R::SameAsOperand, false, L::None),
            sig("urem", INT_BIN, R::SameAsOperand, false, L::None),
            sig("iadd.chk_ovf", INT_BIN, R::SameAsOperand, false, L::None),
            sig("isub.chk_ovf", INT_BIN, R::SameAsOperand, false, L::None),
            sig("imul.chk_ovf", INT_BIN, R::SameAsOperand, false, L::None),
            sig("sdiv.chk0", INT_BIN, R::SameAsOperand, false, L::None),
            sig("sdiv.chk_ovf", INT_BIN, R::SameAsOperand, false, L::None),
            sig("srem.chk0", INT_BIN, R::SameAsOperand, false, L::None),
            // Bitwise and shifts
            sig("and", INT_BIN, R::SameAsOperand, false, L::None),
            sig("or", INT_BIN, R::SameAsOperand, false, L::None),
            sig("xor", INT_BIN, R::SameAsOperand, false, L::None),
            sig("shl", INT_BIN, R::SameAsOperand, false, L::None),
            sig("lshr", INT_BIN, R::SameAsOperand, false, L::None),
            sig("ashr", INT_BIN, R::SameAsOperand, false, L::None),
            // Float arithmetic
            sig("fadd", FLOAT_BIN, R::Exact(Type::F64), false, L::None),
            sig("fsub", FLOAT_BIN, R::Exact(Type::F64), false, L::None),
            sig("fmul", FLOAT_BIN, R::Exact(Type::F64), false, L::None),
            sig("fdiv", FLOAT_BIN, R::Exact(Type::F64), false, L::None),
            // Integer comparisons
            sig("icmp_eq", INT_BIN, R::Exact(Type::I1), false, L::None),
            sig("icmp_ne", INT_BIN, R::Exact(Type::I1), false, L::None),
            sig("scmp_lt", INT_BIN, R::Exact(Type::I1), false, L::None),
            sig("scmp_le", INT_BIN, R::Exact(Type::I1), false, L::None),
            sig("scmp_gt", INT_BIN, R::Exact(Type::I1), false, L::None),
            sig("scmp_ge", INT_BIN, R::Exact(Type::I1), false, L::None),
            sig("ucmp_lt", INT_BIN, R::Exact(Type::I1), false, L::None),
            sig("ucmp_le", INT_BIN, R::Exact(Type::I1), false, L::None),
            sig("ucmp_gt", INT_BIN, R::Exact(Type::I1), false, L::None),
            sig("ucmp_ge", INT_BIN, R::Exact(Type::I1), false, L::None),
            // Float comparisons
            sig("fcmp_eq", FLOAT_BIN, R::Exact(Type::I1), false, L::None),
            sig("fcmp_ne", FLOAT_BIN, R::Exact(Type::I1), false, L::None),
            sig("fcmp_lt", FLOAT_BIN, R::Exact(Type::I1), false, L::None),
            sig("fcmp_le", FLOAT_BIN, R::Exact(Type::I1), false, L::None),
            sig("fcmp_gt", FLOAT_BIN, R::Exact(Type::I1), false, L::None),
            sig("fcmp_ge", FLOAT_BIN, R::Exact(Type::I1), false, L::None),
            // Conversions
            sig("sitofp", &[AnyInt], R::Exact(Type::F64), false, L::None),
            sig("fptosi", &[Exact(Type::F64)], R::Exact(Type::I64), false, L::None),
            sig("zext1", &[Exact(Type::I1)], R::FromInstrType, false, L::None),
            sig("trunc1", &[AnyInt], R::Exact(Type::I1), false, L::None),
            // Memory
            sig("alloca", &[AnyInt], R::Exact(Type::Ptr), false, L::None),
            sig("load", &[Exact(Type::Ptr)], R::FromInstrType, false, L::None),
            // store's value operand is checked against the instruction type.
            sig("store", &[Exact(Type::Ptr), SameAsFirst], R::None, false, L::None),
            sig("gep", &[Exact(Type::Ptr), Exact(Type::I64)], R::Exact(Type::Ptr), false, L::None),
            sig("addr_of", &[Exact(Type::Ptr)], R::Exact(Type::Ptr), false, L::None),
            sig("const_str", &[Exact(Type::Ptr)], R::Exact(Type::Str), false, L::None),
            sig("const_null", &[], R::FromInstrType, false, L::None),
            // Calls
            sig("call", &[], R::FromCallee, false, L::None),
            // Control
            sig("br", &[], R::None, true, L::One),
            sig("cbr", &[Exact(Type::I1)], R::None, true, L::Two),
            sig("ret", &[], R::None, true, L::None),
            sig("trap", &[], R::None, true, L::None),
            // Exception handling
            sig("eh.push", &[], R::None, false, L::One),
            sig("eh.pop", &[], R::None, false, L::None),
            sig("eh.entry", &[], R::None, false, L::None),
            sig("trap.from_err", &[AnyInt], R::None, true, L::None),
            sig("trap.err", &[AnyInt, Exact(Type::Str)], R::Exact(Type::Error), false, L::None),
            sig("trap.kind", &[], R::Exact(Type::I64), false, L::None),
            sig("err.get_kind", ERR_OPERAND, R::Exact(Type::I32), false, L::None),
            sig("err.get_code", ERR_OPERAND, R::Exact(Type::I32), false, L::None),
            sig("err.get_ip", ERR_OPERAND, R::Exact(Type::I64), false, L::None),
            sig("err.get_line", ERR_OPERAND, R::Exact(Type::I32), false, L::None),
            sig("resume.same", TOK_OPERAND, R::None, true, L::None),
            sig("resume.next", TOK_OPERAND, R::None, true, L::None),
            sig("resume.label", TOK_OPERAND, R::None, true, L::One),
        ];
        &SIGS[self as usize]
    }

    /// Lowercase mnemonic as it appears in IL text.
    pub fn mnemonic(self) -> &'static str {
        self.signature().mnemonic
    }

    /// Whether this opcode ends a basic block.
    pub fn is_terminator(self) -> bool {
        self.signature().terminator
    }

    /// Resolve a mnemonic back to its opcode.
    pub fn parse(mnemonic: &str) -> Option<Opcode> {
        ALL_OPCODES
            .iter()
            .copied()
            .find(|op| op.mnemonic() == mnemonic)
    }
}

/// Every opcode, in discriminant order.
pub const ALL_OPCODES: [Opcode; OPCODE_COUNT] = [
    Opcode::Add,
    Opcode::Sub,
    Opcode::Mul,
    Opcode::SDiv,
    Opcode::UDiv,
    Opcode::SRem,
    Opcode::URem,
    Opcode::IAddChkOvf,
    Opcode::ISubChkOvf,
    Opcode::IMulChkOvf,
    Opcode::SDivChk0,
    Opcode::SDivChkOvf,
    Opcode::SRemChk0,
    Opcode::And,
    Opcode::Or,
    Opcode::Xor,
    Opcode::Shl,
    Opcode::LShr,
    Opcode::AShr,
    Opcode::FAdd,
    Opcode::FSub,
    Opcode::FMul,
    Opcode::FDiv,
    Opcode::ICmpEq,
    Opcode::ICmpNe,
    Opcode::SCmpLt,
    Opcode::SCmpLe,
    Opcode::SCmpGt,
    Opcode::SCmpGe,
    Opcode::UCmpLt,
    Opcode::UCmpLe,
    Opcode::UCmpGt,
    Opcode::UCmpGe,
    Opcode::FCmpEq,
    Opcode::FCmpNe,
    Opcode::FCmpLt,
    Opcode::FCmpLe,
    Opcode::FCmpGt,
    Opcode::FCmpGe,
    Opcode::Sitofp,
    Opcode::Fptosi,
    Opcode::Zext1,
    Opcode::Trunc1,
    Opcode::Alloca,
    Opcode::Load,
    Opcode::Store,
    Opcode::Gep,
    Opcode::AddrOf,
    Opcode::ConstStr,
    Opcode::ConstNull,
    Opcode::Call,
    Opcode::Br,
    Opcode::CBr,
    Opcode::Ret,
    Opcode::Trap,
    Opcode::EhPush,
    Opcode::EhPop,
    Opcode::EhEntry,
    Opcode::TrapFromErr,
    Opcode::TrapErr,
    Opcode::TrapKind,
    Opcode::ErrGetKind,
    Opcode::ErrGetCode,
    Opcode::ErrGetIp,
    Opcode::ErrGetLine,
    Opcode::ResumeSame,
    Opcode::ResumeNext,
    Opcode::ResumeLabel,
];

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}
