//! Trap kinds, legacy error codes, and the error value model.
//!
//! Legacy-mapped kinds carry their legacy code as discriminant so the
//! code/kind bridge is the identity on 1..=9. `DivideByZero` has no legacy
//! origin and reports code 0.

use std::fmt;

/// Runtime trap categories, potentially catchable via EH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum TrapKind {
    DivideByZero = 0,
    FileNotFound = 1,
    Eof = 2,
    IOError = 3,
    Overflow = 4,
    InvalidCast = 5,
    DomainError = 6,
    Bounds = 7,
    InvalidOperation = 8,
    RuntimeError = 9,
}

impl TrapKind {
    /// Stable name used in the trap diagnostic wire format.
    pub fn name(self) -> &'static str {
        match self {
            TrapKind::DivideByZero => "DivideByZero",
            TrapKind::FileNotFound => "FileNotFound",
            TrapKind::Eof => "EOF",
            TrapKind::IOError => "IOError",
            TrapKind::Overflow => "Overflow",
            TrapKind::InvalidCast => "InvalidCast",
            TrapKind::DomainError => "DomainError",
            TrapKind::Bounds => "Bounds",
            TrapKind::InvalidOperation => "InvalidOperation",
            TrapKind::RuntimeError => "RuntimeError",
        }
    }
}

impl fmt::Display for TrapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Legacy runtime error codes forwarded through the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrCode {
    None = 0,
    FileNotFound = 1,
    Eof = 2,
    IOError = 3,
    Overflow = 4,
    InvalidCast = 5,
    DomainError = 6,
    Bounds = 7,
    InvalidOperation = 8,
    RuntimeError = 9,
}

/// Map a legacy error code to its trap kind; unknown codes fall back to
/// `RuntimeError`.
pub fn map_err_to_trap(err_code: i64) -> TrapKind {
    match err_code {
        1 => TrapKind::FileNotFound,
        2 => TrapKind::Eof,
        3 => TrapKind::IOError,
        4 => TrapKind::Overflow,
        5 => TrapKind::InvalidCast,
        6 => TrapKind::DomainError,
        7 => TrapKind::Bounds,
        8 => TrapKind::InvalidOperation,
        9 => TrapKind::RuntimeError,
        _ => TrapKind::RuntimeError,
    }
}

/// Map a trap kind back to its legacy code; non-legacy kinds report 0.
pub fn map_trap_to_err(kind: TrapKind) -> i32 {
    match kind {
        TrapKind::DivideByZero => 0,
        other => other as i32,
    }
}

/// Tagged error value carried in `error`-typed slots.
///
/// A "null" error (from `const_null error`) is represented by a null slot;
/// projections on it observe the VM's current-error register, whose defaults
/// are kind 0, code 0, ip 0, line -1.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorValue {
    pub kind: i32,
    pub code: i32,
    pub ip: i64,
    pub line: i32,
    pub message: String,
}

impl Default for ErrorValue {
    fn default() -> Self {
        ErrorValue {
            kind: 0,
            code: 0,
            ip: 0,
            line: -1,
            message: String::new(),
        }
    }
}

/// Payload of a raised trap before dispatch attaches a program location.
#[derive(Debug, Clone, PartialEq)]
pub struct TrapInfo {
    pub kind: TrapKind,
    pub code: i32,
    pub message: String,
}

impl TrapInfo {
    pub fn new(kind: TrapKind, message: impl Into<String>) -> Self {
        TrapInfo {
            kind,
            code: map_trap_to_err(kind),
            message: message.into(),
        }
    }

    pub fn from_code(code: i64, message: impl Into<String>) -> Self {
        let kind = map_err_to_trap(code);
        TrapInfo {
            kind,
            code: code as i32,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY_KINDS: [TrapKind; 9] = [
        TrapKind::FileNotFound,
        TrapKind::Eof,
        TrapKind::IOError,
        TrapKind::Overflow,
        TrapKind::InvalidCast,
        TrapKind::DomainError,
        TrapKind::Bounds,
        TrapKind::InvalidOperation,
        TrapKind::RuntimeError,
    ];

    #[test]
    fn test_legacy_codes_round_trip() {
        for kind in LEGACY_KINDS {
            let code = map_trap_to_err(kind);
            assert_eq!(map_err_to_trap(code as i64), kind, "{}", kind);
        }
    }

    #[test]
    fn test_non_legacy_kind_folds_to_runtime_error() {
        let code = map_trap_to_err(TrapKind::DivideByZero);
        assert_eq!(code, 0);
        assert_eq!(map_err_to_trap(code as i64), TrapKind::RuntimeError);
    }

    #[test]
    fn test_unknown_codes_fold_to_runtime_error() {
        assert_eq!(map_err_to_trap(42), TrapKind::RuntimeError);
        assert_eq!(map_err_to_trap(-3), TrapKind::RuntimeError);
    }

    #[test]
    fn test_code_mapping_table() {
        assert_eq!(map_err_to_trap(1), TrapKind::FileNotFound);
        assert_eq!(map_err_to_trap(2), TrapKind::Eof);
        assert_eq!(map_err_to_trap(3), TrapKind::IOError);
        assert_eq!(map_err_to_trap(4), TrapKind::Overflow);
        assert_eq!(map_err_to_trap(5), TrapKind::InvalidCast);
        assert_eq!(map_err_to_trap(6), TrapKind::DomainError);
        assert_eq!(map_err_to_trap(7), TrapKind::Bounds);
        assert_eq!(map_err_to_trap(8), TrapKind::InvalidOperation);
        assert_eq!(map_err_to_trap(9), TrapKind::RuntimeError);
    }

    #[test]
    fn test_null_error_defaults() {
        let e = ErrorValue::default();
        assert_eq!(e.kind, 0);
        assert_eq!(e.code, 0);
        assert_eq!(e.ip, 0);
        assert_eq!(e.line, -1);
    }
}
