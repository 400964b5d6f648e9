//! IL primitive types.

use std::fmt;

/// Scalar types the IL can name.
///
/// Types are lightweight values compared by kind. `Error` and `ResumeTok`
/// exist for the structured exception-handling opcodes: handler blocks take
/// exactly one parameter of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Type {
    #[default]
    Void,
    /// Boolean produced by comparisons and consumed by `cbr`.
    I1,
    I16,
    I32,
    I64,
    F64,
    /// Opaque address (frame `alloca` storage or a global).
    Ptr,
    /// Immutable refcounted string handle.
    Str,
    /// Tagged error value: kind, code, message, source ip, source line.
    Error,
    /// Opaque resume token tied to a dynamic EH entry.
    ResumeTok,
}

impl Type {
    /// Parse a type spelling as it appears in IL text.
    pub fn parse(s: &str) -> Option<Type> {
        match s {
            "void" => Some(Type::Void),
            "i1" => Some(Type::I1),
            "i16" => Some(Type::I16),
            "i32" => Some(Type::I32),
            "i64" => Some(Type::I64),
            "f64" => Some(Type::F64),
            "ptr" => Some(Type::Ptr),
            "str" => Some(Type::Str),
            "error" => Some(Type::Error),
            "resume_tok" => Some(Type::ResumeTok),
            _ => None,
        }
    }

    /// Whether this is one of the integer widths (excluding `i1`).
    pub fn is_int(&self) -> bool {
        matches!(self, Type::I16 | Type::I32 | Type::I64)
    }

    /// Whether `const_null` may produce this type.
    pub fn is_nullable(&self) -> bool {
        matches!(self, Type::Ptr | Type::Str | Type::Error)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Type::Void => "void",
            Type::I1 => "i1",
            Type::I16 => "i16",
            Type::I32 => "i32",
            Type::I64 => "i64",
            Type::F64 => "f64",
            Type::Ptr => "ptr",
            Type::Str => "str",
            Type::Error => "error",
            Type::ResumeTok => "resume_tok",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_display_round_trip() {
        let all = [
            Type::Void,
            Type::I1,
            Type::I16,
            Type::I32,
            Type::I64,
            Type::F64,
            Type::Ptr,
            Type::Str,
            Type::Error,
            Type::ResumeTok,
        ];
        for ty in all {
            assert_eq!(Type::parse(&ty.to_string()), Some(ty));
        }
        assert_eq!(Type::parse("i8"), None);
    }

    #[test]
    fn test_int_classification() {
        assert!(Type::I64.is_int());
        assert!(Type::I16.is_int());
        assert!(!Type::I1.is_int());
        assert!(!Type::F64.is_int());
    }
}
