//! SSA operand values.

use std::fmt;

/// Tagged value used as operands in IL instructions.
///
/// Temps reference a dense non-negative id scoped to the enclosing function;
/// their types derive from the defining instruction. Integer literals are
/// polymorphic over the integer widths until checked against an opcode
/// signature.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Reference to a function-local temporary by dense id.
    Temp(u32),
    /// 64-bit signed integer constant.
    ConstInt(i64),
    /// 64-bit float constant.
    ConstFloat(f64),
    /// String literal bytes (used by `trap.err` messages and tests).
    ConstStr(String),
    /// Address of a module global, by name.
    GlobalAddr(String),
    /// Null pointer-family constant.
    NullPtr,
}

impl Value {
    pub fn temp(id: u32) -> Value {
        Value::Temp(id)
    }

    pub fn const_int(v: i64) -> Value {
        Value::ConstInt(v)
    }

    pub fn const_float(v: f64) -> Value {
        Value::ConstFloat(v)
    }

    pub fn const_str(s: impl Into<String>) -> Value {
        Value::ConstStr(s.into())
    }

    pub fn global(name: impl Into<String>) -> Value {
        Value::GlobalAddr(name.into())
    }

    pub fn null() -> Value {
        Value::NullPtr
    }
}

/// Escape a byte string for a double-quoted IL literal.
///
/// Printable ASCII passes through; quotes and backslashes are escaped; all
/// other bytes use `\xHH` so serialized text stays pure ASCII.
pub fn escape_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{:02x}", b)),
        }
    }
    out
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Temp(id) => write!(f, "%t{}", id),
            Value::ConstInt(v) => write!(f, "{}", v),
            Value::ConstFloat(v) => {
                // Keep a decimal point so the parser reads it back as a float.
                if v.fract() == 0.0 && v.is_finite() {
                    write!(f, "{:.1}", v)
                } else {
                    write!(f, "{}", v)
                }
            }
            Value::ConstStr(s) => write!(f, "\"{}\"", escape_string(s.as_bytes())),
            Value::GlobalAddr(name) => write!(f, "@{}", name),
            Value::NullPtr => write!(f, "null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_forms() {
        assert_eq!(Value::temp(3).to_string(), "%t3");
        assert_eq!(Value::const_int(-7).to_string(), "-7");
        assert_eq!(Value::const_float(2.0).to_string(), "2.0");
        assert_eq!(Value::const_float(1.5).to_string(), "1.5");
        assert_eq!(Value::global("msg").to_string(), "@msg");
        assert_eq!(Value::null().to_string(), "null");
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(
            Value::const_str("a\"b\\c\n").to_string(),
            "\"a\\\"b\\\\c\\n\""
        );
        assert_eq!(escape_string(&[0x01, b'A']), "\\x01A");
    }
}
