//! Canonical text serializer.

use crate::module::Module;
use std::fmt::Write as _;

/// Escape global initializer bytes with octal escapes so output stays pure
/// ASCII regardless of the initializer contents.
fn escape_bytes_octal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\{:03o}", b)),
        }
    }
    out
}

/// Write `module` in canonical text form into `out`.
///
/// Field order is fixed: header, externs, globals, functions. Instruction
/// rendering delegates to the `Display` impls, which match the parser's
/// per-opcode operand order.
pub fn write_module(module: &Module, out: &mut String) {
    out.push_str("il 0.1\n");
    for e in &module.externs {
        let _ = writeln!(out, "{}", e);
    }
    for g in &module.globals {
        let _ = writeln!(
            out,
            "global const {} @{} = \"{}\"",
            g.ty,
            g.name,
            escape_bytes_octal(&g.init)
        );
    }
    for f in &module.functions {
        let _ = write!(out, "{}", f);
    }
}

/// Serialize `module` into a fresh owned string.
pub fn serialize_module(module: &Module) -> String {
    let mut out = String::new();
    write_module(module, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::IrBuilder;
    use crate::types::Type;
    use crate::value::Value;
    use viper_support::SourceLoc;

    #[test]
    fn test_serialize_shape() {
        let mut module = Module::new();
        let mut b = IrBuilder::new(&mut module);
        b.add_extern("rt_print_i64", Type::Void, vec![Type::I64]);
        b.add_global_str("msg", b"hi\n");
        b.start_function("main", Type::I64, vec![]);
        b.add_block("entry");
        b.emit_ret(Some(Value::const_int(0)), SourceLoc::UNKNOWN);

        let text = serialize_module(&module);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "il 0.1");
        assert_eq!(lines[1], "extern @rt_print_i64(i64) -> void");
        assert_eq!(lines[2], "global const str @msg = \"hi\\012\"");
        assert_eq!(lines[3], "func @main() -> i64 {");
        assert_eq!(lines[4], "entry:");
        assert_eq!(lines[5], "  ret 0");
        assert_eq!(lines[6], "}");
    }

    #[test]
    fn test_octal_escaping_is_ascii() {
        let escaped = escape_bytes_octal(&[0u8, 0x7f, 0xff, b'A']);
        assert_eq!(escaped, "\\000\\177\\377A");
        assert!(escaped.is_ascii());
    }
}
