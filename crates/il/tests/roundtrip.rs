//! Serializer/parser round-trips and end-to-end verification of parsed text.

use viper_il::io::{parse_module, serialize_module};
use viper_il::{Type, verify, verify_all};

/// Canonical fixpoint: serializing a parsed module and re-parsing yields
/// the same canonical text.
fn assert_roundtrip(text: &str) {
    let module = parse_module(text, 1).expect("initial parse");
    let canonical = serialize_module(&module);
    let reparsed = parse_module(&canonical, 1).expect("reparse of canonical form");
    assert_eq!(
        serialize_module(&reparsed),
        canonical,
        "canonical form must be a serializer fixpoint"
    );
}

#[test]
fn test_roundtrip_minimal() {
    assert_roundtrip("func @main() -> i64 {\nentry:\n  ret 0\n}\n");
}

#[test]
fn test_roundtrip_externs_and_globals() {
    assert_roundtrip(
        "il 0.1\n\
         extern @rt_print_str(str) -> void\n\
         extern @rt_len(str) -> i64\n\
         global const str @msg = \"hi\\n\"\n\
         global const str @bytes = \"\\001\\002\"\n\
         func @main() -> i64 {\n\
         entry:\n\
         \x20 %s = const_str @msg\n\
         \x20 call @rt_print_str(%s)\n\
         \x20 ret 0\n\
         }\n",
    );
}

#[test]
fn test_roundtrip_control_flow_with_block_params() {
    assert_roundtrip(
        "func @main() -> i64 {\n\
         entry:\n\
         \x20 br loop(0, 10)\n\
         loop(%acc: i64, %n: i64):\n\
         \x20 %done = scmp_le %n, 0\n\
         \x20 cbr %done, exit(%acc), step(%acc, %n)\n\
         step(%a: i64, %m: i64):\n\
         \x20 %a2 = add %a, %m\n\
         \x20 %m2 = sub %m, 1\n\
         \x20 br loop(%a2, %m2)\n\
         exit(%r: i64):\n\
         \x20 ret %r\n\
         }\n",
    );
}

#[test]
fn test_roundtrip_eh_constructs() {
    assert_roundtrip(
        "func @main() -> i64 {\n\
         entry:\n\
         \x20 eh.push handler\n\
         \x20 br body\n\
         body:\n\
         \x20 %r = sdiv.chk0 10, 0\n\
         \x20 eh.pop\n\
         \x20 ret 42\n\
         handler(%err: error, %tok: resume_tok):\n\
         \x20 %k = err.get_kind %err\n\
         \x20 resume.next %tok\n\
         }\n",
    );
}

#[test]
fn test_roundtrip_memory_and_conversions() {
    assert_roundtrip(
        "func @main() -> i64 {\n\
         entry:\n\
         \x20 %p = alloca 16\n\
         \x20 %q = gep %p, 8\n\
         \x20 store i64, %q, 5\n\
         \x20 %v = load i64, %q\n\
         \x20 %f = sitofp %v\n\
         \x20 %g = fadd %f, 0.5\n\
         \x20 %w = fptosi %g\n\
         \x20 %null = const_null ptr\n\
         \x20 ret %w\n\
         }\n",
    );
}

#[test]
fn test_parsed_modules_verify() {
    let text = "extern @rt_len(str) -> i64\n\
                global const str @msg = \"abc\"\n\
                func @main() -> i64 {\n\
                entry:\n\
                \x20 %s = const_str @msg\n\
                \x20 %n = call @rt_len(%s)\n\
                \x20 ret %n\n\
                }\n";
    let module = parse_module(text, 1).expect("parse");
    assert!(verify(&module).is_ok(), "{:?}", verify_all(&module));
}

#[test]
fn test_parse_preserves_types() {
    let text = "func @main() -> i32 {\n\
                entry:\n\
                \x20 %p = alloca 4\n\
                \x20 store i32, %p, 7\n\
                \x20 %v = load i32, %p\n\
                \x20 ret %v\n\
                }\n";
    let module = parse_module(text, 1).expect("parse");
    let load = &module.functions[0].blocks[0].instructions[2];
    assert_eq!(load.ty, Type::I32);
    assert!(verify(&module).is_ok());
}

#[test]
fn test_verifier_rejects_parsed_garbage() {
    // Well-formed text, ill-typed program: cbr condition is an i64.
    let text = "func @main() -> i64 {\n\
                entry:\n\
                \x20 %x = add 1, 2\n\
                \x20 cbr %x, a, b\n\
                a:\n\
                \x20 ret 1\n\
                b:\n\
                \x20 ret 2\n\
                }\n";
    let module = parse_module(text, 1).expect("parse");
    let diags = verify_all(&module);
    assert!(!diags.is_empty());
    assert!(diags.iter().any(|d| d.message.contains("cbr")), "{:?}", diags);
}

#[test]
fn test_serializer_output_is_ascii() {
    let text = "global const str @g = \"\\xff\\x00ascii\"\n";
    let module = parse_module(text, 1).expect("parse");
    let out = serialize_module(&module);
    assert!(out.is_ascii());
    // Bytes survive the octal re-encoding.
    let reparsed = parse_module(&out, 1).expect("reparse");
    assert_eq!(reparsed.globals[0].init, vec![0xff, 0x00, b'a', b's', b'c', b'i', b'i']);
}
