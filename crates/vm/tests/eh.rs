//! Structured exception handling: catch, resume, and error projections.

mod common;

use common::{capture_trap, parse, verify_and_run};

#[test]
fn test_catch_and_resume_next() {
    let module = parse(
        "func @main() -> i64 {\n\
         entry:\n\
         \x20 eh.push handler\n\
         \x20 br body\n\
         body:\n\
         \x20 %r = sdiv.chk0 10, 0\n\
         \x20 eh.pop\n\
         \x20 ret 42\n\
         handler(%err: error, %tok: resume_tok):\n\
         \x20 resume.next %tok\n\
         }\n",
    );
    assert_eq!(verify_and_run(&module).unwrap(), 42);
}

#[test]
fn test_catch_and_resume_label() {
    let module = parse(
        "func @main() -> i64 {\n\
         entry:\n\
         \x20 eh.push handler\n\
         \x20 br body\n\
         body:\n\
         \x20 %r = sdiv.chk0 7, 0\n\
         \x20 eh.pop\n\
         \x20 ret 0\n\
         recover:\n\
         \x20 eh.pop\n\
         \x20 ret 99\n\
         handler(%err: error, %tok: resume_tok):\n\
         \x20 resume.label %tok, recover\n\
         }\n",
    );
    assert_eq!(verify_and_run(&module).unwrap(), 99);
}

#[test]
fn test_resume_same_escalates_to_outer_handler() {
    // The inner handler pops itself and retries the division; the second
    // trap must reach the outer handler, not re-enter the inner one.
    let module = parse(
        "func @main() -> i64 {\n\
         entry:\n\
         \x20 eh.push outer_handler\n\
         \x20 br setup\n\
         setup:\n\
         \x20 eh.push inner_handler\n\
         \x20 br try_block\n\
         try_block:\n\
         \x20 %r = sdiv.chk0 10, 0\n\
         \x20 eh.pop\n\
         \x20 eh.pop\n\
         \x20 ret 0\n\
         inner_handler(%err: error, %tok: resume_tok):\n\
         \x20 eh.pop\n\
         \x20 resume.same %tok\n\
         outer_handler(%err2: error, %tok2: resume_tok):\n\
         \x20 ret 77\n\
         }\n",
    );
    assert_eq!(verify_and_run(&module).unwrap(), 77);
}

#[test]
fn test_resume_same_without_outer_handler_reaches_driver() {
    // With a single handler, resume.same retries the division, the second
    // trap may not re-enter that handler, and no outer handler exists: the
    // trap reaches the driver.
    let module = parse(
        "func @main() -> i64 {\n\
         entry:\n\
         \x20 eh.push handler\n\
         \x20 br body\n\
         body:\n\
         \x20 %r = sdiv.chk0 100, 0\n\
         \x20 eh.pop\n\
         \x20 ret %r\n\
         handler(%err: error, %tok: resume_tok):\n\
         \x20 resume.same %tok\n\
         }\n",
    );
    let diag = capture_trap(&module);
    assert!(diag.contains("DivideByZero"), "{}", diag);
}

#[test]
fn test_trap_kind_read_inside_handler() {
    let module = parse(
        "func @main() -> i64 {\n\
         entry:\n\
         \x20 eh.push handler\n\
         \x20 br body\n\
         body:\n\
         \x20 %r = sdiv.chk0 1, 0\n\
         \x20 ret 0\n\
         handler(%err: error, %tok: resume_tok):\n\
         \x20 eh.entry\n\
         \x20 %k = trap.kind\n\
         \x20 ret %k\n\
         }\n",
    );
    // DivideByZero is kind 0.
    assert_eq!(verify_and_run(&module).unwrap(), 0);
}

#[test]
fn test_trap_kind_for_legacy_code() {
    let module = parse(
        "func @main() -> i64 {\n\
         entry:\n\
         \x20 eh.push handler\n\
         \x20 br body\n\
         body:\n\
         \x20 trap.from_err 7\n\
         handler(%err: error, %tok: resume_tok):\n\
         \x20 %k = trap.kind\n\
         \x20 ret %k\n\
         }\n",
    );
    // Legacy code 7 is Bounds, which carries discriminant 7.
    assert_eq!(verify_and_run(&module).unwrap(), 7);
}

#[test]
fn test_err_projections_on_caught_error() {
    let module = parse(
        "func @main() -> i64 {\n\
         entry:\n\
         \x20 eh.push handler\n\
         \x20 br body\n\
         body:\n\
         \x20 %r = sdiv.chk0 9, 0\n\
         \x20 ret 0\n\
         handler(%err: error, %tok: resume_tok):\n\
         \x20 %ip = err.get_ip %err\n\
         \x20 %sum = add %ip, %ip\n\
         \x20 ret %sum\n\
         }\n",
    );
    // The fault is instruction #0 of its block; ip + ip == 0.
    assert_eq!(verify_and_run(&module).unwrap(), 0);
}

#[test]
fn test_trap_err_kind_via_return() {
    let module = parse(
        "global const str @msg = \"io_error\"\n\
         func @main() -> i32 {\n\
         entry:\n\
         \x20 %s = const_str @msg\n\
         \x20 %e = trap.err 3, %s\n\
         \x20 %k = err.get_kind %e\n\
         \x20 ret %k\n\
         }\n",
    );
    // Code 3 maps to IOError, whose kind discriminant is 3.
    assert_eq!(verify_and_run(&module).unwrap(), 3);
}

#[test]
fn test_null_error_projections_after_priming() {
    // trap.err primes the current-error register; projections on a null
    // error observe its code but default ip/line.
    let module = parse(
        "global const str @msg = \"io_error\"\n\
         func @main() -> i32 {\n\
         entry:\n\
         \x20 %s = const_str @msg\n\
         \x20 %e = trap.err 3, %s\n\
         \x20 %n = const_null error\n\
         \x20 %c = err.get_code %n\n\
         \x20 ret %c\n\
         }\n",
    );
    assert_eq!(verify_and_run(&module).unwrap(), 3);
}

#[test]
fn test_null_error_ip_defaults_to_zero() {
    let module = parse(
        "func @main() -> i64 {\n\
         entry:\n\
         \x20 %n = const_null error\n\
         \x20 %ip = err.get_ip %n\n\
         \x20 ret %ip\n\
         }\n",
    );
    assert_eq!(verify_and_run(&module).unwrap(), 0);
}

#[test]
fn test_null_error_line_defaults_to_minus_one() {
    let module = parse(
        "func @main() -> i32 {\n\
         entry:\n\
         \x20 %n = const_null error\n\
         \x20 %l = err.get_line %n\n\
         \x20 ret %l\n\
         }\n",
    );
    assert_eq!(verify_and_run(&module).unwrap(), -1);
}

#[test]
fn test_null_error_code_defaults_to_zero() {
    let module = parse(
        "func @main() -> i32 {\n\
         entry:\n\
         \x20 %n = const_null error\n\
         \x20 %c = err.get_code %n\n\
         \x20 ret %c\n\
         }\n",
    );
    assert_eq!(verify_and_run(&module).unwrap(), 0);
}

#[test]
fn test_handler_in_caller_catches_callee_trap() {
    let module = parse(
        "func @main() -> i64 {\n\
         entry:\n\
         \x20 eh.push handler\n\
         \x20 br body\n\
         body:\n\
         \x20 %r = call @faulty()\n\
         \x20 eh.pop\n\
         \x20 ret %r\n\
         handler(%err: error, %tok: resume_tok):\n\
         \x20 %k = err.get_kind %err\n\
         \x20 ret 55\n\
         }\n\
         func @faulty() -> i64 {\n\
         entry:\n\
         \x20 %r = sdiv.chk0 3, 0\n\
         \x20 ret %r\n\
         }\n",
    );
    assert_eq!(verify_and_run(&module).unwrap(), 55);
}

