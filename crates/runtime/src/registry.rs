//! Extern helper registration.
//!
//! The VM resolves `call` against an extern declaration by looking the
//! symbol name up here. Each record carries the helper's ABI signature and
//! an `invoke` adapter that marshals between the VM's value shapes and the
//! underlying `extern "C"` function: `i64`/`f64` by value, `str` as a
//! pointer-width handle whose refcount is not adjusted across the call,
//! `ptr` as a raw pointer. Built-ins register once at process start;
//! collaborator libraries add their own records through `register_extern`.

use crate::io;
use crate::string::RtStr;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

/// ABI-level type of a helper parameter or return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiType {
    Void,
    /// Covers all IL integer widths and i1 at the call boundary.
    I64,
    F64,
    Str,
    Ptr,
}

/// ABI-level value crossing the helper boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AbiValue {
    Void,
    I64(i64),
    F64(f64),
    Str(RtStr),
    Ptr(usize),
}

impl AbiValue {
    pub fn abi_type(&self) -> AbiType {
        match self {
            AbiValue::Void => AbiType::Void,
            AbiValue::I64(_) => AbiType::I64,
            AbiValue::F64(_) => AbiType::F64,
            AbiValue::Str(_) => AbiType::Str,
            AbiValue::Ptr(_) => AbiType::Ptr,
        }
    }
}

/// Registration record for one native helper.
#[derive(Clone, Copy)]
pub struct RtExtern {
    pub name: &'static str,
    pub params: &'static [AbiType],
    pub ret: AbiType,
    /// Marshaling adapter around the C-ABI function pointer.
    pub invoke: fn(&[AbiValue]) -> AbiValue,
}

static REGISTRY: OnceLock<Mutex<HashMap<&'static str, RtExtern>>> = OnceLock::new();

fn registry() -> &'static Mutex<HashMap<&'static str, RtExtern>> {
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Add (or replace) a helper record.
pub fn register_extern(ext: RtExtern) {
    registry()
        .lock()
        .expect("extern registry poisoned")
        .insert(ext.name, ext);
}

/// Resolve a helper by symbol name.
pub fn lookup_extern(name: &str) -> Option<RtExtern> {
    let reg = registry().lock().expect("extern registry poisoned");
    if reg.is_empty() {
        drop(reg);
        register_builtins();
        return registry()
            .lock()
            .expect("extern registry poisoned")
            .get(name)
            .copied();
    }
    reg.get(name).copied()
}

fn expect_i64(v: &AbiValue) -> i64 {
    match v {
        AbiValue::I64(n) => *n,
        _ => 0,
    }
}

fn expect_f64(v: &AbiValue) -> f64 {
    match v {
        AbiValue::F64(n) => *n,
        _ => 0.0,
    }
}

fn expect_str(v: &AbiValue) -> RtStr {
    match v {
        AbiValue::Str(s) => *s,
        _ => RtStr::EMPTY,
    }
}

/// Register the built-in helper set the driver and tests rely on.
///
/// Idempotent; safe to call from multiple entry points.
pub fn register_builtins() {
    use AbiType::*;
    let builtins: &[RtExtern] = &[
        RtExtern {
            name: "rt_print_str",
            params: &[Str],
            ret: Void,
            invoke: |args| {
                io::rt_print_str(expect_str(&args[0]));
                AbiValue::Void
            },
        },
        RtExtern {
            name: "rt_print_i64",
            params: &[I64],
            ret: Void,
            invoke: |args| {
                io::rt_print_i64(expect_i64(&args[0]));
                AbiValue::Void
            },
        },
        RtExtern {
            name: "rt_print_f64",
            params: &[F64],
            ret: Void,
            invoke: |args| {
                io::rt_print_f64(expect_f64(&args[0]));
                AbiValue::Void
            },
        },
        RtExtern {
            name: "rt_len",
            params: &[Str],
            ret: I64,
            invoke: |args| AbiValue::I64(crate::string::rt_str_len(expect_str(&args[0]))),
        },
        RtExtern {
            name: "rt_concat",
            params: &[Str, Str],
            ret: Str,
            invoke: |args| {
                AbiValue::Str(crate::string::rt_str_concat(
                    expect_str(&args[0]),
                    expect_str(&args[1]),
                ))
            },
        },
        RtExtern {
            name: "rt_str_eq",
            params: &[Str, Str],
            ret: I64,
            invoke: |args| {
                AbiValue::I64(crate::string::rt_str_eq(
                    expect_str(&args[0]),
                    expect_str(&args[1]),
                ))
            },
        },
        RtExtern {
            name: "rt_substr",
            params: &[Str, I64, I64],
            ret: Str,
            invoke: |args| {
                AbiValue::Str(crate::string::rt_str_substr(
                    expect_str(&args[0]),
                    expect_i64(&args[1]),
                    expect_i64(&args[2]),
                ))
            },
        },
        RtExtern {
            name: "rt_to_int",
            params: &[Str],
            ret: I64,
            invoke: |args| AbiValue::I64(io::rt_to_int(expect_str(&args[0]))),
        },
        RtExtern {
            name: "rt_input_line",
            params: &[],
            ret: Str,
            invoke: |_| AbiValue::Str(io::rt_input_line()),
        },
        RtExtern {
            name: "rt_arg_count",
            params: &[],
            ret: I64,
            invoke: |_| AbiValue::I64(crate::args::rt_arg_count()),
        },
        RtExtern {
            name: "rt_arg_at",
            params: &[I64],
            ret: Str,
            invoke: |args| AbiValue::Str(crate::args::rt_arg_at(expect_i64(&args[0]))),
        },
        RtExtern {
            name: "rt_obj_new_i64",
            params: &[I64, I64],
            ret: Ptr,
            invoke: |args| {
                AbiValue::Ptr(crate::object::rt_obj_new_i64(
                    expect_i64(&args[0]),
                    expect_i64(&args[1]),
                ) as usize)
            },
        },
    ];
    let mut reg = registry().lock().expect("extern registry poisoned");
    for ext in builtins {
        reg.entry(ext.name).or_insert(*ext);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_builtin_lookup() {
        register_builtins();
        let len = lookup_extern("rt_len").expect("rt_len registered");
        assert_eq!(len.params, &[AbiType::Str]);
        assert_eq!(len.ret, AbiType::I64);
        let s = RtStr::from_bytes(b"four");
        assert_eq!((len.invoke)(&[AbiValue::Str(s)]), AbiValue::I64(4));
        assert!(lookup_extern("rt_nonexistent").is_none());
    }

    #[test]
    #[serial]
    fn test_register_custom_extern() {
        register_extern(RtExtern {
            name: "rt_test_double",
            params: &[AbiType::I64],
            ret: AbiType::I64,
            invoke: |args| match args[0] {
                AbiValue::I64(n) => AbiValue::I64(n * 2),
                _ => AbiValue::I64(0),
            },
        });
        let ext = lookup_extern("rt_test_double").unwrap();
        assert_eq!((ext.invoke)(&[AbiValue::I64(21)]), AbiValue::I64(42));
    }

    #[test]
    #[serial]
    fn test_concat_refcount_contract() {
        register_builtins();
        let concat = lookup_extern("rt_concat").unwrap();
        let a = RtStr::from_bytes(b"left side is heap allocated");
        let b = RtStr::from_bytes(b"right side is heap allocated");
        let before = a.refcount();
        let out = (concat.invoke)(&[AbiValue::Str(a), AbiValue::Str(b)]);
        // Helper does not adjust the refcount of its arguments.
        assert_eq!(a.refcount(), before);
        if let AbiValue::Str(s) = out {
            assert_eq!(s.refcount(), 1);
            s.release();
        } else {
            panic!("expected string result");
        }
        a.release();
        b.release();
    }
}
