//! Viper runtime: string/object model behind the VM's extern calls.
//!
//! Key design principles:
//! - `RtStr`: pointer-width immutable string handle (heap / literal / small)
//! - `RtObjHeader`: refcounted heap object header with optional finalizer
//! - Heap registry: bounded global table backing memory watches and the
//!   cycle-aware reclamation pass
//! - Extern registry: `{symbol, params, ret, invoke}` records the VM resolves
//!   by name when executing `call` against an extern declaration
//!
//! The exported `rt_*` symbols use the host C ABI so compiled code and
//! native helper libraries share one calling convention with the VM.

pub mod args;
pub mod heap;
pub mod io;
pub mod object;
pub mod registry;
pub mod string;
pub mod string_builder;

pub use args::{rt_arg_at, rt_arg_count, rt_args_init};
pub use heap::{HeapEntry, heap_capacity, heap_teardown, live_objects};
pub use object::{
    RtObjHeader, rt_obj_class_id, rt_obj_new_i64, rt_obj_payload, rt_obj_refcount,
    rt_obj_release, rt_obj_release_check0, rt_obj_retain, rt_obj_set_finalizer,
};
pub use registry::{AbiType, AbiValue, RtExtern, lookup_extern, register_builtins, register_extern};
pub use string::{
    LiteralStr, RtStr, rt_str_concat, rt_str_eq, rt_str_len, rt_str_ref, rt_str_release,
    rt_str_substr, rt_string_from_bytes,
};
pub use string_builder::{SbStatus, StringBuilder};
