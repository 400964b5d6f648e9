//! Process-wide argument store.
//!
//! The driver snapshots the program's arguments once at startup; IL programs
//! read them back through `rt_arg_count` / `rt_arg_at`. Shares the runtime's
//! global-lock discipline with the heap registry.

use crate::string::RtStr;
use std::sync::{Mutex, OnceLock};

static ARGS: OnceLock<Mutex<Vec<String>>> = OnceLock::new();

fn args() -> &'static Mutex<Vec<String>> {
    ARGS.get_or_init(|| Mutex::new(Vec::new()))
}

/// Install the program arguments. Later calls replace the snapshot.
pub fn rt_args_init(values: &[String]) {
    *args().lock().expect("args store poisoned") = values.to_vec();
}

/// Number of stored arguments (C ABI).
#[unsafe(no_mangle)]
pub extern "C" fn rt_arg_count() -> i64 {
    args().lock().expect("args store poisoned").len() as i64
}

/// Argument at `index` as a fresh string handle; out of range yields the
/// empty string (C ABI). The caller owns the returned reference.
#[unsafe(no_mangle)]
pub extern "C" fn rt_arg_at(index: i64) -> RtStr {
    if index < 0 {
        return RtStr::EMPTY;
    }
    let guard = args().lock().expect("args store poisoned");
    match guard.get(index as usize) {
        Some(value) => RtStr::from_bytes(value.as_bytes()),
        None => RtStr::EMPTY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_args_round_trip() {
        rt_args_init(&["prog".to_string(), "input.il".to_string()]);
        assert_eq!(rt_arg_count(), 2);
        let arg = rt_arg_at(1);
        assert_eq!(arg.as_bytes(), b"input.il");
        arg.release();
        assert_eq!(rt_arg_at(5), RtStr::EMPTY);
        assert_eq!(rt_arg_at(-1), RtStr::EMPTY);
        rt_args_init(&[]);
        assert_eq!(rt_arg_count(), 0);
    }
}
