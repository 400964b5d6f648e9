//! Console I/O helpers reachable from IL via extern declarations.
//!
//! Output goes to stdout; the input source defaults to stdin and can be
//! redirected to a file by the driver's `--stdin` flag before the VM runs.

use crate::string::RtStr;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::sync::{Mutex, OnceLock};

static INPUT: OnceLock<Mutex<Option<BufReader<File>>>> = OnceLock::new();

fn input() -> &'static Mutex<Option<BufReader<File>>> {
    INPUT.get_or_init(|| Mutex::new(None))
}

/// Redirect `rt_input_line` to read from `path` instead of stdin.
pub fn set_input_path(path: &str) -> std::io::Result<()> {
    let file = File::open(path)?;
    *input().lock().expect("input source poisoned") = Some(BufReader::new(file));
    Ok(())
}

/// Restore the default stdin input source.
pub fn reset_input() {
    *input().lock().expect("input source poisoned") = None;
}

/// Print a string to stdout, no trailing newline (C ABI).
#[unsafe(no_mangle)]
pub extern "C" fn rt_print_str(s: RtStr) {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let _ = out.write_all(s.as_bytes());
    let _ = out.flush();
}

/// Print a decimal integer followed by a newline (C ABI).
#[unsafe(no_mangle)]
pub extern "C" fn rt_print_i64(value: i64) {
    println!("{}", value);
}

/// Print a float followed by a newline (C ABI).
#[unsafe(no_mangle)]
pub extern "C" fn rt_print_f64(value: f64) {
    println!("{}", value);
}

/// Read one line from the input source, without the trailing newline.
///
/// Returns the empty string at end of input (C ABI).
#[unsafe(no_mangle)]
pub extern "C" fn rt_input_line() -> RtStr {
    let mut line = String::new();
    let n = {
        let mut guard = input().lock().expect("input source poisoned");
        match guard.as_mut() {
            Some(reader) => reader.read_line(&mut line),
            None => std::io::stdin().lock().read_line(&mut line),
        }
    };
    match n {
        Ok(0) | Err(_) => RtStr::EMPTY,
        Ok(_) => {
            while line.ends_with('\n') || line.ends_with('\r') {
                line.pop();
            }
            RtStr::from_bytes(line.as_bytes())
        }
    }
}

/// Parse a string as a decimal integer; malformed input yields 0 (C ABI).
#[unsafe(no_mangle)]
pub extern "C" fn rt_to_int(s: RtStr) -> i64 {
    std::str::from_utf8(s.as_bytes())
        .ok()
        .and_then(|t| t.trim().parse::<i64>().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_int_parses_and_defaults() {
        assert_eq!(rt_to_int(RtStr::from_bytes(b"42")), 42);
        assert_eq!(rt_to_int(RtStr::from_bytes(b"  -7 ")), -7);
        assert_eq!(rt_to_int(RtStr::from_bytes(b"abc")), 0);
        assert_eq!(rt_to_int(RtStr::EMPTY), 0);
    }
}
