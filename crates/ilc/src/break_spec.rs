//! `--break` specification parsing.
//!
//! A spec is either a block label or a `FILE:LINE` source breakpoint. The
//! source form requires a colon followed by a positive decimal line number
//! and a non-blank file portion; everything else is treated as a label.

/// Whether `spec` names a source breakpoint (`path:line`).
pub fn is_src_break_spec(spec: &str) -> bool {
    parse_src_break_spec(spec).is_some()
}

/// Split a `FILE:LINE` spec into its parts; `None` when it is not one.
pub fn parse_src_break_spec(spec: &str) -> Option<(&str, u32)> {
    let pos = spec.rfind(':')?;
    let (file, line_part) = (&spec[..pos], &spec[pos + 1..]);
    let line_part = line_part.trim();
    if line_part.is_empty() || !line_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let line: u32 = line_part.parse().ok()?;
    if line == 0 || file.trim().is_empty() {
        return None;
    }
    Some((file, line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_specs() {
        assert_eq!(parse_src_break_spec("main.bas:10"), Some(("main.bas", 10)));
        assert_eq!(
            parse_src_break_spec("dir/sub/main.bas:3"),
            Some(("dir/sub/main.bas", 3))
        );
        assert!(is_src_break_spec("a.bas: 7 "));
    }

    #[test]
    fn test_label_specs() {
        assert!(!is_src_break_spec("entry"));
        assert!(!is_src_break_spec("loop_head"));
        assert!(!is_src_break_spec("file.bas:"));
        assert!(!is_src_break_spec("file.bas:abc"));
        assert!(!is_src_break_spec(":10"));
        assert!(!is_src_break_spec("  :10"));
        assert!(!is_src_break_spec("a.bas:0"));
    }
}
