//! Interpreter tracing.
//!
//! `Il` mode emits one line per executed instruction; `Src` mode emits one
//! line per source-coordinate transition, reading source files lazily and
//! caching their lines. Trace output goes to stderr so it never mixes with
//! program output.

use std::collections::HashMap;
use viper_il::{Function, Instr};
use viper_support::SourceManager;

/// Tracing modes supported by the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraceMode {
    #[default]
    Off,
    /// One line per IL instruction.
    Il,
    /// One line per source location transition.
    Src,
}

impl TraceMode {
    pub fn parse(s: &str) -> Option<TraceMode> {
        match s {
            "il" => Some(TraceMode::Il),
            "src" => Some(TraceMode::Src),
            "off" => Some(TraceMode::Off),
            _ => None,
        }
    }
}

/// Configuration for interpreter tracing.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceConfig {
    pub mode: TraceMode,
}

impl TraceConfig {
    pub fn enabled(&self) -> bool {
        self.mode != TraceMode::Off
    }
}

struct FileCacheEntry {
    lines: Vec<String>,
}

/// Sink that formats and emits trace lines for each interpreter step.
pub struct TraceSink {
    cfg: TraceConfig,
    /// Last `(file_id, line)` emitted in SRC mode, for coalescing.
    last_src: Option<(u32, u32)>,
    file_cache: HashMap<u32, Option<FileCacheEntry>>,
}

impl TraceSink {
    pub fn new(cfg: TraceConfig) -> Self {
        TraceSink {
            cfg,
            last_src: None,
            file_cache: HashMap::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.cfg.enabled()
    }

    /// Record execution of `instr` at `(func, block, ip)`.
    pub fn on_step(
        &mut self,
        sm: Option<&SourceManager>,
        func: &Function,
        block_label: &str,
        ip: usize,
        instr: &Instr,
    ) {
        match self.cfg.mode {
            TraceMode::Off => {}
            TraceMode::Il => {
                eprintln!("[IL] @{}:{}#{} {}", func.name, block_label, ip, instr);
            }
            TraceMode::Src => {
                let key = (instr.loc.file_id, instr.loc.line);
                if self.last_src == Some(key) {
                    return;
                }
                self.last_src = Some(key);
                let path = sm.and_then(|sm| sm.path(instr.loc.file_id));
                match path {
                    Some(path) => {
                        let text = self
                            .source_line(instr.loc.file_id, path, instr.loc.line)
                            .unwrap_or_default();
                        eprintln!("[SRC] {}:{}: {}", path, instr.loc.line, text);
                    }
                    None => {
                        eprintln!("[SRC] ??:{}", instr.loc.line);
                    }
                }
            }
        }
    }

    fn source_line(&mut self, file_id: u32, path: &str, line: u32) -> Option<String> {
        let entry = self.file_cache.entry(file_id).or_insert_with(|| {
            std::fs::read_to_string(path).ok().map(|text| FileCacheEntry {
                lines: text.lines().map(str::to_string).collect(),
            })
        });
        entry
            .as_ref()
            .and_then(|e| e.lines.get(line.checked_sub(1)? as usize))
            .map(|l| l.trim().to_string())
    }

    /// Forget the SRC coalescing state (used when control re-enters a line
    /// through a jump and the caller wants it re-reported).
    pub fn reset(&mut self) {
        self.last_src = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse() {
        assert_eq!(TraceMode::parse("il"), Some(TraceMode::Il));
        assert_eq!(TraceMode::parse("src"), Some(TraceMode::Src));
        assert_eq!(TraceMode::parse("off"), Some(TraceMode::Off));
        assert_eq!(TraceMode::parse("verbose"), None);
    }

    #[test]
    fn test_off_is_disabled() {
        assert!(!TraceConfig::default().enabled());
        assert!(
            TraceConfig {
                mode: TraceMode::Il
            }
            .enabled()
        );
    }
}
