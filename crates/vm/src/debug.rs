//! Debug controller: breakpoints, watches, and scripted stepping.
//!
//! Label breakpoints match interned block-label symbols. Source-line
//! breakpoints match `(file, line)` with normalized-path or basename
//! comparison, coalesced so multi-instruction source lines break once per
//! entry. Variable watches have dense ids so the VM reports stores against
//! integers instead of comparing names. Memory watches keep a sorted range
//! list and queue hit events the debugger drains.

use std::collections::{HashMap, HashSet, VecDeque};
use viper_il::Type;
use viper_support::{SourceLoc, SourceManager, StringInterner, Symbol, normalize_path};

/// Breakpoint identified by a block label symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakpoint {
    pub label: Symbol,
}

/// Source-line breakpoint record.
#[derive(Debug, Clone)]
struct SrcLineBp {
    norm_file: String,
    base: String,
    line: u32,
    /// When false, a basename match is sufficient.
    require_full_path: bool,
}

#[derive(Debug, Clone, Default)]
struct WatchEntry {
    name: String,
    ty: Type,
    i64_value: i64,
    f64_value: f64,
    has_value: bool,
}

/// Queued event for a memory write intersecting a watched range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemWatchHit {
    pub addr: usize,
    pub size: usize,
    pub tag: String,
}

#[derive(Debug, Clone)]
struct MemWatchRange {
    addr: usize,
    size: usize,
    tag: String,
}

/// Controller for breakpoint, watch, and source-line debugging state.
#[derive(Default)]
pub struct DebugCtrl {
    interner: StringInterner,
    breaks: HashSet<Symbol>,
    src_bps: Vec<SrcLineBp>,
    /// Last `(file_id, line)` source breakpoint hit, for coalescing.
    last_hit: Option<(u32, u32)>,
    watches: Vec<WatchEntry>,
    watch_ids: HashMap<String, u32>,
    /// Kept sorted by range start.
    mem_watches: Vec<MemWatchRange>,
    next_mem_watch_id: u32,
    mem_events: VecDeque<MemWatchHit>,
}

impl DebugCtrl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `label` and return its symbol.
    pub fn intern_label(&mut self, label: &str) -> Symbol {
        self.interner.intern(label)
    }

    /// Add a breakpoint for label symbol `sym`.
    pub fn add_break(&mut self, sym: Symbol) {
        if sym.is_valid() {
            self.breaks.insert(sym);
        }
    }

    /// Add a breakpoint by label text.
    pub fn add_break_label(&mut self, label: &str) {
        let sym = self.intern_label(label);
        self.add_break(sym);
    }

    pub fn has_breaks(&self) -> bool {
        !self.breaks.is_empty()
    }

    /// Whether entering a block with this label triggers a breakpoint.
    pub fn should_break(&mut self, label: &str) -> bool {
        if self.breaks.is_empty() {
            return false;
        }
        let sym = self.interner.intern(label);
        self.breaks.contains(&sym)
    }

    /// Add a breakpoint at `file`:`line`.
    ///
    /// `require_full_path` is set when the spec contained a path separator;
    /// otherwise basename equality is enough to match.
    pub fn add_break_src_line(&mut self, file: &str, line: u32) {
        let require_full_path = file.contains('/') || file.contains('\\');
        let norm = normalize_path(file);
        let base = norm.rsplit('/').next().unwrap_or(&norm).to_string();
        self.src_bps.push(SrcLineBp {
            norm_file: norm,
            base,
            line,
            require_full_path,
        });
    }

    pub fn has_src_line_bps(&self) -> bool {
        !self.src_bps.is_empty()
    }

    /// Whether an instruction at `loc` matches a source-line breakpoint.
    ///
    /// Hits for the same `(file, line)` coalesce until `reset_last_hit`, so
    /// a multi-instruction source line breaks exactly once per entry.
    pub fn should_break_on(&mut self, loc: SourceLoc, sm: Option<&SourceManager>) -> bool {
        if self.src_bps.is_empty() || loc.line == 0 {
            return false;
        }
        let key = (loc.file_id, loc.line);
        if self.last_hit == Some(key) {
            return false;
        }
        let Some(path) = sm.and_then(|sm| sm.path(loc.file_id)) else {
            return false;
        };
        let base = path.rsplit('/').next().unwrap_or(path);
        let hit = self.src_bps.iter().any(|bp| {
            bp.line == loc.line
                && if bp.require_full_path {
                    bp.norm_file == path
                } else {
                    bp.norm_file == path || bp.base == base
                }
        });
        if hit {
            self.last_hit = Some(key);
        }
        hit
    }

    /// Clear coalescing state so the next matching line breaks again.
    pub fn reset_last_hit(&mut self) {
        self.last_hit = None;
    }

    /// Register a watch on variable `name`; returns its dense id (> 0).
    ///
    /// Registering the same name again returns the existing id.
    pub fn add_watch(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.watch_ids.get(name) {
            return id;
        }
        self.watches.push(WatchEntry {
            name: name.to_string(),
            ..WatchEntry::default()
        });
        let id = self.watches.len() as u32;
        self.watch_ids.insert(name.to_string(), id);
        id
    }

    /// Dense id for a watched name, if registered.
    pub fn watch_id(&self, name: &str) -> Option<u32> {
        self.watch_ids.get(name).copied()
    }

    pub fn has_var_watches(&self) -> bool {
        !self.watches.is_empty()
    }

    /// Record a store to watch `id`.
    ///
    /// Emits a trace line to stderr when the value differs from the cached
    /// previous value (type-aware comparison). Unknown ids are ignored.
    #[allow(clippy::too_many_arguments)]
    pub fn on_store_by_id(
        &mut self,
        id: u32,
        name: &str,
        ty: Type,
        i64_value: i64,
        f64_value: f64,
        func: &str,
        block: &str,
        ip: usize,
    ) {
        if id == 0 {
            return;
        }
        let Some(entry) = self.watches.get_mut(id as usize - 1) else {
            return;
        };
        let changed = !entry.has_value
            || entry.ty != ty
            || match ty {
                Type::F64 => entry.f64_value != f64_value,
                _ => entry.i64_value != i64_value,
            };
        entry.ty = ty;
        entry.i64_value = i64_value;
        entry.f64_value = f64_value;
        entry.has_value = true;
        if changed {
            let rendered = match ty {
                Type::F64 => f64_value.to_string(),
                Type::I1 => (i64_value != 0).to_string(),
                _ => i64_value.to_string(),
            };
            eprintln!("[WATCH] {}={} @{}:{}#{}", name, rendered, func, block, ip);
        }
    }

    /// Register a memory watch over `[addr, addr+size)`; returns its id.
    pub fn add_mem_watch(&mut self, addr: usize, size: usize, tag: &str) -> u32 {
        self.next_mem_watch_id += 1;
        let id = self.next_mem_watch_id;
        let pos = self
            .mem_watches
            .partition_point(|w| w.addr < addr);
        self.mem_watches.insert(
            pos,
            MemWatchRange {
                addr,
                size,
                tag: tag.to_string(),
            },
        );
        id
    }

    /// Remove a previously registered range; true when one matched.
    pub fn remove_mem_watch(&mut self, addr: usize, size: usize, tag: &str) -> bool {
        let before = self.mem_watches.len();
        self.mem_watches
            .retain(|w| !(w.addr == addr && w.size == size && w.tag == tag));
        self.mem_watches.len() != before
    }

    pub fn has_mem_watches(&self) -> bool {
        !self.mem_watches.is_empty()
    }

    /// Record a write of `size` bytes at `addr`, queuing hits for every
    /// intersecting range.
    pub fn on_mem_write(&mut self, addr: usize, size: usize) {
        if self.mem_watches.is_empty() || size == 0 {
            return;
        }
        let end = addr.saturating_add(size);
        for w in &self.mem_watches {
            if w.addr >= end {
                break;
            }
            if addr < w.addr.saturating_add(w.size) {
                self.mem_events.push_back(MemWatchHit {
                    addr,
                    size,
                    tag: w.tag.clone(),
                });
            }
        }
    }

    /// Consume and return pending memory watch hit events.
    pub fn drain_mem_watch_events(&mut self) -> Vec<MemWatchHit> {
        self.mem_events.drain(..).collect()
    }
}

/// Action produced by a debugger script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugAction {
    Continue,
    Step(u64),
}

/// Queue of scripted debugger actions driven line by line from a file.
///
/// An empty script means non-interactive continue.
#[derive(Debug, Default)]
pub struct DebugScript {
    actions: VecDeque<DebugAction>,
}

impl DebugScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a script: one action per line, `step [N]` or `continue`.
    pub fn parse(text: &str) -> Self {
        let mut actions = VecDeque::new();
        for line in text.lines() {
            let mut words = line.split_whitespace();
            match words.next() {
                Some("step") => {
                    let n = words.next().and_then(|w| w.parse().ok()).unwrap_or(1);
                    actions.push_back(DebugAction::Step(n));
                }
                Some("continue") => actions.push_back(DebugAction::Continue),
                _ => {}
            }
        }
        DebugScript { actions }
    }

    pub fn load(path: &str) -> std::io::Result<Self> {
        Ok(Self::parse(&std::fs::read_to_string(path)?))
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn add_step(&mut self, count: u64) {
        self.actions.push_back(DebugAction::Step(count));
    }

    /// Pop the next action; an exhausted script continues.
    pub fn next_action(&mut self) -> DebugAction {
        self.actions.pop_front().unwrap_or(DebugAction::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_breakpoints() {
        let mut debug = DebugCtrl::new();
        assert!(!debug.has_breaks());
        debug.add_break_label("loop_head");
        assert!(debug.has_breaks());
        assert!(debug.should_break("loop_head"));
        assert!(!debug.should_break("entry"));
    }

    #[test]
    fn test_var_watch_ids_are_dense_and_stable() {
        let mut debug = DebugCtrl::new();
        assert!(!debug.has_var_watches());
        let id1 = debug.add_watch("myVar");
        assert!(id1 > 0);
        assert_eq!(debug.add_watch("myVar"), id1);
        let id2 = debug.add_watch("otherVar");
        assert!(id2 > 0);
        assert_ne!(id1, id2);
        assert_eq!(debug.watch_id("myVar"), Some(id1));
        assert_eq!(debug.watch_id("unknown"), None);
    }

    #[test]
    fn test_on_store_by_id_ignores_invalid_ids() {
        let mut debug = DebugCtrl::new();
        let id = debug.add_watch("counter");
        debug.on_store_by_id(id, "counter", Type::I64, 42, 0.0, "main", "entry", 0);
        debug.on_store_by_id(id, "counter", Type::I64, 42, 0.0, "main", "entry", 1);
        debug.on_store_by_id(id, "counter", Type::I64, 43, 0.0, "main", "entry", 2);
        debug.on_store_by_id(0, "invalid", Type::I64, 100, 0.0, "main", "entry", 3);
        debug.on_store_by_id(9999, "invalid", Type::I64, 100, 0.0, "main", "entry", 4);
    }

    #[test]
    fn test_mem_watch_intersection() {
        let mut debug = DebugCtrl::new();
        assert!(!debug.has_mem_watches());
        let buf1 = [0u8; 40];
        let buf2 = [0u8; 40];
        let id1 = debug.add_mem_watch(buf1.as_ptr() as usize, 40, "buffer1");
        assert!(id1 > 0);
        let id2 = debug.add_mem_watch(buf2.as_ptr() as usize, 40, "buffer2");
        assert_ne!(id1, id2);

        debug.on_mem_write(buf1.as_ptr() as usize + 20, 4);
        let events = debug.drain_mem_watch_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].tag, "buffer1");

        debug.on_mem_write(buf2.as_ptr() as usize, 8);
        let events = debug.drain_mem_watch_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].tag, "buffer2");

        let unrelated = [0u8; 8];
        debug.on_mem_write(unrelated.as_ptr() as usize, 4);
        assert!(debug.drain_mem_watch_events().is_empty());
    }

    #[test]
    fn test_mem_watch_removal() {
        let mut debug = DebugCtrl::new();
        debug.add_mem_watch(0x1000, 16, "tagged");
        assert!(debug.remove_mem_watch(0x1000, 16, "tagged"));
        assert!(!debug.remove_mem_watch(0x1000, 16, "tagged"));
        assert!(!debug.has_mem_watches());
    }

    #[test]
    fn test_src_breakpoint_coalescing() {
        let mut sm = SourceManager::new();
        let id = sm.add_file("prog.bas");
        let mut debug = DebugCtrl::new();
        debug.add_break_src_line("prog.bas", 4);
        assert!(debug.has_src_line_bps());
        let loc = SourceLoc::new(id, 4, 1);
        assert!(debug.should_break_on(loc, Some(&sm)));
        // Second instruction on the same line coalesces.
        assert!(!debug.should_break_on(loc, Some(&sm)));
        debug.reset_last_hit();
        assert!(debug.should_break_on(loc, Some(&sm)));
    }

    #[test]
    fn test_src_breakpoint_basename_fallback() {
        let mut sm = SourceManager::new();
        let id = sm.add_file("src/deep/prog.bas");
        let mut debug = DebugCtrl::new();
        // Bare filename: basename match allowed.
        debug.add_break_src_line("prog.bas", 2);
        assert!(debug.should_break_on(SourceLoc::new(id, 2, 1), Some(&sm)));

        // Full path that differs: no match.
        let mut strict = DebugCtrl::new();
        strict.add_break_src_line("other/dir/prog.bas", 2);
        assert!(!strict.should_break_on(SourceLoc::new(id, 2, 1), Some(&sm)));
    }

    #[test]
    fn test_debug_script_actions() {
        let mut script = DebugScript::parse("step 3\ncontinue\nstep\n");
        assert!(!script.is_empty());
        assert_eq!(script.next_action(), DebugAction::Step(3));
        assert_eq!(script.next_action(), DebugAction::Continue);
        assert_eq!(script.next_action(), DebugAction::Step(1));
        // Exhausted scripts continue.
        assert_eq!(script.next_action(), DebugAction::Continue);
        assert!(DebugScript::new().is_empty());
    }
}
