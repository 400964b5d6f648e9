//! The interpreter.
//!
//! Single-threaded fetch–decode–execute over the current block's
//! instruction vector, with explicit reification of the call stack, the EH
//! stack, and the instruction pointer. Three dispatch backends share this
//! core; they differ only in how an instruction's handler is obtained.

use crate::debug::{DebugAction, DebugCtrl, DebugScript};
use crate::dispatch::{HANDLER_TABLE, OpHandler, step_switch};
use crate::eh::{EhFrame, ResumeTok};
use crate::frame::{Frame, Slot};
use crate::trace::{TraceConfig, TraceSink};
use crate::trap::{ErrorValue, TrapInfo, TrapKind};
use std::collections::HashMap;
use std::fmt;
use viper_il::{Instr, Module, Type, Value};
use viper_runtime::{AbiType, AbiValue, RtStr};
use viper_support::{SourceLoc, SourceManager};

/// Dispatch backend, selected once per VM instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchStrategy {
    /// Function-pointer table indexed by opcode.
    Table,
    /// Plain match over the opcode.
    #[default]
    Switch,
    /// Per-block pre-decoded handler streams.
    Threaded,
}

impl DispatchStrategy {
    pub fn parse(s: &str) -> Option<DispatchStrategy> {
        match s {
            "table" => Some(DispatchStrategy::Table),
            "switch" => Some(DispatchStrategy::Switch),
            "threaded" => Some(DispatchStrategy::Threaded),
            _ => None,
        }
    }

    /// Strategy requested through `VIPER_DISPATCH`, when set and valid.
    pub fn from_env() -> Option<DispatchStrategy> {
        std::env::var("VIPER_DISPATCH")
            .ok()
            .and_then(|v| Self::parse(&v))
    }

    pub fn name(self) -> &'static str {
        match self {
            DispatchStrategy::Table => "table",
            DispatchStrategy::Switch => "switch",
            DispatchStrategy::Threaded => "threaded",
        }
    }
}

/// Interpreter configuration.
#[derive(Default)]
pub struct RunConfig {
    /// Dispatch backend; falls back to `VIPER_DISPATCH`, then `switch`.
    pub dispatch: Option<DispatchStrategy>,
    /// Maximum instruction count; 0 means unlimited. Exceeding the cap
    /// traps with `RuntimeError` regardless of EH state.
    pub max_steps: u64,
    pub trace: TraceConfig,
    pub debug: DebugCtrl,
    pub script: DebugScript,
    /// Yield to the debug script before the first instruction.
    pub start_stepping: bool,
}

/// Formatted unhandled-trap diagnostic.
///
/// `summary` is the stable wire-format first line; `detail` holds the
/// optional follow-on lines (trapping instruction IL, short call stack).
#[derive(Debug, Clone, PartialEq)]
pub struct TrapDiagnostic {
    pub kind: TrapKind,
    pub code: i32,
    pub summary: String,
    pub detail: Vec<String>,
}

impl fmt::Display for TrapDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary)?;
        for line in &self.detail {
            write!(f, "\n{}", line)?;
        }
        Ok(())
    }
}

/// VM-level failures surfaced to the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum VmError {
    /// A trap reached the driver with no matching handler.
    Trap(TrapDiagnostic),
    /// The module could not be executed at all (e.g. no `main`).
    Setup(String),
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::Trap(d) => write!(f, "{}", d),
            VmError::Setup(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for VmError {}

/// Outcome of one executed instruction.
#[derive(Debug, PartialEq)]
pub enum Control {
    /// Advance to the next instruction.
    Next,
    /// The handler repositioned block/ip itself.
    Jump,
    /// Return from the current frame with an optional value.
    Return(Option<Slot>),
}

/// The virtual machine.
pub struct Vm<'m> {
    module: &'m Module,
    sm: Option<&'m SourceManager>,
    strategy: DispatchStrategy,

    fn_index: HashMap<&'m str, usize>,
    /// Per-function label -> block index.
    label_maps: Vec<HashMap<&'m str, usize>>,
    /// Per-function dense slot counts.
    slot_counts: Vec<usize>,
    /// Per-function pre-decoded handler streams (threaded backend).
    pub(crate) threaded_code: Vec<Option<Vec<Vec<OpHandler>>>>,
    /// Handles for string globals, owned by the VM.
    globals: HashMap<&'m str, RtStr>,

    pub(crate) frames: Vec<Frame>,
    pub(crate) eh_stack: Vec<EhFrame>,
    /// In-flight trap kind readable via `trap.kind` inside a handler.
    pub(crate) current_trap: Option<TrapKind>,
    /// Register observed by error projections on a null operand.
    pub(crate) current_error: ErrorValue,
    /// Armed by `resume.same`: next trap dispatch searches strictly below
    /// this EH index, preventing re-entry into the same handler.
    pub(crate) resume_barrier: Option<usize>,

    instr_count: u64,
    max_steps: u64,
    trace: TraceSink,
    pub debug: DebugCtrl,
    script: DebugScript,
    /// Remaining scripted step budget; `Some(0)` yields at the next step.
    step_budget: Option<u64>,
}

impl<'m> Vm<'m> {
    pub fn new(module: &'m Module, sm: Option<&'m SourceManager>, config: RunConfig) -> Vm<'m> {
        viper_runtime::register_builtins();

        let strategy = config
            .dispatch
            .or_else(DispatchStrategy::from_env)
            .unwrap_or_default();

        let mut fn_index = HashMap::new();
        let mut label_maps = Vec::with_capacity(module.functions.len());
        let mut slot_counts = Vec::with_capacity(module.functions.len());
        for (i, func) in module.functions.iter().enumerate() {
            fn_index.insert(func.name.as_str(), i);
            let mut labels = HashMap::new();
            let mut max_id = func.params.iter().map(|p| p.id + 1).max().unwrap_or(0);
            for (b, block) in func.blocks.iter().enumerate() {
                labels.insert(block.label.as_str(), b);
                for p in &block.params {
                    max_id = max_id.max(p.id + 1);
                }
                for instr in &block.instructions {
                    if let Some(r) = instr.result {
                        max_id = max_id.max(r + 1);
                    }
                }
            }
            label_maps.push(labels);
            slot_counts.push(max_id as usize);
        }

        let mut globals = HashMap::new();
        for g in &module.globals {
            globals.insert(g.name.as_str(), RtStr::from_bytes(&g.init));
        }

        let threaded_code = vec![None; module.functions.len()];

        Vm {
            module,
            sm,
            strategy,
            fn_index,
            label_maps,
            slot_counts,
            threaded_code,
            globals,
            frames: Vec::new(),
            eh_stack: Vec::new(),
            current_trap: None,
            current_error: ErrorValue::default(),
            resume_barrier: None,
            instr_count: 0,
            max_steps: config.max_steps,
            trace: TraceSink::new(config.trace),
            debug: config.debug,
            script: config.script,
            step_budget: if config.start_stepping { Some(0) } else { None },
        }
    }

    pub fn strategy(&self) -> DispatchStrategy {
        self.strategy
    }

    /// Instructions executed so far (including a step-cap trip).
    pub fn instruction_count(&self) -> u64 {
        self.instr_count
    }

    pub fn module(&self) -> &'m Module {
        self.module
    }

    /// Execute `@main` to completion.
    ///
    /// Returns the program's exit value (0 for a void `main`), or the trap
    /// diagnostic when a trap reaches the driver.
    pub fn run(&mut self) -> Result<i64, VmError> {
        let Some(&main_idx) = self.fn_index.get("main") else {
            return Err(VmError::Setup("no @main function in module".to_string()));
        };
        self.frames
            .push(Frame::new(main_idx, self.slot_counts[main_idx], None));
        self.exec_loop()
    }

    fn exec_loop(&mut self) -> Result<i64, VmError> {
        let module = self.module;
        loop {
            let (func_idx, block_idx, ip) = {
                let f = self.frames.last().expect("active frame");
                (f.func, f.block, f.ip)
            };
            let func = &module.functions[func_idx];
            let block = &func.blocks[block_idx];

            // Step cap: a debugging safety net handlers cannot swallow.
            if self.max_steps > 0 && self.instr_count >= self.max_steps {
                self.instr_count += 1;
                let loc = block
                    .instructions
                    .get(ip)
                    .map(|i| i.loc)
                    .unwrap_or(SourceLoc::UNKNOWN);
                return Err(self.unhandled(
                    TrapInfo::new(TrapKind::RuntimeError, "step cap"),
                    func_idx,
                    block_idx,
                    ip,
                    loc,
                ));
            }

            // Defensive fetch: past-the-end ip dispatches a synthesized trap.
            if ip >= block.instructions.len() {
                self.instr_count += 1;
                match self.dispatch_trap(
                    TrapInfo::new(TrapKind::InvalidOperation, "instruction pointer past block end"),
                    func_idx,
                    block_idx,
                    ip,
                    SourceLoc::UNKNOWN,
                ) {
                    Ok(()) => continue,
                    Err(e) => return Err(e),
                }
            }
            let instr: &'m Instr = &block.instructions[ip];

            // Debugger hooks.
            if ip == 0 && self.debug.has_breaks() && self.debug.should_break(&block.label) {
                self.break_hit(&func.name, &block.label, ip);
            }
            if self.debug.has_src_line_bps() && self.debug.should_break_on(instr.loc, self.sm) {
                self.break_hit(&func.name, &block.label, ip);
            }
            if let Some(budget) = self.step_budget {
                if budget == 0 {
                    self.break_hit(&func.name, &block.label, ip);
                } else {
                    self.step_budget = Some(budget - 1);
                }
            }

            if self.trace.enabled() {
                self.trace.on_step(self.sm, func, &block.label, ip, instr);
            }

            self.instr_count += 1;
            let armed_barrier = self.resume_barrier;

            let result = match self.strategy {
                DispatchStrategy::Switch => step_switch(self, instr),
                DispatchStrategy::Table => {
                    let handler = HANDLER_TABLE[instr.op as usize];
                    handler(self, instr)
                }
                DispatchStrategy::Threaded => {
                    let handler = self.threaded_handler(func_idx, block_idx, ip);
                    handler(self, instr)
                }
            };

            match result {
                Ok(control) => {
                    // A successfully re-executed instruction disarms the
                    // resume.same barrier.
                    if armed_barrier.is_some() && self.resume_barrier == armed_barrier {
                        self.resume_barrier = None;
                    }
                    match control {
                        Control::Next => {
                            self.frames.last_mut().expect("active frame").ip += 1;
                        }
                        Control::Jump => {}
                        Control::Return(value) => {
                            if let Some(exit) = self.do_return(value) {
                                return Ok(exit);
                            }
                        }
                    }
                }
                Err(info) => {
                    self.dispatch_trap(info, func_idx, block_idx, ip, instr.loc)?;
                }
            }
        }
    }

    /// Pop the current frame; returns the program exit value when the last
    /// frame returned.
    fn do_return(&mut self, value: Option<Slot>) -> Option<i64> {
        let popped = self.frames.pop().expect("active frame");
        let departing_depth = self.frames.len();
        // EH frames registered by the departing frame (or deeper) die with it.
        self.eh_stack.retain(|f| f.call_depth < departing_depth);
        if self.frames.is_empty() {
            let exit = match value {
                Some(Slot::I64(v)) => v,
                _ => 0,
            };
            return Some(exit);
        }
        if let Some(ret_to) = popped.ret_to {
            let slot = value.unwrap_or(Slot::Null);
            self.frames.last_mut().expect("caller frame").slots[ret_to as usize] = slot;
        }
        None
    }

    fn break_hit(&mut self, func: &str, block: &str, ip: usize) {
        eprintln!("[BREAK] @{}:{}#{}", func, block, ip);
        match self.script.next_action() {
            DebugAction::Continue => self.step_budget = None,
            // The instruction we are paused before counts as the first step.
            DebugAction::Step(n) => self.step_budget = Some(n.saturating_sub(1)),
        }
    }

    /// Route a raised trap to the innermost eligible handler, or fail.
    fn dispatch_trap(
        &mut self,
        info: TrapInfo,
        func_idx: usize,
        block_idx: usize,
        ip: usize,
        loc: SourceLoc,
    ) -> Result<(), VmError> {
        let barrier = self.resume_barrier.take();
        let depth = self.frames.len().saturating_sub(1);
        let limit = barrier.unwrap_or(self.eh_stack.len()).min(self.eh_stack.len());
        let found = self.eh_stack[..limit]
            .iter()
            .enumerate()
            .rev()
            .find(|(_, f)| f.call_depth <= depth)
            .map(|(i, f)| (i, *f));
        let Some((idx, ehf)) = found else {
            return Err(self.unhandled(info, func_idx, block_idx, ip, loc));
        };

        tracing::debug!(
            kind = info.kind.name(),
            code = info.code,
            handler = ehf.handler_block,
            depth,
            "trap dispatched to handler"
        );

        // Unwind to the handler's frame; deeper EH registrations are stale.
        self.frames.truncate(ehf.call_depth + 1);
        self.eh_stack.truncate(idx + 1);

        let err = ErrorValue {
            kind: info.kind as i32,
            code: info.code,
            ip: ip as i64,
            line: loc.line as i32,
            message: info.message,
        };
        self.current_trap = Some(info.kind);
        self.current_error = err.clone();
        let tok = ResumeTok {
            eh_index: idx,
            block: block_idx,
            ip,
            call_depth: depth,
        };

        let module = self.module;
        let frame = self.frames.last_mut().expect("handler frame");
        frame.block = ehf.handler_block;
        frame.ip = 0;
        let handler_block = &module.functions[frame.func].blocks[ehf.handler_block];
        if handler_block.params.len() == 2 {
            let err_id = handler_block.params[0].id as usize;
            let tok_id = handler_block.params[1].id as usize;
            frame.slots[err_id] = Slot::Error(err);
            frame.slots[tok_id] = Slot::Tok(tok);
        }
        self.debug.reset_last_hit();
        Ok(())
    }

    /// Format the unhandled-trap diagnostic for the driver.
    fn unhandled(
        &self,
        info: TrapInfo,
        func_idx: usize,
        block_idx: usize,
        ip: usize,
        loc: SourceLoc,
    ) -> VmError {
        let func = &self.module.functions[func_idx];
        let block = func.blocks.get(block_idx);
        let label = block.map(|b| b.label.as_str()).unwrap_or("?");
        let summary = format!(
            "Trap @{}#{} line {}: {} (code={}) (block {})",
            func.name, ip, loc.line, info.kind, info.code, label
        );
        let mut detail = Vec::new();
        if !info.message.is_empty() {
            detail.push(format!("  {}", info.message));
        }
        if let Some(instr) = block.and_then(|b| b.instructions.get(ip)) {
            detail.push(format!("  {}", instr));
        }
        for frame in self.frames.iter().rev() {
            let f = &self.module.functions[frame.func];
            let b = f.blocks.get(frame.block).map(|b| b.label.as_str()).unwrap_or("?");
            detail.push(format!("  at @{}:{}#{}", f.name, b, frame.ip));
        }
        VmError::Trap(TrapDiagnostic {
            kind: info.kind,
            code: info.code,
            summary,
            detail,
        })
    }

    // ---- state accessors used by the opcode handlers -----------------

    pub(crate) fn frame(&self) -> &Frame {
        self.frames.last().expect("active frame")
    }

    pub(crate) fn frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("active frame")
    }

    /// Evaluate an operand against the current frame.
    pub(crate) fn eval(&self, value: &Value) -> Result<Slot, TrapInfo> {
        match value {
            Value::Temp(id) => Ok(self.frame().slots[*id as usize].clone()),
            Value::ConstInt(v) => Ok(Slot::I64(*v)),
            Value::ConstFloat(v) => Ok(Slot::F64(*v)),
            Value::ConstStr(s) => Ok(Slot::Str(RtStr::from_bytes(s.as_bytes()))),
            Value::GlobalAddr(name) => match self.globals.get(name.as_str()) {
                Some(handle) => Ok(Slot::Ptr(handle.as_bytes().as_ptr() as usize)),
                None => Err(TrapInfo::new(
                    TrapKind::InvalidOperation,
                    format!("unknown global @{}", name),
                )),
            },
            Value::NullPtr => Ok(Slot::Null),
        }
    }

    pub(crate) fn eval_i64(&self, value: &Value) -> Result<i64, TrapInfo> {
        self.eval(value)?.as_i64()
    }

    pub(crate) fn eval_f64(&self, value: &Value) -> Result<f64, TrapInfo> {
        self.eval(value)?.as_f64()
    }

    /// Write the instruction's result slot, when it defines one.
    pub(crate) fn set_result(&mut self, instr: &Instr, slot: Slot) {
        if let Some(id) = instr.result {
            self.frame_mut().slots[id as usize] = slot;
        }
    }

    pub(crate) fn global_str(&self, name: &str) -> Result<RtStr, TrapInfo> {
        match self.globals.get(name) {
            Some(handle) => Ok(*handle),
            None => Err(TrapInfo::new(
                TrapKind::InvalidOperation,
                format!("unknown global @{}", name),
            )),
        }
    }

    /// Transfer control to `instr.labels[which]`, copying branch arguments
    /// into the target's parameter slots as one atomic step.
    pub(crate) fn branch_to(&mut self, instr: &Instr, which: usize) -> Result<Control, TrapInfo> {
        let module = self.module;
        let func_idx = self.frame().func;
        let label = &instr.labels[which];
        let Some(&target) = self.label_maps[func_idx].get(label.as_str()) else {
            return Err(TrapInfo::new(
                TrapKind::InvalidOperation,
                format!("unknown label {}", label),
            ));
        };
        let empty: Vec<Value> = Vec::new();
        let args = instr.br_args.get(which).unwrap_or(&empty);
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg)?);
        }
        let target_block = &module.functions[func_idx].blocks[target];
        if values.len() != target_block.params.len() {
            return Err(TrapInfo::new(
                TrapKind::InvalidOperation,
                format!("branch argument arity mismatch for {}", label),
            ));
        }

        // Variable watches observe writes to named block parameters.
        if self.debug.has_var_watches() {
            let func_name = module.functions[func_idx].name.as_str();
            let ip = self.frame().ip;
            for (param, slot) in target_block.params.iter().zip(&values) {
                if let Some(id) = self.debug.watch_id(&param.name) {
                    let (i64_value, f64_value) = match slot {
                        Slot::I64(v) => (*v, 0.0),
                        Slot::F64(v) => (0, *v),
                        _ => (0, 0.0),
                    };
                    self.debug.on_store_by_id(
                        id,
                        &param.name,
                        param.ty,
                        i64_value,
                        f64_value,
                        func_name,
                        label,
                        ip,
                    );
                }
            }
        }

        let ids: Vec<u32> = target_block.params.iter().map(|p| p.id).collect();
        let frame = self.frame_mut();
        frame.block = target;
        frame.ip = 0;
        for (id, slot) in ids.into_iter().zip(values) {
            frame.slots[id as usize] = slot;
        }
        self.debug.reset_last_hit();
        Ok(Control::Jump)
    }

    /// Execute a `call`: intra-module calls push a frame, extern calls
    /// marshal through the runtime registry.
    pub(crate) fn do_call(&mut self, instr: &Instr) -> Result<Control, TrapInfo> {
        let Some(callee) = instr.callee.as_deref() else {
            return Err(TrapInfo::new(TrapKind::InvalidOperation, "call without callee"));
        };

        if let Some(&target) = self.fn_index.get(callee) {
            let module = self.module;
            let func = &module.functions[target];
            if instr.operands.len() != func.params.len() {
                return Err(TrapInfo::new(
                    TrapKind::InvalidOperation,
                    format!("call arity mismatch for @{}", callee),
                ));
            }
            let mut args = Vec::with_capacity(instr.operands.len());
            for operand in &instr.operands {
                args.push(self.eval(operand)?);
            }
            // Resume in the caller after the call once the callee returns.
            self.frame_mut().ip += 1;
            let mut frame = Frame::new(target, self.slot_counts[target], instr.result);
            for (param, slot) in func.params.iter().zip(args) {
                frame.slots[param.id as usize] = slot;
            }
            self.frames.push(frame);
            return Ok(Control::Jump);
        }

        // Extern helper via the runtime registry.
        let Some(decl) = self.module.find_extern(callee) else {
            return Err(TrapInfo::new(
                TrapKind::InvalidOperation,
                format!("unknown callee @{}", callee),
            ));
        };
        let Some(ext) = viper_runtime::lookup_extern(callee) else {
            return Err(TrapInfo::new(
                TrapKind::InvalidOperation,
                format!("unknown extern: @{}", callee),
            ));
        };
        // Argument slots own their references for the duration of the call;
        // the helper refs anything it keeps beyond it.
        let mut arg_slots = Vec::with_capacity(instr.operands.len());
        for operand in &instr.operands {
            arg_slots.push(self.eval(operand)?);
        }
        let mut abi_args = Vec::with_capacity(arg_slots.len());
        for (slot, ty) in arg_slots.iter().zip(&decl.params) {
            abi_args.push(marshal_out(slot, *ty)?);
        }
        let result = (ext.invoke)(&abi_args);
        drop(arg_slots);
        let slot = marshal_in(result, decl.ret_type, ext.ret)?;
        self.set_result(instr, slot);
        Ok(Control::Next)
    }

    pub(crate) fn do_eh_push(&mut self, instr: &Instr) -> Result<Control, TrapInfo> {
        let func_idx = self.frame().func;
        let label = &instr.labels[0];
        let Some(&handler_block) = self.label_maps[func_idx].get(label.as_str()) else {
            return Err(TrapInfo::new(
                TrapKind::InvalidOperation,
                format!("unknown handler label {}", label),
            ));
        };
        let saved_ip = self.frame().ip;
        self.eh_stack.push(EhFrame {
            handler_block,
            call_depth: self.frames.len() - 1,
            saved_ip,
        });
        Ok(Control::Next)
    }

    pub(crate) fn do_eh_pop(&mut self) -> Result<Control, TrapInfo> {
        if self.eh_stack.pop().is_none() {
            return Err(TrapInfo::new(
                TrapKind::InvalidOperation,
                "eh.pop with empty EH stack",
            ));
        }
        Ok(Control::Next)
    }

    /// Shared validation for the `resume.*` family.
    pub(crate) fn take_resume_token(&mut self, instr: &Instr) -> Result<ResumeTok, TrapInfo> {
        let slot = self.eval(&instr.operands[0])?;
        let Slot::Tok(tok) = slot else {
            return Err(TrapInfo::new(
                TrapKind::InvalidOperation,
                "resume expects a resume token",
            ));
        };
        if self.frames.len().saturating_sub(1) != tok.call_depth {
            return Err(TrapInfo::new(
                TrapKind::InvalidOperation,
                "resume token is not valid in this frame",
            ));
        }
        self.current_trap = None;
        Ok(tok)
    }
}

impl Drop for Vm<'_> {
    fn drop(&mut self) {
        for (_, handle) in self.globals.drain() {
            handle.release();
        }
    }
}

/// Marshal a slot out to the helper ABI per the declared parameter type.
fn marshal_out(slot: &Slot, ty: Type) -> Result<AbiValue, TrapInfo> {
    match ty {
        Type::I1 | Type::I16 | Type::I32 | Type::I64 => Ok(AbiValue::I64(slot.as_i64()?)),
        Type::F64 => Ok(AbiValue::F64(slot.as_f64()?)),
        Type::Str => match slot {
            // Handle passes by value; refcount untouched across the call.
            Slot::Str(s) => Ok(AbiValue::Str(*s)),
            Slot::Null => Ok(AbiValue::Str(RtStr::EMPTY)),
            _ => Err(TrapInfo::new(
                TrapKind::InvalidOperation,
                "expected string argument",
            )),
        },
        Type::Ptr => Ok(AbiValue::Ptr(slot.as_ptr()?)),
        _ => Err(TrapInfo::new(
            TrapKind::InvalidOperation,
            format!("type {} cannot cross the extern boundary", ty),
        )),
    }
}

/// Marshal a helper result back into a slot per the declared return type.
fn marshal_in(value: AbiValue, declared: Type, _actual: AbiType) -> Result<Slot, TrapInfo> {
    match (declared, value) {
        (Type::Void, _) => Ok(Slot::Null),
        (Type::I1 | Type::I16 | Type::I32 | Type::I64, AbiValue::I64(v)) => Ok(Slot::I64(v)),
        (Type::F64, AbiValue::F64(v)) => Ok(Slot::F64(v)),
        // Ownership of the returned handle transfers to the slot.
        (Type::Str, AbiValue::Str(s)) => Ok(Slot::Str(s)),
        (Type::Ptr, AbiValue::Ptr(p)) => {
            if p == 0 {
                Ok(Slot::Null)
            } else {
                Ok(Slot::Ptr(p))
            }
        }
        (declared, value) => Err(TrapInfo::new(
            TrapKind::InvalidOperation,
            format!("extern returned {:?}, declaration says {}", value, declared),
        )),
    }
}
