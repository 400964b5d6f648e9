//! Structural verifier.
//!
//! Runs three sweeps per function: a catalog sweep (labels, block-parameter
//! types, function parameters), an instruction sweep (opcode signatures,
//! unique temp definitions, branch/call agreement, terminator discipline,
//! def-dominates-use), and an EH sweep (push/pop balance, handler block
//! shape, handler-only opcodes). The verifier never mutates the module; the
//! VM refuses to run modules that have not passed it.

mod dom;

use crate::block::BasicBlock;
use crate::func::Function;
use crate::instr::Instr;
use crate::module::Module;
use crate::opcode::{LabelShape, Opcode, OperandRule, ResultRule};
use crate::types::Type;
use crate::value::Value;
use std::collections::HashMap;
use viper_support::{Diag, Expected, SourceLoc};

/// Resolved type of an operand during checking.
#[derive(Debug, Clone, Copy, PartialEq)]
enum VType {
    Known(Type),
    /// Integer literal: matches any of i16/i32/i64.
    IntLit,
    /// `null`: matches any pointer-family type.
    NullLit,
}

impl VType {
    fn matches(self, want: Type) -> bool {
        match self {
            VType::Known(t) => t == want,
            VType::IntLit => want.is_int(),
            VType::NullLit => want.is_nullable(),
        }
    }

    fn describe(self) -> String {
        match self {
            VType::Known(t) => t.to_string(),
            VType::IntLit => "integer literal".to_string(),
            VType::NullLit => "null".to_string(),
        }
    }
}

struct FuncChecker<'m> {
    module: &'m Module,
    func: &'m Function,
    labels: HashMap<&'m str, usize>,
    /// Temp id -> type, seeded from function and block parameters.
    temp_types: HashMap<u32, Type>,
    /// Temp id -> definition site `(block, instr index)`; parameters use -1.
    defs: HashMap<u32, (usize, isize)>,
    /// Blocks that are `eh.push` targets.
    handler_blocks: Vec<bool>,
    diags: Vec<Diag>,
}

impl<'m> FuncChecker<'m> {
    fn new(module: &'m Module, func: &'m Function) -> Self {
        FuncChecker {
            module,
            func,
            labels: HashMap::new(),
            temp_types: HashMap::new(),
            defs: HashMap::new(),
            handler_blocks: vec![false; func.blocks.len()],
            diags: Vec::new(),
        }
    }

    fn error(&mut self, loc: SourceLoc, message: impl Into<String>) {
        self.diags.push(Diag::error(message, loc));
    }

    fn value_type(&self, value: &Value) -> VType {
        match value {
            Value::Temp(id) => self
                .temp_types
                .get(id)
                .copied()
                .map(VType::Known)
                .unwrap_or(VType::Known(Type::Void)),
            Value::ConstInt(_) => VType::IntLit,
            Value::ConstFloat(_) => VType::Known(Type::F64),
            Value::ConstStr(_) => VType::Known(Type::Str),
            Value::GlobalAddr(_) => VType::Known(Type::Ptr),
            Value::NullPtr => VType::NullLit,
        }
    }

    // Sweep 1: collect labels and parameter types.
    fn catalog(&mut self) {
        let func = self.func;
        if func.blocks.is_empty() {
            self.error(
                SourceLoc::UNKNOWN,
                format!("function @{} has no blocks", func.name),
            );
            return;
        }
        for (i, block) in func.blocks.iter().enumerate() {
            if self.labels.insert(block.label.as_str(), i).is_some() {
                self.error(
                    SourceLoc::UNKNOWN,
                    format!("duplicate label {} in function @{}", block.label, func.name),
                );
            }
        }
        for param in &func.params {
            self.temp_types.insert(param.id, param.ty);
            self.defs.insert(param.id, (0, -1));
        }
        for (i, block) in func.blocks.iter().enumerate() {
            for param in &block.params {
                if self.temp_types.insert(param.id, param.ty).is_some() {
                    self.error(
                        SourceLoc::UNKNOWN,
                        format!(
                            "block parameter %t{} redefines an existing temp in @{}",
                            param.id, func.name
                        ),
                    );
                }
                self.defs.insert(param.id, (i, -1));
            }
        }
        for block in &func.blocks {
            for instr in &block.instructions {
                if instr.op == Opcode::EhPush {
                    if let Some(&target) =
                        instr.labels.first().and_then(|l| self.labels.get(l.as_str()))
                    {
                        self.handler_blocks[target] = true;
                    }
                }
            }
        }
    }

    fn check_operand_rules(&mut self, instr: &Instr, context: &str) {
        let sig = instr.op.signature();
        if instr.operands.len() != sig.operands.len() {
            self.error(
                instr.loc,
                format!(
                    "{} expects {} operand(s), got {} {}",
                    instr.op,
                    sig.operands.len(),
                    instr.operands.len(),
                    context
                ),
            );
            return;
        }
        let first_type = instr.operands.first().map(|v| self.value_type(v));
        for (i, (value, rule)) in instr.operands.iter().zip(sig.operands).enumerate() {
            let vt = self.value_type(value);
            let ok = match rule {
                OperandRule::Exact(want) => vt.matches(*want),
                OperandRule::AnyInt => matches!(vt, VType::IntLit)
                    || matches!(vt, VType::Known(t) if t.is_int()),
                OperandRule::SameAsFirst => match first_type.unwrap() {
                    VType::Known(t) => vt.matches(t),
                    VType::IntLit => {
                        matches!(vt, VType::IntLit) || matches!(vt, VType::Known(t) if t.is_int())
                    }
                    VType::NullLit => matches!(vt, VType::NullLit),
                },
            };
            if !ok {
                self.error(
                    instr.loc,
                    format!(
                        "{} operand {} has type {} {}",
                        instr.op,
                        i,
                        vt.describe(),
                        context
                    ),
                );
            }
        }
    }

    fn check_branch_target(&mut self, instr: &Instr, which: usize, context: &str) {
        let func = self.func;
        let Some(label) = instr.labels.get(which) else {
            self.error(instr.loc, format!("{} missing target label {}", instr.op, context));
            return;
        };
        let Some(&target) = self.labels.get(label.as_str()) else {
            self.error(
                instr.loc,
                format!("unknown label {} {}", label, context),
            );
            return;
        };
        let params = &func.blocks[target].params;
        let args = instr.br_args.get(which).cloned().unwrap_or_default();
        if args.len() != params.len() {
            self.error(
                instr.loc,
                format!(
                    "branch to {} passes {} argument(s), block expects {} {}",
                    label,
                    args.len(),
                    params.len(),
                    context
                ),
            );
            return;
        }
        for (i, (arg, param)) in args.iter().zip(params).enumerate() {
            let vt = self.value_type(arg);
            if !vt.matches(param.ty) {
                self.error(
                    instr.loc,
                    format!(
                        "branch argument {} to {} has type {}, block parameter is {} {}",
                        i,
                        label,
                        vt.describe(),
                        param.ty,
                        context
                    ),
                );
            }
        }
    }

    fn check_call(&mut self, instr: &Instr, context: &str) -> Option<Type> {
        let Some(callee) = instr.callee.as_deref() else {
            self.error(instr.loc, format!("call without callee {}", context));
            return None;
        };
        let (params, ret): (Vec<Type>, Type) =
            if let Some(ext) = self.module.find_extern(callee) {
                (ext.params.clone(), ext.ret_type)
            } else if let Some(func) = self.module.find_function(callee) {
                (func.params.iter().map(|p| p.ty).collect(), func.ret_type)
            } else {
                self.error(
                    instr.loc,
                    format!("unknown callee @{} {}", callee, context),
                );
                return None;
            };
        if instr.operands.len() != params.len() {
            self.error(
                instr.loc,
                format!(
                    "call to @{} passes {} argument(s), signature has {} {}",
                    callee,
                    instr.operands.len(),
                    params.len(),
                    context
                ),
            );
        }
        for (i, (arg, want)) in instr.operands.iter().zip(&params).enumerate() {
            let vt = self.value_type(arg);
            if !vt.matches(*want) {
                self.error(
                    instr.loc,
                    format!(
                        "call argument {} to @{} has type {}, expected {} {}",
                        i,
                        callee,
                        vt.describe(),
                        want,
                        context
                    ),
                );
            }
        }
        if instr.result.is_some() && ret == Type::Void {
            self.error(
                instr.loc,
                format!("call to void @{} cannot define a result {}", callee, context),
            );
        }
        Some(ret)
    }

    fn check_global_operand(&mut self, instr: &Instr, want_str: bool, context: &str) {
        match instr.operands.first() {
            Some(Value::GlobalAddr(name)) => match self.module.find_global(name) {
                Some(global) => {
                    if want_str && global.ty != Type::Str {
                        self.error(
                            instr.loc,
                            format!("global @{} is not a string global {}", name, context),
                        );
                    }
                }
                None => {
                    self.error(
                        instr.loc,
                        format!("unknown global @{} {}", name, context),
                    );
                }
            },
            _ => {
                self.error(
                    instr.loc,
                    format!("{} expects a global operand {}", instr.op, context),
                );
            }
        }
    }

    // Sweep 2: per-instruction structural and type checks.
    fn check_instructions(&mut self) {
        let func = self.func;
        for (block_idx, block) in func.blocks.iter().enumerate() {
            let context = format!("in @{}:{}", func.name, block.label);
            if block.instructions.is_empty() {
                self.error(
                    SourceLoc::UNKNOWN,
                    format!("empty block {}", context.trim_start_matches("in ")),
                );
                continue;
            }
            if !block.instructions.last().unwrap().is_terminator() {
                self.error(
                    block.instructions.last().unwrap().loc,
                    format!("block missing terminator {}", context),
                );
            }
            let mut seen_terminator = false;
            for (ip, instr) in block.instructions.iter().enumerate() {
                if seen_terminator {
                    self.error(
                        instr.loc,
                        format!("instruction after terminator {}", context),
                    );
                    break;
                }
                if instr.is_terminator() {
                    seen_terminator = true;
                }
                self.check_instr(block_idx, block, ip, instr, &context);
            }
        }
    }

    fn check_instr(
        &mut self,
        _block_idx: usize,
        block: &BasicBlock,
        ip: usize,
        instr: &Instr,
        context: &str,
    ) {
        let sig = instr.op.signature();
        let mut result_type = None;

        match instr.op {
            Opcode::Call => {
                result_type = self.check_call(instr, context);
            }
            Opcode::Ret => {
                if self.func.ret_type == Type::Void {
                    if !instr.operands.is_empty() {
                        self.error(
                            instr.loc,
                            format!("ret with value in void function {}", context),
                        );
                    }
                } else if instr.operands.len() != 1 {
                    self.error(instr.loc, format!("ret missing value {}", context));
                } else {
                    let vt = self.value_type(&instr.operands[0]);
                    if !vt.matches(self.func.ret_type) {
                        self.error(
                            instr.loc,
                            format!(
                                "ret value has type {}, function returns {} {}",
                                vt.describe(),
                                self.func.ret_type,
                                context
                            ),
                        );
                    }
                }
            }
            Opcode::Store => {
                if instr.operands.len() != 2 {
                    self.error(instr.loc, format!("store expects 2 operands {}", context));
                } else {
                    let ptr = self.value_type(&instr.operands[0]);
                    if !ptr.matches(Type::Ptr) {
                        self.error(
                            instr.loc,
                            format!("store pointer has type {} {}", ptr.describe(), context),
                        );
                    }
                    let value = self.value_type(&instr.operands[1]);
                    if !value.matches(instr.ty) {
                        self.error(
                            instr.loc,
                            format!(
                                "store value has type {}, access type is {} {}",
                                value.describe(),
                                instr.ty,
                                context
                            ),
                        );
                    }
                }
            }
            Opcode::Load => {
                self.check_operand_rules(instr, context);
                if instr.ty == Type::Void {
                    self.error(instr.loc, format!("load of void {}", context));
                }
            }
            Opcode::ConstStr => {
                self.check_global_operand(instr, true, context);
            }
            Opcode::AddrOf => {
                self.check_global_operand(instr, false, context);
            }
            Opcode::ConstNull => {
                if !instr.ty.is_nullable() {
                    self.error(
                        instr.loc,
                        format!("const_null of non-nullable type {} {}", instr.ty, context),
                    );
                }
            }
            Opcode::Zext1 => {
                self.check_operand_rules(instr, context);
                if !instr.ty.is_int() {
                    self.error(
                        instr.loc,
                        format!("zext1 target type {} is not an integer {}", instr.ty, context),
                    );
                }
            }
            _ => {
                self.check_operand_rules(instr, context);
            }
        }

        // Successor labels.
        match sig.labels {
            LabelShape::None => {
                if !instr.labels.is_empty() {
                    self.error(
                        instr.loc,
                        format!("{} does not take labels {}", instr.op, context),
                    );
                }
            }
            LabelShape::One => match instr.op {
                Opcode::EhPush => {
                    if instr.labels.len() != 1 {
                        self.error(instr.loc, format!("eh.push takes one label {}", context));
                    } else if !self.labels.contains_key(instr.labels[0].as_str()) {
                        self.error(
                            instr.loc,
                            format!("unknown label {} {}", instr.labels[0], context),
                        );
                    }
                }
                _ => {
                    if instr.labels.len() != 1 {
                        self.error(
                            instr.loc,
                            format!("{} takes one target {}", instr.op, context),
                        );
                    } else {
                        self.check_branch_target(instr, 0, context);
                    }
                }
            },
            LabelShape::Two => {
                if instr.labels.len() != 2 {
                    self.error(instr.loc, format!("{} takes two targets {}", instr.op, context));
                } else {
                    self.check_branch_target(instr, 0, context);
                    self.check_branch_target(instr, 1, context);
                }
            }
        }

        // Handler-only opcodes.
        let in_handler = self
            .labels
            .get(block.label.as_str())
            .map(|&i| self.handler_blocks[i])
            .unwrap_or(false);
        if instr.op == Opcode::TrapKind && !in_handler {
            self.error(
                instr.loc,
                format!("trap.kind outside handler block {}", context),
            );
        }
        if instr.op == Opcode::EhEntry && (!in_handler || ip != 0) {
            self.error(
                instr.loc,
                format!(
                    "eh.entry must be the first instruction of a handler block {}",
                    context
                ),
            );
        }

        // Result temp bookkeeping.
        if let Some(result) = instr.result {
            if sig.result == ResultRule::None {
                self.error(
                    instr.loc,
                    format!("{} cannot define a result {}", instr.op, context),
                );
                return;
            }
            let ty = match sig.result {
                ResultRule::Exact(t) => t,
                ResultRule::SameAsOperand => match instr
                    .operands
                    .first()
                    .map(|v| self.value_type(v))
                {
                    Some(VType::Known(t)) => t,
                    _ => Type::I64,
                },
                ResultRule::FromInstrType => instr.ty,
                ResultRule::FromCallee => result_type.unwrap_or(Type::Void),
                ResultRule::None => unreachable!(),
            };
            if self.defs.contains_key(&result) {
                self.error(
                    instr.loc,
                    format!("temp %t{} defined more than once {}", result, context),
                );
            } else {
                self.temp_types.insert(result, ty);
                self.defs
                    .insert(result, (self.labels[block.label.as_str()], ip as isize));
            }
        }
    }

    /// Successor adjacency used for dominance: normal branch edges plus an
    /// edge from each `eh.push` site to its handler (a handler only runs
    /// after the push executed).
    fn successors(&self) -> Vec<Vec<usize>> {
        let mut succs = vec![Vec::new(); self.func.blocks.len()];
        for (i, block) in self.func.blocks.iter().enumerate() {
            for instr in &block.instructions {
                for label in &instr.labels {
                    if let Some(&t) = self.labels.get(label.as_str()) {
                        if !succs[i].contains(&t) {
                            succs[i].push(t);
                        }
                    }
                }
            }
        }
        succs
    }

    // Dominance: every use sees its definition on every path.
    fn check_dominance(&mut self) {
        let succs = self.successors();
        let idom = dom::immediate_dominators(&succs);
        let mut errors = Vec::new();
        for (b, block) in self.func.blocks.iter().enumerate() {
            for (ip, instr) in block.instructions.iter().enumerate() {
                let mut check_use = |id: u32, errors: &mut Vec<(SourceLoc, String)>| {
                    let Some(&(db, di)) = self.defs.get(&id) else {
                        errors.push((
                            instr.loc,
                            format!(
                                "temp %t{} used but never defined in @{}",
                                id, self.func.name
                            ),
                        ));
                        return;
                    };
                    let dominated = if db == b {
                        di < ip as isize
                    } else {
                        dom::dominates(&idom, db, b)
                    };
                    if !dominated {
                        errors.push((
                            instr.loc,
                            format!(
                                "temp %t{} does not dominate its use in @{}:{}",
                                id, self.func.name, block.label
                            ),
                        ));
                    }
                };
                for value in &instr.operands {
                    if let Value::Temp(id) = value {
                        check_use(*id, &mut errors);
                    }
                }
                for args in &instr.br_args {
                    for value in args {
                        if let Value::Temp(id) = value {
                            check_use(*id, &mut errors);
                        }
                    }
                }
            }
        }
        for (loc, msg) in errors {
            self.error(loc, msg);
        }
    }

    // Sweep 3: EH stack discipline and handler shape.
    fn check_eh(&mut self) {
        // Handler blocks carry exactly (error, resume_tok).
        let func = self.func;
        for (i, block) in func.blocks.iter().enumerate() {
            if !self.handler_blocks[i] {
                continue;
            }
            let shape_ok = block.params.len() == 2
                && block.params[0].ty == Type::Error
                && block.params[1].ty == Type::ResumeTok;
            if !shape_ok {
                self.error(
                    SourceLoc::UNKNOWN,
                    format!(
                        "handler block {} in @{} must take (error, resume_tok)",
                        block.label, func.name
                    ),
                );
            }
        }

        // Symbolic push/pop depth along normal edges from the entry, then
        // from each handler seeded with the depth at its push site. Handler
        // paths may legitimately return with the firing frame still pushed,
        // so only entry-reachable paths require balance at ret.
        let mut entry_depth: Vec<Option<i32>> = vec![None; self.func.blocks.len()];
        let mut handler_seeds: Vec<(usize, i32)> = Vec::new();
        let mut errors: Vec<(SourceLoc, String)> = Vec::new();
        let mut work = vec![(0usize, 0i32, true)];
        let mut visited_handler: Vec<Option<i32>> = vec![None; self.func.blocks.len()];

        while let Some((b, depth_in, from_entry)) = work.pop() {
            let block = &self.func.blocks[b];
            if from_entry {
                match entry_depth[b] {
                    Some(d) if d != depth_in => {
                        errors.push((
                            SourceLoc::UNKNOWN,
                            format!(
                                "conflicting EH depth at {} in @{} ({} vs {})",
                                block.label, self.func.name, d, depth_in
                            ),
                        ));
                        continue;
                    }
                    Some(_) => continue,
                    None => entry_depth[b] = Some(depth_in),
                }
            } else {
                match visited_handler[b] {
                    Some(d) if d == depth_in => continue,
                    Some(_) => continue,
                    None => visited_handler[b] = Some(depth_in),
                }
            }

            let mut depth = depth_in;
            for instr in &block.instructions {
                match instr.op {
                    Opcode::EhPush => {
                        depth += 1;
                        if let Some(&h) = instr
                            .labels
                            .first()
                            .and_then(|l| self.labels.get(l.as_str()))
                        {
                            handler_seeds.push((h, depth));
                        }
                    }
                    Opcode::EhPop => {
                        depth -= 1;
                        if depth < 0 {
                            errors.push((
                                instr.loc,
                                format!(
                                    "eh.pop with empty EH stack in @{}:{}",
                                    self.func.name, block.label
                                ),
                            ));
                            depth = 0;
                        }
                    }
                    Opcode::Ret => {
                        if from_entry && depth != 0 {
                            errors.push((
                                instr.loc,
                                format!(
                                    "unbalanced EH stack at return in @{}:{} (depth {})",
                                    self.func.name, block.label, depth
                                ),
                            ));
                        }
                    }
                    _ => {}
                }
            }
            for label in block
                .instructions
                .iter()
                .filter(|i| i.op != Opcode::EhPush)
                .flat_map(|i| i.labels.iter())
            {
                if let Some(&t) = self.labels.get(label.as_str()) {
                    work.push((t, depth, from_entry));
                }
            }
        }
        for (h, depth) in handler_seeds {
            work.push((h, depth, false));
            while let Some((b, depth_in, from_entry)) = work.pop() {
                let block = &self.func.blocks[b];
                if visited_handler[b].is_some() || entry_depth[b].is_some() {
                    continue;
                }
                visited_handler[b] = Some(depth_in);
                let mut depth = depth_in;
                for instr in &block.instructions {
                    match instr.op {
                        Opcode::EhPush => depth += 1,
                        Opcode::EhPop => {
                            depth -= 1;
                            if depth < 0 {
                                errors.push((
                                    instr.loc,
                                    format!(
                                        "eh.pop with empty EH stack in @{}:{}",
                                        self.func.name, block.label
                                    ),
                                ));
                                depth = 0;
                            }
                        }
                        _ => {}
                    }
                }
                for label in block
                    .instructions
                    .iter()
                    .filter(|i| i.op != Opcode::EhPush)
                    .flat_map(|i| i.labels.iter())
                {
                    if let Some(&t) = self.labels.get(label.as_str()) {
                        work.push((t, depth, from_entry));
                    }
                }
            }
        }

        for (loc, msg) in errors {
            self.error(loc, msg);
        }
    }

    fn run(mut self) -> Vec<Diag> {
        self.catalog();
        if self.func.blocks.is_empty() {
            return self.diags;
        }
        self.check_instructions();
        self.check_dominance();
        self.check_eh();
        self.diags
    }
}

/// Verify `module`, returning every diagnostic in deterministic order.
pub fn verify_all(module: &Module) -> Vec<Diag> {
    let mut diags = Vec::new();

    // Module-level name collisions.
    let mut seen = HashMap::new();
    for e in &module.externs {
        if seen.insert(e.name.as_str(), "extern").is_some() {
            diags.push(Diag::error(
                format!("duplicate declaration @{}", e.name),
                SourceLoc::UNKNOWN,
            ));
        }
    }
    for f in &module.functions {
        if seen.insert(f.name.as_str(), "func").is_some() {
            diags.push(Diag::error(
                format!("duplicate declaration @{}", f.name),
                SourceLoc::UNKNOWN,
            ));
        }
    }

    for func in &module.functions {
        diags.extend(FuncChecker::new(module, func).run());
    }
    tracing::debug!(
        functions = module.functions.len(),
        diagnostics = diags.len(),
        "verification finished"
    );
    diags
}

/// Verify `module`; `Err` carries the first diagnostic.
pub fn verify(module: &Module) -> Expected<()> {
    match verify_all(module).into_iter().next() {
        Some(diag) => Err(diag),
        None => Ok(()),
    }
}
