//! Insertion-point IR builder.
//!
//! Frontends and tests synthesize modules through this builder instead of
//! assembling structs by hand: it assigns dense temp ids per function,
//! defines block parameters, and keeps an insertion block for emission.

use crate::block::{BasicBlock, Param};
use crate::func::Function;
use crate::instr::Instr;
use crate::module::{Extern, Global, Module};
use crate::opcode::Opcode;
use crate::types::Type;
use crate::value::Value;
use viper_support::SourceLoc;

/// Builder over a borrowed module.
pub struct IrBuilder<'m> {
    module: &'m mut Module,
    cur_func: Option<usize>,
    cur_block: Option<usize>,
    next_temp: u32,
}

impl<'m> IrBuilder<'m> {
    pub fn new(module: &'m mut Module) -> Self {
        IrBuilder {
            module,
            cur_func: None,
            cur_block: None,
            next_temp: 0,
        }
    }

    pub fn module(&mut self) -> &mut Module {
        self.module
    }

    pub fn add_extern(&mut self, name: &str, ret_type: Type, params: Vec<Type>) {
        self.module.externs.push(Extern::new(name, ret_type, params));
    }

    pub fn add_global_str(&mut self, name: &str, init: &[u8]) {
        self.module
            .globals
            .push(Global::new(name, Type::Str, init.to_vec()));
    }

    /// Begin a new function; its parameters define temps `0..params.len()`.
    ///
    /// Returns the function index. Subsequent `add_block` / emission targets
    /// this function until the next `start_function`.
    pub fn start_function(
        &mut self,
        name: &str,
        ret_type: Type,
        params: Vec<(String, Type)>,
    ) -> usize {
        let params: Vec<Param> = params
            .into_iter()
            .enumerate()
            .map(|(i, (name, ty))| Param::new(name, ty, i as u32))
            .collect();
        self.next_temp = params.len() as u32;
        self.module
            .functions
            .push(Function::new(name, ret_type, params));
        let idx = self.module.functions.len() - 1;
        self.cur_func = Some(idx);
        self.cur_block = None;
        idx
    }

    /// Append a parameterless block to the current function.
    pub fn add_block(&mut self, label: &str) -> usize {
        self.create_block(label, Vec::new())
    }

    /// Append a block with typed parameters, assigning each a fresh temp id.
    pub fn create_block(&mut self, label: &str, params: Vec<(String, Type)>) -> usize {
        let func = &mut self.module.functions[self.cur_func.expect("no active function")];
        let params: Vec<Param> = params
            .into_iter()
            .map(|(name, ty)| {
                let id = self.next_temp;
                self.next_temp += 1;
                Param::new(name, ty, id)
            })
            .collect();
        func.blocks.push(BasicBlock::with_params(label, params));
        let idx = func.blocks.len() - 1;
        if self.cur_block.is_none() {
            self.cur_block = Some(idx);
        }
        idx
    }

    /// Change the insertion point to the block at `index`.
    pub fn set_insert_point(&mut self, index: usize) {
        self.cur_block = Some(index);
    }

    /// Reserve the next dense temp id.
    pub fn reserve_temp_id(&mut self) -> u32 {
        let id = self.next_temp;
        self.next_temp += 1;
        id
    }

    /// SSA value of the `idx`-th parameter of block `block`.
    pub fn block_param(&self, block: usize, idx: usize) -> Value {
        let func = &self.module.functions[self.cur_func.expect("no active function")];
        Value::temp(func.blocks[block].params[idx].id)
    }

    /// Append `instr` to the insertion block.
    pub fn emit(&mut self, instr: Instr) {
        let func = &mut self.module.functions[self.cur_func.expect("no active function")];
        func.blocks[self.cur_block.expect("no insertion block")].push(instr);
    }

    /// Emit a binary instruction and return its result value.
    pub fn emit_binary(
        &mut self,
        op: Opcode,
        ty: Type,
        lhs: Value,
        rhs: Value,
        loc: SourceLoc,
    ) -> Value {
        let id = self.reserve_temp_id();
        let mut instr = Instr::with_type(op, ty);
        instr.result = Some(id);
        instr.operands = vec![lhs, rhs];
        instr.loc = loc;
        self.emit(instr);
        Value::temp(id)
    }

    /// Emit a call; returns the result value when `ret_type` is non-void.
    pub fn emit_call(
        &mut self,
        callee: &str,
        ret_type: Type,
        args: Vec<Value>,
        loc: SourceLoc,
    ) -> Option<Value> {
        let mut instr = Instr::with_type(Opcode::Call, ret_type);
        instr.callee = Some(callee.to_string());
        instr.operands = args;
        instr.loc = loc;
        let result = if ret_type != Type::Void {
            let id = self.reserve_temp_id();
            instr.result = Some(id);
            Some(Value::temp(id))
        } else {
            None
        };
        self.emit(instr);
        result
    }

    /// Emit an unconditional branch with block arguments.
    pub fn emit_br(&mut self, target: &str, args: Vec<Value>, loc: SourceLoc) {
        let mut instr = Instr::new(Opcode::Br);
        instr.labels.push(target.to_string());
        instr.br_args.push(args);
        instr.loc = loc;
        self.emit(instr);
    }

    /// Emit a conditional branch with per-target argument vectors.
    pub fn emit_cbr(
        &mut self,
        cond: Value,
        then_target: (&str, Vec<Value>),
        else_target: (&str, Vec<Value>),
        loc: SourceLoc,
    ) {
        let mut instr = Instr::new(Opcode::CBr);
        instr.operands.push(cond);
        instr.labels.push(then_target.0.to_string());
        instr.labels.push(else_target.0.to_string());
        instr.br_args.push(then_target.1);
        instr.br_args.push(else_target.1);
        instr.loc = loc;
        self.emit(instr);
    }

    /// Emit a return with an optional value.
    pub fn emit_ret(&mut self, value: Option<Value>, loc: SourceLoc) {
        let mut instr = Instr::new(Opcode::Ret);
        if let Some(v) = value {
            instr.operands.push(v);
        }
        instr.loc = loc;
        self.emit(instr);
    }

    /// Emit `eh.push` naming `handler`.
    pub fn emit_eh_push(&mut self, handler: &str, loc: SourceLoc) {
        let mut instr = Instr::new(Opcode::EhPush);
        instr.labels.push(handler.to_string());
        instr.loc = loc;
        self.emit(instr);
    }

    /// Emit `eh.pop`.
    pub fn emit_eh_pop(&mut self, loc: SourceLoc) {
        let mut instr = Instr::new(Opcode::EhPop);
        instr.loc = loc;
        self.emit(instr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_temp_ids_start_after_params() {
        let mut module = Module::new();
        let mut b = IrBuilder::new(&mut module);
        b.start_function(
            "f",
            Type::I64,
            vec![("a".into(), Type::I64), ("b".into(), Type::I64)],
        );
        b.add_block("entry");
        assert_eq!(b.reserve_temp_id(), 2);
        assert_eq!(b.reserve_temp_id(), 3);
    }

    #[test]
    fn test_block_params_get_fresh_temps() {
        let mut module = Module::new();
        let mut b = IrBuilder::new(&mut module);
        b.start_function("main", Type::I64, vec![]);
        b.add_block("entry");
        let handler = b.create_block(
            "handler",
            vec![
                ("err".into(), Type::Error),
                ("tok".into(), Type::ResumeTok),
            ],
        );
        assert_eq!(b.block_param(handler, 0), Value::temp(0));
        assert_eq!(b.block_param(handler, 1), Value::temp(1));
        assert_eq!(b.reserve_temp_id(), 2);
    }

    #[test]
    fn test_emit_targets_insertion_block() {
        let mut module = Module::new();
        let mut b = IrBuilder::new(&mut module);
        b.start_function("main", Type::I64, vec![]);
        let entry = b.add_block("entry");
        let body = b.add_block("body");
        b.set_insert_point(entry);
        b.emit_br("body", vec![], SourceLoc::UNKNOWN);
        b.set_insert_point(body);
        b.emit_ret(Some(Value::const_int(0)), SourceLoc::UNKNOWN);
        let f = &module.functions[0];
        assert_eq!(f.blocks[0].instructions.len(), 1);
        assert!(f.blocks[0].terminated);
        assert_eq!(f.blocks[1].instructions.len(), 1);
    }

    #[test]
    fn test_emit_call_void_has_no_result() {
        let mut module = Module::new();
        let mut b = IrBuilder::new(&mut module);
        b.add_extern("rt_print_i64", Type::Void, vec![Type::I64]);
        b.start_function("main", Type::I64, vec![]);
        b.add_block("entry");
        let r = b.emit_call(
            "rt_print_i64",
            Type::Void,
            vec![Value::const_int(1)],
            SourceLoc::UNKNOWN,
        );
        assert!(r.is_none());
    }
}
