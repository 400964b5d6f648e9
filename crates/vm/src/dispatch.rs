//! Opcode handlers and the three dispatch backends.
//!
//! Every opcode has one handler function. The `switch` backend reaches it
//! through a match; the `table` backend through a function-pointer array
//! indexed by opcode; the `threaded` backend through per-block handler
//! streams pre-decoded on first entry into a function. All three produce
//! identical observable results.

use crate::frame::Slot;
use crate::trap::{ErrorValue, TrapInfo, TrapKind, map_err_to_trap};
use crate::vm::{Control, Vm};
use viper_il::{Instr, Opcode, Type, Value, opcode::OPCODE_COUNT};
use viper_runtime::RtStr;

pub(crate) type OpHandler = fn(&mut Vm<'_>, &Instr) -> Result<Control, TrapInfo>;

// ---- shared primitives -------------------------------------------------

fn overflow() -> TrapInfo {
    TrapInfo::new(TrapKind::Overflow, "integer overflow")
}

fn div_by_zero() -> TrapInfo {
    TrapInfo::new(TrapKind::DivideByZero, "division by zero")
}

/// Wrap a result to the instruction's integer width.
fn truncate_to_width(ty: Type, v: i64) -> i64 {
    match ty {
        Type::I16 => v as i16 as i64,
        Type::I32 => v as i32 as i64,
        _ => v,
    }
}

/// Reject checked results outside the instruction's integer width.
fn check_width(ty: Type, v: Option<i64>) -> Result<i64, TrapInfo> {
    let v = v.ok_or_else(overflow)?;
    let fits = match ty {
        Type::I16 => i16::try_from(v).is_ok(),
        Type::I32 => i32::try_from(v).is_ok(),
        _ => true,
    };
    if fits { Ok(v) } else { Err(overflow()) }
}

fn int_bin(
    vm: &mut Vm<'_>,
    instr: &Instr,
    op: impl Fn(i64, i64) -> Result<i64, TrapInfo>,
) -> Result<Control, TrapInfo> {
    let a = vm.eval_i64(&instr.operands[0])?;
    let b = vm.eval_i64(&instr.operands[1])?;
    let v = op(a, b)?;
    vm.set_result(instr, Slot::I64(truncate_to_width(instr.ty, v)));
    Ok(Control::Next)
}

fn int_cmp(
    vm: &mut Vm<'_>,
    instr: &Instr,
    op: impl Fn(i64, i64) -> bool,
) -> Result<Control, TrapInfo> {
    let a = vm.eval_i64(&instr.operands[0])?;
    let b = vm.eval_i64(&instr.operands[1])?;
    vm.set_result(instr, Slot::I64(op(a, b) as i64));
    Ok(Control::Next)
}

fn float_bin(
    vm: &mut Vm<'_>,
    instr: &Instr,
    op: impl Fn(f64, f64) -> f64,
) -> Result<Control, TrapInfo> {
    let a = vm.eval_f64(&instr.operands[0])?;
    let b = vm.eval_f64(&instr.operands[1])?;
    vm.set_result(instr, Slot::F64(op(a, b)));
    Ok(Control::Next)
}

fn float_cmp(
    vm: &mut Vm<'_>,
    instr: &Instr,
    op: impl Fn(f64, f64) -> bool,
) -> Result<Control, TrapInfo> {
    let a = vm.eval_f64(&instr.operands[0])?;
    let b = vm.eval_f64(&instr.operands[1])?;
    vm.set_result(instr, Slot::I64(op(a, b) as i64));
    Ok(Control::Next)
}

fn access_size(ty: Type) -> Result<usize, TrapInfo> {
    match ty {
        Type::I1 => Ok(1),
        Type::I16 => Ok(2),
        Type::I32 => Ok(4),
        Type::I64 | Type::F64 | Type::Ptr | Type::Str => Ok(8),
        other => Err(TrapInfo::new(
            TrapKind::InvalidOperation,
            format!("type {} is not loadable", other),
        )),
    }
}

fn nonnull(addr: usize, what: &str) -> Result<usize, TrapInfo> {
    if addr == 0 {
        Err(TrapInfo::new(
            TrapKind::InvalidOperation,
            format!("null pointer {}", what),
        ))
    } else {
        Ok(addr)
    }
}

// ---- integer arithmetic ------------------------------------------------

fn h_add(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    int_bin(vm, i, |a, b| Ok(a.wrapping_add(b)))
}

fn h_sub(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    int_bin(vm, i, |a, b| Ok(a.wrapping_sub(b)))
}

fn h_mul(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    int_bin(vm, i, |a, b| Ok(a.wrapping_mul(b)))
}

fn h_sdiv(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    int_bin(vm, i, |a, b| {
        if b == 0 {
            Err(div_by_zero())
        } else {
            Ok(a.wrapping_div(b))
        }
    })
}

fn h_udiv(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    int_bin(vm, i, |a, b| {
        if b == 0 {
            Err(div_by_zero())
        } else {
            Ok(((a as u64) / (b as u64)) as i64)
        }
    })
}

fn h_srem(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    int_bin(vm, i, |a, b| {
        if b == 0 {
            Err(div_by_zero())
        } else {
            Ok(a.wrapping_rem(b))
        }
    })
}

fn h_urem(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    int_bin(vm, i, |a, b| {
        if b == 0 {
            Err(div_by_zero())
        } else {
            Ok(((a as u64) % (b as u64)) as i64)
        }
    })
}

fn h_iadd_chk_ovf(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    let ty = i.ty;
    int_bin(vm, i, move |a, b| check_width(ty, a.checked_add(b)))
}

fn h_isub_chk_ovf(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    let ty = i.ty;
    int_bin(vm, i, move |a, b| check_width(ty, a.checked_sub(b)))
}

fn h_imul_chk_ovf(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    let ty = i.ty;
    int_bin(vm, i, move |a, b| check_width(ty, a.checked_mul(b)))
}

fn h_sdiv_chk0(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    int_bin(vm, i, |a, b| {
        if b == 0 {
            Err(div_by_zero())
        } else {
            Ok(a.wrapping_div(b))
        }
    })
}

fn h_sdiv_chk_ovf(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    int_bin(vm, i, |a, b| {
        if b == 0 {
            Err(div_by_zero())
        } else {
            a.checked_div(b).ok_or_else(overflow)
        }
    })
}

fn h_srem_chk0(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    int_bin(vm, i, |a, b| {
        if b == 0 {
            Err(div_by_zero())
        } else {
            Ok(a.wrapping_rem(b))
        }
    })
}

// ---- bitwise and shifts ------------------------------------------------

fn h_and(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    int_bin(vm, i, |a, b| Ok(a & b))
}

fn h_or(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    int_bin(vm, i, |a, b| Ok(a | b))
}

fn h_xor(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    int_bin(vm, i, |a, b| Ok(a ^ b))
}

fn h_shl(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    int_bin(vm, i, |a, b| Ok(a.wrapping_shl(b as u32 & 63)))
}

fn h_lshr(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    int_bin(vm, i, |a, b| Ok(((a as u64).wrapping_shr(b as u32 & 63)) as i64))
}

fn h_ashr(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    int_bin(vm, i, |a, b| Ok(a.wrapping_shr(b as u32 & 63)))
}

// ---- float arithmetic --------------------------------------------------

fn h_fadd(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    float_bin(vm, i, |a, b| a + b)
}

fn h_fsub(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    float_bin(vm, i, |a, b| a - b)
}

fn h_fmul(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    float_bin(vm, i, |a, b| a * b)
}

fn h_fdiv(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    float_bin(vm, i, |a, b| a / b)
}

// ---- comparisons -------------------------------------------------------

fn h_icmp_eq(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    int_cmp(vm, i, |a, b| a == b)
}

fn h_icmp_ne(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    int_cmp(vm, i, |a, b| a != b)
}

fn h_scmp_lt(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    int_cmp(vm, i, |a, b| a < b)
}

fn h_scmp_le(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    int_cmp(vm, i, |a, b| a <= b)
}

fn h_scmp_gt(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    int_cmp(vm, i, |a, b| a > b)
}

fn h_scmp_ge(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    int_cmp(vm, i, |a, b| a >= b)
}

fn h_ucmp_lt(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    int_cmp(vm, i, |a, b| (a as u64) < (b as u64))
}

fn h_ucmp_le(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    int_cmp(vm, i, |a, b| (a as u64) <= (b as u64))
}

fn h_ucmp_gt(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    int_cmp(vm, i, |a, b| (a as u64) > (b as u64))
}

fn h_ucmp_ge(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    int_cmp(vm, i, |a, b| (a as u64) >= (b as u64))
}

fn h_fcmp_eq(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    float_cmp(vm, i, |a, b| a == b)
}

fn h_fcmp_ne(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    // Ordered not-equal: false when either operand is NaN.
    float_cmp(vm, i, |a, b| a < b || a > b)
}

fn h_fcmp_lt(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    float_cmp(vm, i, |a, b| a < b)
}

fn h_fcmp_le(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    float_cmp(vm, i, |a, b| a <= b)
}

fn h_fcmp_gt(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    float_cmp(vm, i, |a, b| a > b)
}

fn h_fcmp_ge(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    float_cmp(vm, i, |a, b| a >= b)
}

// ---- conversions -------------------------------------------------------

fn h_sitofp(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    let a = vm.eval_i64(&i.operands[0])?;
    vm.set_result(i, Slot::F64(a as f64));
    Ok(Control::Next)
}

fn h_fptosi(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    let f = vm.eval_f64(&i.operands[0])?;
    if !f.is_finite() {
        return Err(TrapInfo::new(
            TrapKind::InvalidCast,
            "cannot convert non-finite float to integer",
        ));
    }
    let t = f.trunc();
    // 2^63 is exactly representable; anything at or above it is out of
    // range, as is anything below -2^63.
    if t >= 9_223_372_036_854_775_808.0 || t < -9_223_372_036_854_775_808.0 {
        return Err(TrapInfo::new(
            TrapKind::InvalidCast,
            "float out of signed 64-bit range",
        ));
    }
    vm.set_result(i, Slot::I64(t as i64));
    Ok(Control::Next)
}

fn h_zext1(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    let a = vm.eval_i64(&i.operands[0])?;
    vm.set_result(i, Slot::I64(a & 1));
    Ok(Control::Next)
}

fn h_trunc1(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    let a = vm.eval_i64(&i.operands[0])?;
    vm.set_result(i, Slot::I64(a & 1));
    Ok(Control::Next)
}

// ---- memory ------------------------------------------------------------

fn h_alloca(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    let bytes = vm.eval_i64(&i.operands[0])?;
    if bytes < 0 {
        return Err(TrapInfo::new(
            TrapKind::InvalidOperation,
            "negative alloca size",
        ));
    }
    let addr = vm.frame_mut().alloca(bytes as usize)?;
    vm.set_result(i, Slot::Ptr(addr));
    Ok(Control::Next)
}

fn h_load(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    let addr = nonnull(vm.eval(&i.operands[0])?.as_ptr()?, "load")?;
    access_size(i.ty)?;
    // Safety: the verifier guarantees pointer-typed operands; addresses come
    // from alloca frames or globals that outlive the access. Reads are
    // unaligned-tolerant.
    let slot = unsafe {
        match i.ty {
            Type::I1 => Slot::I64((std::ptr::read_unaligned(addr as *const u8) != 0) as i64),
            Type::I16 => Slot::I64(std::ptr::read_unaligned(addr as *const i16) as i64),
            Type::I32 => Slot::I64(std::ptr::read_unaligned(addr as *const i32) as i64),
            Type::I64 => Slot::I64(std::ptr::read_unaligned(addr as *const i64)),
            Type::F64 => Slot::F64(std::ptr::read_unaligned(addr as *const f64)),
            Type::Ptr => Slot::Ptr(std::ptr::read_unaligned(addr as *const usize)),
            Type::Str => {
                let raw = std::ptr::read_unaligned(addr as *const usize);
                let s = RtStr::from_raw(raw);
                // The loaded slot owns a fresh reference; the in-memory copy
                // stays borrowed.
                s.retain();
                Slot::Str(s)
            }
            _ => unreachable!("access_size rejected the type"),
        }
    };
    vm.set_result(i, slot);
    Ok(Control::Next)
}

fn h_store(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    let addr = nonnull(vm.eval(&i.operands[0])?.as_ptr()?, "store")?;
    let size = access_size(i.ty)?;
    let value = vm.eval(&i.operands[1])?;
    // Safety: see h_load; writes are unaligned-tolerant.
    unsafe {
        match i.ty {
            Type::I1 => std::ptr::write_unaligned(addr as *mut u8, (value.as_i64()? & 1) as u8),
            Type::I16 => std::ptr::write_unaligned(addr as *mut i16, value.as_i64()? as i16),
            Type::I32 => std::ptr::write_unaligned(addr as *mut i32, value.as_i64()? as i32),
            Type::I64 => std::ptr::write_unaligned(addr as *mut i64, value.as_i64()?),
            Type::F64 => std::ptr::write_unaligned(addr as *mut f64, value.as_f64()?),
            Type::Ptr => std::ptr::write_unaligned(addr as *mut usize, value.as_ptr()?),
            Type::Str => {
                // Memory holds a borrowed copy of the handle word.
                let raw = match &value {
                    Slot::Str(s) => s.into_raw(),
                    Slot::Null => RtStr::EMPTY.into_raw(),
                    _ => {
                        return Err(TrapInfo::new(
                            TrapKind::InvalidOperation,
                            "expected string value in store",
                        ));
                    }
                };
                std::ptr::write_unaligned(addr as *mut usize, raw);
            }
            _ => unreachable!("access_size rejected the type"),
        }
    }
    vm.debug.on_mem_write(addr, size);
    Ok(Control::Next)
}

fn h_gep(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    let base = vm.eval(&i.operands[0])?.as_ptr()?;
    let offset = vm.eval_i64(&i.operands[1])?;
    vm.set_result(i, Slot::Ptr(base.wrapping_add_signed(offset as isize)));
    Ok(Control::Next)
}

fn h_addr_of(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    let addr = vm.eval(&i.operands[0])?;
    vm.set_result(i, addr);
    Ok(Control::Next)
}

fn h_const_str(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    let Some(Value::GlobalAddr(name)) = i.operands.first() else {
        return Err(TrapInfo::new(
            TrapKind::InvalidOperation,
            "const_str expects a global operand",
        ));
    };
    let handle = vm.global_str(name)?;
    handle.retain();
    vm.set_result(i, Slot::Str(handle));
    Ok(Control::Next)
}

fn h_const_null(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    let slot = match i.ty {
        Type::Str => Slot::Str(RtStr::EMPTY),
        _ => Slot::Null,
    };
    vm.set_result(i, slot);
    Ok(Control::Next)
}

// ---- calls and control -------------------------------------------------

fn h_call(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    vm.do_call(i)
}

fn h_br(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    vm.branch_to(i, 0)
}

fn h_cbr(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    let cond = vm.eval_i64(&i.operands[0])?;
    vm.branch_to(i, if cond != 0 { 0 } else { 1 })
}

fn h_ret(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    let value = match i.operands.first() {
        Some(operand) => Some(vm.eval(operand)?),
        None => None,
    };
    Ok(Control::Return(value))
}

fn h_trap(_vm: &mut Vm<'_>, _i: &Instr) -> Result<Control, TrapInfo> {
    Err(TrapInfo::new(TrapKind::RuntimeError, "trap"))
}

// ---- exception handling ------------------------------------------------

fn h_eh_push(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    vm.do_eh_push(i)
}

fn h_eh_pop(vm: &mut Vm<'_>, _i: &Instr) -> Result<Control, TrapInfo> {
    vm.do_eh_pop()
}

fn h_eh_entry(_vm: &mut Vm<'_>, _i: &Instr) -> Result<Control, TrapInfo> {
    // Informational marker at the top of a handler block.
    Ok(Control::Next)
}

fn h_trap_from_err(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    let code = vm.eval_i64(&i.operands[0])?;
    Err(TrapInfo::from_code(code, ""))
}

fn h_trap_err(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    let code = vm.eval_i64(&i.operands[0])?;
    let message = match vm.eval(&i.operands[1])? {
        Slot::Str(s) => s.to_string_lossy(),
        _ => String::new(),
    };
    let err = ErrorValue {
        kind: map_err_to_trap(code) as i32,
        code: code as i32,
        ..ErrorValue::default()
    };
    let err = ErrorValue { message, ..err };
    vm.current_error = err.clone();
    vm.set_result(i, Slot::Error(err));
    Ok(Control::Next)
}

fn h_trap_kind(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    let kind = vm.current_trap.map(|k| k as i64).unwrap_or(-1);
    vm.set_result(i, Slot::I64(kind));
    Ok(Control::Next)
}

/// Project a field of an error operand; null observes the current-error
/// register instead of re-trapping.
fn err_project(
    vm: &mut Vm<'_>,
    i: &Instr,
    field: impl Fn(&ErrorValue) -> i64,
) -> Result<Control, TrapInfo> {
    let value = match vm.eval(&i.operands[0])? {
        Slot::Error(ref e) => field(e),
        Slot::Null => field(&vm.current_error),
        _ => {
            return Err(TrapInfo::new(
                TrapKind::InvalidOperation,
                "expected error value",
            ));
        }
    };
    vm.set_result(i, Slot::I64(value));
    Ok(Control::Next)
}

fn h_err_get_kind(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    err_project(vm, i, |e| e.kind as i64)
}

fn h_err_get_code(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    err_project(vm, i, |e| e.code as i64)
}

fn h_err_get_ip(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    err_project(vm, i, |e| e.ip)
}

fn h_err_get_line(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    err_project(vm, i, |e| e.line as i64)
}

fn h_resume_same(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    let tok = vm.take_resume_token(i)?;
    // Re-execute the faulting instruction; a second trap there bypasses the
    // handler that caught this one.
    vm.resume_barrier = Some(tok.eh_index);
    let frame = vm.frame_mut();
    frame.block = tok.block;
    frame.ip = tok.ip;
    Ok(Control::Jump)
}

fn h_resume_next(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    let tok = vm.take_resume_token(i)?;
    let frame = vm.frame_mut();
    frame.block = tok.block;
    frame.ip = tok.ip + 1;
    Ok(Control::Jump)
}

fn h_resume_label(vm: &mut Vm<'_>, i: &Instr) -> Result<Control, TrapInfo> {
    let _tok = vm.take_resume_token(i)?;
    vm.branch_to(i, 0)
}

// ---- backends ----------------------------------------------------------

/// Function-pointer table in opcode discriminant order.
pub(crate) static HANDLER_TABLE: [OpHandler; OPCODE_COUNT] = [
    h_add,
    h_sub,
    h_mul,
    h_sdiv,
    h_udiv,
    h_srem,
    h_urem,
    h_iadd_chk_ovf,
    h_isub_chk_ovf,
    h_imul_chk_ovf,
    h_sdiv_chk0,
    h_sdiv_chk_ovf,
    h_srem_chk0,
    h_and,
    h_or,
    h_xor,
    h_shl,
    h_lshr,
    h_ashr,
    h_fadd,
    h_fsub,
    h_fmul,
    h_fdiv,
    h_icmp_eq,
    h_icmp_ne,
    h_scmp_lt,
    h_scmp_le,
    h_scmp_gt,
    h_scmp_ge,
    h_ucmp_lt,
    h_ucmp_le,
    h_ucmp_gt,
    h_ucmp_ge,
    h_fcmp_eq,
    h_fcmp_ne,
    h_fcmp_lt,
    h_fcmp_le,
    h_fcmp_gt,
    h_fcmp_ge,
    h_sitofp,
    h_fptosi,
    h_zext1,
    h_trunc1,
    h_alloca,
    h_load,
    h_store,
    h_gep,
    h_addr_of,
    h_const_str,
    h_const_null,
    h_call,
    h_br,
    h_cbr,
    h_ret,
    h_trap,
    h_eh_push,
    h_eh_pop,
    h_eh_entry,
    h_trap_from_err,
    h_trap_err,
    h_trap_kind,
    h_err_get_kind,
    h_err_get_code,
    h_err_get_ip,
    h_err_get_line,
    h_resume_same,
    h_resume_next,
    h_resume_label,
];

/// Plain-match backend.
pub(crate) fn step_switch(vm: &mut Vm<'_>, instr: &Instr) -> Result<Control, TrapInfo> {
    match instr.op {
        Opcode::Add => h_add(vm, instr),
        Opcode::Sub => h_sub(vm, instr),
        Opcode::Mul => h_mul(vm, instr),
        Opcode::SDiv => h_sdiv(vm, instr),
        Opcode::UDiv => h_udiv(vm, instr),
        Opcode::SRem => h_srem(vm, instr),
        Opcode::URem => h_urem(vm, instr),
        Opcode::IAddChkOvf => h_iadd_chk_ovf(vm, instr),
        Opcode::ISubChkOvf => h_isub_chk_ovf(vm, instr),
        Opcode::IMulChkOvf => h_imul_chk_ovf(vm, instr),
        Opcode::SDivChk0 => h_sdiv_chk0(vm, instr),
        Opcode::SDivChkOvf => h_sdiv_chk_ovf(vm, instr),
        Opcode::SRemChk0 => h_srem_chk0(vm, instr),
        Opcode::And => h_and(vm, instr),
        Opcode::Or => h_or(vm, instr),
        Opcode::Xor => h_xor(vm, instr),
        Opcode::Shl => h_shl(vm, instr),
        Opcode::LShr => h_lshr(vm, instr),
        Opcode::AShr => h_ashr(vm, instr),
        Opcode::FAdd => h_fadd(vm, instr),
        Opcode::FSub => h_fsub(vm, instr),
        Opcode::FMul => h_fmul(vm, instr),
        Opcode::FDiv => h_fdiv(vm, instr),
        Opcode::ICmpEq => h_icmp_eq(vm, instr),
        Opcode::ICmpNe => h_icmp_ne(vm, instr),
        Opcode::SCmpLt => h_scmp_lt(vm, instr),
        Opcode::SCmpLe => h_scmp_le(vm, instr),
        Opcode::SCmpGt => h_scmp_gt(vm, instr),
        Opcode::SCmpGe => h_scmp_ge(vm, instr),
        Opcode::UCmpLt => h_ucmp_lt(vm, instr),
        Opcode::UCmpLe => h_ucmp_le(vm, instr),
        Opcode::UCmpGt => h_ucmp_gt(vm, instr),
        Opcode::UCmpGe => h_ucmp_ge(vm, instr),
        Opcode::FCmpEq => h_fcmp_eq(vm, instr),
        Opcode::FCmpNe => h_fcmp_ne(vm, instr),
        Opcode::FCmpLt => h_fcmp_lt(vm, instr),
        Opcode::FCmpLe => h_fcmp_le(vm, instr),
        Opcode::FCmpGt => h_fcmp_gt(vm, instr),
        Opcode::FCmpGe => h_fcmp_ge(vm, instr),
        Opcode::Sitofp => h_sitofp(vm, instr),
        Opcode::Fptosi => h_fptosi(vm, instr),
        Opcode::Zext1 => h_zext1(vm, instr),
        Opcode::Trunc1 => h_trunc1(vm, instr),
        Opcode::Alloca => h_alloca(vm, instr),
        Opcode::Load => h_load(vm, instr),
        Opcode::Store => h_store(vm, instr),
        Opcode::Gep => h_gep(vm, instr),
        Opcode::AddrOf => h_addr_of(vm, instr),
        Opcode::ConstStr => h_const_str(vm, instr),
        Opcode::ConstNull => h_const_null(vm, instr),
        Opcode::Call => h_call(vm, instr),
        Opcode::Br => h_br(vm, instr),
        Opcode::CBr => h_cbr(vm, instr),
        Opcode::Ret => h_ret(vm, instr),
        Opcode::Trap => h_trap(vm, instr),
        Opcode::EhPush => h_eh_push(vm, instr),
        Opcode::EhPop => h_eh_pop(vm, instr),
        Opcode::EhEntry => h_eh_entry(vm, instr),
        Opcode::TrapFromErr => h_trap_from_err(vm, instr),
        Opcode::TrapErr => h_trap_err(vm, instr),
        Opcode::TrapKind => h_trap_kind(vm, instr),
        Opcode::ErrGetKind => h_err_get_kind(vm, instr),
        Opcode::ErrGetCode => h_err_get_code(vm, instr),
        Opcode::ErrGetIp => h_err_get_ip(vm, instr),
        Opcode::ErrGetLine => h_err_get_line(vm, instr),
        Opcode::ResumeSame => h_resume_same(vm, instr),
        Opcode::ResumeNext => h_resume_next(vm, instr),
        Opcode::ResumeLabel => h_resume_label(vm, instr),
    }
}

impl<'m> Vm<'m> {
    /// Handler for the threaded backend: per-function streams pre-decoded
    /// on first entry, then indexed directly without touching the opcode.
    pub(crate) fn threaded_handler(&mut self, func: usize, block: usize, ip: usize) -> OpHandler {
        if self.threaded_code[func].is_none() {
            let decoded: Vec<Vec<OpHandler>> = self.module().functions[func]
                .blocks
                .iter()
                .map(|b| {
                    b.instructions
                        .iter()
                        .map(|i| HANDLER_TABLE[i.op as usize])
                        .collect()
                })
                .collect();
            self.threaded_code[func] = Some(decoded);
        }
        self.threaded_code[func].as_ref().expect("decoded above")[block][ip]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use viper_il::opcode::ALL_OPCODES;

    #[test]
    fn test_handler_table_covers_every_opcode() {
        assert_eq!(HANDLER_TABLE.len(), ALL_OPCODES.len());
    }

    #[test]
    fn test_truncate_to_width() {
        assert_eq!(truncate_to_width(Type::I16, 0x1_0001), 1);
        assert_eq!(truncate_to_width(Type::I32, -1), -1);
        assert_eq!(truncate_to_width(Type::I32, 0x1_0000_0000), 0);
        assert_eq!(truncate_to_width(Type::I64, i64::MIN), i64::MIN);
    }

    #[test]
    fn test_check_width() {
        assert!(check_width(Type::I16, Some(40_000)).is_err());
        assert_eq!(check_width(Type::I16, Some(40)).unwrap(), 40);
        assert!(check_width(Type::I64, None).is_err());
    }
}
