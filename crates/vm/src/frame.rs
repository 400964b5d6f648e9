//! Call frames and value slots.

use crate::eh::ResumeTok;
use crate::trap::{ErrorValue, TrapInfo, TrapKind};
use viper_runtime::RtStr;
use viper_support::Arena;

/// Per-temp storage cell, wide enough for any scalar IL type.
///
/// String slots own one reference to their handle: cloning retains,
/// dropping releases. Everything else is plain data.
#[derive(Debug, Default, PartialEq)]
pub enum Slot {
    /// Uninitialized slot or pointer-family null.
    #[default]
    Null,
    I64(i64),
    F64(f64),
    Ptr(usize),
    Str(RtStr),
    Error(ErrorValue),
    Tok(ResumeTok),
}

impl Slot {
    pub fn as_i64(&self) -> Result<i64, TrapInfo> {
        match self {
            Slot::I64(v) => Ok(*v),
            Slot::Null => Ok(0),
            other => Err(TrapInfo::new(
                TrapKind::InvalidOperation,
                format!("expected integer slot, found {:?}", other),
            )),
        }
    }

    pub fn as_f64(&self) -> Result<f64, TrapInfo> {
        match self {
            Slot::F64(v) => Ok(*v),
            other => Err(TrapInfo::new(
                TrapKind::InvalidOperation,
                format!("expected float slot, found {:?}", other),
            )),
        }
    }

    pub fn as_ptr(&self) -> Result<usize, TrapInfo> {
        match self {
            Slot::Ptr(p) => Ok(*p),
            Slot::Null => Ok(0),
            other => Err(TrapInfo::new(
                TrapKind::InvalidOperation,
                format!("expected pointer slot, found {:?}", other),
            )),
        }
    }
}

impl Clone for Slot {
    fn clone(&self) -> Self {
        match self {
            Slot::Null => Slot::Null,
            Slot::I64(v) => Slot::I64(*v),
            Slot::F64(v) => Slot::F64(*v),
            Slot::Ptr(p) => Slot::Ptr(*p),
            Slot::Str(s) => {
                // A slot copy is a new owned reference.
                s.retain();
                Slot::Str(*s)
            }
            Slot::Error(e) => Slot::Error(e.clone()),
            Slot::Tok(t) => Slot::Tok(*t),
        }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if let Slot::Str(s) = self {
            s.release();
        }
    }
}

/// Byte capacity of the `alloca` arena per frame.
///
/// Arena allocations never move, so pointers handed out by `alloca` stay
/// stable for the frame's lifetime.
pub const FRAME_MEM_CAPACITY: usize = 64 * 1024;

/// One active call.
#[derive(Debug)]
pub struct Frame {
    /// Index of the function in the module.
    pub func: usize,
    /// Current block index within the function.
    pub block: usize,
    /// Instruction index within the current block.
    pub ip: usize,
    /// Densely indexed temp storage.
    pub slots: Vec<Slot>,
    /// Caller temp that receives this frame's return value.
    pub ret_to: Option<u32>,
    /// Backing storage for `alloca`; created on first use and reclaimed at
    /// frame teardown.
    mem: Option<Arena>,
}

impl Frame {
    pub fn new(func: usize, slot_count: usize, ret_to: Option<u32>) -> Self {
        let mut slots = Vec::with_capacity(slot_count);
        slots.resize_with(slot_count, Slot::default);
        Frame {
            func,
            block: 0,
            ip: 0,
            slots,
            ret_to,
            mem: None,
        }
    }

    /// Allocate `bytes` zeroed bytes of frame-local storage.
    ///
    /// Results are 8-byte aligned and stay valid until the frame is torn
    /// down. Fails with `RuntimeError` once the frame's capacity is spent.
    pub fn alloca(&mut self, bytes: usize) -> Result<usize, TrapInfo> {
        let arena = self
            .mem
            .get_or_insert_with(|| Arena::new(FRAME_MEM_CAPACITY));
        let Some(p) = arena.alloc(bytes, 8) else {
            return Err(TrapInfo::new(
                TrapKind::RuntimeError,
                format!("alloca exhausted frame storage ({} bytes)", FRAME_MEM_CAPACITY),
            ));
        };
        // Safety: p points at `bytes` writable bytes owned by this frame's
        // arena; alloca hands out zeroed storage.
        unsafe { std::ptr::write_bytes(p.as_ptr(), 0, bytes) };
        Ok(p.as_ptr() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_defaults_null() {
        let frame = Frame::new(0, 3, None);
        assert!(frame.slots.iter().all(|s| matches!(s, Slot::Null)));
    }

    #[test]
    fn test_alloca_zeroed_and_aligned() {
        let mut frame = Frame::new(0, 0, None);
        let a = frame.alloca(10).unwrap();
        let b = frame.alloca(8).unwrap();
        assert_eq!(a % 8, 0);
        assert_eq!(b % 8, 0);
        // Distinct allocations never overlap.
        assert!(a + 10 <= b || b + 8 <= a);
        // Safety: addresses point into the frame's live arena.
        unsafe {
            for i in 0..10 {
                assert_eq!(*((a + i) as *const u8), 0);
            }
        }
    }

    #[test]
    fn test_alloca_pointers_stay_stable() {
        let mut frame = Frame::new(0, 0, None);
        let first = frame.alloca(16).unwrap();
        // Safety: first points into frame storage.
        unsafe { *(first as *mut u64) = 0xdead_beef };
        for _ in 0..100 {
            frame.alloca(64).unwrap();
        }
        unsafe {
            assert_eq!(*(first as *const u64), 0xdead_beef);
        }
    }

    #[test]
    fn test_alloca_capacity_exhaustion_traps() {
        let mut frame = Frame::new(0, 0, None);
        let trap = frame.alloca(FRAME_MEM_CAPACITY + 1).unwrap_err();
        assert_eq!(trap.kind, TrapKind::RuntimeError);
    }

    #[test]
    fn test_str_slot_refcounting() {
        let s = RtStr::from_bytes(b"a heap string for slot refcount checks");
        assert_eq!(s.refcount(), 1);
        let slot = Slot::Str(s);
        let copy = slot.clone();
        assert_eq!(s.refcount(), 2);
        drop(copy);
        assert_eq!(s.refcount(), 1);
        drop(slot);
    }
}
