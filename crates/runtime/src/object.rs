//! Refcounted heap objects.
//!
//! Every runtime object starts with a 16-byte header (class id, atomic
//! refcount, optional finalizer) followed by a zero-initialized payload
//! whose layout is defined by the owning class. The core treats objects as
//! opaque pointers; only the header contract is fixed. Objects register in
//! the heap registry at birth and unregister when freed, so the registry's
//! capacity bound also bounds object allocation.

use crate::heap::{self, HeapEntry};
use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering, fence};

/// Finalizer invoked exactly once when an object's refcount reaches zero.
pub type Finalizer = extern "C" fn(obj: *mut u8);

/// Header prefixed to every runtime heap object.
///
/// # Safety Invariants
/// - `refs` starts at 1 and the object is freed exactly when it hits 0.
/// - `finalizer` is either 0 or a valid `Finalizer` pointer.
/// - The payload follows the header, `size_of::<RtObjHeader>()` bytes in.
#[repr(C)]
pub struct RtObjHeader {
    pub class_id: u32,
    refs: AtomicU32,
    finalizer: AtomicUsize,
}

const _: () = assert!(size_of::<RtObjHeader>() == 16);

fn obj_layout(payload_size: usize) -> Option<Layout> {
    Layout::new::<RtObjHeader>()
        .extend(Layout::from_size_align(payload_size, 8).ok()?)
        .ok()
        .map(|(layout, _)| layout.pad_to_align())
}

/// Allocate a zero-initialized object (C ABI).
///
/// Returns null when the payload size is invalid, allocation fails, or the
/// heap registry is at capacity; callers surface that as a runtime error.
#[unsafe(no_mangle)]
pub extern "C" fn rt_obj_new_i64(class_id: i64, payload_size: i64) -> *mut u8 {
    if payload_size < 0 || class_id < 0 || class_id > u32::MAX as i64 {
        return std::ptr::null_mut();
    }
    let Some(layout) = obj_layout(payload_size as usize) else {
        return std::ptr::null_mut();
    };
    // Safety: layout has non-zero size (header) and alignment 8.
    let raw = unsafe { alloc_zeroed(layout) };
    if raw.is_null() {
        return std::ptr::null_mut();
    }
    // Safety: raw points at a fresh allocation large enough for the header.
    unsafe {
        let header = raw as *mut RtObjHeader;
        (*header).class_id = class_id as u32;
        (*header).refs = AtomicU32::new(1);
        (*header).finalizer = AtomicUsize::new(0);
    }
    let entry = HeapEntry {
        class_id: class_id as u32,
        payload_size: payload_size as usize,
    };
    if heap::register(raw as usize, entry).is_err() {
        // Safety: raw was just allocated with this layout and never escaped.
        unsafe { dealloc(raw, layout) };
        return std::ptr::null_mut();
    }
    raw
}

/// Pointer to the object's payload area (C ABI).
///
/// # Safety
/// `obj` must be a live object produced by `rt_obj_new_i64`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_obj_payload(obj: *mut u8) -> *mut u8 {
    if obj.is_null() {
        return std::ptr::null_mut();
    }
    unsafe { obj.add(size_of::<RtObjHeader>()) }
}

/// Store a finalizer to run when the object is freed (C ABI).
///
/// # Safety
/// `obj` must be a live object produced by `rt_obj_new_i64`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_obj_set_finalizer(obj: *mut u8, finalizer: Option<Finalizer>) {
    if obj.is_null() {
        return;
    }
    let raw = finalizer.map(|f| f as usize).unwrap_or(0);
    unsafe {
        (*(obj as *mut RtObjHeader)).finalizer.store(raw, Ordering::Release);
    }
}

/// Increment the refcount (C ABI).
///
/// # Safety
/// `obj` must be a live object produced by `rt_obj_new_i64`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_obj_retain(obj: *mut u8) {
    if obj.is_null() {
        return;
    }
    unsafe {
        (*(obj as *mut RtObjHeader)).refs.fetch_add(1, Ordering::Relaxed);
    }
}

/// Run the finalizer (if any) and free the allocation.
///
/// # Safety
/// `obj` must point at an object allocated by `rt_obj_new_i64` with the
/// payload size recorded in `entry`, and must not be used afterwards.
pub(crate) unsafe fn finalize_and_free(obj: *mut u8, entry: HeapEntry) {
    unsafe {
        let header = obj as *mut RtObjHeader;
        let fin = (*header).finalizer.swap(0, Ordering::AcqRel);
        if fin != 0 {
            let finalizer: Finalizer = std::mem::transmute(fin);
            finalizer(obj);
        }
        let layout = obj_layout(entry.payload_size).expect("layout validated at allocation");
        dealloc(obj, layout);
    }
}

/// Decrement the refcount; at zero, finalize, unregister, and free (C ABI).
///
/// # Safety
/// `obj` must be a live object produced by `rt_obj_new_i64`; the caller
/// gives up its reference.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_obj_release(obj: *mut u8) {
    if obj.is_null() {
        return;
    }
    unsafe {
        let header = obj as *mut RtObjHeader;
        if (*header).refs.fetch_sub(1, Ordering::Release) == 1 {
            fence(Ordering::Acquire);
            let Some(entry) = heap::unregister(obj as usize) else {
                tracing::warn!(addr = obj as usize, "release of unregistered object");
                return;
            };
            finalize_and_free(obj, entry);
        }
    }
}

/// Release asserting the caller holds the last reference (C ABI).
///
/// Returns 1 when the assertion held. A violation is reported to stderr and
/// the reference is still released.
///
/// # Safety
/// Same contract as `rt_obj_release`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_obj_release_check0(obj: *mut u8) -> i64 {
    if obj.is_null() {
        return 0;
    }
    let refs = unsafe { (*(obj as *const RtObjHeader)).refs.load(Ordering::Relaxed) };
    let ok = refs == 1;
    if !ok {
        eprintln!(
            "rt_obj_release_check0: object {:p} has {} references, expected 1",
            obj, refs
        );
    }
    unsafe { rt_obj_release(obj) };
    ok as i64
}

/// Class id stored in the object header (C ABI).
///
/// # Safety
/// `obj` must be a live object produced by `rt_obj_new_i64`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_obj_class_id(obj: *const u8) -> i64 {
    if obj.is_null() {
        return -1;
    }
    unsafe { (*(obj as *const RtObjHeader)).class_id as i64 }
}

/// Current refcount, for tests and diagnostics (C ABI).
///
/// # Safety
/// `obj` must be a live object produced by `rt_obj_new_i64`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_obj_refcount(obj: *const u8) -> i64 {
    if obj.is_null() {
        return 0;
    }
    unsafe { (*(obj as *const RtObjHeader)).refs.load(Ordering::Relaxed) as i64 }
}
