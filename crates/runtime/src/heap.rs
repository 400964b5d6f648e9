//! Process-wide heap registry.
//!
//! Bounded table mapping live object addresses to metadata, used by memory
//! watchpoints and the cycle-aware reclamation pass. All mutations go
//! through one global lock; registration past the bound fails the caller's
//! allocation instead of corrupting state. Initialized lazily on first use
//! and torn down explicitly so finalizers get a chance to run.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

/// Default upper bound on simultaneously live registered objects.
pub const DEFAULT_HEAP_CAPACITY: usize = 1 << 20;

/// Metadata recorded per registered object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapEntry {
    pub class_id: u32,
    pub payload_size: usize,
}

struct HeapRegistry {
    entries: HashMap<usize, HeapEntry>,
    capacity: usize,
}

static HEAP: OnceLock<Mutex<HeapRegistry>> = OnceLock::new();

fn heap() -> &'static Mutex<HeapRegistry> {
    HEAP.get_or_init(|| {
        Mutex::new(HeapRegistry {
            entries: HashMap::new(),
            capacity: DEFAULT_HEAP_CAPACITY,
        })
    })
}

/// Register a live object. Fails when the registry is at capacity.
pub fn register(addr: usize, entry: HeapEntry) -> Result<(), ()> {
    let mut reg = heap().lock().expect("heap registry poisoned");
    if reg.entries.len() >= reg.capacity && !reg.entries.contains_key(&addr) {
        tracing::warn!(addr, capacity = reg.capacity, "heap registry at capacity");
        return Err(());
    }
    reg.entries.insert(addr, entry);
    Ok(())
}

/// Remove an object, returning its metadata when it was registered.
pub fn unregister(addr: usize) -> Option<HeapEntry> {
    heap().lock().expect("heap registry poisoned").entries.remove(&addr)
}

/// Metadata for a registered object.
pub fn lookup(addr: usize) -> Option<HeapEntry> {
    heap()
        .lock()
        .expect("heap registry poisoned")
        .entries
        .get(&addr)
        .copied()
}

/// Snapshot of every live object, for the cycle pass and memory watches.
pub fn live_objects() -> Vec<(usize, HeapEntry)> {
    let mut objects: Vec<(usize, HeapEntry)> = heap()
        .lock()
        .expect("heap registry poisoned")
        .entries
        .iter()
        .map(|(&addr, &entry)| (addr, entry))
        .collect();
    objects.sort_by_key(|&(addr, _)| addr);
    objects
}

/// Number of currently registered objects.
pub fn live_count() -> usize {
    heap().lock().expect("heap registry poisoned").entries.len()
}

/// Configured registry bound.
pub fn heap_capacity() -> usize {
    heap().lock().expect("heap registry poisoned").capacity
}

/// Override the bound (tests exercise the failure path with small caps).
pub fn set_heap_capacity(capacity: usize) {
    heap().lock().expect("heap registry poisoned").capacity = capacity;
}

/// Tear down the registry, finalizing and freeing every outstanding object.
///
/// Intended for process exit: gives finalizers a chance to run even when a
/// program leaked references. The lock is released before finalizers run so
/// they may allocate or release other objects.
pub fn heap_teardown() {
    let entries: Vec<(usize, HeapEntry)> = {
        let mut reg = heap().lock().expect("heap registry poisoned");
        reg.entries.drain().collect()
    };
    for (addr, entry) in entries {
        // Safety: addresses in the registry were produced by rt_obj_new_i64
        // and have not been freed (release removes them first).
        unsafe {
            crate::object::finalize_and_free(addr as *mut u8, entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn reset() {
        let mut reg = heap().lock().unwrap();
        reg.entries.clear();
        reg.capacity = DEFAULT_HEAP_CAPACITY;
    }

    #[test]
    #[serial]
    fn test_register_lookup_unregister() {
        reset();
        let entry = HeapEntry {
            class_id: 3,
            payload_size: 24,
        };
        assert!(register(0x1000, entry).is_ok());
        assert_eq!(lookup(0x1000), Some(entry));
        assert_eq!(live_count(), 1);
        assert_eq!(unregister(0x1000), Some(entry));
        assert_eq!(lookup(0x1000), None);
    }

    #[test]
    #[serial]
    fn test_capacity_bound_fails_registration() {
        reset();
        set_heap_capacity(2);
        let entry = HeapEntry {
            class_id: 1,
            payload_size: 8,
        };
        assert!(register(0x10, entry).is_ok());
        assert!(register(0x20, entry).is_ok());
        assert!(register(0x30, entry).is_err());
        // Re-registering a known address is not growth.
        assert!(register(0x20, entry).is_ok());
        reset();
    }

    #[test]
    #[serial]
    fn test_live_objects_sorted() {
        reset();
        let entry = HeapEntry {
            class_id: 1,
            payload_size: 8,
        };
        register(0x300, entry).unwrap();
        register(0x100, entry).unwrap();
        register(0x200, entry).unwrap();
        let addrs: Vec<usize> = live_objects().iter().map(|&(a, _)| a).collect();
        assert_eq!(addrs, vec![0x100, 0x200, 0x300]);
        reset();
    }
}
