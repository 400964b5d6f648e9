//! Small-buffer string builder.
//!
//! Centralises the grow-append logic used by formatting and numeric
//! conversion helpers. Errors surface as an explicit status code rather
//! than a trap so callers can turn them into precise diagnostics.

/// Inline storage reserved in each builder before spilling to the heap.
pub const SB_INLINE_CAPACITY: usize = 128;

/// Status codes returned by builder operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SbStatus {
    /// Operation completed successfully.
    Ok,
    /// Memory allocation failed.
    Alloc,
    /// Size computation overflowed the platform limit.
    Overflow,
    /// Caller supplied invalid arguments.
    Invalid,
    /// Formatting helper reported an error.
    Format,
}

enum Storage {
    Inline { data: [u8; SB_INLINE_CAPACITY], len: usize },
    Heap(Vec<u8>),
}

/// Mutable byte builder with inline fast path and geometric growth.
pub struct StringBuilder {
    storage: Storage,
}

impl StringBuilder {
    pub fn new() -> Self {
        StringBuilder {
            storage: Storage::Inline {
                data: [0; SB_INLINE_CAPACITY],
                len: 0,
            },
        }
    }

    pub fn len(&self) -> usize {
        match &self.storage {
            Storage::Inline { len, .. } => *len,
            Storage::Heap(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match &self.storage {
            Storage::Inline { data, len } => &data[..*len],
            Storage::Heap(v) => v,
        }
    }

    /// Ensure capacity for `required` total bytes.
    pub fn reserve(&mut self, required: usize) -> SbStatus {
        if required > isize::MAX as usize {
            return SbStatus::Overflow;
        }
        match &mut self.storage {
            Storage::Inline { data, len } => {
                if required <= SB_INLINE_CAPACITY {
                    return SbStatus::Ok;
                }
                // Spill: geometric growth from the requested size.
                let cap = required
                    .checked_next_power_of_two()
                    .unwrap_or(required)
                    .max(SB_INLINE_CAPACITY * 2);
                let mut v = Vec::new();
                if v.try_reserve(cap).is_err() {
                    return SbStatus::Alloc;
                }
                v.extend_from_slice(&data[..*len]);
                self.storage = Storage::Heap(v);
                SbStatus::Ok
            }
            Storage::Heap(v) => {
                if required <= v.capacity() {
                    return SbStatus::Ok;
                }
                let grow = required.max(v.capacity().saturating_mul(2));
                match v.try_reserve(grow - v.len()) {
                    Ok(()) => SbStatus::Ok,
                    Err(_) => SbStatus::Alloc,
                }
            }
        }
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) -> SbStatus {
        let Some(required) = self.len().checked_add(bytes.len()) else {
            return SbStatus::Overflow;
        };
        let status = self.reserve(required);
        if status != SbStatus::Ok {
            return status;
        }
        match &mut self.storage {
            Storage::Inline { data, len } => {
                data[*len..*len + bytes.len()].copy_from_slice(bytes);
                *len += bytes.len();
            }
            Storage::Heap(v) => v.extend_from_slice(bytes),
        }
        SbStatus::Ok
    }

    pub fn append_str(&mut self, s: &str) -> SbStatus {
        self.append_bytes(s.as_bytes())
    }

    /// Append the decimal rendering of `value`.
    ///
    /// Holds for all of `i64`: parsing the appended bytes yields `value`.
    pub fn append_int(&mut self, value: i64) -> SbStatus {
        let mut buf = [0u8; 20]; // fits -9223372036854775808
        let mut pos = buf.len();
        let negative = value < 0;
        let mut mag = value.unsigned_abs();
        loop {
            pos -= 1;
            buf[pos] = b'0' + (mag % 10) as u8;
            mag /= 10;
            if mag == 0 {
                break;
            }
        }
        if negative {
            pos -= 1;
            buf[pos] = b'-';
        }
        self.append_bytes(&buf[pos..])
    }

    /// Append the default rendering of `value` (shortest round-trip form).
    pub fn append_double(&mut self, value: f64) -> SbStatus {
        if value.is_nan() || value.is_infinite() {
            return SbStatus::Invalid;
        }
        self.append_str(&value.to_string())
    }

    /// Consume the builder, returning its bytes as a `String` when valid
    /// UTF-8, else `Err(SbStatus::Format)`.
    pub fn into_string(self) -> Result<String, SbStatus> {
        let bytes = match self.storage {
            Storage::Inline { data, len } => data[..len].to_vec(),
            Storage::Heap(v) => v,
        };
        String::from_utf8(bytes).map_err(|_| SbStatus::Format)
    }

    pub fn clear(&mut self) {
        match &mut self.storage {
            Storage::Inline { len, .. } => *len = 0,
            Storage::Heap(v) => v.clear(),
        }
    }
}

impl Default for StringBuilder {
    fn default() -> Self {
        Self::new()
    }
}
