//! Heap Tracking
//!
//! A global allocator wrapper that keeps a live-bytes counter. Install it in
//! the benchmark binary to get per-iteration memory figures:
//!
//! ```ignore
//! #[global_allocator]
//! static GLOBAL: pacebench::TrackingAllocator = pacebench::TrackingAllocator;
//! ```

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

static LIVE_BYTES: AtomicI64 = AtomicI64::new(0);
static INSTALLED: AtomicBool = AtomicBool::new(false);

/// System allocator with live-heap accounting
pub struct TrackingAllocator;

// SAFETY: every call is forwarded to `System`; only counters are added.
unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        LIVE_BYTES.fetch_sub(layout.size() as i64, Ordering::Relaxed);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            LIVE_BYTES.fetch_add(new_size as i64 - layout.size() as i64, Ordering::Relaxed);
        }
        new_ptr
    }
}

#[inline]
fn record_alloc(size: usize) {
    LIVE_BYTES.fetch_add(size as i64, Ordering::Relaxed);
    INSTALLED.store(true, Ordering::Relaxed);
}

/// Bytes currently allocated through [`TrackingAllocator`]
pub fn heap_in_use() -> u64 {
    LIVE_BYTES.load(Ordering::Relaxed).max(0) as u64
}

/// `true` once [`TrackingAllocator`] has served an allocation, i.e. it is
/// the process's global allocator
pub fn is_tracking() -> bool {
    INSTALLED.load(Ordering::Relaxed)
}

/// Source of heap snapshots taken around each measured iteration
pub trait MemoryProbe {
    /// Bytes of heap currently in use
    fn heap_in_use(&self) -> u64;
}

/// Reads [`TrackingAllocator`]'s counter; always zero when another
/// allocator is installed, which yields no memory samples
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapProbe;

impl MemoryProbe for HeapProbe {
    #[inline]
    fn heap_in_use(&self) -> u64 {
        heap_in_use()
    }
}
