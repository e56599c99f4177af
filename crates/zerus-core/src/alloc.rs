// SPDX-License-Identifier: CEPL-1.0
//! Host memory capability used by every bootstrap stage.
//!
//! The bootstrap core never reaches for the global heap itself; it is handed
//! an [`AllocatorRef`] and routes all of its scratch and bookkeeping storage
//! through it. Swap in [`ArenaAllocator`] for a bump arena or wrap anything
//! in [`TrackingAllocator`] to audit leaks.

use std::alloc::Layout;
use std::cell::Cell;
use std::fmt;
use std::ptr::NonNull;
use std::rc::Rc;

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    #[error("host allocator could not provide {size} bytes (align {align})")]
    OutOfMemory { size: usize, align: usize },
    #[error("capacity of {0} elements overflows the address space")]
    CapacityOverflow(usize),
}

/// Allocate/release capability.
///
/// Layouts passed in always have a nonzero size.
pub trait HostAllocator {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// # Safety
    /// `ptr` must have been returned by [`HostAllocator::allocate`] on this
    /// allocator with the same `layout`, and must not be released twice.
    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout);
}

/// Shared, single-threaded handle to an allocator.
pub type AllocatorRef = Rc<dyn HostAllocator>;

/// Global heap.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemAllocator;

impl HostAllocator for SystemAllocator {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        if layout.size() == 0 {
            return None;
        }
        // SAFETY: layout has a nonzero size.
        NonNull::new(unsafe { std::alloc::alloc(layout) })
    }

    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: caller guarantees ptr came from `allocate` with this layout.
        unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

/// Bump arena. Releases are no-ops; memory comes back when the arena drops.
#[derive(Default)]
pub struct ArenaAllocator {
    bump: bumpalo::Bump,
}

impl ArenaAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bump: bumpalo::Bump::with_capacity(bytes),
        }
    }

    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }
}

impl fmt::Debug for ArenaAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaAllocator")
            .field("allocated_bytes", &self.allocated_bytes())
            .finish()
    }
}

impl HostAllocator for ArenaAllocator {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        self.bump.try_alloc_layout(layout).ok()
    }

    unsafe fn release(&self, _ptr: NonNull<u8>, _layout: Layout) {}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocStats {
    pub live_blocks: usize,
    pub live_bytes: usize,
    pub total_blocks: usize,
    pub peak_bytes: usize,
}

/// Counts live blocks and bytes on top of another allocator.
#[derive(Debug, Default)]
pub struct TrackingAllocator<A> {
    inner: A,
    stats: Cell<AllocStats>,
}

impl<A: HostAllocator> TrackingAllocator<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            stats: Cell::new(AllocStats::default()),
        }
    }

    pub fn stats(&self) -> AllocStats {
        self.stats.get()
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }
}

impl<A: HostAllocator> HostAllocator for TrackingAllocator<A> {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        let ptr = self.inner.allocate(layout)?;
        let mut s = self.stats.get();
        s.live_blocks += 1;
        s.total_blocks += 1;
        s.live_bytes += layout.size();
        s.peak_bytes = s.peak_bytes.max(s.live_bytes);
        self.stats.set(s);
        Some(ptr)
    }

    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout) {
        let mut s = self.stats.get();
        s.live_blocks = s.live_blocks.saturating_sub(1);
        s.live_bytes = s.live_bytes.saturating_sub(layout.size());
        self.stats.set(s);
        // SAFETY: forwarded caller contract.
        unsafe { self.inner.release(ptr, layout) }
    }
}
