// SPDX-License-Identifier: CEPL-1.0
//! Growable sequence whose storage comes from a [`HostAllocator`].
//!
//! Used for every variable-length result handed between bootstrap stages:
//! extension names, enumeration results, swapchain images and views.

use std::alloc::Layout;
use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};

use crate::alloc::{AllocError, AllocatorRef};

const MIN_GROWTH: usize = 8;

pub struct List<T> {
    ptr: NonNull<T>,
    len: usize,
    cap: usize,
    alloc: AllocatorRef,
}

impl<T> List<T> {
    pub fn new(alloc: AllocatorRef) -> Self {
        let cap = if mem::size_of::<T>() == 0 { usize::MAX } else { 0 };
        Self {
            ptr: NonNull::dangling(),
            len: 0,
            cap,
            alloc,
        }
    }

    pub fn with_capacity(alloc: AllocatorRef, cap: usize) -> Result<Self, AllocError> {
        let mut list = Self::new(alloc);
        list.reserve_exact(cap)?;
        Ok(list)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn allocator(&self) -> &AllocatorRef {
        &self.alloc
    }

    pub fn push(&mut self, value: T) -> Result<(), AllocError> {
        if self.len == self.cap {
            let grown = self.cap.saturating_mul(2).max(MIN_GROWTH);
            self.reallocate(grown)?;
        }
        // SAFETY: len < cap after the growth above.
        unsafe { self.ptr.as_ptr().add(self.len).write(value) };
        self.len += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        // SAFETY: the slot at the old last index was initialized.
        Some(unsafe { self.ptr.as_ptr().add(self.len).read() })
    }

    /// Ensures room for at least `additional` more elements without further
    /// reallocation.
    pub fn reserve_exact(&mut self, additional: usize) -> Result<(), AllocError> {
        let needed = self
            .len
            .checked_add(additional)
            .ok_or(AllocError::CapacityOverflow(usize::MAX))?;
        if needed > self.cap {
            self.reallocate(needed)?;
        }
        Ok(())
    }

    /// Drops elements past `len`.
    pub fn truncate(&mut self, len: usize) {
        while self.len > len {
            drop(self.pop());
        }
    }

    pub fn clear(&mut self) {
        self.truncate(0);
    }

    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// # Safety
    /// `new_len` must not exceed the capacity, and every element in
    /// `old_len..new_len` must have been initialized through [`List::as_mut_ptr`].
    pub unsafe fn set_len(&mut self, new_len: usize) {
        debug_assert!(new_len <= self.cap);
        self.len = new_len;
    }

    pub fn from_slice(alloc: AllocatorRef, items: &[T]) -> Result<Self, AllocError>
    where
        T: Clone,
    {
        let mut list = Self::with_capacity(alloc, items.len())?;
        for item in items {
            list.push(item.clone())?;
        }
        Ok(list)
    }

    /// Builds a list of `f(item)` for each element, in a fresh block from the
    /// same allocator, sized exactly to `len`.
    pub fn map_to<U>(&self, f: impl FnMut(&T) -> U) -> Result<List<U>, AllocError> {
        let mut out = List::with_capacity(self.alloc.clone(), self.len)?;
        for v in self.iter().map(f) {
            out.push(v)?;
        }
        Ok(out)
    }

    fn reallocate(&mut self, new_cap: usize) -> Result<(), AllocError> {
        if mem::size_of::<T>() == 0 {
            return Ok(());
        }
        let new_layout =
            Layout::array::<T>(new_cap).map_err(|_| AllocError::CapacityOverflow(new_cap))?;
        let block = self
            .alloc
            .allocate(new_layout)
            .ok_or(AllocError::OutOfMemory {
                size: new_layout.size(),
                align: new_layout.align(),
            })?
            .cast::<T>();

        // SAFETY: both regions are valid for `len` elements and do not overlap.
        unsafe { ptr::copy_nonoverlapping(self.ptr.as_ptr(), block.as_ptr(), self.len) };
        self.release_block();

        self.ptr = block;
        self.cap = new_cap;
        Ok(())
    }

    fn release_block(&mut self) {
        if mem::size_of::<T>() == 0 || self.cap == 0 {
            return;
        }
        if let Ok(layout) = Layout::array::<T>(self.cap) {
            // SAFETY: the block was allocated from `alloc` with exactly this layout.
            unsafe { self.alloc.release(self.ptr.cast(), layout) };
        }
        self.ptr = NonNull::dangling();
        self.cap = 0;
    }
}

impl<T> Drop for List<T> {
    fn drop(&mut self) {
        // SAFETY: the first `len` elements are initialized and owned by us.
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.ptr.as_ptr(), self.len));
        }
        self.len = 0;
        self.release_block();
    }
}

impl<T> Deref for List<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        // SAFETY: ptr is non-null and aligned, and `len` elements are initialized.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<T> DerefMut for List<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        // SAFETY: as in `deref`, with unique access through &mut self.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<'a, T> IntoIterator for &'a List<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: fmt::Debug> fmt::Debug for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
