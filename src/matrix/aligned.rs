//! Heap buffers aligned for the widest register.

use std::alloc::{self, Layout};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};

/// Alignment of every [`AlignedVec`], enough for a 512-bit load.
pub const ALIGN: usize = 64;

/// Fixed-length, 64-byte aligned buffer.
///
/// The multiply kernels use aligned loads and panic on misaligned A or B.
/// `Vec<T>` only guarantees `align_of::<T>()`, so prepared matrices live in
/// one of these.
pub struct AlignedVec<T: Copy + Default> {
    ptr: NonNull<T>,
    len: usize,
}

// Owns its elements like a Vec<T>.
unsafe impl<T: Copy + Default + Send> Send for AlignedVec<T> {}
unsafe impl<T: Copy + Default + Sync> Sync for AlignedVec<T> {}

impl<T: Copy + Default> AlignedVec<T> {
    /// `len` elements set to `T::default()`.
    pub fn new(len: usize) -> Self {
        let layout = Self::layout(len);
        if layout.size() == 0 {
            // Nothing to allocate, but the pointer must still look aligned.
            let ptr = ptr::without_provenance_mut::<T>(ALIGN);
            return AlignedVec {
                ptr: NonNull::new(ptr).unwrap_or(NonNull::dangling()),
                len,
            };
        }

        let raw = unsafe { alloc::alloc(layout) } as *mut T;
        let Some(ptr) = NonNull::new(raw) else {
            alloc::handle_alloc_error(layout);
        };
        for i in 0..len {
            unsafe { ptr.as_ptr().add(i).write(T::default()) };
        }
        AlignedVec { ptr, len }
    }

    pub fn from_slice(data: &[T]) -> Self {
        let mut v = Self::new(data.len());
        v.copy_from_slice(data);
        v
    }

    fn layout(len: usize) -> Layout {
        let size = len
            .checked_mul(size_of::<T>())
            .unwrap_or_else(|| panic!("AlignedVec: {} elements overflow usize", len));
        match Layout::from_size_align(size, ALIGN.max(align_of::<T>())) {
            Ok(layout) => layout,
            Err(e) => panic!("AlignedVec: bad layout for {} bytes: {}", size, e),
        }
    }
}

impl<T: Copy + Default> Drop for AlignedVec<T> {
    fn drop(&mut self) {
        let layout = Self::layout(self.len);
        if layout.size() > 0 {
            unsafe { alloc::dealloc(self.ptr.as_ptr() as *mut u8, layout) };
        }
    }
}

impl<T: Copy + Default> Deref for AlignedVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<T: Copy + Default> DerefMut for AlignedVec<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<T: Copy + Default> Clone for AlignedVec<T> {
    fn clone(&self) -> Self {
        Self::from_slice(self)
    }
}

impl<T: Copy + Default + fmt::Debug> fmt::Debug for AlignedVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: Copy + Default + PartialEq> PartialEq for AlignedVec<T> {
    fn eq(&self, other: &Self) -> bool {
        **self == **other
    }
}
