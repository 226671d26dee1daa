// Slot storage: a flat run of `MaybeUninit<T>` cells following the header.
//
// A slot carries no tag of its own. Whether it holds a live element is decided
// entirely by the cursor range `[read, write)`, which is what lets the mapped
// layout store the raw element bytes and nothing else.

use std::{mem::MaybeUninit, ptr::NonNull};

pub struct Slots<T> {
   base: NonNull<MaybeUninit<T>>,
   len: usize,
}

impl<T> Slots<T> {
   /// # Safety
   /// `base` must be valid for reads and writes of `len` elements of `T` and
   /// suitably aligned for `T` for as long as the returned value is used.
   pub unsafe fn from_raw(base: NonNull<u8>, len: usize) -> Self {
      Self {
         base: base.cast(),
         len,
      }
   }

   #[inline]
   pub fn len(&self) -> usize {
      self.len
   }

   #[inline]
   fn cell(&self, index: usize) -> *mut MaybeUninit<T> {
      debug_assert!(index < self.len, "slot {index} out of {}", self.len);
      unsafe { self.base.as_ptr().add(index) }
   }

   /// Place `value` into slot `index`.
   ///
   /// # Safety
   /// The slot must be uninitialized and only the producer may call this.
   #[inline]
   pub unsafe fn construct_at(&self, index: usize, value: T) {
      (*self.cell(index)).write(value);
   }

   /// Run the destructor of the element in slot `index`.
   ///
   /// # Safety
   /// The slot must hold a live element and only the consumer (or the last
   /// owner during teardown) may call this.
   #[inline]
   pub unsafe fn destroy_at(&self, index: usize) {
      (*self.cell(index)).assume_init_drop();
   }

   /// Move the element out of slot `index`, leaving the slot uninitialized.
   ///
   /// # Safety
   /// Same as [`Slots::destroy_at`].
   #[inline]
   pub unsafe fn move_out(&self, index: usize) -> T {
      (*self.cell(index)).assume_init_read()
   }
}
