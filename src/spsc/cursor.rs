// Cursor pair: the two indices that make up the first 128 bytes of every ring.
//
//   [0, 64)    write index   (producer-owned)
//   [64, 128)  read index    (consumer-owned)
//
// Each cursor sits alone in its own cache line so the producer storing
// `write` never invalidates the line the consumer polls, and vice versa.
// `crossbeam::utils::CachePadded` is not used here: it pads to 128 bytes on
// x86_64, and the on-disk layout is fixed at 64.

use std::{
   mem::{align_of, offset_of, size_of},
   ptr::{self, NonNull},
   sync::atomic::{AtomicUsize, Ordering},
};

pub const CACHE_LINE: usize = 64;
pub const HEADER_SIZE: usize = 2 * CACHE_LINE;

#[repr(C, align(64))]
pub struct CursorLine {
   index: AtomicUsize,
}

impl CursorLine {
   #[inline]
   pub fn load(&self, order: Ordering) -> usize {
      self.index.load(order)
   }

   #[inline]
   pub fn store(&self, value: usize, order: Ordering) {
      self.index.store(value, order)
   }
}

#[repr(C)]
pub struct Header {
   pub write: CursorLine,
   pub read: CursorLine,
}

const _: () = {
   assert!(size_of::<CursorLine>() == CACHE_LINE);
   assert!(align_of::<CursorLine>() == CACHE_LINE);
   assert!(size_of::<Header>() == HEADER_SIZE);
   assert!(offset_of!(Header, write) == 0);
   assert!(offset_of!(Header, read) == CACHE_LINE);
};

impl Header {
   /// Zero both cache lines, padding included, leaving an empty ring.
   ///
   /// # Safety
   /// `base` must point to at least `HEADER_SIZE` writable bytes aligned to
   /// `CACHE_LINE`, and no other handle may be using the ring.
   pub unsafe fn reset(base: NonNull<u8>) -> NonNull<Header> {
      ptr::write_bytes(base.as_ptr(), 0, HEADER_SIZE);
      let header = base.cast::<Header>();
      header.as_ref().write.store(0, Ordering::Relaxed);
      header.as_ref().read.store(0, Ordering::Relaxed);
      header
   }

   /// Reinterpret an already-initialized header in place.
   ///
   /// # Safety
   /// Same requirements as [`Header::reset`], minus exclusivity.
   pub unsafe fn attach(base: NonNull<u8>) -> NonNull<Header> {
      debug_assert_eq!(base.as_ptr() as usize % CACHE_LINE, 0);
      base.cast::<Header>()
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn reset_zeroes_padding() {
      #[repr(C, align(64))]
      struct Raw([u8; HEADER_SIZE]);

      let mut raw = Raw([0xAB; HEADER_SIZE]);
      let base = NonNull::new(raw.0.as_mut_ptr()).unwrap();
      let header = unsafe { Header::reset(base) };

      let h = unsafe { header.as_ref() };
      assert_eq!(h.write.load(Ordering::Relaxed), 0);
      assert_eq!(h.read.load(Ordering::Relaxed), 0);
      assert!(raw.0.iter().all(|b| *b == 0));
   }

   #[test]
   fn cursors_land_on_separate_lines() {
      #[repr(C, align(64))]
      struct Raw([u8; HEADER_SIZE]);

      let mut raw = Raw([0; HEADER_SIZE]);
      let base = NonNull::new(raw.0.as_mut_ptr()).unwrap();
      let header = unsafe { Header::reset(base) };
      unsafe {
         header.as_ref().write.store(7, Ordering::Relaxed);
         header.as_ref().read.store(3, Ordering::Relaxed);
      }

      let word = size_of::<usize>();
      assert_eq!(raw.0[..word], 7usize.to_ne_bytes());
      assert_eq!(raw.0[CACHE_LINE..CACHE_LINE + word], 3usize.to_ne_bytes());
      assert!(raw.0[word..CACHE_LINE].iter().all(|b| *b == 0));
   }
}
