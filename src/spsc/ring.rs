// Bounded single-producer / single-consumer ring.
//
// The ring holds `capacity + 1` slots. One slot is always left empty so that
// `read == write` means empty and `next(write) == read` means full, without a
// shared element counter.
//
//   producer:  read(Acquire)  write(Relaxed)  construct  write <- next (Release)
//   consumer:  write(Acquire) read(Relaxed)   move out   read  <- next (Release)
//
// Each side owns exactly one cursor. The Release store on its own cursor
// publishes the slot work done just before it; the Acquire load of the other
// side's cursor pairs with that store.

use std::{
   fmt,
   mem::needs_drop,
   path::Path,
   ptr::NonNull,
   sync::atomic::Ordering,
};

use bytemuck::Pod;

use super::{
   cursor::{Header, HEADER_SIZE},
   region::{required_len, HeapRegion, MmapRegion, Region, RegionKind, Role},
   slots::Slots,
};
use crate::error::{Error, Result};

pub struct Ring<T> {
   header: NonNull<Header>,
   slots: Slots<T>,
   capacity: usize,
   // Dropped after the ring's own `Drop` has drained live slots.
   region: Box<dyn Region>,
}

unsafe impl<T: Send> Send for Ring<T> {}
unsafe impl<T: Send> Sync for Ring<T> {}

/*────────────────────────────  construction  ─────────────────────────────*/

impl<T> Ring<T> {
   /// Ring in process-private memory, always starting empty.
   pub fn private(capacity: usize) -> Result<Self> {
      let len = required_len::<T>(capacity)?;
      let region = HeapRegion::new(len)?;
      tracing::debug!(capacity, bytes = len, "allocated private ring");
      // SAFETY: freshly allocated, sized by `required_len`, not shared yet.
      unsafe { Self::from_region(Box::new(region), capacity, true) }
   }

   /// # Safety
   /// `region` must be at least `required_len::<T>(capacity)` bytes. With
   /// `reset == false` it must already hold a ring of the same element type
   /// and capacity; with `reset == true` no other handle may be using it.
   unsafe fn from_region(region: Box<dyn Region>, capacity: usize, reset: bool) -> Result<Self> {
      debug_assert!(required_len::<T>(capacity).is_ok_and(|len| region.len() >= len));

      let base = region.base();
      let ring_len = capacity + 1;
      let header = if reset {
         Header::reset(base)
      } else {
         let header = Header::attach(base);
         let write = header.as_ref().write.load(Ordering::Acquire);
         let read = header.as_ref().read.load(Ordering::Acquire);
         if write >= ring_len || read >= ring_len {
            return Err(Error::CorruptHeader {
               write,
               read,
               ring_len,
            });
         }
         header
      };
      let slot_base = NonNull::new_unchecked(base.as_ptr().add(HEADER_SIZE));

      Ok(Self {
         header,
         slots: Slots::from_raw(slot_base, ring_len),
         capacity,
         region,
      })
   }
}

impl<T: Pod> Ring<T> {
   /// Ring stored in a `MAP_SHARED` mapping of the file at `path`, held as
   /// `role`.
   ///
   /// `reset` creates/grows the file and empties the cursors; otherwise the
   /// cursors are taken as found so a restarted process resumes where the
   /// previous one stopped. Slot bytes are never cleared.
   pub fn mapped(path: &Path, capacity: usize, reset: bool, role: Role) -> Result<Self> {
      let len = required_len::<T>(capacity)?;
      let mut region = MmapRegion::open(path, len, reset, role)?;
      if reset {
         // SAFETY: both role locks are held, nobody else uses the header.
         unsafe { Header::reset(region.base()) };
         region.release_peer()?;
      }
      // SAFETY: mapping is `len` bytes; `T: Pod` accepts whatever bytes a
      // previous run left behind.
      let ring = unsafe { Self::from_region(Box::new(region), capacity, false)? };
      tracing::info!(
         path = %path.display(),
         capacity,
         reset,
         %role,
         live = ring.size_guess(),
         "mapped shared queue"
      );
      Ok(ring)
   }
}

/*─────────────────────────────  operations  ──────────────────────────────*/

impl<T> Ring<T> {
   #[inline]
   fn header(&self) -> &Header {
      unsafe { self.header.as_ref() }
   }

   #[inline]
   fn ring_len(&self) -> usize {
      self.slots.len()
   }

   #[inline]
   fn next(&self, index: usize) -> usize {
      let n = index + 1;
      if n == self.ring_len() {
         0
      } else {
         n
      }
   }

   /// Hand `value` back when the ring is full.
   ///
   /// # Safety
   /// Only one thread/process may act as producer for this ring.
   #[inline]
   pub unsafe fn write(&self, value: T) -> Result<(), T> {
      let h = self.header();
      let read = h.read.load(Ordering::Acquire);
      let write = h.write.load(Ordering::Relaxed);
      let next = self.next(write);

      if next == read {
         return Err(value);
      }

      self.slots.construct_at(write, value);
      h.write.store(next, Ordering::Release);
      Ok(())
   }

   /// # Safety
   /// Only one thread/process may act as consumer for this ring.
   #[inline]
   pub unsafe fn read(&self) -> Option<T> {
      let h = self.header();
      let write = h.write.load(Ordering::Acquire);
      let read = h.read.load(Ordering::Relaxed);

      if read == write {
         return None;
      }

      let value = self.slots.move_out(read);
      h.read.store(self.next(read), Ordering::Release);
      Some(value)
   }

   /*  observers: estimates while the other side is running  */

   #[inline]
   pub fn is_empty(&self) -> bool {
      let h = self.header();
      h.write.load(Ordering::Acquire) == h.read.load(Ordering::Acquire)
   }

   #[inline]
   pub fn write_available(&self) -> bool {
      let h = self.header();
      let write = h.write.load(Ordering::Acquire);
      let read = h.read.load(Ordering::Acquire);
      self.next(write) != read
   }

   #[inline]
   pub fn read_available(&self) -> bool {
      !self.is_empty()
   }

   /// Estimated number of queued elements, never above `capacity`.
   ///
   /// On the consumer side at least this many `pop`s will succeed; on the
   /// producer side at most this many elements are still queued. Any other
   /// observer gets a value that may already be stale.
   #[inline]
   pub fn size_guess(&self) -> usize {
      let h = self.header();
      // `read` first, so a consumer moving between the loads cannot pass the
      // sampled `write`.
      let read = h.read.load(Ordering::Acquire);
      let write = h.write.load(Ordering::Acquire);
      let size = if write >= read {
         write - read
      } else {
         write + self.ring_len() - read
      };
      size.min(self.capacity)
   }

   #[inline]
   pub fn capacity(&self) -> usize {
      self.capacity
   }

   pub fn kind(&self) -> RegionKind {
      self.region.kind()
   }

   pub fn flush(&self) -> Result<()> {
      self.region.flush()
   }

   pub(crate) fn cursors(&self) -> (usize, usize) {
      let h = self.header();
      (h.write.load(Ordering::Acquire), h.read.load(Ordering::Acquire))
   }
}

impl<T> Drop for Ring<T> {
   fn drop(&mut self) {
      // Mapped rings keep their contents for the next process to attach.
      if self.region.kind() == RegionKind::Mapped || !needs_drop::<T>() {
         return;
      }

      let h = self.header();
      let write = h.write.load(Ordering::Acquire);
      let mut read = h.read.load(Ordering::Acquire);
      let mut drained = 0usize;
      while read != write {
         unsafe { self.slots.destroy_at(read) };
         read = self.next(read);
         drained += 1;
      }
      h.read.store(read, Ordering::Release);
      if drained > 0 {
         tracing::debug!(drained, "dropped live elements with ring");
      }
   }
}

impl<T> fmt::Debug for Ring<T> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      let (write, read) = self.cursors();
      f.debug_struct("Ring")
         .field("capacity", &self.capacity)
         .field("write", &write)
         .field("read", &read)
         .field("kind", &self.kind())
         .finish()
   }
}
