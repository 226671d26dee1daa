// Role-typed handles.
//
// A ring is only ever touched through one `Producer` and one `Consumer`.
// Neither handle is `Clone` and every mutating call takes `&mut self`. For a
// mapped file the roles are also locked in the file itself, so a second
// `attach` for a held role fails with `Error::RoleTaken`, whether it comes
// from this process or another one.

use std::{fmt, path::Path, sync::Arc};

use bytemuck::Pod;

use super::{
   region::{RegionKind, Role},
   ring::Ring,
};
use crate::error::Result;

/// Returned by [`Producer::push`] when the queue has no free slot.
#[derive(Debug, PartialEq, Eq)]
pub struct Full<T>(pub T);

impl<T> Full<T> {
   pub fn into_inner(self) -> T {
      self.0
   }
}

impl<T> fmt::Display for Full<T> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str("queue is full")
   }
}

impl<T: fmt::Debug> std::error::Error for Full<T> {}

pub struct Producer<T> {
   ring: Arc<Ring<T>>,
}

pub struct Consumer<T> {
   ring: Arc<Ring<T>>,
}

/// Create an in-process queue holding up to `capacity` elements.
pub fn channel<T>(capacity: usize) -> Result<(Producer<T>, Consumer<T>)> {
   let ring = Arc::new(Ring::private(capacity)?);
   Ok(split(ring))
}

/// Map the queue file at `path` and take both roles in this process.
///
/// Useful when producer and consumer are threads of one process that still
/// want the queue state to outlive it. Both role locks are held until the
/// two handles are dropped.
pub fn shared<T: Pod + Send>(
   path: impl AsRef<Path>,
   capacity: usize,
   reset: bool,
) -> Result<(Producer<T>, Consumer<T>)> {
   let ring = Arc::new(Ring::mapped(path.as_ref(), capacity, reset, Role::Both)?);
   Ok(split(ring))
}

fn split<T>(ring: Arc<Ring<T>>) -> (Producer<T>, Consumer<T>) {
   (
      Producer { ring: ring.clone() },
      Consumer { ring },
   )
}

/*───────────────────────────────  producer  ──────────────────────────────*/

impl<T: Pod + Send> Producer<T> {
   /// Map the queue file at `path` as its producer.
   ///
   /// Fails with `Error::RoleTaken` while another producer is attached, or
   /// with `reset` while any consumer is.
   pub fn attach(path: impl AsRef<Path>, capacity: usize, reset: bool) -> Result<Self> {
      let ring = Ring::mapped(path.as_ref(), capacity, reset, Role::Producer)?;
      Ok(Self { ring: Arc::new(ring) })
   }
}

impl<T> Producer<T> {
   /// Enqueue `value`, or give it back if the queue is full. Never blocks.
   #[inline]
   pub fn push(&mut self, value: T) -> Result<(), Full<T>> {
      // SAFETY: `&mut self` on the only producer handle.
      unsafe { self.ring.write(value) }.map_err(Full)
   }

   /// True when at least one more `push` would succeed right now.
   #[inline]
   pub fn write_available(&self) -> bool {
      self.ring.write_available()
   }

   #[inline]
   pub fn size_guess(&self) -> usize {
      self.ring.size_guess()
   }

   #[inline]
   pub fn capacity(&self) -> usize {
      self.ring.capacity()
   }

   pub fn kind(&self) -> RegionKind {
      self.ring.kind()
   }

   /// Sync a mapped queue to its file. No-op for in-process queues.
   pub fn flush(&self) -> Result<()> {
      self.ring.flush()
   }
}

/*───────────────────────────────  consumer  ──────────────────────────────*/

impl<T: Pod + Send> Consumer<T> {
   /// Map the queue file at `path` as its consumer.
   ///
   /// Attaching with `reset == false` resumes from the cursors left by the
   /// previous run. Role rules mirror [`Producer::attach`].
   pub fn attach(path: impl AsRef<Path>, capacity: usize, reset: bool) -> Result<Self> {
      let ring = Ring::mapped(path.as_ref(), capacity, reset, Role::Consumer)?;
      Ok(Self { ring: Arc::new(ring) })
   }
}

impl<T> Consumer<T> {
   /// Dequeue the oldest element, `None` when empty. Never blocks.
   #[inline]
   pub fn pop(&mut self) -> Option<T> {
      // SAFETY: `&mut self` on the only consumer handle.
      unsafe { self.ring.read() }
   }

   /// Pop until the queue looks empty.
   pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
      std::iter::from_fn(move || self.pop())
   }

   #[inline]
   pub fn is_empty(&self) -> bool {
      self.ring.is_empty()
   }

   #[inline]
   pub fn read_available(&self) -> bool {
      self.ring.read_available()
   }

   #[inline]
   pub fn size_guess(&self) -> usize {
      self.ring.size_guess()
   }

   #[inline]
   pub fn capacity(&self) -> usize {
      self.ring.capacity()
   }

   pub fn kind(&self) -> RegionKind {
      self.ring.kind()
   }

   /// Current `(write, read)` cursor values.
   pub fn cursors(&self) -> (usize, usize) {
      self.ring.cursors()
   }
}

impl<T> fmt::Debug for Producer<T> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("Producer").field("ring", &*self.ring).finish()
   }
}

impl<T> fmt::Debug for Consumer<T> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("Consumer").field("ring", &*self.ring).finish()
   }
}
