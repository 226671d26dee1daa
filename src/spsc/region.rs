// Backing-store provisioning.
//
// Both strategies hand back the same byte layout,
//
//   [ header: 2 x CACHE_LINE ][ slot 0 ][ slot 1 ] ... [ slot N ]
//
// so the ring core never needs to know where its memory came from. All raw
// allocation and mapping lives in this file.
//
// A mapped file admits one producer and one consumer at a time. Each role is
// an exclusive open-file-description lock on one byte of its cursor line,
// held until the mapping is dropped. OFD locks conflict between two opens of
// the same file inside one process too, and a forked child shares its
// parent's locks.

use std::{
   alloc::{self, Layout},
   fmt,
   fs::{File, OpenOptions},
   io,
   mem::{self, align_of},
   num::NonZeroUsize,
   os::fd::AsRawFd,
   path::{Path, PathBuf},
   ptr::NonNull,
};

use nix::{
   errno::Errno,
   sys::mman::{self, MapFlags, MsFlags, ProtFlags},
};

use super::cursor::{CACHE_LINE, HEADER_SIZE};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
   /// Process-private heap allocation.
   Heap,
   /// `MAP_SHARED` mapping of a file.
   Mapped,
}

/// Which side of a mapped queue a handle owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
   Producer,
   Consumer,
   /// Both ends in one process, as handed out by `shared`.
   Both,
}

impl Role {
   // Lock byte of each side: the first byte of its cursor line.
   fn offsets(self) -> &'static [usize] {
      match self {
         Role::Producer => &[0],
         Role::Consumer => &[CACHE_LINE],
         Role::Both => &[0, CACHE_LINE],
      }
   }

   fn peer(self) -> Option<Role> {
      match self {
         Role::Producer => Some(Role::Consumer),
         Role::Consumer => Some(Role::Producer),
         Role::Both => None,
      }
   }
}

impl fmt::Display for Role {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(match self {
         Role::Producer => "producer",
         Role::Consumer => "consumer",
         Role::Both => "producer/consumer",
      })
   }
}

/// A contiguous, cache-line aligned block holding one ring.
pub trait Region: Send + Sync {
   fn base(&self) -> NonNull<u8>;
   fn len(&self) -> usize;
   fn kind(&self) -> RegionKind;

   /// Push dirty pages to the backing store, if there is one.
   fn flush(&self) -> Result<()> {
      Ok(())
   }
}

/// Exact number of bytes a ring of `capacity` usable slots occupies.
pub fn required_len<T>(capacity: usize) -> Result<usize> {
   if capacity == 0 {
      return Err(Error::ZeroCapacity);
   }
   if align_of::<T>() > CACHE_LINE {
      return Err(Error::Alignment {
         align: align_of::<T>(),
         line: CACHE_LINE,
      });
   }
   let overflow = || Error::CapacityOverflow { capacity };
   let ring_len = capacity.checked_add(1).ok_or_else(overflow)?;
   let slots = Layout::array::<T>(ring_len).map_err(|_| overflow())?;
   let total = HEADER_SIZE.checked_add(slots.size()).ok_or_else(overflow)?;
   // Rejects totals above isize::MAX.
   Layout::from_size_align(total, CACHE_LINE).map_err(|_| overflow())?;
   Ok(total)
}

/*──────────────────────────────────────────────────────────────────────────*/
/*  Private heap region                                                     */
/*──────────────────────────────────────────────────────────────────────────*/

#[derive(Debug)]
pub struct HeapRegion {
   ptr: NonNull<u8>,
   layout: Layout,
}

unsafe impl Send for HeapRegion {}
unsafe impl Sync for HeapRegion {}

impl HeapRegion {
   pub fn new(len: usize) -> Result<Self> {
      let layout = Layout::from_size_align(len.max(HEADER_SIZE), CACHE_LINE)
         .map_err(|_| Error::CapacityOverflow { capacity: len })?;
      // SAFETY: layout size is at least HEADER_SIZE, never zero.
      let raw = unsafe { alloc::alloc(layout) };
      let ptr = NonNull::new(raw).unwrap_or_else(|| alloc::handle_alloc_error(layout));
      Ok(Self { ptr, layout })
   }
}

impl Region for HeapRegion {
   fn base(&self) -> NonNull<u8> {
      self.ptr
   }

   fn len(&self) -> usize {
      self.layout.size()
   }

   fn kind(&self) -> RegionKind {
      RegionKind::Heap
   }
}

impl Drop for HeapRegion {
   fn drop(&mut self) {
      unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) };
   }
}

/*──────────────────────────────────────────────────────────────────────────*/
/*  File-backed shared mapping                                              */
/*──────────────────────────────────────────────────────────────────────────*/

#[derive(Debug)]
pub struct MmapRegion {
   ptr: NonNull<u8>,
   len: usize,
   path: PathBuf,
   // Carries the role locks; closed on drop, which releases them.
   file: File,
   // Peer role locked for the duration of a reset.
   peer: Option<Role>,
}

unsafe impl Send for MmapRegion {}
unsafe impl Sync for MmapRegion {}

impl MmapRegion {
   /// Map the first `len` bytes of the file at `path`.
   ///
   /// With `create` the file is created when missing and grown to `len`
   /// when shorter. Without it a short file is a configuration error.
   ///
   /// The lock for `role` is taken before anything is touched. `create` also
   /// locks the peer role, so a reset never runs under a live handle; call
   /// [`release_peer`](Self::release_peer) once the header is rewritten.
   pub fn open(path: &Path, len: usize, create: bool, role: Role) -> Result<Self> {
      let path = path.to_path_buf();
      let file = OpenOptions::new()
         .read(true)
         .write(true)
         .create(create)
         .truncate(false)
         .open(&path)
         .map_err(|source| Error::Open {
            path: path.clone(),
            source,
         })?;

      lock_role(&file, &path, role)?;
      let peer = match role.peer() {
         Some(peer) if create => {
            lock_role(&file, &path, peer)?;
            Some(peer)
         }
         _ => None,
      };

      let actual = file
         .metadata()
         .map_err(|source| Error::Open {
            path: path.clone(),
            source,
         })?
         .len();

      if actual < len as u64 {
         if !create {
            return Err(Error::FileTooSmall {
               path,
               actual,
               required: len,
            });
         }
         tracing::warn!(
            path = %path.display(),
            from = actual,
            to = len,
            "growing queue backing file"
         );
         let new_len = libc::off_t::try_from(len).map_err(|_| Error::Resize {
            path: path.clone(),
            source: Errno::EFBIG,
         })?;
         nix::unistd::ftruncate(&file, new_len).map_err(|source| Error::Resize {
            path: path.clone(),
            source,
         })?;
      }

      let map_len = NonZeroUsize::new(len).ok_or(Error::ZeroCapacity)?;
      // SAFETY: the file is open read/write and at least `len` bytes long.
      let ptr = unsafe {
         mman::mmap(
            None,
            map_len,
            ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
            MapFlags::MAP_SHARED,
            &file,
            0,
         )
      }
      .map_err(|source| Error::Map {
         path: path.clone(),
         source,
      })?;

      Ok(Self {
         ptr: ptr.cast(),
         len,
         path,
         file,
         peer,
      })
   }

   /// Drop the peer lock taken for a reset. No-op otherwise.
   pub fn release_peer(&mut self) -> Result<()> {
      if let Some(peer) = self.peer.take() {
         for &offset in peer.offsets() {
            set_lock(&self.file, offset, libc::F_UNLCK as libc::c_short).map_err(|source| {
               Error::Lock {
                  path: self.path.clone(),
                  source,
               }
            })?;
         }
      }
      Ok(())
   }
}

fn lock_role(file: &File, path: &Path, role: Role) -> Result<()> {
   for &offset in role.offsets() {
      match set_lock(file, offset, libc::F_WRLCK as libc::c_short) {
         Ok(()) => {}
         Err(err) if matches!(err.raw_os_error(), Some(libc::EAGAIN | libc::EACCES)) => {
            tracing::warn!(path = %path.display(), %role, "queue role already attached");
            return Err(Error::RoleTaken {
               path: path.to_path_buf(),
               role,
            });
         }
         Err(source) => {
            return Err(Error::Lock {
               path: path.to_path_buf(),
               source,
            })
         }
      }
   }
   Ok(())
}

fn set_lock(file: &File, offset: usize, kind: libc::c_short) -> io::Result<()> {
   // SAFETY: `flock` is plain data; every field the kernel reads is set below.
   let mut lock: libc::flock = unsafe { mem::zeroed() };
   lock.l_type = kind;
   lock.l_whence = libc::SEEK_SET as libc::c_short;
   lock.l_start = offset as libc::off_t;
   lock.l_len = 1;
   // Non-blocking; `l_pid` must stay 0 for OFD locks.
   if unsafe { libc::fcntl(file.as_raw_fd(), libc::F_OFD_SETLK, &lock as *const libc::flock) } == -1 {
      return Err(io::Error::last_os_error());
   }
   Ok(())
}

impl Region for MmapRegion {
   fn base(&self) -> NonNull<u8> {
      self.ptr
   }

   fn len(&self) -> usize {
      self.len
   }

   fn kind(&self) -> RegionKind {
      RegionKind::Mapped
   }

   fn flush(&self) -> Result<()> {
      unsafe { mman::msync(self.ptr.cast(), self.len, MsFlags::MS_SYNC) }.map_err(Error::Sync)
   }
}

impl Drop for MmapRegion {
   fn drop(&mut self) {
      tracing::info!(path = %self.path.display(), "closing mapped queue");
      if let Err(err) = unsafe { mman::munmap(self.ptr.cast(), self.len) } {
         tracing::error!(path = %self.path.display(), %err, "munmap failed");
      }
   }
}
