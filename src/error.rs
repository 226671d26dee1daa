use std::io;
use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

use crate::spsc::Role;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Setup failures. These surface while a queue is being created or attached
/// and are never produced by `push`/`pop`.
#[derive(Debug, Error)]
pub enum Error {
   #[error("queue capacity must be at least 1")]
   ZeroCapacity,

   #[error("queue of capacity {capacity} does not fit in the address space")]
   CapacityOverflow { capacity: usize },

   #[error("element alignment {align} exceeds the cache line size {line}")]
   Alignment { align: usize, line: usize },

   #[error("failed to open backing file {}", path.display())]
   Open {
      path: PathBuf,
      #[source]
      source: io::Error,
   },

   #[error(
      "backing file {} is {actual} bytes, queue needs at least {required} bytes",
      path.display()
   )]
   FileTooSmall {
      path: PathBuf,
      actual: u64,
      required: usize,
   },

   #[error("{role} role of {} is already attached", path.display())]
   RoleTaken { path: PathBuf, role: Role },

   #[error("failed to lock backing file {}", path.display())]
   Lock {
      path: PathBuf,
      #[source]
      source: io::Error,
   },

   #[error("failed to resize backing file {}", path.display())]
   Resize {
      path: PathBuf,
      #[source]
      source: Errno,
   },

   #[error("failed to map backing file {}", path.display())]
   Map {
      path: PathBuf,
      #[source]
      source: Errno,
   },

   #[error("failed to sync mapped queue to disk")]
   Sync(#[source] Errno),

   #[error("cursor header is corrupt (write={write}, read={read}, ring length {ring_len})")]
   CorruptHeader {
      write: usize,
      read: usize,
      ring_len: usize,
   },

   #[error("a private queue cannot be opened for a single role")]
   SingleRolePrivate,

   #[error("failed to read config file {}", path.display())]
   ConfigIo {
      path: PathBuf,
      #[source]
      source: io::Error,
   },

   #[error("invalid queue config: {0}")]
   Config(#[from] toml::de::Error),
}
