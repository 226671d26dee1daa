//! Bounded lock-free single-producer / single-consumer queue.
//!
//! The same ring runs either in process-private memory ([`channel`]) or in a
//! `MAP_SHARED` file mapping ([`shared`], [`Producer::attach`],
//! [`Consumer::attach`]) so that two processes can exchange `Pod` values and
//! a restarted process can resume from the cursors left in the file. A
//! mapped file accepts one producer and one consumer at a time; a second
//! attach for a role that is already held fails with [`Error::RoleTaken`].
//!
//! ```
//! let (mut tx, mut rx) = mmap_spsc::channel::<u64>(4)?;
//! tx.push(1).unwrap();
//! tx.push(2).unwrap();
//! assert_eq!(rx.pop(), Some(1));
//! assert_eq!(rx.pop(), Some(2));
//! assert_eq!(rx.pop(), None);
//! # Ok::<(), mmap_spsc::Error>(())
//! ```
//!
//! `push` and `pop` never block; a full or empty queue is reported through
//! their return values and any waiting policy belongs to the caller.

pub mod config;
mod error;
pub mod spsc;

pub use config::{Mode, QueueConfig};
pub use error::{Error, Result};
pub use spsc::{channel, shared, Consumer, Full, Producer, RegionKind, Role};
