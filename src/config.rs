use std::{fs, path::{Path, PathBuf}};

use bytemuck::Pod;
use serde::{Deserialize, Serialize};

use crate::{
   error::{Error, Result},
   spsc::{self, Consumer, Producer},
};

/// How a queue is provisioned.
///
/// ```toml
/// capacity = 4096
///
/// [mode]
/// kind = "shared"
/// path = "/dev/shm/orders.q"
/// reset = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
   /// Usable slots, fixed for the lifetime of the queue.
   pub capacity: usize,
   #[serde(default)]
   pub mode: Mode,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Mode {
   #[default]
   Private,
   Shared {
      path: PathBuf,
      /// Empty the cursors on open instead of resuming.
      #[serde(default)]
      reset: bool,
   },
}

impl QueueConfig {
   pub fn private(capacity: usize) -> Self {
      Self {
         capacity,
         mode: Mode::Private,
      }
   }

   pub fn shared(capacity: usize, path: impl Into<PathBuf>, reset: bool) -> Self {
      Self {
         capacity,
         mode: Mode::Shared {
            path: path.into(),
            reset,
         },
      }
   }

   pub fn from_toml_str(s: &str) -> Result<Self> {
      Ok(toml::from_str(s)?)
   }

   pub fn load(path: impl AsRef<Path>) -> Result<Self> {
      let path = path.as_ref();
      let text = fs::read_to_string(path).map_err(|source| Error::ConfigIo {
         path: path.to_path_buf(),
         source,
      })?;
      Self::from_toml_str(&text)
   }

   /// Build both ends of the configured queue.
   ///
   /// `T: Pod` is required for either mode so one config can switch between
   /// them. A private queue of non-`Pod` elements comes from
   /// [`spsc::channel`] with `self.capacity`.
   pub fn open<T: Pod + Send>(&self) -> Result<(Producer<T>, Consumer<T>)> {
      match &self.mode {
         Mode::Private => spsc::channel(self.capacity),
         Mode::Shared { path, reset } => spsc::shared(path, self.capacity, *reset),
      }
   }

   /// Producer end only; requires a shared queue.
   pub fn open_producer<T: Pod + Send>(&self) -> Result<Producer<T>> {
      let (path, reset) = self.shared_target()?;
      Producer::attach(path, self.capacity, reset)
   }

   /// Consumer end only; requires a shared queue.
   pub fn open_consumer<T: Pod + Send>(&self) -> Result<Consumer<T>> {
      let (path, reset) = self.shared_target()?;
      Consumer::attach(path, self.capacity, reset)
   }

   fn shared_target(&self) -> Result<(&Path, bool)> {
      match &self.mode {
         Mode::Shared { path, reset } => Ok((path.as_path(), *reset)),
         Mode::Private => Err(Error::SingleRolePrivate),
      }
   }
}
