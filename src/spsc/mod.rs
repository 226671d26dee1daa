mod cursor;
mod handle;
mod region;
mod ring;
mod slots;

pub use cursor::{CACHE_LINE, HEADER_SIZE};
pub use handle::{channel, shared, Consumer, Full, Producer};
pub use region::{required_len, RegionKind, Role};
