//! File-backed page storage.
//!
//! The [`PageManager`] owns every open file under the data directory and
//! performs fixed-size page I/O with positional reads and writes (no shared
//! seek cursor, so concurrent callers never interleave). Reads past the end
//! of a file zero-fill and succeed; an all-zero page reads as
//! "uninitialized" to the layers above.

mod error;
mod pager;

pub use error::StorageError;
pub use pager::{PageManager, PagerStats};

/// Default page size in bytes. The actual size is configurable per data
/// directory (1024-65536) and carried by the [`PageManager`].
pub const DEFAULT_PAGE_SIZE: usize = 8192;
