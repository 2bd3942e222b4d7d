mod byte_cursor;
pub(crate) mod bytes;
mod time;

pub use self::byte_cursor::ByteCursor;
pub use self::time::{format_ticks, ticks_to_seconds, TICKS_PER_SECOND};
