use std::fmt;

use time::{
    OffsetDateTime, UtcOffset, format_description::BorrowedFormatItem, macros::format_description,
};

/// `YYYY-MM-DD HH:MM:SS,mmm`.
const TIMESTAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second],[subsecond digits:3]");

/// Writes `at`, shifted to `offset`, in the record timestamp layout.
///
/// Falls back to a placeholder if formatting fails.
pub(crate) fn write_timestamp<W: fmt::Write>(
    w: &mut W,
    at: OffsetDateTime,
    offset: UtcOffset,
) -> fmt::Result {
    match at.to_offset(offset).format(TIMESTAMP) {
        Ok(ts) => w.write_str(&ts),
        Err(_) => w.write_str("<invalid-time>"),
    }
}
