//! Compact ASCII state encoding (§4.A).
//!
//! Every state is one string starting with a two-character numeric tag and
//! `|`. Fields are pipe-separated; integers are base-10; floats use Rust's
//! shortest round-trippable `Display` form; timestamps are signed int64
//! nanoseconds since the epoch. Decoding rejects any string whose header
//! does not match the expected tag with a [`ParseError`], never silently
//! treating corrupt state as empty.

mod composite;
mod fixed_window;
mod gcra;
mod leaky_bucket;
mod token_bucket;

pub use composite::CompositeState;
pub use fixed_window::{FixedWindowEntry, FixedWindowState};
pub use gcra::GcraState;
pub use leaky_bucket::LeakyBucketState;
pub use token_bucket::TokenBucketState;

use crate::error::ParseError;
use std::cell::RefCell;

pub const TAG_TOKEN_BUCKET: &str = "12";
pub const TAG_LEAKY_BUCKET: &str = "34";
pub const TAG_GENERIC_V2: &str = "v2";
pub const TAG_FIXED_WINDOW: &str = "23";
pub const TAG_COMPOSITE: &str = "51";

thread_local! {
    static ENCODE_BUF: RefCell<String> = RefCell::new(String::with_capacity(128));
}

/// Run `f` against a cleared, reused thread-local string buffer and return a
/// fresh owned copy of whatever `f` wrote. Keeps the hot encode path from
/// allocating a growable buffer on every call.
pub(crate) fn with_encode_buf(f: impl FnOnce(&mut String)) -> String {
    ENCODE_BUF.with(|cell| {
        let mut buf = cell.borrow_mut();
        buf.clear();
        f(&mut buf);
        buf.clone()
    })
}

/// Splits `value` into its header tag and the rest, erroring if empty.
fn split_tag(value: &str) -> Result<(&str, &str), ParseError> {
    let mut parts = value.splitn(2, '|');
    let tag = parts
        .next()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ParseError::UnknownTag(value.to_string()))?;
    let rest = parts.next().unwrap_or("");
    Ok((tag, rest))
}

fn expect_tag<'a>(value: &'a str, expected: &str) -> Result<&'a str, ParseError> {
    let (tag, rest) = split_tag(value)?;
    if tag != expected {
        return Err(ParseError::UnknownTag(tag.to_string()));
    }
    Ok(rest)
}

fn malformed(tag: &str, detail: impl Into<String>) -> ParseError {
    ParseError::Malformed {
        tag: tag.to_string(),
        detail: detail.into(),
    }
}

fn parse_i64(tag: &str, field: &str) -> Result<i64, ParseError> {
    field
        .parse::<i64>()
        .map_err(|e| malformed(tag, format!("bad int64 {field:?}: {e}")))
}

fn parse_u64(tag: &str, field: &str) -> Result<u64, ParseError> {
    field
        .parse::<u64>()
        .map_err(|e| malformed(tag, format!("bad uint64 {field:?}: {e}")))
}

fn parse_f64(tag: &str, field: &str) -> Result<f64, ParseError> {
    field
        .parse::<f64>()
        .map_err(|e| malformed(tag, format!("bad float {field:?}: {e}")))
}
