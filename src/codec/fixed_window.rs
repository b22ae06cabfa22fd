use super::{expect_tag, parse_i64, parse_u64, with_encode_buf, TAG_FIXED_WINDOW};
use crate::error::ParseError;
use std::fmt::Write as _;

/// One quota's slice of the combined Fixed-Window state.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedWindowEntry {
    pub name: String,
    pub count: u64,
    pub window_start_nanos: i64,
}

/// All quotas' counters for one key, combined into a single stored value.
/// Wire tag `23|`, layout `23|N|name1|count1|start1|...|nameN|countN|startN`.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedWindowState {
    pub entries: Vec<FixedWindowEntry>,
}

impl FixedWindowState {
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn encode(&self) -> String {
        with_encode_buf(|buf| {
            let _ = write!(buf, "{TAG_FIXED_WINDOW}|{}", self.entries.len());
            for entry in &self.entries {
                let _ = write!(
                    buf,
                    "|{}|{}|{}",
                    entry.name, entry.count, entry.window_start_nanos
                );
            }
        })
    }

    pub fn decode(value: &str) -> Result<Self, ParseError> {
        if value.is_empty() {
            return Ok(Self::empty());
        }
        let rest = expect_tag(value, TAG_FIXED_WINDOW)?;
        let mut fields = rest.split('|');
        let n = fields
            .next()
            .ok_or_else(|| super::malformed(TAG_FIXED_WINDOW, "missing entry count"))?;
        let n = parse_u64(TAG_FIXED_WINDOW, n)? as usize;
        if n == 0 || n > 8 {
            return Err(super::malformed(
                TAG_FIXED_WINDOW,
                format!("entry count {n} out of range 1..=8"),
            ));
        }
        let mut entries = Vec::with_capacity(n);
        for _ in 0..n {
            let name = fields
                .next()
                .ok_or_else(|| super::malformed(TAG_FIXED_WINDOW, "missing quota name"))?;
            let count = fields
                .next()
                .ok_or_else(|| super::malformed(TAG_FIXED_WINDOW, "missing quota count"))?;
            let start = fields
                .next()
                .ok_or_else(|| super::malformed(TAG_FIXED_WINDOW, "missing window start"))?;
            entries.push(FixedWindowEntry {
                name: name.to_string(),
                count: parse_u64(TAG_FIXED_WINDOW, count)?,
                window_start_nanos: parse_i64(TAG_FIXED_WINDOW, start)?,
            });
        }
        if fields.next().is_some() {
            return Err(super::malformed(TAG_FIXED_WINDOW, "trailing fields after declared entry count"));
        }
        Ok(Self { entries })
    }
}
