use super::{expect_tag, parse_f64, parse_i64, with_encode_buf, TAG_LEAKY_BUCKET};
use crate::error::ParseError;
use std::fmt::Write as _;

/// `(level, last_leak_nanos)`, wire tag `34|`. Mirrors [`super::TokenBucketState`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeakyBucketState {
    pub level: f64,
    pub last_leak_nanos: i64,
}

impl LeakyBucketState {
    pub fn empty() -> Self {
        Self {
            level: 0.0,
            last_leak_nanos: 0,
        }
    }

    pub fn encode(&self) -> String {
        with_encode_buf(|buf| {
            let _ = write!(buf, "{TAG_LEAKY_BUCKET}|{}|{}", self.level, self.last_leak_nanos);
        })
    }

    pub fn decode(value: &str) -> Result<Self, ParseError> {
        if value.is_empty() {
            return Ok(Self::empty());
        }
        let rest = expect_tag(value, TAG_LEAKY_BUCKET)?;
        let mut parts = rest.splitn(2, '|');
        let level = parts
            .next()
            .ok_or_else(|| super::malformed(TAG_LEAKY_BUCKET, "missing level field"))?;
        let last_leak = parts
            .next()
            .ok_or_else(|| super::malformed(TAG_LEAKY_BUCKET, "missing last_leak field"))?;
        Ok(Self {
            level: parse_f64(TAG_LEAKY_BUCKET, level)?,
            last_leak_nanos: parse_i64(TAG_LEAKY_BUCKET, last_leak)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let state = LeakyBucketState {
            level: 2.25,
            last_leak_nanos: 42,
        };
        let encoded = state.encode();
        assert_eq!(LeakyBucketState::decode(&encoded).unwrap(), state);
    }

    #[test]
    fn empty_decodes_to_empty() {
        assert_eq!(LeakyBucketState::decode("").unwrap(), LeakyBucketState::empty());
    }
}
