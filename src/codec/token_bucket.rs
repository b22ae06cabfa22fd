use super::{expect_tag, parse_f64, parse_i64, with_encode_buf, TAG_TOKEN_BUCKET};
use crate::error::ParseError;
use std::fmt::Write as _;

/// `(tokens, last_refill_nanos)`, wire tag `12|`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBucketState {
    pub tokens: f64,
    pub last_refill_nanos: i64,
}

impl TokenBucketState {
    pub fn empty() -> Self {
        Self {
            tokens: 0.0,
            last_refill_nanos: 0,
        }
    }

    pub fn encode(&self) -> String {
        with_encode_buf(|buf| {
            let _ = write!(buf, "{TAG_TOKEN_BUCKET}|{}|{}", self.tokens, self.last_refill_nanos);
        })
    }

    pub fn decode(value: &str) -> Result<Self, ParseError> {
        if value.is_empty() {
            return Ok(Self::empty());
        }
        let rest = expect_tag(value, TAG_TOKEN_BUCKET)?;
        let mut parts = rest.splitn(2, '|');
        let tokens = parts
            .next()
            .ok_or_else(|| super::malformed(TAG_TOKEN_BUCKET, "missing tokens field"))?;
        let last_refill = parts
            .next()
            .ok_or_else(|| super::malformed(TAG_TOKEN_BUCKET, "missing last_refill field"))?;
        Ok(Self {
            tokens: parse_f64(TAG_TOKEN_BUCKET, tokens)?,
            last_refill_nanos: parse_i64(TAG_TOKEN_BUCKET, last_refill)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let state = TokenBucketState {
            tokens: 3.5,
            last_refill_nanos: 123_456,
        };
        let encoded = state.encode();
        assert_eq!(encoded, "12|3.5|123456");
        assert_eq!(TokenBucketState::decode(&encoded).unwrap(), state);
    }

    #[test]
    fn empty_decodes_to_empty() {
        assert_eq!(TokenBucketState::decode("").unwrap(), TokenBucketState::empty());
    }

    #[test]
    fn wrong_tag_is_parse_error() {
        assert!(TokenBucketState::decode("23|1|2").is_err());
    }

    #[test]
    fn truncated_is_malformed() {
        assert!(TokenBucketState::decode("12|3.5").is_err());
    }
}
