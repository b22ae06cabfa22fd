use super::{expect_tag, parse_i64, with_encode_buf, TAG_GENERIC_V2};
use crate::error::ParseError;
use std::fmt::Write as _;

/// GCRA's single scalar state, the Theoretical Arrival Time. Wire tag `v2|`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GcraState {
    pub tat_nanos: i64,
}

impl GcraState {
    pub fn empty() -> Self {
        Self { tat_nanos: 0 }
    }

    pub fn encode(&self) -> String {
        with_encode_buf(|buf| {
            let _ = write!(buf, "{TAG_GENERIC_V2}|{}", self.tat_nanos);
        })
    }

    pub fn decode(value: &str) -> Result<Self, ParseError> {
        if value.is_empty() {
            return Ok(Self::empty());
        }
        let rest = expect_tag(value, TAG_GENERIC_V2)?;
        Ok(Self {
            tat_nanos: parse_i64(TAG_GENERIC_V2, rest)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let state = GcraState { tat_nanos: -7 };
        let encoded = state.encode();
        assert_eq!(encoded, "v2|-7");
        assert_eq!(GcraState::decode(&encoded).unwrap(), state);
    }

    #[test]
    fn empty_decodes_to_empty() {
        assert_eq!(GcraState::decode("").unwrap(), GcraState::empty());
    }
}
