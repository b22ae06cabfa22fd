use super::{expect_tag, with_encode_buf, TAG_COMPOSITE};
use crate::error::ParseError;
use std::fmt::Write as _;

/// The pair of inner sub-algorithm encodings sharing one composite key.
/// Wire tag `51|`, layout `51|<primary>$<secondary>`. Inner encodings never
/// contain `$` because they're built entirely from `|`-separated fields.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeState {
    pub primary: String,
    pub secondary: String,
}

impl CompositeState {
    pub fn empty() -> Self {
        Self {
            primary: String::new(),
            secondary: String::new(),
        }
    }

    pub fn encode(&self) -> String {
        with_encode_buf(|buf| {
            let _ = write!(buf, "{TAG_COMPOSITE}|{}${}", self.primary, self.secondary);
        })
    }

    pub fn decode(value: &str) -> Result<Self, ParseError> {
        if value.is_empty() {
            return Ok(Self::empty());
        }
        let rest = expect_tag(value, TAG_COMPOSITE)?;
        let mut parts = rest.splitn(2, '$');
        let primary = parts
            .next()
            .ok_or_else(|| super::malformed(TAG_COMPOSITE, "missing primary state"))?;
        let secondary = parts
            .next()
            .ok_or_else(|| super::malformed(TAG_COMPOSITE, "missing secondary state"))?;
        Ok(Self {
            primary: primary.to_string(),
            secondary: secondary.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let state = CompositeState {
            primary: "23|1|minute|3|1000".into(),
            secondary: "12|4.5|2000".into(),
        };
        let encoded = state.encode();
        assert_eq!(encoded, "51|23|1|minute|3|1000$12|4.5|2000");
        assert_eq!(CompositeState::decode(&encoded).unwrap(), state);
    }

    #[test]
    fn empty_decodes_to_empty() {
        assert_eq!(CompositeState::decode("").unwrap(), CompositeState::empty());
    }

    #[test]
    fn missing_separator_is_malformed() {
        assert!(CompositeState::decode("51|nodollarsign").is_err());
    }
}
