//! Algorithm-id registry (§4.H): maps an id string to its advertised
//! [`Capabilities`], so the composite strategy and facade can validate an
//! arbitrary primary/secondary pair without a hardcoded match over every
//! known algorithm.

use crate::capability::Capabilities;
use crate::error::{ConfigError, Result};

/// Known built-in algorithm ids.
pub const FIXED_WINDOW: &str = "fixed_window";
pub const TOKEN_BUCKET: &str = "token_bucket";
pub const LEAKY_BUCKET: &str = "leaky_bucket";
pub const GCRA: &str = "gcra";

/// Looks up the [`Capabilities`] a built-in algorithm id advertises.
pub fn capabilities_for(id: &str) -> Result<Capabilities> {
    match id {
        FIXED_WINDOW => Ok(Capabilities::PRIMARY),
        TOKEN_BUCKET | LEAKY_BUCKET | GCRA => Ok(Capabilities::BOTH),
        other => Err(ConfigError::UnknownAlgorithm(other.to_string()).into()),
    }
}

/// All built-in algorithm ids, in a stable order.
pub fn known_ids() -> &'static [&'static str] {
    &[FIXED_WINDOW, TOKEN_BUCKET, LEAKY_BUCKET, GCRA]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_window_is_primary_only() {
        assert_eq!(capabilities_for(FIXED_WINDOW).unwrap(), Capabilities::PRIMARY);
    }

    #[test]
    fn token_bucket_can_play_either_role() {
        assert_eq!(capabilities_for(TOKEN_BUCKET).unwrap(), Capabilities::BOTH);
    }

    #[test]
    fn unknown_id_is_config_error() {
        assert!(capabilities_for("sliding_log").is_err());
    }

    #[test]
    fn known_ids_lists_all_four() {
        assert_eq!(known_ids().len(), 4);
    }
}
