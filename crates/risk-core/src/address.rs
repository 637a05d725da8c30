//! Structural address checks

use serde::{Deserialize, Serialize};

/// Characters allowed in the data part of a bech32 string
const BECH32_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Expected shape of an account address: `<hrp>1<data>` with a fixed total length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressFormat {
    /// Human-readable part, e.g. `sei`
    pub prefix: String,
    /// Accepted total lengths (wallet and contract addresses differ)
    pub lengths: Vec<usize>,
}

impl Default for AddressFormat {
    fn default() -> Self {
        Self {
            prefix: "sei".to_string(),
            lengths: vec![42, 63],
        }
    }
}

impl AddressFormat {
    pub fn is_valid(&self, address: &str) -> bool {
        if !self.lengths.contains(&address.len()) {
            return false;
        }

        let Some(data) = address
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('1'))
        else {
            return false;
        };

        !data.is_empty() && data.chars().all(|c| BECH32_CHARSET.contains(c))
    }
}
