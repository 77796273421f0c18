use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// High bit shared by every off-chain message tag. It makes the tag too large
/// to be mistaken for the length prefix of a transaction's signer id.
const OFF_CHAIN_TAG_BASE: u32 = 1 << 31;

/// Off-chain message signing standards understood by the intents contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStandard {
    Nep413,
}

impl MessageStandard {
    /// NEP number of the standard.
    pub const fn number(self) -> u32 {
        match self {
            Self::Nep413 => 413,
        }
    }

    /// `2^31 + number`, serialized little-endian in front of the payload
    /// before hashing.
    pub const fn discriminant(self) -> u32 {
        OFF_CHAIN_TAG_BASE + self.number()
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nep413 => "nep413",
        }
    }
}

impl fmt::Display for MessageStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageStandard {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nep413" => Ok(Self::Nep413),
            other => Err(Error::UnsupportedStandard(other.to_string())),
        }
    }
}
