//! NEP-413 off-chain message payload and its canonical digest.
//!
//! The verifying contract rebuilds the exact same bytes from the
//! `(message, nonce, recipient)` tuple it receives, so the borsh layout of
//! [`Nep413Payload`] and the order of its fields are part of the wire format.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use borsh::{BorshDeserialize, BorshSerialize};
use rand::{CryptoRng, RngCore};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::standard::MessageStandard;

/// Single-use 32-byte value that prevents replay of a signed intent.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce([u8; 32]);

impl Nonce {
    pub const LEN: usize = 32;

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn random<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0u8; Self::LEN];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        <[u8; 32]>::try_from(bytes)
            .map(Self)
            .map_err(|_| Error::InvalidNonceLength(bytes.len()))
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD.decode(encoded)?;
        Self::from_slice(&bytes)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", self.to_base64())
    }
}

impl FromStr for Nonce {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_base64(s)
    }
}

impl Serialize for Nonce {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Nonce {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = <String as Deserialize>::deserialize(deserializer)?;
        encoded.parse().map_err(de::Error::custom)
    }
}

/// NEP-413 payload. Field order is fixed: `message`, `nonce`, `recipient`,
/// `callback_url`.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct Nep413Payload {
    pub message: String,
    pub nonce: [u8; 32],
    pub recipient: String,
    pub callback_url: Option<String>,
}

impl Nep413Payload {
    pub fn new(message: impl Into<String>, nonce: Nonce, recipient: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            nonce: nonce.0,
            recipient: recipient.into(),
            callback_url: None,
        }
    }

    #[must_use]
    pub fn with_callback_url(mut self, callback_url: impl Into<String>) -> Self {
        self.callback_url = Some(callback_url.into());
        self
    }

    /// Borsh encoding of the payload, without the standard discriminant.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(borsh::to_vec(self)?)
    }

    /// `sha256(discriminant_le || borsh(payload))`, the value that gets signed.
    pub fn hash(&self, standard: MessageStandard) -> Result<[u8; 32]> {
        Ok(hash_tagged(standard.discriminant(), &self.to_bytes()?))
    }
}

fn hash_tagged(discriminant: u32, payload: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(discriminant.to_le_bytes());
    hasher.update(payload);
    hasher.finalize().into()
}

/// Canonicalize an intent message and return the digest to sign.
///
/// `nonce` is the base64 transport form; it must decode to exactly 32 bytes.
pub fn serialize_intent(
    message: &str,
    recipient: &str,
    nonce: &str,
    standard: MessageStandard,
) -> Result<[u8; 32]> {
    let nonce = Nonce::from_base64(nonce)?;
    Nep413Payload::new(message, nonce, recipient).hash(standard)
}
