use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

const ED25519_PREFIX: &str = "ed25519:";

/// Strip the optional `ed25519:` curve tag and decode the base58 body.
fn decode_ed25519(encoded: &str, what: &str) -> Result<Vec<u8>> {
    let body = encoded.strip_prefix(ED25519_PREFIX).unwrap_or(encoded);
    bs58::decode(body)
        .into_vec()
        .map_err(|e| Error::InvalidKey(format!("Failed to decode {what}: {e}")))
}

/// ed25519 key pair of the account authorizing intents and transactions.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign `message` (for intents, the 32-byte NEP-413 digest).
    ///
    /// ed25519 is deterministic: the same key and message always give the
    /// same signature.
    pub fn sign(&self, message: &[u8]) -> (Signature, PublicKey) {
        let signature = self.signing_key.sign(message);
        (Signature(signature.to_bytes()), self.public_key())
    }
}

impl FromStr for KeyPair {
    type Err = Error;

    /// Accepts `ed25519:<base58>` (prefix optional) holding either the 32-byte
    /// seed or the 64-byte `seed || public key` form NEAR key files use.
    fn from_str(s: &str) -> Result<Self> {
        let bytes = decode_ed25519(s, "private key")?;

        let seed: [u8; 32] = match bytes.len() {
            32 | 64 => bytes[..32]
                .try_into()
                .map_err(|_| Error::InvalidKey("Failed to extract seed".to_string()))?,
            len => {
                return Err(Error::InvalidKey(format!(
                    "Invalid private key length: {len} (expected 32 or 64)"
                )))
            }
        };

        let key_pair = Self::from_seed(seed);
        if bytes.len() == 64 && bytes[32..] != key_pair.public_key().0 {
            return Err(Error::InvalidKey(
                "Public half of the private key does not match its seed".to_string(),
            ));
        }

        Ok(key_pair)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        key.verify(message, &ed25519_dalek::Signature::from_bytes(&signature.0))
            .is_ok()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ED25519_PREFIX}{}", bs58::encode(self.0).into_string())
    }
}

impl FromStr for PublicKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = decode_ed25519(s, "public key")?;
        let len = bytes.len();
        bytes.try_into().map(Self).map_err(|_| {
            Error::InvalidKey(format!("Invalid public key length: {len} (expected 32)"))
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 64]);

impl Signature {
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub const fn to_bytes(&self) -> [u8; 64] {
        self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ED25519_PREFIX}{}", bs58::encode(self.0).into_string())
    }
}

impl FromStr for Signature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = decode_ed25519(s, "signature")?;
        let len = bytes.len();
        bytes.try_into().map(Self).map_err(|_| {
            Error::InvalidKey(format!("Invalid signature length: {len} (expected 64)"))
        })
    }
}

macro_rules! string_serde {
    ($($ty:ty),+) => {$(
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(self, f)
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let encoded = String::deserialize(deserializer)?;
                encoded.parse().map_err(de::Error::custom)
            }
        }
    )+};
}

string_serde!(PublicKey, Signature);
