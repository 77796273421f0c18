//! Nonce generation with an advisory uniqueness check.
//!
//! The verifying contract is the real authority on nonce reuse; asking it up
//! front only avoids spending a quote on a message it would reject.

use rand::{CryptoRng, RngCore};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::nep413::Nonce;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Read-only view of the nonces an account has already consumed.
pub trait NonceRegistry {
    fn is_nonce_used(&self, account_id: &str, nonce: &Nonce) -> Result<bool>;
}

impl<R: NonceRegistry + ?Sized> NonceRegistry for &R {
    fn is_nonce_used(&self, account_id: &str, nonce: &Nonce) -> Result<bool> {
        (**self).is_nonce_used(account_id, nonce)
    }
}

/// Draw random nonces until the registry reports one as unused.
///
/// Gives up with [`Error::NonceExhausted`] after `max_attempts` collisions
/// (a value of 0 still makes one attempt). Registry errors are returned as-is.
pub fn generate_nonce<N, R>(
    registry: &N,
    account_id: &str,
    rng: &mut R,
    max_attempts: u32,
) -> Result<Nonce>
where
    N: NonceRegistry + ?Sized,
    R: RngCore + CryptoRng + ?Sized,
{
    let attempts = max_attempts.max(1);

    for attempt in 1..=attempts {
        let nonce = Nonce::random(rng);
        if !registry.is_nonce_used(account_id, &nonce)? {
            debug!(%nonce, attempt, "generated unused nonce");
            return Ok(nonce);
        }
        warn!(%nonce, attempt, attempts, "nonce already used by {account_id}, retrying");
    }

    Err(Error::NonceExhausted { attempts })
}
