//! Everything needed to sign intents on behalf of one account, passed
//! explicitly instead of living in globals.

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use tracing::{debug, info};

use crate::crypto::KeyPair;
use crate::envelope::SignedEnvelope;
use crate::error::Result;
use crate::intent::IntentMessage;
use crate::intents_contract::IntentsContract;
use crate::nep413::{Nep413Payload, Nonce};
use crate::nonce::{self, DEFAULT_MAX_ATTEMPTS};
use crate::standard::MessageStandard;
use crate::transport::HttpTransport;

#[derive(Debug, Clone)]
pub struct IntentContext<T> {
    account_id: String,
    key_pair: KeyPair,
    contract: IntentsContract<T>,
    nonce_max_attempts: u32,
}

impl<T: HttpTransport> IntentContext<T> {
    pub fn new(account_id: impl Into<String>, key_pair: KeyPair, contract: IntentsContract<T>) -> Self {
        Self {
            account_id: account_id.into(),
            key_pair,
            contract,
            nonce_max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    #[must_use]
    pub fn with_nonce_max_attempts(mut self, attempts: u32) -> Self {
        self.nonce_max_attempts = attempts;
        self
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    pub fn contract(&self) -> &IntentsContract<T> {
        &self.contract
    }

    pub fn generate_nonce(&self) -> Result<Nonce> {
        self.generate_nonce_with(&mut OsRng)
    }

    pub fn generate_nonce_with<R: RngCore + CryptoRng + ?Sized>(&self, rng: &mut R) -> Result<Nonce> {
        nonce::generate_nonce(&self.contract, &self.account_id, rng, self.nonce_max_attempts)
    }

    /// Sign `message` as a NEP-413 payload addressed to the verifying contract.
    pub fn sign_message(&self, message: &str, nonce: Nonce) -> Result<SignedEnvelope> {
        let recipient = self.contract.contract_id();
        let standard = MessageStandard::Nep413;
        let digest = Nep413Payload::new(message, nonce, recipient).hash(standard)?;
        debug!(digest = %hex::encode(digest), %nonce, "signing intent payload");

        let (signature, public_key) = self.key_pair.sign(&digest);

        SignedEnvelope::builder()
            .standard(standard)
            .message(message)
            .nonce(nonce)
            .recipient(recipient)
            .signature(signature)
            .public_key(public_key)
            .build()
    }

    /// Encode the intent message as JSON and sign it with a fresh nonce.
    pub fn sign_intent(&self, message: &IntentMessage) -> Result<SignedEnvelope> {
        let json = message.to_json()?;
        debug!(message = %json, "intent message");
        let nonce = self.generate_nonce()?;
        self.sign_message(&json, nonce)
    }

    /// Register the signing key with the verifying contract unless it already
    /// knows it. Returns whether a registration transaction was sent.
    pub fn ensure_public_key_registered(&self) -> Result<bool> {
        let public_key = self.key_pair.public_key();
        if self.contract.has_public_key(&self.account_id, &public_key)? {
            debug!("Public key {public_key} is already registered");
            return Ok(false);
        }

        let tx_hash = self
            .contract
            .add_public_key(&self.account_id, &self.key_pair, &public_key)?;
        info!("Public key {public_key} registered in {tx_hash}");
        Ok(true)
    }
}
