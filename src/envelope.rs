use serde::{Deserialize, Serialize};

use crate::crypto::{PublicKey, Signature};
use crate::error::{Error, Result};
use crate::nep413::Nonce;
use crate::standard::MessageStandard;

/// Signed intent as sent to the solver relay in `publish_intent`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SignedEnvelope {
    pub standard: MessageStandard,
    pub payload: EnvelopePayload,
    pub signature: Signature,
    pub public_key: PublicKey,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EnvelopePayload {
    pub message: String,
    pub nonce: Nonce,
    pub recipient: String,
}

impl SignedEnvelope {
    pub fn builder() -> EnvelopeBuilder {
        EnvelopeBuilder::default()
    }

    /// Recompute the digest from the payload and check the signature against
    /// `public_key`, the same check the verifying contract performs.
    pub fn verify(&self) -> Result<bool> {
        let digest = crate::nep413::Nep413Payload::new(
            self.payload.message.as_str(),
            self.payload.nonce,
            self.payload.recipient.as_str(),
        )
        .hash(self.standard)?;
        Ok(self.public_key.verify(&digest, &self.signature))
    }
}

#[derive(Debug, Default, Clone)]
pub struct EnvelopeBuilder {
    standard: Option<MessageStandard>,
    message: Option<String>,
    nonce: Option<Nonce>,
    recipient: Option<String>,
    signature: Option<Signature>,
    public_key: Option<PublicKey>,
}

impl EnvelopeBuilder {
    #[must_use]
    pub fn standard(mut self, standard: MessageStandard) -> Self {
        self.standard = Some(standard);
        self
    }

    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn nonce(mut self, nonce: Nonce) -> Self {
        self.nonce = Some(nonce);
        self
    }

    #[must_use]
    pub fn recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    #[must_use]
    pub fn signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }

    #[must_use]
    pub fn public_key(mut self, public_key: PublicKey) -> Self {
        self.public_key = Some(public_key);
        self
    }

    /// Fails with [`Error::MissingField`] naming the first unset field.
    pub fn build(self) -> Result<SignedEnvelope> {
        Ok(SignedEnvelope {
            standard: self.standard.ok_or(Error::MissingField("standard"))?,
            payload: EnvelopePayload {
                message: self.message.ok_or(Error::MissingField("message"))?,
                nonce: self.nonce.ok_or(Error::MissingField("nonce"))?,
                recipient: self.recipient.ok_or(Error::MissingField("recipient"))?,
            },
            signature: self.signature.ok_or(Error::MissingField("signature"))?,
            public_key: self.public_key.ok_or(Error::MissingField("public_key"))?,
        })
    }
}
