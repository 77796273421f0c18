//! NEAR Intents swap worker library.
//!
//! - NEP-413 intent signing: nonces (`nonce`, `nep413`), keys and signatures
//!   (`crypto`), signed envelopes (`envelope`), intent messages (`intent`)
//! - Remote services: NEAR RPC transactions (`near_tx`), the verifying
//!   contract (`intents_contract`), the solver relay (`relay`), 1Click
//!   (`one_click`)
//! - Flows tying them together (`swap`), driven by an explicit
//!   [`IntentContext`]

pub mod amount;
pub mod config;
pub mod context;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod intent;
pub mod intents_contract;
pub mod jsonrpc;
pub mod near_tx;
pub mod nep413;
pub mod nonce;
pub mod one_click;
pub mod relay;
pub mod standard;
pub mod swap;
pub mod transport;

pub use context::IntentContext;
pub use crypto::{KeyPair, PublicKey, Signature};
pub use envelope::SignedEnvelope;
pub use error::{Error, Result};
pub use nep413::{serialize_intent, Nonce};
pub use standard::MessageStandard;
