use thiserror::Error;

/// Errors produced while building, signing and submitting intents.
#[derive(Debug, Error)]
pub enum Error {
    /// Every locally generated nonce was reported as already used.
    #[error("Nonce generation exhausted after {attempts} attempts")]
    NonceExhausted { attempts: u32 },

    #[error("Invalid nonce length: {0} (expected 32)")]
    InvalidNonceLength(usize),

    #[error("Failed to decode nonce: {0}")]
    InvalidNonceEncoding(#[from] base64::DecodeError),

    #[error("Missing required field `{0}`")]
    MissingField(&'static str),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Unsupported message standard `{0}`")]
    UnsupportedStandard(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Borsh serialization failed: {0}")]
    Borsh(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// The relay refused the signed intent.
    #[error("Intent wasn't executed - {0}")]
    IntentRejected(String),

    #[error("Intent {id} hasn't been settled after {attempts} attempts - last status: {last_status}")]
    NotSettled {
        id: String,
        attempts: u32,
        last_status: String,
    },

    #[error("Invalid quote: {0}")]
    InvalidQuote(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient balance of {asset}: have {available}, need {required}")]
    InsufficientBalance {
        asset: String,
        available: u128,
        required: u128,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
