use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Logical payload an account authorizes with its signature.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IntentMessage {
    pub signer_id: String,
    pub deadline: String,
    pub intents: Vec<Intent>,
}

impl IntentMessage {
    pub fn new(signer_id: impl Into<String>, deadline: impl Into<String>) -> Self {
        Self {
            signer_id: signer_id.into(),
            deadline: deadline.into(),
            intents: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intents.push(intent);
        self
    }

    /// Compact JSON, the exact string that goes into the NEP-413 payload.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    TokenDiff {
        diff: TokenDiff,
    },
    FtWithdraw {
        token: String,
        receiver_id: String,
        amount: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        memo: Option<String>,
    },
    NativeWithdraw {
        receiver_id: String,
        amount: String,
    },
}

/// Asset id to signed decimal delta. Keys keep insertion order in JSON.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct TokenDiff(Map<String, Value>);

impl TokenDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff of a swap: `amount_in` of `asset_in` leaves, `amount_out` of
    /// `asset_out` arrives.
    pub fn swap(asset_in: &str, amount_in: &str, asset_out: &str, amount_out: &str) -> Result<Self> {
        Self::new()
            .with_delta(asset_in, &format!("-{amount_in}"))?
            .with_delta(asset_out, amount_out)
    }

    /// Add one asset's delta. Each asset appears at most once.
    pub fn with_delta(mut self, asset_id: &str, delta: &str) -> Result<Self> {
        let digits = delta.strip_prefix('-').unwrap_or(delta);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidAmount(format!(
                "Token delta for {asset_id} must be a signed integer, got {delta:?}"
            )));
        }
        if self.0.contains_key(asset_id) {
            return Err(Error::InvalidAmount(format!(
                "Token diff already has a delta for {asset_id}"
            )));
        }
        self.0
            .insert(asset_id.to_string(), Value::String(delta.to_string()));
        Ok(self)
    }

    pub fn get(&self, asset_id: &str) -> Option<&str> {
        self.0.get(asset_id).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// `YYYY-MM-DDTHH:MM:SS.mmmZ`, the deadline format the relay expects.
pub fn format_deadline(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Deadline `ttl` from now.
pub fn deadline_in(ttl: Duration) -> Result<String> {
    let ttl = chrono::Duration::from_std(ttl)
        .map_err(|e| Error::Config(format!("Deadline out of range: {e}")))?;
    Ok(format_deadline(Utc::now() + ttl))
}
