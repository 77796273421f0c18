//! Worker configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::crypto::KeyPair;
use crate::error::{Error, Result};
use crate::intents_contract::INTENTS_CONTRACT_ID;
use crate::nonce::DEFAULT_MAX_ATTEMPTS;
use crate::one_click::ONE_CLICK_URL;
use crate::relay::{PollPolicy, SOLVER_RELAY_URL};

pub const NEAR_RPC_URL: &str = "https://rpc.mainnet.near.org";

#[derive(Debug, Clone)]
pub struct Config {
    pub account_id: String,
    pub key_pair: KeyPair,
    pub near_rpc_url: String,
    pub solver_relay_url: String,
    pub one_click_url: String,
    pub one_click_jwt: Option<String>,
    pub intents_contract_id: String,
    pub nonce_max_attempts: u32,
    pub settlement: PollPolicy,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| get(key).ok_or_else(|| Error::Config(format!("Missing {key} env var")));
        let or_default = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let private_key = required("ACCOUNT_PRIVATE_KEY")?;
        let key_pair = KeyPair::from_str(&private_key)
            .map_err(|e| Error::Config(format!("ACCOUNT_PRIVATE_KEY: {e}")))?;

        Ok(Self {
            account_id: required("ACCOUNT_ID")?,
            key_pair,
            near_rpc_url: or_default("NEAR_RPC_URL", NEAR_RPC_URL),
            solver_relay_url: or_default("SOLVER_RELAY_URL", SOLVER_RELAY_URL),
            one_click_url: or_default("ONE_CLICK_URL", ONE_CLICK_URL),
            one_click_jwt: get("ONE_CLICK_JWT"),
            intents_contract_id: or_default("INTENTS_CONTRACT_ID", INTENTS_CONTRACT_ID),
            nonce_max_attempts: parse_var(get("NONCE_MAX_ATTEMPTS"), "NONCE_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,
            settlement: PollPolicy::new(
                parse_var(get("SETTLEMENT_ATTEMPTS"), "SETTLEMENT_ATTEMPTS", 15)?,
                Duration::from_millis(parse_var(get("SETTLEMENT_INTERVAL_MS"), "SETTLEMENT_INTERVAL_MS", 1000)?),
            ),
            request_timeout: Duration::from_secs(parse_var(
                get("REQUEST_TIMEOUT_SECS"),
                "REQUEST_TIMEOUT_SECS",
                10,
            )?),
        })
    }
}

fn parse_var<V: FromStr>(value: Option<String>, key: &str, default: V) -> Result<V> {
    match value {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("Invalid {key} value {value:?}"))),
    }
}
