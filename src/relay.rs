//! Solver relay JSON-RPC client: quotes, intent publishing and status polling.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::envelope::SignedEnvelope;
use crate::error::{Error, Result};
use crate::jsonrpc;
use crate::transport::{HttpTransport, DEFAULT_TIMEOUT};

pub const SOLVER_RELAY_URL: &str = "https://solver-relay-v2.chaindefuser.com/rpc";

#[derive(Serialize, Debug, Clone)]
pub struct QuoteRequest {
    pub defuse_asset_identifier_in: String,
    pub defuse_asset_identifier_out: String,
    pub exact_amount_in: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub defuse_asset_identifier_in: String,
    pub defuse_asset_identifier_out: String,
    pub amount_in: String,
    pub amount_out: String,
    pub expiration_time: String,
    pub quote_hash: String,
}

#[derive(Serialize, Debug)]
struct PublishIntentParams<'a> {
    #[serde(skip_serializing_if = "no_quotes")]
    quote_hashes: &'a [String],
    signed_data: &'a SignedEnvelope,
}

fn no_quotes(hashes: &&[String]) -> bool {
    hashes.is_empty()
}

#[derive(Deserialize, Debug, Clone)]
pub struct PublishIntentResult {
    pub status: String,
    #[serde(default)]
    pub intent_hash: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Serialize, Debug)]
struct GetStatusParams<'a> {
    intent_hash: &'a str,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct IntentStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl IntentStatus {
    pub fn is_settled(&self) -> bool {
        self.status == "SETTLED"
    }

    pub fn is_failed(&self) -> bool {
        matches!(
            self.status.as_str(),
            "NOT_FOUND_OR_NOT_VALID_ANYMORE" | "NOT_FOUND_OR_NOT_VALID" | "FAILED"
        )
    }
}

/// How many times to ask and how long to wait between asks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl PollPolicy {
    pub const fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }
}

/// Highest `amount_out`. Quotes whose amount does not parse are skipped.
fn best_quote(quotes: Vec<Quote>) -> Option<Quote> {
    quotes
        .into_iter()
        .filter_map(|quote| match quote.amount_out.parse::<u128>() {
            Ok(amount_out) => Some((amount_out, quote)),
            Err(_) => {
                warn!(quote_hash = %quote.quote_hash, "Skipping quote with invalid amount_out {:?}", quote.amount_out);
                None
            }
        })
        .max_by_key(|(amount_out, _)| *amount_out)
        .map(|(_, quote)| quote)
}

#[derive(Debug, Clone)]
pub struct SolverRelay<T> {
    url: String,
    transport: T,
    timeout: Duration,
    quote_retries: u32,
    retry_delay: Duration,
}

impl<T: HttpTransport> SolverRelay<T> {
    pub fn new(url: impl Into<String>, transport: T) -> Self {
        Self {
            url: url.into(),
            transport,
            timeout: DEFAULT_TIMEOUT,
            quote_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_quote_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.quote_retries = retries.max(1);
        self.retry_delay = delay;
        self
    }

    /// Best quote (highest `amount_out`), or `None` when no solver answered.
    ///
    /// Transport, HTTP and RPC failures are retried up to the configured
    /// number of attempts.
    pub fn quote(&self, request: &QuoteRequest) -> Result<Option<Quote>> {
        let mut last_error = None;

        for attempt in 1..=self.quote_retries {
            debug!("Quote API attempt {attempt}/{}", self.quote_retries);

            match jsonrpc::call::<_, _, Vec<Quote>>(
                &self.transport,
                &self.url,
                "quote",
                [request],
                self.timeout,
            ) {
                Ok(quotes) => return Ok(quotes.and_then(best_quote)),
                Err(e @ Error::Json(_)) => return Err(e),
                Err(e) => {
                    warn!("Quote attempt {attempt} failed: {e}");
                    last_error = Some(e);
                }
            }

            if attempt < self.quote_retries {
                std::thread::sleep(self.retry_delay);
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Rpc("Quote API failed".to_string())))
    }

    /// Publish a signed intent; returns its intent hash. Intents that do not
    /// fill a quote (withdrawals) pass no quote hashes.
    pub fn publish_intent(&self, quote_hashes: &[String], signed_data: &SignedEnvelope) -> Result<String> {
        info!("Publishing intent signed by {}", signed_data.public_key);

        let result: PublishIntentResult = jsonrpc::call(
            &self.transport,
            &self.url,
            "publish_intent",
            [PublishIntentParams {
                quote_hashes,
                signed_data,
            }],
            self.timeout,
        )?
        .ok_or_else(|| Error::Rpc("Failed to broadcast intent".to_string()))?;

        debug!(status = %result.status, intent_hash = ?result.intent_hash, "publish_intent result");

        if result.status == "FAILED" {
            return Err(Error::IntentRejected(
                result.reason.unwrap_or_else(|| "unknown reason".to_string()),
            ));
        }

        result
            .intent_hash
            .ok_or_else(|| Error::Rpc("No intent hash received".to_string()))
    }

    pub fn get_status(&self, intent_hash: &str) -> Result<IntentStatus> {
        jsonrpc::call(
            &self.transport,
            &self.url,
            "get_status",
            [GetStatusParams { intent_hash }],
            self.timeout,
        )?
        .ok_or_else(|| Error::Rpc(format!("No status for intent {intent_hash}")))
    }

    /// Poll until the intent settles. Terminal failure statuses stop early.
    pub fn wait_for_settlement(&self, intent_hash: &str, policy: PollPolicy) -> Result<IntentStatus> {
        let mut last_status = String::from("UNKNOWN");

        for attempt in 1..=policy.attempts {
            match self.get_status(intent_hash) {
                Ok(status) => {
                    info!("Intent status (attempt {attempt}): {}", status.status);
                    if status.is_settled() {
                        return Ok(status);
                    }
                    if status.is_failed() {
                        return Err(Error::IntentRejected(format!(
                            "Intent {intent_hash} ended with status {}",
                            status.status
                        )));
                    }
                    last_status = status.status;
                }
                Err(e) => warn!("get_status failed (attempt {attempt}): {e}"),
            }

            if attempt < policy.attempts {
                std::thread::sleep(policy.interval);
            }
        }

        Err(Error::NotSettled {
            id: intent_hash.to_string(),
            attempts: policy.attempts,
            last_status,
        })
    }
}
