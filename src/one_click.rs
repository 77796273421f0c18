//! 1Click API client. 1Click wraps the intents flow behind deposit
//! addresses: the caller sends funds to the address of a quote and the
//! service performs the swap.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::relay::PollPolicy;
use crate::transport::{HttpRequest, HttpTransport, DEFAULT_TIMEOUT};

pub const ONE_CLICK_URL: &str = "https://1click.chaindefuser.com";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwapType {
    ExactInput,
    ExactOutput,
    FlexInput,
}

/// Where funds come from (`deposit_type`) or go back to (`refund_type`).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChainSide {
    OriginChain,
    Intents,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecipientType {
    DestinationChain,
    Intents,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    /// Dry quotes carry no deposit address.
    pub dry: bool,
    pub swap_type: SwapType,
    /// Basis points (100 = 1%).
    pub slippage_tolerance: u32,
    pub origin_asset: String,
    pub deposit_type: ChainSide,
    pub destination_asset: String,
    pub amount: String,
    pub refund_to: String,
    pub refund_type: ChainSide,
    pub recipient: String,
    pub recipient_type: RecipientType,
    pub deadline: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    #[serde(default)]
    pub deposit_address: Option<String>,
    pub amount_in: String,
    #[serde(default)]
    pub amount_in_formatted: Option<String>,
    pub amount_out: String,
    #[serde(default)]
    pub amount_out_formatted: Option<String>,
    #[serde(default)]
    pub min_amount_out: Option<String>,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub time_estimate: Option<u64>,
}

impl Quote {
    pub fn require_deposit_address(&self) -> Result<&str> {
        self.deposit_address.as_deref().ok_or_else(|| {
            Error::InvalidQuote(
                "Quote missing 'depositAddress' field; request a non-dry quote".to_string(),
            )
        })
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub quote: Quote,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SubmitDepositRequest<'a> {
    deposit_address: &'a str,
    tx_hash: &'a str,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ExecutionStatus {
    pub status: String,
    #[serde(default, rename = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        self.status == "SUCCESS"
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status.as_str(), "REFUNDED" | "FAILED")
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub asset_id: String,
    pub decimals: u32,
    pub blockchain: String,
    pub symbol: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub contract_address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OneClickClient<T> {
    base_url: String,
    jwt: Option<String>,
    transport: T,
    timeout: Duration,
}

impl<T: HttpTransport> OneClickClient<T> {
    pub fn new(base_url: impl Into<String>, transport: T) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            jwt: None,
            transport,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_jwt(mut self, jwt: Option<String>) -> Self {
        self.jwt = jwt;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn send<R: DeserializeOwned>(&self, request: HttpRequest<'_>) -> Result<R> {
        let url = request.url.to_string();
        let body = self
            .transport
            .send(request.bearer_token(self.jwt.as_deref()).timeout(self.timeout))?
            .into_ok_body()?;
        serde_json::from_slice(&body).map_err(|e| {
            Error::Rpc(format!(
                "Failed to parse response from {url}: {e}. Body: {}",
                String::from_utf8_lossy(&body).chars().take(1000).collect::<String>()
            ))
        })
    }

    fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let url = format!("{}{path}", self.base_url);
        let body = serde_json::to_vec(body)?;
        debug!(%url, body = %String::from_utf8_lossy(&body), "1Click request");
        self.send(HttpRequest::post_json(&url, body))
    }

    /// GET with form-encoded query parameters.
    fn get<R: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<R> {
        let mut url = Url::parse(&format!("{}{path}", self.base_url))
            .map_err(|e| Error::Config(format!("Invalid 1Click URL {}: {e}", self.base_url)))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        debug!(%url, "1Click request");
        self.send(HttpRequest::get(url.as_str()))
    }

    pub fn get_quote(&self, request: &QuoteRequest) -> Result<QuoteResponse> {
        info!(
            "Querying a quote from 1Click API: {} {} -> {}",
            request.amount, request.origin_asset, request.destination_asset
        );
        let response: QuoteResponse = self.post("/v0/quote", request)?;
        info!(
            amount_in = ?response.quote.amount_in_formatted,
            amount_out = ?response.quote.amount_out_formatted,
            deposit_address = ?response.quote.deposit_address,
            "Fetched a swap quote"
        );
        Ok(response)
    }

    /// Tell 1Click which transaction funded a deposit address, so it does not
    /// have to wait for its own indexer.
    pub fn submit_deposit_tx(&self, deposit_address: &str, tx_hash: &str) -> Result<ExecutionStatus> {
        self.post(
            "/v0/deposit/submit",
            &SubmitDepositRequest {
                deposit_address,
                tx_hash,
            },
        )
    }

    pub fn get_execution_status(&self, deposit_address: &str) -> Result<ExecutionStatus> {
        self.get("/v0/status", &[("depositAddress", deposit_address)])
    }

    pub fn get_tokens(&self) -> Result<Vec<Token>> {
        let tokens: Vec<Token> = self.get("/v0/tokens", &[])?;
        if tokens.is_empty() {
            return Err(Error::Rpc("No tokens found".to_string()));
        }
        Ok(tokens)
    }

    /// Poll the execution status of a deposit address until it succeeds.
    /// Status errors count as a spent attempt.
    pub fn wait_until_complete(&self, deposit_address: &str, policy: PollPolicy) -> Result<ExecutionStatus> {
        let mut last_status = String::from("UNKNOWN");

        for attempt in 1..=policy.attempts {
            match self.get_execution_status(deposit_address) {
                Ok(status) if status.is_success() => {
                    info!("Swap via {deposit_address} completed");
                    return Ok(status);
                }
                Ok(status) if status.is_failed() => {
                    return Err(Error::IntentRejected(format!(
                        "Swap via {deposit_address} ended with status {}",
                        status.status
                    )));
                }
                Ok(status) => {
                    info!("Current status is {}", status.status);
                    last_status = status.status;
                }
                Err(e) => warn!("Failed to get execution status (attempt {attempt}): {e}"),
            }

            if attempt < policy.attempts {
                std::thread::sleep(policy.interval);
            }
        }

        Err(Error::NotSettled {
            id: deposit_address.to_string(),
            attempts: policy.attempts,
            last_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::ScriptedTransport;
    use crate::transport::Method;
    use serde_json::json;

    fn client(transport: &ScriptedTransport) -> OneClickClient<&ScriptedTransport> {
        OneClickClient::new("https://1click.test/", transport).with_jwt(Some("token".to_string()))
    }

    fn request() -> QuoteRequest {
        QuoteRequest {
            dry: false,
            swap_type: SwapType::ExactInput,
            slippage_tolerance: 100,
            origin_asset: "nep141:eth.omft.near".to_string(),
            deposit_type: ChainSide::Intents,
            destination_asset: "nep141:arb.omft.near".to_string(),
            amount: "1000000000000".to_string(),
            refund_to: "alice.near".to_string(),
            refund_type: ChainSide::Intents,
            recipient: "0x427F9620Be0fe8Db2d840E2b6145D1CF2975bcaD".to_string(),
            recipient_type: RecipientType::DestinationChain,
            deadline: "2024-01-01T00:05:00.000Z".to_string(),
            referral: None,
        }
    }

    #[test]
    fn quote_request_is_camel_case() {
        let transport = ScriptedTransport::new();
        transport.push_json(json!({
            "quote": {"depositAddress": "0xabc", "amountIn": "1000000000000", "amountOut": "990000000000", "amountInFormatted": "0.000001"},
            "signature": "sig",
            "timestamp": "2024-01-01T00:00:00.000Z",
        }));

        let response = client(&transport).get_quote(&request()).unwrap();
        assert_eq!(response.quote.require_deposit_address().unwrap(), "0xabc");

        let recorded = transport.request(0);
        assert_eq!(recorded.method, Method::Post);
        assert_eq!(recorded.url, "https://1click.test/v0/quote");
        assert_eq!(recorded.bearer_token.as_deref(), Some("token"));
        let body = recorded.body.unwrap();
        assert_eq!(body["swapType"], "EXACT_INPUT");
        assert_eq!(body["depositType"], "INTENTS");
        assert_eq!(body["recipientType"], "DESTINATION_CHAIN");
        assert_eq!(body["slippageTolerance"], 100);
        assert_eq!(body["refundTo"], "alice.near");
        assert!(body.get("referral").is_none());
    }

    #[test]
    fn created_replies_are_accepted() {
        let transport = ScriptedTransport::new();
        transport
            .push_status(201, json!({"quote": {"depositAddress": "0xabc", "amountIn": "1", "amountOut": "2"}}).to_string())
            .push_status(201, json!({"status": "KNOWN_DEPOSIT_TX"}).to_string());
        let client = client(&transport);

        assert_eq!(client.get_quote(&request()).unwrap().quote.deposit_address.as_deref(), Some("0xabc"));
        assert_eq!(client.submit_deposit_tx("0xabc", "TxHash").unwrap().status, "KNOWN_DEPOSIT_TX");
    }

    #[test]
    fn status_query_is_encoded() {
        let transport = ScriptedTransport::new();
        transport.push_json(json!({"status": "PENDING_DEPOSIT"}));

        client(&transport).get_execution_status("a b&c=d#e").unwrap();
        assert_eq!(
            transport.request(0).url,
            "https://1click.test/v0/status?depositAddress=a+b%26c%3Dd%23e"
        );
    }

    #[test]
    fn dry_quote_has_no_deposit_address() {
        let quote: Quote =
            serde_json::from_value(json!({"amountIn": "1", "amountOut": "2"})).unwrap();
        assert!(matches!(quote.require_deposit_address(), Err(Error::InvalidQuote(_))));
    }

    #[test]
    fn status_and_deposit_endpoints() {
        let transport = ScriptedTransport::new();
        transport
            .push_json(json!({"status": "KNOWN_DEPOSIT_TX"}))
            .push_json(json!({"status": "PROCESSING", "updatedAt": "now"}));
        let client = client(&transport);

        assert_eq!(client.submit_deposit_tx("0xabc", "TxHash").unwrap().status, "KNOWN_DEPOSIT_TX");
        assert_eq!(
            transport.request(0).body.unwrap(),
            json!({"depositAddress": "0xabc", "txHash": "TxHash"})
        );

        assert_eq!(client.get_execution_status("0xabc").unwrap().status, "PROCESSING");
        let recorded = transport.request(1);
        assert_eq!(recorded.method, Method::Get);
        assert_eq!(recorded.url, "https://1click.test/v0/status?depositAddress=0xabc");
    }

    #[test]
    fn waits_for_success_within_budget() {
        let transport = ScriptedTransport::new();
        transport
            .push_json(json!({"status": "PENDING_DEPOSIT"}))
            .push_status(500, "oops")
            .push_json(json!({"status": "SUCCESS"}));
        let policy = PollPolicy::new(3, Duration::ZERO);
        assert!(client(&transport).wait_until_complete("0xabc", policy).unwrap().is_success());

        let transport = ScriptedTransport::new();
        transport.push_json(json!({"status": "REFUNDED"}));
        assert!(matches!(
            client(&transport).wait_until_complete("0xabc", policy),
            Err(Error::IntentRejected(_))
        ));

        let transport = ScriptedTransport::new();
        let err = client(&transport).wait_until_complete("0xabc", policy).unwrap_err();
        assert!(matches!(err, Error::NotSettled { attempts: 3, .. }));
    }

    #[test]
    fn tokens_list() {
        let transport = ScriptedTransport::new();
        transport.push_json(json!([
            {"assetId": "nep141:wrap.near", "decimals": 24, "blockchain": "near", "symbol": "wNEAR", "price": 3.1, "contractAddress": "wrap.near"}
        ]));
        let tokens = client(&transport).get_tokens().unwrap();
        assert_eq!(tokens[0].decimals, 24);

        let transport = ScriptedTransport::new();
        transport.push_json(json!([]));
        assert!(client(&transport).get_tokens().is_err());
    }
}
