//! End-to-end flows built from the clients: a solver relay swap and the two
//! 1Click paths into and out of the intents contract.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::context::IntentContext;
use crate::error::{Error, Result};
use crate::intent::{deadline_in, Intent, IntentMessage, TokenDiff};
use crate::one_click::{self, ChainSide, ExecutionStatus, OneClickClient, RecipientType, SwapType};
use crate::relay::{self, IntentStatus, PollPolicy, SolverRelay};
use crate::transport::HttpTransport;

pub const NEAR_ASSET_ID: &str = "nep141:wrap.near";

const ONE_CLICK_DEADLINE: Duration = Duration::from_secs(5 * 60);
const WITHDRAW_DEADLINE: Duration = Duration::from_secs(180);
const DEPOSIT_SLIPPAGE_BPS: u32 = 50;
const WITHDRAW_SLIPPAGE_BPS: u32 = 100;

/// 1Click polls every 3 seconds, 20 times.
pub const ONE_CLICK_POLL: PollPolicy = PollPolicy::new(20, Duration::from_secs(3));

#[derive(Deserialize, Debug, Clone)]
pub struct RelaySwapRequest {
    pub asset_in: String,
    pub asset_out: String,
    /// Smallest units of `asset_in`.
    pub amount_in: String,
    /// Refuse quotes paying less than this.
    #[serde(default)]
    pub min_amount_out: Option<String>,
    /// Withdraw the proceeds to this NEAR account once the swap settles.
    #[serde(default)]
    pub withdraw_to: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
pub struct RelaySwapOutcome {
    pub quote: relay::Quote,
    pub intent_hash: String,
    pub status: IntentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withdraw_intent_hash: Option<String>,
}

/// Quote, sign and publish a `token_diff` intent through the solver relay
/// and wait for it to settle.
pub fn relay_swap<T, R>(
    ctx: &IntentContext<T>,
    relay: &SolverRelay<R>,
    request: &RelaySwapRequest,
    settlement: PollPolicy,
) -> Result<RelaySwapOutcome>
where
    T: HttpTransport,
    R: HttpTransport,
{
    ctx.ensure_public_key_registered()?;

    let quote = relay
        .quote(&relay::QuoteRequest {
            defuse_asset_identifier_in: request.asset_in.clone(),
            defuse_asset_identifier_out: request.asset_out.clone(),
            exact_amount_in: request.amount_in.clone(),
        })?
        .ok_or_else(|| Error::InvalidQuote("Quote wasn't found".to_string()))?;
    info!(
        "Fetched quote {}: {} {} -> {} {}, expires at {}",
        quote.quote_hash,
        quote.amount_in,
        quote.defuse_asset_identifier_in,
        quote.amount_out,
        quote.defuse_asset_identifier_out,
        quote.expiration_time
    );

    if let Some(min_amount_out) = &request.min_amount_out {
        let amount_out = parse_amount("amount_out", &quote.amount_out)?;
        let min_amount_out = parse_amount("min_amount_out", min_amount_out)?;
        if amount_out < min_amount_out {
            return Err(Error::InvalidQuote(format!(
                "Insufficient liquidity: {amount_out} < {min_amount_out}"
            )));
        }
    }

    let message = IntentMessage::new(ctx.account_id(), quote.expiration_time.as_str()).with_intent(
        Intent::TokenDiff {
            diff: TokenDiff::swap(
                &quote.defuse_asset_identifier_in,
                &quote.amount_in,
                &quote.defuse_asset_identifier_out,
                &quote.amount_out,
            )?,
        },
    );
    let signed = ctx.sign_intent(&message)?;
    info!("Signed payload of intent");

    let intent_hash = relay.publish_intent(std::slice::from_ref(&quote.quote_hash), &signed)?;
    info!("Broadcasted intent {intent_hash} for execution");

    let status = relay.wait_for_settlement(&intent_hash, settlement)?;
    info!("Intent was settled successfully!");

    let withdraw_intent_hash = match &request.withdraw_to {
        Some(receiver_id) => Some(withdraw_intent(
            ctx,
            relay,
            &quote.defuse_asset_identifier_out,
            receiver_id,
            &quote.amount_out,
            settlement,
        )?),
        None => None,
    };

    Ok(RelaySwapOutcome {
        quote,
        intent_hash,
        status,
        withdraw_intent_hash,
    })
}

/// Publish an `ft_withdraw` intent moving `amount` of `asset_id` out of the
/// contract to `receiver_id`, and wait for it to settle.
pub fn withdraw_intent<T, R>(
    ctx: &IntentContext<T>,
    relay: &SolverRelay<R>,
    asset_id: &str,
    receiver_id: &str,
    amount: &str,
    settlement: PollPolicy,
) -> Result<String>
where
    T: HttpTransport,
    R: HttpTransport,
{
    // ft_withdraw names the token contract, not the multi-token id.
    let token = asset_id.strip_prefix("nep141:").unwrap_or(asset_id);
    info!("Withdrawing {amount} of {token} to {receiver_id}");

    let message = IntentMessage::new(ctx.account_id(), deadline_in(WITHDRAW_DEADLINE)?).with_intent(
        Intent::FtWithdraw {
            token: token.to_string(),
            receiver_id: receiver_id.to_string(),
            amount: amount.to_string(),
            memo: None,
        },
    );
    let signed = ctx.sign_intent(&message)?;
    let intent_hash = relay.publish_intent(&[], &signed)?;
    relay.wait_for_settlement(&intent_hash, settlement)?;
    info!("Withdrawal {intent_hash} settled");
    Ok(intent_hash)
}

#[derive(Deserialize, Debug, Clone)]
pub struct DepositRequest {
    pub destination_asset: String,
    /// yoctoNEAR.
    pub amount: u128,
}

#[derive(Deserialize, Debug, Clone)]
pub struct WithdrawRequest {
    pub origin_asset: String,
    pub destination_asset: String,
    /// Smallest units of `origin_asset`.
    pub amount: u128,
    /// Address on the destination chain.
    pub recipient: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct OneClickOutcome {
    pub quote: one_click::Quote,
    pub deposit_address: String,
    pub tx_hash: String,
    pub status: ExecutionStatus,
}

/// Swap native NEAR into an intents balance: quote, transfer NEAR to the
/// deposit address, report the transaction and wait for completion.
pub fn one_click_deposit<T, C>(
    ctx: &IntentContext<T>,
    one_click: &OneClickClient<C>,
    request: &DepositRequest,
    policy: PollPolicy,
) -> Result<OneClickOutcome>
where
    T: HttpTransport,
    C: HttpTransport,
{
    let account_id = ctx.account_id();
    let rpc = ctx.contract().rpc();

    let balance = rpc.view_account(account_id)?.balance()?;
    if balance <= request.amount {
        return Err(Error::InsufficientBalance {
            asset: "NEAR".to_string(),
            available: balance,
            required: request.amount,
        });
    }

    let quote = one_click
        .get_quote(&one_click::QuoteRequest {
            dry: false,
            swap_type: SwapType::ExactInput,
            slippage_tolerance: DEPOSIT_SLIPPAGE_BPS,
            origin_asset: NEAR_ASSET_ID.to_string(),
            deposit_type: ChainSide::OriginChain,
            destination_asset: request.destination_asset.clone(),
            amount: request.amount.to_string(),
            refund_to: account_id.to_string(),
            refund_type: ChainSide::OriginChain,
            recipient: account_id.to_string(),
            recipient_type: RecipientType::Intents,
            deadline: deadline_in(ONE_CLICK_DEADLINE)?,
            referral: None,
        })?
        .quote;
    let deposit_address = quote.require_deposit_address()?.to_string();
    let amount_in = parse_amount("amountIn", &quote.amount_in)?;

    let tx_hash = rpc.transfer(account_id, ctx.key_pair(), &deposit_address, amount_in)?;

    let submitted = one_click.submit_deposit_tx(&deposit_address, &tx_hash)?;
    info!("Submitted deposit transaction with status {}", submitted.status);

    let status = one_click.wait_until_complete(&deposit_address, policy)?;
    Ok(OneClickOutcome {
        quote,
        deposit_address,
        tx_hash,
        status,
    })
}

/// Swap an intents balance out to another chain: quote, `mt_transfer` to the
/// deposit address and wait for completion.
pub fn one_click_withdraw<T, C>(
    ctx: &IntentContext<T>,
    one_click: &OneClickClient<C>,
    request: &WithdrawRequest,
    policy: PollPolicy,
) -> Result<OneClickOutcome>
where
    T: HttpTransport,
    C: HttpTransport,
{
    let account_id = ctx.account_id();
    let contract = ctx.contract();

    let balance = contract.mt_balance_of(account_id, &request.origin_asset)?;
    if balance < request.amount {
        return Err(Error::InsufficientBalance {
            asset: request.origin_asset.clone(),
            available: balance,
            required: request.amount,
        });
    }

    let quote = one_click
        .get_quote(&one_click::QuoteRequest {
            dry: false,
            swap_type: SwapType::ExactInput,
            slippage_tolerance: WITHDRAW_SLIPPAGE_BPS,
            origin_asset: request.origin_asset.clone(),
            deposit_type: ChainSide::Intents,
            destination_asset: request.destination_asset.clone(),
            amount: request.amount.to_string(),
            refund_to: account_id.to_string(),
            refund_type: ChainSide::Intents,
            recipient: request.recipient.clone(),
            recipient_type: RecipientType::DestinationChain,
            deadline: deadline_in(ONE_CLICK_DEADLINE)?,
            referral: None,
        })?
        .quote;
    let deposit_address = quote.require_deposit_address()?.to_string();

    let tx_hash = contract.mt_transfer(
        account_id,
        ctx.key_pair(),
        &request.origin_asset,
        &deposit_address,
        &quote.amount_in,
    )?;

    let status = one_click.wait_until_complete(&deposit_address, policy)?;
    Ok(OneClickOutcome {
        quote,
        deposit_address,
        tx_hash,
        status,
    })
}

fn parse_amount(field: &str, value: &str) -> Result<u128> {
    value
        .parse()
        .map_err(|_| Error::InvalidQuote(format!("Invalid {field} {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::intents_contract::IntentsContract;
    use crate::near_tx::tests::{access_key_response, committed_response, decode_broadcast, view_response};
    use crate::near_tx::{Action, NearRpc};
    use crate::transport::testing::ScriptedTransport;
    use serde_json::json;

    const NO_WAIT: PollPolicy = PollPolicy::new(2, Duration::ZERO);

    fn context(transport: &ScriptedTransport) -> IntentContext<&ScriptedTransport> {
        IntentContext::new(
            "alice.near",
            KeyPair::from_seed([1; 32]),
            IntentsContract::new(NearRpc::new("http://rpc", transport), "intents.near"),
        )
    }

    fn relay_quote(amount_out: &str) -> serde_json::Value {
        json!({"result": [{
            "defuse_asset_identifier_in": "nep141:wrap.near",
            "defuse_asset_identifier_out": "nep141:sol.omft.near",
            "amount_in": "1000",
            "amount_out": amount_out,
            "expiration_time": "2024-01-01T00:00:05.000Z",
            "quote_hash": "QH",
        }]})
    }

    fn swap_request(min_amount_out: Option<&str>) -> RelaySwapRequest {
        RelaySwapRequest {
            asset_in: "nep141:wrap.near".to_string(),
            asset_out: "nep141:sol.omft.near".to_string(),
            amount_in: "1000".to_string(),
            min_amount_out: min_amount_out.map(str::to_string),
            withdraw_to: None,
        }
    }

    #[test]
    fn relay_swap_signs_the_quoted_diff() {
        let near = ScriptedTransport::new();
        near.push_json(view_response(&json!(true))) // has_public_key
            .push_json(view_response(&json!(false))); // is_nonce_used
        let relay_transport = ScriptedTransport::new();
        relay_transport
            .push_json(relay_quote("5"))
            .push_json(json!({"result": {"status": "OK", "intent_hash": "IH"}}))
            .push_json(json!({"result": {"status": "SETTLED"}}));
        let relay = SolverRelay::new("http://relay", &relay_transport);

        let outcome = relay_swap(&context(&near), &relay, &swap_request(Some("5")), NO_WAIT).unwrap();
        assert_eq!(outcome.intent_hash, "IH");
        assert!(outcome.status.is_settled());

        let publish = relay_transport.request(1).body.unwrap();
        let signed: crate::envelope::SignedEnvelope =
            serde_json::from_value(publish["params"][0]["signed_data"].clone()).unwrap();
        assert!(signed.verify().unwrap());
        let message: IntentMessage = serde_json::from_str(&signed.payload.message).unwrap();
        assert_eq!(message.deadline, "2024-01-01T00:00:05.000Z");
        let Intent::TokenDiff { diff } = &message.intents[0] else {
            panic!("expected token_diff");
        };
        assert_eq!(diff.get("nep141:wrap.near"), Some("-1000"));
        assert_eq!(diff.get("nep141:sol.omft.near"), Some("5"));
        assert_eq!(publish["params"][0]["quote_hashes"], json!(["QH"]));
    }

    #[test]
    fn relay_swap_refuses_thin_quotes() {
        let near = ScriptedTransport::new();
        near.push_json(view_response(&json!(true)));
        let relay_transport = ScriptedTransport::new();
        relay_transport.push_json(relay_quote("4"));
        let relay = SolverRelay::new("http://relay", &relay_transport);

        let err = relay_swap(&context(&near), &relay, &swap_request(Some("5")), NO_WAIT).unwrap_err();
        assert!(matches!(err, Error::InvalidQuote(_)));
        assert_eq!(relay_transport.request_count(), 1);
    }

    #[test]
    fn relay_swap_refuses_same_asset_diff() {
        let near = ScriptedTransport::new();
        near.push_json(view_response(&json!(true)));
        let relay_transport = ScriptedTransport::new();
        relay_transport.push_json(json!({"result": [{
            "defuse_asset_identifier_in": "nep141:wrap.near",
            "defuse_asset_identifier_out": "nep141:wrap.near",
            "amount_in": "1000",
            "amount_out": "5",
            "expiration_time": "2024-01-01T00:00:05.000Z",
            "quote_hash": "QH",
        }]}));
        let relay = SolverRelay::new("http://relay", &relay_transport);

        let err = relay_swap(&context(&near), &relay, &swap_request(None), NO_WAIT).unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(_)));
        assert_eq!(relay_transport.request_count(), 1);
        assert_eq!(near.request_count(), 1);
    }

    #[test]
    fn relay_swap_without_quote() {
        let near = ScriptedTransport::new();
        near.push_json(view_response(&json!(true)));
        let relay_transport = ScriptedTransport::new();
        relay_transport.push_json(json!({"result": []}));
        let relay = SolverRelay::new("http://relay", &relay_transport);

        let err = relay_swap(&context(&near), &relay, &swap_request(None), NO_WAIT).unwrap_err();
        assert!(matches!(err, Error::InvalidQuote(_)));
    }

    #[test]
    fn withdraw_intent_strips_token_prefix() {
        let near = ScriptedTransport::new();
        near.push_json(view_response(&json!(false)));
        let relay_transport = ScriptedTransport::new();
        relay_transport
            .push_json(json!({"result": {"status": "OK", "intent_hash": "WH"}}))
            .push_json(json!({"result": {"status": "SETTLED"}}));
        let relay = SolverRelay::new("http://relay", &relay_transport);

        let hash = withdraw_intent(&context(&near), &relay, "nep141:sol.omft.near", "bob.near", "5", NO_WAIT).unwrap();
        assert_eq!(hash, "WH");

        let publish = relay_transport.request(0).body.unwrap();
        let message: serde_json::Value =
            serde_json::from_str(publish["params"][0]["signed_data"]["payload"]["message"].as_str().unwrap()).unwrap();
        assert_eq!(
            message["intents"][0],
            json!({"intent": "ft_withdraw", "token": "sol.omft.near", "receiver_id": "bob.near", "amount": "5"})
        );
    }

    #[test]
    fn deposit_transfers_quoted_amount() {
        let near = ScriptedTransport::new();
        near.push_json(json!({"result": {"amount": "5000", "locked": "0", "storage_usage": 100}}))
            .push_json(access_key_response(3))
            .push_json(committed_response("TxHash"));
        let api = ScriptedTransport::new();
        api.push_json(json!({"quote": {"depositAddress": "dep.near", "amountIn": "1000", "amountOut": "7"}}))
            .push_json(json!({"status": "KNOWN_DEPOSIT_TX"}))
            .push_json(json!({"status": "SUCCESS"}));
        let client = OneClickClient::new("http://1click", &api);

        let outcome = one_click_deposit(
            &context(&near),
            &client,
            &DepositRequest {
                destination_asset: "nep141:btc.omft.near".to_string(),
                amount: 1000,
            },
            NO_WAIT,
        )
        .unwrap();
        assert_eq!(outcome.tx_hash, "TxHash");
        assert_eq!(outcome.deposit_address, "dep.near");

        let quote = api.request(0).body.unwrap();
        assert_eq!(quote["depositType"], "ORIGIN_CHAIN");
        assert_eq!(quote["recipientType"], "INTENTS");
        assert_eq!(quote["slippageTolerance"], 50);
        assert_eq!(quote["originAsset"], NEAR_ASSET_ID);

        let signed = decode_broadcast(&near.request(2).body.unwrap());
        assert_eq!(signed.transaction.receiver_id, "dep.near");
        assert!(matches!(signed.transaction.actions[..], [Action::Transfer(1000)]));
        assert_eq!(api.request(1).body.unwrap()["txHash"], "TxHash");
    }

    #[test]
    fn deposit_requires_more_than_amount() {
        let near = ScriptedTransport::new();
        near.push_json(json!({"result": {"amount": "1000", "locked": "0", "storage_usage": 100}}));
        let api = ScriptedTransport::new();
        let client = OneClickClient::new("http://1click", &api);

        let err = one_click_deposit(
            &context(&near),
            &client,
            &DepositRequest {
                destination_asset: "nep141:btc.omft.near".to_string(),
                amount: 1000,
            },
            NO_WAIT,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InsufficientBalance { available: 1000, required: 1000, .. }));
        assert_eq!(api.request_count(), 0);
    }

    #[test]
    fn withdraw_moves_intents_balance() {
        let near = ScriptedTransport::new();
        near.push_json(view_response(&json!("2000")))
            .push_json(access_key_response(3))
            .push_json(committed_response("TxHash"));
        let api = ScriptedTransport::new();
        api.push_json(json!({"quote": {"depositAddress": "0xdep", "amountIn": "2000", "amountOut": "1990"}}))
            .push_json(json!({"status": "PROCESSING"}))
            .push_json(json!({"status": "SUCCESS"}));
        let client = OneClickClient::new("http://1click", &api);

        let outcome = one_click_withdraw(
            &context(&near),
            &client,
            &WithdrawRequest {
                origin_asset: "nep141:eth.omft.near".to_string(),
                destination_asset: "nep141:arb.omft.near".to_string(),
                amount: 2000,
                recipient: "0x427F9620Be0fe8Db2d840E2b6145D1CF2975bcaD".to_string(),
            },
            NO_WAIT,
        )
        .unwrap();
        assert!(outcome.status.is_success());

        let quote = api.request(0).body.unwrap();
        assert_eq!(quote["depositType"], "INTENTS");
        assert_eq!(quote["refundType"], "INTENTS");
        assert_eq!(quote["recipientType"], "DESTINATION_CHAIN");
        assert_eq!(quote["slippageTolerance"], 100);

        let signed = decode_broadcast(&near.request(2).body.unwrap());
        assert_eq!(signed.transaction.receiver_id, "intents.near");
        let Action::FunctionCall(call) = &signed.transaction.actions[0] else {
            panic!("expected mt_transfer");
        };
        let args: serde_json::Value = serde_json::from_slice(&call.args).unwrap();
        assert_eq!(args["receiver_id"], "0xdep");
        assert_eq!(args["amount"], "2000");
    }

    #[test]
    fn withdraw_checks_intents_balance() {
        let near = ScriptedTransport::new();
        near.push_json(view_response(&json!("10")));
        let api = ScriptedTransport::new();
        let client = OneClickClient::new("http://1click", &api);

        let err = one_click_withdraw(
            &context(&near),
            &client,
            &WithdrawRequest {
                origin_asset: "nep141:eth.omft.near".to_string(),
                destination_asset: "nep141:arb.omft.near".to_string(),
                amount: 11,
                recipient: "0xabc".to_string(),
            },
            NO_WAIT,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InsufficientBalance { available: 10, required: 11, .. }));
    }
}
