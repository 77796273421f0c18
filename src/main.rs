use std::io::{self, Read, Write};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use intents_swap::amount::{parse_units, to_units};
use intents_swap::config::Config;
use intents_swap::intent::deadline_in;
use intents_swap::intents_contract::IntentsContract;
use intents_swap::near_tx::NearRpc;
use intents_swap::one_click::{self, ChainSide, OneClickClient, RecipientType, SwapType};
use intents_swap::relay::SolverRelay;
use intents_swap::swap::{self, DepositRequest, RelaySwapRequest, WithdrawRequest, ONE_CLICK_POLL};
use intents_swap::IntentContext;

#[cfg(feature = "native")]
type Transport = intents_swap::transport::ReqwestTransport;
#[cfg(all(feature = "wasi", not(feature = "native")))]
type Transport = intents_swap::transport::WasiTransport;
#[cfg(not(any(feature = "native", feature = "wasi")))]
compile_error!("enable the `native` or `wasi` feature");

const NEAR_DECIMALS: u32 = 24;

#[derive(Deserialize, Debug)]
#[serde(tag = "action", rename_all = "snake_case")]
enum Input {
    /// Solver relay swap between two intents balances.
    Swap(RelaySwapRequest),
    /// Native NEAR into an intents balance of `destination_asset` via 1Click.
    Deposit {
        destination_asset: String,
        /// Decimal NEAR, e.g. "0.001".
        amount: String,
    },
    /// Wrap native NEAR and deposit it straight into the intents contract.
    DepositNear {
        /// Decimal NEAR.
        amount: String,
    },
    /// Intents balance out to another chain via 1Click.
    Withdraw {
        origin_asset: String,
        destination_asset: String,
        amount: String,
        recipient: String,
    },
    /// Dry 1Click quote.
    Quote {
        origin_asset: String,
        destination_asset: String,
        amount: String,
    },
    Tokens,
    RegisterKey,
    /// Sign an arbitrary message with a fresh nonce.
    Sign { message: String },
}

#[derive(Serialize, Debug)]
struct Output {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the result; logs go to stderr.
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("intents_swap=info,warn"));
    fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(true)
        .init();

    let mut input_string = String::new();
    io::stdin().read_to_string(&mut input_string)?;
    let input: Input = serde_json::from_str(&input_string)?;
    info!("Processing {input:?}");

    let output = match Config::from_env().and_then(|config| run(&config, input)) {
        Ok(result) => Output {
            success: true,
            result: Some(result),
            error_message: None,
        },
        Err(e) => {
            error!("Execution failed: {e}");
            Output {
                success: false,
                result: None,
                error_message: Some(e.to_string()),
            }
        }
    };

    print!("{}", serde_json::to_string(&output)?);
    io::stdout().flush()?;

    Ok(())
}

fn run(config: &Config, input: Input) -> intents_swap::Result<Value> {
    let transport = Transport::default();

    let rpc = NearRpc::new(&config.near_rpc_url, transport.clone()).with_timeout(config.request_timeout);
    let ctx = IntentContext::new(
        config.account_id.as_str(),
        config.key_pair.clone(),
        IntentsContract::new(rpc, &config.intents_contract_id),
    )
    .with_nonce_max_attempts(config.nonce_max_attempts);
    let relay = SolverRelay::new(&config.solver_relay_url, transport.clone()).with_timeout(config.request_timeout);
    let one_click = OneClickClient::new(&config.one_click_url, transport)
        .with_jwt(config.one_click_jwt.clone())
        .with_timeout(config.request_timeout);

    let result = match input {
        Input::Swap(request) => serde_json::to_value(swap::relay_swap(&ctx, &relay, &request, config.settlement)?)?,
        Input::Deposit {
            destination_asset,
            amount,
        } => {
            let request = DepositRequest {
                destination_asset,
                amount: parse_units(&amount, NEAR_DECIMALS)?,
            };
            serde_json::to_value(swap::one_click_deposit(&ctx, &one_click, &request, ONE_CLICK_POLL)?)?
        }
        Input::DepositNear { amount } => json!({
            "tx_hash": ctx
                .contract()
                .deposit_near(ctx.account_id(), ctx.key_pair(), parse_units(&amount, NEAR_DECIMALS)?)?,
        }),
        Input::Withdraw {
            origin_asset,
            destination_asset,
            amount,
            recipient,
        } => {
            let request = WithdrawRequest {
                amount: to_units(&amount, &origin_asset)?,
                origin_asset,
                destination_asset,
                recipient,
            };
            serde_json::to_value(swap::one_click_withdraw(&ctx, &one_click, &request, ONE_CLICK_POLL)?)?
        }
        Input::Quote {
            origin_asset,
            destination_asset,
            amount,
        } => {
            let amount = to_units(&amount, &origin_asset)?;
            let response = one_click.get_quote(&one_click::QuoteRequest {
                dry: true,
                swap_type: SwapType::ExactInput,
                slippage_tolerance: 100,
                origin_asset,
                deposit_type: ChainSide::Intents,
                destination_asset,
                amount: amount.to_string(),
                refund_to: config.account_id.clone(),
                refund_type: ChainSide::Intents,
                recipient: config.account_id.clone(),
                recipient_type: RecipientType::Intents,
                deadline: deadline_in(Duration::from_secs(5 * 60))?,
                referral: None,
            })?;
            serde_json::to_value(response.quote)?
        }
        Input::Tokens => serde_json::to_value(one_click.get_tokens()?)?,
        Input::RegisterKey => json!({
            "public_key": ctx.key_pair().public_key(),
            "registered": ctx.ensure_public_key_registered()?,
        }),
        Input::Sign { message } => {
            let nonce = ctx.generate_nonce()?;
            serde_json::to_value(ctx.sign_message(&message, nonce)?)?
        }
    };

    Ok(result)
}
