//! NEAR transaction signing and RPC without near-primitives.
//! Uses only ed25519-dalek + borsh + a pluggable HTTP transport so the same
//! code runs natively and under WASI.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info};

use crate::crypto::{KeyPair, PublicKey};
use crate::error::{Error, Result};
use crate::jsonrpc;
use crate::transport::{HttpTransport, DEFAULT_TIMEOUT};

pub const TGAS: u64 = 1_000_000_000_000;
pub const ONE_YOCTO: u128 = 1;
/// 1 NEAR in yoctoNEAR.
pub const ONE_NEAR: u128 = 1_000_000_000_000_000_000_000_000;

/// Longer timeout for `broadcast_tx_commit`, which waits for execution.
const COMMIT_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// NEAR Transaction Types (minimal borsh-serializable versions)
// ============================================================================

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub signer_id: String,
    pub public_key: TxPublicKey,
    pub nonce: u64,
    pub receiver_id: String,
    pub block_hash: [u8; 32],
    pub actions: Vec<Action>,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxPublicKey {
    Ed25519([u8; 32]),
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxSignature {
    Ed25519([u8; 64]),
}

/// Leading part of the NEAR action set. Variant order is the borsh tag, so
/// the unused `CreateAccount`/`DeployContract` keep `FunctionCall` at 2 and
/// `Transfer` at 3.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub enum Action {
    CreateAccount,
    DeployContract(Vec<u8>),
    FunctionCall(FunctionCallAction),
    Transfer(u128),
}

impl Action {
    pub fn function_call(
        method_name: &str,
        args: &impl Serialize,
        gas: u64,
        deposit: u128,
    ) -> Result<Self> {
        Ok(Self::FunctionCall(FunctionCallAction {
            method_name: method_name.to_string(),
            args: serde_json::to_vec(args)?,
            gas,
            deposit,
        }))
    }
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct FunctionCallAction {
    pub method_name: String,
    pub args: Vec<u8>,
    pub gas: u64,
    pub deposit: u128,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub signature: TxSignature,
}

impl Transaction {
    /// `sha256(borsh(transaction))`, the bytes that get signed.
    pub fn hash(&self) -> Result<[u8; 32]> {
        let bytes = borsh::to_vec(self)?;
        Ok(Sha256::digest(&bytes).into())
    }

    pub fn sign(self, key: &KeyPair) -> Result<SignedTransaction> {
        let hash = self.hash()?;
        let (signature, _) = key.sign(&hash);
        Ok(SignedTransaction {
            transaction: self,
            signature: TxSignature::Ed25519(signature.to_bytes()),
        })
    }
}

// ============================================================================
// RPC views
// ============================================================================

#[derive(Deserialize, Debug, Clone)]
pub struct AccountView {
    pub amount: String,
    #[serde(default)]
    pub locked: String,
    #[serde(default)]
    pub storage_usage: u64,
}

impl AccountView {
    pub fn balance(&self) -> Result<u128> {
        self.amount
            .parse()
            .map_err(|_| Error::Rpc(format!("Invalid account balance {:?}", self.amount)))
    }
}

#[derive(Deserialize)]
struct AccessKeyView {
    nonce: u64,
    block_hash: String,
}

#[derive(Deserialize)]
struct CallFunctionView {
    #[serde(default)]
    result: Option<Vec<u8>>,
    #[serde(default)]
    error: Option<String>,
}

// ============================================================================
// Transaction Outcome Structures (compatible with near-primitives)
// ============================================================================

#[derive(Deserialize, Debug)]
enum TxExecutionError {
    ActionError(ActionError),
    InvalidTxError(serde_json::Value),
}

#[derive(Deserialize, Debug)]
struct ActionError {
    index: Option<u64>,
    kind: ActionErrorKind,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum ActionErrorKind {
    FunctionCallError {
        #[serde(rename = "FunctionCallError")]
        function_call_error: FunctionCallErrorKind,
    },
    Other(serde_json::Value),
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum FunctionCallErrorKind {
    ExecutionError {
        #[serde(rename = "ExecutionError")]
        execution_error: String,
    },
    Other(serde_json::Value),
}

#[derive(Deserialize, Debug)]
#[allow(dead_code)]
enum ExecutionStatusView {
    Unknown,
    Failure(TxExecutionError),
    SuccessValue(String),
    SuccessReceiptId(String),
}

#[derive(Deserialize, Debug)]
#[allow(dead_code)]
enum FinalExecutionStatus {
    NotStarted,
    Started,
    Failure(TxExecutionError),
    SuccessValue(String),
}

#[derive(Deserialize, Debug)]
struct ExecutionOutcomeView {
    #[serde(default)]
    logs: Vec<String>,
    status: ExecutionStatusView,
}

#[derive(Deserialize, Debug)]
struct ExecutionOutcomeWithIdView {
    id: String,
    outcome: ExecutionOutcomeView,
}

#[derive(Deserialize, Debug)]
struct SignedTransactionView {
    hash: String,
}

#[derive(Deserialize, Debug)]
struct FinalExecutionOutcomeView {
    status: FinalExecutionStatus,
    transaction: SignedTransactionView,
    transaction_outcome: ExecutionOutcomeWithIdView,
    receipts_outcome: Vec<ExecutionOutcomeWithIdView>,
}

// ============================================================================
// Client
// ============================================================================

/// JSON-RPC client for a NEAR node.
#[derive(Debug, Clone)]
pub struct NearRpc<T> {
    url: String,
    transport: T,
    timeout: Duration,
}

impl<T: HttpTransport> NearRpc<T> {
    pub fn new(url: impl Into<String>, transport: T) -> Self {
        Self {
            url: url.into(),
            transport,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn query<R: DeserializeOwned>(&self, params: serde_json::Value) -> Result<R> {
        jsonrpc::call(&self.transport, &self.url, "query", params, self.timeout)?
            .ok_or_else(|| Error::Rpc("No result in query response".to_string()))
    }

    /// Read-only contract call; the returned bytes are decoded as JSON.
    pub fn view<R: DeserializeOwned>(
        &self,
        contract_id: &str,
        method_name: &str,
        args: &impl Serialize,
    ) -> Result<R> {
        debug!("View call: {contract_id}.{method_name}");

        let view: CallFunctionView = self.query(serde_json::json!({
            "request_type": "call_function",
            "finality": "final",
            "account_id": contract_id,
            "method_name": method_name,
            "args_base64": STANDARD.encode(serde_json::to_vec(args)?),
        }))?;

        if let Some(error) = view.error {
            return Err(Error::Rpc(format!("{contract_id}.{method_name}: {error}")));
        }
        let bytes = view
            .result
            .ok_or_else(|| Error::Rpc(format!("{contract_id}.{method_name}: no result")))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn view_account(&self, account_id: &str) -> Result<AccountView> {
        self.query(serde_json::json!({
            "request_type": "view_account",
            "finality": "final",
            "account_id": account_id,
        }))
    }

    /// Current access key nonce and a recent final block hash.
    pub fn access_key(&self, account_id: &str, public_key: &PublicKey) -> Result<(u64, [u8; 32])> {
        let view: AccessKeyView = self.query(serde_json::json!({
            "request_type": "view_access_key",
            "finality": "final",
            "account_id": account_id,
            "public_key": public_key.to_string(),
        }))?;

        let block_hash = bs58::decode(&view.block_hash)
            .into_vec()
            .map_err(|e| Error::Rpc(format!("Failed to decode block hash: {e}")))?;
        let block_hash: [u8; 32] = block_hash.try_into().map_err(|b: Vec<u8>| {
            Error::Rpc(format!("Invalid block hash length: {} bytes", b.len()))
        })?;

        Ok((view.nonce, block_hash))
    }

    /// Sign a transaction carrying `actions` and wait for its execution.
    /// Returns the transaction hash.
    pub fn send_actions(
        &self,
        signer_id: &str,
        key: &KeyPair,
        receiver_id: &str,
        actions: Vec<Action>,
    ) -> Result<String> {
        let public_key = key.public_key();
        let (nonce, block_hash) = self.access_key(signer_id, &public_key)?;
        debug!("Nonce: {}, Block hash: {}", nonce, hex::encode(block_hash));

        let signed = Transaction {
            signer_id: signer_id.to_string(),
            public_key: TxPublicKey::Ed25519(*public_key.as_bytes()),
            nonce: nonce + 1,
            receiver_id: receiver_id.to_string(),
            block_hash,
            actions,
        }
        .sign(key)?;

        self.broadcast_tx_commit(&signed)
    }

    pub fn function_call(
        &self,
        signer_id: &str,
        key: &KeyPair,
        contract_id: &str,
        method_name: &str,
        args: &impl Serialize,
        gas: u64,
        deposit: u128,
    ) -> Result<String> {
        info!("Call: {contract_id}.{method_name}");
        let action = Action::function_call(method_name, args, gas, deposit)?;
        self.send_actions(signer_id, key, contract_id, vec![action])
    }

    /// Native NEAR transfer.
    pub fn transfer(&self, signer_id: &str, key: &KeyPair, receiver_id: &str, amount: u128) -> Result<String> {
        info!("Transfer: {amount} yoctoNEAR from {signer_id} to {receiver_id}");
        self.send_actions(signer_id, key, receiver_id, vec![Action::Transfer(amount)])
    }

    fn broadcast_tx_commit(&self, signed_tx: &SignedTransaction) -> Result<String> {
        let tx_base64 = STANDARD.encode(borsh::to_vec(signed_tx)?);

        debug!("Sending transaction to NEAR RPC...");
        let result: serde_json::Value = jsonrpc::call(
            &self.transport,
            &self.url,
            "broadcast_tx_commit",
            [tx_base64],
            COMMIT_TIMEOUT.max(self.timeout),
        )?
        .ok_or_else(|| Error::Rpc("No result in RPC response".to_string()))?;

        let outcome: FinalExecutionOutcomeView = serde_json::from_value(result)
            .map_err(|e| Error::Rpc(format!("Failed to parse FinalExecutionOutcomeView: {e}")))?;
        check_outcome(&outcome)?;

        info!("Transaction successful: {}", outcome.transaction.hash);
        Ok(outcome.transaction.hash)
    }
}

/// Fail on the top-level status, the transaction outcome, or any receipt.
fn check_outcome(outcome: &FinalExecutionOutcomeView) -> Result<()> {
    match &outcome.status {
        FinalExecutionStatus::Failure(err) => {
            let error_msg = format_tx_error(err);
            error!("Transaction {} failed: {error_msg}", outcome.transaction.hash);
            return Err(Error::Transaction(error_msg));
        }
        FinalExecutionStatus::NotStarted => {
            return Err(Error::Transaction("Transaction not started".to_string()));
        }
        FinalExecutionStatus::Started => {
            return Err(Error::Transaction("Transaction still in progress".to_string()));
        }
        FinalExecutionStatus::SuccessValue(_) => {}
    }

    if let ExecutionStatusView::Failure(err) = &outcome.transaction_outcome.outcome.status {
        return Err(Error::Transaction(format!(
            "Transaction outcome {} failed: {}",
            outcome.transaction_outcome.id,
            format_tx_error(err)
        )));
    }

    for (i, receipt) in outcome.receipts_outcome.iter().enumerate() {
        if let ExecutionStatusView::Failure(err) = &receipt.outcome.status {
            let error_msg = format_tx_error(err);
            error!(receipt = %receipt.id, logs = ?receipt.outcome.logs, "Receipt {i} failed: {error_msg}");
            return Err(Error::Transaction(format!("Receipt {i} failed: {error_msg}")));
        }
    }

    Ok(())
}

fn format_tx_error(err: &TxExecutionError) -> String {
    match err {
        TxExecutionError::ActionError(action_error) => {
            let index_str = action_error
                .index
                .map(|i| format!("action {i}: "))
                .unwrap_or_default();
            match &action_error.kind {
                ActionErrorKind::FunctionCallError { function_call_error } => match function_call_error {
                    FunctionCallErrorKind::ExecutionError { execution_error } => {
                        format!("{index_str}Smart contract panicked: {execution_error}")
                    }
                    FunctionCallErrorKind::Other(val) => {
                        format!("{index_str}Function call error: {val}")
                    }
                },
                ActionErrorKind::Other(val) => format!("{index_str}Action error: {val}"),
            }
        }
        TxExecutionError::InvalidTxError(invalid_tx_error) => {
            format!("Invalid transaction: {invalid_tx_error}")
        }
    }
}
