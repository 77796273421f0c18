use serde_json::json;
use tracing::{info, warn};

use crate::crypto::{KeyPair, PublicKey};
use crate::error::{Error, Result};
use crate::near_tx::{Action, NearRpc, ONE_NEAR, ONE_YOCTO, TGAS};
use crate::nep413::Nonce;
use crate::nonce::NonceRegistry;
use crate::transport::HttpTransport;

pub const INTENTS_CONTRACT_ID: &str = "intents.near";
pub const WRAP_NEAR_CONTRACT_ID: &str = "wrap.near";

/// Storage deposit attached to `near_deposit` on top of the wrapped amount.
const WRAP_STORAGE_DEPOSIT: u128 = ONE_NEAR / 800; // 0.00125 NEAR

/// Client for the verifying multi-token contract.
#[derive(Debug, Clone)]
pub struct IntentsContract<T> {
    rpc: NearRpc<T>,
    contract_id: String,
}

impl<T: HttpTransport> IntentsContract<T> {
    pub fn new(rpc: NearRpc<T>, contract_id: impl Into<String>) -> Self {
        Self {
            rpc,
            contract_id: contract_id.into(),
        }
    }

    pub fn contract_id(&self) -> &str {
        &self.contract_id
    }

    pub fn rpc(&self) -> &NearRpc<T> {
        &self.rpc
    }

    pub fn has_public_key(&self, account_id: &str, public_key: &PublicKey) -> Result<bool> {
        self.rpc.view(
            &self.contract_id,
            "has_public_key",
            &json!({
                "account_id": account_id,
                "public_key": public_key.to_string(),
            }),
        )
    }

    pub fn add_public_key(&self, account_id: &str, key: &KeyPair, public_key: &PublicKey) -> Result<String> {
        warn!("Registering public key {public_key} of account {account_id} for signature verification");
        self.rpc.function_call(
            account_id,
            key,
            &self.contract_id,
            "add_public_key",
            &json!({ "public_key": public_key.to_string() }),
            30 * TGAS,
            ONE_YOCTO,
        )
    }

    pub fn mt_balance_of(&self, account_id: &str, token_id: &str) -> Result<u128> {
        let balance: String = self.rpc.view(
            &self.contract_id,
            "mt_balance_of",
            &json!({
                "token_id": token_id,
                "account_id": account_id,
            }),
        )?;
        balance
            .parse()
            .map_err(|_| Error::Rpc(format!("Invalid mt_balance_of result {balance:?}")))
    }

    /// Move `amount` of `token_id` inside the contract to `receiver_id`.
    pub fn mt_transfer(
        &self,
        account_id: &str,
        key: &KeyPair,
        token_id: &str,
        receiver_id: &str,
        amount: &str,
    ) -> Result<String> {
        info!("Transferring {amount} of {token_id} to {receiver_id}");
        self.rpc.function_call(
            account_id,
            key,
            &self.contract_id,
            "mt_transfer",
            &json!({
                "token_id": token_id,
                "receiver_id": receiver_id,
                "amount": amount,
            }),
            30 * TGAS,
            ONE_YOCTO,
        )
    }

    /// Wrap `amount` yoctoNEAR and deposit it into the contract as
    /// `nep141:wrap.near`, in a single transaction.
    pub fn deposit_near(&self, account_id: &str, key: &KeyPair, amount: u128) -> Result<String> {
        let attached = amount.checked_add(WRAP_STORAGE_DEPOSIT).ok_or_else(|| {
            Error::InvalidAmount(format!("Deposit of {amount} yoctoNEAR overflows with the storage deposit"))
        })?;
        info!("Depositing {amount} yoctoNEAR as multi-token");
        let actions = vec![
            Action::function_call("near_deposit", &json!({}), 10 * TGAS, attached)?,
            Action::function_call(
                "ft_transfer_call",
                &json!({
                    "receiver_id": self.contract_id,
                    "amount": amount.to_string(),
                    "msg": account_id,
                }),
                50 * TGAS,
                ONE_YOCTO,
            )?,
        ];
        self.rpc
            .send_actions(account_id, key, WRAP_NEAR_CONTRACT_ID, actions)
    }
}

impl<T: HttpTransport> NonceRegistry for IntentsContract<T> {
    fn is_nonce_used(&self, account_id: &str, nonce: &Nonce) -> Result<bool> {
        self.rpc.view(
            &self.contract_id,
            "is_nonce_used",
            &json!({
                "account_id": account_id,
                "nonce": nonce.to_base64(),
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::near_tx::tests::{access_key_response, committed_response, decode_broadcast, view_response};
    use crate::near_tx::FunctionCallAction;
    use crate::transport::testing::ScriptedTransport;
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    fn contract(transport: &ScriptedTransport) -> IntentsContract<&ScriptedTransport> {
        IntentsContract::new(NearRpc::new("http://rpc", transport), INTENTS_CONTRACT_ID)
    }

    fn view_args(body: &serde_json::Value) -> serde_json::Value {
        let args = STANDARD
            .decode(body["params"]["args_base64"].as_str().unwrap())
            .unwrap();
        serde_json::from_slice(&args).unwrap()
    }

    fn call_args(action: &Action) -> (&FunctionCallAction, serde_json::Value) {
        let Action::FunctionCall(call) = action else {
            panic!("expected function call, got {action:?}");
        };
        (call, serde_json::from_slice(&call.args).unwrap())
    }

    #[test]
    fn nonce_check_sends_base64_nonce() {
        let transport = ScriptedTransport::new();
        transport.push_json(view_response(&json!(false)));

        let used = contract(&transport)
            .is_nonce_used("alice.near", &Nonce::new([0; 32]))
            .unwrap();
        assert!(!used);

        let body = transport.request(0).body.unwrap();
        assert_eq!(body["params"]["account_id"], INTENTS_CONTRACT_ID);
        assert_eq!(
            view_args(&body),
            json!({"account_id": "alice.near", "nonce": "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA="})
        );
    }

    #[test]
    fn balance_parses_decimal_string() {
        let transport = ScriptedTransport::new();
        transport.push_json(view_response(&json!("1000000000000")));
        let balance = contract(&transport)
            .mt_balance_of("alice.near", "nep141:eth.omft.near")
            .unwrap();
        assert_eq!(balance, 1_000_000_000_000);
        assert_eq!(
            view_args(&transport.request(0).body.unwrap()),
            json!({"token_id": "nep141:eth.omft.near", "account_id": "alice.near"})
        );
    }

    #[test]
    fn mt_transfer_attaches_one_yocto() {
        let transport = ScriptedTransport::new();
        transport
            .push_json(access_key_response(7))
            .push_json(committed_response("TxHash"));

        contract(&transport)
            .mt_transfer("alice.near", &KeyPair::from_seed([1; 32]), "nep141:wrap.near", "deadbeef", "100")
            .unwrap();

        let signed = decode_broadcast(&transport.request(1).body.unwrap());
        assert_eq!(signed.transaction.receiver_id, INTENTS_CONTRACT_ID);
        let (call, args) = call_args(&signed.transaction.actions[0]);
        assert_eq!(call.method_name, "mt_transfer");
        assert_eq!(call.deposit, ONE_YOCTO);
        assert_eq!(call.gas, 30 * TGAS);
        assert_eq!(
            args,
            json!({"token_id": "nep141:wrap.near", "receiver_id": "deadbeef", "amount": "100"})
        );
    }

    #[test]
    fn deposit_near_rejects_overflowing_amount() {
        let transport = ScriptedTransport::new();

        let err = contract(&transport)
            .deposit_near("alice.near", &KeyPair::from_seed([1; 32]), u128::MAX)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(_)));
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn deposit_near_wraps_then_transfers() {
        let transport = ScriptedTransport::new();
        transport
            .push_json(access_key_response(7))
            .push_json(committed_response("TxHash"));

        contract(&transport)
            .deposit_near("alice.near", &KeyPair::from_seed([1; 32]), ONE_NEAR)
            .unwrap();

        let signed = decode_broadcast(&transport.request(1).body.unwrap());
        assert_eq!(signed.transaction.receiver_id, WRAP_NEAR_CONTRACT_ID);
        let actions = &signed.transaction.actions;
        assert_eq!(actions.len(), 2);

        let (wrap, _) = call_args(&actions[0]);
        assert_eq!(wrap.method_name, "near_deposit");
        assert_eq!(wrap.deposit, ONE_NEAR + 1_250_000_000_000_000_000_000);

        let (transfer, args) = call_args(&actions[1]);
        assert_eq!(transfer.method_name, "ft_transfer_call");
        assert_eq!(
            args,
            json!({"receiver_id": "intents.near", "amount": ONE_NEAR.to_string(), "msg": "alice.near"})
        );
    }
}
