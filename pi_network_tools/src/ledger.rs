use std::sync::Arc;

use ed25519_dalek::{Signer, SigningKey};
use log::*;
use pmg_common::{MicroPi, Secret};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::LedgerError;

/// Flat per-transaction fee charged by the ledger, in µπ.
const TRANSFER_FEE: i64 = 100;

/// Builds, signs and submits transfer transactions against the network ledger.
///
/// The signing key is derived from the app's custodial wallet seed; it never leaves the server.
#[derive(Clone)]
pub struct LedgerClient {
    url: String,
    signing_key: SigningKey,
    client: Arc<Client>,
}

/// The canonical transaction payload. The signature is computed over the JSON serialization of
/// this struct, so the field order here is part of the wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TransferTx {
    source: String,
    destination: String,
    amount: i64,
    fee: i64,
    sequence: u64,
    memo: String,
}

#[derive(Debug, Serialize)]
struct SignedEnvelope {
    tx: TransferTx,
    public_key: String,
    signature: String,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    sequence: u64,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

impl LedgerClient {
    pub fn new(url: &str, seed: &Secret<String>) -> Result<Self, LedgerError> {
        if seed.is_unset() {
            return Err(LedgerError::MissingSeed);
        }
        let bytes = hex::decode(seed.reveal()).map_err(|e| LedgerError::InvalidSeed(e.to_string()))?;
        let bytes: [u8; 32] =
            bytes.try_into().map_err(|_| LedgerError::InvalidSeed("seed must be 32 bytes".to_string()))?;
        let signing_key = SigningKey::from_bytes(&bytes);
        Ok(Self { url: url.trim_end_matches('/').to_string(), signing_key, client: Arc::new(Client::new()) })
    }

    /// The ledger account id of the custodial wallet (the hex-encoded public key).
    pub fn account_id(&self) -> String {
        hex::encode(self.signing_key.verifying_key().as_bytes())
    }

    async fn sequence_for(&self, account: &str) -> Result<u64, LedgerError> {
        let url = format!("{}/accounts/{account}", self.url);
        let response = self.client.get(url).send().await.map_err(|e| LedgerError::SubmissionError(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(LedgerError::TransactionRejected { status, message });
        }
        let info = response.json::<AccountInfo>().await.map_err(|e| LedgerError::JsonError(e.to_string()))?;
        Ok(info.sequence)
    }

    fn signed_envelope(&self, tx: TransferTx) -> Result<SignedEnvelope, LedgerError> {
        let payload = serde_json::to_vec(&tx).map_err(|e| LedgerError::JsonError(e.to_string()))?;
        let signature = self.signing_key.sign(&payload);
        Ok(SignedEnvelope { tx, public_key: self.account_id(), signature: hex::encode(signature.to_bytes()) })
    }

    /// Transfers `amount` from the custodial wallet to `destination`, returning the transaction id
    /// assigned by the ledger. The memo carries the platform payment identifier so the transfer
    /// can be reconciled later.
    pub async fn submit_transfer(
        &self,
        destination: &str,
        amount: MicroPi,
        memo: &str,
    ) -> Result<String, LedgerError> {
        let source = self.account_id();
        let sequence = self.sequence_for(&source).await? + 1;
        let tx = TransferTx {
            source,
            destination: destination.to_string(),
            amount: amount.value(),
            fee: TRANSFER_FEE,
            sequence,
            memo: memo.to_string(),
        };
        debug!("🔏️ Submitting transfer of {amount} to {destination} (seq {sequence})");
        let envelope = self.signed_envelope(tx)?;
        let url = format!("{}/transactions", self.url);
        let response = self
            .client
            .post(url)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| LedgerError::SubmissionError(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(LedgerError::TransactionRejected { status, message });
        }
        let result = response.json::<SubmitResponse>().await.map_err(|e| LedgerError::JsonError(e.to_string()))?;
        info!("🔏️ Transfer submitted. txid {}", result.id);
        Ok(result.id)
    }
}

#[cfg(test)]
mod test {
    use ed25519_dalek::{Verifier, VerifyingKey};

    use super::*;

    fn test_client() -> LedgerClient {
        let seed = Secret::new("9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60".to_string());
        LedgerClient::new("http://localhost:8100", &seed).unwrap()
    }

    #[test]
    fn rejects_bad_seeds() {
        assert!(matches!(LedgerClient::new("http://x", &Secret::default()), Err(LedgerError::MissingSeed)));
        let short = Secret::new("abcdef".to_string());
        assert!(matches!(LedgerClient::new("http://x", &short), Err(LedgerError::InvalidSeed(_))));
        let not_hex = Secret::new("z".repeat(64));
        assert!(matches!(LedgerClient::new("http://x", &not_hex), Err(LedgerError::InvalidSeed(_))));
    }

    #[test]
    fn signature_verifies_against_canonical_payload() {
        let client = test_client();
        let tx = TransferTx {
            source: client.account_id(),
            destination: "d7558a2f".to_string(),
            amount: 9_500_000,
            fee: TRANSFER_FEE,
            sequence: 42,
            memo: "payment_abc123".to_string(),
        };
        let envelope = client.signed_envelope(tx.clone()).unwrap();
        let payload = serde_json::to_vec(&tx).unwrap();
        let pk_bytes: [u8; 32] = hex::decode(&envelope.public_key).unwrap().try_into().unwrap();
        let pk = VerifyingKey::from_bytes(&pk_bytes).unwrap();
        let sig_bytes: [u8; 64] = hex::decode(&envelope.signature).unwrap().try_into().unwrap();
        let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes);
        assert!(pk.verify(&payload, &sig).is_ok());
    }
}
