//! JSON-RPC ledger client
//!
//! [`LedgerRpc`] is the port the gateway talks to; [`HttpRpcClient`] is its
//! `reqwest` adapter speaking JSON-RPC 2.0 over HTTPS. Each network switch
//! goes through an [`RpcConnector`] to build a fresh client.

use crate::{Error, Result};
use async_trait::async_trait;
use nebula_core::{Hash, Pubkey, Signature, TOKEN_PROGRAM_ID};
use nebula_params::Network;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Commitment level requested from the node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    /// Seen by the node
    Processed,
    /// Voted on by a supermajority
    #[default]
    Confirmed,
    /// Rooted
    Finalized,
}

impl Commitment {
    /// Wire name
    pub const fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Commitment used for reads and confirmations
    pub commitment: Commitment,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Whole-request timeout enforced by the HTTP client
    pub request_timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            commitment: Commitment::Confirmed,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Latest blockhash and the height after which it expires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestBlockhash {
    /// Blockhash to anchor new transactions to
    pub blockhash: Hash,
    /// Last block height at which the blockhash is accepted
    pub last_valid_block_height: u64,
}

/// SPL token account owned by a wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAccount {
    /// Token account address
    pub address: Pubkey,
    /// Mint
    pub mint: Pubkey,
    /// Balance in base units
    pub raw_amount: u64,
    /// Mint decimals
    pub decimals: u8,
}

/// Summary of an on-chain account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    /// Balance in lamports
    pub lamports: u64,
    /// Owning program
    pub owner: Pubkey,
    /// Size of the account data
    pub data_len: usize,
    /// Whether the account holds a program
    pub executable: bool,
}

/// Processing status of a submitted signature
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    /// Slot the transaction landed in
    pub slot: u64,
    /// Confirmations, `None` once rooted
    pub confirmations: Option<u64>,
    /// Execution error, if the transaction failed
    pub err: Option<Value>,
    /// `processed`, `confirmed` or `finalized`
    pub confirmation_status: Option<Commitment>,
}

impl SignatureStatus {
    /// Whether the status satisfies `commitment`
    pub fn satisfies(&self, commitment: Commitment) -> bool {
        match (self.confirmation_status, commitment) {
            (Some(Commitment::Finalized), _) => true,
            (Some(Commitment::Confirmed), Commitment::Confirmed | Commitment::Processed) => true,
            (Some(Commitment::Processed), Commitment::Processed) => true,
            // Older nodes omit the status but report rooted transactions with no confirmations
            (None, _) => self.confirmations.is_none(),
            _ => false,
        }
    }
}

/// Entry from `getSignaturesForAddress`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureInfo {
    /// Transaction signature
    pub signature: String,
    /// Slot
    pub slot: u64,
    /// Execution error
    pub err: Option<Value>,
    /// Unix timestamp of the block
    pub block_time: Option<i64>,
    /// Confirmation level
    pub confirmation_status: Option<Commitment>,
}

/// Fee and outcome of a confirmed transaction
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionMeta {
    /// Slot
    pub slot: u64,
    /// Unix timestamp of the block
    pub block_time: Option<i64>,
    /// Fee charged in lamports
    pub fee: u64,
    /// Execution error
    pub err: Option<Value>,
}

/// Result of `simulateTransaction`
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    /// Execution error
    pub err: Option<Value>,
    /// Program logs
    #[serde(default)]
    pub logs: Option<Vec<String>>,
    /// Compute units consumed
    pub units_consumed: Option<u64>,
}

/// Ledger RPC port
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Lamport balance
    async fn get_balance(&self, address: &Pubkey) -> Result<u64>;

    /// SPL token accounts owned by `owner`
    async fn get_token_accounts_by_owner(&self, owner: &Pubkey) -> Result<Vec<TokenAccount>>;

    /// Account summary, `None` when the account does not exist
    async fn get_account_info(&self, address: &Pubkey) -> Result<Option<AccountInfo>>;

    /// Latest blockhash
    async fn get_latest_blockhash(&self) -> Result<LatestBlockhash>;

    /// Fee the cluster would charge for a base64 message
    async fn get_fee_for_message(&self, message_base64: &str) -> Result<Option<u64>>;

    /// Submit a base64 transaction
    async fn send_transaction(&self, transaction_base64: &str) -> Result<Signature>;

    /// Statuses for `signatures`, in order
    async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<Option<SignatureStatus>>>;

    /// Current block height
    async fn get_block_height(&self) -> Result<u64>;

    /// Ask the faucet for `lamports`
    async fn request_airdrop(&self, address: &Pubkey, lamports: u64) -> Result<Signature>;

    /// Recent signatures involving `address`, newest first
    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>>;

    /// Confirmed transaction details, `None` if unknown
    async fn get_transaction(&self, signature: &str) -> Result<Option<TransactionMeta>>;

    /// Dry-run a base64 transaction
    async fn simulate_transaction(&self, transaction_base64: &str) -> Result<SimulationResult>;
}

/// Builds a client for a network profile
pub trait RpcConnector: Send + Sync {
    /// Client for `network`
    fn connect(&self, network: &Network) -> Result<Arc<dyn LedgerRpc>>;
}

/// Connector producing [`HttpRpcClient`]s
#[derive(Debug, Clone, Default)]
pub struct HttpConnector {
    config: RpcConfig,
}

impl HttpConnector {
    /// Connector using `config` for every client
    pub fn new(config: RpcConfig) -> Self {
        Self { config }
    }
}

impl RpcConnector for HttpConnector {
    fn connect(&self, network: &Network) -> Result<Arc<dyn LedgerRpc>> {
        Ok(Arc::new(HttpRpcClient::new(&network.rpc_url, self.config.clone())?))
    }
}

/// JSON-RPC 2.0 client over HTTP
#[derive(Debug)]
pub struct HttpRpcClient {
    client: reqwest::Client,
    endpoint: String,
    commitment: Commitment,
    next_id: AtomicU64,
}

#[derive(Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Value,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Deserialize)]
struct Contextual<T> {
    value: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcBlockhash {
    blockhash: String,
    last_valid_block_height: u64,
}

#[derive(Deserialize)]
struct RpcKeyedAccount {
    pubkey: String,
    account: RpcParsedAccount,
}

#[derive(Deserialize)]
struct RpcParsedAccount {
    data: RpcParsedData,
}

#[derive(Deserialize)]
struct RpcParsedData {
    parsed: RpcParsedToken,
}

#[derive(Deserialize)]
struct RpcParsedToken {
    info: RpcTokenInfo,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTokenInfo {
    mint: String,
    token_amount: RpcTokenAmount,
}

#[derive(Deserialize)]
struct RpcTokenAmount {
    amount: String,
    decimals: u8,
}

#[derive(Deserialize)]
struct RpcAccount {
    lamports: u64,
    owner: String,
    data: (String, String),
    executable: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcConfirmedTransaction {
    slot: u64,
    block_time: Option<i64>,
    meta: Option<RpcTransactionStatusMeta>,
}

#[derive(Deserialize)]
struct RpcTransactionStatusMeta {
    fee: u64,
    err: Option<Value>,
}

impl HttpRpcClient {
    /// Client for `endpoint`
    pub fn new(endpoint: &str, config: RpcConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            commitment: config.commitment,
            next_id: AtomicU64::new(1),
        })
    }

    /// Endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!("RPC {} #{} -> {}", method, id, self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let envelope: RpcEnvelope = response.json().await?;

        if let Some(error) = envelope.error {
            let message = match error.data.as_ref().and_then(extract_logs) {
                Some(logs) => format!("{} ({})", error.message, logs),
                None => error.message,
            };
            debug!("RPC {} #{} failed: {} {}", method, id, error.code, message);
            return Err(Error::Rpc {
                code: error.code,
                message,
            });
        }
        serde_json::from_value(envelope.result)
            .map_err(|e| Error::Decode(format!("{}: {}", method, e)))
    }

    fn commitment_config(&self) -> Value {
        json!({ "commitment": self.commitment.as_str() })
    }
}

fn extract_logs(data: &Value) -> Option<String> {
    let logs = data.get("logs")?.as_array()?;
    let last = logs.iter().rev().find_map(Value::as_str)?;
    Some(last.to_string())
}

fn parse_pubkey(text: &str) -> Result<Pubkey> {
    text.parse()
        .map_err(|_| Error::Decode(format!("invalid address in response: {}", text)))
}

fn parse_signature(text: &str) -> Result<Signature> {
    text.parse()
        .map_err(|_| Error::Decode(format!("invalid signature in response: {}", text)))
}

#[async_trait]
impl LedgerRpc for HttpRpcClient {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64> {
        let result: Contextual<u64> = self
            .call("getBalance", json!([address.to_string(), self.commitment_config()]))
            .await?;
        Ok(result.value)
    }

    async fn get_token_accounts_by_owner(&self, owner: &Pubkey) -> Result<Vec<TokenAccount>> {
        let result: Contextual<Vec<RpcKeyedAccount>> = self
            .call(
                "getTokenAccountsByOwner",
                json!([
                    owner.to_string(),
                    { "programId": TOKEN_PROGRAM_ID.to_string() },
                    { "encoding": "jsonParsed", "commitment": self.commitment.as_str() },
                ]),
            )
            .await?;

        result
            .value
            .into_iter()
            .map(|keyed| {
                let info = keyed.account.data.parsed.info;
                Ok(TokenAccount {
                    address: parse_pubkey(&keyed.pubkey)?,
                    mint: parse_pubkey(&info.mint)?,
                    raw_amount: info.token_amount.amount.parse().map_err(|_| {
                        Error::Decode(format!("invalid token amount {}", info.token_amount.amount))
                    })?,
                    decimals: info.token_amount.decimals,
                })
            })
            .collect()
    }

    async fn get_account_info(&self, address: &Pubkey) -> Result<Option<AccountInfo>> {
        let result: Contextual<Option<RpcAccount>> = self
            .call(
                "getAccountInfo",
                json!([
                    address.to_string(),
                    { "encoding": "base64", "commitment": self.commitment.as_str() },
                ]),
            )
            .await?;

        result
            .value
            .map(|account| {
                use base64::Engine;
                let data = base64::engine::general_purpose::STANDARD
                    .decode(&account.data.0)
                    .map_err(|e| Error::Decode(format!("account data: {}", e)))?;
                Ok(AccountInfo {
                    lamports: account.lamports,
                    owner: parse_pubkey(&account.owner)?,
                    data_len: data.len(),
                    executable: account.executable,
                })
            })
            .transpose()
    }

    async fn get_latest_blockhash(&self) -> Result<LatestBlockhash> {
        let result: Contextual<RpcBlockhash> = self
            .call("getLatestBlockhash", json!([self.commitment_config()]))
            .await?;
        Ok(LatestBlockhash {
            blockhash: result
                .value
                .blockhash
                .parse()
                .map_err(|_| Error::Decode(format!("invalid blockhash {}", result.value.blockhash)))?,
            last_valid_block_height: result.value.last_valid_block_height,
        })
    }

    async fn get_fee_for_message(&self, message_base64: &str) -> Result<Option<u64>> {
        let result: Contextual<Option<u64>> = self
            .call("getFeeForMessage", json!([message_base64, self.commitment_config()]))
            .await?;
        Ok(result.value)
    }

    async fn send_transaction(&self, transaction_base64: &str) -> Result<Signature> {
        let signature: String = self
            .call(
                "sendTransaction",
                json!([
                    transaction_base64,
                    {
                        "encoding": "base64",
                        "skipPreflight": false,
                        "preflightCommitment": self.commitment.as_str(),
                    },
                ]),
            )
            .await?;
        parse_signature(&signature)
    }

    async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<Option<SignatureStatus>>> {
        let encoded: Vec<String> = signatures.iter().map(ToString::to_string).collect();
        let result: Contextual<Vec<Option<SignatureStatus>>> = self
            .call(
                "getSignatureStatuses",
                json!([encoded, { "searchTransactionHistory": false }]),
            )
            .await?;
        Ok(result.value)
    }

    async fn get_block_height(&self) -> Result<u64> {
        self.call("getBlockHeight", json!([self.commitment_config()]))
            .await
    }

    async fn request_airdrop(&self, address: &Pubkey, lamports: u64) -> Result<Signature> {
        let signature: String = self
            .call(
                "requestAirdrop",
                json!([address.to_string(), lamports, self.commitment_config()]),
            )
            .await?;
        parse_signature(&signature)
    }

    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>> {
        self.call(
            "getSignaturesForAddress",
            json!([
                address.to_string(),
                { "limit": limit, "commitment": self.commitment.as_str() },
            ]),
        )
        .await
    }

    async fn get_transaction(&self, signature: &str) -> Result<Option<TransactionMeta>> {
        let result: Option<RpcConfirmedTransaction> = self
            .call(
                "getTransaction",
                json!([
                    signature,
                    {
                        "encoding": "json",
                        "maxSupportedTransactionVersion": 0,
                        "commitment": self.commitment.as_str(),
                    },
                ]),
            )
            .await?;
        Ok(result.and_then(|tx| {
            tx.meta.map(|meta| TransactionMeta {
                slot: tx.slot,
                block_time: tx.block_time,
                fee: meta.fee,
                err: meta.err,
            })
        }))
    }

    async fn simulate_transaction(&self, transaction_base64: &str) -> Result<SimulationResult> {
        let result: Contextual<SimulationResult> = self
            .call(
                "simulateTransaction",
                json!([
                    transaction_base64,
                    {
                        "encoding": "base64",
                        "sigVerify": true,
                        "commitment": self.commitment.as_str(),
                    },
                ]),
            )
            .await?;
        Ok(result.value)
    }
}
