//! Scripted in-process ledger for tests
//!
//! [`MockLedgerRpc`] answers every [`LedgerRpc`] call from state set up by
//! the test and records which methods were called, so tests can assert that
//! a refused operation never reached the network.

use crate::client::{
    AccountInfo, LatestBlockhash, LedgerRpc, RpcConnector, SignatureInfo, SignatureStatus,
    SimulationResult, TokenAccount, TransactionMeta, Commitment,
};
use crate::{Error, Result};
use async_trait::async_trait;
use base64::Engine;
use nebula_core::{Hash, Pubkey, Signature, SYSTEM_PROGRAM_ID};
use nebula_params::{Network, NetworkType};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// How submitted transactions resolve
#[derive(Debug, Clone, PartialEq)]
pub enum MockOutcome {
    /// Reported as confirmed on the first poll
    Confirmed,
    /// Landed with an execution error
    Failed(Value),
    /// Never shows up
    Pending,
}

#[derive(Debug)]
struct MockState {
    balances: HashMap<Pubkey, u64>,
    token_accounts: HashMap<Pubkey, Vec<TokenAccount>>,
    existing_accounts: HashSet<Pubkey>,
    fee_quote: Option<u64>,
    fail_fee_quote: bool,
    blockhash: Hash,
    block_height: u64,
    last_valid_block_height: u64,
    send_error: Option<(i64, String)>,
    outcome: MockOutcome,
    simulation: SimulationResult,
    delay: Option<Duration>,
    offline: bool,
    history: Vec<(SignatureInfo, Option<TransactionMeta>)>,
    calls: Vec<&'static str>,
    sent: Vec<String>,
    airdrops: Vec<(Pubkey, u64)>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            balances: HashMap::new(),
            token_accounts: HashMap::new(),
            existing_accounts: HashSet::new(),
            fee_quote: Some(5_000),
            fail_fee_quote: false,
            blockhash: Hash::new_from_array([7u8; 32]),
            block_height: 100,
            last_valid_block_height: 250,
            send_error: None,
            outcome: MockOutcome::Confirmed,
            simulation: SimulationResult::default(),
            delay: None,
            offline: false,
            history: Vec::new(),
            calls: Vec::new(),
            sent: Vec::new(),
            airdrops: Vec::new(),
        }
    }
}

/// Fake ledger
#[derive(Debug, Default)]
pub struct MockLedgerRpc {
    state: Mutex<MockState>,
}

impl MockLedgerRpc {
    /// Empty ledger that confirms everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the lamport balance of `address`; it also starts to exist
    pub fn set_balance(&self, address: Pubkey, lamports: u64) {
        let mut state = self.state.lock();
        state.balances.insert(address, lamports);
        state.existing_accounts.insert(address);
    }

    /// Give `owner` a token account
    pub fn add_token_account(&self, owner: Pubkey, account: TokenAccount) {
        let mut state = self.state.lock();
        state.existing_accounts.insert(account.address);
        state.token_accounts.entry(owner).or_default().push(account);
    }

    /// Mark `address` as an existing account
    pub fn add_existing_account(&self, address: Pubkey) {
        self.state.lock().existing_accounts.insert(address);
    }

    /// Fee returned by `getFeeForMessage` (`None` = null result)
    pub fn set_fee_quote(&self, fee: Option<u64>) {
        self.state.lock().fee_quote = fee;
    }

    /// Make `getFeeForMessage` fail
    pub fn fail_fee_quote(&self) {
        self.state.lock().fail_fee_quote = true;
    }

    /// Reject the next submissions with a node error
    pub fn reject_sends(&self, code: i64, message: &str) {
        self.state.lock().send_error = Some((code, message.to_string()));
    }

    /// How submitted transactions resolve
    pub fn set_outcome(&self, outcome: MockOutcome) {
        self.state.lock().outcome = outcome;
    }

    /// Current block height and blockhash expiry
    pub fn set_block_heights(&self, current: u64, last_valid: u64) {
        let mut state = self.state.lock();
        state.block_height = current;
        state.last_valid_block_height = last_valid;
    }

    /// Result returned by `simulateTransaction`
    pub fn set_simulation(&self, result: SimulationResult) {
        self.state.lock().simulation = result;
    }

    /// Delay every answer
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().delay = Some(delay);
    }

    /// Fail every call with a transport error
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Add a history entry for `getSignaturesForAddress`
    pub fn push_history(&self, info: SignatureInfo, meta: Option<TransactionMeta>) {
        self.state.lock().history.push((info, meta));
    }

    /// Methods called so far, in order
    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().calls.clone()
    }

    /// Number of calls to `method`
    pub fn call_count(&self, method: &str) -> usize {
        self.state.lock().calls.iter().filter(|m| **m == method).count()
    }

    /// Base64 transactions accepted by `sendTransaction`
    pub fn sent_transactions(&self) -> Vec<String> {
        self.state.lock().sent.clone()
    }

    /// Airdrops granted
    pub fn airdrops(&self) -> Vec<(Pubkey, u64)> {
        self.state.lock().airdrops.clone()
    }

    fn enter(&self, method: &'static str) -> Result<Option<Duration>> {
        let mut state = self.state.lock();
        state.calls.push(method);
        if state.offline {
            return Err(Error::Transport(format!("{}: connection refused", method)));
        }
        Ok(state.delay)
    }

    async fn begin(&self, method: &'static str) -> Result<()> {
        if let Some(delay) = self.enter(method)? {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

fn first_signature(transaction_base64: &str) -> Result<Signature> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(transaction_base64)
        .map_err(|e| Error::Decode(e.to_string()))?;
    // Signature count is a single compact-u16 byte for the transactions built here
    let raw = bytes
        .get(1..65)
        .ok_or_else(|| Error::Decode("transaction too short".to_string()))?;
    let mut signature = [0u8; 64];
    signature.copy_from_slice(raw);
    Ok(Signature::from_bytes(signature))
}

#[async_trait]
impl LedgerRpc for MockLedgerRpc {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64> {
        self.begin("getBalance").await?;
        Ok(self.state.lock().balances.get(address).copied().unwrap_or(0))
    }

    async fn get_token_accounts_by_owner(&self, owner: &Pubkey) -> Result<Vec<TokenAccount>> {
        self.begin("getTokenAccountsByOwner").await?;
        Ok(self
            .state
            .lock()
            .token_accounts
            .get(owner)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_account_info(&self, address: &Pubkey) -> Result<Option<AccountInfo>> {
        self.begin("getAccountInfo").await?;
        let state = self.state.lock();
        if !state.existing_accounts.contains(address) {
            return Ok(None);
        }
        Ok(Some(AccountInfo {
            lamports: state.balances.get(address).copied().unwrap_or(0),
            owner: SYSTEM_PROGRAM_ID,
            data_len: 0,
            executable: false,
        }))
    }

    async fn get_latest_blockhash(&self) -> Result<LatestBlockhash> {
        self.begin("getLatestBlockhash").await?;
        let state = self.state.lock();
        Ok(LatestBlockhash {
            blockhash: state.blockhash,
            last_valid_block_height: state.last_valid_block_height,
        })
    }

    async fn get_fee_for_message(&self, _message_base64: &str) -> Result<Option<u64>> {
        self.begin("getFeeForMessage").await?;
        let state = self.state.lock();
        if state.fail_fee_quote {
            return Err(Error::Rpc {
                code: -32602,
                message: "invalid message".to_string(),
            });
        }
        Ok(state.fee_quote)
    }

    async fn send_transaction(&self, transaction_base64: &str) -> Result<Signature> {
        self.begin("sendTransaction").await?;
        let mut state = self.state.lock();
        if let Some((code, message)) = state.send_error.clone() {
            return Err(Error::Rpc { code, message });
        }
        let signature = first_signature(transaction_base64)?;
        state.sent.push(transaction_base64.to_string());
        Ok(signature)
    }

    async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<Option<SignatureStatus>>> {
        self.begin("getSignatureStatuses").await?;
        let state = self.state.lock();
        let status = match &state.outcome {
            MockOutcome::Confirmed => Some(SignatureStatus {
                slot: state.block_height,
                confirmations: Some(1),
                err: None,
                confirmation_status: Some(Commitment::Confirmed),
            }),
            MockOutcome::Failed(err) => Some(SignatureStatus {
                slot: state.block_height,
                confirmations: Some(1),
                err: Some(err.clone()),
                confirmation_status: Some(Commitment::Confirmed),
            }),
            MockOutcome::Pending => None,
        };
        Ok(vec![status; signatures.len()])
    }

    async fn get_block_height(&self) -> Result<u64> {
        self.begin("getBlockHeight").await?;
        Ok(self.state.lock().block_height)
    }

    async fn request_airdrop(&self, address: &Pubkey, lamports: u64) -> Result<Signature> {
        self.begin("requestAirdrop").await?;
        let mut state = self.state.lock();
        state.airdrops.push((*address, lamports));
        *state.balances.entry(*address).or_insert(0) += lamports;
        state.existing_accounts.insert(*address);
        let mut signature = [0u8; 64];
        signature[..32].copy_from_slice(address.as_bytes());
        signature[32..40].copy_from_slice(&lamports.to_le_bytes());
        Ok(Signature::from_bytes(signature))
    }

    async fn get_signatures_for_address(
        &self,
        _address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>> {
        self.begin("getSignaturesForAddress").await?;
        Ok(self
            .state
            .lock()
            .history
            .iter()
            .take(limit)
            .map(|(info, _)| info.clone())
            .collect())
    }

    async fn get_transaction(&self, signature: &str) -> Result<Option<TransactionMeta>> {
        self.begin("getTransaction").await?;
        Ok(self
            .state
            .lock()
            .history
            .iter()
            .find(|(info, _)| info.signature == signature)
            .and_then(|(_, meta)| meta.clone()))
    }

    async fn simulate_transaction(&self, _transaction_base64: &str) -> Result<SimulationResult> {
        self.begin("simulateTransaction").await?;
        Ok(self.state.lock().simulation.clone())
    }
}

/// Connector handing out one shared [`MockLedgerRpc`]
#[derive(Debug, Default)]
pub struct MockConnector {
    rpc: Arc<MockLedgerRpc>,
    connected: Mutex<Vec<NetworkType>>,
}

impl MockConnector {
    /// Connector around `rpc`
    pub fn new(rpc: Arc<MockLedgerRpc>) -> Self {
        Self {
            rpc,
            connected: Mutex::new(Vec::new()),
        }
    }

    /// The shared fake
    pub fn rpc(&self) -> Arc<MockLedgerRpc> {
        Arc::clone(&self.rpc)
    }

    /// Networks connected to, in order
    pub fn connected(&self) -> Vec<NetworkType> {
        self.connected.lock().clone()
    }
}

impl RpcConnector for MockConnector {
    fn connect(&self, network: &Network) -> Result<Arc<dyn LedgerRpc>> {
        self.connected.lock().push(network.network_type);
        let rpc: Arc<dyn LedgerRpc> = self.rpc.clone();
        Ok(rpc)
    }
}
