//! Ledger gateway
//!
//! Balance queries, fee quotes and signed submissions against the active
//! network profile. Signing goes through a [`TransactionSigner`], normally
//! the session guard, whose public key is checked before anything touches
//! the network. Submissions are never retried here.

use crate::client::{Commitment, HttpConnector, LedgerRpc, RpcConfig, RpcConnector};
use chrono::{DateTime, TimeZone, Utc};
use nebula_core::instruction::{
    create_associated_token_account, set_compute_unit_price, system_transfer,
    token_transfer_checked,
};
use nebula_core::{
    associated_token_address, format_sol, format_ui_amount, parse_address, Error, FeeCalculator,
    Instruction, Message, Pubkey, Result, Signature, Transaction, TransactionSigner,
    DEFAULT_COMPUTE_UNIT_LIMIT,
};
use nebula_params::{LedgerParams, Network, MAX_TRANSACTION_SIZE};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bound on history page size
pub const MAX_HISTORY_LIMIT: usize = 1_000;

/// Gateway timings
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Limit for a single RPC round trip
    pub request_timeout: Duration,
    /// Limit for a submitted transaction to reach `confirmed`
    pub confirmation_timeout: Duration,
    /// Delay between status polls
    pub poll_interval: Duration,
    /// Default number of history entries
    pub history_limit: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            confirmation_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
            history_limit: 20,
        }
    }
}

impl GatewayConfig {
    /// HTTP client settings matching these timings
    pub fn rpc_config(&self) -> RpcConfig {
        RpcConfig {
            request_timeout: self.request_timeout,
            ..RpcConfig::default()
        }
    }
}

/// Token holding of a wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalance {
    /// Mint
    pub mint: Pubkey,
    /// Balance in base units
    pub raw_amount: u64,
    /// Mint decimals
    pub decimals: u8,
    /// Token account holding the balance
    pub token_account: Pubkey,
}

impl TokenBalance {
    /// Balance rendered with the mint's decimals
    pub fn ui_amount(&self) -> String {
        format_ui_amount(self.raw_amount, self.decimals)
    }
}

/// Native transfer request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Destination address (base58)
    pub to_address: String,
    /// Amount in lamports
    pub lamports: u64,
    /// Optional priority fee in micro-lamports per compute unit
    pub priority_fee_micro_lamports: Option<u64>,
}

/// Token transfer request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenTransferRequest {
    /// Destination wallet address (base58), not its token account
    pub to_address: String,
    /// Mint
    pub mint: Pubkey,
    /// Amount in base units
    pub amount: u64,
    /// Mint decimals
    pub decimals: u8,
}

/// Result of a dry run
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutcome {
    /// Whether the transaction would succeed
    pub success: bool,
    /// Execution error reported by the node
    pub error: Option<String>,
    /// Program logs
    pub logs: Vec<String>,
    /// Compute units consumed
    pub units_consumed: Option<u64>,
    /// Fee estimate in lamports
    pub fee: u64,
}

/// Entry of an account's transaction history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    /// Transaction signature
    pub signature: String,
    /// Slot
    pub slot: u64,
    /// Block time
    pub timestamp: Option<DateTime<Utc>>,
    /// Whether the transaction succeeded
    pub success: bool,
    /// Fee paid, when the transaction could be fetched
    pub fee: Option<u64>,
}

struct Connection {
    params: LedgerParams,
    rpc: Arc<dyn LedgerRpc>,
}

/// Ledger gateway
pub struct LedgerGateway {
    connector: Arc<dyn RpcConnector>,
    connection: RwLock<Connection>,
    epoch: AtomicU64,
    balances: Mutex<HashMap<Pubkey, u64>>,
    config: GatewayConfig,
    fees: FeeCalculator,
}

impl LedgerGateway {
    /// Gateway for `network` using `connector` to build RPC clients
    pub fn new(
        network: Network,
        connector: Arc<dyn RpcConnector>,
        config: GatewayConfig,
    ) -> Result<Self> {
        let rpc = connector.connect(&network)?;
        info!("Ledger gateway on {} ({})", network.name, network.rpc_url);
        Ok(Self {
            connector,
            connection: RwLock::new(Connection {
                params: params_for(network),
                rpc,
            }),
            epoch: AtomicU64::new(0),
            balances: Mutex::new(HashMap::new()),
            config,
            fees: FeeCalculator::new(),
        })
    }

    /// Gateway speaking JSON-RPC over HTTP
    pub fn connect_http(network: Network, config: GatewayConfig) -> Result<Self> {
        let connector = Arc::new(HttpConnector::new(config.rpc_config()));
        Self::new(network, connector, config)
    }

    /// Active network profile
    pub fn network(&self) -> Network {
        self.connection.read().params.network.clone()
    }

    /// Ledger parameters of the active network
    pub fn ledger_params(&self) -> LedgerParams {
        self.connection.read().params.clone()
    }

    /// Gateway timings
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Switch network profile. Cached balances are dropped.
    pub fn set_network(&self, network: Network) -> Result<()> {
        let rpc = self.connector.connect(&network)?;
        info!("Switching ledger gateway to {}", network.name);
        {
            let mut connection = self.connection.write();
            connection.params = params_for(network);
            connection.rpc = rpc;
        }
        let mut balances = self.balances.lock();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        balances.clear();
        Ok(())
    }

    /// Run `fut` with a caller-supplied time limit
    pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| Error::Timeout(format!("operation exceeded {:?}", limit)))?
    }

    /// Lamport balance of `address`
    pub async fn get_balance(&self, address: &Pubkey) -> Result<u64> {
        let (rpc, epoch) = self.snapshot();
        let lamports = self.request("getBalance", rpc.get_balance(address)).await?;
        self.remember_balance(epoch, address, lamports);
        debug!("Balance of {}: {} SOL", address, format_sol(lamports));
        Ok(lamports)
    }

    /// Last balance fetched for `address` on the current network
    pub fn cached_balance(&self, address: &Pubkey) -> Option<u64> {
        self.balances.lock().get(address).copied()
    }

    /// Token holdings of `owner`
    pub async fn get_token_balances(&self, owner: &Pubkey) -> Result<Vec<TokenBalance>> {
        let (rpc, _) = self.snapshot();
        let accounts = self
            .request("getTokenAccountsByOwner", rpc.get_token_accounts_by_owner(owner))
            .await?;
        Ok(accounts
            .into_iter()
            .map(|account| TokenBalance {
                mint: account.mint,
                raw_amount: account.raw_amount,
                decimals: account.decimals,
                token_account: account.address,
            })
            .collect())
    }

    /// Whether `address` exists on chain
    pub async fn account_exists(&self, address: &Pubkey) -> Result<bool> {
        let (rpc, _) = self.snapshot();
        let info = self
            .request("getAccountInfo", rpc.get_account_info(address))
            .await?;
        Ok(info.is_some())
    }

    /// Fee for `instructions` paid by `payer`; falls back to a fixed quote
    pub async fn estimate_fee(&self, instructions: &[Instruction], payer: &Pubkey) -> u64 {
        match self.quote_fee(instructions, payer).await {
            Ok(fee) => fee,
            Err(e) => {
                let params = self.ledger_params();
                let fallback = self
                    .fees
                    .fallback_fee()
                    .max(params.base_fee(count_signers(instructions, payer)));
                warn!("Fee quote failed ({}), assuming {} lamports", e, fallback);
                fallback
            }
        }
    }

    /// Fee estimate for a native transfer, priority surcharge included
    pub async fn estimate_transfer_fee(
        &self,
        from: &Pubkey,
        request: &TransferRequest,
    ) -> Result<u64> {
        let to = parse_address(&request.to_address)?;
        let priority = request.priority_fee_micro_lamports.unwrap_or(0);
        self.fees.validate_priority_fee(priority)?;
        let base = self
            .estimate_fee(&[system_transfer(from, &to, request.lamports)], from)
            .await;
        let surcharge = self
            .fees
            .priority_fee_lamports(priority, DEFAULT_COMPUTE_UNIT_LIMIT);
        self.fees.required_balance(base, surcharge)
    }

    /// Sign and submit a native transfer, then wait for confirmation
    pub async fn send_transfer(
        &self,
        signer: &dyn TransactionSigner,
        request: &TransferRequest,
    ) -> Result<Signature> {
        let from = signer.public_key()?;
        let instructions = self.transfer_instructions(&from, request)?;

        let balance = self.known_balance(&from).await?;
        if request.lamports > balance {
            return Err(Error::InsufficientFunds(format!(
                "balance is {} SOL, transfer needs {} SOL",
                format_sol(balance),
                format_sol(request.lamports)
            )));
        }

        info!(
            "Sending {} SOL from {} to {}",
            format_sol(request.lamports),
            from,
            request.to_address
        );
        // The transaction may have landed even when confirmation did not succeed
        let outcome = self.submit(signer, &from, &instructions).await;
        self.forget_balance(&from);
        outcome
    }

    /// Sign and submit a token transfer, creating the recipient's token
    /// account in the same transaction when needed
    pub async fn send_token_transfer(
        &self,
        signer: &dyn TransactionSigner,
        request: &TokenTransferRequest,
    ) -> Result<Signature> {
        let owner = signer.public_key()?;
        if request.amount == 0 {
            return Err(Error::InvalidAmount("amount must be greater than zero".to_string()));
        }
        let recipient = parse_address(&request.to_address)?;
        let source = associated_token_address(&owner, &request.mint)?;
        let destination = associated_token_address(&recipient, &request.mint)?;

        let (rpc, _) = self.snapshot();
        let holdings = self
            .request("getTokenAccountsByOwner", rpc.get_token_accounts_by_owner(&owner))
            .await?;
        let holding = holdings
            .iter()
            .find(|account| account.address == source)
            .ok_or_else(|| {
                Error::InsufficientFunds(format!("no token account for mint {}", request.mint))
            })?;
        if holding.decimals != request.decimals {
            return Err(Error::InvalidAmount(format!(
                "mint {} has {} decimals, request uses {}",
                request.mint, holding.decimals, request.decimals
            )));
        }
        if holding.raw_amount < request.amount {
            return Err(Error::InsufficientFunds(format!(
                "token balance is {}, transfer needs {}",
                format_ui_amount(holding.raw_amount, holding.decimals),
                format_ui_amount(request.amount, request.decimals)
            )));
        }

        let mut instructions = Vec::with_capacity(2);
        let exists = self
            .request("getAccountInfo", rpc.get_account_info(&destination))
            .await?
            .is_some();
        if !exists {
            debug!("Creating token account {} for {}", destination, recipient);
            instructions.push(create_associated_token_account(
                &owner,
                &destination,
                &recipient,
                &request.mint,
            ));
        }
        instructions.push(token_transfer_checked(
            &source,
            &request.mint,
            &destination,
            &owner,
            request.amount,
            request.decimals,
        ));

        info!(
            "Sending {} of mint {} from {} to {}",
            format_ui_amount(request.amount, request.decimals),
            request.mint,
            owner,
            recipient
        );
        // The transaction may have landed even when confirmation did not succeed
        let outcome = self.submit(signer, &owner, &instructions).await;
        self.forget_balance(&owner);
        outcome
    }

    /// Faucet funds on non-production networks
    pub async fn request_airdrop(&self, address: &Pubkey, lamports: u64) -> Result<Signature> {
        let network = self.network();
        if !network.allows_airdrop() {
            return Err(Error::NotSupportedOnMainnet(format!(
                "airdrops are not available on {}",
                network.name
            )));
        }
        if lamports == 0 {
            return Err(Error::InvalidAmount("amount must be greater than zero".to_string()));
        }

        let (rpc, _) = self.snapshot();
        let signature = self
            .request("requestAirdrop", rpc.request_airdrop(address, lamports))
            .await?;
        info!(
            "Airdrop of {} SOL to {} on {}: {}",
            format_sol(lamports),
            address,
            network.name,
            signature
        );
        let confirmed = self.confirm(rpc.as_ref(), &signature, None).await;
        self.forget_balance(address);
        confirmed.map(|()| signature)
    }

    /// Detached signature over `message`
    pub fn sign_message(&self, message: &[u8], signer: &dyn TransactionSigner) -> Result<Signature> {
        signer.sign_message(message)
    }

    /// Recent transactions involving `address`, newest first
    pub async fn get_transaction_history(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        let (rpc, _) = self.snapshot();
        let entries = self
            .request(
                "getSignaturesForAddress",
                rpc.get_signatures_for_address(address, limit),
            )
            .await?;

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            let fee = match self
                .request("getTransaction", rpc.get_transaction(&entry.signature))
                .await
            {
                Ok(meta) => meta.map(|m| m.fee),
                Err(e) => {
                    debug!("No details for {}: {}", entry.signature, e);
                    None
                }
            };
            records.push(TransactionRecord {
                timestamp: entry
                    .block_time
                    .and_then(|t| Utc.timestamp_opt(t, 0).single()),
                success: entry.err.is_none(),
                signature: entry.signature,
                slot: entry.slot,
                fee,
            });
        }
        Ok(records)
    }

    /// Sign a native transfer and run it through the node without submitting
    pub async fn simulate_transfer(
        &self,
        signer: &dyn TransactionSigner,
        request: &TransferRequest,
    ) -> Result<SimulationOutcome> {
        let from = signer.public_key()?;
        let instructions = self.transfer_instructions(&from, request)?;
        let (rpc, _) = self.snapshot();
        let (transaction, _) = self.build_signed(rpc.as_ref(), signer, &from, &instructions).await?;

        let fee = self.estimate_fee(&instructions, &from).await;
        let result = self
            .request(
                "simulateTransaction",
                rpc.simulate_transaction(&transaction.to_base64()),
            )
            .await?;
        Ok(SimulationOutcome {
            success: result.err.is_none(),
            error: result.err.map(|e| e.to_string()),
            logs: result.logs.unwrap_or_default(),
            units_consumed: result.units_consumed,
            fee,
        })
    }

    fn transfer_instructions(
        &self,
        from: &Pubkey,
        request: &TransferRequest,
    ) -> Result<Vec<Instruction>> {
        if request.lamports == 0 {
            return Err(Error::InvalidAmount("amount must be greater than zero".to_string()));
        }
        let to = parse_address(&request.to_address)?;
        let priority = request.priority_fee_micro_lamports.unwrap_or(0);
        self.fees.validate_priority_fee(priority)?;

        let mut instructions = Vec::with_capacity(2);
        if priority > 0 {
            instructions.push(set_compute_unit_price(priority));
        }
        instructions.push(system_transfer(from, &to, request.lamports));
        Ok(instructions)
    }

    async fn known_balance(&self, address: &Pubkey) -> Result<u64> {
        match self.cached_balance(address) {
            Some(lamports) => Ok(lamports),
            None => self.get_balance(address).await,
        }
    }

    async fn quote_fee(&self, instructions: &[Instruction], payer: &Pubkey) -> Result<u64> {
        let (rpc, _) = self.snapshot();
        let latest = self
            .request("getLatestBlockhash", rpc.get_latest_blockhash())
            .await?;
        let message = Message::new(instructions, payer, latest.blockhash)?;
        let fee = self
            .request(
                "getFeeForMessage",
                rpc.get_fee_for_message(&message.to_base64()),
            )
            .await?;
        fee.ok_or_else(|| Error::Network("node returned no fee for message".to_string()))
    }

    async fn build_signed(
        &self,
        rpc: &dyn LedgerRpc,
        signer: &dyn TransactionSigner,
        payer: &Pubkey,
        instructions: &[Instruction],
    ) -> Result<(Transaction, u64)> {
        let latest = self
            .request("getLatestBlockhash", rpc.get_latest_blockhash())
            .await?;
        let message = Message::new(instructions, payer, latest.blockhash)?;
        let mut transaction = Transaction::new_unsigned(message);
        transaction.sign(&[signer])?;

        let size = transaction.serialize().len();
        if size > MAX_TRANSACTION_SIZE {
            return Err(Error::TransactionFailed(format!(
                "transaction is {} bytes, limit is {}",
                size, MAX_TRANSACTION_SIZE
            )));
        }
        Ok((transaction, latest.last_valid_block_height))
    }

    async fn submit(
        &self,
        signer: &dyn TransactionSigner,
        payer: &Pubkey,
        instructions: &[Instruction],
    ) -> Result<Signature> {
        let (rpc, _) = self.snapshot();
        let (transaction, last_valid) = self
            .build_signed(rpc.as_ref(), signer, payer, instructions)
            .await?;

        let sent = tokio::time::timeout(
            self.config.request_timeout,
            rpc.send_transaction(&transaction.to_base64()),
        )
        .await
        .map_err(|_| {
            Error::Timeout(format!(
                "sendTransaction exceeded {:?}",
                self.config.request_timeout
            ))
        })?;
        let signature = sent.map_err(|e| match e {
            crate::Error::Rpc { message, .. } => Error::TransactionFailed(message),
            other => other.into(),
        })?;

        info!("Submitted transaction {}", signature);
        self.confirm(rpc.as_ref(), &signature, Some(last_valid)).await?;
        info!("Transaction {} confirmed", signature);
        Ok(signature)
    }

    async fn confirm(
        &self,
        rpc: &dyn LedgerRpc,
        signature: &Signature,
        last_valid_block_height: Option<u64>,
    ) -> Result<()> {
        let deadline = tokio::time::Instant::now() + self.config.confirmation_timeout;
        loop {
            match self
                .request("getSignatureStatuses", rpc.get_signature_statuses(&[*signature]))
                .await
            {
                Ok(statuses) => {
                    if let Some(status) = statuses.into_iter().next().flatten() {
                        if let Some(err) = status.err {
                            return Err(Error::TransactionFailed(format!(
                                "{} failed: {}",
                                signature, err
                            )));
                        }
                        if status.satisfies(Commitment::Confirmed) {
                            return Ok(());
                        }
                    }
                }
                Err(e) => warn!("Status poll for {} failed: {}", signature, e),
            }

            if let Some(last_valid) = last_valid_block_height {
                match self.request("getBlockHeight", rpc.get_block_height()).await {
                    Ok(height) if height > last_valid => {
                        return Err(Error::TransactionFailed(format!(
                            "blockhash expired before {} was confirmed",
                            signature
                        )));
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Block height poll failed: {}", e),
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(Error::Timeout(format!(
                    "{} not confirmed within {:?}",
                    signature, self.config.confirmation_timeout
                )));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn request<T, F>(&self, method: &str, fut: F) -> Result<T>
    where
        F: Future<Output = crate::Result<T>>,
    {
        match tokio::time::timeout(self.config.request_timeout, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(Error::Timeout(format!(
                "{} exceeded {:?}",
                method, self.config.request_timeout
            ))),
        }
    }

    fn snapshot(&self) -> (Arc<dyn LedgerRpc>, u64) {
        let connection = self.connection.read();
        (Arc::clone(&connection.rpc), self.epoch.load(Ordering::SeqCst))
    }

    fn remember_balance(&self, epoch: u64, address: &Pubkey, lamports: u64) {
        let mut balances = self.balances.lock();
        // A network switch since the request started makes the answer stale
        if self.epoch.load(Ordering::SeqCst) == epoch {
            balances.insert(*address, lamports);
        }
    }

    fn forget_balance(&self, address: &Pubkey) {
        self.balances.lock().remove(address);
    }
}

impl std::fmt::Debug for LedgerGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerGateway")
            .field("network", &self.connection.read().params.network.name)
            .field("config", &self.config)
            .finish()
    }
}

fn params_for(network: Network) -> LedgerParams {
    let network_type = network.network_type;
    LedgerParams {
        network,
        ..LedgerParams::from_network(network_type)
    }
}

fn count_signers(instructions: &[Instruction], payer: &Pubkey) -> u64 {
    let mut signers = BTreeSet::new();
    signers.insert(*payer);
    for meta in instructions.iter().flat_map(|ix| ix.accounts.iter()) {
        if meta.is_signer {
            signers.insert(meta.pubkey);
        }
    }
    signers.len() as u64
}
