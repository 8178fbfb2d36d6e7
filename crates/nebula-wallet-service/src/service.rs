//! Wallet service facade
//!
//! Owns the mnemonic codec, the vault, the session and the ledger gateway
//! for one user. Operations that derive a key from a password run on the
//! blocking pool. Every signing flow holds the session's signing permit from
//! the lock check to confirmation.

use crate::config::ServiceConfig;
use crate::models::{CreatedWallet, NativeTransfer, TokenTransfer, TransferReceipt};
use nebula_core::{
    parse_address, parse_sol, parse_ui_amount, Error, Mnemonic, MnemonicCodec, MnemonicStrength,
    OsRandom, Pubkey, RandomSource, Result, Signature, SigningKeypair, TransactionSigner,
};
use nebula_core::random::random_array;
use nebula_params::{Network, NetworkType};
use nebula_rpc::{
    HttpConnector, LedgerGateway, RpcConnector, TokenBalance, TokenTransferRequest,
    TransactionRecord, TransferRequest,
};
use nebula_vault::{
    JsonFileVaultRepository, SecretCipher, SessionGuard, SessionStatus, VaultCipher,
    VaultEntrySummary, VaultRepository, WalletVaultStore,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Wallet service
pub struct WalletService {
    config: ServiceConfig,
    codec: MnemonicCodec,
    rng: Arc<dyn RandomSource>,
    store: Arc<WalletVaultStore>,
    session: SessionGuard,
    gateway: LedgerGateway,
}

impl WalletService {
    /// Service over the JSON vault in `config.data_dir`, talking JSON-RPC over HTTP
    pub fn open(config: ServiceConfig) -> Result<Self> {
        config.validate()?;
        let rng: Arc<dyn RandomSource> = Arc::new(OsRandom);
        let repository = Arc::new(JsonFileVaultRepository::in_dir(&config.data_dir));
        let cipher = Arc::new(VaultCipher::with_iterations(
            Arc::clone(&rng),
            config.pbkdf2_iterations,
        )?);
        let connector = Arc::new(HttpConnector::new(config.gateway_config().rpc_config()));
        info!("Opening wallet vault at {}", repository.path().display());
        Self::with_components(config, repository, cipher, rng, connector)
    }

    /// Service over explicitly supplied ports
    pub fn with_components(
        config: ServiceConfig,
        repository: Arc<dyn VaultRepository>,
        cipher: Arc<dyn SecretCipher>,
        rng: Arc<dyn RandomSource>,
        connector: Arc<dyn RpcConnector>,
    ) -> Result<Self> {
        let store = Arc::new(WalletVaultStore::new(repository, cipher, Arc::clone(&rng)));
        let session = SessionGuard::with_timeout(Arc::clone(&store), config.inactivity_timeout());
        let gateway =
            LedgerGateway::new(config.network_profile()?, connector, config.gateway_config())?;
        Ok(Self {
            config,
            codec: MnemonicCodec::new(Arc::clone(&rng)),
            rng,
            store,
            session,
            gateway,
        })
    }

    /// Configuration the service was opened with
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Active network profile
    pub fn network(&self) -> Network {
        self.gateway.network()
    }

    // ========================================================================
    // Recovery phrases
    // ========================================================================

    /// Fresh recovery phrase
    pub fn generate_mnemonic(&self, strength: MnemonicStrength) -> Result<Mnemonic> {
        self.codec.generate(strength)
    }

    /// Whether `phrase` is a valid 12 or 24 word recovery phrase
    pub fn validate_mnemonic(&self, phrase: &str) -> bool {
        MnemonicCodec::parse(phrase).is_ok()
    }

    // ========================================================================
    // Wallet lifecycle
    // ========================================================================

    /// Generate a phrase, seal it and unlock the new wallet
    pub async fn create_wallet(
        &self,
        password: &str,
        name: &str,
        strength: MnemonicStrength,
    ) -> Result<CreatedWallet> {
        let mnemonic = self.codec.generate(strength)?;
        let store = Arc::clone(&self.store);
        let secret = Zeroizing::new(password.to_string());
        let label = name.to_string();
        let (wallet, mnemonic) = run_blocking(move || {
            let wallet = store.create(&mnemonic, &secret, &label)?;
            Ok((wallet, mnemonic))
        })
        .await?;

        self.unlock_key(wallet.public_key, password).await?;
        Ok(CreatedWallet { wallet, mnemonic })
    }

    /// Seal an existing phrase and unlock the imported wallet
    pub async fn import_wallet(
        &self,
        phrase: &str,
        password: &str,
        name: &str,
    ) -> Result<VaultEntrySummary> {
        // Reject malformed phrases before any key derivation
        let mnemonic = MnemonicCodec::parse(phrase)?;
        let store = Arc::clone(&self.store);
        let secret = Zeroizing::new(password.to_string());
        let label = name.to_string();
        let wallet = run_blocking(move || store.create(&mnemonic, &secret, &label)).await?;

        self.unlock_key(wallet.public_key, password).await?;
        Ok(wallet)
    }

    /// Stored wallets, without key material
    pub fn list_wallets(&self) -> Result<Vec<VaultEntrySummary>> {
        self.store.list()
    }

    /// Remove a wallet. Deleting the active wallet disconnects the session.
    pub fn delete_wallet(&self, address: &str) -> Result<bool> {
        let public_key = parse_address(address)?;
        if self.session.active_public_key() == Some(public_key) {
            self.session.disconnect();
        }
        let removed = self.store.remove(&public_key)?;
        if removed {
            info!("Deleted wallet {}", public_key);
        }
        Ok(removed)
    }

    /// Make a stored wallet the active one, locked
    pub fn select_wallet(&self, address: &str) -> Result<()> {
        let public_key = parse_address(address)?;
        if !self.store.contains(&public_key)? {
            return Err(Error::WalletNotFound(public_key.to_string()));
        }
        self.session.select(&public_key);
        Ok(())
    }

    // ========================================================================
    // Session
    // ========================================================================

    /// Unlock the wallet at `address` with `password`
    pub async fn unlock_session(&self, address: &str, password: &str) -> Result<()> {
        let public_key = parse_address(address)?;
        self.unlock_key(public_key, password).await
    }

    /// Drop the signing key
    pub fn lock_session(&self) {
        self.session.lock();
    }

    /// Restart the inactivity countdown after user input
    pub fn record_activity(&self) {
        self.session.record_activity();
    }

    /// Lock and forget the active wallet
    pub fn disconnect(&self) {
        self.session.disconnect();
    }

    /// Session snapshot
    pub fn session_status(&self) -> SessionStatus {
        self.session.status()
    }

    /// Decrypt the active wallet's phrase for display. The session must be
    /// unlocked and the password is asked again.
    pub async fn reveal_mnemonic(&self, password: &str) -> Result<Mnemonic> {
        let _permit = self.session.signing_permit().await;
        let public_key = self.session.public_key()?;
        self.session.record_activity();

        let store = Arc::clone(&self.store);
        let secret = Zeroizing::new(password.to_string());
        run_blocking(move || store.unlock_mnemonic(&public_key, &secret)).await
    }

    async fn unlock_key(&self, public_key: Pubkey, password: &str) -> Result<()> {
        let _permit = self.session.signing_permit().await;
        let session = self.session.clone();
        let secret = Zeroizing::new(password.to_string());
        run_blocking(move || session.unlock(&public_key, &secret)).await
    }

    // ========================================================================
    // Network
    // ========================================================================

    /// Switch network profile. The session stays unlocked.
    pub fn set_network(&self, network_type: NetworkType, rpc_url: Option<&str>) -> Result<Network> {
        let mut network = Network::from_type(network_type);
        if let Some(url) = rpc_url {
            network = network.with_rpc_url(url)?;
        }
        self.gateway.set_network(network.clone())?;
        Ok(network)
    }

    // ========================================================================
    // Ledger queries
    // ========================================================================

    /// Lamport balance of `address`
    pub async fn get_balance(&self, address: &str) -> Result<u64> {
        let public_key = parse_address(address)?;
        self.gateway.get_balance(&public_key).await
    }

    /// Token holdings of `address`
    pub async fn get_token_balances(&self, address: &str) -> Result<Vec<TokenBalance>> {
        let public_key = parse_address(address)?;
        self.gateway.get_token_balances(&public_key).await
    }

    /// Whether `address` exists on chain
    pub async fn account_exists(&self, address: &str) -> Result<bool> {
        let public_key = parse_address(address)?;
        self.gateway.account_exists(&public_key).await
    }

    /// Fee estimate for a native transfer from the active wallet, or from a
    /// throwaway payer when no wallet is selected
    pub async fn estimate_fee(&self, transfer: &NativeTransfer) -> Result<u64> {
        let payer = match self.session.active_public_key() {
            Some(public_key) => public_key,
            None => {
                let secret = Zeroizing::new(random_array::<32>(self.rng.as_ref())?);
                SigningKeypair::from_secret_bytes(&secret).public_key()
            }
        };
        let request = native_request(transfer)?;
        self.gateway.estimate_transfer_fee(&payer, &request).await
    }

    /// Recent transactions of `address`
    pub async fn transaction_history(
        &self,
        address: &str,
        limit: Option<usize>,
    ) -> Result<Vec<TransactionRecord>> {
        let public_key = parse_address(address)?;
        let limit = limit.unwrap_or(self.config.history_limit);
        self.gateway.get_transaction_history(&public_key, limit).await
    }

    // ========================================================================
    // Signing flows
    // ========================================================================

    /// Send SOL from the unlocked wallet
    pub async fn transfer_native(&self, transfer: &NativeTransfer) -> Result<TransferReceipt> {
        let request = native_request(transfer)?;
        let recipient = parse_address(&request.to_address)?;

        let _permit = self.session.signing_permit().await;
        self.session.public_key()?;
        self.session.record_activity();

        let recipient_existed = self.recipient_existed(&recipient).await;
        let signature = self.gateway.send_transfer(&self.session, &request).await?;
        Ok(TransferReceipt {
            signature,
            recipient_existed,
        })
    }

    /// Send tokens from the unlocked wallet
    pub async fn transfer_token(&self, transfer: &TokenTransfer) -> Result<TransferReceipt> {
        let recipient = parse_address(&transfer.to_address)?;
        let mint = parse_address(&transfer.mint)?;
        let request = TokenTransferRequest {
            to_address: transfer.to_address.clone(),
            mint,
            amount: parse_ui_amount(&transfer.amount, transfer.decimals)?,
            decimals: transfer.decimals,
        };

        let _permit = self.session.signing_permit().await;
        self.session.public_key()?;
        self.session.record_activity();

        let recipient_existed = self.recipient_existed(&recipient).await;
        let signature = self
            .gateway
            .send_token_transfer(&self.session, &request)
            .await?;
        Ok(TransferReceipt {
            signature,
            recipient_existed,
        })
    }

    /// Faucet SOL to `address` on a test network
    pub async fn request_airdrop(&self, address: &str, amount: &str) -> Result<Signature> {
        let public_key = parse_address(address)?;
        let lamports = parse_sol(amount)?;
        self.gateway.request_airdrop(&public_key, lamports).await
    }

    /// Detached signature by the unlocked wallet
    pub async fn sign_message(&self, message: &[u8]) -> Result<Signature> {
        let _permit = self.session.signing_permit().await;
        let signature = self.gateway.sign_message(message, &self.session)?;
        self.session.record_activity();
        Ok(signature)
    }

    async fn recipient_existed(&self, recipient: &Pubkey) -> Option<bool> {
        match self.gateway.account_exists(recipient).await {
            Ok(true) => Some(true),
            Ok(false) => {
                warn!("Destination {} has never been funded", recipient);
                Some(false)
            }
            Err(e) => {
                debug!("Could not check destination {}: {}", recipient, e);
                None
            }
        }
    }
}

impl std::fmt::Debug for WalletService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletService")
            .field("gateway", &self.gateway)
            .field("session", &self.session)
            .finish()
    }
}

fn native_request(transfer: &NativeTransfer) -> Result<TransferRequest> {
    Ok(TransferRequest {
        to_address: transfer.to_address.clone(),
        lamports: parse_sol(&transfer.amount)?,
        priority_fee_micro_lamports: transfer.priority_fee_micro_lamports,
    })
}

async fn run_blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| Error::Other(format!("background task failed: {}", e)))?
}
