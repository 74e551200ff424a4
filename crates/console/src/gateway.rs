//! The wallet provider boundary.
//!
//! A [`WalletProvider`] is whatever holds the user's keys and relays requests to the chain: a
//! browser wallet bridge, a desktop wallet exposing JSON-RPC, or a dev node with unlocked
//! accounts. [`ProviderGateway::connect`] asks it for account access and binds the contract,
//! producing the [`Session`] that the rest of the console works against.

use crate::{
    abi::{AbiCatalog, FunctionDescriptor},
    activity::ActivityLog,
    error::{DispatchError, GatewayError},
};
use alloy_dyn_abi::{DynSolValue, JsonAbiExt};
use alloy_json_rpc::RpcError;
use alloy_primitives::{Address, Bytes, TxKind};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types::{TransactionInput, TransactionReceipt, TransactionRequest};
use alloy_transport::TransportError;
use async_trait::async_trait;
use order_console_config::Config;
use std::{fmt, sync::Arc};
use url::Url;

/// EIP-1193 error code for a request the user declined.
pub const USER_REJECTED_CODE: i64 = 4001;

/// JSON-RPC error code for an unsupported method.
const METHOD_NOT_FOUND_CODE: i64 = -32601;

/// Logged once the contract is bound.
pub const CONNECTED_MESSAGE: &str = "Contract Connected !";

/// Account access, reads and writes, as offered by a wallet.
#[async_trait]
pub trait WalletProvider: fmt::Debug + Send + Sync {
    /// Requests access to the wallet's accounts. May prompt the user.
    async fn request_accounts(&self) -> Result<Vec<Address>, GatewayError>;

    /// Executes a read-only call and returns the raw return data.
    async fn call(&self, tx: TransactionRequest) -> Result<Bytes, GatewayError>;

    /// Submits a transaction for the wallet to sign and broadcast, and waits for its receipt.
    async fn send(&self, tx: TransactionRequest) -> Result<TransactionReceipt, GatewayError>;
}

/// A [`WalletProvider`] speaking JSON-RPC over HTTP.
#[derive(Clone)]
pub struct RpcWallet {
    url: Url,
    provider: DynProvider,
}

impl fmt::Debug for RpcWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcWallet").field("url", &self.url.as_str()).finish_non_exhaustive()
    }
}

impl RpcWallet {
    /// Creates a wallet for the endpoint at `url`. No request is made until first use.
    pub fn new(url: &str) -> Result<Self, GatewayError> {
        // a bare `localhost:8545` is not a valid URL
        let url =
            if url.starts_with("localhost:") { format!("http://{url}") } else { url.to_string() };
        let url: Url = url.parse().map_err(|err| {
            GatewayError::ProviderUnavailable(format!("invalid RPC URL {url:?}: {err}"))
        })?;
        let provider = DynProvider::new(ProviderBuilder::default().connect_http(url.clone()));
        Ok(Self { url, provider })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl WalletProvider for RpcWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, GatewayError> {
        let requested =
            self.provider.raw_request::<_, Vec<Address>>("eth_requestAccounts".into(), ()).await;
        match requested {
            Ok(accounts) => Ok(accounts),
            Err(err)
                if err.as_error_resp().is_some_and(|resp| resp.code == METHOD_NOT_FOUND_CODE) =>
            {
                debug!("eth_requestAccounts unsupported, falling back to eth_accounts");
                self.provider.get_accounts().await.map_err(classify)
            }
            Err(err) => Err(classify(err)),
        }
    }

    async fn call(&self, tx: TransactionRequest) -> Result<Bytes, GatewayError> {
        self.provider.call(tx).await.map_err(classify)
    }

    async fn send(&self, tx: TransactionRequest) -> Result<TransactionReceipt, GatewayError> {
        let pending = self.provider.send_transaction(tx).await.map_err(classify)?;
        debug!(tx_hash = %pending.tx_hash(), "transaction submitted");
        pending.get_receipt().await.map_err(|err| GatewayError::Receipt(err.to_string()))
    }
}

/// Maps a transport failure onto the gateway taxonomy.
fn classify(err: TransportError) -> GatewayError {
    if let Some(resp) = err.as_error_resp() {
        if resp.code == USER_REJECTED_CODE {
            return GatewayError::UserRejected(resp.message.to_string());
        }
        return GatewayError::Rpc { code: resp.code, message: resp.message.to_string() };
    }
    match err {
        RpcError::Transport(kind) => GatewayError::Transport(kind.to_string()),
        other => GatewayError::Transport(other.to_string()),
    }
}

/// The deployed contract, bound to its interface.
#[derive(Clone, Debug)]
pub struct ContractHandle {
    address: Address,
    catalog: Arc<AbiCatalog>,
}

impl ContractHandle {
    pub fn new(address: Address, catalog: Arc<AbiCatalog>) -> Self {
        Self { address, catalog }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn catalog(&self) -> &AbiCatalog {
        &self.catalog
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.catalog.find_function(name)
    }

    /// ABI-encodes a call to `function`, selector included.
    pub fn encode(
        &self,
        function: &FunctionDescriptor,
        args: &[DynSolValue],
    ) -> Result<Bytes, DispatchError> {
        function
            .abi()
            .abi_encode_input(args)
            .map(Bytes::from)
            .map_err(|source| DispatchError::Encode { function: function.name.clone(), source })
    }

    /// A request targeting the contract with the given calldata.
    pub fn transaction(&self, input: Bytes) -> TransactionRequest {
        TransactionRequest {
            to: Some(TxKind::Call(self.address)),
            input: TransactionInput::new(input),
            ..Default::default()
        }
    }
}

/// A connected wallet: its accounts, the active one, and the bound contract.
#[derive(Clone, Debug)]
pub struct Session {
    provider: Arc<dyn WalletProvider>,
    accounts: Vec<Address>,
    selected: Option<Address>,
    contract: ContractHandle,
}

impl Session {
    /// Creates a session with the first account selected.
    pub fn new(
        provider: Arc<dyn WalletProvider>,
        accounts: Vec<Address>,
        contract: ContractHandle,
    ) -> Self {
        let selected = accounts.first().copied();
        Self { provider, accounts, selected, contract }
    }

    pub fn provider(&self) -> &dyn WalletProvider {
        &*self.provider
    }

    pub fn accounts(&self) -> &[Address] {
        &self.accounts
    }

    pub fn contract(&self) -> &ContractHandle {
        &self.contract
    }

    /// The account transactions are sent from.
    pub fn selected_account(&self) -> Option<Address> {
        self.selected
    }

    /// Makes `account` active. It must be one of the discovered accounts.
    pub fn select_account(&mut self, account: Address) -> Result<(), GatewayError> {
        if !self.accounts.contains(&account) {
            return Err(GatewayError::UnknownAccount(account));
        }
        self.selected = Some(account);
        Ok(())
    }

    /// Makes the account at `index` of the discovered list active.
    pub fn select_index(&mut self, index: usize) -> Result<Address, GatewayError> {
        let account =
            *self.accounts.get(index).ok_or(GatewayError::AccountIndexOutOfRange(index))?;
        self.selected = Some(account);
        Ok(account)
    }

    pub fn clear_account(&mut self) {
        self.selected = None;
    }
}

/// Owns the wallet provider and, once connected, the [`Session`].
#[derive(Debug)]
pub struct ProviderGateway {
    provider: Option<Arc<dyn WalletProvider>>,
    contract_address: Option<Address>,
    catalog: Arc<AbiCatalog>,
    session: Option<Session>,
}

impl ProviderGateway {
    /// Creates a gateway. `provider` is `None` when no wallet is present.
    pub fn new(
        provider: Option<Arc<dyn WalletProvider>>,
        contract_address: Option<Address>,
        catalog: Arc<AbiCatalog>,
    ) -> Self {
        Self { provider, contract_address, catalog, session: None }
    }

    /// Creates a gateway for the configured endpoint and contract.
    pub fn from_config(config: &Config, catalog: Arc<AbiCatalog>) -> Result<Self, GatewayError> {
        let provider = match config.rpc_url.as_deref() {
            Some(url) => Some(Arc::new(RpcWallet::new(url)?) as Arc<dyn WalletProvider>),
            None => None,
        };
        Ok(Self::new(provider, config.contract_address, catalog))
    }

    /// Whether a wallet provider is present at all.
    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Requests account access and binds the contract.
    ///
    /// Once connected, further calls return the existing session without prompting again.
    pub async fn connect(&mut self, log: &ActivityLog) -> Result<&mut Session, GatewayError> {
        let session = match self.session.take() {
            Some(session) => {
                debug!("already connected");
                session
            }
            None => self.open(log).await?,
        };
        Ok(self.session.insert(session))
    }

    async fn open(&self, log: &ActivityLog) -> Result<Session, GatewayError> {
        let provider = self
            .provider
            .clone()
            .ok_or_else(|| GatewayError::ProviderUnavailable("no RPC endpoint configured".into()))?;
        let address = self.contract_address.ok_or(GatewayError::MissingContractAddress)?;

        let accounts = match provider.request_accounts().await {
            Ok(accounts) => accounts,
            Err(GatewayError::Transport(reason)) => {
                return Err(GatewayError::ProviderUnavailable(reason));
            }
            Err(err) => return Err(err),
        };
        if accounts.is_empty() {
            return Err(GatewayError::UserRejected("no account was authorized".into()));
        }

        debug!(accounts = accounts.len(), contract = %address, "connected");
        log.push_text(CONNECTED_MESSAGE);
        Ok(Session::new(provider, accounts, ContractHandle::new(address, self.catalog.clone())))
    }

    /// The discovered accounts; empty before connecting.
    pub fn accounts(&self) -> &[Address] {
        self.session.as_ref().map(Session::accounts).unwrap_or_default()
    }

    /// The bound contract; `None` before connecting.
    pub fn contract(&self) -> Option<&ContractHandle> {
        self.session.as_ref().map(Session::contract)
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }
}
