use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use alloy::primitives::B256;

use dapp_bridge_core::{
    Account, ChainDescriptor, ChainMetadataRecord, DataSourcePort, LookupTicket, PortError,
};

/// Wallet store shared by every bridge session of the app.
///
/// Clones share the same state. Each operation runs under one lock, so a
/// metadata write for a genesis hash is atomic and the last write wins.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataSource {
    inner: Arc<Mutex<StoreState>>,
}

#[derive(Debug)]
struct StoreState {
    accounts: Vec<Account>,
    chains: HashMap<B256, ChainDescriptor>,
    chain_accounts: HashMap<B256, Account>,
    metadata: BTreeMap<B256, ChainMetadataRecord>,
    authorizations: HashMap<String, bool>,
    remember_authorizations: bool,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            chains: HashMap::new(),
            chain_accounts: HashMap::new(),
            metadata: BTreeMap::new(),
            authorizations: HashMap::new(),
            remember_authorizations: true,
        }
    }
}

impl InMemoryDataSource {
    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, PortError> {
        self.inner
            .lock()
            .map_err(|e| PortError::Transport(format!("store lock poisoned: {e}")))
    }

    pub fn set_remember_authorizations(&self, enabled: bool) -> Result<(), PortError> {
        self.lock()?.remember_authorizations = enabled;
        Ok(())
    }

    pub fn insert_chain(&self, chain: ChainDescriptor) -> Result<(), PortError> {
        self.lock()?.chains.insert(chain.genesis_hash, chain);
        Ok(())
    }

    /// Adds an account to the wallet list and binds it to `chain` for signing.
    pub fn insert_account(&self, account: Account, chain: Option<B256>) -> Result<(), PortError> {
        let mut g = self.lock()?;
        if let Some(genesis_hash) = chain {
            g.chain_accounts.insert(genesis_hash, account.clone());
        }
        if !g.accounts.iter().any(|a| a.address == account.address) {
            g.accounts.push(account);
        }
        Ok(())
    }

    pub fn authorization_for(&self, dapp: &str) -> Result<Option<bool>, PortError> {
        Ok(self.lock()?.authorizations.get(dapp).copied())
    }
}

impl DataSourcePort for InMemoryDataSource {
    fn fetch_accounts(&self) -> Result<Vec<Account>, PortError> {
        Ok(self.lock()?.accounts.clone())
    }

    fn chain_for(&self, genesis_hash: B256) -> Option<ChainDescriptor> {
        self.lock().ok()?.chains.get(&genesis_hash).cloned()
    }

    fn chain_for_address(&self, address: &str) -> Option<ChainDescriptor> {
        let g = self.lock().ok()?;
        let genesis_hash = g
            .chain_accounts
            .iter()
            .filter(|(_, account)| account.address == address)
            .map(|(hash, _)| *hash)
            .min()?;
        g.chains.get(&genesis_hash).cloned()
    }

    fn metadata_for(&self, genesis_hash: B256) -> Option<ChainMetadataRecord> {
        self.lock().ok()?.metadata.get(&genesis_hash).copied()
    }

    fn list_metadata(&self) -> Result<Vec<ChainMetadataRecord>, PortError> {
        Ok(self.lock()?.metadata.values().copied().collect())
    }

    fn store_metadata(&self, record: ChainMetadataRecord) -> Result<(), PortError> {
        self.lock()?.metadata.insert(record.genesis_hash, record);
        Ok(())
    }

    fn remembered_authorization(&self, dapp: &str) -> Result<Option<bool>, PortError> {
        let g = self.lock()?;
        if !g.remember_authorizations {
            return Ok(None);
        }
        Ok(g.authorizations.get(dapp).copied())
    }

    fn persist_authorization(&self, dapp: &str, approved: bool) -> Result<(), PortError> {
        self.lock()?.authorizations.insert(dapp.to_owned(), approved);
        Ok(())
    }

    fn resolve_account_for_chain(&self, chain: &ChainDescriptor) -> Option<Account> {
        self.lock()
            .ok()?
            .chain_accounts
            .get(&chain.genesis_hash)
            .cloned()
    }

    fn request_live_spec_version(
        &self,
        _ticket: LookupTicket,
        _chain: &ChainDescriptor,
    ) -> Result<(), PortError> {
        Err(PortError::NotImplemented("memory.request_live_spec_version"))
    }

    fn cancel_live_spec_version(&self, _ticket: LookupTicket) {}
}
