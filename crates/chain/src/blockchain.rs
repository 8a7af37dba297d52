//! The persistable chain snapshot.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::block::Block;
use crate::transaction::Transaction;
use crate::{ChainError, ChainResult};

/// Version written into every `.chain` document. Documents with any other
/// version are rejected at load.
pub const CHAIN_FORMAT_VERSION: u32 = 1;

/// Timestamp of the synthesized genesis block.
pub const GENESIS_TIMESTAMP: u64 = 1_468_595_301;

/// Seconds between synthesized blocks.
pub const BLOCK_INTERVAL: u64 = 15;

/// The simulated blockchain: ordered blocks plus named addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blockchain {
    version: u32,
    blocks: Vec<Block>,
    addresses: Vec<Address>,
}

impl Blockchain {
    /// A fresh chain with only the genesis block.
    pub fn new() -> Self {
        Self {
            version: CHAIN_FORMAT_VERSION,
            blocks: vec![Block::new(0, GENESIS_TIMESTAMP, Vec::new())],
            addresses: Vec::new(),
        }
    }

    /// Height of the newest block.
    pub fn current_height(&self) -> u32 {
        self.blocks.last().map(Block::index).unwrap_or(0)
    }

    pub fn current_block(&self) -> &Block {
        self.blocks.last().expect("chain always has a genesis block")
    }

    pub fn block_at(&self, index: u32) -> Option<&Block> {
        self.blocks.get(index as usize)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Appends a block at the next height, timestamped one interval after
    /// the current tip (or at the given override).
    pub fn add_block(
        &mut self,
        transactions: Vec<Transaction>,
        timestamp: Option<u64>,
    ) -> &Block {
        let index = self.current_height() + 1;
        let timestamp =
            timestamp.unwrap_or_else(|| self.current_block().timestamp() + BLOCK_INTERVAL);
        self.blocks.push(Block::new(index, timestamp, transactions));
        self.blocks.last().expect("just pushed")
    }

    /// Deploys contract bytecode under `name`, creating the address on
    /// first deploy and replacing the bytecode on redeploy. Returns the
    /// resulting script hash.
    pub fn deploy_contract(&mut self, name: &str, bytecode: Vec<u8>) -> [u8; 20] {
        if let Some(address) = self.addresses.iter_mut().find(|a| a.name() == name) {
            address.redeploy(bytecode);
            return *address.script_hash();
        }
        let address = Address::new_contract(name, bytecode);
        let hash = *address.script_hash();
        tracing::debug!(name, hash = %hex::encode(hash), "deployed contract");
        self.addresses.push(address);
        hash
    }

    /// Creates a named wallet account with a fresh key pair. Returns the
    /// existing address when the name is taken.
    pub fn create_account(&mut self, name: &str) -> &Address {
        if let Some(position) = self.addresses.iter().position(|a| a.name() == name) {
            return &self.addresses[position];
        }
        self.addresses.push(Address::new_account(name));
        self.addresses.last().expect("just pushed")
    }

    /// Linear scan by address name.
    pub fn find_address_by_name(&self, name: &str) -> Option<&Address> {
        self.addresses.iter().find(|a| a.name() == name)
    }

    pub fn find_address_by_hash(&self, script_hash: &[u8; 20]) -> Option<&Address> {
        self.addresses.iter().find(|a| a.script_hash() == script_hash)
    }

    pub fn find_address_by_hash_mut(&mut self, script_hash: &[u8; 20]) -> Option<&mut Address> {
        self.addresses
            .iter_mut()
            .find(|a| a.script_hash() == script_hash)
    }

    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    /// Bytecode lookup for APPCALL resolution.
    pub fn contract_script(&self, script_hash: &[u8; 20]) -> Option<Vec<u8>> {
        self.find_address_by_hash(script_hash)
            .and_then(|address| address.bytecode().map(<[u8]>::to_vec))
    }

    /// Serializes the chain to `path` as the versioned JSON document.
    pub fn save(&self, path: &Path) -> ChainResult<()> {
        let document = serde_json::to_string_pretty(self)?;
        fs::write(path, document).map_err(|err| ChainError::io(path, err))?;
        tracing::info!(path = %path.display(), "chain saved");
        Ok(())
    }

    /// Loads a chain document, rejecting unknown format versions.
    pub fn load(path: &Path) -> ChainResult<Self> {
        let document = fs::read_to_string(path).map_err(|err| ChainError::io(path, err))?;
        let chain: Self = serde_json::from_str(&document)?;
        if chain.version != CHAIN_FORMAT_VERSION {
            return Err(ChainError::UnsupportedVersion {
                found: chain.version,
                supported: CHAIN_FORMAT_VERSION,
            });
        }
        Ok(chain)
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}
