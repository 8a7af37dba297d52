//! Named on-chain accounts.

use serde::{Deserialize, Serialize};

use neodbg_crypto::KeyPair;

use crate::serde_hex;
use crate::ChainResult;

/// One key/value pair of contract storage.
///
/// Entries keep insertion order so a saved chain reloads into the same
/// document bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEntry {
    #[serde(with = "serde_hex::bytes")]
    pub key: Vec<u8>,
    #[serde(with = "serde_hex::bytes")]
    pub value: Vec<u8>,
}

/// A simulated on-chain account: a named contract or wallet.
///
/// Created by `DeployContract` or `CreateAccount`; contract bytecode may
/// be replaced in place by redeploying under the same name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    name: String,
    #[serde(with = "serde_hex::hash160")]
    script_hash: [u8; 20],
    #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_hex::opt_bytes")]
    private_key: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_hex::opt_bytes")]
    bytecode: Option<Vec<u8>>,
    #[serde(default)]
    storage: Vec<StorageEntry>,
}

impl Address {
    /// A contract address; the script hash is derived from the bytecode.
    pub fn new_contract(name: &str, bytecode: Vec<u8>) -> Self {
        let script_hash = neodbg_crypto::hash160(&bytecode);
        Self {
            name: name.to_string(),
            script_hash,
            private_key: None,
            bytecode: Some(bytecode),
            storage: Vec::new(),
        }
    }

    /// A wallet address with a fresh key pair; the script hash is derived
    /// from the public key.
    pub fn new_account(name: &str) -> Self {
        let keypair = KeyPair::generate();
        let script_hash = neodbg_crypto::hash160(&keypair.public_key());
        Self {
            name: name.to_string(),
            script_hash,
            private_key: Some(keypair.private_key()),
            bytecode: None,
            storage: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn script_hash(&self) -> &[u8; 20] {
        &self.script_hash
    }

    pub fn bytecode(&self) -> Option<&[u8]> {
        self.bytecode.as_deref()
    }

    /// Replaces the contract bytecode and re-derives the script hash.
    pub fn redeploy(&mut self, bytecode: Vec<u8>) {
        self.script_hash = neodbg_crypto::hash160(&bytecode);
        self.bytecode = Some(bytecode);
    }

    /// The account's key pair, if this address carries one.
    pub fn keypair(&self) -> ChainResult<Option<KeyPair>> {
        self.private_key
            .as_deref()
            .map(|bytes| KeyPair::from_private_key(bytes).map_err(Into::into))
            .transpose()
    }

    pub fn has_keypair(&self) -> bool {
        self.private_key.is_some()
    }

    /// Looks up a storage value.
    pub fn storage_get(&self, key: &[u8]) -> Option<&[u8]> {
        self.storage
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value.as_slice())
    }

    /// Writes a storage value, replacing any previous value for the key.
    pub fn storage_put(&mut self, key: &[u8], value: &[u8]) {
        match self.storage.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => entry.value = value.to_vec(),
            None => self.storage.push(StorageEntry {
                key: key.to_vec(),
                value: value.to_vec(),
            }),
        }
    }

    /// Deletes a storage entry; missing keys are a no-op.
    pub fn storage_delete(&mut self, key: &[u8]) {
        self.storage.retain(|entry| entry.key != key);
    }

    pub fn storage(&self) -> &[StorageEntry] {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_hash_derives_from_bytecode() {
        let bytecode = vec![0x51, 0x66];
        let address = Address::new_contract("token", bytecode.clone());
        assert_eq!(address.script_hash(), &neodbg_crypto::hash160(&bytecode));
        assert_eq!(address.bytecode(), Some(bytecode.as_slice()));
    }

    #[test]
    fn redeploy_updates_hash_in_place() {
        let mut address = Address::new_contract("token", vec![0x51]);
        let before = *address.script_hash();
        address.redeploy(vec![0x52, 0x66]);
        assert_ne!(address.script_hash(), &before);
    }

    #[test]
    fn storage_put_get_delete() {
        let mut address = Address::new_contract("token", vec![0x51]);
        address.storage_put(b"balance", b"100");
        address.storage_put(b"owner", b"alice");
        address.storage_put(b"balance", b"200");

        assert_eq!(address.storage_get(b"balance"), Some(b"200".as_slice()));
        assert_eq!(address.storage().len(), 2);

        address.storage_delete(b"balance");
        assert_eq!(address.storage_get(b"balance"), None);
        address.storage_delete(b"balance");
    }

    #[test]
    fn account_carries_usable_keypair() {
        let address = Address::new_account("alice");
        let keypair = address.keypair().unwrap().unwrap();
        assert_eq!(
            address.script_hash(),
            &neodbg_crypto::hash160(&keypair.public_key())
        );
    }
}
