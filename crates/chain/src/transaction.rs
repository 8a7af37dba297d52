//! Transactions and their outputs.

use serde::{Deserialize, Serialize};

use crate::serde_hex;

/// A reference to a previous transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    #[serde(with = "serde_hex::bytes")]
    pub prev_hash: Vec<u8>,
    pub prev_index: u16,
}

/// A transferred asset amount. Amounts are fixed-point with eight
/// decimals, like the production chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    #[serde(with = "serde_hex::bytes")]
    pub asset_id: Vec<u8>,
    pub amount: i64,
    #[serde(with = "serde_hex::hash160")]
    pub script_hash: [u8; 20],
}

/// The script container: the transaction the VM considers "the signed
/// message" for witness and hash queries.
///
/// Emulated transactions carry no back-pointer to the emulator; syscalls
/// reach emulator state through the engine's host instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_output(&mut self, asset_id: Vec<u8>, amount: i64, script_hash: [u8; 20]) {
        self.outputs.push(Output {
            asset_id,
            amount,
            script_hash,
        });
    }

    /// The deterministic serialized form signature checks verify against.
    ///
    /// Little-endian fixed-width layout: input count, each input's hash
    /// and index, output count, each output's asset, amount and recipient.
    pub fn hash_data(&self) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            data.extend_from_slice(&input.prev_hash);
            data.extend_from_slice(&input.prev_index.to_le_bytes());
        }
        data.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            data.extend_from_slice(&output.asset_id);
            data.extend_from_slice(&output.amount.to_le_bytes());
            data.extend_from_slice(&output.script_hash);
        }
        data
    }

    /// The transaction hash: double SHA-256 over [`hash_data`].
    ///
    /// [`hash_data`]: Transaction::hash_data
    pub fn hash(&self) -> [u8; 32] {
        neodbg_crypto::hash256(&self.hash_data())
    }
}

impl neodbg_vm::InteropInterface for Transaction {
    fn interface_type(&self) -> &str {
        "Transaction"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl neodbg_vm::InteropInterface for Input {
    fn interface_type(&self) -> &str {
        "TransactionInput"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl neodbg_vm::InteropInterface for Output {
    fn interface_type(&self) -> &str {
        "TransactionOutput"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_data_is_deterministic() {
        let mut tx = Transaction::new();
        tx.add_output(vec![0xAB; 32], 15_0000_0000, [0x11; 20]);
        assert_eq!(tx.hash_data(), tx.clone().hash_data());
        assert_eq!(tx.hash(), tx.hash());
    }

    #[test]
    fn hash_changes_with_outputs() {
        let empty = Transaction::new();
        let mut with_output = Transaction::new();
        with_output.add_output(vec![0xAB; 32], 1, [0x22; 20]);
        assert_ne!(empty.hash(), with_output.hash());
    }
}
