//! Blocks of the simulated chain.

use serde::{Deserialize, Serialize};

use crate::transaction::Transaction;

/// A block: its height, timestamp and transactions.
///
/// Heights form a contiguous sequence starting at zero; the blockchain
/// enforces this at append time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    index: u32,
    timestamp: u64,
    #[serde(default)]
    transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(index: u32, timestamp: u64, transactions: Vec<Transaction>) -> Self {
        Self {
            index,
            timestamp,
            transactions,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn push_transaction(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }
}

impl neodbg_vm::InteropInterface for Block {
    fn interface_type(&self) -> &str {
        "Header"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
