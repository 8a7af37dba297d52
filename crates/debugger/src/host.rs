//! Emulator-side state behind the engine's host seam.

use std::any::Any;
use std::sync::Arc;

use parking_lot::RwLock;

use neodbg_chain::{Blockchain, Transaction};
use neodbg_vm::{StackItem, VmHost};

/// Override for the result of `CheckWitness` syscalls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WitnessMode {
    /// Check the queried hash against the emulated signers.
    #[default]
    Default,
    AlwaysTrue,
    AlwaysFalse,
}

/// Execution context hint exposed by `Runtime.GetTrigger`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TriggerType {
    Verification = 0x00,
    #[default]
    Application = 0x10,
}

/// A runtime event emitted by a syscall, in emission order.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    Notification(StackItem),
    Log(String),
}

/// The state interop handlers operate on: the chain snapshot, the
/// executing address, the script container and the debugger overrides.
///
/// One host is built per reset and owned by the engine; the emulator
/// reaches it back through the [`VmHost`] downcasting hooks.
pub struct EmulatorHost {
    pub chain: Arc<RwLock<Blockchain>>,
    /// Script hash of the executing contract's address; storage syscalls
    /// operate on this address.
    pub contract_hash: [u8; 20],
    /// The script container for witness and hash queries.
    pub transaction: Transaction,
    pub witness_mode: WitnessMode,
    pub trigger: TriggerType,
    /// Overrides `Runtime.GetTime` when set.
    pub timestamp_override: Option<u64>,
    pub events: Vec<RuntimeEvent>,
    /// Value size of the most recent `Storage.Put`, for gas scaling.
    pub last_storage_bytes: usize,
}

impl EmulatorHost {
    pub fn new(chain: Arc<RwLock<Blockchain>>, contract_hash: [u8; 20]) -> Self {
        Self {
            chain,
            contract_hash,
            transaction: Transaction::new(),
            witness_mode: WitnessMode::Default,
            trigger: TriggerType::Application,
            timestamp_override: None,
            events: Vec::new(),
            last_storage_bytes: 0,
        }
    }

    /// The timestamp `Runtime.GetTime` reports: the override when set,
    /// otherwise one block interval past the current tip.
    pub fn current_time(&self) -> u64 {
        self.timestamp_override.unwrap_or_else(|| {
            self.chain.read().current_block().timestamp() + neodbg_chain::blockchain::BLOCK_INTERVAL
        })
    }

    /// Resolves a `CheckWitness` query under the active witness mode.
    pub fn check_witness(&self, hash: &[u8]) -> bool {
        match self.witness_mode {
            WitnessMode::AlwaysTrue => true,
            WitnessMode::AlwaysFalse => false,
            WitnessMode::Default => {
                if hash == self.contract_hash {
                    return true;
                }
                let Ok(hash) = <[u8; 20]>::try_from(hash) else {
                    return false;
                };
                self.chain
                    .read()
                    .find_address_by_hash(&hash)
                    .is_some_and(|address| address.has_keypair())
            }
        }
    }
}

impl VmHost for EmulatorHost {
    fn contract_script(&self, script_hash: &[u8; 20]) -> Option<Vec<u8>> {
        self.chain.read().contract_script(script_hash)
    }

    fn container_message(&self) -> Vec<u8> {
        self.transaction.hash_data()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> EmulatorHost {
        let mut chain = Blockchain::new();
        let hash = chain.deploy_contract("token", vec![0x51, 0x66]);
        EmulatorHost::new(Arc::new(RwLock::new(chain)), hash)
    }

    #[test]
    fn witness_overrides_short_circuit() {
        let mut host = host();
        host.witness_mode = WitnessMode::AlwaysTrue;
        assert!(host.check_witness(&[0u8; 20]));
        host.witness_mode = WitnessMode::AlwaysFalse;
        assert!(!host.check_witness(host.contract_hash.to_vec().as_slice()));
    }

    #[test]
    fn default_witness_accepts_executing_contract_and_keyed_accounts() {
        let host = host();
        assert!(host.check_witness(&host.contract_hash));
        assert!(!host.check_witness(&[0u8; 20]));

        let alice_hash = *host.chain.write().create_account("alice").script_hash();
        assert!(host.check_witness(&alice_hash));
    }

    #[test]
    fn resolves_appcall_scripts_from_chain() {
        let host = host();
        assert_eq!(
            host.contract_script(&host.contract_hash),
            Some(vec![0x51, 0x66])
        );
        assert_eq!(host.contract_script(&[0u8; 20]), None);
    }

    #[test]
    fn timestamp_override_wins() {
        let mut host = host();
        let derived = host.current_time();
        assert!(derived > 0);
        host.timestamp_override = Some(42);
        assert_eq!(host.current_time(), 42);
    }
}
