//! The stepper: gas accounting and debugger state transitions around the
//! execution engine.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;

use neodbg_chain::{Blockchain, Transaction};
use neodbg_vm::{ExecutionEngine, InteropHandler, InteropService, OpCode};

use crate::arguments::{build_loader_script, ArgValue};
use crate::error::{DebugError, DebugResult};
use crate::host::{EmulatorHost, RuntimeEvent, TriggerType, WitnessMode};
use crate::interop::register_default_interops;
use crate::profiler::Profiler;

/// The kind of a debugger state snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebuggerStateKind {
    Invalid,
    Reset,
    Running,
    Finished,
    Exception,
    Break,
}

/// One observable debugger state: what the session is doing and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebuggerState {
    pub kind: DebuggerStateKind,
    /// Byte offset of the next instruction, or of the faulting one after
    /// an exception.
    pub offset: usize,
}

impl DebuggerState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self.kind,
            DebuggerStateKind::Finished | DebuggerStateKind::Exception
        )
    }
}

/// Owns the execution engine, the current script container, the
/// breakpoint set and the gas counters for one contract under debug.
///
/// The engine is rebuilt from scratch on every reset, which is why the
/// emulator re-arms its breakpoint set afterwards.
pub struct Emulator {
    chain: Arc<RwLock<Blockchain>>,
    contract_hash: [u8; 20],
    engine: ExecutionEngine,
    breakpoints: HashSet<usize>,
    state: DebuggerState,
    used_gas: f64,
    used_opcode_count: u64,
    profiler: Profiler,
    witness_mode: WitnessMode,
    trigger: TriggerType,
    timestamp_override: Option<u64>,
    /// Script container for the next reset; cleared once consumed, so a
    /// later reset synthesizes a fresh transaction without the previous
    /// outputs.
    transaction: Option<Transaction>,
    extra_interops: Vec<(String, f64, InteropHandler)>,
}

impl Emulator {
    /// Binds an emulator to a contract deployed on `chain`, leaving it in
    /// the `Reset` state with no arguments loaded.
    pub fn new(chain: Arc<RwLock<Blockchain>>, contract_hash: [u8; 20]) -> DebugResult<Self> {
        let mut emulator = Self {
            chain,
            contract_hash,
            engine: ExecutionEngine::new(Box::new(neodbg_vm::NullHost), InteropService::new()),
            breakpoints: HashSet::new(),
            state: DebuggerState {
                kind: DebuggerStateKind::Invalid,
                offset: 0,
            },
            used_gas: 0.0,
            used_opcode_count: 0,
            profiler: Profiler::new(),
            witness_mode: WitnessMode::Default,
            trigger: TriggerType::Application,
            timestamp_override: None,
            transaction: None,
            extra_interops: Vec::new(),
        };
        emulator.reset(&[])?;
        Ok(emulator)
    }

    /// Rebuilds the engine for a fresh run: zeroed counters, a new script
    /// container, the contract script plus an argument-loader script, and
    /// the breakpoint set re-armed.
    pub fn reset(&mut self, args: &[ArgValue]) -> DebugResult<()> {
        self.used_gas = 0.0;
        self.used_opcode_count = 0;
        self.profiler.reset();

        // Consume a transaction set via parameters, or synthesize an
        // empty one against the current block.
        let transaction = self.transaction.take().unwrap_or_default();

        let bytecode = self
            .chain
            .read()
            .contract_script(&self.contract_hash)
            .ok_or_else(|| DebugError::ContractMissing {
                hash: hex::encode(self.contract_hash),
            })?;

        let mut host = EmulatorHost::new(Arc::clone(&self.chain), self.contract_hash);
        host.transaction = transaction;
        host.witness_mode = self.witness_mode;
        host.trigger = self.trigger;
        host.timestamp_override = self.timestamp_override;

        let mut interop = InteropService::new();
        register_default_interops(&mut interop);
        for (name, price, handler) in &self.extra_interops {
            interop.register(name, *price, *handler);
        }

        let mut engine = ExecutionEngine::new(Box::new(host), interop);
        engine.load_script(bytecode);
        // The loader runs first (it is the top context) and leaves the
        // arguments on the shared stack for the contract. No arguments,
        // no loader: the contract script starts immediately.
        if !args.is_empty() {
            let loader = build_loader_script(args)?;
            engine.load_script(loader);
        }
        for offset in &self.breakpoints {
            engine.add_break_point(self.contract_hash, *offset);
        }

        self.engine = engine;
        self.state = DebuggerState {
            kind: DebuggerStateKind::Reset,
            offset: 0,
        };
        Ok(())
    }

    /// Advances execution by one instruction and returns the new state.
    ///
    /// `Finished` and `Invalid` are sticky; stepping from them returns
    /// the state unchanged (the façade resets first).
    pub fn step(&mut self) -> DebuggerState {
        match self.state.kind {
            DebuggerStateKind::Finished | DebuggerStateKind::Invalid => return self.state,
            DebuggerStateKind::Reset => self.engine.clear_break_state(),
            _ => {}
        }

        self.engine.step_into();

        // If the engine faulted mid-fetch the context may be gone; keep
        // the previous offset in that case.
        let offset = self
            .engine
            .current_context()
            .map(|context| context.instruction_pointer())
            .unwrap_or(self.state.offset);

        let (profile_opcode, cost) = self.last_step_cost();
        self.used_gas += cost;
        self.used_opcode_count += 1;
        self.profiler.record(profile_opcode, cost);

        let vm_state = self.engine.state();
        let kind = if vm_state.is_fault() {
            DebuggerStateKind::Exception
        } else if vm_state.is_break() {
            // Clear BREAK so the next step resumes past the breakpoint.
            self.engine.clear_break_state();
            DebuggerStateKind::Break
        } else if vm_state.is_halt() {
            DebuggerStateKind::Finished
        } else {
            DebuggerStateKind::Running
        };

        self.state = DebuggerState { kind, offset };
        self.state
    }

    /// Steps until execution leaves the `Running` state and returns the
    /// terminal state: a breakpoint, completion, or a fault.
    pub fn run(&mut self) -> DebuggerState {
        loop {
            let state = self.step();
            if state.kind != DebuggerStateKind::Running {
                return state;
            }
        }
    }

    /// Steps one instruction, but runs calls to completion instead of
    /// descending into them.
    pub fn step_over(&mut self) -> DebuggerState {
        let depth = self.engine.invocation_depth();
        let mut state = self.step();
        while state.kind == DebuggerStateKind::Running && self.engine.invocation_depth() > depth {
            state = self.step();
        }
        state
    }

    /// Runs until the current invocation context returns.
    pub fn step_out(&mut self) -> DebuggerState {
        let depth = self.engine.invocation_depth();
        let mut state = self.step();
        while state.kind == DebuggerStateKind::Running && self.engine.invocation_depth() >= depth {
            state = self.step();
        }
        state
    }

    /// Gas for the opcode the engine just executed, per the emulator's
    /// cost table, and the opcode the profiler should attribute it to.
    fn last_step_cost(&self) -> (OpCode, f64) {
        let Some(opcode) = self.engine.last_opcode() else {
            return (OpCode::NOP, 0.0);
        };
        if opcode.is_push() || opcode == OpCode::NOP {
            return (opcode, 0.0);
        }
        let cost = match opcode {
            OpCode::CHECKSIG | OpCode::CHECKMULTISIG => 0.1,
            OpCode::APPCALL | OpCode::TAILCALL | OpCode::SHA256 | OpCode::SHA1 => 0.01,
            OpCode::HASH256 | OpCode::HASH160 => 0.02,
            OpCode::SYSCALL => {
                let Some(name) = self.engine.last_syscall() else {
                    return (opcode, 0.0);
                };
                let base = self.engine.interop().price(name).unwrap_or(0.0);
                if name.ends_with("Storage.Put") {
                    // Storage writes scale with the stored size in KiB
                    // and bill under the synthetic STORAGE marker.
                    let stored = self.host().last_storage_bytes;
                    let multiplier = stored.div_ceil(1024).max(1);
                    return (OpCode::STORAGE, base * multiplier as f64);
                }
                base
            }
            _ => 0.001,
        };
        (opcode, cost)
    }

    fn host(&self) -> &EmulatorHost {
        self.engine
            .host()
            .as_any()
            .downcast_ref::<EmulatorHost>()
            .expect("emulator engines always carry an EmulatorHost")
    }

    fn host_mut(&mut self) -> &mut EmulatorHost {
        self.engine
            .host_mut()
            .as_any_mut()
            .downcast_mut::<EmulatorHost>()
            .expect("emulator engines always carry an EmulatorHost")
    }

    /// Arms a breakpoint at a bytecode offset of the contract script.
    pub fn set_breakpoint(&mut self, offset: usize) -> bool {
        self.engine.add_break_point(self.contract_hash, offset);
        self.breakpoints.insert(offset)
    }

    /// Disarms a breakpoint; returns whether one was armed there.
    pub fn clear_breakpoint(&mut self, offset: usize) -> bool {
        let hash = self.contract_hash;
        self.engine.remove_break_point(&hash, offset);
        self.breakpoints.remove(&offset)
    }

    pub fn breakpoints(&self) -> &HashSet<usize> {
        &self.breakpoints
    }

    /// Registers an extra syscall, kept across resets.
    pub fn register_interop(&mut self, name: &str, price: f64, handler: InteropHandler) {
        self.engine.interop_mut().register(name, price, handler);
        self.extra_interops.push((name.to_string(), price, handler));
    }

    pub fn set_witness_mode(&mut self, mode: WitnessMode) {
        self.witness_mode = mode;
        self.host_mut().witness_mode = mode;
    }

    pub fn set_trigger(&mut self, trigger: TriggerType) {
        self.trigger = trigger;
        self.host_mut().trigger = trigger;
    }

    pub fn set_timestamp_override(&mut self, timestamp: Option<u64>) {
        self.timestamp_override = timestamp;
        self.host_mut().timestamp_override = timestamp;
    }

    /// Sets the script container consumed by the next reset.
    pub fn set_transaction(&mut self, transaction: Transaction) {
        self.transaction = Some(transaction);
    }

    pub fn state(&self) -> DebuggerState {
        self.state
    }

    pub fn used_gas(&self) -> f64 {
        self.used_gas
    }

    pub fn used_opcode_count(&self) -> u64 {
        self.used_opcode_count
    }

    pub fn contract_hash(&self) -> &[u8; 20] {
        &self.contract_hash
    }

    pub fn chain(&self) -> &Arc<RwLock<Blockchain>> {
        &self.chain
    }

    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ExecutionEngine {
        &mut self.engine
    }

    /// Runtime events emitted since the last reset, in order.
    pub fn events(&self) -> &[RuntimeEvent] {
        &self.host().events
    }

    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    pub fn profiler_mut(&mut self) -> &mut Profiler {
        &mut self.profiler
    }
}
