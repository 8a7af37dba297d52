//! The session façade driven by the UI.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use neodbg_chain::{Blockchain, Output, Transaction};
use neodbg_vm::Disassembler;

use crate::abi::ContractAbi;
use crate::arguments::ArgValue;
use crate::debug_map::DebugMap;
use crate::emulator::{DebuggerState, Emulator};
use crate::error::{DebugError, DebugResult};
use crate::host::{RuntimeEvent, TriggerType, WitnessMode};

/// Which line space breakpoints and the current line resolve against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugView {
    /// Source lines via the debug map.
    Source,
    /// Listing lines via the disassembler.
    Assembly,
}

/// Everything `SetDebugParameters` configures before a run.
#[derive(Debug, Clone, Default)]
pub struct DebugParameters {
    pub witness_mode: WitnessMode,
    pub trigger: TriggerType,
    /// Overrides `Runtime.GetTime` when set.
    pub timestamp: Option<u64>,
    /// Outputs attached to the synthesized transaction.
    pub outputs: Vec<Output>,
    pub args: Vec<ArgValue>,
}

struct Session {
    avm_path: PathBuf,
    chain_path: PathBuf,
    disassembler: Disassembler,
    debug_map: Option<DebugMap>,
    abi: Option<ContractAbi>,
    source: Option<String>,
    source_extension: Option<String>,
    view: DebugView,
    chain: Arc<RwLock<Blockchain>>,
    emulator: Emulator,
    current_line: Option<u32>,
    /// Forces a reset before the next step or run; set on Finished and
    /// Exception.
    reset_flag: bool,
    pending_args: Vec<ArgValue>,
}

/// Coordinates artifacts, the emulator and line resolution for one
/// debugging session.
///
/// Every public operation serializes on a session-wide mutex; `run` holds
/// it for its whole duration, so a UI issuing `run` from a worker thread
/// cannot interleave breakpoint edits or parameter changes with the
/// stepper loop.
pub struct DebugManager {
    session: Mutex<Session>,
}

impl std::fmt::Debug for DebugManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugManager").finish_non_exhaustive()
    }
}

impl DebugManager {
    /// Loads a compiled contract and its sibling artifacts.
    ///
    /// `<name>.avm` is required. `<name>.abi.json` and
    /// `<name>.debug.json` load when present; failures there are logged
    /// and recovered. A `<name>.neomap` file is a hard error: that format
    /// is retired and the contract needs recompiling. `<name>.chain`
    /// loads when present, otherwise a fresh chain is created.
    pub fn load_avm(path: &Path) -> DebugResult<Self> {
        let avm_bytes = std::fs::read(path).map_err(|err| DebugError::io(path, err))?;

        let neomap_path = path.with_extension("neomap");
        if neomap_path.exists() {
            return Err(DebugError::LegacyMapFile {
                path: neomap_path.display().to_string(),
            });
        }

        let disassembler = Disassembler::new(&avm_bytes).map_err(DebugError::Disassemble)?;

        let abi_path = path.with_extension("abi.json");
        let abi = if abi_path.exists() {
            match ContractAbi::load(&abi_path) {
                Ok(abi) => Some(abi),
                Err(err) => {
                    tracing::warn!(error = %err, "ignoring unreadable ABI");
                    None
                }
            }
        } else {
            None
        };

        let map_path = path.with_extension("debug.json");
        let debug_map = if map_path.exists() {
            match DebugMap::load(&map_path) {
                Ok(map) => Some(map),
                Err(err) => {
                    tracing::warn!(error = %err, "ignoring unreadable debug map");
                    None
                }
            }
        } else {
            None
        };

        let (source, source_extension) = match &debug_map {
            Some(map) => load_source(map, path),
            None => (None, None),
        };

        let chain_path = path.with_extension("chain");
        let chain = if chain_path.exists() {
            Blockchain::load(&chain_path)?
        } else {
            Blockchain::new()
        };
        let chain = Arc::new(RwLock::new(chain));

        let contract_name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "contract".to_string());
        let contract_hash = chain
            .write()
            .deploy_contract(&contract_name, avm_bytes);

        let mut emulator = Emulator::new(Arc::clone(&chain), contract_hash)?;
        if let Some(source) = &source {
            emulator.profiler_mut().set_source(source);
        }

        let view = if debug_map.is_some() {
            DebugView::Source
        } else {
            DebugView::Assembly
        };

        tracing::info!(
            path = %path.display(),
            contract = %contract_name,
            hash = %hex::encode(contract_hash),
            has_map = debug_map.is_some(),
            "loaded contract"
        );

        let mut session = Session {
            avm_path: path.to_path_buf(),
            chain_path,
            disassembler,
            debug_map,
            abi,
            source,
            source_extension,
            view,
            chain,
            emulator,
            current_line: None,
            reset_flag: false,
            pending_args: Vec::new(),
        };
        session.current_line = line_for_offset(&session, 0);
        let line = session.current_line;
        session.emulator.profiler_mut().set_current_line(line);

        Ok(Self {
            session: Mutex::new(session),
        })
    }

    /// Arms a breakpoint at the given line of the active view. Returns
    /// `false` when the line maps to no instruction.
    pub fn add_breakpoint(&self, line: u32) -> bool {
        let mut session = self.session.lock();
        match resolve_offset(&session, line) {
            Some(offset) => {
                session.emulator.set_breakpoint(offset);
                true
            }
            None => false,
        }
    }

    /// Disarms a breakpoint at the given line of the active view.
    pub fn remove_breakpoint(&self, line: u32) -> bool {
        let mut session = self.session.lock();
        match resolve_offset(&session, line) {
            Some(offset) => session.emulator.clear_breakpoint(offset),
            None => false,
        }
    }

    /// Advances one instruction, resetting first when the previous run
    /// finished or faulted.
    pub fn step(&self) -> DebugResult<DebuggerState> {
        let mut session = self.session.lock();
        ensure_fresh(&mut session)?;
        session.emulator.step();
        update_state(&mut session);
        Ok(session.emulator.state())
    }

    /// Runs until a breakpoint, completion or fault, resetting first when
    /// the previous run finished or faulted. The session mutex is held
    /// for the whole run.
    pub fn run(&self) -> DebugResult<DebuggerState> {
        let mut session = self.session.lock();
        ensure_fresh(&mut session)?;
        loop {
            let state = session.emulator.step();
            // Keep line attribution current between steps so profiler
            // costs land on the line being stepped through.
            session.current_line = line_for_offset(&session, state.offset);
            let line = session.current_line;
            session.emulator.profiler_mut().set_current_line(line);
            if state.kind != crate::emulator::DebuggerStateKind::Running {
                break;
            }
        }
        update_state(&mut session);
        Ok(session.emulator.state())
    }

    /// Swaps between source and assembly views without touching
    /// execution. Stays in assembly when no debug map is loaded.
    pub fn toggle_debug_mode(&self) -> DebugView {
        let mut session = self.session.lock();
        session.view = match session.view {
            DebugView::Source => DebugView::Assembly,
            DebugView::Assembly if session.debug_map.is_some() => DebugView::Source,
            DebugView::Assembly => DebugView::Assembly,
        };
        let view = session.view;
        session.current_line = line_for_offset(&session, session.emulator.state().offset);
        view
    }

    /// Applies witness mode, trigger, timestamp, transaction outputs and
    /// arguments, then resets the session.
    pub fn set_debug_parameters(&self, parameters: DebugParameters) -> DebugResult<()> {
        let mut session = self.session.lock();
        session.emulator.set_witness_mode(parameters.witness_mode);
        session.emulator.set_trigger(parameters.trigger);
        session.emulator.set_timestamp_override(parameters.timestamp);

        if !parameters.outputs.is_empty() {
            let mut transaction = Transaction::new();
            transaction.outputs = parameters.outputs;
            session.emulator.set_transaction(transaction);
        }

        session.pending_args = parameters.args;
        reset_session(&mut session)
    }

    /// Resets the emulator with the most recently supplied arguments.
    pub fn reset(&self) -> DebugResult<()> {
        let mut session = self.session.lock();
        reset_session(&mut session)
    }

    pub fn state(&self) -> DebuggerState {
        self.session.lock().emulator.state()
    }

    /// The line of the active view for the current offset.
    pub fn current_line(&self) -> Option<u32> {
        self.session.lock().current_line
    }

    pub fn view(&self) -> DebugView {
        self.session.lock().view
    }

    pub fn used_gas(&self) -> f64 {
        self.session.lock().emulator.used_gas()
    }

    pub fn used_opcode_count(&self) -> u64 {
        self.session.lock().emulator.used_opcode_count()
    }

    /// Runtime events (notifications, logs) since the last reset.
    pub fn events(&self) -> Vec<RuntimeEvent> {
        self.session.lock().emulator.events().to_vec()
    }

    /// The rendered assembly listing.
    pub fn disassembly(&self) -> String {
        self.session.lock().disassembler.text().to_string()
    }

    pub fn source(&self) -> Option<String> {
        self.session.lock().source.clone()
    }

    /// Extension of the source file named by the debug map, used for
    /// syntax highlighting.
    pub fn source_extension(&self) -> Option<String> {
        self.session.lock().source_extension.clone()
    }

    pub fn abi(&self) -> Option<ContractAbi> {
        self.session.lock().abi.clone()
    }

    /// The per-line profile as CSV.
    pub fn dump_profile(&self) -> String {
        self.session.lock().emulator.profiler().dump_csv()
    }

    /// Renders the evaluation stack top-down for the UI.
    pub fn stack_snapshot(&self) -> Vec<String> {
        let session = self.session.lock();
        session
            .emulator
            .engine()
            .evaluation_stack()
            .iter_top_down()
            .map(|item| format!("{item:?}"))
            .collect()
    }

    /// The path the chain snapshot persists to.
    pub fn chain_path(&self) -> PathBuf {
        self.session.lock().chain_path.clone()
    }

    pub fn avm_path(&self) -> PathBuf {
        self.session.lock().avm_path.clone()
    }
}

fn ensure_fresh(session: &mut Session) -> DebugResult<()> {
    if session.reset_flag {
        reset_session(session)?;
    }
    Ok(())
}

fn reset_session(session: &mut Session) -> DebugResult<()> {
    let args = session.pending_args.clone();
    session.emulator.reset(&args)?;
    session.reset_flag = false;
    session.current_line = line_for_offset(session, 0);
    let line = session.current_line;
    session.emulator.profiler_mut().set_current_line(line);
    Ok(())
}

/// Post-step bookkeeping: line resolution, profiler attribution, chain
/// persistence on completion, and the reset flag on terminal states.
fn update_state(session: &mut Session) {
    let state = session.emulator.state();
    session.current_line = line_for_offset(session, state.offset);
    let line = session.current_line;
    session.emulator.profiler_mut().set_current_line(line);

    if state.kind == crate::emulator::DebuggerStateKind::Finished {
        let chain = Arc::clone(&session.chain);
        let save_result = chain.read().save(&session.chain_path);
        if let Err(err) = save_result {
            tracing::warn!(error = %err, "failed to persist chain snapshot");
        }
    }
    if state.is_terminal() {
        session.reset_flag = true;
    }
}

fn resolve_offset(session: &Session, line: u32) -> Option<usize> {
    match session.view {
        DebugView::Source => session
            .debug_map
            .as_ref()
            .and_then(|map| map.resolve_offset(line)),
        DebugView::Assembly => session.disassembler.offset_for_line(line),
    }
}

fn line_for_offset(session: &Session, offset: usize) -> Option<u32> {
    match session.view {
        DebugView::Source => session
            .debug_map
            .as_ref()
            .and_then(|map| map.resolve_line(offset)),
        DebugView::Assembly => session.disassembler.line_for_offset(offset),
    }
}

/// Reads the source text named by the debug map's first entry. A missing
/// source file is a recoverable load error: the session continues with
/// line mapping but no source text.
fn load_source(map: &DebugMap, avm_path: &Path) -> (Option<String>, Option<String>) {
    let Some(url) = map.primary_url() else {
        return (None, None);
    };
    let source_path = {
        let raw = Path::new(url);
        if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            avm_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(raw)
        }
    };
    let extension = source_path
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned());
    match std::fs::read_to_string(&source_path) {
        Ok(text) => (Some(text), extension),
        Err(err) => {
            tracing::warn!(
                path = %source_path.display(),
                error = %err,
                "debug map references an unreadable source file"
            );
            (None, extension)
        }
    }
}
