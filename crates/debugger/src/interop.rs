//! The simulated syscall set.
//!
//! Handlers are plain functions over the engine; they reach the chain
//! snapshot, the script container and the debugger overrides by
//! downcasting the engine's host to [`EmulatorHost`]. Registration is
//! explicit: [`register_default_interops`] installs the whole set with
//! its gas prices, and the emulator re-applies any extra registrations
//! after every reset.

use neodbg_chain::{Block, Transaction};
use neodbg_vm::{
    ExecutionEngine, InteropInterface, InteropService, StackItem, VmError, VmResult,
};

use crate::host::{EmulatorHost, RuntimeEvent};

/// Opaque storage handle scoped to the executing contract's address.
#[derive(Debug, Clone)]
pub struct StorageContext {
    pub script_hash: [u8; 20],
}

impl InteropInterface for StorageContext {
    fn interface_type(&self) -> &str {
        "StorageContext"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Installs the simulated syscall set with its base gas prices.
///
/// Every `Neo.*` name is also registered under its legacy `AntShares.*`
/// alias, which still appears in older compiled contracts.
pub fn register_default_interops(service: &mut InteropService) {
    let entries: &[(&str, f64, neodbg_vm::InteropHandler)] = &[
        ("Neo.Runtime.GetTrigger", 0.001, runtime_get_trigger),
        ("Neo.Runtime.GetTime", 0.001, runtime_get_time),
        ("Neo.Runtime.CheckWitness", 0.2, runtime_check_witness),
        ("Neo.Runtime.Notify", 0.001, runtime_notify),
        ("Neo.Runtime.Log", 0.001, runtime_log),
        ("Neo.Blockchain.GetHeight", 0.001, blockchain_get_height),
        ("Neo.Blockchain.GetHeader", 0.1, blockchain_get_header),
        ("Neo.Header.GetTimestamp", 0.001, header_get_timestamp),
        ("Neo.Header.GetIndex", 0.001, header_get_index),
        ("Neo.Header.GetHash", 0.001, header_get_hash),
        ("Neo.Storage.GetContext", 0.001, storage_get_context),
        ("Neo.Storage.Get", 0.1, storage_get),
        ("Neo.Storage.Put", 1.0, storage_put),
        ("Neo.Storage.Delete", 1.0, storage_delete),
        ("Neo.Transaction.GetHash", 0.001, transaction_get_hash),
        ("Neo.Transaction.GetOutputs", 0.001, transaction_get_outputs),
        ("Neo.Transaction.GetInputs", 0.001, transaction_get_inputs),
        ("Neo.Output.GetValue", 0.001, output_get_value),
        ("Neo.Output.GetAssetId", 0.001, output_get_asset_id),
        ("Neo.Output.GetScriptHash", 0.001, output_get_script_hash),
    ];
    for (name, price, handler) in entries {
        service.register(name, *price, *handler);
        let alias = name.replacen("Neo.", "AntShares.", 1);
        service.register(&alias, *price, *handler);
    }

    service.register(
        "System.ExecutionEngine.GetScriptContainer",
        0.001,
        engine_get_script_container,
    );
    service.register(
        "System.ExecutionEngine.GetExecutingScriptHash",
        0.001,
        engine_get_executing_script_hash,
    );
    service.register(
        "System.ExecutionEngine.GetCallingScriptHash",
        0.001,
        engine_get_calling_script_hash,
    );
    service.register(
        "System.ExecutionEngine.GetEntryScriptHash",
        0.001,
        engine_get_entry_script_hash,
    );
}

fn host_ref(engine: &ExecutionEngine) -> VmResult<&EmulatorHost> {
    engine
        .host()
        .as_any()
        .downcast_ref::<EmulatorHost>()
        .ok_or_else(|| {
            VmError::invalid_operation("syscall", "engine host is not an emulator host")
        })
}

fn host_mut(engine: &mut ExecutionEngine) -> VmResult<&mut EmulatorHost> {
    engine
        .host_mut()
        .as_any_mut()
        .downcast_mut::<EmulatorHost>()
        .ok_or_else(|| {
            VmError::invalid_operation("syscall", "engine host is not an emulator host")
        })
}

fn pop_interface<T: 'static>(engine: &mut ExecutionEngine, expected: &str) -> VmResult<StackItem> {
    let item = engine.evaluation_stack_mut().pop()?;
    let matches = matches!(
        &item,
        StackItem::InteropInterface(interface) if interface.as_any().is::<T>()
    );
    if matches {
        Ok(item)
    } else {
        Err(VmError::invalid_cast(item.type_name(), expected))
    }
}

fn with_interface<T: 'static, R>(
    item: &StackItem,
    f: impl FnOnce(&T) -> R,
) -> VmResult<R> {
    match item {
        StackItem::InteropInterface(interface) => interface
            .as_any()
            .downcast_ref::<T>()
            .map(f)
            .ok_or_else(|| VmError::invalid_cast(interface.interface_type().to_string(), "host object")),
        other => Err(VmError::invalid_cast(other.type_name(), "InteropInterface")),
    }
}

fn runtime_get_trigger(engine: &mut ExecutionEngine) -> VmResult<bool> {
    let trigger = host_ref(engine)?.trigger as u8;
    engine
        .evaluation_stack_mut()
        .push(StackItem::from_int(trigger));
    Ok(true)
}

fn runtime_get_time(engine: &mut ExecutionEngine) -> VmResult<bool> {
    let time = host_ref(engine)?.current_time();
    engine.evaluation_stack_mut().push(StackItem::from_int(time));
    Ok(true)
}

fn runtime_check_witness(engine: &mut ExecutionEngine) -> VmResult<bool> {
    let hash = engine.evaluation_stack_mut().pop_bytes()?;
    let witnessed = host_ref(engine)?.check_witness(&hash);
    engine
        .evaluation_stack_mut()
        .push(StackItem::from_bool(witnessed));
    Ok(true)
}

fn runtime_notify(engine: &mut ExecutionEngine) -> VmResult<bool> {
    let state = engine.evaluation_stack_mut().pop()?;
    tracing::info!(target: "contract", event = ?state, "runtime notification");
    host_mut(engine)?.events.push(RuntimeEvent::Notification(state));
    Ok(true)
}

fn runtime_log(engine: &mut ExecutionEngine) -> VmResult<bool> {
    let message = engine.evaluation_stack_mut().pop_bytes()?;
    let message = String::from_utf8_lossy(&message).into_owned();
    tracing::info!(target: "contract", message = %message, "runtime log");
    host_mut(engine)?.events.push(RuntimeEvent::Log(message));
    Ok(true)
}

fn blockchain_get_height(engine: &mut ExecutionEngine) -> VmResult<bool> {
    let height = host_ref(engine)?.chain.read().current_height();
    engine
        .evaluation_stack_mut()
        .push(StackItem::from_int(height));
    Ok(true)
}

fn blockchain_get_header(engine: &mut ExecutionEngine) -> VmResult<bool> {
    let index = engine.evaluation_stack_mut().pop_int()?;
    let Some(index) = num_traits::ToPrimitive::to_u32(&index) else {
        return Ok(false);
    };
    let block = host_ref(engine)?.chain.read().block_at(index).cloned();
    match block {
        Some(block) => {
            engine
                .evaluation_stack_mut()
                .push(StackItem::from_interface(block));
            Ok(true)
        }
        None => Ok(false),
    }
}

fn header_get_timestamp(engine: &mut ExecutionEngine) -> VmResult<bool> {
    let header = pop_interface::<Block>(engine, "Header")?;
    let timestamp = with_interface::<Block, _>(&header, |block| block.timestamp())?;
    engine
        .evaluation_stack_mut()
        .push(StackItem::from_int(timestamp));
    Ok(true)
}

fn header_get_index(engine: &mut ExecutionEngine) -> VmResult<bool> {
    let header = pop_interface::<Block>(engine, "Header")?;
    let index = with_interface::<Block, _>(&header, |block| block.index())?;
    engine.evaluation_stack_mut().push(StackItem::from_int(index));
    Ok(true)
}

fn header_get_hash(engine: &mut ExecutionEngine) -> VmResult<bool> {
    let header = pop_interface::<Block>(engine, "Header")?;
    let hash = with_interface::<Block, _>(&header, |block| {
        let mut data = block.index().to_le_bytes().to_vec();
        data.extend_from_slice(&block.timestamp().to_le_bytes());
        neodbg_crypto::hash256(&data).to_vec()
    })?;
    engine.evaluation_stack_mut().push(StackItem::from_bytes(hash));
    Ok(true)
}

fn storage_get_context(engine: &mut ExecutionEngine) -> VmResult<bool> {
    let script_hash = host_ref(engine)?.contract_hash;
    engine
        .evaluation_stack_mut()
        .push(StackItem::from_interface(StorageContext { script_hash }));
    Ok(true)
}

fn pop_storage_context(engine: &mut ExecutionEngine) -> VmResult<[u8; 20]> {
    let context = pop_interface::<StorageContext>(engine, "StorageContext")?;
    with_interface::<StorageContext, _>(&context, |context| context.script_hash)
}

fn storage_get(engine: &mut ExecutionEngine) -> VmResult<bool> {
    let script_hash = pop_storage_context(engine)?;
    let key = engine.evaluation_stack_mut().pop_bytes()?;
    let value = host_ref(engine)?
        .chain
        .read()
        .find_address_by_hash(&script_hash)
        .and_then(|address| address.storage_get(&key).map(<[u8]>::to_vec))
        .unwrap_or_default();
    engine.evaluation_stack_mut().push(StackItem::from_bytes(value));
    Ok(true)
}

fn storage_put(engine: &mut ExecutionEngine) -> VmResult<bool> {
    let script_hash = pop_storage_context(engine)?;
    let key = engine.evaluation_stack_mut().pop_bytes()?;
    let value = engine.evaluation_stack_mut().pop_bytes()?;

    let host = host_mut(engine)?;
    host.last_storage_bytes = value.len();
    let mut chain = host.chain.write();
    match chain.find_address_by_hash_mut(&script_hash) {
        Some(address) => {
            address.storage_put(&key, &value);
            Ok(true)
        }
        None => Ok(false),
    }
}

fn storage_delete(engine: &mut ExecutionEngine) -> VmResult<bool> {
    let script_hash = pop_storage_context(engine)?;
    let key = engine.evaluation_stack_mut().pop_bytes()?;
    let host = host_ref(engine)?;
    let mut chain = host.chain.write();
    match chain.find_address_by_hash_mut(&script_hash) {
        Some(address) => {
            address.storage_delete(&key);
            Ok(true)
        }
        None => Ok(false),
    }
}

fn transaction_get_hash(engine: &mut ExecutionEngine) -> VmResult<bool> {
    let item = pop_interface::<Transaction>(engine, "Transaction")?;
    let hash = with_interface::<Transaction, _>(&item, |tx| tx.hash().to_vec())?;
    engine.evaluation_stack_mut().push(StackItem::from_bytes(hash));
    Ok(true)
}

fn transaction_get_outputs(engine: &mut ExecutionEngine) -> VmResult<bool> {
    let item = pop_interface::<Transaction>(engine, "Transaction")?;
    let outputs = with_interface::<Transaction, _>(&item, |tx| {
        tx.outputs
            .iter()
            .map(|output| StackItem::from_interface(output.clone()))
            .collect::<Vec<_>>()
    })?;
    engine
        .evaluation_stack_mut()
        .push(StackItem::from_array(outputs));
    Ok(true)
}

fn transaction_get_inputs(engine: &mut ExecutionEngine) -> VmResult<bool> {
    let item = pop_interface::<Transaction>(engine, "Transaction")?;
    let inputs = with_interface::<Transaction, _>(&item, |tx| {
        tx.inputs
            .iter()
            .map(|input| StackItem::from_interface(input.clone()))
            .collect::<Vec<_>>()
    })?;
    engine
        .evaluation_stack_mut()
        .push(StackItem::from_array(inputs));
    Ok(true)
}

fn output_get_value(engine: &mut ExecutionEngine) -> VmResult<bool> {
    let item = pop_interface::<neodbg_chain::Output>(engine, "TransactionOutput")?;
    let amount = with_interface::<neodbg_chain::Output, _>(&item, |output| output.amount)?;
    engine.evaluation_stack_mut().push(StackItem::from_int(amount));
    Ok(true)
}

fn output_get_asset_id(engine: &mut ExecutionEngine) -> VmResult<bool> {
    let item = pop_interface::<neodbg_chain::Output>(engine, "TransactionOutput")?;
    let asset = with_interface::<neodbg_chain::Output, _>(&item, |output| output.asset_id.clone())?;
    engine.evaluation_stack_mut().push(StackItem::from_bytes(asset));
    Ok(true)
}

fn output_get_script_hash(engine: &mut ExecutionEngine) -> VmResult<bool> {
    let item = pop_interface::<neodbg_chain::Output>(engine, "TransactionOutput")?;
    let hash =
        with_interface::<neodbg_chain::Output, _>(&item, |output| output.script_hash.to_vec())?;
    engine.evaluation_stack_mut().push(StackItem::from_bytes(hash));
    Ok(true)
}

fn engine_get_script_container(engine: &mut ExecutionEngine) -> VmResult<bool> {
    let transaction = host_ref(engine)?.transaction.clone();
    engine
        .evaluation_stack_mut()
        .push(StackItem::from_interface(transaction));
    Ok(true)
}

fn engine_get_executing_script_hash(engine: &mut ExecutionEngine) -> VmResult<bool> {
    let hash = engine
        .current_context()
        .map(|context| context.script_hash().to_vec())
        .unwrap_or_default();
    engine.evaluation_stack_mut().push(StackItem::from_bytes(hash));
    Ok(true)
}

fn engine_get_calling_script_hash(engine: &mut ExecutionEngine) -> VmResult<bool> {
    let contexts = engine.invocation_stack();
    let hash = contexts
        .len()
        .checked_sub(2)
        .and_then(|index| contexts.get(index))
        .map(|context| context.script_hash().to_vec())
        .unwrap_or_default();
    engine.evaluation_stack_mut().push(StackItem::from_bytes(hash));
    Ok(true)
}

fn engine_get_entry_script_hash(engine: &mut ExecutionEngine) -> VmResult<bool> {
    let hash = engine
        .invocation_stack()
        .first()
        .map(|context| context.script_hash().to_vec())
        .unwrap_or_default();
    engine.evaluation_stack_mut().push(StackItem::from_bytes(hash));
    Ok(true)
}
