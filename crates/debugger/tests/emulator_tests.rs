//! End-to-end stepper scenarios against in-memory chains.

use std::sync::Arc;

use num_bigint::BigInt;
use parking_lot::RwLock;

use neodbg_chain::Blockchain;
use neodbg_debugger::{
    ArgValue, DebuggerStateKind, Emulator, RuntimeEvent, WitnessMode,
};
use neodbg_vm::{OpCode, ScriptBuilder, StackItem};

fn emulator_for(bytecode: Vec<u8>) -> Emulator {
    let mut chain = Blockchain::new();
    let hash = chain.deploy_contract("contract", bytecode);
    Emulator::new(Arc::new(RwLock::new(chain)), hash).unwrap()
}

fn top_int(emulator: &Emulator) -> BigInt {
    emulator
        .engine()
        .evaluation_stack()
        .peek(0)
        .unwrap()
        .to_int()
        .unwrap()
}

fn assert_gas(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "gas was {actual}, expected {expected}"
    );
}

#[test]
fn simple_return() {
    // PUSH3 RET, no arguments: exactly two steps to completion.
    let mut emulator = emulator_for(vec![0x53, 0x66]);
    assert_eq!(emulator.state().kind, DebuggerStateKind::Reset);
    assert_eq!(emulator.state().offset, 0);

    let first = emulator.step();
    assert_eq!(first.kind, DebuggerStateKind::Running);
    let second = emulator.step();
    assert_eq!(second.kind, DebuggerStateKind::Finished);

    assert_eq!(top_int(&emulator), BigInt::from(3));
    assert_gas(emulator.used_gas(), 0.001);
    assert_eq!(emulator.used_opcode_count(), 2);
}

#[test]
fn add_two_arguments() {
    // ADD RET with arguments [2, 5]: the loader pushes 5 then 2.
    let mut emulator = emulator_for(vec![0x93, 0x66]);
    emulator
        .reset(&[ArgValue::Int(BigInt::from(2)), ArgValue::Int(BigInt::from(5))])
        .unwrap();

    let state = emulator.run();
    assert_eq!(state.kind, DebuggerStateKind::Finished);
    assert_eq!(top_int(&emulator), BigInt::from(7));
}

#[test]
fn breakpoint_halts_then_resumes() {
    // PUSH1 PUSH2 ADD PUSH3 MUL RET; break on MUL at offset 4.
    let mut emulator = emulator_for(vec![0x51, 0x52, 0x93, 0x53, 0x95, 0x66]);
    emulator.set_breakpoint(4);

    let state = emulator.run();
    assert_eq!(state.kind, DebuggerStateKind::Break);
    assert_eq!(state.offset, 4);
    assert_eq!(top_int(&emulator), BigInt::from(3));
    assert_gas(emulator.used_gas(), 0.001); // only ADD billed so far

    let state = emulator.step();
    assert_eq!(state.kind, DebuggerStateKind::Running);
    let state = emulator.step();
    assert_eq!(state.kind, DebuggerStateKind::Finished);
    assert_eq!(top_int(&emulator), BigInt::from(9));
}

#[test]
fn divide_by_zero_faults_at_offset() {
    // PUSH1 PUSH0 DIV RET; DIV sits at offset 2.
    let mut emulator = emulator_for(vec![0x51, 0x00, 0x96, 0x66]);

    let state = emulator.run();
    assert_eq!(state.kind, DebuggerStateKind::Exception);
    assert_eq!(state.offset, 2);
    assert_gas(emulator.used_gas(), 0.001);
}

#[test]
fn storage_put_gas_scales_with_value_size() {
    // Push a 2048-byte value and a key, then GetContext + Put.
    let mut builder = ScriptBuilder::new();
    builder.emit_push(&vec![0x07; 2048]);
    builder.emit_push(b"key");
    builder.emit_syscall("Neo.Storage.GetContext").unwrap();
    builder.emit_syscall("Neo.Storage.Put").unwrap();
    builder.emit_opcode(OpCode::RET);

    let mut emulator = emulator_for(builder.into_bytes());

    // Two pushes are free.
    emulator.step();
    emulator.step();
    assert_gas(emulator.used_gas(), 0.0);

    // GetContext bills its base price.
    emulator.step();
    assert_gas(emulator.used_gas(), 0.001);

    // Put bills 1.0 * ceil(2048 / 1024) = 2.0.
    let before = emulator.used_gas();
    emulator.step();
    assert_gas(emulator.used_gas() - before, 2.0);

    // The profiler attributes the write to the synthetic STORAGE marker.
    let stats = emulator.profiler().opcode_stats();
    assert_eq!(stats[&OpCode::STORAGE].count, 1);
    assert_gas(stats[&OpCode::STORAGE].total_cost, 2.0);

    let state = emulator.run();
    assert_eq!(state.kind, DebuggerStateKind::Finished);

    // The write landed in the contract's address storage.
    let chain = emulator.chain().read();
    let address = chain.find_address_by_hash(emulator.contract_hash()).unwrap();
    assert_eq!(address.storage_get(b"key").map(<[u8]>::len), Some(2048));
}

#[test]
fn small_storage_put_bills_the_minimum() {
    let mut builder = ScriptBuilder::new();
    builder.emit_push(b"v");
    builder.emit_push(b"k");
    builder.emit_syscall("Neo.Storage.GetContext").unwrap();
    builder.emit_syscall("Neo.Storage.Put").unwrap();
    builder.emit_opcode(OpCode::RET);

    let mut emulator = emulator_for(builder.into_bytes());
    let state = emulator.run();
    assert_eq!(state.kind, DebuggerStateKind::Finished);
    // 0.001 GetContext + 1.0 Put + 0.001 RET.
    assert_gas(emulator.used_gas(), 1.002);
}

#[test]
fn gas_is_monotonic_and_reset_zeroes_it() {
    let mut emulator = emulator_for(vec![0x51, 0x52, 0x93, 0x53, 0x95, 0x66]);

    let mut previous = 0.0;
    loop {
        let state = emulator.step();
        assert!(emulator.used_gas() >= previous);
        previous = emulator.used_gas();
        if state.kind != DebuggerStateKind::Running {
            break;
        }
    }
    assert!(emulator.used_gas() > 0.0);

    emulator.reset(&[]).unwrap();
    assert_eq!(emulator.used_gas(), 0.0);
    assert_eq!(emulator.used_opcode_count(), 0);
    assert_eq!(emulator.state().kind, DebuggerStateKind::Reset);
    assert_eq!(emulator.state().offset, 0);
}

#[test]
fn breakpoints_survive_reset() {
    let mut emulator = emulator_for(vec![0x51, 0x52, 0x93, 0x66]);
    emulator.set_breakpoint(2);

    let state = emulator.run();
    assert_eq!(state.kind, DebuggerStateKind::Break);
    assert_eq!(state.offset, 2);

    // Reset rebuilds the engine; the breakpoint must be re-armed.
    emulator.reset(&[]).unwrap();
    let state = emulator.run();
    assert_eq!(state.kind, DebuggerStateKind::Break);
    assert_eq!(state.offset, 2);

    emulator.clear_breakpoint(2);
    emulator.reset(&[]).unwrap();
    let state = emulator.run();
    assert_eq!(state.kind, DebuggerStateKind::Finished);
}

#[test]
fn finished_state_is_sticky_until_reset() {
    let mut emulator = emulator_for(vec![0x53, 0x66]);
    let state = emulator.run();
    assert_eq!(state.kind, DebuggerStateKind::Finished);

    let again = emulator.step();
    assert_eq!(again, state);
}

#[test]
fn push_only_script_costs_nothing() {
    // PUSH1 PUSH2 PUSHBYTES2 aa bb PUSH16: all literal pushes.
    let mut emulator = emulator_for(vec![0x51, 0x52, 0x02, 0xAA, 0xBB, 0x60]);
    loop {
        let state = emulator.step();
        if state.kind != DebuggerStateKind::Running {
            assert_eq!(state.kind, DebuggerStateKind::Finished);
            break;
        }
    }
    // Only the implicit end-of-script return billed anything.
    assert_gas(emulator.used_gas(), 0.001);
}

#[test]
fn witness_mode_overrides_checkwitness() {
    let mut builder = ScriptBuilder::new();
    builder.emit_push(&[0x42; 20]);
    builder.emit_syscall("Neo.Runtime.CheckWitness").unwrap();
    builder.emit_opcode(OpCode::RET);
    let bytecode = builder.into_bytes();

    let mut emulator = emulator_for(bytecode.clone());
    emulator.set_witness_mode(WitnessMode::AlwaysTrue);
    emulator.reset(&[]).unwrap();
    assert_eq!(emulator.run().kind, DebuggerStateKind::Finished);
    assert!(emulator.engine().evaluation_stack().peek(0).unwrap().to_bool());

    let mut emulator = emulator_for(bytecode);
    emulator.set_witness_mode(WitnessMode::AlwaysFalse);
    emulator.reset(&[]).unwrap();
    assert_eq!(emulator.run().kind, DebuggerStateKind::Finished);
    assert!(!emulator.engine().evaluation_stack().peek(0).unwrap().to_bool());
}

#[test]
fn notifications_and_logs_are_observable() {
    let mut builder = ScriptBuilder::new();
    builder.emit_push(b"hello");
    builder.emit_syscall("Neo.Runtime.Log").unwrap();
    builder.emit_push_int(&BigInt::from(7));
    builder.emit_syscall("Neo.Runtime.Notify").unwrap();
    builder.emit_opcode(OpCode::RET);

    let mut emulator = emulator_for(builder.into_bytes());
    assert_eq!(emulator.run().kind, DebuggerStateKind::Finished);

    let events = emulator.events();
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], RuntimeEvent::Log(text) if text == "hello"));
    assert!(matches!(
        &events[1],
        RuntimeEvent::Notification(item) if item.equals(&StackItem::from_int(7))
    ));
}

#[test]
fn appcall_runs_the_callee_contract() {
    let mut chain = Blockchain::new();
    // Callee doubles its input: DUP ADD RET.
    let callee_hash = chain.deploy_contract("callee", vec![0x76, 0x93, 0x66]);

    // Caller pushes 21 and APPCALLs the callee.
    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(&BigInt::from(21));
    builder.emit_appcall(&callee_hash, false);
    builder.emit_opcode(OpCode::RET);
    let caller_hash = chain.deploy_contract("caller", builder.into_bytes());

    let mut emulator = Emulator::new(Arc::new(RwLock::new(chain)), caller_hash).unwrap();
    let state = emulator.run();
    assert_eq!(state.kind, DebuggerStateKind::Finished);
    assert_eq!(top_int(&emulator), BigInt::from(42));
}

#[test]
fn step_over_skips_the_call_body() {
    // 0: CALL +5 (-> 5)  3: PUSH1  4: RET  5: PUSH2 PUSH3 ADD RET
    let mut emulator = emulator_for(vec![0x65, 0x05, 0x00, 0x51, 0x66, 0x52, 0x53, 0x93, 0x66]);
    emulator.step(); // CALL: now inside the callee

    // step() from here would land at offset 6; step_over from the start
    // instead runs the whole callee.
    emulator.reset(&[]).unwrap();
    let state = emulator.step_over();
    assert_eq!(state.kind, DebuggerStateKind::Running);
    assert_eq!(state.offset, 3, "step_over must land after the call");
    assert_eq!(top_int(&emulator), BigInt::from(5));
}

#[test]
fn step_out_returns_to_the_caller() {
    // 0: CALL +5 (-> 5)  3: PUSH1  4: RET  5: PUSH2 PUSH3 ADD RET
    let mut emulator = emulator_for(vec![0x65, 0x05, 0x00, 0x51, 0x66, 0x52, 0x53, 0x93, 0x66]);
    emulator.step(); // CALL: inside the callee at offset 5

    let state = emulator.step_out();
    assert_eq!(state.kind, DebuggerStateKind::Running);
    assert_eq!(state.offset, 3, "step_out must stop after the callee returns");
    assert_eq!(top_int(&emulator), BigInt::from(5));
}

#[test]
fn dynamically_registered_interop_survives_reset() {
    let mut builder = ScriptBuilder::new();
    builder.emit_syscall("Test.PushNine").unwrap();
    builder.emit_opcode(OpCode::RET);

    let mut emulator = emulator_for(builder.into_bytes());
    emulator.register_interop("Test.PushNine", 0.05, |engine| {
        engine.evaluation_stack_mut().push(StackItem::from_int(9));
        Ok(true)
    });

    emulator.reset(&[]).unwrap();
    let state = emulator.run();
    assert_eq!(state.kind, DebuggerStateKind::Finished);
    assert_eq!(top_int(&emulator), BigInt::from(9));
    // 0.05 syscall + 0.001 RET.
    assert_gas(emulator.used_gas(), 0.051);
}

#[test]
fn list_arguments_arrive_as_vm_arrays() {
    // ARRAYSIZE RET over a single list argument.
    let mut emulator = emulator_for(vec![0xC0, 0x66]);
    emulator
        .reset(&[ArgValue::List(vec![
            ArgValue::Int(BigInt::from(1)),
            ArgValue::Int(BigInt::from(2)),
            ArgValue::Int(BigInt::from(3)),
        ])])
        .unwrap();

    let state = emulator.run();
    assert_eq!(state.kind, DebuggerStateKind::Finished);
    assert_eq!(top_int(&emulator), BigInt::from(3));
}

#[test]
fn byte_array_arguments_pack_per_byte() {
    // ARRAYSIZE RET over a byte-array argument: the marshalling
    // convention yields an array of single-byte integers.
    let mut emulator = emulator_for(vec![0xC0, 0x66]);
    emulator
        .reset(&[ArgValue::Bytes(vec![0xAA, 0xBB, 0xCC, 0xDD])])
        .unwrap();

    let state = emulator.run();
    assert_eq!(state.kind, DebuggerStateKind::Finished);
    assert_eq!(top_int(&emulator), BigInt::from(4));
}
