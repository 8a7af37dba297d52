use num_bigint::BigInt;

use super::*;
use crate::host::NullHost;
use crate::script_builder::ScriptBuilder;

fn engine_with(script: Vec<u8>) -> ExecutionEngine {
    let mut engine = ExecutionEngine::new(Box::new(NullHost), InteropService::new());
    engine.load_script(script);
    engine
}

fn run_to_end(engine: &mut ExecutionEngine) {
    while engine.state() == VMState::NONE {
        engine.step_into();
    }
}

fn top_int(engine: &ExecutionEngine) -> BigInt {
    engine.evaluation_stack().peek(0).unwrap().to_int().unwrap()
}

#[test]
fn push_and_ret_halts_with_value() {
    // PUSH3 RET
    let mut engine = engine_with(vec![0x53, 0x66]);
    run_to_end(&mut engine);

    assert!(engine.state().is_halt());
    assert_eq!(top_int(&engine), BigInt::from(3));
}

#[test]
fn add_two_literals() {
    // PUSH2 PUSH5 ADD RET
    let mut engine = engine_with(vec![0x52, 0x55, 0x93, 0x66]);
    run_to_end(&mut engine);

    assert!(engine.state().is_halt());
    assert_eq!(top_int(&engine), BigInt::from(7));
}

#[test]
fn division_by_zero_faults_at_offset() {
    // PUSH1 PUSH0 DIV RET; DIV sits at offset 2.
    let mut engine = engine_with(vec![0x51, 0x00, 0x96, 0x66]);
    run_to_end(&mut engine);

    assert!(engine.state().is_fault());
    assert_eq!(
        engine.current_context().unwrap().instruction_pointer(),
        2,
        "pointer must stay at the faulting instruction"
    );
    assert!(matches!(
        engine.last_error(),
        Some(VmError::DivisionByZero { .. })
    ));
}

#[test]
fn unknown_opcode_faults() {
    let mut engine = engine_with(vec![0x50]);
    run_to_end(&mut engine);

    assert!(engine.state().is_fault());
    assert!(matches!(
        engine.last_error(),
        Some(VmError::InvalidOpCode { opcode: 0x50, .. })
    ));
}

#[test]
fn stack_underflow_faults() {
    // ADD on an empty stack.
    let mut engine = engine_with(vec![0x93]);
    run_to_end(&mut engine);
    assert!(engine.state().is_fault());
}

#[test]
fn jmpif_takes_and_skips_branches() {
    // PUSH1 JMPIF +4 -> skips the PUSH2, lands on PUSH3.
    // offsets: 0 PUSH1, 1 JMPIF(+4 => 5), 4 PUSH2, 5 PUSH3, 6 RET
    let script = vec![0x51, 0x63, 0x04, 0x00, 0x52, 0x53, 0x66];
    let mut engine = engine_with(script.clone());
    run_to_end(&mut engine);
    assert!(engine.state().is_halt());
    assert_eq!(engine.evaluation_stack().len(), 1);
    assert_eq!(top_int(&engine), BigInt::from(3));

    // With PUSH0 the branch is not taken and both pushes execute.
    let mut script = script;
    script[0] = 0x00;
    let mut engine = engine_with(script);
    run_to_end(&mut engine);
    assert!(engine.state().is_halt());
    assert_eq!(engine.evaluation_stack().len(), 2);
}

#[test]
fn jump_out_of_bounds_faults() {
    // JMP +100 in a 3-byte script.
    let mut engine = engine_with(vec![0x62, 0x64, 0x00]);
    run_to_end(&mut engine);
    assert!(engine.state().is_fault());
    assert!(matches!(
        engine.last_error(),
        Some(VmError::BadJumpTarget { .. })
    ));
}

#[test]
fn call_and_ret_resume_the_caller() {
    // 0: CALL +5 (-> 5)   callee doubles via DUP ADD
    // 3: PUSH1            runs after the callee returns
    // 4: RET
    // 5: DUP ADD RET      (needs a value; push it first via loader below)
    let mut engine = ExecutionEngine::new(Box::new(NullHost), InteropService::new());
    engine.load_script(vec![0x65, 0x05, 0x00, 0x51, 0x66, 0x76, 0x93, 0x66]);
    engine.evaluation_stack_mut().push(StackItem::from_int(21));
    run_to_end(&mut engine);

    assert!(engine.state().is_halt());
    // Top is the PUSH1 from the caller, beneath it the doubled value.
    assert_eq!(top_int(&engine), BigInt::from(1));
    assert_eq!(
        engine.evaluation_stack().peek(1).unwrap().to_int().unwrap(),
        BigInt::from(42)
    );
}

#[test]
fn running_off_script_end_behaves_like_ret() {
    // PUSH1 with no RET.
    let mut engine = engine_with(vec![0x51]);
    run_to_end(&mut engine);
    assert!(engine.state().is_halt());
    assert_eq!(top_int(&engine), BigInt::from(1));
}

#[test]
fn breakpoint_sets_break_state_at_offset() {
    // PUSH1 PUSH2 ADD PUSH3 MUL RET with a breakpoint on MUL (offset 4).
    let mut engine = ExecutionEngine::new(Box::new(NullHost), InteropService::new());
    let script = engine.load_script(vec![0x51, 0x52, 0x93, 0x53, 0x95, 0x66]);
    engine.add_break_point(*script.hash(), 4);

    run_to_end(&mut engine);
    assert!(engine.state().is_break());
    assert_eq!(engine.current_context().unwrap().instruction_pointer(), 4);
    assert_eq!(top_int(&engine), BigInt::from(3));

    // Clearing BREAK resumes to completion.
    engine.clear_break_state();
    run_to_end(&mut engine);
    assert!(engine.state().is_halt());
    assert_eq!(top_int(&engine), BigInt::from(9));
}

#[test]
fn removed_breakpoint_does_not_fire() {
    let mut engine = ExecutionEngine::new(Box::new(NullHost), InteropService::new());
    let script = engine.load_script(vec![0x51, 0x52, 0x93, 0x66]);
    let hash = *script.hash();
    engine.add_break_point(hash, 2);
    assert!(engine.remove_break_point(&hash, 2));
    assert!(!engine.remove_break_point(&hash, 2));

    run_to_end(&mut engine);
    assert!(engine.state().is_halt());
}

#[test]
fn alt_stack_round_trip() {
    // PUSH5 TOALTSTACK DUPFROMALTSTACK FROMALTSTACK ADD RET
    let mut engine = engine_with(vec![0x55, 0x6B, 0x6A, 0x6C, 0x93, 0x66]);
    run_to_end(&mut engine);
    assert!(engine.state().is_halt());
    assert_eq!(top_int(&engine), BigInt::from(10));
}

#[test]
fn pack_and_unpack_round_trip() {
    // PUSH1 PUSH2 PUSH3 PUSH3 PACK UNPACK
    // PACK of 3 makes [3, 2, 1]; UNPACK pushes 1 2 3 then the count.
    let mut engine = engine_with(vec![0x51, 0x52, 0x53, 0x53, 0xC1, 0xC2, 0x66]);
    run_to_end(&mut engine);
    assert!(engine.state().is_halt());
    assert_eq!(top_int(&engine), BigInt::from(3)); // count
    assert_eq!(
        engine.evaluation_stack().peek(1).unwrap().to_int().unwrap(),
        BigInt::from(3) // array[0], the former stack top
    );
}

#[test]
fn setitem_mutates_shared_array() {
    // NEWARRAY(1) DUP PUSH0 PUSH7 SETITEM PUSH0 PICKITEM
    let mut engine = engine_with(vec![0x51, 0xC5, 0x76, 0x00, 0x57, 0xC4, 0x00, 0xC3, 0x66]);
    run_to_end(&mut engine);
    assert!(engine.state().is_halt());
    assert_eq!(top_int(&engine), BigInt::from(7));
}

#[test]
fn throwifnot_faults_on_false() {
    let mut engine = engine_with(vec![0x00, 0xF1, 0x66]);
    run_to_end(&mut engine);
    assert!(engine.state().is_fault());

    let mut engine = engine_with(vec![0x51, 0xF1, 0x66]);
    run_to_end(&mut engine);
    assert!(engine.state().is_halt());
}

#[test]
fn unknown_syscall_faults() {
    let mut builder = ScriptBuilder::new();
    builder.emit_syscall("No.Such.Service").unwrap();
    builder.emit_opcode(crate::op_code::OpCode::RET);

    let mut engine = engine_with(builder.into_bytes());
    run_to_end(&mut engine);

    assert!(engine.state().is_fault());
    assert_eq!(engine.last_syscall(), Some("No.Such.Service"));
    assert!(matches!(
        engine.last_error(),
        Some(VmError::UnknownSyscall { .. })
    ));
}

#[test]
fn registered_syscall_runs_and_reports_name() {
    let mut interop = InteropService::new();
    interop.register("Debug.PushFive", 0.001, |engine| {
        engine
            .evaluation_stack_mut()
            .push(StackItem::from_int(5));
        Ok(true)
    });

    let mut builder = ScriptBuilder::new();
    builder.emit_syscall("Debug.PushFive").unwrap();
    builder.emit_opcode(crate::op_code::OpCode::RET);

    let mut engine = ExecutionEngine::new(Box::new(NullHost), interop);
    engine.load_script(builder.into_bytes());
    run_to_end(&mut engine);

    assert!(engine.state().is_halt());
    assert_eq!(engine.last_syscall(), Some("Debug.PushFive"));
    assert_eq!(top_int(&engine), BigInt::from(5));
}

#[test]
fn cat_concatenates_byte_arrays() {
    // PUSHBYTES2 aa bb PUSHBYTES1 cc CAT RET
    let mut engine = engine_with(vec![0x02, 0xAA, 0xBB, 0x01, 0xCC, 0x7E, 0x66]);
    run_to_end(&mut engine);

    assert!(engine.state().is_halt());
    assert_eq!(
        engine.evaluation_stack().peek(0).unwrap().to_bytes().unwrap(),
        vec![0xAA, 0xBB, 0xCC]
    );
}

#[test]
fn substr_saturates_past_the_end() {
    // PUSHBYTES5 "hello" PUSH1 PUSH10 SUBSTR RET: index 1, count 10
    // runs off the end and yields "ello".
    let mut engine = engine_with(vec![
        0x05, b'h', b'e', b'l', b'l', b'o', 0x51, 0x5A, 0x7F, 0x66,
    ]);
    run_to_end(&mut engine);

    assert!(engine.state().is_halt());
    assert_eq!(
        engine.evaluation_stack().peek(0).unwrap().to_bytes().unwrap(),
        b"ello".to_vec()
    );
}

#[test]
fn left_truncates_and_size_measures() {
    // PUSHBYTES2 aa bb PUSH3 LEFT SIZE RET: LEFT past the end keeps
    // both bytes, SIZE reports 2.
    let mut engine = engine_with(vec![0x02, 0xAA, 0xBB, 0x53, 0x80, 0x82, 0x66]);
    run_to_end(&mut engine);

    assert!(engine.state().is_halt());
    assert_eq!(top_int(&engine), BigInt::from(2));
}

#[test]
fn right_faults_when_count_exceeds_length() {
    // PUSHBYTES2 aa bb PUSH3 RIGHT
    let mut engine = engine_with(vec![0x02, 0xAA, 0xBB, 0x53, 0x81, 0x66]);
    run_to_end(&mut engine);
    assert!(engine.state().is_fault());
}

#[test]
fn bitwise_ops_use_integer_semantics() {
    // PUSH6 PUSH3 AND RET -> 2
    let mut engine = engine_with(vec![0x56, 0x53, 0x84, 0x66]);
    run_to_end(&mut engine);
    assert_eq!(top_int(&engine), BigInt::from(2));

    // PUSH6 PUSH3 XOR RET -> 5
    let mut engine = engine_with(vec![0x56, 0x53, 0x86, 0x66]);
    run_to_end(&mut engine);
    assert_eq!(top_int(&engine), BigInt::from(5));

    // PUSH1 PUSH8 SHL RET -> 256
    let mut engine = engine_with(vec![0x51, 0x58, 0x98, 0x66]);
    run_to_end(&mut engine);
    assert_eq!(top_int(&engine), BigInt::from(256));
}

#[test]
fn comparison_ops_and_within() {
    // PUSH3 PUSH7 LT RET -> true
    let mut engine = engine_with(vec![0x53, 0x57, 0x9F, 0x66]);
    run_to_end(&mut engine);
    assert!(engine.evaluation_stack().peek(0).unwrap().to_bool());

    // PUSH3 PUSH7 MIN RET -> 3
    let mut engine = engine_with(vec![0x53, 0x57, 0xA3, 0x66]);
    run_to_end(&mut engine);
    assert_eq!(top_int(&engine), BigInt::from(3));

    // PUSH5 PUSH1 PUSH10 WITHIN RET -> 1 <= 5 < 10
    let mut engine = engine_with(vec![0x55, 0x51, 0x5A, 0xA5, 0x66]);
    run_to_end(&mut engine);
    assert!(engine.evaluation_stack().peek(0).unwrap().to_bool());

    // PUSH1 PUSH0 BOOLAND RET -> false
    let mut engine = engine_with(vec![0x51, 0x00, 0x9A, 0x66]);
    run_to_end(&mut engine);
    assert!(!engine.evaluation_stack().peek(0).unwrap().to_bool());
}

#[test]
fn oversized_integer_faults() {
    // Push a 33-byte operand and INC it.
    let mut builder = ScriptBuilder::new();
    builder.emit_push(&[0x01; 33]);
    builder.emit_opcode(crate::op_code::OpCode::INC);
    let mut engine = engine_with(builder.into_bytes());
    run_to_end(&mut engine);

    assert!(engine.state().is_fault());
    assert!(matches!(
        engine.last_error(),
        Some(VmError::IntegerOverflow { .. })
    ));
}
