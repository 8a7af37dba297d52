//! The bytecode interpreter.

mod compound;
mod control;
mod crypto_ops;
mod numeric;
mod splice;
mod stack_ops;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use num_bigint::BigInt;

use crate::error::{VmError, VmResult};
use crate::evaluation_stack::EvaluationStack;
use crate::execution_context::ExecutionContext;
use crate::host::VmHost;
use crate::instruction::Instruction;
use crate::interop_service::InteropService;
use crate::op_code::OpCode;
use crate::script::Script;
use crate::stack_item::StackItem;
use crate::vm_state::VMState;

/// Invocation contexts allowed before CALL/APPCALL faults.
pub const MAX_INVOCATION_DEPTH: usize = 1024;

/// Executes scripts one instruction at a time.
///
/// The evaluation and alt stacks are engine-level and shared by every
/// invocation context, so a loader script can leave arguments for the
/// contract script loaded beneath it. Faults never unwind: they flip the
/// FAULT flag, record the error, and leave the instruction pointer at the
/// faulting offset so a debugger can inspect the scene.
pub struct ExecutionEngine {
    invocation_stack: Vec<ExecutionContext>,
    evaluation_stack: EvaluationStack,
    alt_stack: EvaluationStack,
    state: VMState,
    break_points: HashMap<[u8; 20], HashSet<usize>>,
    interop: InteropService,
    host: Box<dyn VmHost>,
    last_opcode: Option<OpCode>,
    last_syscall: Option<String>,
    last_error: Option<VmError>,
}

impl ExecutionEngine {
    pub fn new(host: Box<dyn VmHost>, interop: InteropService) -> Self {
        Self {
            invocation_stack: Vec::new(),
            evaluation_stack: EvaluationStack::new(),
            alt_stack: EvaluationStack::new(),
            state: VMState::NONE,
            break_points: HashMap::new(),
            interop,
            host,
            last_opcode: None,
            last_syscall: None,
            last_error: None,
        }
    }

    /// Pushes a new invocation context for `bytes` with the instruction
    /// pointer at zero. Returns the script for breakpoint registration.
    pub fn load_script(&mut self, bytes: Vec<u8>) -> Arc<Script> {
        let script = Arc::new(Script::new(bytes));
        self.invocation_stack
            .push(ExecutionContext::new(Arc::clone(&script)));
        script
    }

    pub fn state(&self) -> VMState {
        self.state
    }

    pub fn set_state(&mut self, state: VMState) {
        self.state = state;
    }

    /// Drops the BREAK flag so the next step resumes execution.
    pub fn clear_break_state(&mut self) {
        self.state.remove(VMState::BREAK);
    }

    pub fn current_context(&self) -> Option<&ExecutionContext> {
        self.invocation_stack.last()
    }

    pub fn current_context_mut(&mut self) -> Option<&mut ExecutionContext> {
        self.invocation_stack.last_mut()
    }

    pub fn invocation_depth(&self) -> usize {
        self.invocation_stack.len()
    }

    /// The invocation contexts, bottom (entry script) first.
    pub fn invocation_stack(&self) -> &[ExecutionContext] {
        &self.invocation_stack
    }

    pub fn evaluation_stack(&self) -> &EvaluationStack {
        &self.evaluation_stack
    }

    pub fn evaluation_stack_mut(&mut self) -> &mut EvaluationStack {
        &mut self.evaluation_stack
    }

    pub fn alt_stack(&self) -> &EvaluationStack {
        &self.alt_stack
    }

    /// The opcode executed by the most recent step.
    pub fn last_opcode(&self) -> Option<OpCode> {
        self.last_opcode
    }

    /// The syscall name dispatched by the most recent step, if it was a
    /// SYSCALL.
    pub fn last_syscall(&self) -> Option<&str> {
        self.last_syscall.as_deref()
    }

    /// The error behind the FAULT flag, if the engine has faulted.
    pub fn last_error(&self) -> Option<&VmError> {
        self.last_error.as_ref()
    }

    pub fn interop(&self) -> &InteropService {
        &self.interop
    }

    pub fn interop_mut(&mut self) -> &mut InteropService {
        &mut self.interop
    }

    pub fn host(&self) -> &dyn VmHost {
        self.host.as_ref()
    }

    pub fn host_mut(&mut self) -> &mut dyn VmHost {
        self.host.as_mut()
    }

    /// Arms a breakpoint at `position` in the script identified by `hash`.
    pub fn add_break_point(&mut self, hash: [u8; 20], position: usize) {
        self.break_points.entry(hash).or_default().insert(position);
    }

    /// Disarms a breakpoint; returns whether one was armed.
    pub fn remove_break_point(&mut self, hash: &[u8; 20], position: usize) -> bool {
        match self.break_points.get_mut(hash) {
            Some(set) => {
                let removed = set.remove(&position);
                if set.is_empty() {
                    self.break_points.remove(hash);
                }
                removed
            }
            None => false,
        }
    }

    /// Executes one instruction.
    ///
    /// Advances the instruction pointer past the instruction and its inline
    /// operand, runs the opcode (which may push or pop contexts), then
    /// flips BREAK if the new pointer sits on an armed breakpoint. A fault
    /// flips FAULT and leaves the pointer at the faulting offset.
    pub fn step_into(&mut self) {
        if self.state.intersects(VMState::HALT | VMState::FAULT) {
            return;
        }
        self.last_syscall = None;

        match self.execute_next() {
            Ok(()) => {
                if self.invocation_stack.is_empty() {
                    self.state.insert(VMState::HALT);
                } else {
                    self.check_break_points();
                }
            }
            Err(err) => {
                tracing::debug!(error = %err, "engine faulted");
                self.state.insert(VMState::FAULT);
                self.last_error = Some(err);
            }
        }
    }

    fn execute_next(&mut self) -> VmResult<()> {
        let context = self
            .invocation_stack
            .last()
            .ok_or_else(|| VmError::invalid_operation("step", "no script loaded"))?;
        let offset = context.instruction_pointer();

        // Running off the end of a script behaves like RET.
        if offset >= context.script().len() {
            self.last_opcode = Some(OpCode::RET);
            return self.op_ret();
        }

        let instruction = context.script().instruction_at(offset)?;
        self.last_opcode = Some(instruction.opcode);

        // Advance past the instruction first; control flow overwrites this,
        // and a fault rolls it back below.
        if let Some(context) = self.invocation_stack.last_mut() {
            context.set_instruction_pointer(instruction.next_offset());
        }

        let result = self.execute_instruction(&instruction);
        if result.is_err() {
            if let Some(context) = self.invocation_stack.last_mut() {
                context.set_instruction_pointer(offset);
            }
        }
        result
    }

    fn execute_instruction(&mut self, instruction: &Instruction) -> VmResult<()> {
        use OpCode::*;

        let opcode = instruction.opcode;

        // Literal pushes.
        if opcode == PUSH0 {
            self.evaluation_stack.push(StackItem::from_bytes(Vec::new()));
            return Ok(());
        }
        if opcode.is_push_bytes() || matches!(opcode, PUSHDATA1 | PUSHDATA2 | PUSHDATA4) {
            self.evaluation_stack
                .push(StackItem::from_bytes(instruction.operand.clone()));
            return Ok(());
        }
        if opcode == PUSHM1 {
            self.evaluation_stack.push(StackItem::from_int(-1));
            return Ok(());
        }
        if (PUSH1 as u8..=PUSH16 as u8).contains(&(opcode as u8)) {
            let value = opcode as u8 - PUSH1 as u8 + 1;
            self.evaluation_stack.push(StackItem::from_int(value));
            return Ok(());
        }

        match opcode {
            NOP => Ok(()),
            JMP | JMPIF | JMPIFNOT => self.op_jump(instruction),
            CALL => self.op_call(instruction),
            RET => self.op_ret(),
            APPCALL => self.op_appcall(instruction, false),
            TAILCALL => self.op_appcall(instruction, true),
            SYSCALL => self.op_syscall(instruction),
            THROW => Err(VmError::Thrown {
                reason: "THROW".to_string(),
            }),
            THROWIFNOT => self.op_throw_if_not(),

            DUPFROMALTSTACK | TOALTSTACK | FROMALTSTACK => self.op_alt_stack(opcode),
            XDROP | XSWAP | XTUCK | DEPTH | DROP | DUP | NIP | OVER | PICK | ROLL | ROT
            | SWAP | TUCK => self.op_stack(opcode),

            CAT | SUBSTR | LEFT | RIGHT | SIZE => self.op_splice(opcode),

            INVERT | AND | OR | XOR | EQUAL | INC | DEC | SIGN | NEGATE | ABS | NOT | NZ
            | ADD | SUB | MUL | DIV | MOD | SHL | SHR | BOOLAND | BOOLOR | NUMEQUAL
            | NUMNOTEQUAL | LT | GT | LTE | GTE | MIN | MAX | WITHIN => self.op_numeric(opcode),

            SHA1 | SHA256 | HASH160 | HASH256 | CHECKSIG | VERIFY | CHECKMULTISIG => {
                self.op_crypto(opcode)
            }

            ARRAYSIZE | PACK | UNPACK | PICKITEM | SETITEM | NEWARRAY | NEWSTRUCT | NEWMAP
            | APPEND | REVERSE | REMOVE | HASKEY | KEYS | VALUES => self.op_compound(opcode),

            other => Err(VmError::invalid_operation(
                other.mnemonic(),
                "not executable",
            )),
        }
    }

    fn check_break_points(&mut self) {
        if self.break_points.is_empty() {
            return;
        }
        let Some(context) = self.invocation_stack.last() else {
            return;
        };
        let hash = *context.script_hash();
        let position = context.instruction_pointer();
        if self
            .break_points
            .get(&hash)
            .is_some_and(|set| set.contains(&position))
        {
            self.state.insert(VMState::BREAK);
        }
    }

    pub(crate) fn push_frame(&mut self, frame: ExecutionContext) -> VmResult<()> {
        if self.invocation_stack.len() >= MAX_INVOCATION_DEPTH {
            return Err(VmError::CallDepthExceeded {
                depth: self.invocation_stack.len(),
                limit: MAX_INVOCATION_DEPTH,
            });
        }
        self.invocation_stack.push(frame);
        Ok(())
    }

    pub(crate) fn pop_frame(&mut self) -> VmResult<ExecutionContext> {
        self.invocation_stack
            .pop()
            .ok_or_else(|| VmError::invalid_operation("RET", "invocation stack is empty"))
    }

    pub(crate) fn pop_count(&mut self, operation: &str, max: usize) -> VmResult<usize> {
        let value = self.evaluation_stack.pop_int()?;
        let count = crate::stack_item::to_index(&value, operation)?;
        if count > max {
            return Err(VmError::invalid_operation(
                operation,
                format!("count {count} exceeds limit {max}"),
            ));
        }
        Ok(count)
    }

    pub(crate) fn bin_int_op(
        &mut self,
        operation: &str,
        f: impl FnOnce(BigInt, BigInt) -> VmResult<BigInt>,
    ) -> VmResult<()> {
        let right = self.evaluation_stack.pop_int()?;
        let left = self.evaluation_stack.pop_int()?;
        crate::stack_item::check_integer_size(&left, operation)?;
        crate::stack_item::check_integer_size(&right, operation)?;
        let result = f(left, right)?;
        crate::stack_item::check_integer_size(&result, operation)?;
        self.evaluation_stack.push(StackItem::from_int(result));
        Ok(())
    }

    pub(crate) fn unary_int_op(
        &mut self,
        operation: &str,
        f: impl FnOnce(BigInt) -> VmResult<BigInt>,
    ) -> VmResult<()> {
        let value = self.evaluation_stack.pop_int()?;
        crate::stack_item::check_integer_size(&value, operation)?;
        let result = f(value)?;
        crate::stack_item::check_integer_size(&result, operation)?;
        self.evaluation_stack.push(StackItem::from_int(result));
        Ok(())
    }

    pub(crate) fn int_cmp_op(
        &mut self,
        f: impl FnOnce(&BigInt, &BigInt) -> bool,
    ) -> VmResult<()> {
        let right = self.evaluation_stack.pop_int()?;
        let left = self.evaluation_stack.pop_int()?;
        self.evaluation_stack
            .push(StackItem::from_bool(f(&left, &right)));
        Ok(())
    }
}

#[cfg(test)]
mod tests;
