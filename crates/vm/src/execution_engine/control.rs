//! Flow-control instructions: jumps, calls, returns, syscalls.

use super::ExecutionEngine;
use crate::error::{VmError, VmResult};
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::script::Script;

impl ExecutionEngine {
    pub(super) fn op_jump(&mut self, instruction: &Instruction) -> VmResult<()> {
        let take_branch = match instruction.opcode {
            OpCode::JMP => true,
            OpCode::JMPIF => self.evaluation_stack_mut().pop_bool()?,
            OpCode::JMPIFNOT => !self.evaluation_stack_mut().pop_bool()?,
            other => {
                return Err(VmError::invalid_operation(other.mnemonic(), "not a jump"))
            }
        };
        if !take_branch {
            return Ok(());
        }

        let target = self.checked_target(instruction)?;
        self.current_context_mut()
            .expect("jump executes within a context")
            .set_instruction_pointer(target);
        Ok(())
    }

    pub(super) fn op_call(&mut self, instruction: &Instruction) -> VmResult<()> {
        let target = self.checked_target(instruction)?;
        // The current frame already points past the operand; the callee
        // frame starts at the branch target and RET resumes the caller.
        let frame = self
            .current_context()
            .expect("call executes within a context")
            .fork_at(target);
        self.push_frame(frame)
    }

    pub(super) fn op_ret(&mut self) -> VmResult<()> {
        self.pop_frame()?;
        Ok(())
    }

    pub(super) fn op_appcall(&mut self, instruction: &Instruction, tail: bool) -> VmResult<()> {
        let mut hash: [u8; 20] = instruction
            .operand
            .as_slice()
            .try_into()
            .map_err(|_| {
                VmError::invalid_operation(
                    instruction.opcode.mnemonic(),
                    "operand is not a 20-byte script hash",
                )
            })?;

        // An all-zero operand is a dynamic invoke: the hash comes from the
        // evaluation stack instead.
        if hash == [0u8; 20] {
            let bytes = self.evaluation_stack_mut().pop_bytes()?;
            hash = bytes.as_slice().try_into().map_err(|_| {
                VmError::invalid_operation(
                    instruction.opcode.mnemonic(),
                    "dynamic invoke target is not a 20-byte script hash",
                )
            })?;
        }

        let bytes = self
            .host()
            .contract_script(&hash)
            .ok_or_else(|| VmError::ContractNotFound {
                hash: hex::encode(hash),
            })?;

        if tail {
            self.pop_frame()?;
        }
        let script = std::sync::Arc::new(Script::new(bytes));
        self.push_frame(crate::execution_context::ExecutionContext::new(script))
    }

    pub(super) fn op_syscall(&mut self, instruction: &Instruction) -> VmResult<()> {
        let name = instruction.syscall_name()?;
        self.set_last_syscall(name.clone());

        let descriptor = self
            .interop()
            .get(&name)
            .ok_or_else(|| VmError::UnknownSyscall { name: name.clone() })?;

        match (descriptor.handler)(self) {
            Ok(true) => Ok(()),
            Ok(false) => Err(VmError::SyscallFailed { name }),
            Err(err) => Err(err),
        }
    }

    pub(super) fn op_throw_if_not(&mut self) -> VmResult<()> {
        if self.evaluation_stack_mut().pop_bool()? {
            Ok(())
        } else {
            Err(VmError::Thrown {
                reason: "THROWIFNOT".to_string(),
            })
        }
    }

    fn checked_target(&self, instruction: &Instruction) -> VmResult<usize> {
        let target = instruction.jump_target()?;
        let length = self
            .current_context()
            .expect("branch executes within a context")
            .script()
            .len();
        if target < 0 || target as usize > length {
            return Err(VmError::BadJumpTarget { target, length });
        }
        Ok(target as usize)
    }

    pub(super) fn set_last_syscall(&mut self, name: String) {
        self.last_syscall = Some(name);
    }
}
