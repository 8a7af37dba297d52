//! Stack-manipulation instructions.

use super::ExecutionEngine;
use crate::error::{VmError, VmResult};
use crate::op_code::OpCode;
use crate::stack_item::StackItem;

impl ExecutionEngine {
    pub(super) fn op_alt_stack(&mut self, opcode: OpCode) -> VmResult<()> {
        match opcode {
            OpCode::DUPFROMALTSTACK => {
                let item = self.alt_stack.peek(0)?.clone();
                self.evaluation_stack.push(item);
            }
            OpCode::TOALTSTACK => {
                let item = self.evaluation_stack.pop()?;
                self.alt_stack.push(item);
            }
            OpCode::FROMALTSTACK => {
                let item = self.alt_stack.pop()?;
                self.evaluation_stack.push(item);
            }
            other => {
                return Err(VmError::invalid_operation(
                    other.mnemonic(),
                    "not an alt-stack operation",
                ))
            }
        }
        Ok(())
    }

    pub(super) fn op_stack(&mut self, opcode: OpCode) -> VmResult<()> {
        match opcode {
            OpCode::XDROP => {
                let depth = self.pop_count("XDROP", usize::MAX)?;
                self.evaluation_stack.remove(depth)?;
            }
            OpCode::XSWAP => {
                let depth = self.pop_count("XSWAP", usize::MAX)?;
                self.evaluation_stack.swap_with_top(depth)?;
            }
            OpCode::XTUCK => {
                let depth = self.pop_count("XTUCK", usize::MAX)?;
                let item = self.evaluation_stack.peek(0)?.clone();
                self.evaluation_stack.insert(depth, item)?;
            }
            OpCode::DEPTH => {
                let depth = self.evaluation_stack.len();
                self.evaluation_stack.push(StackItem::from_int(depth as u64));
            }
            OpCode::DROP => {
                self.evaluation_stack.pop()?;
            }
            OpCode::DUP => {
                let item = self.evaluation_stack.peek(0)?.clone();
                self.evaluation_stack.push(item);
            }
            OpCode::NIP => {
                self.evaluation_stack.remove(1)?;
            }
            OpCode::OVER => {
                let item = self.evaluation_stack.peek(1)?.clone();
                self.evaluation_stack.push(item);
            }
            OpCode::PICK => {
                let depth = self.pop_count("PICK", usize::MAX)?;
                let item = self.evaluation_stack.peek(depth)?.clone();
                self.evaluation_stack.push(item);
            }
            OpCode::ROLL => {
                let depth = self.pop_count("ROLL", usize::MAX)?;
                if depth > 0 {
                    let item = self.evaluation_stack.remove(depth)?;
                    self.evaluation_stack.push(item);
                }
            }
            OpCode::ROT => {
                let item = self.evaluation_stack.remove(2)?;
                self.evaluation_stack.push(item);
            }
            OpCode::SWAP => {
                self.evaluation_stack.swap_with_top(1)?;
            }
            OpCode::TUCK => {
                let item = self.evaluation_stack.peek(0)?.clone();
                self.evaluation_stack.insert(2, item)?;
            }
            other => {
                return Err(VmError::invalid_operation(
                    other.mnemonic(),
                    "not a stack operation",
                ))
            }
        }
        Ok(())
    }
}
