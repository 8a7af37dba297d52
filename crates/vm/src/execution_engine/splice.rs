//! Byte-array splice instructions.

use super::ExecutionEngine;
use crate::error::{VmError, VmResult};
use crate::op_code::OpCode;
use crate::stack_item::{StackItem, MAX_ITEM_SIZE};

impl ExecutionEngine {
    pub(super) fn op_splice(&mut self, opcode: OpCode) -> VmResult<()> {
        match opcode {
            OpCode::CAT => {
                let right = self.evaluation_stack.pop_bytes()?;
                let mut left = self.evaluation_stack.pop_bytes()?;
                if left.len() + right.len() > MAX_ITEM_SIZE {
                    return Err(VmError::ItemTooLarge {
                        size: left.len() + right.len(),
                        limit: MAX_ITEM_SIZE,
                    });
                }
                left.extend_from_slice(&right);
                self.evaluation_stack.push(StackItem::from_bytes(left));
            }
            OpCode::SUBSTR => {
                let count = self.pop_count("SUBSTR", MAX_ITEM_SIZE)?;
                let index = self.pop_count("SUBSTR", MAX_ITEM_SIZE)?;
                let bytes = self.evaluation_stack.pop_bytes()?;
                let start = index.min(bytes.len());
                let end = (start + count).min(bytes.len());
                self.evaluation_stack
                    .push(StackItem::from_bytes(bytes[start..end].to_vec()));
            }
            OpCode::LEFT => {
                let count = self.pop_count("LEFT", MAX_ITEM_SIZE)?;
                let bytes = self.evaluation_stack.pop_bytes()?;
                let end = count.min(bytes.len());
                self.evaluation_stack
                    .push(StackItem::from_bytes(bytes[..end].to_vec()));
            }
            OpCode::RIGHT => {
                let count = self.pop_count("RIGHT", MAX_ITEM_SIZE)?;
                let bytes = self.evaluation_stack.pop_bytes()?;
                if count > bytes.len() {
                    return Err(VmError::invalid_operation(
                        "RIGHT",
                        format!("count {count} exceeds length {}", bytes.len()),
                    ));
                }
                self.evaluation_stack
                    .push(StackItem::from_bytes(bytes[bytes.len() - count..].to_vec()));
            }
            OpCode::SIZE => {
                let bytes = self.evaluation_stack.pop_bytes()?;
                self.evaluation_stack
                    .push(StackItem::from_int(bytes.len() as u64));
            }
            other => {
                return Err(VmError::invalid_operation(
                    other.mnemonic(),
                    "not a splice operation",
                ))
            }
        }
        Ok(())
    }
}
