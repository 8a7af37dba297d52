//! Arithmetic, bitwise and comparison instructions on unbounded integers.

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use super::ExecutionEngine;
use crate::error::{VmError, VmResult};
use crate::op_code::OpCode;
use crate::stack_item::StackItem;

/// Largest shift distance SHL/SHR accept.
const MAX_SHIFT: usize = 256;

impl ExecutionEngine {
    pub(super) fn op_numeric(&mut self, opcode: OpCode) -> VmResult<()> {
        match opcode {
            OpCode::INVERT => self.unary_int_op("INVERT", |x| Ok(-x - 1)),
            OpCode::AND => self.bin_int_op("AND", |a, b| Ok(a & b)),
            OpCode::OR => self.bin_int_op("OR", |a, b| Ok(a | b)),
            OpCode::XOR => self.bin_int_op("XOR", |a, b| Ok(a ^ b)),
            OpCode::EQUAL => {
                let right = self.evaluation_stack.pop()?;
                let left = self.evaluation_stack.pop()?;
                self.evaluation_stack
                    .push(StackItem::from_bool(left.equals(&right)));
                Ok(())
            }
            OpCode::INC => self.unary_int_op("INC", |x| Ok(x + 1)),
            OpCode::DEC => self.unary_int_op("DEC", |x| Ok(x - 1)),
            OpCode::SIGN => self.unary_int_op("SIGN", |x| Ok(x.signum())),
            OpCode::NEGATE => self.unary_int_op("NEGATE", |x| Ok(-x)),
            OpCode::ABS => self.unary_int_op("ABS", |x| Ok(x.abs())),
            OpCode::NOT => {
                let value = self.evaluation_stack.pop_bool()?;
                self.evaluation_stack.push(StackItem::from_bool(!value));
                Ok(())
            }
            OpCode::NZ => {
                let value = self.evaluation_stack.pop_int()?;
                self.evaluation_stack
                    .push(StackItem::from_bool(!value.is_zero()));
                Ok(())
            }
            OpCode::ADD => self.bin_int_op("ADD", |a, b| Ok(a + b)),
            OpCode::SUB => self.bin_int_op("SUB", |a, b| Ok(a - b)),
            OpCode::MUL => self.bin_int_op("MUL", |a, b| Ok(a * b)),
            OpCode::DIV => self.bin_int_op("DIV", |a, b| {
                if b.is_zero() {
                    return Err(VmError::division_by_zero("DIV"));
                }
                Ok(a / b)
            }),
            OpCode::MOD => self.bin_int_op("MOD", |a, b| {
                if b.is_zero() {
                    return Err(VmError::division_by_zero("MOD"));
                }
                Ok(a % b)
            }),
            OpCode::SHL => self.bin_int_op("SHL", |a, shift| {
                let shift = checked_shift(&shift)?;
                Ok(a << shift)
            }),
            OpCode::SHR => self.bin_int_op("SHR", |a, shift| {
                let shift = checked_shift(&shift)?;
                Ok(a >> shift)
            }),
            OpCode::BOOLAND => {
                let right = self.evaluation_stack.pop_bool()?;
                let left = self.evaluation_stack.pop_bool()?;
                self.evaluation_stack
                    .push(StackItem::from_bool(left && right));
                Ok(())
            }
            OpCode::BOOLOR => {
                let right = self.evaluation_stack.pop_bool()?;
                let left = self.evaluation_stack.pop_bool()?;
                self.evaluation_stack
                    .push(StackItem::from_bool(left || right));
                Ok(())
            }
            OpCode::NUMEQUAL => self.int_cmp_op(|a, b| a == b),
            OpCode::NUMNOTEQUAL => self.int_cmp_op(|a, b| a != b),
            OpCode::LT => self.int_cmp_op(|a, b| a < b),
            OpCode::GT => self.int_cmp_op(|a, b| a > b),
            OpCode::LTE => self.int_cmp_op(|a, b| a <= b),
            OpCode::GTE => self.int_cmp_op(|a, b| a >= b),
            OpCode::MIN => self.bin_int_op("MIN", |a, b| Ok(a.min(b))),
            OpCode::MAX => self.bin_int_op("MAX", |a, b| Ok(a.max(b))),
            OpCode::WITHIN => {
                let upper = self.evaluation_stack.pop_int()?;
                let lower = self.evaluation_stack.pop_int()?;
                let value = self.evaluation_stack.pop_int()?;
                self.evaluation_stack
                    .push(StackItem::from_bool(lower <= value && value < upper));
                Ok(())
            }
            other => Err(VmError::invalid_operation(
                other.mnemonic(),
                "not a numeric operation",
            )),
        }
    }
}

fn checked_shift(shift: &BigInt) -> VmResult<usize> {
    let shift = shift
        .to_usize()
        .filter(|s| *s <= MAX_SHIFT)
        .ok_or_else(|| {
            VmError::invalid_operation("SHL/SHR", format!("shift {shift} outside 0..={MAX_SHIFT}"))
        })?;
    Ok(shift)
}
