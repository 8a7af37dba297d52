//! Programmatic script construction.

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::error::{VmError, VmResult};
use crate::instruction::MAX_SYSCALL_NAME;
use crate::op_code::OpCode;
use crate::stack_item::bigint_to_bytes;

/// Builds VM bytecode, used chiefly for the argument-loader scripts the
/// emulator synthesizes on reset.
#[derive(Debug, Default)]
pub struct ScriptBuilder {
    script: Vec<u8>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.script.len()
    }

    pub fn is_empty(&self) -> bool {
        self.script.is_empty()
    }

    /// Consumes the builder, returning the raw bytecode.
    pub fn into_bytes(self) -> Vec<u8> {
        self.script
    }

    pub fn emit_opcode(&mut self, opcode: OpCode) -> &mut Self {
        self.script.push(opcode as u8);
        self
    }

    pub fn emit_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.script.extend_from_slice(bytes);
        self
    }

    /// Emits the shortest push for `data`: a PUSHBYTES opcode for 1..=75
    /// bytes, otherwise PUSHDATA1/2/4. Empty data emits PUSH0.
    pub fn emit_push(&mut self, data: &[u8]) -> &mut Self {
        match data.len() {
            0 => {
                self.emit_opcode(OpCode::PUSH0);
            }
            len @ 1..=75 => {
                self.script.push(len as u8);
                self.script.extend_from_slice(data);
            }
            len if len <= 0xFF => {
                self.emit_opcode(OpCode::PUSHDATA1);
                self.script.push(len as u8);
                self.script.extend_from_slice(data);
            }
            len if len <= 0xFFFF => {
                self.emit_opcode(OpCode::PUSHDATA2);
                self.script.extend_from_slice(&(len as u16).to_le_bytes());
                self.script.extend_from_slice(data);
            }
            len => {
                self.emit_opcode(OpCode::PUSHDATA4);
                self.script.extend_from_slice(&(len as u32).to_le_bytes());
                self.script.extend_from_slice(data);
            }
        }
        self
    }

    /// Emits an integer push, using the PUSHM1/PUSH0..PUSH16 shortcuts
    /// when possible and a minimal signed little-endian payload otherwise.
    pub fn emit_push_int(&mut self, value: &BigInt) -> &mut Self {
        if let Some(small) = value.to_i64() {
            if small == -1 {
                return self.emit_opcode(OpCode::PUSHM1);
            }
            if small == 0 {
                return self.emit_opcode(OpCode::PUSH0);
            }
            if (1..=16).contains(&small) {
                self.script.push(OpCode::PUSH1 as u8 + (small as u8 - 1));
                return self;
            }
        }
        let bytes = bigint_to_bytes(value);
        self.emit_push(&bytes)
    }

    pub fn emit_push_bool(&mut self, value: bool) -> &mut Self {
        self.emit_opcode(if value { OpCode::PUSHT } else { OpCode::PUSHF })
    }

    pub fn emit_push_string(&mut self, value: &str) -> &mut Self {
        self.emit_push(value.as_bytes())
    }

    /// Emits a SYSCALL with a length-prefixed ASCII name.
    pub fn emit_syscall(&mut self, name: &str) -> VmResult<&mut Self> {
        if name.is_empty() || name.len() > MAX_SYSCALL_NAME {
            return Err(VmError::invalid_operation(
                "SYSCALL",
                format!("name length {} outside 1..={MAX_SYSCALL_NAME}", name.len()),
            ));
        }
        if !name.is_ascii() {
            return Err(VmError::invalid_operation("SYSCALL", "name is not ASCII"));
        }
        self.emit_opcode(OpCode::SYSCALL);
        self.script.push(name.len() as u8);
        self.script.extend_from_slice(name.as_bytes());
        Ok(self)
    }

    /// Emits an APPCALL (or TAILCALL) of the contract at `script_hash`.
    pub fn emit_appcall(&mut self, script_hash: &[u8; 20], tail: bool) -> &mut Self {
        self.emit_opcode(if tail {
            OpCode::TAILCALL
        } else {
            OpCode::APPCALL
        });
        self.script.extend_from_slice(script_hash);
        self
    }

}
