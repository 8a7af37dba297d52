//! Instruction decoding.

use crate::error::{VmError, VmResult};
use crate::op_code::{OpCode, OperandEncoding};

/// Longest ASCII name accepted for a SYSCALL operand.
pub const MAX_SYSCALL_NAME: usize = 252;

/// One decoded instruction: its byte offset, opcode and operand payload.
///
/// `operand` holds the payload only (data bytes for pushes, the jump offset
/// bytes for flow instructions, the ASCII name for SYSCALL); length prefixes
/// are accounted for in [`Instruction::size`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Absolute byte position of the opcode within the script.
    pub offset: usize,
    pub opcode: OpCode,
    pub operand: Vec<u8>,
    size: usize,
}

impl Instruction {
    /// Decodes the instruction starting at `offset` in `script`.
    pub fn parse(script: &[u8], offset: usize) -> VmResult<Self> {
        let byte = *script
            .get(offset)
            .ok_or_else(|| VmError::parse(format!("Offset {offset} out of script bounds")))?;
        let opcode = OpCode::from_byte(byte).ok_or(VmError::InvalidOpCode {
            opcode: byte,
            offset,
        })?;

        let truncated = |needed: usize| VmError::TruncatedOperand {
            opcode: opcode.mnemonic(),
            offset,
            needed,
        };

        let body = offset + 1;
        let (operand, size) = match opcode.operand_encoding() {
            OperandEncoding::None => (Vec::new(), 1),
            OperandEncoding::Fixed(len) => {
                if body + len > script.len() {
                    return Err(truncated(body + len - script.len()));
                }
                (script[body..body + len].to_vec(), 1 + len)
            }
            OperandEncoding::Prefixed(width) => {
                if body + width > script.len() {
                    return Err(truncated(body + width - script.len()));
                }
                let mut len = 0usize;
                for (i, b) in script[body..body + width].iter().enumerate() {
                    len |= (*b as usize) << (8 * i);
                }
                if opcode == OpCode::SYSCALL && len > MAX_SYSCALL_NAME {
                    return Err(VmError::parse(format!(
                        "SYSCALL name of {len} bytes exceeds the {MAX_SYSCALL_NAME}-byte limit"
                    )));
                }
                let data = body + width;
                if data + len > script.len() {
                    return Err(truncated(data + len - script.len()));
                }
                (script[data..data + len].to_vec(), 1 + width + len)
            }
        };

        Ok(Self {
            offset,
            opcode,
            operand,
            size,
        })
    }

    /// Total encoded size: opcode byte, any length prefix, and the payload.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The offset of the instruction that follows this one.
    pub fn next_offset(&self) -> usize {
        self.offset + self.size
    }

    /// Interprets the operand as a little-endian signed 16-bit jump offset
    /// relative to this instruction's opcode byte.
    pub fn jump_target(&self) -> VmResult<isize> {
        let bytes: [u8; 2] = self.operand.as_slice().try_into().map_err(|_| {
            VmError::invalid_operation(self.opcode.mnemonic(), "missing 2-byte jump offset")
        })?;
        Ok(self.offset as isize + i16::from_le_bytes(bytes) as isize)
    }

    /// Interprets the operand as a SYSCALL name.
    pub fn syscall_name(&self) -> VmResult<String> {
        if !self.operand.is_ascii() {
            return Err(VmError::parse("SYSCALL name is not ASCII"));
        }
        String::from_utf8(self.operand.clone())
            .map_err(|_| VmError::parse("SYSCALL name is not valid UTF-8"))
    }
}
