//! Bytecode disassembly for the assembly view.

use std::collections::HashMap;

use crate::error::VmResult;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::script::Script;

/// One rendered line of assembly.
#[derive(Debug, Clone)]
pub struct AssemblyLine {
    /// Byte offset of the instruction.
    pub offset: usize,
    pub opcode: OpCode,
    pub operand: Vec<u8>,
    /// The rendered text, without a trailing newline.
    pub text: String,
}

/// Parses a whole script into an ordered instruction listing with
/// bidirectional offset ↔ line lookups.
///
/// Lines are 1-based to match editor conventions. Disassembly is
/// deterministic and the instruction ranges tile the script exactly;
/// malformed bytecode fails parsing rather than producing a partial view.
#[derive(Debug)]
pub struct Disassembler {
    lines: Vec<AssemblyLine>,
    text: String,
    offset_to_line: HashMap<usize, u32>,
    line_to_offset: HashMap<u32, usize>,
}

impl Disassembler {
    pub fn new(bytecode: &[u8]) -> VmResult<Self> {
        let script = Script::new(bytecode.to_vec());
        let instructions = script.instructions()?;

        let mut lines = Vec::with_capacity(instructions.len());
        let mut offset_to_line = HashMap::new();
        let mut line_to_offset = HashMap::new();
        let mut text = String::new();

        for (index, instruction) in instructions.iter().enumerate() {
            let line = index as u32 + 1;
            let rendered = render(instruction);
            offset_to_line.insert(instruction.offset, line);
            line_to_offset.insert(line, instruction.offset);
            text.push_str(&rendered);
            text.push('\n');
            lines.push(AssemblyLine {
                offset: instruction.offset,
                opcode: instruction.opcode,
                operand: instruction.operand.clone(),
                text: rendered,
            });
        }

        Ok(Self {
            lines,
            text,
            offset_to_line,
            line_to_offset,
        })
    }

    /// The full rendered listing.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn lines(&self) -> &[AssemblyLine] {
        &self.lines
    }

    /// The 1-based listing line for an instruction offset.
    pub fn line_for_offset(&self, offset: usize) -> Option<u32> {
        self.offset_to_line.get(&offset).copied()
    }

    /// The instruction offset for a 1-based listing line.
    pub fn offset_for_line(&self, line: u32) -> Option<usize> {
        self.line_to_offset.get(&line).copied()
    }
}

fn render(instruction: &Instruction) -> String {
    let mnemonic = instruction.opcode.mnemonic();
    if instruction.operand.is_empty() {
        return format!("{:04X}: {mnemonic}", instruction.offset);
    }
    if instruction.opcode == OpCode::SYSCALL {
        if let Ok(name) = instruction.syscall_name() {
            return format!("{:04X}: {mnemonic} {name}", instruction.offset);
        }
    }
    format!(
        "{:04X}: {mnemonic} {}",
        instruction.offset,
        hex::encode(&instruction.operand)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VmError;

    #[test]
    fn listing_is_deterministic_and_tiles() {
        let bytecode = vec![0x51, 0x52, 0x93, 0x02, 0xAA, 0xBB, 0x66];
        let a = Disassembler::new(&bytecode).unwrap();
        let b = Disassembler::new(&bytecode).unwrap();
        assert_eq!(a.text(), b.text());

        let mut covered = 0;
        for line in a.lines() {
            assert_eq!(line.offset, covered);
            covered += 1 + line.operand.len()
                + match line.opcode {
                    OpCode::PUSHDATA1 | OpCode::SYSCALL => 1,
                    OpCode::PUSHDATA2 => 2,
                    OpCode::PUSHDATA4 => 4,
                    _ => 0,
                };
        }
        assert_eq!(covered, bytecode.len());
    }

    #[test]
    fn offset_line_round_trip() {
        let bytecode = vec![0x51, 0x02, 0x01, 0x02, 0x93, 0x66];
        let disassembler = Disassembler::new(&bytecode).unwrap();

        for line in disassembler.lines() {
            let lineno = disassembler.line_for_offset(line.offset).unwrap();
            assert_eq!(disassembler.offset_for_line(lineno), Some(line.offset));
        }
        assert_eq!(disassembler.line_for_offset(2), None); // mid-instruction
    }

    #[test]
    fn renders_syscall_names() {
        let name = b"Neo.Runtime.Log";
        let mut bytecode = vec![0x68, name.len() as u8];
        bytecode.extend_from_slice(name);
        let disassembler = Disassembler::new(&bytecode).unwrap();
        assert!(disassembler.text().contains("SYSCALL Neo.Runtime.Log"));
    }

    #[test]
    fn truncated_bytecode_is_an_error() {
        let err = Disassembler::new(&[0x4C, 0x05]).unwrap_err();
        assert!(matches!(err, VmError::TruncatedOperand { .. }));
    }
}
