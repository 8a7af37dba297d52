//! Invocation arguments and the loader script.

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use neodbg_vm::{OpCode, ScriptBuilder};

use crate::error::{DebugError, DebugResult};

/// An invocation argument as a tagged tree.
///
/// Mirrors the untyped argument documents produced by the tooling around
/// the debugger; [`ArgValue::from_json`] applies the byte-array detection
/// heuristic those documents rely on.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Null,
    Bool(bool),
    Int(BigInt),
    Bytes(Vec<u8>),
    String(String),
    List(Vec<ArgValue>),
}

impl ArgValue {
    /// Converts a JSON value. A list whose children are all integers in
    /// `0..=255` is treated as a byte array, for compatibility with the
    /// argument documents the compiler toolchain emits.
    pub fn from_json(value: &serde_json::Value) -> DebugResult<Self> {
        use serde_json::Value;
        match value {
            Value::Null => Ok(Self::Null),
            Value::Bool(value) => Ok(Self::Bool(*value)),
            Value::Number(number) => {
                if let Some(value) = number.as_i64() {
                    Ok(Self::Int(BigInt::from(value)))
                } else if let Some(value) = number.as_u64() {
                    Ok(Self::Int(BigInt::from(value)))
                } else {
                    Err(DebugError::arg_marshal(format!(
                        "non-integer number {number}"
                    )))
                }
            }
            Value::String(text) => Ok(Self::String(text.clone())),
            Value::Array(values) => {
                if let Some(bytes) = detect_byte_array(values) {
                    return Ok(Self::Bytes(bytes));
                }
                let items = values
                    .iter()
                    .map(Self::from_json)
                    .collect::<DebugResult<Vec<_>>>()?;
                Ok(Self::List(items))
            }
            Value::Object(_) => Err(DebugError::arg_marshal("objects are not encodable")),
        }
    }
}

/// A non-empty list of integers all within `0..=255` is a byte array.
fn detect_byte_array(values: &[serde_json::Value]) -> Option<Vec<u8>> {
    if values.is_empty() {
        return None;
    }
    values
        .iter()
        .map(|value| value.as_u64().filter(|v| *v <= 255).map(|v| v as u8))
        .collect()
}

/// Builds the loader script that supplies `args` to the contract.
///
/// Arguments are pushed in reverse so the first argument ends up on top
/// of the shared evaluation stack when the loader returns.
pub fn build_loader_script(args: &[ArgValue]) -> DebugResult<Vec<u8>> {
    let mut builder = ScriptBuilder::new();
    for arg in args.iter().rev() {
        emit_argument(&mut builder, arg)?;
    }
    builder.emit_opcode(OpCode::RET);
    Ok(builder.into_bytes())
}

fn emit_argument(builder: &mut ScriptBuilder, arg: &ArgValue) -> DebugResult<()> {
    match arg {
        ArgValue::Null => {
            builder.emit_push(&[]);
        }
        ArgValue::Bool(value) => {
            builder.emit_push_bool(*value);
        }
        ArgValue::Int(value) => {
            builder.emit_push_int(value);
        }
        ArgValue::String(text) => {
            builder.emit_push_string(text);
        }
        // Byte arrays become a VM array of single-byte integers: each
        // byte pushed back to front, then PACK. This is the convention
        // for transaction and script bytes.
        ArgValue::Bytes(bytes) => {
            for byte in bytes.iter().rev() {
                builder.emit_push_int(&BigInt::from(*byte));
            }
            emit_pack(builder, bytes.len())?;
        }
        ArgValue::List(items) => {
            for item in items.iter().rev() {
                emit_argument(builder, item)?;
            }
            emit_pack(builder, items.len())?;
        }
    }
    Ok(())
}

fn emit_pack(builder: &mut ScriptBuilder, len: usize) -> DebugResult<()> {
    let len = BigInt::from(len);
    len.to_u16()
        .ok_or_else(|| DebugError::arg_marshal("list too long to pack"))?;
    builder.emit_push_int(&len);
    builder.emit_opcode(OpCode::PACK);
    Ok(())
}
