//! Values manipulated by the evaluation stack.

use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use parking_lot::Mutex;

use crate::error::{VmError, VmResult};

/// Largest byte-array or string item the VM will construct.
pub const MAX_ITEM_SIZE: usize = 1024 * 1024;

/// Largest composite (array, struct, map) the VM will construct.
pub const MAX_ARRAY_SIZE: usize = 1024;

/// Largest signed two's-complement width accepted by arithmetic, in bytes.
pub const MAX_INTEGER_SIZE: usize = 32;

/// A host object surfaced to scripts as an opaque stack value.
pub trait InteropInterface: std::fmt::Debug + Send + Sync {
    /// A short type tag for diagnostics.
    fn interface_type(&self) -> &str;

    /// Downcasting hook for interop handlers.
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Shared backing store for arrays and structs.
pub type SharedItems = Arc<Mutex<Vec<StackItem>>>;

/// Shared backing store for maps. Entries keep insertion order; keys are
/// compared with [`StackItem::equals`].
pub type SharedEntries = Arc<Mutex<Vec<(StackItem, StackItem)>>>;

/// A value on the evaluation stack.
///
/// Arrays, structs and maps are reference types: cloning the stack item
/// clones the handle, so a DUP followed by SETITEM mutates the original.
/// Structs additionally deep-copy when stored into another composite.
#[derive(Debug, Clone)]
pub enum StackItem {
    ByteArray(Vec<u8>),
    Boolean(bool),
    Integer(BigInt),
    Array(SharedItems),
    Struct(SharedItems),
    Map(SharedEntries),
    InteropInterface(Arc<dyn InteropInterface>),
}

impl StackItem {
    pub fn from_bytes<T: Into<Vec<u8>>>(value: T) -> Self {
        Self::ByteArray(value.into())
    }

    pub fn from_bool(value: bool) -> Self {
        Self::Boolean(value)
    }

    pub fn from_int<T: Into<BigInt>>(value: T) -> Self {
        Self::Integer(value.into())
    }

    pub fn from_array(items: Vec<StackItem>) -> Self {
        Self::Array(Arc::new(Mutex::new(items)))
    }

    pub fn from_struct(items: Vec<StackItem>) -> Self {
        Self::Struct(Arc::new(Mutex::new(items)))
    }

    pub fn new_map() -> Self {
        Self::Map(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn from_interface<T: InteropInterface + 'static>(value: T) -> Self {
        Self::InteropInterface(Arc::new(value))
    }

    /// A short type tag for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ByteArray(_) => "ByteArray",
            Self::Boolean(_) => "Boolean",
            Self::Integer(_) => "Integer",
            Self::Array(_) => "Array",
            Self::Struct(_) => "Struct",
            Self::Map(_) => "Map",
            Self::InteropInterface(_) => "InteropInterface",
        }
    }

    /// Coerces the item to raw bytes.
    ///
    /// Integers render as minimal signed two's-complement little-endian
    /// (zero is the empty array); booleans as one byte or empty. Composites
    /// do not coerce.
    pub fn to_bytes(&self) -> VmResult<Vec<u8>> {
        match self {
            Self::ByteArray(bytes) => Ok(bytes.clone()),
            Self::Integer(value) => Ok(bigint_to_bytes(value)),
            Self::Boolean(value) => Ok(if *value { vec![1] } else { Vec::new() }),
            other => Err(VmError::invalid_cast(other.type_name(), "ByteArray")),
        }
    }

    /// Coerces the item to an unbounded integer.
    ///
    /// Byte arrays decode as signed two's-complement little-endian; the
    /// empty array is zero. Composites do not coerce.
    pub fn to_int(&self) -> VmResult<BigInt> {
        match self {
            Self::Integer(value) => Ok(value.clone()),
            Self::ByteArray(bytes) => Ok(bigint_from_bytes(bytes)),
            Self::Boolean(value) => Ok(BigInt::from(*value as u8)),
            other => Err(VmError::invalid_cast(other.type_name(), "Integer")),
        }
    }

    /// Coerces the item to a boolean. Composites and interop handles are
    /// always truthy; bytes are truthy when any byte is non-zero.
    pub fn to_bool(&self) -> bool {
        match self {
            Self::Boolean(value) => *value,
            Self::Integer(value) => !value.is_zero(),
            Self::ByteArray(bytes) => bytes.iter().any(|b| *b != 0),
            Self::Array(_) | Self::Struct(_) | Self::Map(_) | Self::InteropInterface(_) => true,
        }
    }

    /// Equality per the EQUAL opcode: primitives compare by coerced bytes,
    /// composites and interop handles by identity.
    pub fn equals(&self, other: &StackItem) -> bool {
        match (self, other) {
            (Self::Array(a), Self::Array(b)) | (Self::Struct(a), Self::Struct(b)) => {
                Arc::ptr_eq(a, b)
            }
            (Self::Map(a), Self::Map(b)) => Arc::ptr_eq(a, b),
            (Self::InteropInterface(a), Self::InteropInterface(b)) => Arc::ptr_eq(a, b),
            (a, b) => match (a.to_bytes(), b.to_bytes()) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Copies the item the way composite stores do: structs deep-copy
    /// (recursively through nested structs), everything else copies its
    /// handle or value.
    pub fn clone_value(&self) -> StackItem {
        match self {
            Self::Struct(items) => {
                let copied = items.lock().iter().map(StackItem::clone_value).collect();
                Self::from_struct(copied)
            }
            other => other.clone(),
        }
    }

    /// The element count of a composite, or the byte length of a
    /// primitive, per the ARRAYSIZE opcode.
    pub fn size(&self) -> VmResult<usize> {
        match self {
            Self::Array(items) | Self::Struct(items) => Ok(items.lock().len()),
            Self::Map(entries) => Ok(entries.lock().len()),
            other => Ok(other.to_bytes()?.len()),
        }
    }
}

/// Encodes a big integer as minimal signed two's-complement little-endian
/// bytes; zero encodes as the empty array.
pub fn bigint_to_bytes(value: &BigInt) -> Vec<u8> {
    if value.is_zero() {
        return Vec::new();
    }
    value.to_signed_bytes_le()
}

/// Decodes signed two's-complement little-endian bytes; the empty array
/// decodes as zero.
pub fn bigint_from_bytes(bytes: &[u8]) -> BigInt {
    if bytes.is_empty() {
        return BigInt::zero();
    }
    BigInt::from_signed_bytes_le(bytes)
}

/// Checks an arithmetic operand or result against [`MAX_INTEGER_SIZE`].
pub fn check_integer_size(value: &BigInt, operation: &str) -> VmResult<()> {
    let size = bigint_to_bytes(value).len();
    if size > MAX_INTEGER_SIZE {
        return Err(VmError::IntegerOverflow {
            operation: operation.to_string(),
            size,
            limit: MAX_INTEGER_SIZE,
        });
    }
    Ok(())
}

/// Converts a big integer to `usize` for use as a count or index.
pub fn to_index(value: &BigInt, operation: &str) -> VmResult<usize> {
    value
        .to_usize()
        .ok_or_else(|| VmError::invalid_operation(operation, "negative or oversized index"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_byte_round_trip() {
        for value in [0i64, 1, -1, 127, 128, 255, 256, -128, -129, 65535, -65536] {
            let big = BigInt::from(value);
            let bytes = bigint_to_bytes(&big);
            assert_eq!(bigint_from_bytes(&bytes), big, "value {value}");
        }
    }

    #[test]
    fn zero_encodes_empty() {
        assert!(bigint_to_bytes(&BigInt::zero()).is_empty());
        assert_eq!(bigint_from_bytes(&[]), BigInt::zero());
    }

    #[test]
    fn minimal_encoding_examples() {
        assert_eq!(bigint_to_bytes(&BigInt::from(1)), vec![0x01]);
        assert_eq!(bigint_to_bytes(&BigInt::from(-1)), vec![0xFF]);
        assert_eq!(bigint_to_bytes(&BigInt::from(128)), vec![0x80, 0x00]);
        assert_eq!(bigint_to_bytes(&BigInt::from(-129)), vec![0x7F, 0xFF]);
    }

    #[test]
    fn truthiness() {
        assert!(!StackItem::from_bytes(vec![0, 0]).to_bool());
        assert!(StackItem::from_bytes(vec![0, 1]).to_bool());
        assert!(!StackItem::from_int(0).to_bool());
        assert!(StackItem::from_int(-5).to_bool());
        assert!(StackItem::from_array(Vec::new()).to_bool());
    }

    #[test]
    fn equality_coerces_primitives() {
        assert!(StackItem::from_int(2).equals(&StackItem::from_bytes(vec![0x02])));
        assert!(StackItem::from_bool(true).equals(&StackItem::from_int(1)));
        assert!(!StackItem::from_int(2).equals(&StackItem::from_int(3)));
    }

    #[test]
    fn arrays_compare_by_identity() {
        let a = StackItem::from_array(vec![StackItem::from_int(1)]);
        let b = StackItem::from_array(vec![StackItem::from_int(1)]);
        assert!(!a.equals(&b));
        assert!(a.equals(&a.clone()));
    }

    #[test]
    fn arrays_share_backing_store() {
        let a = StackItem::from_array(vec![StackItem::from_int(1)]);
        let b = a.clone();
        if let StackItem::Array(items) = &a {
            items.lock().push(StackItem::from_int(2));
        }
        assert_eq!(b.size().unwrap(), 2);
    }

    #[test]
    fn structs_deep_copy() {
        let inner = StackItem::from_struct(vec![StackItem::from_int(1)]);
        let outer = StackItem::from_struct(vec![inner]);
        let copy = outer.clone_value();

        if let StackItem::Struct(items) = &outer {
            if let StackItem::Struct(inner) = &items.lock()[0] {
                inner.lock()[0] = StackItem::from_int(99);
            }
        }
        if let StackItem::Struct(items) = &copy {
            if let StackItem::Struct(inner) = &items.lock()[0] {
                assert!(inner.lock()[0].equals(&StackItem::from_int(1)));
            }
        }
    }

    #[test]
    fn integer_size_check() {
        // 2^255 - 1 is the largest positive value in 32 signed bytes.
        let max = (BigInt::from(1) << 255u32) - 1;
        assert!(check_integer_size(&max, "test").is_ok());
        assert!(check_integer_size(&(max + 1), "test").is_err());
        // -2^255 still fits; one below does not.
        let min = -(BigInt::from(1) << 255u32);
        assert!(check_integer_size(&min, "test").is_ok());
        assert!(check_integer_size(&(min - 1), "test").is_err());
    }
}
