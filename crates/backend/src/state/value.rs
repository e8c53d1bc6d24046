use std::fmt;

use alloy_primitives::{Address, Bytes, I256, U256};
use itertools::Itertools;

/// A decoded variable value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Uint(U256),
    Int(I256),
    Address(Address),
    String(String),
    Bytes(Bytes),
    /// `bytesN` and function pointers.
    FixedBytes(Bytes),
    /// The name of the enum member.
    Enum(String),
    /// An enum index past the last member.
    Invalid,
    Array(Vec<Value>),
    /// Members in declaration order.
    Struct(Vec<(String, Value)>),
    /// Mappings cannot be listed without their keys.
    Mapping,
    /// The literal initial value of a constant.
    Constant(String),
    /// The value could not be decoded.
    Undefined,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Uint(n) => write!(f, "{n}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Address(address) => write!(f, "{address}"),
            Self::String(s) => f.write_str(s),
            Self::Bytes(bytes) | Self::FixedBytes(bytes) => write!(f, "{bytes}"),
            Self::Enum(name) => f.write_str(name),
            Self::Invalid => f.write_str("INVALID"),
            Self::Array(values) => write!(f, "[{}]", values.iter().join(", ")),
            Self::Struct(members) => {
                write!(f, "{{ {} }}", members.iter().map(|(name, value)| format!("{name}: {value}")).join(", "))
            }
            Self::Mapping => f.write_str("mapping"),
            Self::Constant(value) => f.write_str(value),
            Self::Undefined => f.write_str("undefined"),
        }
    }
}
