//! Decoding of variables from stack words, memory and storage slots.

use std::{future::Future, pin::Pin};

use alloy_primitives::{keccak256, Address, Bytes, I256, U256};

use crate::{
    analysis::{
        storage::{parse_storage, Assignment, Location, Packer},
        types::{DataLocation, Elementary, TypeName, UserDefinedType},
    },
    error::{Result, SdbError},
    state::{State, Value},
};

type DecodeFuture<'a> = Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>>;

/// Dynamic lengths above this are taken for garbage.
const MAX_DYNAMIC_LENGTH: usize = 1 << 20;

impl State {
    /// Decodes every assignment. Variables that fail to decode are [`Value::Undefined`].
    pub async fn decode_all(&mut self, assignments: &[Assignment]) -> Vec<(String, Value)> {
        let mut values = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let value = match self.decode(assignment).await {
                Ok(value) => value,
                Err(err) => {
                    warn!(variable = %assignment.variable.name, %err, "cannot decode variable");
                    Value::Undefined
                }
            };
            values.push((assignment.variable.name.clone(), value));
        }
        values
    }

    pub async fn decode(&mut self, assignment: &Assignment) -> Result<Value> {
        let variable = &assignment.variable;
        match &assignment.location {
            Location::Constant { value } => Ok(Value::Constant(value.clone())),
            Location::Storage { slot, offset } => self.decode_storage(&variable.ty, *slot, *offset).await,
            Location::Memory { position } => {
                let pointer = to_usize(self.stack(*position)?)?;
                self.decode_memory(&variable.ty, pointer)
            }
            Location::Stack { position } => {
                let word = self.stack(*position)?;
                match variable.location {
                    DataLocation::Calldata => Ok(Value::Undefined),
                    // local storage pointer
                    DataLocation::Storage if variable.ty.is_reference() => {
                        self.decode_storage(&variable.ty, word, 0).await
                    }
                    _ => decode_word(&variable.ty, word),
                }
            }
        }
    }

    fn decode_storage<'a>(&'a mut self, ty: &'a TypeName, slot: U256, offset: usize) -> DecodeFuture<'a> {
        Box::pin(async move {
            match ty {
                TypeName::Mapping { .. } => Ok(Value::Mapping),
                TypeName::UserDefined(UserDefinedType::Struct { members, .. }) => {
                    let layout = parse_storage(members);
                    let mut values = Vec::with_capacity(layout.assignments.len());
                    for member in &layout.assignments {
                        let value = match &member.location {
                            Location::Storage { slot: member_slot, offset } => {
                                self.decode_storage(&member.variable.ty, slot + member_slot, *offset).await?
                            }
                            Location::Constant { value } => Value::Constant(value.clone()),
                            _ => Value::Undefined,
                        };
                        values.push((member.variable.name.clone(), value));
                    }
                    Ok(Value::Struct(values))
                }
                TypeName::Array { base, length: None } => {
                    let length = checked_length(self.storage(slot).await?)?;
                    let data = keccak_slot(slot);
                    self.decode_storage_elements(base, data, length).await
                }
                TypeName::Array { base, length: Some(length) } => {
                    self.decode_storage_elements(base, slot, *length as usize).await
                }
                _ => match ty.as_elementary() {
                    Some(Elementary::Bytes) => Ok(Value::Bytes(self.decode_storage_bytes(slot).await?.into())),
                    Some(Elementary::String) => {
                        let bytes = self.decode_storage_bytes(slot).await?;
                        Ok(Value::String(String::from_utf8_lossy(&bytes).into_owned()))
                    }
                    _ => {
                        let width = ty.bytes();
                        if offset + width > 32 {
                            return Err(SdbError::decode(format!("{ty} at offset {offset} overflows its slot")));
                        }
                        let word = self.storage(slot).await?.to_be_bytes::<32>();
                        decode_elementary(ty, &word[32 - offset - width..32 - offset])
                    }
                },
            }
        })
    }

    /// Elements stored one after the other from `start`, packed like state variables.
    async fn decode_storage_elements(&mut self, base: &TypeName, start: U256, length: usize) -> Result<Value> {
        let mut packer = Packer::default();
        let mut values = Vec::with_capacity(length);
        for _ in 0..length {
            let (slot, offset) = packer.place(base);
            values.push(self.decode_storage(base, start + U256::from(slot), offset).await?);
        }
        Ok(Value::Array(values))
    }

    /// `bytes` and `string`: short values live in the slot itself with `2 * length` in the
    /// lowest byte, long ones store `2 * length + 1` and their data from `keccak256(slot)`.
    async fn decode_storage_bytes(&mut self, slot: U256) -> Result<Vec<u8>> {
        let word = self.storage(slot).await?;
        if !word.bit(0) {
            let length = usize::from(word.byte(0) / 2);
            if length > 31 {
                return Err(SdbError::decode(format!("short value of {length} bytes")));
            }
            return Ok(word.to_be_bytes::<32>()[..length].to_vec());
        }

        let length = checked_length((word - U256::from(1)) >> 1)?;
        let mut data = Vec::with_capacity(length + 32);
        let mut position = keccak_slot(slot);
        while data.len() < length {
            data.extend_from_slice(&self.storage(position).await?.to_be_bytes::<32>());
            position += U256::from(1);
        }
        data.truncate(length);
        Ok(data)
    }

    fn decode_memory(&self, ty: &TypeName, pointer: usize) -> Result<Value> {
        if pointer > self.memory().len() {
            return Err(SdbError::decode(format!("pointer {pointer:#x} past the end of memory")));
        }
        match ty {
            TypeName::Mapping { .. } => Ok(Value::Mapping),
            TypeName::UserDefined(UserDefinedType::Struct { members, .. }) => {
                // one word per member, mappings take none
                let mut values = Vec::with_capacity(members.len());
                let mut position = pointer;
                for member in members.iter().filter(|member| !matches!(member.ty, TypeName::Mapping { .. })) {
                    let word = self.memory_word(position)?;
                    values.push((member.name.clone(), self.decode_memory_word(&member.ty, word)?));
                    position += 32;
                }
                Ok(Value::Struct(values))
            }
            TypeName::Array { base, length } => {
                let (length, start) = match length {
                    Some(length) => (*length as usize, pointer),
                    None => (checked_length(self.memory_word(pointer)?)?, pointer + 32),
                };
                if length.saturating_mul(32) > self.memory().len() {
                    return Err(SdbError::decode(format!("array of {length} elements exceeds memory")));
                }
                let values = (0..length)
                    .map(|i| self.decode_memory_word(base, self.memory_word(start + 32 * i)?))
                    .collect::<Result<_>>()?;
                Ok(Value::Array(values))
            }
            _ => match ty.as_elementary() {
                Some(Elementary::Bytes) => Ok(Value::Bytes(self.memory_bytes(pointer)?.into())),
                Some(Elementary::String) => {
                    Ok(Value::String(String::from_utf8_lossy(&self.memory_bytes(pointer)?).into_owned()))
                }
                _ => decode_word(ty, self.memory_word(pointer)?),
            },
        }
    }

    /// Reference types hold a pointer to their own area, value types the value itself.
    fn decode_memory_word(&self, ty: &TypeName, word: U256) -> Result<Value> {
        if ty.is_reference() {
            self.decode_memory(ty, to_usize(word)?)
        } else {
            decode_word(ty, word)
        }
    }

    /// A word of memory. Memory past the end of the buffer reads as zero.
    fn memory_word(&self, offset: usize) -> Result<U256> {
        let memory = self.memory();
        let mut word = [0u8; 32];
        if offset < memory.len() {
            let end = memory.len().min(offset.saturating_add(32));
            word[..end - offset].copy_from_slice(&memory[offset..end]);
        }
        Ok(U256::from_be_bytes(word))
    }

    /// A length prefixed byte array.
    fn memory_bytes(&self, pointer: usize) -> Result<Vec<u8>> {
        let length = checked_length(self.memory_word(pointer)?)?;
        let start = pointer.saturating_add(32);
        let memory = self.memory();
        if start.saturating_add(length) > memory.len() {
            return Err(SdbError::decode(format!("{length} bytes at {pointer} exceed memory")));
        }
        Ok(memory[start..start + length].to_vec())
    }
}

fn keccak_slot(slot: U256) -> U256 {
    U256::from_be_bytes(keccak256(slot.to_be_bytes::<32>()).0)
}

fn to_usize(word: U256) -> Result<usize> {
    usize::try_from(word).map_err(|_| SdbError::decode(format!("pointer {word:#x} out of range")))
}

fn checked_length(word: U256) -> Result<usize> {
    let length = to_usize(word)?;
    if length > MAX_DYNAMIC_LENGTH {
        return Err(SdbError::decode(format!("length {length} too large")));
    }
    Ok(length)
}

/// Decodes a value type from a stack or memory word. `bytesN` and function pointers are left
/// aligned, everything else right aligned.
fn decode_word(ty: &TypeName, word: U256) -> Result<Value> {
    let word = word.to_be_bytes::<32>();
    let width = ty.bytes();
    match ty.as_elementary() {
        Some(Elementary::FixedBytes(_) | Elementary::Function(_)) => decode_elementary(ty, &word[..width]),
        _ => decode_elementary(ty, &word[32 - width..]),
    }
}

/// Decodes the `ty.bytes()` big endian bytes of a value type.
fn decode_elementary(ty: &TypeName, bytes: &[u8]) -> Result<Value> {
    if let TypeName::UserDefined(UserDefinedType::Enum { values, .. }) = ty {
        let index = U256::from_be_slice(bytes);
        return Ok(usize::try_from(index)
            .ok()
            .and_then(|index| values.get(index))
            .map_or(Value::Invalid, |name| Value::Enum(name.clone())));
    }

    let elementary = ty.as_elementary().ok_or_else(|| SdbError::decode(format!("{ty} is not a value type")))?;
    Ok(match elementary {
        Elementary::Bool => Value::Bool(bytes.iter().any(|b| *b != 0)),
        Elementary::Uint(_) => Value::Uint(U256::from_be_slice(bytes)),
        Elementary::Int(width) => {
            let mut value = U256::from_be_slice(bytes);
            if width < 32 && bytes.first().is_some_and(|b| b & 0x80 != 0) {
                value |= U256::MAX << (8 * width);
            }
            Value::Int(I256::from_raw(value))
        }
        Elementary::Address => Value::Address(Address::from_slice(&bytes[bytes.len() - 20..])),
        Elementary::FixedBytes(_) | Elementary::Function(_) => Value::FixedBytes(Bytes::copy_from_slice(bytes)),
        Elementary::Fixed(_) => return Err(SdbError::decode("fixed point numbers are not supported")),
        Elementary::Bytes | Elementary::String => {
            return Err(SdbError::decode(format!("{ty} is not a value type")))
        }
    })
}
