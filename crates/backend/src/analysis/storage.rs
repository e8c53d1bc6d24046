//! Storage layout: assigning state variables to `(slot, offset)` pairs.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::analysis::types::{Mutability, TypeName, Variable};

/// Where the value of a variable can be read from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    /// `offset` counts bytes from the low-order end of the word.
    Storage { slot: U256, offset: usize },
    /// The stack word at `position` holds a memory offset.
    Memory { position: usize },
    /// Stack index, counted from the bottom.
    Stack { position: usize },
    Constant { value: String },
}

/// A variable bound to a location.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub variable: Variable,
    pub bytes: usize,
    pub location: Location,
}

impl Assignment {
    pub fn new(variable: Variable, location: Location) -> Self {
        Self { bytes: variable.bytes, variable, location }
    }

    pub fn stack(variable: Variable, position: usize) -> Self {
        Self::new(variable, Location::Stack { position })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StorageLayout {
    pub assignments: Vec<Assignment>,
    /// Slots used, a trailing partially filled slot included.
    pub slots: usize,
}

/// Places values one after the other following the storage packing rule.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Packer {
    slot: usize,
    offset: usize,
}

impl Packer {
    /// Returns the `(slot, offset)` of the next value of the given width and slot count.
    pub(crate) fn place(&mut self, ty: &TypeName) -> (usize, usize) {
        let width = ty.bytes();
        let slots = ty.slots();

        if self.offset + width > 32 || (ty.is_reference() && self.offset > 0) {
            self.slot += 1;
            self.offset = 0;
        }
        let position = (self.slot, self.offset);

        if slots > 1 || ty.is_reference() {
            self.slot += slots;
            self.offset = 0;
        } else {
            self.offset += width;
        }
        position
    }

    pub(crate) fn slots(&self) -> usize {
        self.slot + usize::from(self.offset > 0)
    }
}

/// Lays out variables in declaration order, base contract variables first.
///
/// Constants and immutables take no slot; constants with a literal initial value get a
/// [`Location::Constant`].
pub fn parse_storage(variables: &[Variable]) -> StorageLayout {
    let mut packer = Packer::default();
    let mut assignments = Vec::with_capacity(variables.len());

    for variable in variables {
        match variable.mutability {
            Mutability::Constant => {
                if let Some(value) = &variable.value {
                    assignments.push(Assignment::new(
                        variable.clone(),
                        Location::Constant { value: value.clone() },
                    ));
                }
            }
            Mutability::Immutable => {}
            Mutability::Mutable => {
                let (slot, offset) = packer.place(&variable.ty);
                assignments.push(Assignment::new(
                    variable.clone(),
                    Location::Storage { slot: U256::from(slot), offset },
                ));
            }
        }
    }

    StorageLayout { assignments, slots: packer.slots() }
}
