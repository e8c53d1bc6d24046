use revm::interpreter::{
    opcode::{PUSH0, PUSH1, PUSH32},
    OpCode,
};
use rustc_hash::FxHashMap;

/// A decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// Instruction counter, i.e. the position of the instruction in the instruction stream.
    /// Source maps are indexed by it.
    pub index: usize,
    /// Mnemonic of the opcode. `None` for bytes that are not a defined opcode.
    pub mnemonic: Option<&'static str>,
}

/// Maps from program counter to the decoded instruction starting there.
///
/// Bytes that belong to the immediate operand of a `PUSHn` never appear as keys.
#[derive(Debug, Clone, Default)]
pub struct PcIcMap {
    pub inner: FxHashMap<usize, Instruction>,
}

impl PcIcMap {
    /// Creates a new `PcIcMap` for the given code.
    pub fn new(code: &[u8]) -> Self {
        Self { inner: make_map(code) }
    }

    /// Returns the length of the map.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the instruction at the given program counter.
    pub fn get(&self, pc: usize) -> Option<&Instruction> {
        self.inner.get(&pc)
    }

    /// Iterates over `(pc, instruction)` pairs in program counter order.
    pub fn iter_sorted(&self) -> impl Iterator<Item = (usize, &Instruction)> {
        let mut pcs = self.inner.keys().copied().collect::<Vec<_>>();
        pcs.sort_unstable();
        pcs.into_iter().map(move |pc| (pc, &self.inner[&pc]))
    }
}

/// Returns the size of the immediate operand following `opcode`.
#[inline]
pub const fn immediate_size(opcode: u8) -> usize {
    if opcode >= PUSH1 && opcode <= PUSH32 {
        (opcode - PUSH0) as usize
    } else {
        0
    }
}

fn make_map(code: &[u8]) -> FxHashMap<usize, Instruction> {
    let mut map = FxHashMap::default();

    let mut pc = 0;
    let mut ic = 0;
    while pc < code.len() {
        let mnemonic = OpCode::new(code[pc]).map(|op| op.as_str());
        map.insert(pc, Instruction { index: ic, mnemonic });

        // Skip the push bytes. A truncated operand simply runs off the end of the code.
        pc += 1 + immediate_size(code[pc]);
        ic += 1;
    }
    map
}
