pub mod bytecode;
pub mod opcode;
