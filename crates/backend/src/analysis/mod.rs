pub mod ast;
pub mod source_map;
pub mod storage;
pub mod types;
