//! # sdb-backend
//!
//! Core of the Solidity transaction debugger: compiled contract models, reduction of opcode
//! traces into source level steps, and decoding of variables at each step.

#![recursion_limit = "256"]

#[macro_use]
extern crate tracing;

pub mod analysis;
pub mod artifact;
mod core;
pub mod error;
pub mod provider;
pub mod session;
pub mod state;
pub mod trace;
pub mod utils;

#[cfg(test)]
mod test_utils;

pub use crate::{
    core::{Debugger, DebuggerBuilder},
    error::{Result, SdbError},
    session::{Breakpoints, Direction, Scope, Session},
};
