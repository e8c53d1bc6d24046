use clap::{Parser, Subcommand};

use crate::cmd::{inspect::InspectArgs, tx::TxArgs};

/// SDB: a source-level debugger for Solidity transactions.
#[derive(Parser, Debug)]
#[command(name = "sdb", version, next_display_order = None)]
pub struct SdbArgs {
    #[command(subcommand)]
    pub cmd: SdbSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum SdbSubcommand {
    /// Step through a mined transaction at the source level.
    #[command(visible_alias = "t")]
    Tx(TxArgs),

    /// List the contracts of the artifacts.
    #[command(visible_alias = "i")]
    Inspect(InspectArgs),
}
