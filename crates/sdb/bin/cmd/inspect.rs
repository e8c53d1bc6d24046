use clap::Parser;
use eyre::Result;
use itertools::Itertools;
use sdb_backend::artifact::contract::{parse_contract_data, Contracts};

use crate::opts::ArtifactOpts;

/// Print the contracts found in the artifacts.
#[derive(Clone, Debug, Parser)]
pub struct InspectArgs {
    #[command(flatten)]
    pub artifacts: ArtifactOpts,
}

impl InspectArgs {
    pub fn run(self) -> Result<()> {
        let (contracts, sources) = parse_contract_data(&self.artifacts.load()?)?;
        debug!(contracts = contracts.len(), sources = sources.len(), "parsed artifacts");
        print!("{}", table(&contracts));
        Ok(())
    }
}

fn table(contracts: &Contracts) -> String {
    let rows = contracts
        .iter()
        .sorted_by(|a, b| a.name.cmp(&b.name))
        .map(|contract| {
            let globals = contract.globals.iter().map(|global| global.variable.name.as_str()).join(", ");
            [
                contract.name.clone(),
                contract.creation.id.short(),
                contract.runtime.id.short(),
                contract.slots.to_string(),
                globals,
            ]
        })
        .collect::<Vec<_>>();

    let header = ["CONTRACT", "CREATION", "RUNTIME", "SLOTS", "STATE VARIABLES"];
    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    for row in std::iter::once(header.map(String::from)).chain(rows) {
        let line = row.iter().zip(widths).map(|(cell, width)| format!("{cell:<width$}")).join("  ");
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}
