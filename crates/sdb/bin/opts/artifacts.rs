use std::path::PathBuf;

use clap::Parser;
use eyre::{Result, WrapErr};
use sdb_backend::artifact::ContractData;

#[derive(Clone, Debug, Default, Parser)]
pub struct ArtifactOpts {
    /// Compiled contract artifacts: JSON files, or directories of JSON files.
    #[arg(short = 'a', long = "artifacts", value_name = "PATH", required = true)]
    pub artifacts: Vec<PathBuf>,
}

impl ArtifactOpts {
    pub fn load(&self) -> Result<Vec<ContractData>> {
        let mut artifacts = Vec::new();
        for path in &self.artifacts {
            let loaded = ContractData::load(path)
                .wrap_err_with(|| format!("failed to load artifacts from {}", path.display()))?;
            debug!(path = %path.display(), count = loaded.len(), "loaded artifacts");
            artifacts.extend(loaded);
        }
        Ok(artifacts)
    }
}
