//! Compiled artifacts and the contract models built from them.

pub mod contract;
pub mod source;

use std::{collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// A compiled contract, as produced by a compiler output adapter.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractData {
    pub contract_name: String,
    pub bytecode: String,
    pub source_map: String,
    pub runtime_bytecode: String,
    pub source_map_runtime: String,
    pub sources: BTreeMap<String, SourceData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi: Option<Value>,
}

/// A source file of a compilation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceData {
    pub id: i64,
    pub ast: Value,
    /// Source text. Without it steps carry no line information.
    #[serde(default)]
    pub source: String,
}

impl ContractData {
    /// Loads artifacts from a JSON file (holding one artifact or an array of them) or from every
    /// `.json` file of a directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<Self>> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Self::load_file(path);
        }

        let mut files = fs::read_dir(path)?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<Result<Vec<_>, _>>()?;
        files.retain(|file| file.extension().is_some_and(|ext| ext == "json"));
        files.sort();

        let mut artifacts = Vec::new();
        for file in files {
            artifacts.extend(Self::load_file(&file)?);
        }
        Ok(artifacts)
    }

    fn load_file(path: &Path) -> Result<Vec<Self>> {
        debug!("loading artifacts from {}", path.display());
        let content = fs::read_to_string(path)?;
        match serde_json::from_str::<Value>(&content)? {
            Value::Array(items) => {
                items.into_iter().map(|item| Ok(serde_json::from_value(item)?)).collect()
            }
            item => Ok(vec![serde_json::from_value(item)?]),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_load_file_and_directory() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = json!({
            "contractName": "A",
            "bytecode": "0x00",
            "sourceMap": "",
            "runtimeBytecode": "0x00",
            "sourceMapRuntime": "",
            "sources": { "A.sol": { "id": 0, "ast": {}, "source": "contract A {}" } }
        });
        fs::write(dir.path().join("a.json"), artifact.to_string()).unwrap();
        fs::write(dir.path().join("b.json"), json!([artifact, artifact]).to_string()).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let single = ContractData::load(dir.path().join("a.json")).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].contract_name, "A");
        assert_eq!(single[0].sources["A.sol"].source, "contract A {}");
        assert!(single[0].abi.is_none());

        assert_eq!(ContractData::load(dir.path()).unwrap().len(), 3);
    }
}
