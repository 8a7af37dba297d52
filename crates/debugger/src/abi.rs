//! The contract ABI document.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DebugError, DebugResult};

/// Declared parameter and return types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbiType {
    Void,
    Boolean,
    Integer,
    ByteArray,
    String,
    Array,
    PublicKey,
    Signature,
    Hash160,
    Hash256,
    InteropInterface,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbiParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: AbiType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbiFunction {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<AbiParameter>,
    pub returntype: AbiType,
}

/// The parsed `.abi.json`: the entry point name and function signatures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractAbi {
    pub entrypoint: String,
    #[serde(default)]
    pub functions: Vec<AbiFunction>,
}

impl ContractAbi {
    pub fn from_json(document: &str, path: &Path) -> DebugResult<Self> {
        serde_json::from_str(document).map_err(|err| DebugError::malformed(path, err.to_string()))
    }

    pub fn load(path: &Path) -> DebugResult<Self> {
        let document =
            std::fs::read_to_string(path).map_err(|err| DebugError::io(path, err))?;
        Self::from_json(&document, path)
    }

    /// The signature of the declared entry point, if the ABI lists it.
    pub fn entry_function(&self) -> Option<&AbiFunction> {
        self.functions
            .iter()
            .find(|function| function.name == self.entrypoint)
    }

    pub fn function(&self, name: &str) -> Option<&AbiFunction> {
        self.functions.iter().find(|function| function.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "entrypoint": "Main",
        "functions": [
            {
                "name": "Main",
                "parameters": [
                    {"name": "operation", "type": "String"},
                    {"name": "args", "type": "Array"}
                ],
                "returntype": "ByteArray"
            },
            {"name": "Deploy", "parameters": [], "returntype": "Boolean"}
        ]
    }"#;

    #[test]
    fn parses_entrypoint_and_functions() {
        let abi = ContractAbi::from_json(DOCUMENT, Path::new("token.abi.json")).unwrap();
        assert_eq!(abi.entrypoint, "Main");
        assert_eq!(abi.functions.len(), 2);

        let entry = abi.entry_function().unwrap();
        assert_eq!(entry.parameters.len(), 2);
        assert_eq!(entry.parameters[1].param_type, AbiType::Array);
        assert_eq!(entry.returntype, AbiType::ByteArray);
    }

    #[test]
    fn unknown_type_is_malformed() {
        let err = ContractAbi::from_json(
            r#"{"entrypoint": "Main", "functions": [{"name": "Main", "returntype": "Float"}]}"#,
            Path::new("bad.abi.json"),
        )
        .unwrap_err();
        assert!(matches!(err, DebugError::MalformedArtifact { .. }));
    }
}
