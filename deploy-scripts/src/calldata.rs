//! Calldata construction from contract ABIs.
//!
//! Initializer arguments are written as strings in the migration table and
//! coerced to their Solidity types using the artifact's ABI.

use alloy::{
    dyn_abi::{DynSolValue, JsonAbiExt, Specifier},
    json_abi::{JsonAbi, Param},
    primitives::Bytes,
};

use crate::{artifacts::ContractArtifact, errors::ScriptError};

/// Encode a call to `initializer` with the given string arguments
pub fn encode_initializer(
    abi: &JsonAbi,
    initializer: &str,
    args: &[String],
) -> Result<Bytes, ScriptError> {
    let overloads = abi.function(initializer).ok_or_else(|| {
        ScriptError::CalldataConstruction(format!("no function `{initializer}` in ABI"))
    })?;

    let function = overloads
        .iter()
        .find(|f| f.inputs.len() == args.len())
        .ok_or_else(|| {
            ScriptError::CalldataConstruction(format!(
                "`{initializer}` takes no overload with {} argument(s)",
                args.len()
            ))
        })?;

    let values = coerce_args(&function.inputs, args)?;
    let calldata = function
        .abi_encode_input(&values)
        .map_err(|e| ScriptError::CalldataConstruction(e.to_string()))?;

    Ok(calldata.into())
}

/// ABI-encode constructor arguments, without the bytecode
pub fn encode_constructor(abi: &JsonAbi, values: &[DynSolValue]) -> Result<Bytes, ScriptError> {
    match abi.constructor() {
        Some(constructor) => constructor
            .abi_encode_input(values)
            .map(Bytes::from)
            .map_err(|e| ScriptError::CalldataConstruction(e.to_string())),
        None if values.is_empty() => Ok(Bytes::new()),
        None => Err(ScriptError::CalldataConstruction(
            "constructor arguments given but ABI has no constructor".to_string(),
        )),
    }
}

/// The creation code for `artifact`: its bytecode followed by the encoded
/// constructor arguments
pub fn deploy_code(
    artifact: &ContractArtifact,
    constructor_args: &[DynSolValue],
) -> Result<Bytes, ScriptError> {
    let args = encode_constructor(&artifact.abi, constructor_args)?;
    Ok([&artifact.bytecode[..], &args[..]].concat().into())
}

/// Coerce each string argument to the type of the matching parameter
fn coerce_args(params: &[Param], args: &[String]) -> Result<Vec<DynSolValue>, ScriptError> {
    params
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            let ty = param
                .resolve()
                .map_err(|e| ScriptError::CalldataConstruction(e.to_string()))?;
            ty.coerce_str(arg).map_err(|e| {
                ScriptError::CalldataConstruction(format!(
                    "cannot use `{arg}` as `{}` for parameter `{}`: {e}",
                    param.ty, param.name
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use alloy::{
        primitives::{address, hex, U256},
        sol,
        sol_types::SolCall,
    };

    use super::*;

    sol! {
        function initialize(address admin) external;
    }

    /// Parse a JSON ABI
    fn abi(json: &str) -> JsonAbi {
        serde_json::from_str(json).unwrap()
    }

    const BOX_ABI: &str = r#"[
        {"type": "function", "name": "initialize", "stateMutability": "nonpayable", "outputs": [],
         "inputs": [{"name": "admin", "type": "address", "internalType": "address"}]}
    ]"#;

    const POOL_ABI: &str = r#"[
        {"type": "function", "name": "initialize", "stateMutability": "nonpayable", "outputs": [],
         "inputs": [
            {"name": "token", "type": "address", "internalType": "address"},
            {"name": "amount", "type": "uint256", "internalType": "uint256"}
         ]}
    ]"#;

    const TOKEN_ABI: &str = r#"[
        {"type": "function", "name": "initialize", "stateMutability": "nonpayable", "outputs": [], "inputs": []}
    ]"#;

    #[test]
    fn test_encode_address_initializer() {
        let admin = address!("8dD9c91E7e4CE76FB7d0aBb53e363812abD567f7");
        let calldata = encode_initializer(
            &abi(BOX_ABI),
            "initialize",
            &["0x8dD9c91E7e4CE76FB7d0aBb53e363812abD567f7".to_string()],
        )
        .unwrap();

        assert_eq!(calldata.to_vec(), initializeCall { admin }.abi_encode());
    }

    #[test]
    fn test_encode_no_arg_initializer() {
        let calldata = encode_initializer(&abi(TOKEN_ABI), "initialize", &[]).unwrap();
        assert_eq!(calldata.to_vec(), hex!("8129fc1c").to_vec());
    }

    #[test]
    fn test_encode_typed_values() {
        let args = [
            "0x0000000000000000000000000000000000000001".to_string(),
            "1000".to_string(),
        ];
        let calldata = encode_initializer(&abi(POOL_ABI), "initialize", &args).unwrap();

        assert_eq!(calldata.len(), 4 + 32 * 2);
        assert_eq!(U256::from_be_slice(&calldata[36..]), U256::from(1000));
    }

    #[test]
    fn test_placeholder_args_rejected() {
        let args = ["t".to_string(), "amount".to_string()];
        let res = encode_initializer(&abi(POOL_ABI), "initialize", &args);

        assert!(matches!(res, Err(ScriptError::CalldataConstruction(msg)) if msg.contains("`t`")));
    }

    #[test]
    fn test_initializer_lookup_errors() {
        let missing = encode_initializer(&abi(TOKEN_ABI), "init", &[]);
        assert!(matches!(missing, Err(ScriptError::CalldataConstruction(_))));

        let arity = encode_initializer(&abi(TOKEN_ABI), "initialize", &["1".to_string()]);
        assert!(matches!(arity, Err(ScriptError::CalldataConstruction(_))));
    }

    #[test]
    fn test_encode_constructor() {
        let no_constructor = abi(TOKEN_ABI);
        assert!(encode_constructor(&no_constructor, &[]).unwrap().is_empty());
        assert!(encode_constructor(&no_constructor, &[DynSolValue::Bool(true)]).is_err());

        let with_constructor = abi(
            r#"[{"type": "constructor", "stateMutability": "nonpayable",
                 "inputs": [{"name": "owner", "type": "address", "internalType": "address"}]}]"#,
        );
        let owner = address!("0000000000000000000000000000000000000002");
        let encoded = encode_constructor(&with_constructor, &[DynSolValue::Address(owner)]).unwrap();

        assert_eq!(encoded.len(), 32);
        assert_eq!(&encoded[12..], owner.as_slice());
    }
}
