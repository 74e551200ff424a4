//! JSON rendering of decoded call outputs.

use alloy_dyn_abi::DynSolValue;
use alloy_json_abi::Function;
use alloy_primitives::hex;
use serde_json::{Map, Value};

/// Renders a single decoded value.
///
/// Integers become decimal strings so no precision is lost, addresses are checksummed, and
/// structs with named members become objects.
pub fn token_to_json(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Bool(inner) => Value::Bool(*inner),
        DynSolValue::Int(inner, _) => Value::String(inner.to_string()),
        DynSolValue::Uint(inner, _) => Value::String(inner.to_string()),
        DynSolValue::Address(inner) => Value::String(inner.to_checksum(None)),
        DynSolValue::Function(inner) => Value::String(inner.to_string()),
        DynSolValue::Bytes(inner) => Value::String(hex::encode_prefixed(inner)),
        DynSolValue::FixedBytes(word, size) => {
            Value::String(hex::encode_prefixed(&word[..*size]))
        }
        DynSolValue::String(inner) => Value::String(inner.clone()),
        DynSolValue::Array(values)
        | DynSolValue::FixedArray(values)
        | DynSolValue::Tuple(values) => Value::Array(values.iter().map(token_to_json).collect()),
        DynSolValue::CustomStruct { prop_names, tuple, .. } => {
            if prop_names.len() == tuple.len() {
                Value::Object(
                    std::iter::zip(prop_names, tuple)
                        .map(|(name, value)| (name.clone(), token_to_json(value)))
                        .collect(),
                )
            } else {
                Value::Array(tuple.iter().map(token_to_json).collect())
            }
        }
    }
}

/// Renders the decoded outputs of `function`.
///
/// A single output is rendered bare. Several outputs become an object keyed by output name, or by
/// position for unnamed outputs.
pub fn outputs_to_json(function: &Function, values: &[DynSolValue]) -> Value {
    if let [value] = values {
        return token_to_json(value);
    }
    let mut object = Map::with_capacity(values.len());
    for (i, value) in values.iter().enumerate() {
        let key = match function.outputs.get(i) {
            Some(param) if !param.name.is_empty() => param.name.clone(),
            _ => i.to_string(),
        };
        object.insert(key, token_to_json(value));
    }
    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{U256, address};
    use serde_json::json;
    use similar_asserts::assert_eq;

    #[test]
    fn renders_scalars() {
        assert_eq!(token_to_json(&DynSolValue::Uint(U256::from(42), 256)), json!("42"));
        assert_eq!(token_to_json(&DynSolValue::Bool(true)), json!(true));
        assert_eq!(
            token_to_json(&DynSolValue::Address(address!(
                "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
            ))),
            json!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
        );
        assert_eq!(token_to_json(&DynSolValue::Bytes(vec![0xde, 0xad])), json!("0xdead"));
    }

    #[test]
    fn renders_structs_by_member_name() {
        let value = DynSolValue::CustomStruct {
            name: "Order".into(),
            prop_names: vec!["orderId".into(), "accepted".into()],
            tuple: vec![DynSolValue::Uint(U256::from(3), 256), DynSolValue::Bool(false)],
        };
        assert_eq!(token_to_json(&value), json!({ "orderId": "3", "accepted": false }));

        let tuple = DynSolValue::Tuple(vec![DynSolValue::Uint(U256::from(3), 256)]);
        assert_eq!(token_to_json(&tuple), json!(["3"]));
    }

    #[test]
    fn renders_outputs() {
        let function = Function::parse(
            "function orders(uint256) view returns (uint256 orderId, address, bool accepted)",
        )
        .unwrap();
        let values = [
            DynSolValue::Uint(U256::from(1), 256),
            DynSolValue::Address(alloy_primitives::Address::ZERO),
            DynSolValue::Bool(true),
        ];
        assert_eq!(
            outputs_to_json(&function, &values),
            json!({
                "orderId": "1",
                "1": "0x0000000000000000000000000000000000000000",
                "accepted": true,
            })
        );

        let single = Function::parse("function orderIndex() view returns (uint256)").unwrap();
        assert_eq!(outputs_to_json(&single, &values[..1]), json!("1"));
        assert_eq!(outputs_to_json(&single, &[]), json!({}));
    }
}
