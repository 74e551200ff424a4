//! ABI-driven input form.
//!
//! A [`FormEngine`] materializes one typed value per input of the selected function and coerces
//! raw text into those values as the user edits them. The key set of the [`FormState`] is fixed by
//! [`FormEngine::select_function`] and never changes until the next selection.

use crate::{
    abi::{AbiCatalog, FunctionDescriptor, PrimitiveTypeTag},
    error::InvalidAddress,
};
use alloy_primitives::Address;
use serde::{Serialize, Serializer, ser::SerializeMap};
use std::{str::FromStr, sync::Arc};

/// Input name whose numeric field accepts tenths, for currency amounts.
pub const AMOUNT_INPUT: &str = "total";

/// Display label of an unnamed ABI parameter.
pub const UNNAMED_INPUT_LABEL: &str = "Input";

/// A coerced input value.
#[derive(Clone, Debug, PartialEq)]
pub enum FormValue {
    /// Nothing entered since the function was selected.
    Empty,
    Number(f64),
    Bool(bool),
    Address(Address),
    Text(String),
}

impl Serialize for FormValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Empty => serializer.serialize_str(""),
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Address(address) => serializer.serialize_str(&address.to_checksum(None)),
            Self::Text(text) => serializer.serialize_str(text),
        }
    }
}

/// Input values keyed by name, in the order the function declares its inputs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FormState {
    values: Vec<(String, FormValue)>,
}

impl FormState {
    /// An all-empty state for the inputs of `function`. Repeated input names collapse into one
    /// key.
    pub fn for_function(function: &FunctionDescriptor) -> Self {
        let mut state = Self::default();
        for input in &function.inputs {
            if state.get(&input.name).is_none() {
                state.values.push((input.name.clone(), FormValue::Empty));
            }
        }
        state
    }

    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.values.iter().find(|(key, _)| key == name).map(|(_, value)| value)
    }

    /// Overwrites an existing key. Returns `false`, leaving the state untouched, if `name` is not
    /// a key.
    fn replace(&mut self, name: &str, value: FormValue) -> bool {
        match self.values.iter_mut().find(|(key, _)| key == name) {
            Some((_, slot)) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormValue)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for FormState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (key, value) in &self.values {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// How an input is rendered.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldKind {
    Number { min: f64, step: f64 },
    Text,
}

/// A renderable input field.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    /// Display label; unnamed ABI parameters are labelled [`UNNAMED_INPUT_LABEL`].
    pub label: String,
    pub ty: PrimitiveTypeTag,
    pub kind: FieldKind,
    pub value: FormValue,
}

/// Coerces text into a number, falling back to `0` for anything that is not a finite number.
pub fn coerce_number(raw: &str) -> f64 {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite()).unwrap_or(0.0)
}

/// `true` only for the exact literal `"true"`.
pub fn coerce_bool(raw: &str) -> bool {
    raw == "true"
}

/// Whether `raw` is a well-formed address: 40 hex digits with an optional `0x` prefix, and a valid
/// checksum if the digits are mixed-case.
pub fn is_valid_address(raw: &str) -> bool {
    let hex = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")).unwrap_or(raw);
    if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return false;
    }
    let has_lower = hex.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = hex.bytes().any(|b| b.is_ascii_uppercase());
    if !(has_lower && has_upper) {
        return true;
    }
    Address::parse_checksummed(format!("0x{hex}"), None).is_ok()
}

/// Parses an address regardless of its casing. The result is displayed in checksum casing.
pub fn coerce_address(raw: &str) -> Result<Address, InvalidAddress> {
    Address::from_str(raw.trim()).map_err(|_| InvalidAddress { input: raw.to_string() })
}

/// Holds the selected function and its form state.
#[derive(Clone, Debug)]
pub struct FormEngine {
    catalog: Arc<AbiCatalog>,
    selected: Option<FunctionDescriptor>,
    state: FormState,
}

impl FormEngine {
    pub fn new(catalog: Arc<AbiCatalog>) -> Self {
        Self { catalog, selected: None, state: FormState::default() }
    }

    /// Selects `name` and resets every input to [`FormValue::Empty`], discarding prior values.
    ///
    /// An unknown name clears the selection and leaves an empty state.
    pub fn select_function(&mut self, name: &str) -> &FormState {
        match self.catalog.find_function(name) {
            Some(function) => {
                self.state = FormState::for_function(function);
                self.selected = Some(function.clone());
            }
            None => {
                debug!(name, "selected unknown function");
                self.state = FormState::default();
                self.selected = None;
            }
        }
        &self.state
    }

    /// Coerces `raw` by the type of input `name` and stores it.
    ///
    /// Unknown input names are ignored. Unparsable addresses are logged and leave the previous
    /// value in place.
    pub fn set_input(&mut self, name: &str, raw: &str) {
        let Some(input) = self.selected.as_ref().and_then(|f| f.input(name)) else {
            debug!(name, "ignoring unknown input");
            return;
        };

        let value = match &input.ty {
            PrimitiveTypeTag::Uint256 => FormValue::Number(coerce_number(raw)),
            PrimitiveTypeTag::Boolean => FormValue::Bool(coerce_bool(raw)),
            PrimitiveTypeTag::Address => {
                if !is_valid_address(raw) {
                    warn!(input = name, value = raw, "invalid Ethereum address");
                }
                match coerce_address(raw) {
                    Ok(address) => FormValue::Address(address),
                    Err(err) => {
                        trace!(%err, "keeping previous value");
                        return;
                    }
                }
            }
            PrimitiveTypeTag::String | PrimitiveTypeTag::Other(_) => {
                FormValue::Text(raw.to_string())
            }
        };
        self.state.replace(name, value);
    }

    /// Resolves `key` to the name of an input of the selected function.
    ///
    /// `key` is either an input name, the label of an unnamed input, or an input's position.
    pub fn resolve_input(&self, key: &str) -> Option<&str> {
        self.selected.as_ref()?;
        if let Some(name) = self.state.keys().find(|name| *name == key) {
            return Some(name);
        }
        if key == UNNAMED_INPUT_LABEL
            && let Some(name) = self.state.keys().find(|name| name.is_empty())
        {
            return Some(name);
        }
        key.parse::<usize>().ok().and_then(|position| self.state.keys().nth(position))
    }

    pub fn selected(&self) -> Option<&FunctionDescriptor> {
        self.selected.as_ref()
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn catalog(&self) -> &AbiCatalog {
        &self.catalog
    }

    /// The fields to render for the selected function, in state order.
    pub fn fields(&self) -> Vec<Field> {
        let Some(function) = &self.selected else { return Vec::new() };
        self.state
            .iter()
            .filter_map(|(name, value)| {
                let input = function.input(name)?;
                let kind = if input.ty == PrimitiveTypeTag::Uint256 && name == AMOUNT_INPUT {
                    FieldKind::Number { min: 0.0, step: 0.1 }
                } else {
                    FieldKind::Text
                };
                let label = if name.is_empty() { UNNAMED_INPUT_LABEL } else { name };
                Some(Field {
                    name: name.to_string(),
                    label: label.to_string(),
                    ty: input.ty.clone(),
                    kind,
                    value: value.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use std::collections::BTreeSet;

    fn engine() -> FormEngine {
        FormEngine::new(Arc::new(AbiCatalog::order_payment().unwrap()))
    }

    #[test]
    fn selection_keys_match_inputs_for_every_function() {
        let mut engine = engine();
        let catalog = AbiCatalog::order_payment().unwrap();
        for function in catalog.list_functions() {
            let state = engine.select_function(&function.name);
            let keys: BTreeSet<_> = state.keys().collect();
            let expected: BTreeSet<_> = function.inputs.iter().map(|i| i.name.as_str()).collect();
            assert_eq!(keys, expected, "{}", function.name);
            assert!(state.iter().all(|(_, v)| *v == FormValue::Empty));
        }
    }

    #[test]
    fn reselecting_resets_state() {
        let mut engine = engine();
        engine.select_function("resolveDispute");
        let first = engine.state().clone();
        engine.set_input("orderId", "7");
        engine.set_input("refund", "true");
        assert_ne!(engine.state(), &first);

        engine.select_function("resolveDispute");
        assert_eq!(engine.state(), &first);
        engine.select_function("resolveDispute");
        assert_eq!(engine.state(), &first);
    }

    #[test]
    fn unknown_function_yields_empty_state() {
        let mut engine = engine();
        engine.select_function("getOrderById");
        assert!(engine.select_function("nope").is_empty());
        assert!(engine.selected().is_none());
        assert!(engine.fields().is_empty());
    }

    #[test]
    fn coerces_numbers() {
        assert_eq!(coerce_number("3"), 3.0);
        assert_eq!(coerce_number(" 2.5 "), 2.5);
        assert_eq!(coerce_number("1e3"), 1000.0);
        assert_eq!(coerce_number(""), 0.0);
        assert_eq!(coerce_number("abc"), 0.0);
        assert_eq!(coerce_number("12abc"), 0.0);
        assert_eq!(coerce_number("inf"), 0.0);
        assert_eq!(coerce_number("NaN"), 0.0);
    }

    #[test]
    fn coerces_booleans_case_sensitively() {
        assert!(coerce_bool("true"));
        assert!(!coerce_bool("True"));
        assert!(!coerce_bool("TRUE"));
        assert!(!coerce_bool(" true"));
        assert!(!coerce_bool("1"));
        assert!(!coerce_bool(""));
    }

    #[test]
    fn sets_typed_values() {
        let mut engine = engine();
        engine.select_function("getOrderById");
        engine.set_input("id", "3");
        assert_eq!(engine.state().get("id"), Some(&FormValue::Number(3.0)));

        engine.select_function("raiseDispute");
        engine.set_input("reason", "late delivery");
        assert_eq!(engine.state().get("reason"), Some(&FormValue::Text("late delivery".into())));
    }

    #[test]
    fn ignores_unknown_inputs() {
        let mut engine = engine();
        engine.select_function("getOrderById");
        engine.set_input("bogus", "1");
        assert_eq!(engine.state().keys().collect::<Vec<_>>(), ["id"]);

        let mut unselected = self::engine();
        unselected.set_input("id", "1");
        assert!(unselected.state().is_empty());
    }

    #[test]
    fn normalizes_addresses_to_checksum() {
        let mut engine = engine();
        engine.select_function("getUserBalance");
        engine.set_input("user", "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266");
        let expected = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        assert_eq!(engine.state().get("user"), Some(&FormValue::Address(expected)));

        let json = serde_json::to_string(engine.state()).unwrap();
        assert_eq!(json, r#"{"user":"0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"}"#);
    }

    #[test]
    fn invalid_address_keeps_previous_value() {
        let mut engine = engine();
        engine.select_function("changeAdmin");
        engine.set_input("newAdmin", "0xInvalidChars");
        assert_eq!(engine.state().get("newAdmin"), Some(&FormValue::Empty));

        engine.set_input("newAdmin", "0x70997970C51812dc3A010C7d01b50e0d17dc79C8");
        engine.set_input("newAdmin", "0xInvalidChars");
        assert_eq!(
            engine.state().get("newAdmin"),
            Some(&FormValue::Address(address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8")))
        );
    }

    #[test]
    fn address_validation() {
        assert!(is_valid_address("0x70997970C51812dc3A010C7d01b50e0d17dc79C8"));
        assert!(is_valid_address("0x70997970c51812dc3a010c7d01b50e0d17dc79c8"));
        assert!(is_valid_address("70997970C51812DC3A010C7D01B50E0D17DC79C8"));
        // bad checksum
        assert!(!is_valid_address("0x70997970c51812dc3A010C7d01b50e0d17dc79C8"));
        assert!(!is_valid_address("0xInvalidChars"));
        assert!(!is_valid_address("0x1234"));

        assert!(coerce_address("0x70997970c51812dc3A010C7d01b50e0d17dc79C8").is_ok());
        assert_eq!(
            coerce_address("0xInvalidChars"),
            Err(InvalidAddress { input: "0xInvalidChars".into() })
        );
    }

    #[test]
    fn amount_field_accepts_tenths() {
        let mut engine = engine();
        engine.select_function("placeOrderAndProcessPayment");
        let fields = engine.fields();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].kind, FieldKind::Number { min: 0.0, step: 0.1 });

        engine.select_function("getOrderById");
        assert_eq!(engine.fields()[0].kind, FieldKind::Text);
    }

    #[test]
    fn unnamed_inputs_are_labelled() {
        let mut engine = engine();
        engine.select_function("orders");
        let fields = engine.fields();
        assert_eq!(fields[0].name, "");
        assert_eq!(fields[0].label, "Input");
    }

    #[test]
    fn resolves_inputs_by_name_label_or_position() {
        let mut engine = engine();
        assert_eq!(engine.resolve_input("id"), None);

        engine.select_function("orders");
        assert_eq!(engine.resolve_input(UNNAMED_INPUT_LABEL), Some(""));
        assert_eq!(engine.resolve_input("0"), Some(""));
        assert_eq!(engine.resolve_input("1"), None);
        engine.set_input("", "3");
        assert_eq!(engine.state().get(""), Some(&FormValue::Number(3.0)));

        engine.select_function("resolveDispute");
        assert_eq!(engine.resolve_input("refund"), Some("refund"));
        assert_eq!(engine.resolve_input("1"), Some("refund"));
        assert_eq!(engine.resolve_input(UNNAMED_INPUT_LABEL), None);
        assert_eq!(engine.resolve_input("amount"), None);
    }

    #[test]
    fn serializes_state_in_input_order() {
        let mut engine = engine();
        engine.select_function("resolveDispute");
        engine.set_input("refund", "true");
        let json = serde_json::to_string(engine.state()).unwrap();
        assert_eq!(json, r#"{"orderId":"","refund":true}"#);
    }
}
