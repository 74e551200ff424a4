//! The contract interface: function descriptors loaded from a JSON ABI.

use crate::error::CatalogError;
use alloy_json_abi::{Function, StateMutability};
use order_console_config::{Config, DEFAULT_ALLOWED_FUNCTIONS};
use serde::Serialize;
use serde_json::Value;
use std::{fmt, path::Path};

/// The Order Payment contract ABI shipped with the console.
pub const ORDER_PAYMENT_ABI: &str = include_str!("../abi/OrderPaymentContract.json");

/// Parameter type classes that drive input coercion.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveTypeTag {
    Uint256,
    Boolean,
    Address,
    String,
    /// Any other Solidity type, kept in its canonical spelling.
    Other(String),
}

impl PrimitiveTypeTag {
    /// Classifies a Solidity type string.
    pub fn parse(ty: &str) -> Self {
        match ty {
            "uint256" | "uint" => Self::Uint256,
            "bool" | "boolean" => Self::Boolean,
            "address" => Self::Address,
            "string" => Self::String,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Uint256 => "uint256",
            Self::Boolean => "bool",
            Self::Address => "address",
            Self::String => "string",
            Self::Other(ty) => ty,
        }
    }
}

impl fmt::Display for PrimitiveTypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a function only reads state, accepts a value transfer, or writes without one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mutability {
    View,
    Payable,
    NonPayable,
}

impl From<StateMutability> for Mutability {
    fn from(value: StateMutability) -> Self {
        match value {
            StateMutability::Pure | StateMutability::View => Self::View,
            StateMutability::Payable => Self::Payable,
            StateMutability::NonPayable => Self::NonPayable,
        }
    }
}

impl fmt::Display for Mutability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::View => "view",
            Self::Payable => "payable",
            Self::NonPayable => "nonpayable",
        })
    }
}

/// A named, typed function input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputDescriptor {
    pub name: String,
    pub ty: PrimitiveTypeTag,
}

/// A callable contract function.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDescriptor {
    pub name: String,
    pub inputs: Vec<InputDescriptor>,
    pub mutability: Mutability,
    abi: Function,
}

impl FunctionDescriptor {
    /// The parsed ABI item, used for calldata encoding and output decoding.
    pub fn abi(&self) -> &Function {
        &self.abi
    }

    /// Returns the input with the given name.
    pub fn input(&self, name: &str) -> Option<&InputDescriptor> {
        self.inputs.iter().find(|input| input.name == name)
    }

    /// Returns the human-readable signature, e.g. `getOrderById(uint256)`.
    pub fn signature(&self) -> String {
        self.abi.signature()
    }
}

impl From<Function> for FunctionDescriptor {
    fn from(abi: Function) -> Self {
        let inputs = abi
            .inputs
            .iter()
            .map(|param| InputDescriptor {
                name: param.name.clone(),
                ty: PrimitiveTypeTag::parse(&param.selector_type()),
            })
            .collect();
        Self { name: abi.name.clone(), inputs, mutability: abi.state_mutability.into(), abi }
    }
}

/// The read-only set of functions of a contract, in ABI document order.
#[derive(Clone, Debug)]
pub struct AbiCatalog {
    functions: Vec<FunctionDescriptor>,
    allowed: Vec<String>,
}

impl AbiCatalog {
    /// Creates a catalog offering the default Order Payment functions.
    pub fn new(functions: Vec<FunctionDescriptor>) -> Self {
        Self { functions, allowed: DEFAULT_ALLOWED_FUNCTIONS.map(String::from).to_vec() }
    }

    /// Parses a JSON ABI: either a bare array of ABI items or an artifact object with an `abi`
    /// field. Items other than functions are skipped.
    pub fn parse(json: &str) -> Result<Self, CatalogError> {
        let items = match serde_json::from_str(json)? {
            Value::Array(items) => items,
            Value::Object(mut artifact) => match artifact.remove("abi") {
                Some(Value::Array(items)) => items,
                _ => return Err(CatalogError::UnexpectedShape),
            },
            _ => return Err(CatalogError::UnexpectedShape),
        };

        let mut functions = Vec::new();
        for item in items {
            // `type` may be omitted, in which case it defaults to `function`
            let ty = item.get("type").and_then(Value::as_str).unwrap_or("function");
            if ty != "function" {
                trace!(ty, "skipping ABI item");
                continue;
            }
            let function: Function = serde_json::from_value(item)?;
            functions.push(function.into());
        }

        debug!(functions = functions.len(), "parsed ABI");
        Ok(Self::new(functions))
    }

    /// Reads and parses the ABI at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|source| CatalogError::Io { path: path.to_path_buf(), source })?;
        Self::parse(&json)
    }

    /// The bundled Order Payment contract ABI.
    pub fn order_payment() -> Result<Self, CatalogError> {
        Self::parse(ORDER_PAYMENT_ABI)
    }

    /// Loads the ABI configured in `config` (or the bundled one) and applies its allow-list.
    pub fn from_config(config: &Config) -> Result<Self, CatalogError> {
        let catalog = match &config.abi {
            Some(path) => Self::load(path)?,
            None => Self::order_payment()?,
        };
        Ok(catalog.with_allowed(config.allowed_functions.iter().cloned()))
    }

    /// Replaces the allow-list of offered function names.
    pub fn with_allowed(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.allowed = names.into_iter().collect();
        self
    }

    /// Every function of the ABI, in document order.
    pub fn list_functions(&self) -> &[FunctionDescriptor] {
        &self.functions
    }

    /// The first function named `name`, if any.
    pub fn find_function(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// The functions presented to the user.
    pub fn offered(&self) -> impl Iterator<Item = &FunctionDescriptor> {
        let mut seen = Vec::new();
        self.functions.iter().filter(move |f| {
            // overloads share a name; only the first is reachable by name
            if !self.is_offered(&f.name) || seen.contains(&f.name.as_str()) {
                return false;
            }
            seen.push(f.name.as_str());
            true
        })
    }

    /// Whether `name` passes the allow-list and is not a reserved name.
    pub fn is_offered(&self, name: &str) -> bool {
        !name.is_empty() && !is_reserved_name(name) && self.allowed.iter().any(|n| n == name)
    }
}

/// Names whose first character has no lowercase form distinct from itself (`DEFAULT_ADMIN_ROLE`,
/// `_internal`, `Constructor`) are reserved.
pub fn is_reserved_name(name: &str) -> bool {
    name.chars().next().is_some_and(|first| first.to_uppercase().eq(std::iter::once(first)))
}
