use alloy_primitives::Address;
use std::path::PathBuf;

/// Failures at the wallet provider boundary.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("no wallet provider available ({0}); install a wallet or set `rpc_url`")]
    ProviderUnavailable(String),
    #[error("request rejected by the wallet: {0}")]
    UserRejected(String),
    #[error("{message} (code {code})")]
    Rpc { code: i64, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("failed to fetch the transaction receipt: {0}")]
    Receipt(String),
    #[error("no contract address configured; set `contract_address`")]
    MissingContractAddress,
    #[error("account {0} was not discovered by the wallet")]
    UnknownAccount(Address),
    #[error("account index {0} is out of range")]
    AccountIndexOutOfRange(usize),
}

/// Failures while loading an ABI document.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read ABI file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid ABI JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ABI document must be an array of items or an artifact with an `abi` field")]
    UnexpectedShape,
}

/// An address-typed input that could not be parsed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid Ethereum address: {input:?}")]
pub struct InvalidAddress {
    pub input: String,
}

/// Failures while turning a form into a contract call and executing it.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("no value provided for input `{0}`")]
    MissingArgument(String),
    #[error("invalid argument for input `{name}`: {reason}")]
    InvalidArgument { name: String, reason: String },
    #[error("no account selected")]
    NoAccountSelected,
    #[error("failed to encode call to `{function}`: {source}")]
    Encode {
        function: String,
        #[source]
        source: alloy_dyn_abi::Error,
    },
    #[error("failed to decode output of `{function}`: {source}")]
    Decode {
        function: String,
        #[source]
        source: alloy_dyn_abi::Error,
    },
    #[error("failed to render the receipt: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Failures of the currency to wei conversion.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ConversionError {
    #[error("exchange rate must be a positive, finite number; got {0}")]
    InvalidRate(String),
    #[error("amount must be a non-negative, finite number; got {0}")]
    InvalidAmount(String),
    #[error("value does not fit in 256 bits")]
    Overflow,
}
