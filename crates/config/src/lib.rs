//! # order-console-config
//!
//! Layered configuration for the order console: built-in defaults, an optional
//! `order-console.toml` file and `ORDER_CONSOLE_*` environment variables, in
//! that order of precedence.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

#[macro_use]
extern crate tracing;

use alloy_primitives::Address;
use figment::{
    Figment, Metadata, Profile, Provider,
    providers::{Env, Format, Serialized, Toml},
    value::{Dict, Map},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod error;
pub use error::{ConfigError, ExtractConfigError, FAILED_TO_EXTRACT_CONFIG_MSG};

pub use figment;

/// Exchange rate used when none is configured: one unit of the display currency, in ether.
pub const DEFAULT_EXCHANGE_RATE: f64 = 0.00032;

/// The functions of the Order Payment contract that are offered to the user.
pub const DEFAULT_ALLOWED_FUNCTIONS: [&str; 14] = [
    "changeAdmin",
    "checkAdminRole",
    "confirmOrder",
    "getContractBalance",
    "getOrderById",
    "getOrderByIndex",
    "getUserBalance",
    "orderIndex",
    "orders",
    "placeOrderAndProcessPayment",
    "processAcceptedOrder",
    "raiseDispute",
    "removeAcceptedOrders",
    "resolveDispute",
];

/// Order console configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JSON-RPC endpoint of the wallet provider.
    ///
    /// When unset, no wallet provider is available and connecting fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    /// Address of the deployed Order Payment contract.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<Address>,
    /// Value of one unit of `currency`, expressed in ether.
    pub exchange_rate: f64,
    /// Display currency of payment amounts.
    pub currency: String,
    /// Path to a JSON ABI (or compiler artifact). The bundled Order Payment ABI is used if unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abi: Option<PathBuf>,
    /// Function names offered to the user.
    pub allowed_functions: Vec<String>,
    /// The payable function that receives the converted payment amount as value.
    pub payment_function: String,
    /// Input of `payment_function` holding the amount in `currency`.
    pub payment_amount_input: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: None,
            contract_address: None,
            exchange_rate: DEFAULT_EXCHANGE_RATE,
            currency: "CAD".to_string(),
            abi: None,
            allowed_functions: DEFAULT_ALLOWED_FUNCTIONS.iter().map(ToString::to_string).collect(),
            payment_function: "placeOrderAndProcessPayment".to_string(),
            payment_amount_input: "total".to_string(),
        }
    }
}

impl Config {
    /// The default file name of the config file.
    pub const FILE_NAME: &'static str = "order-console.toml";

    /// Environment variable that overrides the config file location.
    pub const FILE_ENV: &'static str = "ORDER_CONSOLE_CONFIG";

    /// Prefix of the environment variables read into the config.
    pub const ENV_PREFIX: &'static str = "ORDER_CONSOLE_";

    /// Returns the default figment: defaults, then the config file, then the environment.
    ///
    /// ```no_run
    /// use order_console_config::{Config, figment::providers::{Format, Toml}};
    ///
    /// // Use the default `Figment`, but allow values from `other.toml`
    /// let figment = Config::figment().merge(Toml::file("other.toml"));
    /// let config = Config::from_provider(figment)?;
    /// # Ok::<_, order_console_config::ConfigError>(())
    /// ```
    pub fn figment() -> Figment {
        let file = Env::var_or(Self::FILE_ENV, Self::FILE_NAME);
        trace!(%file, "loading config");
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(Self::ENV_PREFIX).ignore(&["config"]))
    }

    /// Loads the config from the default figment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_provider(Self::figment())
    }

    /// Extracts a validated config from the given provider.
    pub fn from_provider<T: Provider>(provider: T) -> Result<Self, ConfigError> {
        let config: Self =
            Figment::from(provider).extract().map_err(ExtractConfigError::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants that deserialization alone cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.exchange_rate.is_finite() || self.exchange_rate <= 0.0 {
            return Err(ConfigError::InvalidExchangeRate(self.exchange_rate));
        }
        if self.payment_function.is_empty() {
            return Err(ConfigError::EmptySetting("payment_function"));
        }
        if self.payment_amount_input.is_empty() {
            return Err(ConfigError::EmptySetting("payment_amount_input"));
        }
        Ok(())
    }
}

impl Provider for Config {
    fn metadata(&self) -> Metadata {
        Metadata::named("Order console config")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, figment::Error> {
        Serialized::defaults(self).data()
    }
}
