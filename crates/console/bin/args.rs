use crate::cmd::{call::CallArgs, convert::ConvertArgs, functions::FunctionsArgs};
use alloy_primitives::Address;
use clap::{Parser, Subcommand, ValueHint};
use eyre::Result;
use order_console_config::{
    Config,
    figment::{
        self, Metadata, Profile, Provider,
        providers::Serialized,
        value::{Dict, Map},
    },
};
use serde::Serialize;
use std::path::PathBuf;

/// Invoke Order Payment contract functions through a wallet.
#[derive(Debug, Parser)]
#[command(name = "order-console", version, next_display_order = None)]
pub struct ConsoleArgs {
    #[command(flatten)]
    pub config: ConfigOpts,

    #[command(subcommand)]
    pub cmd: Option<ConsoleSubcommand>,
}

#[derive(Debug, Subcommand)]
pub enum ConsoleSubcommand {
    /// List the functions the console offers.
    #[command(visible_alias = "fns")]
    Functions(FunctionsArgs),

    /// List the accounts the wallet authorizes.
    #[command(visible_alias = "a")]
    Accounts,

    /// Invoke a contract function once and print the result.
    #[command(visible_alias = "c")]
    Call(CallArgs),

    /// Convert an amount of the display currency to wei.
    #[command(visible_alias = "to-wei")]
    Convert(ConvertArgs),

    /// Start the interactive console.
    #[command(visible_alias = "repl")]
    Console,
}

/// Settings that override the config file and environment.
#[derive(Clone, Debug, Default, Serialize, Parser)]
#[command(next_help_heading = "Config options")]
pub struct ConfigOpts {
    /// The JSON-RPC endpoint of the wallet.
    #[arg(long, short, visible_alias = "rpc-url", value_name = "URL", global = true)]
    #[serde(rename = "rpc_url", skip_serializing_if = "Option::is_none")]
    pub rpc: Option<String>,

    /// The address of the deployed contract.
    #[arg(long, value_name = "ADDRESS", global = true)]
    #[serde(rename = "contract_address", skip_serializing_if = "Option::is_none")]
    pub contract: Option<Address>,

    /// The value of one currency unit in ether.
    #[arg(long, value_name = "RATE", global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange_rate: Option<f64>,

    /// Path to an ABI JSON file, either a bare array or an artifact with an `abi` field.
    #[arg(long, value_hint = ValueHint::FilePath, value_name = "PATH", global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abi: Option<PathBuf>,
}

impl Provider for ConfigOpts {
    fn metadata(&self) -> Metadata {
        Metadata::named("command line options")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, figment::Error> {
        Serialized::defaults(self).data()
    }
}

impl ConfigOpts {
    /// Loads the config, with these options taking precedence.
    pub fn load_config(&self) -> Result<Config> {
        let config = Config::from_provider(Config::figment().merge(self))?;
        trace!(?config, "loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        ConsoleArgs::command().debug_assert();
    }

    #[test]
    fn options_override_config() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                Config::FILE_NAME,
                "rpc_url = \"http://localhost:8545\"\nexchange_rate = 0.5",
            )?;
            let args = ConsoleArgs::parse_from([
                "order-console",
                "--rpc",
                "http://127.0.0.1:9545",
                "--contract",
                "0x5FbDB2315678afecb367f032d93F642f64180aa3",
                "functions",
            ]);
            let config = args.config.load_config().map_err(|err| err.to_string())?;
            assert_eq!(config.rpc_url.as_deref(), Some("http://127.0.0.1:9545"));
            assert_eq!(
                config.contract_address,
                Some(address!("0x5FbDB2315678afecb367f032d93F642f64180aa3"))
            );
            assert_eq!(config.exchange_rate, 0.5);
            assert!(matches!(args.cmd, Some(ConsoleSubcommand::Functions(_))));
            Ok(())
        });
    }

    #[test]
    fn parses_call_inputs() {
        let args = ConsoleArgs::parse_from([
            "order-console",
            "call",
            "placeOrderAndProcessPayment",
            "total=12.5",
            "--from",
            "1",
        ]);
        let Some(ConsoleSubcommand::Call(call)) = args.cmd else { panic!("expected call") };
        assert_eq!(call.function, "placeOrderAndProcessPayment");
        assert_eq!(call.inputs, [("total".to_string(), "12.5".to_string())]);
        assert_eq!(call.from.as_deref(), Some("1"));
    }
}
