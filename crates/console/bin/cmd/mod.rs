//! Subcommands of the `order-console` binary.

use eyre::Result;
use order_console::{AbiCatalog, ActivityLog, Dispatcher, PaymentPolicy, ProviderGateway};
use order_console_config::Config;
use std::sync::Arc;

pub mod accounts;
pub mod call;
pub mod console;
pub mod convert;
pub mod functions;

/// Everything an invocation needs, wired from one config.
#[derive(Debug)]
pub struct Context {
    pub config: Config,
    pub catalog: Arc<AbiCatalog>,
    pub gateway: ProviderGateway,
    pub dispatcher: Dispatcher,
    pub log: ActivityLog,
}

impl Context {
    pub fn new(config: Config) -> Result<Self> {
        let catalog = Arc::new(AbiCatalog::from_config(&config)?);
        let gateway = ProviderGateway::from_config(&config, catalog.clone())?;
        let dispatcher = Dispatcher::new(catalog.clone(), PaymentPolicy::from_config(&config));
        Ok(Self { config, catalog, gateway, dispatcher, log: ActivityLog::new() })
    }
}
