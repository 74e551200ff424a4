use color_eyre::{Section, config::HookBuilder};
use eyre::Report;
use order_console::error::{CatalogError, DispatchError, GatewayError};

/// Installs the `color-eyre` report and panic hooks.
///
/// Reports are terse unless `ORDER_CONSOLE_DEBUG` is set, in which case they carry the location
/// and span trace sections as well.
pub fn install() {
    let debug = std::env::var_os("ORDER_CONSOLE_DEBUG").is_some();
    let hooks = HookBuilder::default()
        .display_env_section(debug)
        .display_location_section(debug)
        .capture_span_trace_by_default(debug);
    if let Err(e) = hooks.install() {
        debug!("failed to install eyre error hook: {e}");
    }
}

/// Attaches a suggestion to errors the user can resolve through configuration.
pub fn with_suggestion(report: Report) -> Report {
    match suggestion(&report) {
        Some(hint) => report.suggestion(hint),
        None => report,
    }
}

fn suggestion(report: &Report) -> Option<&'static str> {
    let gateway = report.downcast_ref::<GatewayError>().or_else(|| {
        match report.downcast_ref::<DispatchError>() {
            Some(DispatchError::Gateway(err)) => Some(err),
            _ => None,
        }
    });
    if let Some(err) = gateway {
        return match err {
            GatewayError::ProviderUnavailable(_) | GatewayError::Transport(_) => {
                Some("pass `--rpc <URL>` or set `rpc_url` in order-console.toml")
            }
            GatewayError::MissingContractAddress => {
                Some("pass `--contract <ADDRESS>` or set `contract_address` in order-console.toml")
            }
            GatewayError::UserRejected(_) => Some("approve the account request in your wallet"),
            GatewayError::UnknownAccount(_) | GatewayError::AccountIndexOutOfRange(_) => {
                Some("run `order-console accounts` to list the authorized accounts")
            }
            GatewayError::Rpc { .. } | GatewayError::Receipt(_) => None,
        };
    }
    match report.downcast_ref::<CatalogError>() {
        Some(CatalogError::Io { .. }) => Some("check the `--abi` path or the `abi` setting"),
        Some(CatalogError::Json(_) | CatalogError::UnexpectedShape) => {
            Some("the ABI must be a JSON array of items or an artifact with an `abi` field")
        }
        None => None,
    }
}
