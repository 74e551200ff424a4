use super::Context;
use alloy_primitives::Address;
use clap::Parser;
use eyre::Result;
use order_console::{FormEngine, InvocationOutput, Session};
use order_console_config::Config;

/// CLI arguments for `order-console call`.
#[derive(Clone, Debug, Parser)]
pub struct CallArgs {
    /// The name of the function to invoke.
    pub function: String,

    /// Function inputs as `name=value` pairs.
    #[arg(value_name = "NAME=VALUE", value_parser = parse_input)]
    pub inputs: Vec<(String, String)>,

    /// The account to send transactions from, as an address or an index into the wallet's
    /// accounts. Defaults to the first account.
    #[arg(long, value_name = "ACCOUNT")]
    pub from: Option<String>,
}

impl CallArgs {
    pub async fn run(self, config: Config) -> Result<()> {
        let Context { catalog, mut gateway, dispatcher, log, .. } = Context::new(config)?;
        if !catalog.is_offered(&self.function) {
            eyre::bail!(
                "`{}` is not an offered function; see `order-console functions`",
                self.function
            );
        }

        let mut engine = FormEngine::new(catalog);
        engine.select_function(&self.function);
        for (name, value) in &self.inputs {
            if engine.selected().and_then(|f| f.input(name)).is_none() {
                eyre::bail!("`{}` has no input named `{name}`", self.function);
            }
            engine.set_input(name, value);
        }

        let session = gateway.connect(&log).await?;
        if let Some(from) = &self.from {
            select_account(session, from)?;
        }

        match dispatcher.invoke(Some(&*session), &self.function, engine.state(), &log).await {
            InvocationOutput::Response(response) => {
                println!("{}", serde_json::to_string_pretty(&response)?);
                Ok(())
            }
            InvocationOutput::Error(message) => Err(eyre::eyre!(message)),
        }
    }
}

/// Activates the account given as an address or as an index into the session's accounts.
pub fn select_account(session: &mut Session, account: &str) -> Result<Address> {
    if let Ok(index) = account.parse::<usize>() {
        return Ok(session.select_index(index)?);
    }
    let address: Address = account.parse()?;
    session.select_account(address)?;
    Ok(address)
}

fn parse_input(s: &str) -> Result<(String, String), String> {
    let (name, value) =
        s.split_once('=').ok_or_else(|| format!("expected `name=value`, got `{s}`"))?;
    Ok((name.trim().to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_inputs() {
        assert_eq!(parse_input("total=12.5").unwrap(), ("total".to_string(), "12.5".to_string()));
        assert_eq!(parse_input("reason=a=b").unwrap(), ("reason".to_string(), "a=b".to_string()));
        assert_eq!(parse_input("reason=").unwrap(), ("reason".to_string(), String::new()));
        assert!(parse_input("total").is_err());
    }
}
