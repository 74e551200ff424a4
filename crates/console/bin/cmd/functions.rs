use clap::Parser;
use eyre::Result;
use order_console::{AbiCatalog, FunctionDescriptor};
use order_console_config::Config;
use serde_json::json;
use yansi::Paint;

/// CLI arguments for `order-console functions`.
#[derive(Clone, Debug, Parser)]
pub struct FunctionsArgs {
    /// Also list functions that are not offered, such as reserved or non-allowed names.
    #[arg(long)]
    pub all: bool,

    /// Print the functions as JSON.
    #[arg(long, short)]
    pub json: bool,
}

impl FunctionsArgs {
    pub fn run(self, config: &Config) -> Result<()> {
        let catalog = AbiCatalog::from_config(config)?;
        let functions: Vec<_> = if self.all {
            catalog.list_functions().iter().collect()
        } else {
            catalog.offered().collect()
        };

        if self.json {
            let functions: Vec<_> = functions.into_iter().map(describe).collect();
            println!("{}", serde_json::to_string_pretty(&functions)?);
            return Ok(());
        }

        let width = functions.iter().map(|f| f.signature().len()).max().unwrap_or(0);
        for function in functions {
            let signature = function.signature();
            println!("{signature:width$}  {}", function.mutability.cyan());
        }
        Ok(())
    }
}

fn describe(function: &FunctionDescriptor) -> serde_json::Value {
    json!({
        "name": function.name,
        "signature": function.signature(),
        "mutability": function.mutability,
        "inputs": function
            .inputs
            .iter()
            .map(|input| json!({ "name": input.name, "type": input.ty.as_str() }))
            .collect::<Vec<_>>(),
    })
}
