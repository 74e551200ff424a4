use clap::Parser;
use eyre::Result;
use order_console::convert::{format_ether, to_wei};
use order_console_config::Config;

/// CLI arguments for `order-console convert`.
#[derive(Clone, Debug, Parser)]
pub struct ConvertArgs {
    /// The amount of the display currency.
    #[arg(allow_negative_numbers = true)]
    pub amount: f64,

    /// Print the value in ether instead of wei.
    #[arg(long, short)]
    pub ether: bool,
}

impl ConvertArgs {
    pub fn run(self, config: &Config) -> Result<()> {
        let wei = to_wei(self.amount, config.exchange_rate)?;
        if self.ether {
            println!("{}", format_ether(wei));
        } else {
            println!("{wei}");
        }
        Ok(())
    }
}
