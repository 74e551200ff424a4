use super::Context;
use eyre::Result;
use order_console_config::Config;
use yansi::Paint;

/// Connects to the wallet and prints the authorized accounts, marking the active one.
pub async fn run(config: Config) -> Result<()> {
    let Context { mut gateway, log, .. } = Context::new(config)?;
    let session = gateway.connect(&log).await?;
    let selected = session.selected_account();
    for (i, account) in session.accounts().iter().enumerate() {
        if Some(*account) == selected {
            println!("{i}: {} {}", account.green(), "(active)".dim());
        } else {
            println!("{i}: {account}");
        }
    }
    Ok(())
}
