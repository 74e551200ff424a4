//! The interactive console.
//!
//! Lines starting with [`COMMAND_LEADER`] are parsed into a [`ConsoleCommand`] and dispatched
//! against one [`Context`], which keeps the wallet session, the form of the selected function and
//! the activity log for the lifetime of the console.

use super::{Context, call::select_account};
use eyre::Result;
use order_console::{
    FormEngine, FormValue, InvocationOutput, LogEntry, PrimitiveTypeTag,
    convert::{format_ether, to_wei},
    form::{FieldKind, UNNAMED_INPUT_LABEL, coerce_address, is_valid_address},
};
use order_console_config::Config;
use rustyline::{DefaultEditor, error::ReadlineError};
use std::str::FromStr;
use yansi::Paint;

/// Prefix of every console command.
pub const COMMAND_LEADER: char = '!';

/// Prompt arrow character.
pub const PROMPT_ARROW: char = '➜';

/// Console commands, with their arguments and descriptions.
const COMMANDS: &[(&str, &str, &str)] = &[
    ("connect", "", "Connect to the wallet and bind the contract"),
    ("accounts", "", "List the wallet's accounts"),
    ("account", "<address|index>", "Send transactions from another account"),
    ("functions", "", "List the offered functions"),
    ("select", "<function>", "Select a function and reset its form"),
    ("set", "<input|position> <value>", "Set an input of the selected function"),
    ("form", "", "Show the form of the selected function"),
    ("invoke", "", "Invoke the selected function with the current form"),
    ("log", "", "Show the activity log"),
    ("note", "<text|json>", "Add a note to the activity log"),
    ("convert", "<amount>", "Convert an amount of the display currency to ether"),
    ("help", "", "Show this message"),
    ("quit", "", "Exit the console"),
];

/// A parsed console command.
#[derive(Clone, Debug, PartialEq)]
pub enum ConsoleCommand {
    Connect,
    Accounts,
    Account(String),
    Functions,
    Select(String),
    Set { name: String, value: String },
    Form,
    Invoke,
    Log,
    Note(String),
    Convert(String),
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_start();
        let (name, rest) = match s.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (s, ""),
        };
        let required = |arg: &str| -> Result<String, String> {
            if rest.is_empty() {
                Err(format!("usage: {COMMAND_LEADER}{name} {arg}"))
            } else {
                Ok(rest.to_string())
            }
        };

        let cmd = match name {
            "connect" => Self::Connect,
            "accounts" => Self::Accounts,
            "account" => Self::Account(required("<address|index>")?),
            "functions" | "fns" => Self::Functions,
            "select" | "s" => Self::Select(required("<function>")?),
            "set" => {
                if rest.is_empty() {
                    return Err(format!("usage: {COMMAND_LEADER}set <input> <value>"));
                }
                // the value may be empty or contain spaces
                let (name, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                Self::Set { name: name.to_string(), value: value.trim().to_string() }
            }
            "form" => Self::Form,
            "invoke" | "i" => Self::Invoke,
            "log" => Self::Log,
            "note" => Self::Note(required("<text|json>")?),
            "convert" => Self::Convert(required("<amount>")?),
            "help" | "h" => Self::Help,
            "quit" | "q" | "exit" => Self::Quit,
            _ => {
                return Err(format!(
                    "unknown command `{COMMAND_LEADER}{name}`; see `{COMMAND_LEADER}help`"
                ));
            }
        };
        Ok(cmd)
    }
}

/// Outcome of dispatching one line.
#[derive(Debug, PartialEq)]
pub enum DispatchResult {
    /// The command succeeded, with optional output.
    Success(Option<String>),
    /// The command ran but failed.
    CommandFailed(String),
    /// The line could not be parsed into a command.
    UnrecognizedCommand(String),
    /// The user asked to leave.
    Quit,
}

impl DispatchResult {
    /// Returns `true` if the result is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::CommandFailed(_) | Self::UnrecognizedCommand(_))
    }
}

/// Dispatches console lines against a [`Context`].
#[derive(Debug)]
pub struct ConsoleDispatcher {
    ctx: Context,
    form: FormEngine,
}

impl ConsoleDispatcher {
    pub fn new(ctx: Context) -> Self {
        let form = FormEngine::new(ctx.catalog.clone());
        Self { ctx, form }
    }

    /// The prompt, showing the selected function if any.
    pub fn prompt(&self) -> String {
        match self.form.selected() {
            Some(function) => format!("order({}) {PROMPT_ARROW} ", function.name),
            None => format!("order {PROMPT_ARROW} "),
        }
    }

    pub async fn dispatch(&mut self, line: &str) -> DispatchResult {
        let line = line.trim();
        if line.is_empty() {
            return DispatchResult::Success(None);
        }
        let Some(command) = line.strip_prefix(COMMAND_LEADER) else {
            return DispatchResult::UnrecognizedCommand(format!(
                "commands start with `{COMMAND_LEADER}`; see `{COMMAND_LEADER}help`"
            ));
        };
        match command.parse::<ConsoleCommand>() {
            Ok(command) => self.execute(command).await,
            Err(err) => DispatchResult::UnrecognizedCommand(err),
        }
    }

    async fn execute(&mut self, command: ConsoleCommand) -> DispatchResult {
        trace!(?command, "dispatching");
        match command {
            ConsoleCommand::Connect => self.connect().await,
            ConsoleCommand::Accounts => self.accounts(),
            ConsoleCommand::Account(account) => self.account(&account),
            ConsoleCommand::Functions => self.functions(),
            ConsoleCommand::Select(name) => self.select(&name),
            ConsoleCommand::Set { name, value } => self.set(&name, &value),
            ConsoleCommand::Form => self.show_form(),
            ConsoleCommand::Invoke => self.invoke().await,
            ConsoleCommand::Log => self.show_log(),
            ConsoleCommand::Note(text) => {
                self.ctx.log.note(&text);
                DispatchResult::Success(Some("Noted".to_string()))
            }
            ConsoleCommand::Convert(amount) => self.convert(&amount),
            ConsoleCommand::Help => DispatchResult::Success(Some(help())),
            ConsoleCommand::Quit => DispatchResult::Quit,
        }
    }

    async fn connect(&mut self) -> DispatchResult {
        match self.ctx.gateway.connect(&self.ctx.log).await {
            Ok(session) => DispatchResult::Success(Some(format!(
                "Connected to {} with {} account(s)",
                session.contract().address(),
                session.accounts().len()
            ))),
            Err(err) => DispatchResult::CommandFailed(err.to_string()),
        }
    }

    fn accounts(&self) -> DispatchResult {
        let Some(session) = self.ctx.gateway.session() else {
            return DispatchResult::CommandFailed(not_connected());
        };
        let selected = session.selected_account();
        let lines: Vec<_> = session
            .accounts()
            .iter()
            .enumerate()
            .map(|(i, account)| {
                let marker = if Some(*account) == selected { " (active)" } else { "" };
                format!("{i}: {account}{marker}")
            })
            .collect();
        DispatchResult::Success(Some(lines.join("\n")))
    }

    fn account(&mut self, account: &str) -> DispatchResult {
        let Some(session) = self.ctx.gateway.session_mut() else {
            return DispatchResult::CommandFailed(not_connected());
        };
        match select_account(session, account) {
            Ok(address) => DispatchResult::Success(Some(format!("Sending from {address}"))),
            Err(err) => DispatchResult::CommandFailed(err.to_string()),
        }
    }

    fn functions(&self) -> DispatchResult {
        let lines: Vec<_> = self
            .ctx
            .catalog
            .offered()
            .map(|function| format!("{} ({})", function.signature(), function.mutability))
            .collect();
        DispatchResult::Success(Some(lines.join("\n")))
    }

    fn select(&mut self, name: &str) -> DispatchResult {
        if !self.ctx.catalog.is_offered(name) {
            return DispatchResult::CommandFailed(format!("`{name}` is not an offered function"));
        }
        self.form.select_function(name);
        self.show_form()
    }

    fn set(&mut self, name: &str, value: &str) -> DispatchResult {
        let Some(function) = self.form.selected() else {
            return DispatchResult::CommandFailed(no_selection());
        };
        let Some(key) = self.form.resolve_input(name).map(str::to_string) else {
            return DispatchResult::CommandFailed(format!(
                "`{}` has no input named `{name}`",
                function.name
            ));
        };
        let is_address =
            function.input(&key).is_some_and(|input| input.ty == PrimitiveTypeTag::Address);
        let label = if key.is_empty() { UNNAMED_INPUT_LABEL } else { key.as_str() };

        let unparsable = is_address && coerce_address(value).is_err();
        self.form.set_input(&key, value);
        if unparsable {
            return DispatchResult::CommandFailed(format!(
                "`{value}` is not a valid address; `{label}` keeps its previous value"
            ));
        }
        let rendered = self.form.state().get(&key).map(render_value).unwrap_or_default();
        let mut out = format!("{label} = {rendered}");
        if is_address && !is_valid_address(value) {
            out.push_str(&format!(
                "\nwarning: `{value}` is not a valid Ethereum address; using its checksum casing"
            ));
        }
        DispatchResult::Success(Some(out))
    }

    fn show_form(&self) -> DispatchResult {
        let Some(function) = self.form.selected() else {
            return DispatchResult::CommandFailed(no_selection());
        };
        let mut out = format!("{} [{}]", function.signature(), function.mutability);
        for field in self.form.fields() {
            let hint = match field.kind {
                FieldKind::Number { min, step } => format!(" (min {min}, step {step})"),
                FieldKind::Text => String::new(),
            };
            out.push_str(&format!(
                "\n  {}: {}{hint} = {}",
                field.label,
                field.ty,
                render_value(&field.value)
            ));
        }
        if function.name == self.ctx.dispatcher.payment().function {
            let payment = self.ctx.dispatcher.payment();
            if let Some(FormValue::Number(amount)) = self.form.state().get(&payment.amount_input)
                && let Ok(wei) = to_wei(*amount, payment.exchange_rate)
            {
                out.push_str(&format!(
                    "\n  value: {} ETH for {amount} {}",
                    format_ether(wei),
                    self.ctx.config.currency
                ));
            }
        }
        DispatchResult::Success(Some(out))
    }

    async fn invoke(&mut self) -> DispatchResult {
        let Some(function) = self.form.selected().map(|f| f.name.clone()) else {
            return DispatchResult::CommandFailed(no_selection());
        };
        let log = &self.ctx.log;
        let state = self.form.state();
        // a failed connect is recorded as the outcome of the invocation
        let output = match self.ctx.gateway.connect(log).await.map(|_| ()) {
            Ok(()) => {
                self.ctx.dispatcher.invoke(self.ctx.gateway.session(), &function, state, log).await
            }
            Err(err) => self.ctx.dispatcher.record(&function, state, Err(err.into()), log),
        };
        match output {
            InvocationOutput::Response(response) => DispatchResult::Success(Some(
                serde_json::to_string_pretty(&response).unwrap_or_else(|_| response.to_string()),
            )),
            InvocationOutput::Error(message) => DispatchResult::CommandFailed(message),
        }
    }

    fn show_log(&self) -> DispatchResult {
        let entries = self.ctx.log.entries();
        if entries.is_empty() {
            return DispatchResult::Success(Some("The activity log is empty".to_string()));
        }
        let rendered: Vec<_> = entries.iter().map(render_entry).collect();
        DispatchResult::Success(Some(rendered.join("\n")))
    }

    fn convert(&self, amount: &str) -> DispatchResult {
        let Ok(amount) = amount.parse::<f64>() else {
            return DispatchResult::CommandFailed(format!("`{amount}` is not a number"));
        };
        match to_wei(amount, self.ctx.config.exchange_rate) {
            Ok(wei) => DispatchResult::Success(Some(format!(
                "{amount} {} = {} ETH ({wei} wei)",
                self.ctx.config.currency,
                format_ether(wei)
            ))),
            Err(err) => DispatchResult::CommandFailed(err.to_string()),
        }
    }
}

fn render_value(value: &FormValue) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

fn render_entry(entry: &LogEntry) -> String {
    let rendered = entry.render();
    if entry.is_error() { rendered.red().to_string() } else { rendered }
}

fn not_connected() -> String {
    format!("not connected; run `{COMMAND_LEADER}connect` first")
}

fn no_selection() -> String {
    format!("no function selected; run `{COMMAND_LEADER}select <function>` first")
}

fn help() -> String {
    let mut out = String::from("Commands:");
    for (name, args, description) in COMMANDS {
        let usage = format!("{COMMAND_LEADER}{name} {args}");
        out.push_str(&format!("\n  {:<26}{description}", usage.trim_end()));
    }
    out
}

/// Runs the console until the user quits.
pub async fn run(config: Config) -> Result<()> {
    let mut dispatcher = ConsoleDispatcher::new(Context::new(config)?);
    let mut rl = DefaultEditor::new()?;
    let mut interrupt = false;

    println!("Order console. Type `{COMMAND_LEADER}help` for a list of commands.");
    loop {
        let prompt = dispatcher.prompt();
        match rl.readline(&prompt) {
            Ok(line) => {
                interrupt = false;
                let _ = rl.add_history_entry(line.as_str());
                match dispatcher.dispatch(&line).await {
                    DispatchResult::Success(Some(msg)) => println!("{}", msg.green()),
                    DispatchResult::Success(None) => {}
                    DispatchResult::CommandFailed(msg) => eprintln!("{}", msg.red()),
                    DispatchResult::UnrecognizedCommand(msg) => eprintln!("{}", msg.yellow()),
                    DispatchResult::Quit => break,
                }
            }
            Err(ReadlineError::Interrupted) => {
                if interrupt {
                    break;
                }
                println!("(To exit, press Ctrl+C again)");
                interrupt = true;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Error: {err:?}");
                break;
            }
        }
    }
    Ok(())
}
