//! CLI binary for importing OFX statements into a local ledger.

use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{Days, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, Table};
use indicatif::{ProgressBar, ProgressStyle};
use ofx_ledger::config::Config;
use ofx_ledger::ledger::{ImportReport, Ledger};
use ofx_ledger::models::{
    Account, AccountId, AccountType, Amount, BalanceSummary, CredentialId, DailyBalance,
    LedgerEntry, TransactionId,
};
use ofx_ledger::protocol::OfxResponse;
use ofx_ledger::repository::{FileRepository, Repository};
use owo_colors::OwoColorize;

/// Environment variable overriding the data directory.
const DATA_DIR_ENV: &str = "OFX_LEDGER_DATA_DIR";

/// Placeholder for empty table cells.
const EMPTY_CELL: &str = "\u{2014}";

/// OFX ledger CLI: import statements and browse account history.
#[derive(Debug, Parser)]
#[command(name = "ofx-ledger", version, about)]
struct Cli {
    /// Override the storage directory (default: $OFX_LEDGER_DATA_DIR, then
    /// the XDG data dir).
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,
    /// JSON configuration file.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Import an OFX response (JSON rendering) and merge its statements.
    Import(ImportArgs),
    /// List stored accounts.
    Accounts,
    /// Create a manually maintained account.
    AddAccount {
        /// Display name.
        #[arg(long)]
        name: String,
        /// Account type (checking, savings, creditCard, loan, cash, ...).
        #[arg(long, value_parser = parse_kind)]
        kind: AccountType,
        /// ISO 4217 currency code.
        #[arg(long)]
        currency: Option<String>,
    },
    /// List an account's transactions with running balances.
    Transactions(TransactionArgs),
    /// Show daily closing balances of an account.
    Balances {
        /// Account ID.
        account: String,
        /// Number of days to show, ending today.
        #[arg(long, default_value_t = 30)]
        days: u64,
    },
    /// Delete a transaction.
    Delete {
        /// Account ID.
        account: String,
        /// Transaction ID.
        transaction: String,
    },
}

/// Arguments for the `import` subcommand.
#[derive(Debug, Args)]
struct ImportArgs {
    /// OFX response file.
    file: PathBuf,
    /// Merge every statement into this account instead of the one the file
    /// names.
    #[arg(long, value_name = "ACCOUNT")]
    into: Option<String>,
    /// Credential to link newly created accounts to.
    #[arg(long, conflicts_with = "into")]
    credential: Option<String>,
}

/// Arguments for the `transactions` subcommand.
#[derive(Debug, Args)]
struct TransactionArgs {
    /// Account ID.
    account: String,
    /// Start date (inclusive, YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    from: Option<NaiveDate>,
    /// End date (inclusive, YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    to: Option<NaiveDate>,
}

/// Parses a date string in `YYYY-MM-DD` format for clap.
fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|err| format!("{err}"))
}

/// Parses an account type tag for clap.
fn parse_kind(s: &str) -> Result<AccountType, String> {
    s.parse::<AccountType>().map_err(|err| format!("{err}"))
}

/// Prints an error line to stderr.
fn report_error(message: &str) -> io::Result<()> {
    writeln!(io::stderr().lock(), "{} {message}", "error:".red().bold())
}

/// Runs the CLI, returning an appropriate exit code.
fn run() -> io::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let _dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            report_error(&format!("failed to load configuration: {err}"))?;
            return Ok(ExitCode::FAILURE);
        }
    };

    let repository = match create_repository(cli.data_dir) {
        Ok(repository) => repository,
        Err(err) => {
            report_error(&format!("failed to initialize storage: {err}"))?;
            return Ok(ExitCode::FAILURE);
        }
    };

    let ledger = match Ledger::builder().repository(repository).config(config).build() {
        Ok(ledger) => ledger,
        Err(err) => {
            report_error(&format!("failed to build ledger: {err}"))?;
            return Ok(ExitCode::FAILURE);
        }
    };

    dispatch(&ledger, cli.command)
}

/// Loads the configuration file, or the defaults if none is given.
fn load_config(path: Option<&Path>) -> ofx_ledger::error::Result<Config> {
    let Some(file) = path else {
        return Ok(Config::default());
    };
    let json = fs::read_to_string(file)
        .map_err(|err| ofx_ledger::error::LedgerError::Storage(Box::new(err)))?;
    Config::from_json_str(&json)
}

/// Picks the data directory: the flag, then the environment, then the
/// platform default.
fn resolve_data_dir(data_dir: Option<PathBuf>) -> ofx_ledger::error::Result<PathBuf> {
    if let Some(dir) = data_dir {
        return Ok(dir);
    }
    match std::env::var(DATA_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
        _ => FileRepository::default_dir(),
    }
}

/// Creates the file repository in the resolved data directory.
fn create_repository(data_dir: Option<PathBuf>) -> ofx_ledger::error::Result<FileRepository> {
    FileRepository::new(resolve_data_dir(data_dir)?)
}

/// Dispatches to the appropriate subcommand handler.
fn dispatch<R: Repository>(ledger: &Ledger<R>, command: Command) -> io::Result<ExitCode> {
    match command {
        Command::Import(args) => cmd_import(ledger, &args),
        Command::Accounts => cmd_accounts(ledger),
        Command::AddAccount {
            name,
            kind,
            currency,
        } => cmd_add_account(ledger, &name, kind, currency.as_deref()),
        Command::Transactions(args) => cmd_transactions(ledger, &args),
        Command::Balances { account, days } => {
            cmd_balances(ledger, &AccountId::from(account), Utc::now().date_naive(), days)
        }
        Command::Delete {
            account,
            transaction,
        } => cmd_delete(
            ledger,
            &AccountId::from(account),
            &TransactionId::from(transaction),
        ),
    }
}

/// Executes the `import` subcommand: parses the file and merges it.
fn cmd_import<R: Repository>(ledger: &Ledger<R>, args: &ImportArgs) -> io::Result<ExitCode> {
    let response = match fs::read_to_string(&args.file)
        .map_err(|err| err.to_string())
        .and_then(|json| OfxResponse::from_json_str(&json).map_err(|err| err.to_string()))
    {
        Ok(response) => response,
        Err(err) => {
            report_error(&format!("failed to read {}: {err}", args.file.display()))?;
            return Ok(ExitCode::FAILURE);
        }
    };

    let spinner = make_spinner("Merging statements...");
    let result = match args.into.as_deref() {
        Some(account) => ledger.import_into(&AccountId::from(account), &response),
        None => {
            let credential = args.credential.as_deref().map(CredentialId::from);
            ledger.sync(&response, credential.as_ref())
        }
    };
    spinner.finish_and_clear();

    match result {
        Ok(report) => {
            print_import_report(&report, ledger.config())?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            report_error(&format!("import failed: {err}"))?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Executes the `accounts` subcommand: lists all accounts.
fn cmd_accounts<R: Repository>(ledger: &Ledger<R>) -> io::Result<ExitCode> {
    match ledger.accounts() {
        Ok(accounts) => {
            print_accounts_table(&accounts, ledger.config())?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            report_error(&format!("failed to read accounts: {err}"))?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Executes the `add-account` subcommand.
fn cmd_add_account<R: Repository>(
    ledger: &Ledger<R>,
    name: &str,
    kind: AccountType,
    currency: Option<&str>,
) -> io::Result<ExitCode> {
    match ledger.add_manual_account(name, kind, currency) {
        Ok(account) => {
            writeln!(
                io::stdout().lock(),
                "{} {} {}",
                "Created".green().bold(),
                account.name,
                format_args!("({})", account.id).dimmed()
            )?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            report_error(&format!("failed to create account: {err}"))?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Executes the `transactions` subcommand.
fn cmd_transactions<R: Repository>(ledger: &Ledger<R>, args: &TransactionArgs) -> io::Result<ExitCode> {
    let account = AccountId::from(args.account.as_str());
    match ledger.history_between(&account, args.from, args.to) {
        Ok(entries) => {
            print_transactions_table(&entries, ledger.config())?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            report_error(&format!("failed to read transactions: {err}"))?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Executes the `balances` subcommand for the `days` days ending `today`.
fn cmd_balances<R: Repository>(
    ledger: &Ledger<R>,
    account: &AccountId,
    today: NaiveDate,
    days: u64,
) -> io::Result<ExitCode> {
    let since = today
        .checked_sub_days(Days::new(days.saturating_sub(1)))
        .unwrap_or(NaiveDate::MIN);
    match ledger.daily_balances(account, today) {
        Ok(daily) => {
            let period: Vec<DailyBalance> =
                daily.into_iter().filter(|day| day.date >= since).collect();
            print_balances(&period, BalanceSummary::over(&period, since), ledger.config())?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            report_error(&format!("failed to compute balances: {err}"))?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Executes the `delete` subcommand.
fn cmd_delete<R: Repository>(
    ledger: &Ledger<R>,
    account: &AccountId,
    transaction: &TransactionId,
) -> io::Result<ExitCode> {
    match ledger.delete_transaction(account, transaction) {
        Ok(entries) => {
            let balance = entries
                .last()
                .map_or(Amount::ZERO, |entry| entry.running_balance);
            writeln!(
                io::stdout().lock(),
                "{} {transaction} {}",
                "Deleted".green().bold(),
                format_args!("(balance now {})", money(balance, ledger.config())).dimmed()
            )?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            report_error(&format!("delete failed: {err}"))?;
            Ok(ExitCode::FAILURE)
        }
    }
}

// ── Output formatting ────────────────────────────────────────────────

/// Formats an amount with the configured number of fraction digits.
fn money(amount: Amount, config: &Config) -> String {
    amount.to_decimal(config.fraction_digits).to_string()
}

/// Colors an amount cell by sign.
fn amount_cell(amount: Amount, config: &Config) -> Cell {
    let cell = Cell::new(money(amount, config));
    if amount.is_negative() {
        cell.fg(Color::Red)
    } else {
        cell.fg(Color::Green)
    }
}

/// Prints the outcome of an import.
fn print_import_report(report: &ImportReport, config: &Config) -> io::Result<()> {
    let mut out = io::stdout().lock();
    writeln!(
        out,
        "{} {}",
        "Import complete!".green().bold(),
        format_args!(
            "({} inserted, {} duplicates, {} skipped)",
            report.inserted(),
            report.duplicates(),
            report.skipped_transactions() + report.skipped.len()
        )
        .dimmed()
    )?;
    writeln!(out)?;

    if !report.statements.is_empty() {
        let mut table = Table::new();
        _ = table.load_preset(UTF8_FULL);
        _ = table.set_header(vec![
            Cell::new("Account").fg(Color::Cyan),
            Cell::new("Inserted").fg(Color::Cyan),
            Cell::new("Duplicates").fg(Color::Cyan),
            Cell::new("Skipped").fg(Color::Cyan),
            Cell::new("Balance").fg(Color::Cyan),
            Cell::new("Reported").fg(Color::Cyan),
        ]);
        for outcome in &report.statements {
            let reported = outcome.merge.discrepancy.map_or_else(
                || Cell::new("matches").fg(Color::DarkGrey),
                |discrepancy| Cell::new(money(discrepancy.reported, config)).fg(Color::Yellow),
            );
            _ = table.add_row(vec![
                Cell::new(&outcome.account),
                Cell::new(outcome.merge.inserted.len()),
                Cell::new(outcome.merge.duplicates.len()),
                Cell::new(outcome.skipped.len()),
                amount_cell(outcome.merge.balance, config),
                reported,
            ]);
        }
        writeln!(out, "{table}")?;
    }

    for skipped in &report.skipped {
        writeln!(
            out,
            "  {} {} {}",
            "skipped:".yellow(),
            skipped.kind,
            format_args!("({})", skipped.reason).dimmed()
        )?;
    }
    for outcome in &report.statements {
        for record in &outcome.skipped {
            writeln!(
                out,
                "  {} record {} of {} {}",
                "skipped:".yellow(),
                record.ordinal,
                outcome.account,
                format_args!("({})", record.reason).dimmed()
            )?;
        }
    }
    Ok(())
}

/// Prints accounts in a table.
fn print_accounts_table(accounts: &[Account], config: &Config) -> io::Result<()> {
    let mut out = io::stdout().lock();
    if accounts.is_empty() {
        writeln!(out, "{}", "No accounts found.".dimmed())?;
        return Ok(());
    }

    let mut table = Table::new();
    _ = table.load_preset(UTF8_FULL);
    _ = table.set_header(vec![
        Cell::new("ID").fg(Color::Cyan),
        Cell::new("Name").fg(Color::Cyan),
        Cell::new("Type").fg(Color::Cyan),
        Cell::new("Currency").fg(Color::Cyan),
        Cell::new("Linked").fg(Color::Cyan),
        Cell::new("Balance").fg(Color::Cyan),
    ]);

    for account in accounts {
        _ = table.add_row(vec![
            Cell::new(&account.id),
            Cell::new(&account.name),
            Cell::new(account.kind),
            Cell::new(account.currency.as_deref().unwrap_or(EMPTY_CELL)),
            Cell::new(account.credential.as_ref().map_or(EMPTY_CELL, |_| "yes")),
            amount_cell(account.balance, config),
        ]);
    }

    writeln!(
        out,
        "{} {}",
        "Accounts".green().bold(),
        format_args!("({})", accounts.len()).dimmed()
    )?;
    writeln!(out)?;
    writeln!(out, "{table}")?;
    Ok(())
}

/// Prints history entries in a table.
fn print_transactions_table(entries: &[LedgerEntry], config: &Config) -> io::Result<()> {
    let mut out = io::stdout().lock();
    if entries.is_empty() {
        writeln!(out, "{}", "No transactions found.".dimmed())?;
        return Ok(());
    }

    let mut table = Table::new();
    _ = table.load_preset(UTF8_FULL);
    _ = table.set_header(vec![
        Cell::new("Date").fg(Color::Cyan),
        Cell::new("Payee").fg(Color::Cyan),
        Cell::new("Memo").fg(Color::Cyan),
        Cell::new("Amount").fg(Color::Cyan),
        Cell::new("Balance").fg(Color::Cyan),
        Cell::new("ID").fg(Color::Cyan),
    ]);

    for entry in entries {
        let tx = &entry.transaction;
        let payee = if tx.payee.is_empty() {
            EMPTY_CELL
        } else {
            tx.payee.as_str()
        };
        _ = table.add_row(vec![
            Cell::new(tx.date.date_naive()),
            Cell::new(payee),
            Cell::new(tx.memo.as_deref().unwrap_or("")),
            amount_cell(tx.amount, config),
            Cell::new(money(entry.running_balance, config)),
            Cell::new(&tx.id).fg(Color::DarkGrey),
        ]);
    }

    writeln!(
        out,
        "{} {}",
        "Transactions".green().bold(),
        format_args!("({})", entries.len()).dimmed()
    )?;
    writeln!(out)?;
    writeln!(out, "{table}")?;
    Ok(())
}

/// Prints daily balances followed by their summary.
fn print_balances(
    daily: &[DailyBalance],
    summary: Option<BalanceSummary>,
    config: &Config,
) -> io::Result<()> {
    let mut out = io::stdout().lock();
    let Some(summary) = summary else {
        writeln!(out, "{}", "No activity in this period.".dimmed())?;
        return Ok(());
    };

    let mut table = Table::new();
    _ = table.load_preset(UTF8_FULL);
    _ = table.set_header(vec![
        Cell::new("Date").fg(Color::Cyan),
        Cell::new("Balance").fg(Color::Cyan),
    ]);
    for day in daily {
        _ = table.add_row(vec![Cell::new(day.date), amount_cell(day.balance, config)]);
    }
    writeln!(out, "{table}")?;
    writeln!(out)?;
    writeln!(
        out,
        "  {} {}  {} {}  {} {}",
        "High:".bold(),
        money(summary.high, config),
        "Low:".bold(),
        money(summary.low, config),
        "Average:".bold(),
        money(summary.average, config)
    )?;
    Ok(())
}

/// Creates a spinner with the given message.
fn make_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_owned());
    spinner.enable_steady_tick(core::time::Duration::from_millis(80));
    spinner
}

/// Entry point.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            // Last-resort error output; if stderr itself failed there is
            // nothing left to report to.
            let _ignored = writeln!(io::stderr(), "fatal I/O error: {err}");
            ExitCode::FAILURE
        }
    }
}
