//! Indexguard CLI
//!
//! Audits every B-tree index and foreign key of a PostgreSQL database (or of a
//! single table) and prints one line per object. Exit status is 0 when nothing
//! was found, 1 when any object failed and 2 when the audit could not run.

mod report;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use indexguard::{connect, AuditConfig, AuditRunner, MayPostgresExecutor};
use report::ConsoleReporter;
use std::process;

const EXIT_FATAL: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "indexguard")]
#[command(about = "Check PostgreSQL indexes and foreign keys against their table data")]
#[command(version = "0.1.0")]
#[command(disable_help_flag = true)]
struct Cli {
    /// Database name
    #[arg(short = 'd', long)]
    database: Option<String>,

    /// Database user
    #[arg(short = 'u', long)]
    user: Option<String>,

    /// Database host
    #[arg(short = 'h', long)]
    hostname: Option<String>,

    /// Database port
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Full connection string; overrides the individual connection flags
    #[arg(long)]
    database_url: Option<String>,

    /// Only check this table (schema-qualified names accepted)
    #[arg(short = 't', long)]
    table: Option<String>,

    /// Skip tables of this many bytes or more (0 checks every table)
    #[arg(short = 'T', long)]
    threshold: Option<u64>,

    /// Stop at the first failed object
    #[arg(short = 's', long)]
    stop_on_failure: bool,

    /// Do not EXPLAIN the index-side checksum
    #[arg(long)]
    no_plan_check: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long)]
    quiet: bool,

    /// Print help
    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,
}

impl Cli {
    /// Layer command-line flags over the loaded configuration
    fn apply(&self, config: &mut AuditConfig) {
        let database = &mut config.database;
        if let Some(url) = &self.database_url {
            database.url = Some(url.clone());
        } else if self.has_connection_flags() && database.url.take().is_some() {
            log::debug!("connection flags given, ignoring the configured database url");
        }
        if let Some(dbname) = &self.database {
            database.dbname = Some(dbname.clone());
        }
        if let Some(user) = &self.user {
            database.user = Some(user.clone());
        }
        if let Some(host) = &self.hostname {
            database.host = Some(host.clone());
        }
        if let Some(port) = self.port {
            database.port = Some(port);
        }

        let audit = &mut config.audit;
        if let Some(table) = &self.table {
            audit.table = Some(table.clone());
        }
        if let Some(threshold) = self.threshold {
            audit.threshold_bytes = threshold;
        }
        if self.stop_on_failure {
            audit.stop_on_failure = true;
        }
        if self.no_plan_check {
            audit.inspect_plan = false;
        }
    }

    fn has_connection_flags(&self) -> bool {
        self.database.is_some() || self.user.is_some() || self.hostname.is_some() || self.port.is_some()
    }
}

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let code = match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e:#}", "Error:".red().bold());
            EXIT_FATAL
        }
    };
    process::exit(code);
}

fn run(cli: &Cli) -> anyhow::Result<i32> {
    let mut config = AuditConfig::load().context("failed to load configuration")?;
    cli.apply(&mut config);

    let client = connect(&config.database.connection_string()).context("failed to connect to database")?;
    let executor = MayPostgresExecutor::new(client);

    let mut reporter = ConsoleReporter::new(std::io::stdout().lock());
    let summary = AuditRunner::new(&executor, config.audit_options())
        .run(&mut reporter)
        .context("failed to enumerate objects to check")?;
    reporter.finish(&summary);

    Ok(summary.exit_code())
}
