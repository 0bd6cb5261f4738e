use std::path::PathBuf;

use anyhow::{Context as _, Result, bail};
use clap::{Args, Parser, Subcommand};
use tidemark_common::{Context, Dialect, TrackingMode};
use tidemark_config::{AppConfig, ConfigLoader};
use tidemark_db::{Migrator, SqliteDatabase, ledger_for};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tidemark", version, about = "Apply ordered SQL migrations")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "TIDEMARK_LOG_JSON")]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply every pending migration
    Up(RunArgs),
    /// List migrations and whether they are applied
    Status(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Config file (YAML or TOML); discovered when omitted
    #[arg(short, long, env = "TIDEMARK_CONFIG")]
    config: Option<PathBuf>,

    /// Migration directory
    #[arg(short, long, env = "TIDEMARK_DIR")]
    dir: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, env = "TIDEMARK_DATABASE")]
    database: Option<PathBuf>,

    /// How applied migrations are recognised: position or sequence
    #[arg(long)]
    tracking: Option<TrackingMode>,

    /// Ledger table name
    #[arg(long)]
    ledger_table: Option<String>,

    /// Abort the run after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Up(args) => up(&args),
        Command::Status(args) => status(&args),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn up(args: &RunArgs) -> Result<()> {
    let config = resolve_config(args)?;
    let (ctx, db) = open(&config)?;
    let ledger = ledger_for(config.database.dialect, &config.database.ledger_table)?;

    let report = Migrator::new()
        .with_tracking(config.migrations.tracking)
        .run(&ctx, &config.migrations.dir, &db, ledger.as_ref())
        .with_context(|| {
            format!(
                "migration run against {} failed",
                config.migrations.dir.display()
            )
        })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.applied.is_empty() {
        println!("database is up to date ({} already applied)", report.skipped.len());
    } else {
        let applied: Vec<String> = report.applied.iter().map(|s| s.to_string()).collect();
        println!(
            "applied {} migration(s): {} in {} ms",
            report.applied.len(),
            applied.join(", "),
            report.elapsed_ms
        );
    }
    Ok(())
}

fn status(args: &RunArgs) -> Result<()> {
    let config = resolve_config(args)?;
    let (ctx, db) = open(&config)?;
    let ledger = ledger_for(config.database.dialect, &config.database.ledger_table)?;

    let status = Migrator::new()
        .with_tracking(config.migrations.tracking)
        .status(&ctx, &config.migrations.dir, &db, ledger.as_ref())
        .context("failed to read migration status")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }
    for entry in &status {
        let state = if entry.applied { "applied" } else { "pending" };
        println!("{state:>8}  {:>6}  {}", entry.sequence, entry.path.display());
    }
    let pending = status.iter().filter(|s| !s.applied).count();
    println!("{} migration(s), {pending} pending", status.len());
    Ok(())
}

/// Config file values, overridden by command-line flags.
fn resolve_config(args: &RunArgs) -> Result<AppConfig> {
    let mut config = ConfigLoader::load_or_default(args.config.as_deref())
        .context("failed to load configuration")?;

    if let Some(dir) = &args.dir {
        config.migrations.dir = dir.clone();
    }
    if let Some(tracking) = args.tracking {
        config.migrations.tracking = tracking;
    }
    if let Some(database) = &args.database {
        config.database.path = Some(database.clone());
    }
    if let Some(table) = &args.ledger_table {
        config.database.ledger_table = table.clone();
    }
    if let Some(timeout) = args.timeout {
        config.database.timeout_secs = Some(timeout);
    }

    config.validate()?;
    debug!(?config, "resolved configuration");
    Ok(config)
}

fn open(config: &AppConfig) -> Result<(Context, SqliteDatabase)> {
    if config.database.dialect != Dialect::Sqlite {
        bail!(
            "the tidemark binary drives SQLite only; dialect {} is available through the library",
            config.database.dialect
        );
    }
    let Some(path) = config.database.path.as_deref() else {
        bail!("no database given: pass --database or set database.path in the config file");
    };

    let ctx = match config.database.timeout() {
        Some(timeout) => Context::with_timeout(timeout),
        None => Context::background(),
    };
    let db = SqliteDatabase::open(path)?;
    Ok((ctx, db))
}
