use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use rate_core::db::{MemoryRepositoryFactory, RepositoryRegistry};
use rate_core::{RateEngine, RoundingMode, RoundingPolicy, TableRepository, TableSelector};
use rate_data::report::{format_evaluation, format_table_summary};
use rate_data::{LegacyFormat, TableLoader, ToolConfig, logging};
use rate_db_sqlite::SqliteRepositoryFactory;
use rust_decimal::Decimal;
use tracing::info;

/// Load tiered rate tables and evaluate amounts against them.
#[derive(Parser, Debug)]
#[command(name = "rate-tool")]
#[command(version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Storage backend (overrides the config file)
    #[arg(short, long, global = true)]
    backend: Option<String>,

    /// Backend connection string, e.g. a SQLite file path (overrides the config file)
    #[arg(short, long, global = true)]
    database: Option<String>,

    /// Log filter directive, e.g. "debug" or "rate_core=trace"
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Also append log records to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate rate tables from a CSV file and store them
    Load {
        /// CSV file with columns table,effective_from,effective_to,lower_bound,upper_bound,rate
        #[arg(short, long)]
        file: PathBuf,

        /// Treat an upper bound of 0 on a table's last row as unbounded
        #[arg(long)]
        legacy_zero_sentinel: bool,

        /// Treat lower bounds of previous-upper-plus-one as contiguous
        #[arg(long)]
        inclusive_bounds: bool,
    },

    /// Compute the levy on an amount using the table effective on a date
    Evaluate {
        /// Logical table name
        #[arg(short, long)]
        table: String,

        /// Date used to pick the effective table (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Amount to evaluate
        #[arg(short, long)]
        amount: Decimal,

        /// Load this CSV first (useful with the memory backend)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Decimal places of the rounded total (overrides the config file)
        #[arg(long)]
        places: Option<u32>,

        /// Midpoint rounding rule (overrides the config file)
        #[arg(long, value_enum)]
        rounding: Option<ModeArg>,

        /// Print the evaluation as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored tables
    List {
        /// Only show tables with this name
        #[arg(short, long)]
        table: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    HalfUp,
    HalfEven,
}

impl From<ModeArg> for RoundingMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::HalfUp => RoundingMode::HalfUp,
            ModeArg::HalfEven => RoundingMode::HalfEven,
        }
    }
}

fn registry() -> RepositoryRegistry {
    let mut registry = RepositoryRegistry::new();
    registry.register(Box::new(MemoryRepositoryFactory));
    registry.register(Box::new(SqliteRepositoryFactory));
    registry
}

fn load_config(args: &Args) -> Result<ToolConfig> {
    let mut config = match &args.config {
        Some(path) => ToolConfig::load(path)?,
        None => ToolConfig::default(),
    };
    if let Some(backend) = &args.backend {
        config.database.backend = backend.clone();
    }
    if let Some(database) = &args.database {
        config.database.connection_string = database.clone();
    }
    Ok(config)
}

async fn load_file(
    repo: &dyn TableRepository,
    path: &Path,
    legacy: LegacyFormat,
) -> Result<usize> {
    let file =
        File::open(path).with_context(|| format!("Failed to open: {}", path.display()))?;

    let records = TableLoader::parse(file)
        .with_context(|| format!("Failed to parse CSV: {}", path.display()))?;
    let tables = TableLoader::assemble(&records, legacy)
        .with_context(|| format!("Invalid rate tables in: {}", path.display()))?;

    info!(records = records.len(), tables = tables.len(), "parsed rate tables");

    TableLoader::load(repo, &tables)
        .await
        .context("Failed to store rate tables")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_logging(args.log_level.as_deref(), args.log_file.as_deref())?;

    let config = load_config(&args)?;
    let repo = registry()
        .create(&config.database)
        .await
        .with_context(|| {
            format!(
                "Failed to open {} storage '{}'",
                config.database.backend, config.database.connection_string
            )
        })?;

    match args.command {
        Command::Load {
            file,
            legacy_zero_sentinel,
            inclusive_bounds,
        } => {
            let legacy = LegacyFormat {
                zero_means_unbounded: legacy_zero_sentinel,
                inclusive_integer_bounds: inclusive_bounds,
            };
            let inserted = load_file(repo.as_ref(), &file, legacy).await?;
            println!("Loaded {} rate bands from {}.", inserted, file.display());
        }
        Command::Evaluate {
            table,
            date,
            amount,
            file,
            places,
            rounding,
            json,
        } => {
            if let Some(file) = &file {
                load_file(repo.as_ref(), file, LegacyFormat::default()).await?;
            }

            let policy = RoundingPolicy::new(
                places.unwrap_or(config.rounding.decimal_places),
                rounding.map_or(config.rounding.mode, RoundingMode::from),
            );
            let resolved = TableSelector::new(repo.as_ref())
                .resolve(&table, date)
                .await
                .with_context(|| format!("Cannot select table '{}' for {}", table, date))?;
            let evaluation = RateEngine::new(policy)
                .evaluate(&resolved, amount)
                .context("Evaluation failed")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&evaluation)?);
            } else {
                print!("{}", format_evaluation(&resolved, &evaluation));
            }
        }
        Command::List { table } => {
            let names = match table {
                Some(name) => vec![name],
                None => repo.list_table_names().await?,
            };
            for name in names {
                for table in repo.tables_named(&name).await? {
                    println!("{}", format_table_summary(&table));
                }
            }
        }
    }

    Ok(())
}
