use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use scratch_query::prelude::*;

#[derive(Parser)]
#[command(name = "scratch-query")]
#[command(version, about = "Explore a mongodb collection of sensor readings", long_about = None)]
struct Cli {
    /// mongodb connection string
    #[arg(long, global = true, env = "SCRATCH_QUERY_URI")]
    uri: Option<String>,

    /// Database name
    #[arg(long = "db", global = true, env = "SCRATCH_QUERY_DB")]
    database: Option<String>,

    /// Collection name
    #[arg(long, global = true, env = "SCRATCH_QUERY_COLLECTION")]
    collection: Option<String>,

    /// TOML file with runner options
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum)]
    format: Option<OutputFormat>,

    /// Upper timestamp bound for the range scan (RFC 3339 or YYYY-MM-DD)
    #[arg(long, global = true)]
    before: Option<String>,

    /// Field to unwind and count
    #[arg(long, global = true)]
    field: Option<String>,

    /// Documents per cursor batch
    #[arg(long, global = true)]
    batch_size: Option<u32>,

    /// Documents read to infer the table columns
    #[arg(long, global = true, env = "SCRATCH_QUERY_INFER_SCHEMA_LENGTH")]
    infer_schema_length: Option<usize>,

    /// Read documents from an extended JSON dump instead of a server
    #[arg(long, global = true)]
    dump: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Run every query in sequence (default)
    Run,
    /// Print one arbitrary document
    Sample,
    /// Count documents
    Count,
    /// Print all documents
    Scan,
    /// Print documents before the bound, oldest first
    Range,
    /// Count documents per value of the unwound field
    Agg,
}

impl Commands {
    fn step(self) -> Option<Step> {
        match self {
            Commands::Run => None,
            Commands::Sample => Some(Step::Sample),
            Commands::Count => Some(Step::Count),
            Commands::Scan => Some(Step::Scan),
            Commands::Range => Some(Step::Range),
            Commands::Agg => Some(Step::Agg),
        }
    }
}

impl Cli {
    /// Defaults, then the config file, then environment and flags.
    fn options(&self) -> Result<RunnerOptions> {
        let options = match &self.config {
            Some(path) => RunnerOptions::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => RunnerOptions::default(),
        };
        Ok(options.with_overrides(Overrides {
            uri: self.uri.clone(),
            database: self.database.clone(),
            collection: self.collection.clone(),
            before: self.before.clone(),
            field: self.field.clone(),
            format: self.format,
            batch_size: self.batch_size,
            infer_schema_length: self.infer_schema_length,
        }))
    }

    fn step(&self) -> Option<Step> {
        self.command.unwrap_or(Commands::Run).step()
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let options = cli.options()?;
    tracing::debug!(
        database = %options.database,
        collection = %options.collection,
        format = %options.format,
        "resolved options"
    );

    let step = cli.step();
    let before = required_bound(&options, step)?;
    let stdout = io::stdout().lock();
    let mut report = Report::new(stdout, options.format)
        .with_infer_schema_length(options.infer_schema_length);

    match &cli.dump {
        Some(path) => {
            let source = MemorySource::from_path(path)
                .with_context(|| format!("reading dump {}", path.display()))?;
            let runner = QueryRunner::with_bound(source, before, options.field.clone());
            execute(runner, step, &mut report)?;
        }
        None => {
            let source = MongoSource::from_options(&options)
                .with_context(|| format!("opening {}.{}", options.database, options.collection))?;
            let runner = QueryRunner::with_bound(source, before, options.field.clone());
            execute(runner, step, &mut report)?;
        }
    }

    report.into_inner().flush()?;
    Ok(())
}

fn execute<S: DocumentSource, W: Write>(
    runner: QueryRunner<S>,
    step: Option<Step>,
    report: &mut Report<W>,
) -> scratch_query::Result<RunSummary> {
    match step {
        Some(step) => runner.run_step(step, report),
        None => runner.run(report),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("scratch-query").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn environment_beats_config_and_flags_beat_environment() {
        let mut config = tempfile::NamedTempFile::new().unwrap();
        writeln!(config, "collection = \"from_file\"\ndatabase = \"file_db\"").unwrap();
        let path = config.path().to_str().unwrap();

        std::env::set_var("SCRATCH_QUERY_COLLECTION", "from_env");
        let from_env = parse(&["--config", path, "count"]).options().unwrap();
        let from_flag = parse(&["--config", path, "--collection", "from_flag", "count"])
            .options()
            .unwrap();
        std::env::remove_var("SCRATCH_QUERY_COLLECTION");

        assert_eq!(from_env.collection, "from_env");
        assert_eq!(from_env.database, "file_db");
        assert_eq!(from_flag.collection, "from_flag");
    }

    #[test]
    fn flags_after_the_subcommand_apply() {
        let cli = parse(&["agg", "--field", "accel", "-f", "table", "--infer-schema-length", "3"]);
        let options = cli.options().unwrap();
        assert_eq!(cli.step(), Some(Step::Agg));
        assert_eq!(options.field, "accel");
        assert_eq!(options.format, OutputFormat::Table);
        assert_eq!(options.infer_schema_length, 3);
    }

    #[test]
    fn bad_bound_only_fails_steps_that_use_it() {
        let cli = parse(&["count", "--before", "soon"]);
        assert_eq!(required_bound(&cli.options().unwrap(), cli.step()).unwrap(), None);

        let cli = parse(&["range", "--before", "soon"]);
        assert!(required_bound(&cli.options().unwrap(), cli.step()).is_err());

        let cli = parse(&["--before", "soon"]);
        assert_eq!(cli.step(), None);
        assert!(required_bound(&cli.options().unwrap(), cli.step()).is_err());
    }
}
