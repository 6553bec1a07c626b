//! EMF query engine CLI

use clap::{Args, Parser, Subcommand};
use emf_engine::cli::{prompt_spec, EditorReader, OutputFormat, OutputFormatter};
use emf_engine::engine::{EmfContext, QueryResult};
use emf_engine::having::HavingPolicy;
use emf_engine::sales::SalesGenerator;
use emf_engine::source::{ParquetRowSource, RowSource};
use emf_engine::spec::{parse_spec_file, QuerySpec};
use emf_engine::Result;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "emf_engine")]
#[command(about = "Extended multi-feature group-by query engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate synthetic sales data and write it to a Parquet file
    Generate {
        /// Number of rows
        #[arg(short, long, default_value = "10000")]
        rows: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Run a query from a specification file
    Run {
        /// Path to the six-section specification file
        spec: PathBuf,

        #[command(flatten)]
        opts: QueryOpts,
    },

    /// Enter a query field by field and run it
    Interactive {
        #[command(flatten)]
        opts: QueryOpts,
    },
}

#[derive(Args)]
struct QueryOpts {
    /// Parquet file or directory to scan (generated sales data if omitted)
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Rows of generated sales data when no --data is given
    #[arg(short, long, default_value = "10000")]
    rows: usize,

    /// Output format: table, csv, json, vertical
    #[arg(short, long, default_value = "table")]
    format: OutputFormat,

    /// Maximum rows to print
    #[arg(short, long)]
    limit: Option<usize>,

    /// Drop groups whose HAVING clause cannot be evaluated
    #[arg(long)]
    fail_closed: bool,

    /// Decimal digits for averages
    #[arg(long, default_value = "2")]
    avg_precision: u32,

    /// Print per-scan statistics after the result
    #[arg(long)]
    stats: bool,
}

fn main() {
    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Generate { rows, seed, output } => generate(rows, seed, output),
        Commands::Run { spec, opts } => parse_spec_file(&spec).and_then(|spec| run(spec, &opts)),
        Commands::Interactive { opts } => interactive(&opts),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn generate(rows: usize, seed: u64, output: PathBuf) -> Result<()> {
    let start = Instant::now();
    SalesGenerator::with_seed(rows, seed).write_parquet(&output)?;
    println!("Generated {} rows in {:?}", rows, start.elapsed());
    Ok(())
}

fn interactive(opts: &QueryOpts) -> Result<()> {
    let ctx = context(opts);
    let mut reader = EditorReader::new(&ctx.config().catalog)?;
    match prompt_spec(&mut reader)? {
        Some(spec) => run(spec, opts),
        None => Ok(()),
    }
}

fn run(spec: QuerySpec, opts: &QueryOpts) -> Result<()> {
    let result = match &opts.data {
        Some(path) => {
            let source = ParquetRowSource::try_new(path)?;
            let ctx = context(opts).with_catalog(source.catalog()?);
            execute(&ctx, &source, spec)?
        }
        None => {
            let source = SalesGenerator::new(opts.rows).generate_source()?;
            execute(&context(opts), &source, spec)?
        }
    };

    let mut formatter = OutputFormatter::new(opts.format);
    if let Some(limit) = opts.limit {
        formatter = formatter.with_max_rows(limit);
    }
    formatter.print(&result)?;
    if opts.stats {
        formatter.write_summary(&mut std::io::stdout().lock(), &result)?;
    }
    Ok(())
}

fn context(opts: &QueryOpts) -> EmfContext {
    let policy = if opts.fail_closed {
        HavingPolicy::FailClosed
    } else {
        HavingPolicy::FailOpen
    };
    EmfContext::new()
        .with_having_policy(policy)
        .with_avg_precision(opts.avg_precision)
}

fn execute(ctx: &EmfContext, source: &dyn RowSource, spec: QuerySpec) -> Result<QueryResult> {
    tracing::debug!(query = %spec, "executing");
    ctx.execute(source, spec)
}
