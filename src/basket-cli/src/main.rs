//! Basket — batch analytics over grocery order data.
//!
//! # Usage
//!
//! ```bash
//! # Run the full pipeline
//! basket run --input-dir ./data/processed --output-dir ./data/output
//!
//! # Run with a config file, overriding parallelism
//! basket run --config basket.json --parallelism 4
//!
//! # Compute one analysis and print it without writing
//! basket preview --analysis top_aisle_products --input-dir ./data/processed
//! ```

mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use basket_engine::{analyses, run_pipeline, unify_order_items, ExecutionContext, RuntimeConfig};
use basket_storage::{CsvMaterializer, CsvTableLoader, TableLoader};
use common_config::PipelineConfig;
use common_error::{BasketError, BasketResult};

/// Basket CLI.
#[derive(Parser, Debug)]
#[command(name = "basket")]
#[command(about = "Batch analytics over grocery order data")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full pipeline and materialize all five derived tables
    Run {
        /// Directory holding the six cleaned input tables
        #[arg(short, long)]
        input_dir: Option<PathBuf>,

        /// Directory the derived tables are written to
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Aggregation worker parallelism
        #[arg(short, long)]
        parallelism: Option<usize>,

        /// Memory budget in bytes
        #[arg(short = 'm', long)]
        memory_limit: Option<usize>,

        /// JSON configuration file (flags override its values)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Compute one analysis and print it without materializing
    Preview {
        /// Analysis name, e.g. popular_products or top_aisle_products
        #[arg(short, long)]
        analysis: String,

        /// Directory holding the six cleaned input tables
        #[arg(short, long)]
        input_dir: Option<PathBuf>,

        /// Maximum rows to print
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,

        /// Aggregation worker parallelism
        #[arg(short, long)]
        parallelism: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> BasketResult<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Commands::Run {
            input_dir,
            output_dir,
            parallelism,
            memory_limit,
            config,
        } => run(input_dir, output_dir, parallelism, memory_limit, config).await,
        Commands::Preview {
            analysis,
            input_dir,
            limit,
            parallelism,
        } => preview(&analysis, input_dir, limit, parallelism).await,
    }
}

async fn run(
    input_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    parallelism: Option<usize>,
    memory_limit: Option<usize>,
    config: Option<PathBuf>,
) -> BasketResult<()> {
    let mut config = match config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = input_dir {
        config.io.input_dir = dir.display().to_string();
    }
    if let Some(dir) = output_dir {
        config.io.output_dir = dir.display().to_string();
    }
    if parallelism.is_some() {
        config.execution.parallelism = parallelism;
    }
    if memory_limit.is_some() {
        config.execution.memory_limit = memory_limit;
    }

    let ctx = ExecutionContext::new(RuntimeConfig::from(&config.execution));
    let loader = CsvTableLoader::new(&config.io.input_dir);
    let materializer = Arc::new(CsvMaterializer::new(&config.io.output_dir));

    let reports = run_pipeline(&ctx, &loader, materializer).await?;

    println!("\n{}", "=".repeat(72));
    println!("Pipeline Summary");
    println!("{}", "=".repeat(72));
    println!("{:<32} {:>10} {:>12}  status", "analysis", "rows", "time");
    let mut failures = 0;
    for report in &reports {
        let status = match &report.error {
            None => "ok".to_string(),
            Some(error) => {
                failures += 1;
                format!("FAILED: {error}")
            }
        };
        println!(
            "{:<32} {:>10} {:>12}  {}",
            report.name,
            report.rows,
            format!("{:?}", report.elapsed),
            status
        );
    }
    println!("{}", "=".repeat(72));

    if let Some(sink) = &ctx.metrics {
        for (name, metrics) in sink.snapshot() {
            log::info!("{name}: {metrics}");
        }
    }

    if failures > 0 {
        eprintln!("{failures} of {} analyses failed", reports.len());
        std::process::exit(1);
    }
    println!("Results written to {}", config.io.output_dir);
    Ok(())
}

async fn preview(
    analysis: &str,
    input_dir: Option<PathBuf>,
    limit: usize,
    parallelism: Option<usize>,
) -> BasketResult<()> {
    let mut config = PipelineConfig::default();
    if let Some(dir) = input_dir {
        config.io.input_dir = dir.display().to_string();
    }
    if parallelism.is_some() {
        config.execution.parallelism = parallelism;
    }

    let ctx = ExecutionContext::new(RuntimeConfig::from(&config.execution));
    let loader = CsvTableLoader::new(&config.io.input_dir);
    let tables = loader.load().await?;

    let relation = match analysis {
        "popular_products" => {
            let unified = unify_order_items(&tables.order_items_prior, &tables.order_items_train)?;
            analyses::popularity::compute(
                &ctx,
                &unified,
                &tables.products,
                &tables.aisles,
                &tables.departments,
            )
            .await?
        }
        "reorder_rates_by_department" => {
            let unified = unify_order_items(&tables.order_items_prior, &tables.order_items_train)?;
            analyses::reorder::compute(&ctx, &unified, &tables.products, &tables.departments)
                .await?
        }
        "order_hour_patterns" => analyses::hourly::compute(&ctx, &tables.orders).await?,
        "user_frequency" => analyses::frequency::compute(&ctx, &tables.orders).await?,
        "top_aisle_products" => {
            let unified = unify_order_items(&tables.order_items_prior, &tables.order_items_train)?;
            analyses::top_aisle::compute(&ctx, &unified, &tables.products, &tables.aisles).await?
        }
        other => {
            return Err(BasketError::invalid_parameter(format!(
                "unknown analysis {other}; expected one of {}",
                analyses::ALL.join(", ")
            )))
        }
    };

    println!("\n{analysis} ({} rows)", relation.num_rows());
    print!("{}", utils::format_relation(&relation, limit));
    Ok(())
}
