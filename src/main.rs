use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod db;
mod dimension;
mod error;
mod export;
mod followup;
mod metrics;
mod models;
mod report;
mod schema;
mod session;
mod source;

use error::Response;
use models::{LoadSummary, OverallView, SupplierBreakdown};
use schema::RawTable;
use session::{Analyzer, DEFAULT_NPS_TARGET};

#[derive(Parser)]
#[command(name = "supplier-nps")]
#[command(about = "Net Promoter Score breakdowns by supplier from survey records", long_about = None)]
#[command(group(
    ArgGroup::new("source")
        .args(["file", "table"])
        .required(true)
        .multiple(false)
))]
struct Cli {
    /// CSV or Excel file with one survey record per row
    #[arg(long)]
    file: Option<PathBuf>,
    /// Postgres table to read instead of a file (needs DATABASE_URL)
    #[arg(long)]
    table: Option<String>,
    #[arg(long, default_value = "public")]
    schema: String,
    /// Suppliers under this NPS are flagged
    #[arg(long, default_value_t = DEFAULT_NPS_TARGET)]
    target: i64,
    /// Print a JSON envelope instead of text
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the dataset and list its suppliers
    Load,
    /// Rank every supplier against the overall NPS
    Overall {
        /// Re-check the target flag against a different threshold
        #[arg(long = "with-target")]
        with_target: Option<i64>,
    },
    /// Follow-up list plus date, sub-account and follower views for one supplier
    Supplier {
        #[arg(long)]
        id: i64,
    },
    /// Write every view as CSV files
    Export {
        #[arg(long, default_value = "nps_export")]
        out: PathBuf,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "nps_report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(&cli).await {
        if cli.json {
            let response: Response<()> = Response::failed(format!("{err:#}"));
            println!("{}", serde_json::to_string_pretty(&response)?);
            std::process::exit(1);
        }
        return Err(err);
    }
    Ok(())
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let table = read_source(cli).await?;
    let mut analyzer = Analyzer::new();
    let summary = analyzer.load(&table, cli.target)?;

    match &cli.command {
        Commands::Load => {
            let message = format!("{} (target {})", summary.message(), analyzer.target());
            emit(cli.json, message, &summary, print_summary)?;
        }
        Commands::Overall { with_target } => {
            if let Some(target) = with_target {
                analyzer.set_target(*target)?;
            }
            let view = analyzer.overall()?;
            emit(cli.json, summary.message(), &view, print_overall)?;
        }
        Commands::Supplier { id } => {
            let views = analyzer.supplier(*id)?;
            emit(cli.json, summary.message(), &views, |views| {
                print_supplier(*id, views)
            })?;
        }
        Commands::Export { out } => {
            let bundle = analyzer.export()?;
            let files = export::write_bundle(&bundle, out)?;
            let message = format!("wrote {} files to {}", files.len(), out.display());
            emit(cli.json, message.clone(), &files, |_| println!("{message}."))?;
        }
        Commands::Report { out } => {
            let report = report::build_report(&analyzer)?;
            std::fs::write(out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            let message = format!("report written to {}", out.display());
            emit(cli.json, message.clone(), out, |_| println!("{message}."))?;
        }
    }

    Ok(())
}

async fn read_source(cli: &Cli) -> anyhow::Result<RawTable> {
    if let Some(path) = &cli.file {
        return Ok(source::read_path(path)?);
    }

    let table = cli
        .table
        .as_deref()
        .context("either --file or --table is required")?;
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to read from Postgres")?;
    let pool = db::connect(&database_url).await?;
    Ok(db::read_table(&pool, &cli.schema, table).await?)
}

fn emit<T: Serialize>(
    json: bool,
    message: String,
    data: &T,
    render: impl FnOnce(&T),
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&Response::ok(message, data))?);
    } else {
        render(data);
    }
    Ok(())
}

fn print_summary(summary: &LoadSummary) {
    println!(
        "Loaded {} records from {} suppliers, overall NPS {:.2}.",
        summary.record_count, summary.supplier_count, summary.overall_nps
    );
    for supplier in &summary.suppliers {
        println!("- {} ({}): {} orders", supplier.name, supplier.id, supplier.count);
    }
}

fn print_overall(view: &OverallView) {
    println!(
        "Overall NPS {:.2}, target {}.",
        view.overall_nps, view.target
    );
    if view.suppliers.is_empty() {
        println!("No suppliers in this dataset.");
        return;
    }
    for row in &view.suppliers {
        println!(
            "{}. {} ({}) NPS {:.2} across {} orders, contribution {:+.4}{}",
            row.rank,
            row.supplier_name,
            row.supplier_id,
            row.metrics.nps,
            row.metrics.order_count,
            row.contribution,
            if row.below_target { " [below target]" } else { "" }
        );
    }
}

fn print_supplier(supplier_id: i64, views: &SupplierBreakdown) {
    if views.followup.is_empty() {
        println!("No records for supplier {supplier_id}.");
        return;
    }

    println!("Follow-up list ({} orders):", views.followup.len());
    for row in &views.followup {
        println!(
            "- {} priority {} ({}): {}",
            row.order_id, row.priority.level(), row.priority_label, row.follow_up_type
        );
    }

    println!();
    println!("By date:");
    for row in &views.date_dimension {
        println!(
            "- {} NPS {:.2}, cumulative {:.2} ({})",
            row.date, row.daily_nps, row.cumulative_nps, row.trend
        );
    }

    for (title, rows) in [
        ("By sub-account:", &views.account_dimension),
        ("By follower:", &views.follower_dimension),
    ] {
        println!();
        println!("{title}");
        for row in rows {
            println!(
                "- {} ({}) NPS {:.2}, contribution {:+.4}",
                row.name, row.id, row.metrics.nps, row.contribution
            );
        }
    }
}
