use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};

mod models;
mod report;
mod retention;
mod source;

use source::{CsvExport, SampleData, UserSource};

#[derive(Parser)]
#[command(name = "onboarding-retention")]
#[command(about = "Weekly signup cohort retention graphs from user exports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Emit retention graph data as JSON
    #[command(group(
        ArgGroup::new("records")
            .args(["csv", "sample"])
            .required(true)
            .multiple(false)
    ))]
    Graph {
        /// Path to a semicolon-delimited user export
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Use generated sample users instead of an export
        #[arg(long)]
        sample: bool,
        #[arg(long, default_value_t = 100)]
        users: usize,
        #[arg(long, default_value_t = 5)]
        weeks: usize,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Generate a markdown retention report
    #[command(group(
        ArgGroup::new("records")
            .args(["csv", "sample"])
            .required(true)
            .multiple(false)
    ))]
    Report {
        /// Path to a semicolon-delimited user export
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Use generated sample users instead of an export
        #[arg(long)]
        sample: bool,
        #[arg(long, default_value_t = 100)]
        users: usize,
        #[arg(long, default_value_t = 5)]
        weeks: usize,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Write a synthetic user export for trying out the graph
    Seed {
        #[arg(long, default_value = "export.csv")]
        out: PathBuf,
        #[arg(long, default_value_t = 100)]
        users: usize,
        #[arg(long, default_value_t = 5)]
        weeks: usize,
    },
}

fn resolve_source(csv: Option<PathBuf>, users: usize, weeks: usize) -> Box<dyn UserSource> {
    match csv {
        Some(path) => Box::new(CsvExport::new(path)),
        None => Box::new(SampleData::new(users, weeks)),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Graph {
            csv,
            sample: _,
            users,
            weeks,
            out,
        } => {
            let source = resolve_source(csv, users, weeks);
            let rows = retention::build_retention_graph_data(source.as_ref())?;
            match out {
                Some(path) => {
                    std::fs::write(&path, serde_json::to_string_pretty(&rows)?)?;
                    println!("Graph data written to {}.", path.display());
                }
                None => println!("{}", serde_json::to_string(&rows)?),
            }
        }
        Commands::Report {
            csv,
            sample: _,
            users,
            weeks,
            out,
        } => {
            let source = resolve_source(csv, users, weeks);
            let rows = retention::build_retention_graph_data(source.as_ref())?;
            std::fs::write(&out, report::build_report(&rows))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Seed { out, users, weeks } => {
            let generated = SampleData::new(users, weeks).load_users()?;
            let file = std::fs::File::create(&out)?;
            source::write_export(file, &generated)?;
            println!(
                "Wrote {} sample users to {}.",
                generated.len(),
                out.display()
            );
        }
    }

    Ok(())
}
