// Entry point and high-level CLI flow.
//
// - `run` builds the per-division tables, places them into the report
//   template and saves the result as a new workbook.
// - `tables` only builds and prints the tables.
// - `anchors` only prints where each table would be placed.
mod classify;
mod config;
mod crosstab;
mod error;
mod layout;
mod loader;
mod order;
mod output;
mod pipeline;
mod reports;
mod template;
mod types;
mod util;
mod workbook;
mod writer;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indexmap::IndexMap;
use tracing::{error, info};

use config::ReportConfig;
use crosstab::CrossTab;
use error::ReportError;
use output::{RunSummary, TableExport};
use pipeline::{LedgerSource, ReportTemplate};
use workbook::Workbook;

#[derive(Parser)]
#[command(name = "collections_report")]
#[command(about = "Summarize collection call outcomes into the overdue report template")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// TOML file overriding column names, labels and template vocabulary
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Build the tables and write them into a copy of the template
    Run {
        #[command(flatten)]
        inputs: Inputs,

        /// Output workbook
        #[arg(short, long, default_value = "processed_data.xlsx")]
        output: PathBuf,

        #[command(flatten)]
        exports: Exports,
    },
    /// Build and print the tables without touching the template
    Tables {
        #[command(flatten)]
        inputs: Inputs,

        #[command(flatten)]
        exports: Exports,
    },
    /// Print the anchors found in the template
    Anchors {
        /// Report template; its file name carries the DD.MM.YYYY report date
        report: PathBuf,

        #[arg(long, default_value = "Сводная погашения NEW")]
        report_sheet: String,
    },
}

#[derive(Args)]
struct Inputs {
    /// Ledger of call outcomes (.xlsx or .csv)
    ledger: PathBuf,

    /// Report template; its file name carries the DD.MM.YYYY report date
    report: PathBuf,

    #[arg(long, default_value = "Лист1")]
    ledger_sheet: String,

    /// 0-based row holding the ledger's column names
    #[arg(long, default_value_t = 0)]
    header_row: usize,

    #[arg(long, default_value = "Сводная погашения NEW")]
    report_sheet: String,
}

impl Inputs {
    fn sources(&self) -> (LedgerSource, ReportTemplate) {
        (
            LedgerSource {
                path: self.ledger.clone(),
                sheet: self.ledger_sheet.clone(),
                header_row: self.header_row,
            },
            ReportTemplate {
                path: self.report.clone(),
                sheet: self.report_sheet.clone(),
            },
        )
    }
}

#[derive(Args)]
struct Exports {
    /// Also write the tables and anchors as JSON
    #[arg(long)]
    summary_json: Option<PathBuf>,

    /// Also write one CSV per table into this directory
    #[arg(long)]
    csv_dir: Option<PathBuf>,
}

impl Exports {
    fn write(
        &self,
        report_date: Option<String>,
        tables: &IndexMap<String, CrossTab>,
        anchors: &[types::Anchor],
    ) -> Result<()> {
        if let Some(path) = &self.summary_json {
            let summary = RunSummary {
                report_date,
                tables: tables
                    .iter()
                    .map(|(name, table)| TableExport::new(name, table))
                    .collect(),
                anchors: anchors.to_vec(),
            };
            output::write_json(path, &summary)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Summary written to {}", path.display());
        }
        if let Some(dir) = &self.csv_dir {
            let files = output::write_csv_tables(dir, tables)
                .with_context(|| format!("writing CSV tables to {}", dir.display()))?;
            println!(
                "{} CSV tables written to {}",
                util::format_int(files.len()),
                dir.display()
            );
        }
        Ok(())
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if let Err(e) = dispatch(cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Run {
            inputs,
            output,
            exports,
        } => {
            let (ledger, template) = inputs.sources();
            let outcome = pipeline::run(&ledger, &template, &output, &config)?;
            println!(
                "Report {}: {} tables, {} blocks written to {}",
                outcome.report_date,
                util::format_int(outcome.tables.len()),
                util::format_int(outcome.blocks_written),
                output.display()
            );
            exports.write(Some(outcome.report_date), &outcome.tables, &outcome.anchors)
        }
        Command::Tables { inputs, exports } => {
            let (ledger, template) = inputs.sources();
            let tables = pipeline::build_tables(&ledger, &template, &config)?;
            output::preview_tables(&tables);
            exports.write(None, &tables, &[])
        }
        Command::Anchors {
            report,
            report_sheet,
        } => {
            let template = ReportTemplate {
                path: report,
                sheet: report_sheet,
            };
            let workbook = Workbook::open(&template.path)?;
            match pipeline::locate_anchors(&workbook, &template, &config) {
                Ok((report_date, anchors)) => {
                    println!("Report date: {}", report_date);
                    output::preview_anchors(&anchors);
                    Ok(())
                }
                Err(e @ ReportError::MissingSheet { .. }) => {
                    println!("Sheets in workbook: {:?}", workbook.sheet_names());
                    Err(e.into())
                }
                Err(e) => Err(e.into()),
            }
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ReportConfig> {
    match path {
        Some(path) => {
            let config = ReportConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?;
            info!("config loaded from {}", path.display());
            Ok(config)
        }
        None => Ok(ReportConfig::default()),
    }
}
