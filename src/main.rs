//! tmc CLI: extract traffic movement counts from survey documents.

use std::path::{Path, PathBuf};

use chrono::{NaiveTime, TimeDelta};
use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};

use tmc_extract::assemble::extract_batch;
use tmc_extract::config::ExtractConfig;
use tmc_extract::error::TmcError;
use tmc_extract::export::{self, Emit};
use tmc_extract::locator::detect_format;
use tmc_extract::model::{DocumentFormat, PeriodFilter, PeriodLabel, RawDocument, RowMeta, TimeWindow};
use tmc_extract::period::{classify_by_start_hour, classify_fixed_slot};

#[derive(Parser)]
#[command(name = "tmc", version, about = "Traffic movement count extractor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    /// Pick the format from each file's extension.
    Auto,
    Html,
    Xlsx,
    Pdf,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmitArg {
    Csv,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract one record per survey document.
    Extract {
        /// Survey documents to read.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Document format.
        #[arg(long, value_enum, default_value = "auto")]
        format: FormatArg,

        /// Periods to populate (comma-separated, e.g. "AM,PM").
        #[arg(long)]
        periods: Option<String>,

        /// TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output encoding.
        #[arg(long, value_enum)]
        emit: Option<EmitArg>,

        /// Write the table here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Intersection name carried into every row.
        #[arg(long)]
        intersection: Option<String>,

        /// Intersection location as `POINT (lon lat)`.
        #[arg(long)]
        geom: Option<String>,
    },

    /// Print the period label of a peak window.
    Classify {
        /// A window ("07:30 - 08:30") or a start time ("07:30", one hour assumed).
        window: String,

        /// Confirm against a fixed workbook slot instead of the start hour.
        #[arg(long)]
        slot: Option<PeriodLabel>,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract {
            files,
            format,
            periods,
            config,
            emit,
            out,
            intersection,
            geom,
        } => {
            let config = match config {
                Some(path) => ExtractConfig::load(&path)?,
                None => ExtractConfig::default(),
            };
            let filter = match periods {
                Some(list) => list.parse::<PeriodFilter>()?,
                None => config.filter(),
            };
            let emit = match emit {
                Some(EmitArg::Csv) => Emit::Csv,
                Some(EmitArg::Json) => Emit::Json,
                None => config.emit,
            };

            let mut meta = intersection.map(RowMeta::new).unwrap_or_default();
            if let Some(geom) = geom.as_deref() {
                meta = meta.with_geom(geom);
            }

            let docs = files
                .iter()
                .map(|path| read_document(path, format, &meta))
                .collect::<Result<Vec<_>>>()?;

            let report = extract_batch(&docs, &filter);

            match out {
                Some(path) => {
                    let file = std::fs::File::create(&path).into_diagnostic()?;
                    export::write(
                        std::io::BufWriter::new(file),
                        &report.records,
                        emit,
                        config.include_headers,
                    )?;
                }
                None => export::write(
                    std::io::stdout().lock(),
                    &report.records,
                    emit,
                    config.include_headers,
                )?,
            }

            eprintln!("{} succeeded, {} failed", report.succeeded(), report.failed());
            for failure in &report.failures {
                eprintln!("  {failure}");
            }
        }

        Commands::Classify { window, slot } => {
            let parsed = match TimeWindow::parse(&window) {
                Some(w) => w,
                None => {
                    let start = NaiveTime::parse_from_str(window.trim(), "%H:%M")
                        .into_diagnostic()?;
                    TimeWindow::new(start, start + TimeDelta::hours(1))
                }
            };
            let label = match slot {
                Some(slot) => classify_fixed_slot(slot, &parsed),
                None => classify_by_start_hour(&parsed),
            };
            println!("{parsed}: {label}");
        }
    }

    Ok(())
}

fn read_document(path: &Path, format: FormatArg, meta: &RowMeta) -> Result<RawDocument> {
    let format = match format {
        FormatArg::Auto => {
            detect_format(&path.to_string_lossy()).ok_or_else(|| TmcError::UnsupportedFormat {
                format: path.display().to_string(),
            })?
        }
        FormatArg::Html => DocumentFormat::Html,
        FormatArg::Xlsx => DocumentFormat::Spreadsheet,
        FormatArg::Pdf => DocumentFormat::Pdf,
    };
    let payload = std::fs::read(path).map_err(TmcError::from)?;
    Ok(RawDocument::new(path.display().to_string(), format, payload).with_meta(meta.clone()))
}
