//! Command-line interface for `GeoETL`, a streaming geospatial conversion tool.
//!
//! This binary is a thin façade over [`geoetl_core`]: it parses arguments,
//! configures logging, runs the requested operation and maps failures to exit
//! codes (0 success, 1 failure, 2 invalid request).
//!
//! # Available Commands
//!
//! - `convert` - Convert data between geospatial formats
//! - `info` - Display dataset information and metadata
//! - `drivers` - List all available format drivers and their capabilities

mod display;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{Level, debug, info, warn};
use tracing_log::LogTracer;
use tracing_subscriber::FmtSubscriber;

use geoetl_core::init::default_registry;
use geoetl_core::operations;
use geoetl_core::options::{BATCH_SIZE, GEOMETRY_COLUMN, GEOMETRY_TYPE_HINT};
use geoetl_core::{DriverOptions, GeoEtlError};

#[derive(Parser)]
#[command(
    name = "geoetl",
    version,
    about = "Modern vector geospatial ETL in Rust",
    long_about = "GeoETL converts vector datasets between GeoJSON, CSV (WKT geometry) and \
                  GeoParquet, streaming one record batch at a time."
)]
/// Command-line arguments and options for the `GeoETL` CLI.
struct Cli {
    /// Enable verbose (INFO level) logging output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug (DEBUG level) logging output with detailed diagnostics.
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by commands that open datasets.
#[derive(clap::Args, Debug, Default)]
struct DatasetArgs {
    /// Column holding WKT geometry. Required when reading CSV; renames the
    /// geometry column when writing CSV.
    #[arg(long, value_name = "COLUMN")]
    geometry_column: Option<String>,

    /// Expected geometry type (Point, LineString, Polygon, MultiPoint,
    /// MultiLineString, MultiPolygon), used to validate CSV geometry.
    #[arg(long, value_name = "TYPE")]
    geometry_type: Option<String>,

    /// Number of rows per record batch.
    #[arg(long, value_name = "ROWS")]
    batch_size: Option<usize>,
}

impl DatasetArgs {
    fn into_map(self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        if let Some(column) = self.geometry_column {
            map.insert(GEOMETRY_COLUMN.to_string(), column);
        }
        if let Some(geometry_type) = self.geometry_type {
            map.insert(GEOMETRY_TYPE_HINT.to_string(), geometry_type);
        }
        if let Some(size) = self.batch_size {
            map.insert(BATCH_SIZE.to_string(), size.to_string());
        }
        map
    }
}

/// Available subcommands for the `GeoETL` CLI.
#[derive(Subcommand)]
enum Commands {
    /// Converts data between different vector geospatial formats.
    Convert {
        /// Path to the input geospatial dataset.
        #[arg(short, long, value_name = "DATASET")]
        input: PathBuf,

        /// Path for the output geospatial dataset.
        #[arg(short, long, value_name = "DATASET")]
        output: PathBuf,

        /// The driver to use for reading the input dataset (e.g., "`GeoJSON`", "`CSV`").
        #[arg(long, value_name = "DRIVER")]
        input_driver: String,

        /// The driver to use for writing the output dataset (e.g., "`GeoParquet`").
        #[arg(long, value_name = "DRIVER")]
        output_driver: String,

        #[command(flatten)]
        dataset: DatasetArgs,
    },

    /// Displays information about a vector geospatial dataset.
    Info {
        /// Path to the input geospatial dataset.
        #[arg(value_name = "DATASET")]
        input: PathBuf,

        /// The driver to use for reading the dataset.
        #[arg(short = 'f', long, value_name = "DRIVER")]
        driver: String,

        #[command(flatten)]
        dataset: DatasetArgs,
    },

    /// Lists all available geospatial drivers and their capabilities.
    Drivers,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };
    if let Err(err) = init_logging(log_level) {
        eprintln!("Failed to initialize logging: {err:#}");
        return ExitCode::FAILURE;
    }

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(&err),
    }
}

fn init_logging(level: Level) -> Result<()> {
    // Bridge logs from the `log` crate to the `tracing` ecosystem.
    LogTracer::init()?;
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Prints the error and picks the exit code.
fn report(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<GeoEtlError>() {
        Some(e) => {
            debug!("{e:?}");
            eprintln!("Error: {}", e.user_message());
            if let Some(suggestion) = e.recovery_suggestion() {
                eprintln!("\nSuggestion: {suggestion}");
            }
            ExitCode::from(e.exit_code())
        },
        None => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        },
    }
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Convert {
            input,
            output,
            input_driver,
            output_driver,
            dataset,
        } => {
            handle_convert(input, output, input_driver, output_driver, &dataset.into_map()).await
        },
        Commands::Info {
            input,
            driver,
            dataset,
        } => handle_info(&input, &driver, &dataset.into_map()),
        Commands::Drivers => handle_drivers(),
    }
}

async fn handle_convert(
    input: PathBuf,
    output: PathBuf,
    input_driver: String,
    output_driver: String,
    options: &BTreeMap<String, String>,
) -> Result<()> {
    let options = DriverOptions::from_map(options)?;
    let registry = default_registry()?;
    debug!("Convert options: {options:?}");

    let target = output.clone();
    let task = tokio::task::spawn_blocking(move || {
        operations::convert(
            &registry,
            &input,
            &output,
            &input_driver,
            &output_driver,
            &options,
        )
    });

    tokio::select! {
        joined = task => {
            let summary = joined.context("conversion task panicked")??;
            info!(
                "Conversion complete: {} feature(s) in {} batch(es)",
                summary.rows, summary.batches
            );
            println!("Converted {} feature(s) to {}", summary.rows, target.display());
            Ok(())
        },
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            warn!(
                "Conversion interrupted; {} may be partially written",
                target.display()
            );
            eprintln!("Interrupted. {} may be incomplete.", target.display());
            // The blocking conversion cannot be cancelled and the runtime
            // would wait for it on shutdown.
            std::process::exit(1);
        },
    }
}

fn handle_info(input: &Path, driver: &str, options: &BTreeMap<String, String>) -> Result<()> {
    let options = DriverOptions::from_map(options)?;
    let registry = default_registry()?;
    let info = operations::info(&registry, input, driver, &options)?;
    display::display_dataset_info(&info);
    Ok(())
}

fn handle_drivers() -> Result<()> {
    let registry = default_registry()?;
    display::display_drivers(&operations::list_drivers(&registry));
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_convert_flags_to_options() {
        let cli = Cli::try_parse_from([
            "geoetl",
            "convert",
            "-i",
            "in.csv",
            "-o",
            "out.geojson",
            "--input-driver",
            "CSV",
            "--output-driver",
            "GeoJSON",
            "--geometry-column",
            "wkt",
            "--geometry-type",
            "point",
        ])
        .unwrap();
        let Commands::Convert { dataset, .. } = cli.command else {
            panic!("expected convert");
        };
        let options = DriverOptions::from_map(&dataset.into_map()).unwrap();
        assert_eq!(options.geometry_column.as_deref(), Some("wkt"));
        assert_eq!(
            options.geometry_type,
            Some(geoetl_core::GeometryType::Point)
        );
    }

    #[test]
    fn test_info_accepts_batch_size() {
        let cli = Cli::try_parse_from([
            "geoetl",
            "info",
            "-f",
            "GeoJSON",
            "--batch-size",
            "16",
            "data.geojson",
        ])
        .unwrap();
        let Commands::Info { dataset, .. } = cli.command else {
            panic!("expected info");
        };
        let options = DriverOptions::from_map(&dataset.into_map()).unwrap();
        assert_eq!(options.batch_size, 16);
    }

    #[test]
    fn test_info_requires_driver() {
        assert!(Cli::try_parse_from(["geoetl", "info", "data.geojson"]).is_err());
    }
}
