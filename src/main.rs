//! discodump - streaming toolkit for Discogs XML data dumps
//!
//! Converts the monthly gzipped XML dumps (artists, labels, masters,
//! releases) to JSON / JSON Lines, loads them into SQLite or PostgreSQL,
//! or samples the first N elements into a smaller dump.

#![allow(dead_code)]

mod config;
mod entity;
mod errors;
mod filter;
mod models;
mod parsers;
mod pipeline;
mod reader;
mod sampler;
mod sink;
mod summary;
mod xml;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::Defaults;
use crate::entity::EntityType;
use crate::filter::{ExpressionFilter, Filter, FilterChain, UnsetFields};
use crate::pipeline::{
    build_database_path, build_output_path, ConvertOptions, LoadOptions, RunOptions,
};
use crate::sink::{Compression, FileFormat};
use crate::summary::SummaryCollector;

/// Streaming toolkit for Discogs data dumps
#[derive(Parser, Debug)]
#[command(name = "discodump")]
#[command(version = "0.3.0")]
#[command(about = "Convert Discogs XML dumps or load them into a database")]
struct Cli {
    /// Enable debug logging and full error traces
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Args)]
struct SharedArgs {
    /// Max elements per input file
    #[arg(long)]
    limit: Option<u64>,

    /// Entity type override (bypasses the filename check)
    #[arg(long = "type", value_enum)]
    entity: Option<EntityType>,

    /// Drop records matching an expression, e.g. "id == 1" (repeatable)
    #[arg(long = "drop-if")]
    drop_if: Vec<String>,

    /// Set fields to null, comma-separated (repeatable)
    #[arg(long)]
    unset: Vec<String>,

    /// Audit that parsers consume every tag and attribute
    #[arg(long)]
    strict: bool,

    /// Treat parse errors and unhandled data as fatal (implies --strict)
    #[arg(long = "strict-fail")]
    strict_fail: bool,

    /// Print the run summary (default)
    #[arg(long, overrides_with = "no_summary")]
    summary: bool,

    /// Do not print the run summary
    #[arg(long = "no-summary", overrides_with = "summary")]
    no_summary: bool,

    /// Render a progress bar (default)
    #[arg(long, overrides_with = "no_progress")]
    progress: bool,

    /// Do not render a progress bar
    #[arg(long = "no-progress", overrides_with = "progress")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert data dumps to another format
    Convert {
        /// Input dump files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output file format
        #[arg(long, value_enum)]
        format: FileFormat,

        /// Output directory
        #[arg(long = "output-dir", short = 'o')]
        output_dir: Option<PathBuf>,

        /// Compression for output files
        #[arg(long, value_enum, default_value = "none")]
        compress: Compression,

        /// Overwrite existing output files
        #[arg(long)]
        overwrite: bool,

        #[command(flatten)]
        shared: SharedArgs,
    },

    /// Load data dumps into a database
    Load {
        /// Input dump files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Database DSN (sqlite:///... or postgresql://...); derived from
        /// the first input filename when omitted
        #[arg(long)]
        dsn: Option<String>,

        /// Rows buffered per table before a bulk flush
        #[arg(long)]
        batch: Option<usize>,

        /// Commit every N rows (PostgreSQL crash resilience)
        #[arg(long = "commit-interval")]
        commit_interval: Option<u64>,

        #[command(flatten)]
        shared: SharedArgs,
    },

    /// Extract the first N elements into a smaller dump
    Sample {
        /// Input dump file
        file: PathBuf,

        /// Number of elements to extract
        #[arg(long, default_value_t = 1000)]
        count: u64,

        /// Output path; defaults to <stem>_sample_<count>.xml.gz
        #[arg(long)]
        output: Option<PathBuf>,

        /// Overwrite an existing output file
        #[arg(long)]
        overwrite: bool,

        /// Render a progress bar
        #[arg(long)]
        progress: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::new(format!("{log_level},sqlx=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if cli.debug {
                eprintln!("Error: {err:?}");
            } else {
                eprintln!("Error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<()> {
    let defaults = Defaults::from_env();
    match command {
        Command::Convert {
            files,
            format,
            output_dir,
            compress,
            overwrite,
            shared,
        } => {
            let output_dir = output_dir.unwrap_or_else(|| defaults.output_dir.clone());
            if !overwrite && !format.aggregates_inputs() {
                check_existing_outputs(&files, format, &output_dir, compress)?;
            }

            let filters = build_filters(&shared)?;
            let mut summary = (!shared.no_summary).then(|| new_collector(&shared));
            let options = ConvertOptions {
                format,
                compression: compress,
                output_dir,
                run: run_options(&shared),
            };

            let result = pipeline::convert(&files, &options, &filters, summary.as_mut()).await;
            render_summary(summary);
            result.context("conversion failed")?;
            Ok(())
        }

        Command::Load {
            files,
            dsn,
            batch,
            commit_interval,
            shared,
        } => {
            let dsn = match dsn {
                Some(dsn) => dsn,
                None => {
                    let path = build_database_path(&files, &defaults.output_dir)?;
                    info!("No DSN given, loading into {}", path.display());
                    path.display().to_string()
                }
            };

            let filters = build_filters(&shared)?;
            let mut summary = (!shared.no_summary).then(|| new_collector(&shared));
            let options = LoadOptions {
                batch_size: batch.unwrap_or(defaults.batch_size),
                commit_interval,
                run: run_options(&shared),
            };

            let result = pipeline::load(&files, &dsn, &options, &filters, summary.as_mut()).await;
            render_summary(summary);
            result.context("load failed")?;
            Ok(())
        }

        Command::Sample {
            file,
            count,
            output,
            overwrite,
            progress,
        } => {
            let output = output.unwrap_or_else(|| sampler::build_sample_path(&file, count));
            if output.exists() && !overwrite {
                bail!(
                    "output already exists: {} (use --overwrite)",
                    output.display()
                );
            }

            let bar = progress.then(|| {
                let bar = indicatif::ProgressBar::new(count);
                bar.set_style(
                    indicatif::ProgressStyle::default_bar()
                        .template("{spinner:.green} [{bar:40.cyan/blue}] {human_pos}/{human_len}")
                        .expect("progress template is valid")
                        .progress_chars("#>-"),
                );
                bar
            });
            let mut tick = || {
                if let Some(bar) = &bar {
                    bar.inc(1);
                }
            };

            let written = sampler::sample(&file, &output, count, Some(&mut tick))?;
            if let Some(bar) = &bar {
                bar.finish_and_clear();
            }
            info!("Wrote {} elements to {}", written, output.display());
            Ok(())
        }
    }
}

fn run_options(shared: &SharedArgs) -> RunOptions {
    RunOptions {
        limit: shared.limit,
        strict: shared.strict || shared.strict_fail,
        fail_on_unhandled: shared.strict_fail,
        show_progress: !shared.no_progress,
        entity: shared.entity,
    }
}

fn new_collector(shared: &SharedArgs) -> SummaryCollector {
    SummaryCollector::new(shared.strict || shared.strict_fail)
}

fn render_summary(summary: Option<SummaryCollector>) {
    if let Some(collector) = summary {
        println!("{}", collector.finish().display());
    }
}

fn build_filters(shared: &SharedArgs) -> Result<FilterChain> {
    let mut filters = Vec::new();
    for expression in &shared.drop_if {
        let parsed = ExpressionFilter::parse(expression)
            .with_context(|| format!("bad --drop-if expression: {expression:?}"))?;
        filters.push(Filter::Drop(parsed));
    }
    if let Some(unset) = UnsetFields::parse(&shared.unset) {
        filters.push(Filter::Unset(unset));
    }
    Ok(FilterChain::new(filters))
}

fn check_existing_outputs(
    files: &[PathBuf],
    format: FileFormat,
    output_dir: &std::path::Path,
    compression: Compression,
) -> Result<()> {
    let existing: Vec<PathBuf> = files
        .iter()
        .filter(|f| f.is_file())
        .map(|f| build_output_path(f, format, output_dir, compression))
        .filter(|out| out.exists())
        .collect();
    if !existing.is_empty() {
        let listed = existing
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        bail!("output files already exist: {listed} (use --overwrite)");
    }
    Ok(())
}
