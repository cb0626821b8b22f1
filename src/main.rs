//! PDF Shrink CLI
//!
//! Command-line interface for shrinking PDFs.

use anyhow::Context;
use clap::Parser;
use pdf_shrink::file_ops::{compress_pdf_file, default_output_path};
use pdf_shrink::{format_file_size, CompressOptions};
use std::path::PathBuf;

/// Shrink a PDF by recompressing its images and compacting its objects
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input PDF file path
    #[arg(short, long)]
    input: PathBuf,

    /// Output PDF file path (default: <input>_compressed.pdf)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Quality tier: low, medium or high (unknown values mean medium)
    #[arg(short, long, default_value = "medium")]
    level: String,

    /// Reject inputs larger than this many bytes
    #[arg(long, default_value_t = pdf_shrink::DEFAULT_MAX_INPUT_SIZE)]
    max_size: usize,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    let options = CompressOptions {
        max_input_size: args.max_size,
        ..CompressOptions::for_tier(&args.level)
    };
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input));

    println!("PDF Shrink");
    println!("==========");

    let report = compress_pdf_file(&args.input, &output, &options)
        .with_context(|| format!("Failed to compress {}", args.input.display()))?;

    if args.verbose > 0 {
        for event in &report.events {
            println!("  {}", event);
        }
    }

    println!(
        "\nDone! {} images compressed, {} skipped (tier {})",
        report.images_compressed, report.images_skipped, options.tier
    );

    if report.is_reduced() {
        println!(
            "Size reduced by {:.1}% ({} -> {})",
            report.reduction_percent,
            format_file_size(report.original_bytes),
            format_file_size(report.final_bytes)
        );
    } else {
        println!(
            "Compression didn't reduce file size ({} -> {}); this PDF may already be optimized",
            format_file_size(report.original_bytes),
            format_file_size(report.final_bytes)
        );
    }
    println!("Output saved to: {}", output.display());

    Ok(())
}
