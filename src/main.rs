use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use operonplot::{derived_output_path, load_options, plot_region, PlotSettings, RegionSpec};

#[derive(Parser)]
#[command(name = "operonplot")]
#[command(about = "Draw the genes of a genomic region as a linear diagram.", long_about = None)]
struct Args {
    /// The genomic region to plot: [CONTIG:]start-end.
    #[arg(long = "region", value_name = "REGION")]
    region: RegionSpec,

    /// Read gene annotations from this GFF FILE.
    #[arg(long = "gff", value_name = "FILE")]
    gff: PathBuf,

    /// CSV FILE of id,label,color rows without a header.
    #[arg(long = "options", value_name = "FILE")]
    options: PathBuf,

    /// Write the PNG here instead of next to the GFF file.
    #[arg(short = 'o', long = "out", value_name = "FILE")]
    out: Option<PathBuf>,

    /// Output resolution in dots per inch.
    #[arg(long = "dpi", value_name = "N", default_value_t = 300)]
    dpi: u32,

    // Logging
    /// Verbosity level (0 = error, 1 = info, 2 = debug).
    #[arg(short = 'v', long = "verbose", value_name = "N", default_value_t = 1)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    let options = load_options(&args.options)
        .with_context(|| format!("Error loading options from {:?}", args.options))?;
    info!("Loaded {} display overrides", options.len());

    let out = args.out.unwrap_or_else(|| derived_output_path(&args.gff));
    let settings = PlotSettings { dpi: args.dpi as f64, ..PlotSettings::default() };

    info!("Plotting {}...", args.region);
    plot_region(&args.gff, &args.region, &options, &out, &settings)
        .with_context(|| format!("Error plotting {} from {:?}", args.region, args.gff))?;

    info!("Done.");
    Ok(())
}
