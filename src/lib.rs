//! # operonplot
//!
//! Linear gene diagrams of a genomic region, rendered to PNG.
//!
//! - `region`: `[contig:]start-end` expressions
//! - `options`: per-gene label/color overrides from a headerless CSV
//! - `gff`: GFF3 region queries producing the design to draw
//! - `render`: trace-mode glyphs for genes, promoters, terminators and RBS
//! - `figure`: figure/axes model, rasterization and PNG output
//! - `assemble`: the pipeline tying the above together

pub mod assemble;
pub mod color;
pub mod figure;
pub mod font;
pub mod gff;
pub mod options;
pub mod region;
pub mod render;

pub use assemble::{apply_overrides, derived_output_path, plot_region, PlotError, PlotSettings};
pub use options::{load_options, OverrideRecord, OverrideTable};
pub use region::RegionSpec;
