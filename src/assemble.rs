//! Diagram assembly: query the region, apply overrides, render, save.

use std::path::{Path, PathBuf};

use log::{debug, info};
use thiserror::Error;

use crate::color::BLACK;
use crate::figure::{Figure, FigureError, Margins};
use crate::gff::{self, Feature, GffError};
use crate::options::OverrideTable;
use crate::region::RegionSpec;
use crate::render::{DiagramRenderer, RenderError};

/// Label size applied to every overridden feature
pub const OVERRIDE_LABEL_SIZE: f64 = 2.0;

#[derive(Error, Debug)]
pub enum PlotError {
    #[error(transparent)]
    Gff(#[from] GffError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Figure(#[from] FigureError),
}

/// Fixed layout of the diagram.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSettings {
    pub scale: f64,
    pub linewidth: f64,
    /// Horizontal padding around the rendered extent, in drawing units
    pub padding: f64,
    pub ylim: (f64, f64),
    pub baseline_width: f64,
    pub figsize: (f64, f64),
    pub margins: Margins,
    pub dpi: f64,
}

impl Default for PlotSettings {
    fn default() -> Self {
        PlotSettings {
            scale: 4.0,
            linewidth: 0.8,
            padding: 20.0,
            ylim: (-8.0, 8.0),
            baseline_width: 0.5,
            figsize: (5.0, 0.6),
            margins: Margins { left: 0.01, right: 0.99, top: 0.99, bottom: 0.01 },
            dpi: 300.0,
        }
    }
}

/// The annotation path with its extension replaced by `.png`.
pub fn derived_output_path(gff: &Path) -> PathBuf {
    gff.with_extension("png")
}

/// Replace label and color of every feature whose lower-cased locus tag is in
/// `options`. Returns how many features were changed.
pub fn apply_overrides(design: &mut [Feature], options: &OverrideTable) -> usize {
    let mut applied = 0;
    for feature in design.iter_mut() {
        let Some(locus_tag) = feature.opts.locus_tag() else {
            continue;
        };
        let Some(over) = options.get(&locus_tag.to_lowercase()) else {
            continue;
        };
        debug!("Override for {}: label '{}', color {}", locus_tag, over.label, over.color);
        feature.opts.label = Some(over.label.clone());
        feature.opts.color = Some(over.color.clone());
        feature.opts.label_size = Some(OVERRIDE_LABEL_SIZE);
        applied += 1;
    }
    applied
}

/// Lay out an already merged design on a new figure.
pub fn build_figure(design: &[Feature], settings: &PlotSettings) -> Result<Figure, PlotError> {
    let renderer = DiagramRenderer::new(settings.scale, settings.linewidth);
    let mut fig = Figure::new(settings.figsize.0, settings.figsize.1);

    let axes = fig.axes_mut();
    let (start, end) = renderer.render(axes, design)?;
    let (left, right) = (start - settings.padding, end + settings.padding);
    axes.set_xlim(left, right);
    axes.set_ylim(settings.ylim.0, settings.ylim.1);
    axes.plot(&[left, right], &[0.0, 0.0], BLACK, settings.baseline_width, 1.0);
    axes.axis_off();
    fig.subplots_adjust(settings.margins);

    debug!("Drawing extent {}-{}, view {}-{}", start, end, left, right);
    Ok(fig)
}

/// Render the genes of `region` from `gff` to a PNG at `out`.
pub fn plot_region(
    gff: &Path,
    region: &RegionSpec,
    options: &OverrideTable,
    out: &Path,
    settings: &PlotSettings,
) -> Result<(), PlotError> {
    let mut design = gff::load_design(gff, region.contig.as_deref(), region.query_window())?;
    let applied = apply_overrides(&mut design, options);
    info!("Applied {} of {} display overrides", applied, options.len());

    let fig = build_figure(&design, settings)?;
    let (width, height) = fig.pixel_size(settings.dpi);
    info!("Saving {}x{} image to {:?}...", width, height, out);
    fig.save_png(out, settings.dpi)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::figure::Shape;
    use crate::gff::{DisplayOptions, PartType};
    use crate::options::OverrideRecord;

    fn gene(name: &str, locus_tag: &str, start: i64, end: i64) -> Feature {
        let mut opts = DisplayOptions::default();
        opts.extra.insert("locus_tag".to_string(), locus_tag.to_string());
        Feature { name: name.to_string(), part_type: PartType::Cds, forward: true, start, end, opts }
    }

    fn table(rows: &[(&str, &str, &str)]) -> OverrideTable {
        rows.iter()
            .map(|(id, label, color)| {
                (id.to_string(), OverrideRecord { label: label.to_string(), color: color.to_string() })
            })
            .collect()
    }

    #[test]
    fn test_matching_feature_is_overridden() {
        let mut design = vec![gene("dnaA", "ABC_00001", 1, 100), gene("dnaN", "ABC_00002", 200, 300)];
        let untouched = design[1].clone();
        let options = table(&[("abc_00001", "DnaA", "#ff0000")]);

        assert_eq!(apply_overrides(&mut design, &options), 1);
        assert_eq!(design[0].opts.label.as_deref(), Some("DnaA"));
        assert_eq!(design[0].opts.color.as_deref(), Some("#ff0000"));
        assert_eq!(design[0].opts.label_size, Some(OVERRIDE_LABEL_SIZE));
        assert_eq!(design[1], untouched);
    }

    #[test]
    fn test_upper_case_keys_never_match() {
        let mut design = vec![gene("dnaA", "ABC_00001", 1, 100)];
        let options = table(&[("ABC_00001", "DnaA", "red")]);
        assert_eq!(apply_overrides(&mut design, &options), 0);
        assert_eq!(design[0].opts.label, None);
    }

    #[test]
    fn test_feature_without_locus_tag_is_skipped() {
        let mut design = vec![Feature {
            name: "pLac".to_string(),
            part_type: PartType::Promoter,
            forward: true,
            start: 1,
            end: 20,
            opts: DisplayOptions::default(),
        }];
        assert_eq!(apply_overrides(&mut design, &table(&[("plac", "P", "red")])), 0);
    }

    #[test]
    fn test_build_figure_pads_extent_and_draws_baseline() {
        let design = vec![gene("dnaA", "ABC_00001", 100, 400)];
        let fig = build_figure(&design, &PlotSettings::default()).unwrap();
        let axes = fig.axes();

        assert_eq!(axes.xlim(), (80.0, 420.0));
        assert_eq!(axes.ylim(), (-8.0, 8.0));
        assert!(!axes.axis_visible());
        let baseline = axes.artists().last().unwrap();
        assert_eq!(baseline.zorder, 1.0);
        assert_eq!(
            baseline.shape,
            Shape::Line { points: vec![(80.0, 0.0), (420.0, 0.0)], color: BLACK, linewidth: 0.5 }
        );
        assert_eq!(fig.pixel_size(300.0), (1500, 180));
    }

    #[test]
    fn test_build_figure_rejects_empty_design() {
        let err = build_figure(&[], &PlotSettings::default()).unwrap_err();
        assert!(matches!(err, PlotError::Render(RenderError::EmptyDesign)));
    }

    #[test]
    fn test_derived_output_path() {
        assert_eq!(derived_output_path(Path::new("data/ecoli.gff3")), PathBuf::from("data/ecoli.png"));
        assert_eq!(derived_output_path(Path::new("genes")), PathBuf::from("genes.png"));
    }
}
