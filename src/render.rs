//! Trace-mode part renderers: every feature is drawn at its own genomic
//! coordinates on the x axis, glyph heights are in scaled data units.

use log::debug;
use thiserror::Error;

use crate::color::{default_feature_color, ColorError, Rgb, BLACK};
use crate::figure::Axes;
use crate::gff::{Feature, PartType};

/// Z-order of part glyphs (labels sit just above)
pub const PART_ZORDER: f64 = 100.0;

/// Label font size in points when the feature does not set one
pub const DEFAULT_LABEL_SIZE: f64 = 7.0;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("nothing to render: the design is empty")]
    EmptyDesign,

    #[error("feature '{name}': {source}")]
    Color {
        name: String,
        #[source]
        source: ColorError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiagramRenderer {
    pub scale: f64,
    pub linewidth: f64,
}

/// Horizontal span of a feature in drawing order, plus its direction
struct Span {
    start: f64,
    end: f64,
    forward: bool,
}

impl Span {
    fn of(feature: &Feature) -> Span {
        Span { start: feature.start as f64, end: feature.end as f64, forward: feature.forward }
    }

    fn len(&self) -> f64 {
        (self.end - self.start).abs()
    }

    fn mid(&self) -> f64 {
        (self.start + self.end) / 2.0
    }

    /// (tail, head) in the direction of transcription
    fn oriented(&self) -> (f64, f64) {
        if self.forward {
            (self.start, self.end)
        } else {
            (self.end, self.start)
        }
    }
}

fn resolve_color(feature: &Feature, value: Option<&String>, default: Rgb) -> Result<Rgb, RenderError> {
    match value {
        Some(s) => Rgb::parse(s).map_err(|source| RenderError::Color { name: feature.name.clone(), source }),
        None => Ok(default),
    }
}

impl DiagramRenderer {
    pub fn new(scale: f64, linewidth: f64) -> Self {
        DiagramRenderer { scale, linewidth }
    }

    /// Draw the whole design and return its extent `(first start, last end)`.
    pub fn render(&self, axes: &mut Axes, design: &[Feature]) -> Result<(f64, f64), RenderError> {
        if design.is_empty() {
            return Err(RenderError::EmptyDesign);
        }

        let mut start = f64::INFINITY;
        let mut end = f64::NEG_INFINITY;
        for feature in design {
            let fill = resolve_color(feature, feature.opts.color.as_ref(), default_feature_color(&feature.name))?;
            match feature.part_type {
                PartType::Cds => self.render_cds(axes, feature, fill)?,
                PartType::Promoter => self.render_promoter(axes, feature, fill),
                PartType::Terminator => self.render_terminator(axes, feature, fill),
                PartType::Rbs => self.render_rbs(axes, feature, fill)?,
            }
            self.write_label(axes, feature)?;

            let span = Span::of(feature);
            start = start.min(span.start.min(span.end));
            end = end.max(span.start.max(span.end));
        }

        debug!("Rendered {} parts over [{}, {}]", design.len(), start, end);
        Ok((start, end))
    }

    fn linewidth_of(&self, feature: &Feature) -> f64 {
        feature.opts.linewidth.unwrap_or(self.linewidth)
    }

    fn edge_of(&self, feature: &Feature) -> Result<(Rgb, f64), RenderError> {
        let edge = resolve_color(feature, feature.opts.edge_color.as_ref(), BLACK)?;
        Ok((edge, self.linewidth_of(feature)))
    }

    fn arrowhead_of(&self, feature: &Feature, span: &Span) -> f64 {
        feature
            .opts
            .arrowhead_length
            .unwrap_or(span.len() / 4.0)
            .clamp(0.0, span.len())
    }

    fn render_cds(&self, axes: &mut Axes, feature: &Feature, fill: Rgb) -> Result<(), RenderError> {
        let span = Span::of(feature);
        let h = feature.opts.y_extent.unwrap_or(0.75 * self.scale);
        let head = self.arrowhead_of(feature, &span);
        let (tail, tip) = span.oriented();
        let neck = if tip >= tail { tip - head } else { tip + head };

        let points = vec![(tail, h), (tail, -h), (neck, -h), (tip, 0.0), (neck, h)];
        axes.fill(points, fill, Some(self.edge_of(feature)?), PART_ZORDER);
        Ok(())
    }

    fn render_promoter(&self, axes: &mut Axes, feature: &Feature, color: Rgb) {
        let span = Span::of(feature);
        let h = feature.opts.y_extent.unwrap_or(1.25 * self.scale);
        let head = self.arrowhead_of(feature, &span);
        let (tss, tip) = span.oriented();
        let neck = if tip >= tss { tip - head } else { tip + head };
        let barb = h * 0.25;

        axes.plot(&[tss, tss, neck], &[0.0, h, h], color, self.linewidth_of(feature), PART_ZORDER);
        axes.fill(vec![(neck, h + barb), (tip, h), (neck, h - barb)], color, None, PART_ZORDER);
    }

    fn render_terminator(&self, axes: &mut Axes, feature: &Feature, color: Rgb) {
        let span = Span::of(feature);
        let h = feature.opts.y_extent.unwrap_or(self.scale);
        let linewidth = self.linewidth_of(feature);

        axes.plot(&[span.mid(), span.mid()], &[0.0, h], color, linewidth, PART_ZORDER);
        axes.plot(&[span.start, span.end], &[h, h], color, linewidth, PART_ZORDER);
    }

    fn render_rbs(&self, axes: &mut Axes, feature: &Feature, fill: Rgb) -> Result<(), RenderError> {
        const SEGMENTS: usize = 16;
        let span = Span::of(feature);
        let h = feature.opts.y_extent.unwrap_or(0.5 * self.scale);
        let rx = span.len() / 2.0;

        let points = (0..=SEGMENTS)
            .map(|i| {
                let t = std::f64::consts::PI * i as f64 / SEGMENTS as f64;
                (span.mid() + rx * t.cos(), h * t.sin())
            })
            .collect();
        axes.fill(points, fill, Some(self.edge_of(feature)?), PART_ZORDER);
        Ok(())
    }

    fn write_label(&self, axes: &mut Axes, feature: &Feature) -> Result<(), RenderError> {
        let Some(label) = &feature.opts.label else {
            return Ok(());
        };
        let opts = &feature.opts;
        let color = resolve_color(feature, opts.label_color.as_ref(), BLACK)?;
        axes.text(
            Span::of(feature).mid() + opts.label_x_offset.unwrap_or(0.0),
            opts.label_y_offset.unwrap_or(0.0),
            label,
            opts.label_size.unwrap_or(DEFAULT_LABEL_SIZE),
            color,
            PART_ZORDER + 1.0,
        );
        Ok(())
    }
}
