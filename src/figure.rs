//! A small figure/axes model rasterized into an RGB buffer.
//!
//! Artists are recorded in data coordinates and only mapped to pixels when
//! the figure is rasterized, so limits may be set after drawing.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use log::debug;
use thiserror::Error;

use crate::color::{Rgb, BLACK, WHITE};
use crate::font;

/// Points per inch
const POINTS_PER_INCH: f64 = 72.0;

/// Errors that can occur while rasterizing or saving a figure.
#[derive(Error, Debug)]
pub enum FigureError {
    #[error("Failed to write image: {0}")]
    Io(#[from] std::io::Error),

    #[error("PNG encoding failed: {0}")]
    Encoding(#[from] png::EncodingError),

    #[error("axis limits [{0}, {1}] have zero span")]
    DegenerateLimits(f64, f64),

    #[error("figure of {0}x{1} pixels is empty")]
    EmptyImage(u32, u32),

    #[error("figure of {0}x{1} pixels is too large to allocate")]
    TooLarge(u32, u32),
}

/// RGB pixel buffer.
pub struct Canvas {
    image: image::RgbImage,
}

impl Canvas {
    /// A canvas filled with `background`. Fails when the RGB buffer size does
    /// not fit in memory addressing.
    pub fn new(width: u32, height: u32, background: Rgb) -> Result<Self, FigureError> {
        if width == 0 || height == 0 {
            return Err(FigureError::EmptyImage(width, height));
        }
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(3))
            .filter(|&n| n <= isize::MAX as usize)
            .ok_or(FigureError::TooLarge(width, height))?;
        let image = image::RgbImage::from_pixel(width, height, image::Rgb([background.0, background.1, background.2]));
        Ok(Canvas { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width() as i64 && y < self.height() as i64
    }

    pub fn set_pixel(&mut self, x: i64, y: i64, color: Rgb) {
        if self.in_bounds(x, y) {
            self.image.put_pixel(x as u32, y as u32, image::Rgb([color.0, color.1, color.2]));
        }
    }

    pub fn pixel(&self, x: i64, y: i64) -> Option<Rgb> {
        if !self.in_bounds(x, y) {
            return None;
        }
        let image::Rgb([r, g, b]) = *self.image.get_pixel(x as u32, y as u32);
        Some(Rgb(r, g, b))
    }

    fn full_box(&self) -> PixelBox {
        PixelBox { x0: 0, y0: 0, x1: self.width() as i64, y1: self.height() as i64 }
    }

    /// Even-odd scanline fill sampled at pixel centres.
    fn fill_polygon(&mut self, points: &[(f64, f64)], color: Rgb, clip: PixelBox) {
        if points.len() < 3 {
            return;
        }
        let clip = clip.intersect(self.full_box());
        let min_y = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let max_y = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
        let row_start = ((min_y - 0.5).ceil() as i64).max(clip.y0);
        let row_end = ((max_y - 0.5).ceil() as i64).min(clip.y1);

        let mut crossings: Vec<f64> = Vec::new();
        for y in row_start..row_end {
            let yc = y as f64 + 0.5;
            crossings.clear();
            for (i, &(x0, y0)) in points.iter().enumerate() {
                let (x1, y1) = points[(i + 1) % points.len()];
                if (y0 <= yc && yc < y1) || (y1 <= yc && yc < y0) {
                    crossings.push(x0 + (yc - y0) * (x1 - x0) / (y1 - y0));
                }
            }
            crossings.sort_by(|a, b| a.total_cmp(b));
            for pair in crossings.chunks_exact(2) {
                let x_start = ((pair[0] - 0.5).ceil() as i64).max(clip.x0);
                let x_end = ((pair[1] - 0.5).ceil() as i64).min(clip.x1);
                for x in x_start..x_end {
                    self.set_pixel(x, y, color);
                }
            }
        }
    }

    /// Stroke a polyline with projecting caps, at least one pixel wide.
    fn stroke(&mut self, points: &[(f64, f64)], width: f64, color: Rgb, clip: PixelBox) {
        let half = width.max(1.0) / 2.0;
        for segment in points.windows(2) {
            let (ax, ay) = segment[0];
            let (bx, by) = segment[1];
            let len = ((bx - ax).powi(2) + (by - ay).powi(2)).sqrt();
            if len == 0.0 {
                continue;
            }
            let (ux, uy) = ((bx - ax) / len * half, (by - ay) / len * half);
            let (nx, ny) = (-uy, ux);
            let quad = [
                (ax - ux + nx, ay - uy + ny),
                (bx + ux + nx, by + uy + ny),
                (bx + ux - nx, by + uy - ny),
                (ax - ux - nx, ay - uy - ny),
            ];
            self.fill_polygon(&quad, color, clip);
        }
    }

    pub fn as_image(&self) -> &image::RgbImage {
        &self.image
    }
}

/// Half-open pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PixelBox {
    x0: i64,
    y0: i64,
    x1: i64,
    y1: i64,
}

impl PixelBox {
    fn intersect(self, other: PixelBox) -> PixelBox {
        PixelBox {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Polygon { points: Vec<(f64, f64)>, fill: Rgb, edge: Option<(Rgb, f64)> },
    Line { points: Vec<(f64, f64)>, color: Rgb, linewidth: f64 },
    Text { x: f64, y: f64, text: String, size: f64, color: Rgb },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Artist {
    pub zorder: f64,
    pub shape: Shape,
}

/// Drawing area in data coordinates. Line widths and text sizes are in points.
#[derive(Debug, Default)]
pub struct Axes {
    artists: Vec<Artist>,
    xlim: Option<(f64, f64)>,
    ylim: Option<(f64, f64)>,
    axis_hidden: bool,
}

impl Axes {
    pub fn fill(&mut self, points: Vec<(f64, f64)>, fill: Rgb, edge: Option<(Rgb, f64)>, zorder: f64) {
        self.artists.push(Artist { zorder, shape: Shape::Polygon { points, fill, edge } });
    }

    pub fn plot(&mut self, xs: &[f64], ys: &[f64], color: Rgb, linewidth: f64, zorder: f64) {
        let points = xs.iter().copied().zip(ys.iter().copied()).collect();
        self.artists.push(Artist { zorder, shape: Shape::Line { points, color, linewidth } });
    }

    pub fn text(&mut self, x: f64, y: f64, text: &str, size: f64, color: Rgb, zorder: f64) {
        self.artists.push(Artist {
            zorder,
            shape: Shape::Text { x, y, text: text.to_string(), size, color },
        });
    }

    pub fn set_xlim(&mut self, left: f64, right: f64) {
        self.xlim = Some((left, right));
    }

    pub fn set_ylim(&mut self, bottom: f64, top: f64) {
        self.ylim = Some((bottom, top));
    }

    pub fn axis_off(&mut self) {
        self.axis_hidden = true;
    }

    pub fn axis_visible(&self) -> bool {
        !self.axis_hidden
    }

    pub fn artists(&self) -> &[Artist] {
        &self.artists
    }

    pub fn xlim(&self) -> (f64, f64) {
        self.xlim.unwrap_or_else(|| self.data_bounds(|p| p.0))
    }

    pub fn ylim(&self) -> (f64, f64) {
        self.ylim.unwrap_or_else(|| self.data_bounds(|p| p.1))
    }

    /// Autoscaled limits along one axis; (0, 1) when nothing is drawn.
    fn data_bounds(&self, coord: impl Fn(&(f64, f64)) -> f64) -> (f64, f64) {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for artist in &self.artists {
            let anchor;
            let points: &[(f64, f64)] = match &artist.shape {
                Shape::Polygon { points, .. } | Shape::Line { points, .. } => points,
                Shape::Text { x, y, .. } => {
                    anchor = [(*x, *y)];
                    &anchor
                }
            };
            for p in points {
                lo = lo.min(coord(p));
                hi = hi.max(coord(p));
            }
        }
        if lo.is_finite() && hi > lo {
            (lo, hi)
        } else if lo.is_finite() {
            (lo - 0.5, lo + 0.5)
        } else {
            (0.0, 1.0)
        }
    }
}

/// Axes box as figure fractions, measured from the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Default for Margins {
    fn default() -> Self {
        Margins { left: 0.125, right: 0.9, top: 0.88, bottom: 0.11 }
    }
}

/// A figure of fixed physical size holding a single axes.
#[derive(Debug)]
pub struct Figure {
    width_in: f64,
    height_in: f64,
    margins: Margins,
    axes: Axes,
}

impl Figure {
    pub fn new(width_in: f64, height_in: f64) -> Self {
        Figure { width_in, height_in, margins: Margins::default(), axes: Axes::default() }
    }

    pub fn axes(&self) -> &Axes {
        &self.axes
    }

    pub fn axes_mut(&mut self) -> &mut Axes {
        &mut self.axes
    }

    pub fn subplots_adjust(&mut self, margins: Margins) {
        self.margins = margins;
    }

    pub fn pixel_size(&self, dpi: f64) -> (u32, u32) {
        (
            (self.width_in * dpi).round().max(0.0) as u32,
            (self.height_in * dpi).round().max(0.0) as u32,
        )
    }

    pub fn rasterize(&self, dpi: f64) -> Result<Canvas, FigureError> {
        let (width, height) = self.pixel_size(dpi);
        if width == 0 || height == 0 {
            return Err(FigureError::EmptyImage(width, height));
        }
        let (x0, x1) = self.axes.xlim();
        let (y0, y1) = self.axes.ylim();
        if x0 == x1 {
            return Err(FigureError::DegenerateLimits(x0, x1));
        }
        if y0 == y1 {
            return Err(FigureError::DegenerateLimits(y0, y1));
        }

        let (w, h) = (width as f64, height as f64);
        let left = self.margins.left * w;
        let right = self.margins.right * w;
        let top = (1.0 - self.margins.top) * h;
        let bottom = (1.0 - self.margins.bottom) * h;
        let to_pixel = |(x, y): (f64, f64)| {
            (
                left + (x - x0) / (x1 - x0) * (right - left),
                bottom - (y - y0) / (y1 - y0) * (bottom - top),
            )
        };
        let points_to_pixels = |pt: f64| pt * dpi / POINTS_PER_INCH;
        let clip = PixelBox {
            x0: left.round() as i64,
            y0: top.round() as i64,
            x1: right.round() as i64,
            y1: bottom.round() as i64,
        };

        debug!("Rasterizing {}x{} px, x [{}, {}], y [{}, {}]", width, height, x0, x1, y0, y1);

        let mut canvas = Canvas::new(width, height, WHITE)?;
        let mut ordered: Vec<&Artist> = self.axes.artists.iter().collect();
        ordered.sort_by(|a, b| a.zorder.total_cmp(&b.zorder));

        for artist in ordered {
            match &artist.shape {
                Shape::Polygon { points, fill, edge } => {
                    let px: Vec<(f64, f64)> = points.iter().copied().map(to_pixel).collect();
                    canvas.fill_polygon(&px, *fill, clip);
                    if let (Some((edge_color, linewidth)), Some(&first)) = (edge, px.first()) {
                        let mut ring = px.clone();
                        ring.push(first);
                        canvas.stroke(&ring, points_to_pixels(*linewidth), *edge_color, clip);
                    }
                }
                Shape::Line { points, color, linewidth } => {
                    let px: Vec<(f64, f64)> = points.iter().copied().map(to_pixel).collect();
                    canvas.stroke(&px, points_to_pixels(*linewidth), *color, clip);
                }
                Shape::Text { x, y, text, size, color } => {
                    let (cx, cy) = to_pixel((*x, *y));
                    let char_size = font::char_size_for(points_to_pixels(*size));
                    font::draw_text(&mut canvas, cx, cy, text, char_size, *color);
                }
            }
        }

        if self.axes.axis_visible() {
            let frame = [(left, top), (right, top), (right, bottom), (left, bottom), (left, top)];
            canvas.stroke(&frame, points_to_pixels(0.8), BLACK, canvas.full_box());
        }

        Ok(canvas)
    }

    /// Rasterize at `dpi` and write a PNG whose pHYs chunk records the resolution.
    pub fn save_png<P: AsRef<Path>>(&self, path: P, dpi: f64) -> Result<(), FigureError> {
        let canvas = self.rasterize(dpi)?;
        let (width, height) = (canvas.width(), canvas.height());

        let file = File::create(path.as_ref())?;
        let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let pixels_per_metre = (dpi / 0.0254).round() as u32;
        encoder.set_pixel_dims(Some(png::PixelDimensions {
            xppu: pixels_per_metre,
            yppu: pixels_per_metre,
            unit: png::Unit::Meter,
        }));

        let mut writer = encoder.write_header()?;
        writer.write_image_data(canvas.as_image().as_raw())?;
        writer.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const RED: Rgb = Rgb(255, 0, 0);

    fn full_margins() -> Margins {
        Margins { left: 0.0, right: 1.0, top: 1.0, bottom: 0.0 }
    }

    #[test]
    fn test_pixel_size_follows_dpi() {
        let fig = Figure::new(5.0, 0.6);
        assert_eq!(fig.pixel_size(300.0), (1500, 180));
        assert_eq!(fig.pixel_size(100.0), (500, 60));
    }

    #[test]
    fn test_polygon_fill_and_orientation() {
        // 1 inch at 10 dpi; the filled square covers the lower-left quarter
        let mut fig = Figure::new(1.0, 1.0);
        fig.subplots_adjust(full_margins());
        let axes = fig.axes_mut();
        axes.set_xlim(0.0, 10.0);
        axes.set_ylim(0.0, 10.0);
        axes.fill(vec![(0.0, 0.0), (5.0, 0.0), (5.0, 5.0), (0.0, 5.0)], RED, None, 1.0);
        axes.axis_off();

        let canvas = fig.rasterize(10.0).unwrap();
        assert_eq!(canvas.pixel(0, 9), Some(RED));
        assert_eq!(canvas.pixel(4, 5), Some(RED));
        assert_eq!(canvas.pixel(5, 5), Some(WHITE));
        assert_eq!(canvas.pixel(0, 4), Some(WHITE));
    }

    #[test]
    fn test_zorder_and_clipping() {
        let mut fig = Figure::new(1.0, 1.0);
        fig.subplots_adjust(Margins { left: 0.2, right: 0.8, top: 0.8, bottom: 0.2 });
        let axes = fig.axes_mut();
        axes.set_xlim(0.0, 1.0);
        axes.set_ylim(0.0, 1.0);
        // drawn first but on top
        axes.fill(vec![(-1.0, -1.0), (2.0, -1.0), (2.0, 2.0), (-1.0, 2.0)], BLACK, None, 5.0);
        axes.fill(vec![(-1.0, -1.0), (2.0, -1.0), (2.0, 2.0), (-1.0, 2.0)], RED, None, 1.0);
        axes.axis_off();

        let canvas = fig.rasterize(10.0).unwrap();
        assert_eq!(canvas.pixel(5, 5), Some(BLACK));
        assert_eq!(canvas.pixel(0, 0), Some(WHITE));
        assert_eq!(canvas.pixel(9, 9), Some(WHITE));
    }

    #[test]
    fn test_line_is_at_least_one_pixel() {
        let mut fig = Figure::new(2.0, 1.0);
        fig.subplots_adjust(full_margins());
        let axes = fig.axes_mut();
        axes.set_xlim(0.0, 20.0);
        axes.set_ylim(-5.0, 5.0);
        axes.plot(&[0.0, 20.0], &[0.0, 0.0], BLACK, 0.1, 1.0);
        axes.axis_off();

        let canvas = fig.rasterize(10.0).unwrap();
        let row: Vec<Option<Rgb>> = (0..20).map(|x| canvas.pixel(x, 4)).collect();
        assert!(row.iter().all(|p| *p == Some(BLACK)));
    }

    #[test]
    fn test_frame_only_when_axis_visible() {
        let mut fig = Figure::new(1.0, 1.0);
        fig.subplots_adjust(Margins { left: 0.2, right: 0.8, top: 0.8, bottom: 0.2 });
        fig.axes_mut().set_xlim(0.0, 1.0);
        fig.axes_mut().set_ylim(0.0, 1.0);
        // the left edge lies on the boundary x = 10; a 1 px stroke covers the
        // pixel whose centre is 9.5
        let framed = fig.rasterize(50.0).unwrap();
        assert_eq!(framed.pixel(9, 25), Some(BLACK));
        assert_eq!(framed.pixel(10, 25), Some(WHITE));
        assert_eq!(framed.pixel(25, 25), Some(WHITE));

        fig.axes_mut().axis_off();
        let bare = fig.rasterize(50.0).unwrap();
        assert_eq!(bare.pixel(9, 25), Some(WHITE));
    }

    #[test]
    fn test_autoscale_and_degenerate_limits() {
        let mut fig = Figure::new(1.0, 1.0);
        fig.axes_mut().plot(&[2.0, 8.0], &[1.0, 3.0], BLACK, 1.0, 1.0);
        assert_eq!(fig.axes().xlim(), (2.0, 8.0));
        assert_eq!(fig.axes().ylim(), (1.0, 3.0));

        fig.axes_mut().set_xlim(4.0, 4.0);
        assert!(matches!(fig.rasterize(10.0), Err(FigureError::DegenerateLimits(..))));
    }

    #[test]
    fn test_save_png_records_dpi() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fig.png");
        let mut fig = Figure::new(1.0, 0.5);
        fig.axes_mut().plot(&[0.0, 1.0], &[0.0, 1.0], RED, 1.0, 1.0);
        fig.save_png(&path, 300.0).unwrap();

        let img = image::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (300, 150));

        let decoder = png::Decoder::new(File::open(&path).unwrap());
        let reader = decoder.read_info().unwrap();
        let dims = reader.info().pixel_dims.unwrap();
        assert_eq!(dims.xppu, 11811);
        assert_eq!(dims.unit, png::Unit::Meter);
    }

    #[test]
    fn test_oversized_canvas_rejected() {
        assert!(matches!(
            Canvas::new(u32::MAX, u32::MAX, WHITE),
            Err(FigureError::TooLarge(u32::MAX, u32::MAX))
        ));
        assert!(matches!(Canvas::new(0, 10, WHITE), Err(FigureError::EmptyImage(0, 10))));
    }

    #[test]
    fn test_empty_image_rejected() {
        let fig = Figure::new(0.0, 1.0);
        assert!(matches!(fig.rasterize(300.0), Err(FigureError::EmptyImage(0, 300))));
    }
}
