use crate::config::PlotConfig;
use crate::error::{FieldError, Result};
use crate::grid::Grid;
use crate::streamlines::Streamline;
use plotters::prelude::*;
use std::ops::Range;

const MARGIN: u32 = 10;
const X_LABEL_AREA: u32 = 40;
const Y_LABEL_AREA: u32 = 50;
const CAPTION_FONT: u32 = 18;
/// Arrow head length in pixels per unit of `arrow_size`.
const ARROW_HEAD_PX: f64 = 5.0;
const LINE_COLOR: RGBColor = RGBColor(31, 119, 180);
const METERS_PER_INCH: f64 = 0.0254;

pub struct FieldLinePlotter {
    style: PlotConfig,
    // Only consulted when colouring by strength
    gradient: Box<dyn colorgrad::Gradient>,
}

impl FieldLinePlotter {
    pub fn new(style: &PlotConfig) -> Self {
        let gradient = Box::new(colorgrad::preset::viridis());

        Self {
            style: style.clone(),
            gradient,
        }
    }

    /// Pixel size of the figure: the upper axis limits read as inches at the
    /// configured dpi, clamped to the configured side limits.
    pub fn figure_size(&self, grid: &Grid) -> (u32, u32) {
        let side = |inches: f64| {
            let px = (inches * f64::from(self.style.dpi)).round();
            let min = f64::from(self.style.min_image_side);
            let max = f64::from(self.style.max_image_side);
            px.clamp(min, max) as u32
        };
        (side(grid.x_max), side(grid.y_max))
    }

    /// Draws the field lines over the grid extent and returns PNG bytes.
    pub fn render_png(&self, grid: &Grid, lines: &[Streamline]) -> Result<Vec<u8>> {
        let (width, height) = self.figure_size(grid);
        let mut buffer = vec![0u8; width as usize * height as usize * 3];

        self.draw(&mut buffer, (width, height), grid, lines)
            .map_err(|e| FieldError::Render(e.to_string()))?;

        self.encode_png(&buffer, (width, height))
            .map_err(|e| FieldError::Encode(e.to_string()))
    }

    /// RGB8 PNG carrying the configured dpi in its pHYs chunk.
    fn encode_png(
        &self,
        pixels: &[u8],
        (width, height): (u32, u32),
    ) -> std::result::Result<Vec<u8>, png::EncodingError> {
        let mut bytes = Vec::new();
        let mut encoder = png::Encoder::new(&mut bytes, width, height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let per_meter = (f64::from(self.style.dpi) / METERS_PER_INCH).round() as u32;
        encoder.set_pixel_dims(Some(png::PixelDimensions {
            xppu: per_meter,
            yppu: per_meter,
            unit: png::Unit::Meter,
        }));

        let mut writer = encoder.write_header()?;
        writer.write_image_data(pixels)?;
        writer.finish()?;

        Ok(bytes)
    }

    fn draw(
        &self,
        buffer: &mut [u8],
        size: (u32, u32),
        grid: &Grid,
        lines: &[Streamline],
    ) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let root = BitMapBackend::with_buffer(buffer, size).into_drawing_area();
        root.fill(&WHITE)?;
        let plot_area = root.titled(&self.style.title, ("sans-serif", CAPTION_FONT))?;

        let (area_w, area_h) = plot_area.dim_in_pixel();
        let inner = (
            area_w.saturating_sub(2 * MARGIN + Y_LABEL_AREA).max(1),
            area_h.saturating_sub(2 * MARGIN + X_LABEL_AREA).max(1),
        );
        let (x_range, y_range, px_per_unit) = equal_aspect(grid, inner);

        let mut chart = ChartBuilder::on(&plot_area)
            .margin(MARGIN)
            .x_label_area_size(X_LABEL_AREA)
            .y_label_area_size(Y_LABEL_AREA)
            .build_cartesian_2d(x_range, y_range)?;

        chart
            .configure_mesh()
            .x_desc(self.style.x_label.as_str())
            .y_desc(self.style.y_label.as_str())
            .draw()?;

        let (low, high) = strength_bounds(lines);
        let head = ARROW_HEAD_PX * self.style.arrow_size / px_per_unit;

        for line in lines {
            let color = if self.style.color_by_strength {
                self.strength_to_color(line.strength, low, high)
            } else {
                LINE_COLOR
            };

            chart.draw_series(LineSeries::new(
                line.points.iter().copied(),
                color.stroke_width(self.style.line_width),
            ))?;

            if head > 0.0 {
                if let Some((tip, direction)) = line.midpoint() {
                    chart.draw_series(std::iter::once(Polygon::new(
                        arrow_head(tip, direction, head),
                        color.filled(),
                    )))?;
                }
            }
        }

        root.present()?;
        Ok(())
    }

    fn strength_to_color(&self, strength: f64, low: f64, high: f64) -> RGBColor {
        let normalized = if high > low && strength > 0.0 {
            (strength.log10() - low) / (high - low)
        } else {
            0.5
        };
        let normalized = normalized.clamp(0.0, 1.0);
        let color_rgba = self.gradient.at(normalized as f32).to_rgba8();
        RGBColor(color_rgba[0], color_rgba[1], color_rgba[2])
    }
}

/// Widens one of the grid ranges so a data unit spans the same number of
/// pixels on both axes of a `(width, height)` plotting area.
fn equal_aspect(grid: &Grid, (width, height): (u32, u32)) -> (Range<f64>, Range<f64>, f64) {
    let scale = (f64::from(width) / grid.width()).min(f64::from(height) / grid.height());
    let half_w = f64::from(width) / scale / 2.0;
    let half_h = f64::from(height) / scale / 2.0;
    let cx = (grid.x_min + grid.x_max) / 2.0;
    let cy = (grid.y_min + grid.y_max) / 2.0;

    (cx - half_w..cx + half_w, cy - half_h..cy + half_h, scale)
}

/// log10 range of the positive line strengths.
fn strength_bounds(lines: &[Streamline]) -> (f64, f64) {
    lines
        .iter()
        .filter(|l| l.strength > 0.0 && l.strength.is_finite())
        .map(|l| l.strength.log10())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        })
}

/// Triangle centred on `center` pointing along the unit vector `direction`.
fn arrow_head(center: (f64, f64), direction: (f64, f64), length: f64) -> Vec<(f64, f64)> {
    let (cx, cy) = center;
    let (dx, dy) = direction;
    let (px, py) = (-dy, dx);
    let half = length / 2.0;
    let wing = length * 0.4;

    vec![
        (cx + dx * half, cy + dy * half),
        (cx - dx * half + px * wing, cy - dy * half + py * wing),
        (cx - dx * half - px * wing, cy - dy * half - py * wing),
    ]
}
