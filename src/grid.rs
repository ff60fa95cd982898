use crate::error::{FieldError, Result};
use crate::source::WireSource;
use ndarray::Array2;

/// Rectangular sample lattice, `linspace`-style along both axes.
///
/// Arrays built on this grid are indexed `[j, i]`: row `j` walks along y,
/// column `i` along x.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    pub nx: usize, // Number of samples along x
    pub ny: usize, // Number of samples along y
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Grid {
    pub fn new(nx: usize, ny: usize, x_range: (f64, f64), y_range: (f64, f64)) -> Result<Self> {
        if nx < 2 || ny < 2 {
            return Err(FieldError::InvalidGrid(format!(
                "at least 2x2 samples required, got {}x{}",
                nx, ny
            )));
        }
        let (x_min, x_max) = x_range;
        let (y_min, y_max) = y_range;
        if ![x_min, x_max, y_min, y_max].iter().all(|v| v.is_finite()) {
            return Err(FieldError::InvalidGrid(format!(
                "bounds must be finite, got x=[{}, {}] y=[{}, {}]",
                x_min, x_max, y_min, y_max
            )));
        }
        if !(x_max - x_min).is_finite() || !(y_max - y_min).is_finite() {
            return Err(FieldError::InvalidGrid(format!(
                "extent overflows, x=[{}, {}] y=[{}, {}]",
                x_min, x_max, y_min, y_max
            )));
        }
        if x_min >= x_max || y_min >= y_max {
            return Err(FieldError::InvalidGrid(format!(
                "empty extent x=[{}, {}] y=[{}, {}]",
                x_min, x_max, y_min, y_max
            )));
        }
        Ok(Grid {
            nx,
            ny,
            x_min,
            x_max,
            y_min,
            y_max,
        })
    }

    /// Square grid enclosing every source with `padding` to spare on each side.
    ///
    /// The extent is symmetric about the origin: `[-max|x| - padding, max|x| + padding]`
    /// and likewise for y.
    pub fn from_sources(sources: &[WireSource], resolution: usize, padding: f64) -> Result<Self> {
        if sources.is_empty() {
            return Err(FieldError::NoSources);
        }
        // f64::max would silently drop a NaN coordinate
        if let Some(bad) = sources.iter().find(|s| !s.x.is_finite() || !s.y.is_finite()) {
            return Err(FieldError::InvalidGrid(format!(
                "wire position must be finite, got ({}, {})",
                bad.x, bad.y
            )));
        }
        let max_x = sources.iter().map(|s| s.x.abs()).fold(0.0_f64, f64::max);
        let max_y = sources.iter().map(|s| s.y.abs()).fold(0.0_f64, f64::max);

        Self::new(
            resolution,
            resolution,
            (-max_x - padding, max_x + padding),
            (-max_y - padding, max_y + padding),
        )
    }

    pub fn dx(&self) -> f64 {
        (self.x_max - self.x_min) / (self.nx - 1) as f64
    }

    pub fn dy(&self) -> f64 {
        (self.y_max - self.y_min) / (self.ny - 1) as f64
    }

    pub fn x_coord(&self, i: usize) -> f64 {
        // Pin the last sample to the bound, like linspace does
        if i + 1 == self.nx {
            self.x_max
        } else {
            self.x_min + self.dx() * i as f64
        }
    }

    pub fn y_coord(&self, j: usize) -> f64 {
        if j + 1 == self.ny {
            self.y_max
        } else {
            self.y_min + self.dy() * j as f64
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x_min && x <= self.x_max && y >= self.y_min && y <= self.y_max
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Coordinate matrices `(X, Y)` of shape `(ny, nx)`.
    pub fn meshgrid(&self) -> (Array2<f64>, Array2<f64>) {
        let xs = Array2::from_shape_fn((self.ny, self.nx), |(_, i)| self.x_coord(i));
        let ys = Array2::from_shape_fn((self.ny, self.nx), |(j, _)| self.y_coord(j));
        (xs, ys)
    }
}
