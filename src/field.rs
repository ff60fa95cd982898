use crate::error::{FieldError, Result};
use crate::grid::Grid;
use crate::source::WireSource;
use ndarray::{Array2, Zip};
use std::f64::consts::PI;

/// Vacuum permeability (T·m/A).
pub const MU_0: f64 = 4.0 * PI * 1e-7;

/// Field of a single infinite wire at `(x, y)`, Biot–Savart form.
///
/// Returns `(bx, by)`. At the wire itself the distance is zero and the
/// result is non-finite; that is the physical divergence, not an error.
pub fn wire_field(source: &WireSource, x: f64, y: f64) -> (f64, f64) {
    let rx = x - source.x;
    let ry = y - source.y;
    let r = (rx * rx + ry * ry).sqrt();
    let theta = ry.atan2(rx);
    let scale = MU_0 * source.current / (2.0 * PI);

    (scale * (-theta.sin() / r), scale * (theta.cos() / r))
}

/// Superposed field sampled on a [`Grid`].
#[derive(Clone, Debug)]
pub struct MagneticField {
    pub bx: Array2<f64>,
    pub by: Array2<f64>,
}

impl MagneticField {
    pub fn zeros(grid: &Grid) -> Self {
        MagneticField {
            bx: Array2::zeros((grid.ny, grid.nx)),
            by: Array2::zeros((grid.ny, grid.nx)),
        }
    }

    /// Field of all `sources`, accumulated in submission order.
    pub fn solve(grid: &Grid, sources: &[WireSource]) -> Result<Self> {
        if sources.is_empty() {
            return Err(FieldError::NoSources);
        }
        if let Some(bad) = sources.iter().find(|s| !s.current.is_finite()) {
            return Err(FieldError::InvalidSource(format!(
                "current must be finite, got {}",
                bad.current
            )));
        }
        let mut field = Self::zeros(grid);
        for source in sources {
            field.add_wire(grid, source);
        }
        Ok(field)
    }

    /// Adds one wire's contribution at every sample point.
    pub fn add_wire(&mut self, grid: &Grid, source: &WireSource) {
        Zip::indexed(&mut self.bx)
            .and(&mut self.by)
            .par_for_each(|(j, i), bx, by| {
                let (dbx, dby) = wire_field(source, grid.x_coord(i), grid.y_coord(j));
                *bx += dbx;
                *by += dby;
            });
    }

    /// Field vector at column `i`, row `j`.
    pub fn at(&self, i: usize, j: usize) -> (f64, f64) {
        (self.bx[[j, i]], self.by[[j, i]])
    }

    pub fn magnitude(&self) -> Array2<f64> {
        Zip::from(&self.bx)
            .and(&self.by)
            .map_collect(|bx, by| bx.hypot(*by))
    }

    /// Number of samples that are NaN or infinite in either component.
    pub fn non_finite_count(&self) -> usize {
        Zip::from(&self.bx)
            .and(&self.by)
            .fold(0, |n, bx, by| n + usize::from(!(bx.is_finite() && by.is_finite())))
    }
}
