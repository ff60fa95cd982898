//! Field-line tracing over a sampled vector field.
//!
//! Lines are seeded on a coarse occupancy mask whose resolution scales with
//! the requested density. Each seed is integrated backwards and forwards
//! along the normalised field direction; a line stops when it leaves the
//! grid, runs into a mask cell already claimed by another line, hits a
//! non-finite or vanishing sample, or grows too long.

use crate::field::MagneticField;
use crate::grid::Grid;
use ndarray::Array2;

/// Mask cells per axis at density 1.
const MASK_CELLS_PER_DENSITY: f64 = 30.0;
/// Integration step, in grid cells.
const STEP: f64 = 0.25;
/// Longest line, in multiples of the domain size.
const MAX_LENGTH: f64 = 4.0;
/// Shorter lines are discarded, in multiples of the domain size.
const MIN_LENGTH: f64 = 0.1;
/// Interpolated magnitude below this fraction of the strongest cell corner
/// means the cell holds a null or a wire.
const NULL_RATIO: f64 = 1e-3;

/// One traced field line in data coordinates, oriented along the field.
#[derive(Clone, Debug)]
pub struct Streamline {
    pub points: Vec<(f64, f64)>,
    /// Mean field magnitude over the finite samples along the line.
    pub strength: f64,
}

impl Streamline {
    /// Point halfway along the line and the unit direction of travel there.
    pub fn midpoint(&self) -> Option<((f64, f64), (f64, f64))> {
        if self.points.len() < 2 {
            return None;
        }
        let k = (self.points.len() - 1) / 2;
        let (x0, y0) = self.points[k];
        let (x1, y1) = self.points[k + 1];
        let len = (x1 - x0).hypot(y1 - y0);
        if len == 0.0 || !len.is_finite() {
            return None;
        }
        Some(((x0, y0), ((x1 - x0) / len, (y1 - y0) / len)))
    }
}

/// Traces field lines of `field` over `grid`.
pub fn trace(grid: &Grid, field: &MagneticField, density: f64) -> Vec<Streamline> {
    StreamlineTracer::new(grid, field, density).run()
}

struct Mask {
    nx: usize,
    ny: usize,
    cells: Vec<bool>,
    trail: Vec<usize>,
    current: Option<usize>,
}

impl Mask {
    fn new(nx: usize, ny: usize) -> Self {
        Mask {
            nx,
            ny,
            cells: vec![false; nx * ny],
            trail: Vec::new(),
            current: None,
        }
    }

    fn is_free(&self, mi: usize, mj: usize) -> bool {
        !self.cells[mj * self.nx + mi]
    }

    fn start(&mut self, mi: usize, mj: usize) {
        self.trail.clear();
        self.current = None;
        self.enter(mi, mj);
    }

    /// Marks the cell as part of the current line. Returns `false` when the
    /// cell already belongs to some other line.
    fn enter(&mut self, mi: usize, mj: usize) -> bool {
        let idx = mj * self.nx + mi;
        if self.current == Some(idx) {
            return true;
        }
        if self.cells[idx] {
            return false;
        }
        self.cells[idx] = true;
        self.trail.push(idx);
        self.current = Some(idx);
        true
    }

    fn rewind_to(&mut self, mi: usize, mj: usize) {
        self.current = Some(mj * self.nx + mi);
    }

    fn undo(&mut self) {
        for idx in self.trail.drain(..) {
            self.cells[idx] = false;
        }
        self.current = None;
    }
}

struct StreamlineTracer<'a> {
    grid: &'a Grid,
    field: &'a MagneticField,
    mask: Mask,
    max_length: f64,
    min_length: f64,
}

/// Half of a line integrated from the seed in one direction.
struct Half {
    points: Vec<(f64, f64)>,
    magnitudes: Vec<f64>,
    length: f64,
}

impl<'a> StreamlineTracer<'a> {
    fn new(grid: &'a Grid, field: &'a MagneticField, density: f64) -> Self {
        let cells = ((MASK_CELLS_PER_DENSITY * density).round() as usize).max(2);
        let extent = (grid.nx.max(grid.ny) - 1) as f64;
        StreamlineTracer {
            grid,
            field,
            mask: Mask::new(cells, cells),
            max_length: MAX_LENGTH * extent,
            min_length: MIN_LENGTH * extent,
        }
    }

    fn run(mut self) -> Vec<Streamline> {
        let mut lines = Vec::new();
        for (mi, mj) in spiral(self.mask.nx, self.mask.ny) {
            if !self.mask.is_free(mi, mj) {
                continue;
            }
            if let Some(line) = self.trace_from(mi, mj) {
                lines.push(line);
            }
        }
        lines
    }

    fn trace_from(&mut self, mi: usize, mj: usize) -> Option<Streamline> {
        let seed = self.mask_to_grid(mi, mj);
        self.mask.start(mi, mj);

        let backward = self.integrate(seed, -1.0);
        self.mask.rewind_to(mi, mj);
        let forward = self.integrate(seed, 1.0);

        if backward.length + forward.length < self.min_length {
            self.mask.undo();
            return None;
        }

        // Backward half reversed, then the forward half without the shared seed
        let mut points: Vec<(f64, f64)> = backward.points.into_iter().rev().collect();
        points.extend(forward.points.into_iter().skip(1));
        let points = points
            .into_iter()
            .map(|(gx, gy)| self.grid_to_data(gx, gy))
            .collect();

        let magnitudes: Vec<f64> = backward
            .magnitudes
            .into_iter()
            .chain(forward.magnitudes)
            .filter(|m| m.is_finite())
            .collect();
        let strength = if magnitudes.is_empty() {
            0.0
        } else {
            magnitudes.iter().sum::<f64>() / magnitudes.len() as f64
        };

        Some(Streamline { points, strength })
    }

    fn integrate(&mut self, seed: (f64, f64), sign: f64) -> Half {
        let mut half = Half {
            points: vec![seed],
            magnitudes: Vec::new(),
            length: 0.0,
        };
        let (mut gx, mut gy) = seed;

        while half.length < self.max_length {
            let Some((k1x, k1y, magnitude)) = self.direction(gx, gy) else {
                break;
            };
            half.magnitudes.push(magnitude);

            let (mx, my) = (gx + 0.5 * STEP * sign * k1x, gy + 0.5 * STEP * sign * k1y);
            if !self.inside(mx, my) {
                break;
            }
            let Some((k2x, k2y, _)) = self.direction(mx, my) else {
                break;
            };

            let (nx, ny) = (gx + STEP * sign * k2x, gy + STEP * sign * k2y);
            if !self.inside(nx, ny) {
                break;
            }
            let (mi, mj) = self.grid_to_mask(nx, ny);
            if !self.mask.enter(mi, mj) {
                break;
            }

            half.length += STEP;
            half.points.push((nx, ny));
            gx = nx;
            gy = ny;
        }

        half
    }

    /// Unit direction of travel in grid-index space plus the field magnitude,
    /// or `None` where the field is non-finite, zero, or cancels out inside
    /// the cell.
    fn direction(&self, gx: f64, gy: f64) -> Option<(f64, f64, f64)> {
        let (i0, j0) = self.cell(gx, gy);
        let (bx, by) = self.interpolate(gx, gy);
        let u = bx / self.grid.dx();
        let v = by / self.grid.dy();
        let speed = u.hypot(v);
        if !speed.is_finite() || speed == 0.0 {
            return None;
        }

        let magnitude = bx.hypot(by);
        let corner_max = [(i0, j0), (i0 + 1, j0), (i0, j0 + 1), (i0 + 1, j0 + 1)]
            .iter()
            .map(|&(i, j)| {
                let (cx, cy) = self.field.at(i, j);
                cx.hypot(cy)
            })
            .fold(0.0_f64, f64::max);
        if magnitude < NULL_RATIO * corner_max {
            return None;
        }

        Some((u / speed, v / speed, magnitude))
    }

    /// Lower-left sample of the cell holding fractional indices `(gx, gy)`.
    fn cell(&self, gx: f64, gy: f64) -> (usize, usize) {
        (
            (gx.floor() as usize).min(self.grid.nx - 2),
            (gy.floor() as usize).min(self.grid.ny - 2),
        )
    }

    /// Bilinear interpolation of the field at fractional grid indices.
    fn interpolate(&self, gx: f64, gy: f64) -> (f64, f64) {
        let (i0, j0) = self.cell(gx, gy);
        let fx = gx - i0 as f64;
        let fy = gy - j0 as f64;

        let lerp = |a: &Array2<f64>| {
            let bottom = a[[j0, i0]] * (1.0 - fx) + a[[j0, i0 + 1]] * fx;
            let top = a[[j0 + 1, i0]] * (1.0 - fx) + a[[j0 + 1, i0 + 1]] * fx;
            bottom * (1.0 - fy) + top * fy
        };
        (lerp(&self.field.bx), lerp(&self.field.by))
    }

    fn inside(&self, gx: f64, gy: f64) -> bool {
        gx >= 0.0 && gy >= 0.0 && gx <= (self.grid.nx - 1) as f64 && gy <= (self.grid.ny - 1) as f64
    }

    fn mask_to_grid(&self, mi: usize, mj: usize) -> (f64, f64) {
        (
            mi as f64 * (self.grid.nx - 1) as f64 / (self.mask.nx - 1) as f64,
            mj as f64 * (self.grid.ny - 1) as f64 / (self.mask.ny - 1) as f64,
        )
    }

    fn grid_to_mask(&self, gx: f64, gy: f64) -> (usize, usize) {
        let mi = (gx * (self.mask.nx - 1) as f64 / (self.grid.nx - 1) as f64).round() as usize;
        let mj = (gy * (self.mask.ny - 1) as f64 / (self.grid.ny - 1) as f64).round() as usize;
        (mi.min(self.mask.nx - 1), mj.min(self.mask.ny - 1))
    }

    fn grid_to_data(&self, gx: f64, gy: f64) -> (f64, f64) {
        (
            self.grid.x_min + gx * self.grid.dx(),
            self.grid.y_min + gy * self.grid.dy(),
        )
    }
}

#[derive(Clone, Copy)]
enum Heading {
    Right,
    Up,
    Left,
    Down,
}

/// Mask cells ordered from the outer boundary spiralling inwards.
fn spiral(nx: usize, ny: usize) -> Vec<(usize, usize)> {
    let mut order = Vec::with_capacity(nx * ny);
    let (mut x_first, mut y_first) = (0_usize, 1_usize);
    let (mut x_last, mut y_last) = (nx - 1, ny - 1);
    let (mut x, mut y) = (0_usize, 0_usize);
    let mut heading = Heading::Right;

    for _ in 0..nx * ny {
        order.push((x, y));
        match heading {
            Heading::Right => {
                x += 1;
                if x >= x_last {
                    x_last = x_last.saturating_sub(1);
                    heading = Heading::Up;
                }
            }
            Heading::Up => {
                y += 1;
                if y >= y_last {
                    y_last = y_last.saturating_sub(1);
                    heading = Heading::Left;
                }
            }
            Heading::Left => {
                x = x.saturating_sub(1);
                if x <= x_first {
                    x_first += 1;
                    heading = Heading::Down;
                }
            }
            Heading::Down => {
                y = y.saturating_sub(1);
                if y <= y_first {
                    y_first += 1;
                    heading = Heading::Right;
                }
            }
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::WireSource;
    use std::collections::HashSet;

    fn single_wire(current: f64) -> (Grid, MagneticField) {
        let grid = Grid::from_sources(&[WireSource::new(current, 0.0, 0.0)], 100, 2.0).unwrap();
        let field = MagneticField::solve(&grid, &[WireSource::new(current, 0.0, 0.0)]).unwrap();
        (grid, field)
    }

    #[test]
    fn spiral_visits_every_cell_once() {
        for &(nx, ny) in &[(6, 6), (7, 4), (60, 60)] {
            let order = spiral(nx, ny);
            let unique: HashSet<_> = order.iter().copied().collect();
            assert_eq!(order.len(), nx * ny);
            assert_eq!(unique.len(), nx * ny, "{}x{}", nx, ny);
            assert!(order.iter().all(|&(x, y)| x < nx && y < ny));
        }
    }

    #[test]
    fn spiral_starts_on_the_boundary() {
        let order = spiral(5, 5);
        assert_eq!(&order[..5], &[(0, 0), (1, 0), (2, 0), (3, 0), (4, 0)]);
    }

    #[test]
    fn lines_around_a_wire_stay_inside_the_grid() {
        let (grid, field) = single_wire(1.0);
        let lines = trace(&grid, &field, 2.0);
        assert!(!lines.is_empty());
        for line in &lines {
            assert!(line.points.len() >= 2);
            for &(x, y) in &line.points {
                assert!(grid.contains(x, y), "({}, {}) outside grid", x, y);
            }
        }
    }

    #[test]
    fn lines_circle_the_wire_at_constant_radius() {
        let (grid, field) = single_wire(1.0);
        for line in trace(&grid, &field, 2.0) {
            let radii: Vec<f64> = line.points.iter().map(|(x, y)| x.hypot(*y)).collect();
            let min = radii.iter().copied().fold(f64::INFINITY, f64::min);
            let max = radii.iter().copied().fold(0.0_f64, f64::max);
            // Drift of a second order integrator over a few turns
            assert!(max - min < 0.15 * max + 0.05, "radius drifted {}..{}", min, max);
        }
    }

    #[test]
    fn arrows_follow_the_rotation_sense() {
        for &current in &[1.0, -1.0] {
            let (grid, field) = single_wire(current);
            for line in trace(&grid, &field, 1.0) {
                let Some(((x, y), (dx, dy))) = line.midpoint() else {
                    continue;
                };
                // z-component of r x direction
                let cross = x * dy - y * dx;
                assert_eq!(cross.signum(), current.signum());
            }
        }
    }

    #[test]
    fn seed_on_the_wire_is_skipped() {
        // 15 mask cells put the middle seed exactly on the wire
        let (grid, field) = single_wire(1.0);
        for line in trace(&grid, &field, 0.5) {
            let closest = line
                .points
                .iter()
                .map(|(x, y)| x.hypot(*y))
                .fold(f64::INFINITY, f64::min);
            assert!(closest > 0.01, "line passes through the wire");
        }
    }

    #[test]
    fn higher_density_draws_more_lines() {
        let (grid, field) = single_wire(1.0);
        let sparse = trace(&grid, &field, 0.5).len();
        let dense = trace(&grid, &field, 2.0).len();
        assert!(dense > sparse, "dense {} <= sparse {}", dense, sparse);
    }

    #[test]
    fn zero_field_draws_nothing() {
        let (grid, field) = single_wire(0.0);
        assert!(trace(&grid, &field, 2.0).is_empty());
    }

    #[test]
    fn singular_sample_does_not_poison_other_lines() {
        // 101 samples over [-2, 2] put the wire exactly on a grid node
        let wire = WireSource::new(1.0, 0.0, 0.0);
        let grid = Grid::from_sources(&[wire], 101, 2.0).unwrap();
        let field = MagneticField::solve(&grid, &[wire]).unwrap();
        assert!(field.non_finite_count() > 0);

        let lines = trace(&grid, &field, 2.0);
        assert!(!lines.is_empty());
        for line in &lines {
            assert!(line.points.iter().all(|(x, y)| x.is_finite() && y.is_finite()));
            assert!(line.strength.is_finite());
        }
    }
}
