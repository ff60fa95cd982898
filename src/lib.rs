//! Magnetic field lines of infinite straight wires, served over HTTP.
//!
//! A form with `current{i}`, `x_position{i}`, `y_position{i}` triples is
//! parsed into [`WireSource`]s, the superposed Biot–Savart field is sampled
//! on a [`Grid`], field lines are traced through it and drawn to a PNG.

pub mod config;
pub mod error;
pub mod field;
pub mod form;
pub mod grid;
pub mod logging;
pub mod server;
pub mod source;
pub mod streamlines;
pub mod visualisation;

pub use config::AppConfig;
pub use error::{FieldError, Result};
pub use field::MagneticField;
pub use grid::Grid;
pub use source::WireSource;
