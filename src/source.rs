/// An infinite straight wire perpendicular to the viewing plane.
///
/// The sign of `current` (amperes) sets the rotation sense of the field:
/// positive currents circulate counter-clockwise.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WireSource {
    pub current: f64,
    pub x: f64,
    pub y: f64,
}

impl WireSource {
    pub fn new(current: f64, x: f64, y: f64) -> Self {
        Self { current, x, y }
    }

    /// Same wire with the current flowing the other way.
    pub fn reversed(&self) -> Self {
        Self {
            current: -self.current,
            ..*self
        }
    }
}
