use serde::{Deserialize, Serialize};

/// Maps positions in the upscaled OCR raster back onto the screen.
///
/// Fixed for one capture-and-reconstruct cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateMapper {
    pub scale_factor: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Default for CoordinateMapper {
    fn default() -> Self {
        Self::new(1.0, 0.0, 0.0)
    }
}

impl CoordinateMapper {
    pub fn new(scale_factor: f64, offset_x: f64, offset_y: f64) -> Self {
        // A zero or negative factor would collapse every anchor.
        let scale_factor = if scale_factor > 0.0 { scale_factor } else { 1.0 };
        Self {
            scale_factor,
            offset_x,
            offset_y,
        }
    }

    pub fn to_screen(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x / self.scale_factor + self.offset_x,
            y / self.scale_factor + self.offset_y,
        )
    }

    pub fn to_raster(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.offset_x) * self.scale_factor,
            (y - self.offset_y) * self.scale_factor,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divides_by_scale_then_offsets() {
        let mapper = CoordinateMapper::new(3.0, 100.0, 40.0);
        assert_eq!(mapper.to_screen(300.0, 90.0), (200.0, 70.0));
    }

    #[test]
    fn round_trips_within_rounding() {
        let mapper = CoordinateMapper::new(3.0, 17.5, -8.0);
        for &(x, y) in &[(0.0, 0.0), (1.0, 2.0), (1234.5, 987.25), (7.0, 3331.0)] {
            let (sx, sy) = mapper.to_screen(x, y);
            let (rx, ry) = mapper.to_raster(sx, sy);
            assert!((rx - x).abs() < 1e-9, "{x} -> {rx}");
            assert!((ry - y).abs() < 1e-9, "{y} -> {ry}");
        }
    }

    #[test]
    fn non_positive_scale_falls_back_to_identity_scale() {
        let mapper = CoordinateMapper::new(0.0, 5.0, 5.0);
        assert_eq!(mapper.to_screen(10.0, 10.0), (15.0, 15.0));
    }
}
