//! Bilinear elevation lookup.

use super::types::{within_axis, ElevationGrid, GridError, CELL_EPSILON, NO_DATA};

/// Splits a fractional coordinate into a cell index and the fraction inside
/// that cell. Values within the node tolerance snap onto the node; the last
/// node degenerates to a zero-width cell so nothing is extrapolated.
#[inline]
fn split_axis(value: f64, count: u32) -> (u32, u32, f64) {
    let last = count - 1;
    let mut value = value.clamp(0.0, last as f64);
    let nearest = value.round();
    if (value - nearest).abs() < CELL_EPSILON {
        value = nearest;
    }

    let cell = (value.floor() as u32).min(last);
    if cell == last {
        (cell, cell, 0.0)
    } else {
        (cell, cell + 1, value - cell as f64)
    }
}

impl ElevationGrid {
    /// Elevation in metres at a position, bilinearly interpolated.
    ///
    /// Exact at nodes. Fails with [`GridError::OutsideGrid`] beyond the node
    /// extent and with [`GridError::NoData`] when any corner of the
    /// surrounding cell is the no-data sentinel.
    pub fn interpolate_elevation(&self, lon: f64, lat: f64) -> Result<f64, GridError> {
        let (x, y) = self.cell_coords(lon, lat);
        if !within_axis(x, self.columns()) || !within_axis(y, self.rows()) {
            return Err(GridError::OutsideGrid { lon, lat });
        }

        let (c0, c1, dx) = split_axis(x, self.columns());
        let (r0, r1, dy) = split_axis(y, self.rows());

        let z00 = self.node(c0, r0);
        let z10 = self.node(c1, r0);
        let z01 = self.node(c0, r1);
        let z11 = self.node(c1, r1);
        if [z00, z10, z01, z11].contains(&NO_DATA) {
            return Err(GridError::NoData { lon, lat });
        }

        let (z00, z10, z01, z11) = (z00 as f64, z10 as f64, z01 as f64, z11 as f64);
        let south = z00 + (z10 - z00) * dx;
        let north = z01 + (z11 - z01) * dx;
        Ok(south + (north - south) * dy)
    }
}
