//! Grid geometry derived from resolution and aspect ratio

use crate::config::AspectRatio;
use crate::error::{Result, SimError};

/// Edge length of a compute tile; both grid dimensions are multiples of it
pub const TILE_SIZE: u32 = 8;

/// Dimensions of the simulation grid
///
/// `nx` and `ny` are rounded up to whole tiles. The rounded `nx` is the
/// effective resolution from then on. Cell spacing is `1 / ny`, so positions
/// and velocities are measured in units of the domain height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridGeometry {
    nx: usize,
    ny: usize,
}

impl GridGeometry {
    /// Derive the grid for a nominal resolution and aspect ratio
    ///
    /// # Arguments
    ///
    /// * `resolution` - Requested cell count along x
    /// * `aspect` - Domain width : height
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] if `resolution` is below one tile or
    /// either aspect component is zero.
    pub fn new(resolution: u32, aspect: AspectRatio) -> Result<Self> {
        if resolution < TILE_SIZE {
            return Err(SimError::config(
                "resolution",
                format!("must be at least {TILE_SIZE}, got {resolution}"),
            ));
        }
        if aspect.width == 0 || aspect.height == 0 {
            return Err(SimError::config("aspect_ratio", "components must be positive"));
        }

        let tiles_x = resolution.div_ceil(TILE_SIZE);
        // Height in cells is floored before rounding up to tiles
        let rows = u64::from(resolution) * u64::from(aspect.height) / u64::from(aspect.width);
        let tiles_y = rows.div_ceil(u64::from(TILE_SIZE)).max(1);

        Ok(Self {
            nx: (tiles_x * TILE_SIZE) as usize,
            ny: (tiles_y * u64::from(TILE_SIZE)) as usize,
        })
    }

    /// Grid of exactly `nx` x `ny` cells, both whole tiles
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] if either side is not a positive
    /// multiple of [`TILE_SIZE`].
    pub fn from_dimensions(nx: usize, ny: usize) -> Result<Self> {
        let tile = TILE_SIZE as usize;
        if nx == 0 || ny == 0 || nx % tile != 0 || ny % tile != 0 {
            return Err(SimError::config(
                "resolution",
                format!("{nx}x{ny} is not a whole number of {tile}x{tile} tiles"),
            ));
        }
        Ok(Self { nx, ny })
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.nx
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.ny
    }

    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.nx * self.ny
    }

    /// Cell spacing in height units
    #[must_use]
    pub fn dx(&self) -> f32 {
        1.0 / self.ny as f32
    }

    /// Compute tiles along (x, y)
    #[must_use]
    pub fn tiles(&self) -> (u32, u32) {
        let tile = TILE_SIZE as usize;
        ((self.nx / tile) as u32, (self.ny / tile) as u32)
    }

    /// Row-major index of cell `(x, y)`
    #[inline]
    #[must_use]
    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.nx + x
    }

    /// Width over height of the rounded grid
    #[must_use]
    pub fn aspect(&self) -> f32 {
        self.nx as f32 / self.ny as f32
    }
}
