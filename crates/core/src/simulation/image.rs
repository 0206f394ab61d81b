//! Initial density from a host image

use crate::error::{Result, SimError};
use crate::solver::{sample_bilinear, GridGeometry};

/// Borrowed image in row-major order, row 0 at the bottom of the domain
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a> {
    pub width: usize,
    pub height: usize,
    /// 1 (grey), 2 (grey + alpha), 3 (RGB) or 4 (RGBA)
    pub channels: usize,
    pub data: &'a [f32],
}

impl ImageView<'_> {
    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(SimError::InvalidImage(format!(
                "{}x{} image has no pixels",
                self.width, self.height
            )));
        }
        if !(1..=4).contains(&self.channels) {
            return Err(SimError::InvalidImage(format!(
                "{} channels, expected 1 to 4",
                self.channels
            )));
        }
        let expected = self.width * self.height * self.channels;
        if self.data.len() != expected {
            return Err(SimError::InvalidImage(format!(
                "expected {} values, got {}",
                expected,
                self.data.len()
            )));
        }
        if self.data.iter().any(|v| !v.is_finite()) {
            return Err(SimError::InvalidImage("contains non-finite values".into()));
        }
        Ok(())
    }

    /// Rec. 709 luma for colour images, the first channel otherwise
    fn luminance(&self) -> Vec<f32> {
        self.data
            .chunks_exact(self.channels)
            .map(|px| match px {
                [r, g, b, ..] => 0.2126 * r + 0.7152 * g + 0.0722 * b,
                [grey, ..] => *grey,
                [] => 0.0,
            })
            .collect()
    }
}

/// Resample an image onto the grid as single-channel density
///
/// Cell centres map onto pixel centres so any image size stretches over the
/// whole domain.
///
/// # Errors
///
/// Returns [`SimError::InvalidImage`] for empty, mis-sized or non-finite input.
pub fn density_from_image(image: &ImageView<'_>, geometry: &GridGeometry) -> Result<Vec<f32>> {
    image.validate()?;
    let luma = image.luminance();

    let (nx, ny) = (geometry.width(), geometry.height());
    let sx = image.width as f32 / nx as f32;
    let sy = image.height as f32 / ny as f32;

    let mut density = Vec::with_capacity(geometry.cell_count());
    for y in 0..ny {
        let v = (y as f32 + 0.5) * sy - 0.5;
        for x in 0..nx {
            let u = (x as f32 + 0.5) * sx - 0.5;
            density.push(sample_bilinear(&luma, image.width, image.height, 1, 0, u, v));
        }
    }
    Ok(density)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn geometry(n: usize) -> GridGeometry {
        GridGeometry::from_dimensions(n, n).unwrap()
    }

    #[test]
    fn test_same_size_grey_is_copied() {
        let data: Vec<f32> = (0..64).map(|i| i as f32 / 64.0).collect();
        let image = ImageView {
            width: 8,
            height: 8,
            channels: 1,
            data: &data,
        };
        let density = density_from_image(&image, &geometry(8)).unwrap();
        for (a, b) in density.iter().zip(&data) {
            assert_relative_eq!(a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_rgba_uses_luma() {
        let data = [1.0, 1.0, 1.0, 0.0].repeat(4);
        let image = ImageView {
            width: 2,
            height: 2,
            channels: 4,
            data: &data,
        };
        let density = density_from_image(&image, &geometry(8)).unwrap();
        assert!(density.iter().all(|&v| (v - 1.0).abs() < 1e-5));
    }

    #[test]
    fn test_upscale_keeps_halves_apart() {
        // Left column black, right column white
        let data = [0.0, 1.0, 0.0, 1.0];
        let image = ImageView {
            width: 2,
            height: 2,
            channels: 1,
            data: &data,
        };
        let density = density_from_image(&image, &geometry(8)).unwrap();
        assert_relative_eq!(density[0], 0.0);
        assert_relative_eq!(density[7], 1.0);
        assert!(density[3] < density[4]);
    }

    #[test]
    fn test_invalid_images_are_rejected() {
        let g = geometry(8);
        let empty = ImageView {
            width: 0,
            height: 4,
            channels: 1,
            data: &[],
        };
        assert!(matches!(density_from_image(&empty, &g), Err(SimError::InvalidImage(_))));

        let short = ImageView {
            width: 2,
            height: 2,
            channels: 3,
            data: &[0.0; 6],
        };
        assert!(matches!(density_from_image(&short, &g), Err(SimError::InvalidImage(_))));

        let nan = [f32::NAN];
        let nan = ImageView {
            width: 1,
            height: 1,
            channels: 1,
            data: &nan,
        };
        assert!(matches!(density_from_image(&nan, &g), Err(SimError::InvalidImage(_))));

        let five = ImageView {
            width: 1,
            height: 1,
            channels: 5,
            data: &[0.0; 5],
        };
        assert!(matches!(density_from_image(&five, &g), Err(SimError::InvalidImage(_))));
    }
}
