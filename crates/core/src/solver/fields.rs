//! Field buffers for the CPU backend
//!
//! A field buffer stores one generation of a grid field as a flat `Vec<f32>`
//! in row-major order with channels interleaved per cell. The GPU backend keeps
//! the same layout in storage buffers so readback needs no conversion.

/// One generation of a field on the CPU
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBuffer {
    /// Values in row-major order, `channels` values per cell
    pub data: Vec<f32>,
    /// Grid width in cells
    pub width: usize,
    /// Grid height in cells
    pub height: usize,
    /// Values per cell (1 for scalars, 2 for vectors)
    pub channels: usize,
}

impl FieldBuffer {
    /// Create a zero-filled buffer
    ///
    /// # Arguments
    ///
    /// * `width` - Grid width in cells
    /// * `height` - Grid height in cells
    /// * `channels` - Values stored per cell
    #[must_use]
    pub fn new(width: usize, height: usize, channels: usize) -> Self {
        Self::with_value(width, height, channels, 0.0)
    }

    /// Create a buffer with every value set to `value`
    #[must_use]
    pub fn with_value(width: usize, height: usize, channels: usize, value: f32) -> Self {
        Self {
            data: vec![value; width * height * channels],
            width,
            height,
            channels,
        }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Number of `f32` values in one grid row
    #[must_use]
    pub fn row_len(&self) -> usize {
        self.width * self.channels
    }

    /// Value of `channel` at cell `(x, y)`
    ///
    /// # Panics
    ///
    /// Panics if coordinates or channel are out of bounds
    #[must_use]
    pub fn get(&self, x: usize, y: usize, channel: usize) -> f32 {
        assert!(
            x < self.width && y < self.height && channel < self.channels,
            "Coordinates out of bounds"
        );
        self.data[(y * self.width + x) * self.channels + channel]
    }

    /// Set `channel` at cell `(x, y)`
    ///
    /// # Panics
    ///
    /// Panics if coordinates or channel are out of bounds
    pub fn set(&mut self, x: usize, y: usize, channel: usize, value: f32) {
        assert!(
            x < self.width && y < self.height && channel < self.channels,
            "Coordinates out of bounds"
        );
        self.data[(y * self.width + x) * self.channels + channel] = value;
    }

    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Overwrite this buffer with the contents of `other`
    ///
    /// # Panics
    ///
    /// Panics if the buffers differ in shape
    pub fn copy_from(&mut self, other: &Self) {
        assert!(
            self.width == other.width
                && self.height == other.height
                && self.channels == other.channels,
            "Field shapes differ"
        );
        self.data.copy_from_slice(&other.data);
    }

    /// Sum of one channel over the whole grid
    #[must_use]
    pub fn total(&self, channel: usize) -> f64 {
        self.data
            .iter()
            .skip(channel)
            .step_by(self.channels)
            .map(|&v| f64::from(v))
            .sum()
    }
}

/// Bilinear sample of one channel at a fractional cell position
///
/// Cell centres sit on integer coordinates. Positions outside the grid are
/// clamped to the edge cells.
///
/// # Arguments
///
/// * `data` - Interleaved field values
/// * `width`, `height` - Grid size in cells
/// * `channels`, `channel` - Layout and the channel to read
/// * `x`, `y` - Sample position in cell units
#[inline]
#[must_use]
pub fn sample_bilinear(
    data: &[f32],
    width: usize,
    height: usize,
    channels: usize,
    channel: usize,
    x: f32,
    y: f32,
) -> f32 {
    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let tx = x - x0 as f32;
    let ty = y - y0 as f32;

    let at = |cx: usize, cy: usize| data[(cy * width + cx) * channels + channel];
    let bottom = at(x0, y0) + (at(x1, y0) - at(x0, y0)) * tx;
    let top = at(x0, y1) + (at(x1, y1) - at(x0, y1)) * tx;
    bottom + (top - bottom) * ty
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_creation() {
        let field = FieldBuffer::new(10, 20, 2);
        assert_eq!(field.width, 10);
        assert_eq!(field.height, 20);
        assert_eq!(field.data.len(), 400);
        assert!(field.data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_interleaved_get_set() {
        let mut field = FieldBuffer::new(10, 10, 2);
        field.set(3, 4, 1, 123.45);
        assert_eq!(field.get(3, 4, 1), 123.45);
        assert_eq!(field.get(3, 4, 0), 0.0);
        assert_eq!(field.data[(4 * 10 + 3) * 2 + 1], 123.45);
    }

    #[test]
    fn test_total_per_channel() {
        let mut field = FieldBuffer::new(4, 4, 2);
        field.set(0, 0, 0, 1.0);
        field.set(1, 2, 0, 2.0);
        field.set(3, 3, 1, 5.0);
        assert_eq!(field.total(0), 3.0);
        assert_eq!(field.total(1), 5.0);
    }

    #[test]
    #[should_panic(expected = "Coordinates out of bounds")]
    fn test_field_bounds_check() {
        let field = FieldBuffer::new(10, 10, 1);
        let _ = field.get(10, 5, 0);
    }

    #[test]
    #[should_panic(expected = "Field shapes differ")]
    fn test_copy_shape_check() {
        let mut a = FieldBuffer::new(8, 8, 1);
        let b = FieldBuffer::new(8, 8, 2);
        a.copy_from(&b);
    }

    #[test]
    fn test_bilinear_exact_at_centres_and_midpoints() {
        let mut field = FieldBuffer::new(4, 4, 1);
        field.set(1, 1, 0, 4.0);
        field.set(2, 1, 0, 8.0);
        let sample = |x, y| sample_bilinear(&field.data, 4, 4, 1, 0, x, y);
        assert_eq!(sample(1.0, 1.0), 4.0);
        assert_eq!(sample(1.5, 1.0), 6.0);
        assert_eq!(sample(1.5, 1.5), 3.0);
    }

    #[test]
    fn test_bilinear_clamps_to_edge() {
        let mut field = FieldBuffer::new(4, 4, 1);
        field.set(0, 0, 0, 7.0);
        assert_eq!(sample_bilinear(&field.data, 4, 4, 1, 0, -3.0, -0.5), 7.0);
        field.set(3, 3, 0, 2.0);
        assert_eq!(sample_bilinear(&field.data, 4, 4, 1, 0, 10.0, 3.0), 2.0);
    }
}
