//! Colorized RGBA frames for display
//!
//! Two frame buffers alternate: a frame is rendered into the back buffer and
//! only then becomes the front one, so a host never sees a half-written frame.

use super::input::FieldKind;

/// Double-buffered RGBA8 frames
pub struct Presentation {
    width: usize,
    height: usize,
    frames: [Vec<u8>; 2],
    front: usize,
}

impl Presentation {
    pub fn new(width: usize, height: usize) -> Self {
        let frame = vec![0; width * height * 4];
        Self {
            width,
            height,
            frames: [frame.clone(), frame],
            front: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Most recently completed frame
    pub fn front(&self) -> &[u8] {
        &self.frames[self.front]
    }

    /// Colorize `data` into the back buffer and flip
    ///
    /// # Panics
    ///
    /// Panics if `data` does not hold one cell per pixel for `kind`.
    pub fn render(&mut self, kind: FieldKind, data: &[f32]) -> &[u8] {
        let channels = kind.channels();
        assert_eq!(
            data.len(),
            self.width * self.height * channels,
            "Field does not match the frame size"
        );

        let back = 1 - self.front;
        for (pixel, cell) in self.frames[back]
            .chunks_exact_mut(4)
            .zip(data.chunks_exact(channels))
        {
            let [r, g, b] = colorize(kind, cell);
            pixel.copy_from_slice(&[to_byte(r), to_byte(g), to_byte(b), u8::MAX]);
        }
        self.front = back;
        self.front()
    }
}

fn colorize(kind: FieldKind, cell: &[f32]) -> [f32; 3] {
    match kind {
        FieldKind::Density => [cell[0]; 3],
        // Black through red and yellow to white
        FieldKind::Temperature => {
            let t = cell[0] * 3.0;
            [t, t - 1.0, t - 2.0]
        }
        FieldKind::Velocity => [0.5 + 0.5 * cell[0], 0.5 + 0.5 * cell[1], 0.5],
        FieldKind::FuelComposite => [cell[1], cell[0], 0.0],
    }
}

fn to_byte(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}
