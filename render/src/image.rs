use glam::{UVec2, Vec3};

/// A dense, row-major RGB image with channels in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderImage {
    width: u32,
    height: u32,
    pixels: Vec<Vec3>,
}

impl RenderImage {
    pub fn new(width: u32, height: u32, fill: Vec3) -> Self {
        Self {
            width,
            height,
            pixels: vec![fill; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Vec3 {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn pixels(&self) -> &[Vec3] {
        &self.pixels
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [Vec3] {
        &mut self.pixels
    }

    /// Flat `[r, g, b, r, g, b, ..]` floats.
    pub fn to_rgb32f(&self) -> Vec<f32> {
        self.pixels.iter().flat_map(|p| p.to_array()).collect()
    }

    /// Quantized 8 bit RGB bytes, ready for an image encoder.
    pub fn to_rgb8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|p| p.to_array())
            .map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect()
    }
}
