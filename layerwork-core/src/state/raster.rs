//! Pixel storage of paint layers. Straight (non-premultiplied) RGBA8.

pub type Rgba = [u8; 4];

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<Rgba>,
}
impl Raster {
    /// A raster of the given size, every pixel set to `color`.
    #[must_use]
    pub fn filled(width: u32, height: u32, color: Rgba) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            pixels: vec![color; len],
        }
    }
    /// A fully transparent raster.
    #[must_use]
    pub fn transparent(width: u32, height: u32) -> Self {
        Self::filled(width, height, [0; 4])
    }
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }
    #[must_use]
    pub fn bounds(&self) -> crate::util::Rect {
        crate::util::Rect::from_size(self.width, self.height)
    }
    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }
    /// Get the pixel at this location, or None if out of bounds.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        self.pixels.get(self.index(x, y)?).copied()
    }
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgba) -> bool {
        match self.index(x, y).and_then(|idx| self.pixels.get_mut(idx)) {
            Some(pixel) => {
                *pixel = color;
                true
            }
            None => false,
        }
    }
    /// Set every pixel.
    pub fn fill(&mut self, color: Rgba) {
        self.pixels.fill(color);
    }
    #[must_use]
    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }
}

#[cfg(test)]
mod test {
    use super::Raster;
    #[test]
    fn pixel_access() {
        let mut raster = Raster::transparent(4, 3);
        assert_eq!(raster.pixels().len(), 12);
        assert!(raster.set_pixel(3, 2, [1, 2, 3, 4]));
        assert!(!raster.set_pixel(4, 0, [1, 2, 3, 4]));
        assert_eq!(raster.pixel(3, 2), Some([1, 2, 3, 4]));
        assert_eq!(raster.pixel(0, 3), None);
        raster.fill([9; 4]);
        assert!(raster.pixels().iter().all(|px| *px == [9; 4]));
    }
}
