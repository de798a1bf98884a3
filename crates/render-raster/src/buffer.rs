//! The page bitmap: `height` rows of `width` chunky pixels, each pixel a
//! big-endian color index `depth / 8` bytes wide.

use pagechain_device::{Arena, DeviceError, DeviceResult};
use pagechain_types::{ColorIndex, IntRect};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageBuffer {
    width: i32,
    height: i32,
    bytes_per_pixel: usize,
    data: Vec<u8>,
}

impl PageBuffer {
    /// Allocates a zeroed buffer. `Range` for depths that are not a whole
    /// number of bytes or sizes that overflow; `AllocationFailure` when the
    /// system allocator refuses.
    pub fn new(width: i32, height: i32, depth: u8) -> DeviceResult<Self> {
        let size = Self::size_for(width, height, depth).ok_or_else(|| {
            DeviceError::Range(format!("cannot buffer {width}x{height} pixels at depth {depth}"))
        })?;
        let mut data = Vec::new();
        data.try_reserve_exact(size).map_err(|_| DeviceError::AllocationFailure {
            arena: Arena::Stable,
            requested: size,
            client: "raster page buffer",
        })?;
        data.resize(size, 0);
        Ok(Self { width, height, bytes_per_pixel: usize::from(depth / 8), data })
    }

    /// Bytes needed for a buffer of this size; `None` when the geometry is
    /// invalid or the size overflows.
    pub fn size_for(width: i32, height: i32, depth: u8) -> Option<usize> {
        if depth == 0 || depth > 64 || depth % 8 != 0 || width < 0 || height < 0 {
            return None;
        }
        (width as usize).checked_mul(height as usize)?.checked_mul(usize::from(depth / 8))
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn raster(&self) -> usize {
        self.width as usize * self.bytes_per_pixel
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.bytes_per_pixel
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn bounds(&self) -> IntRect {
        IntRect::new(0, 0, self.width, self.height)
    }

    /// Fills `rect`, clipped to the page. Returns the pixels written.
    pub fn fill(&mut self, rect: IntRect, color: ColorIndex) -> usize {
        let rect = rect.intersect(&self.bounds());
        if rect.is_empty() {
            return 0;
        }
        let bpp = self.bytes_per_pixel;
        let pixel = &color.to_be_bytes()[8 - bpp..];
        let raster = self.raster();
        for y in rect.p.y..rect.q.y {
            let start = y as usize * raster + rect.p.x as usize * bpp;
            let end = y as usize * raster + rect.q.x as usize * bpp;
            for chunk in self.data[start..end].chunks_exact_mut(bpp) {
                chunk.copy_from_slice(pixel);
            }
        }
        (rect.width() * rect.height()) as usize
    }

    pub fn clear(&mut self, color: ColorIndex) {
        let bounds = self.bounds();
        self.fill(bounds, color);
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<ColorIndex> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.bytes_per_pixel;
        let start = y as usize * self.raster() + x as usize * bpp;
        Some(self.data[start..start + bpp].iter().fold(0, |acc, &b| (acc << 8) | ColorIndex::from(b)))
    }

    /// Rows `[y0, y1)` as one slice.
    pub fn rows(&self, y0: i32, y1: i32) -> &[u8] {
        let raster = self.raster();
        let y0 = y0.clamp(0, self.height) as usize;
        let y1 = y1.clamp(0, self.height) as usize;
        &self.data[y0 * raster..y1.max(y0) * raster]
    }

    /// Copies `rect` into `out`, `out_raster` bytes per row; `rect` must lie
    /// inside the page.
    pub fn read_rect(&self, rect: &IntRect, out: &mut Vec<u8>, out_raster: usize) -> bool {
        if rect.is_empty() || rect.intersect(&self.bounds()) != *rect {
            return false;
        }
        let bpp = self.bytes_per_pixel;
        let row_bytes = rect.width() as usize * bpp;
        let out_raster = out_raster.max(row_bytes);
        out.clear();
        out.resize(out_raster * rect.height() as usize, 0);
        for (i, y) in (rect.p.y..rect.q.y).enumerate() {
            let src = y as usize * self.raster() + rect.p.x as usize * bpp;
            out[i * out_raster..i * out_raster + row_bytes].copy_from_slice(&self.data[src..src + row_bytes]);
        }
        true
    }
}
