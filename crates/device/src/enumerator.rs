//! Image and text enumerators.
//!
//! `begin_typed_image` and `text_begin` hand back an enumerator that the
//! caller then drives, either directly or through the chain's `image_data`
//! and `end_image` operations. Each enumerator remembers which device made
//! it so the chain can route the calls back there.

use crate::defaults::{clip_rect, pure_color, read_bits};
use crate::device::{Device, DeviceId};
use crate::error::{DeviceError, DeviceResult};
use pagechain_types::graphics::{ClipPath, Font, ImageDescriptor, ImageFormat, ImagePlane, ImagerState, TextOperation, TextParams};
use pagechain_types::{
    ColorIndex, ColorValue, DeviceColor, FixedPoint, IntRect, Matrix, NO_COLOR_INDEX, Point, MAX_COLOR_VALUE,
};
use std::fmt;

pub trait ImageEnum: Send + fmt::Debug {
    fn device_id(&self) -> DeviceId;

    fn num_planes(&self) -> usize;

    /// Consumes `height` rows from each plane. `Ok(true)` once every row of
    /// the image has been supplied.
    fn plane_data(&mut self, dev: &mut Device, planes: &[ImagePlane<'_>], height: u32) -> DeviceResult<bool>;

    fn end_image(self: Box<Self>, dev: &mut Device, draw_last: bool) -> DeviceResult<()>;

    /// True for enumerators that discard everything.
    fn is_null(&self) -> bool {
        false
    }
}

pub trait TextEnum: Send + fmt::Debug {
    fn device_id(&self) -> DeviceId;

    /// Picks up changed text parameters mid-show.
    fn resync(&mut self, text: &TextParams) -> DeviceResult<()>;

    /// Runs the text operation to completion; `Ok(true)` when done.
    fn process(&mut self, dev: &mut Device) -> DeviceResult<bool>;

    fn is_width_only(&self) -> bool;

    /// Advance accumulated so far, in user space.
    fn current_width(&self) -> Point;

    fn set_cache(&mut self, width: Point) -> DeviceResult<()>;

    /// Restarts processing from the first glyph.
    fn retry(&mut self) -> DeviceResult<()>;

    fn release(&mut self);

    fn is_null(&self) -> bool {
        false
    }
}

/// Returned by suppressing stages: accepts every call and draws nothing.
#[derive(Debug, Clone)]
pub struct NullImageEnum {
    device: DeviceId,
    num_planes: usize,
}

impl NullImageEnum {
    pub fn new(device: DeviceId, image: &ImageDescriptor) -> Self {
        Self { device, num_planes: image.num_planes() }
    }
}

impl ImageEnum for NullImageEnum {
    fn device_id(&self) -> DeviceId {
        self.device
    }

    fn num_planes(&self) -> usize {
        self.num_planes
    }

    fn plane_data(&mut self, _dev: &mut Device, _planes: &[ImagePlane<'_>], _height: u32) -> DeviceResult<bool> {
        Ok(true)
    }

    fn end_image(self: Box<Self>, _dev: &mut Device, _draw_last: bool) -> DeviceResult<()> {
        Ok(())
    }

    fn is_null(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
pub struct NullTextEnum {
    device: DeviceId,
    width_only: bool,
}

impl NullTextEnum {
    pub fn new(device: DeviceId, text: &TextParams) -> Self {
        Self { device, width_only: text.operation == TextOperation::StringWidth }
    }
}

impl TextEnum for NullTextEnum {
    fn device_id(&self) -> DeviceId {
        self.device
    }

    fn resync(&mut self, _text: &TextParams) -> DeviceResult<()> {
        Ok(())
    }

    fn process(&mut self, _dev: &mut Device) -> DeviceResult<bool> {
        Ok(true)
    }

    fn is_width_only(&self) -> bool {
        self.width_only
    }

    fn current_width(&self) -> Point {
        Point::default()
    }

    fn set_cache(&mut self, _width: Point) -> DeviceResult<()> {
        Ok(())
    }

    fn retry(&mut self) -> DeviceResult<()> {
        Ok(())
    }

    fn release(&mut self) {}

    fn is_null(&self) -> bool {
        true
    }
}

/// Renders sample rows as `fill_rectangle` runs on the device that began it.
#[derive(Debug)]
pub struct DefaultImageEnum {
    device: DeviceId,
    descriptor: ImageDescriptor,
    /// Image space to device space.
    to_device: Matrix,
    /// The part of the image being supplied, in image coordinates.
    source: IntRect,
    clip: IntRect,
    /// Paint color for masks; `None` paints nothing.
    mask_color: Option<ColorIndex>,
    rows_done: i32,
}

impl DefaultImageEnum {
    pub fn new(
        dev: &Device,
        pis: &ImagerState,
        matrix: Option<&Matrix>,
        image: &ImageDescriptor,
        rect: Option<&IntRect>,
        color: &DeviceColor,
        clip: Option<&ClipPath>,
    ) -> DeviceResult<Self> {
        if image.image_type != 1 {
            return Err(DeviceError::Range(format!("image type {} has no generic renderer", image.image_type)));
        }
        if !matches!(image.bits_per_component, 1 | 2 | 4 | 8 | 16) {
            return Err(DeviceError::Range(format!("{} bits per component", image.bits_per_component)));
        }
        if !image.image_mask && !matches!(image.num_components, 1 | 3 | 4) {
            return Err(DeviceError::Range(format!("{} color components", image.num_components)));
        }
        let to_user = image
            .image_matrix
            .invert()
            .ok_or_else(|| DeviceError::Range("image matrix is singular".into()))?;
        let ctm = matrix.copied().unwrap_or(pis.ctm);
        let whole = IntRect::new(0, 0, image.width as i32, image.height as i32);
        let source = rect.map_or(whole, |r| r.intersect(&whole));
        Ok(Self {
            device: dev.id(),
            descriptor: image.clone(),
            to_device: to_user.concat(&ctm),
            source,
            clip: clip_rect(dev, clip),
            mask_color: if image.image_mask { pure_color(dev, color) } else { None },
            rows_done: 0,
        })
    }

    fn sample_color(&self, dev: &Device, rows: &[&[u8]], data_x: i32, col: i32) -> ColorIndex {
        let image = &self.descriptor;
        let bits = u32::from(image.bits_per_component);
        let max = (1u64 << bits) - 1;
        let ncomp = usize::from(image.effective_components());
        let sample = |k: usize| -> u64 {
            let (row, index) = match image.format {
                ImageFormat::Chunky => (rows[0], (data_x as usize + col as usize * ncomp + k)),
                ImageFormat::ComponentPlanar => (rows[k], (data_x as usize + col as usize)),
            };
            read_bits(row, index * bits as usize, bits)
        };
        if image.image_mask {
            return match self.mask_color {
                Some(color) if sample(0) != 0 => color,
                _ => NO_COLOR_INDEX,
            };
        }
        let values: Vec<ColorValue> =
            (0..ncomp).map(|k| (sample(k) * u64::from(MAX_COLOR_VALUE) / max) as ColorValue).collect();
        let mapping = dev.get_color_mapping_procs();
        let comps = match values.as_slice() {
            [gray] => mapping.map_gray(*gray),
            [r, g, b] => mapping.map_rgb(*r, *g, *b),
            [c, m, y, k] => mapping.map_cmyk(*c, *m, *y, *k),
            _ => return NO_COLOR_INDEX,
        };
        dev.encode_color(&comps)
    }

    /// Device pixels covered by image columns `[c0, c1)` of image row `y`.
    fn cell_rect(&self, c0: i32, c1: i32, y: i32) -> IntRect {
        let corners = [
            (f64::from(c0), f64::from(y)),
            (f64::from(c1), f64::from(y)),
            (f64::from(c0), f64::from(y + 1)),
            (f64::from(c1), f64::from(y + 1)),
        ]
        .map(|(x, y)| self.to_device.transform_point(Point::new(x, y)));
        let round = |v: f64| (v + 0.5).floor() as i32;
        let (mut x0, mut y0, mut x1, mut y1) = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
        for p in corners {
            x0 = x0.min(p.x);
            y0 = y0.min(p.y);
            x1 = x1.max(p.x);
            y1 = y1.max(p.y);
        }
        IntRect::new(round(x0), round(y0), round(x1), round(y1)).intersect(&self.clip)
    }
}

impl ImageEnum for DefaultImageEnum {
    fn device_id(&self) -> DeviceId {
        self.device
    }

    fn num_planes(&self) -> usize {
        self.descriptor.num_planes()
    }

    fn plane_data(&mut self, dev: &mut Device, planes: &[ImagePlane<'_>], height: u32) -> DeviceResult<bool> {
        if planes.len() < self.num_planes() {
            return Err(DeviceError::Range(format!(
                "image needs {} planes, got {}",
                self.num_planes(),
                planes.len()
            )));
        }
        let data_x = planes[0].data_x;
        for r in 0..height as usize {
            if self.rows_done >= self.source.height() {
                break;
            }
            let rows: Vec<&[u8]> = planes
                .iter()
                .map(|p| {
                    let start = (r * p.raster).min(p.data.len());
                    &p.data[start..]
                })
                .collect();
            let y = self.source.p.y + self.rows_done;
            let width = self.source.width();
            let mut start = 0;
            while start < width {
                let color = self.sample_color(dev, &rows, data_x, start);
                let mut end = start + 1;
                while end < width && self.sample_color(dev, &rows, data_x, end) == color {
                    end += 1;
                }
                if color != NO_COLOR_INDEX {
                    let cell = self.cell_rect(self.source.p.x + start, self.source.p.x + end, y);
                    if !cell.is_empty() {
                        dev.fill_rectangle(cell.p.x, cell.p.y, cell.width(), cell.height(), color)?;
                    }
                }
                start = end;
            }
            self.rows_done += 1;
        }
        Ok(self.rows_done >= self.source.height())
    }

    fn end_image(self: Box<Self>, _dev: &mut Device, _draw_last: bool) -> DeviceResult<()> {
        log::trace!("image on {} ended after {} rows", self.device, self.rows_done);
        Ok(())
    }
}

/// Measures text without painting it: every glyph advances by the font's
/// fixed advance width plus the character spacing.
#[derive(Debug, Clone)]
pub struct DefaultTextEnum {
    device: DeviceId,
    glyphs: usize,
    processed: usize,
    /// Per-glyph advance in user space.
    advance: f64,
    spacing: f64,
    origin: FixedPoint,
    width_only: bool,
    cached: Option<Point>,
    released: bool,
}

impl DefaultTextEnum {
    pub fn new(device: DeviceId, text: &TextParams, font: &Font, origin: FixedPoint) -> Self {
        Self {
            device,
            glyphs: text.bytes.len(),
            processed: 0,
            advance: font.advance / 1000.0 * font.size,
            spacing: text.char_spacing,
            origin,
            width_only: text.operation == TextOperation::StringWidth,
            cached: None,
            released: false,
        }
    }

    pub fn origin(&self) -> FixedPoint {
        self.origin
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl TextEnum for DefaultTextEnum {
    fn device_id(&self) -> DeviceId {
        self.device
    }

    fn resync(&mut self, text: &TextParams) -> DeviceResult<()> {
        self.glyphs = text.bytes.len();
        self.spacing = text.char_spacing;
        self.width_only = text.operation == TextOperation::StringWidth;
        self.processed = self.processed.min(self.glyphs);
        Ok(())
    }

    fn process(&mut self, _dev: &mut Device) -> DeviceResult<bool> {
        if self.released {
            return Err(DeviceError::Structural("text enumerator used after release".into()));
        }
        self.processed = self.glyphs;
        Ok(true)
    }

    fn is_width_only(&self) -> bool {
        self.width_only
    }

    fn current_width(&self) -> Point {
        let per_glyph = self.cached.map_or(self.advance, |w| w.x) + self.spacing;
        Point::new(self.processed as f64 * per_glyph, 0.0)
    }

    fn set_cache(&mut self, width: Point) -> DeviceResult<()> {
        self.cached = Some(width);
        Ok(())
    }

    fn retry(&mut self) -> DeviceResult<()> {
        self.processed = 0;
        Ok(())
    }

    fn release(&mut self) {
        self.released = true;
    }
}
