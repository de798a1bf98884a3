//! Argument types for the device operations.
//!
//! These are deliberately plain data: the device layer never interprets
//! more of them than it needs to forward or to run a default implementation.

use crate::color::{ColorIndex, DeviceColor};
use crate::geometry::{Fixed, FixedPoint, FixedRect, IntRect, Matrix};
use serde::{Deserialize, Serialize};

/// Identifies a bitmap for caching; `NO_BITMAP_ID` means "don't cache".
pub type BitmapId = u64;
pub const NO_BITMAP_ID: BitmapId = 0;

/// Raster operation code (source/texture/destination combination).
pub type LogicalOp = u32;
pub const LOP_DEFAULT: LogicalOp = 0xcc;

/// A borrowed rectangle of packed raster data.
#[derive(Debug, Clone, Copy)]
pub struct Bitmap<'a> {
    pub data: &'a [u8],
    /// Bit (or pixel, for color data) offset of the first sample in each row.
    pub data_x: i32,
    /// Bytes per row.
    pub raster: usize,
    pub id: BitmapId,
}

impl<'a> Bitmap<'a> {
    pub fn new(data: &'a [u8], raster: usize) -> Self {
        Self { data, data_x: 0, raster, id: NO_BITMAP_ID }
    }

    pub fn row(&self, y: usize) -> &'a [u8] {
        let start = (y * self.raster).min(self.data.len());
        let end = (start + self.raster).min(self.data.len());
        &self.data[start..end]
    }

    /// The bit at column `x` of `row`, counting from `data_x`.
    pub fn bit(&self, row: usize, x: i32) -> bool {
        let bit = (self.data_x + x) as usize;
        self.row(row).get(bit / 8).is_some_and(|b| b & (0x80 >> (bit % 8)) != 0)
    }
}

/// A tile used for filling with a repeating pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileBitmap {
    pub data: Vec<u8>,
    pub raster: usize,
    pub width: u32,
    pub height: u32,
    pub id: BitmapId,
}

/// A tile with strip shifting (rep_shift) as used by halftones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripBitmap {
    pub tile: TileBitmap,
    pub rep_width: u32,
    pub rep_height: u32,
    pub shift: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathSegment {
    MoveTo(FixedPoint),
    LineTo(FixedPoint),
    CurveTo(FixedPoint, FixedPoint, FixedPoint),
    ClosePath,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    pub segments: Vec<PathSegment>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(mut self, x: Fixed, y: Fixed) -> Self {
        self.segments.push(PathSegment::MoveTo(FixedPoint::new(x, y)));
        self
    }

    pub fn line_to(mut self, x: Fixed, y: Fixed) -> Self {
        self.segments.push(PathSegment::LineTo(FixedPoint::new(x, y)));
        self
    }

    pub fn close(mut self) -> Self {
        self.segments.push(PathSegment::ClosePath);
        self
    }

    pub fn points(&self) -> Vec<FixedPoint> {
        let mut points = Vec::new();
        for seg in &self.segments {
            match *seg {
                PathSegment::MoveTo(p) | PathSegment::LineTo(p) => points.push(p),
                PathSegment::CurveTo(a, b, c) => points.extend([a, b, c]),
                PathSegment::ClosePath => {}
            }
        }
        points
    }

    /// Control-point bounding box, `None` for an empty path.
    pub fn bbox(&self) -> Option<FixedRect> {
        FixedRect::bounding(&self.points())
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// A clip region; rectangular clips are all this layer needs to reason about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipPath {
    pub outer_box: FixedRect,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FillParams {
    pub rule: FillRule,
    pub adjust: FixedPoint,
    pub flatness: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokeParams {
    pub line_width: f64,
    pub flatness: f32,
}

impl Default for StrokeParams {
    fn default() -> Self {
        Self { line_width: 1.0, flatness: 1.0 }
    }
}

/// The subset of graphics state the device operations consult.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagerState {
    pub ctm: Matrix,
    pub fill_alpha: f32,
    pub stroke_alpha: f32,
    pub overprint: bool,
    pub line_width: f64,
}

impl Default for ImagerState {
    fn default() -> Self {
        Self {
            ctm: Matrix::identity(),
            fill_alpha: 1.0,
            stroke_alpha: 1.0,
            overprint: false,
            line_width: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    /// Samples for all components interleaved in one plane.
    #[default]
    Chunky,
    /// One plane per component.
    ComponentPlanar,
}

/// What `begin_typed_image` is asked to draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    /// Image type number; 1 is the plain sampled image.
    pub image_type: u8,
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u8,
    /// Components in the image's color space.
    pub num_components: u8,
    pub image_mask: bool,
    pub format: ImageFormat,
    /// Maps user space to image space, as in PostScript.
    pub image_matrix: Matrix,
}

impl ImageDescriptor {
    pub fn new(width: u32, height: u32, num_components: u8) -> Self {
        Self {
            image_type: 1,
            width,
            height,
            bits_per_component: 8,
            num_components,
            image_mask: false,
            format: ImageFormat::Chunky,
            image_matrix: Matrix::identity(),
        }
    }

    pub fn mask(width: u32, height: u32) -> Self {
        Self {
            bits_per_component: 1,
            num_components: 1,
            image_mask: true,
            ..Self::new(width, height, 1)
        }
    }

    /// Components the enumerator consumes per sample; masks are always 1.
    pub fn effective_components(&self) -> u8 {
        if self.image_type == 1 && self.image_mask { 1 } else { self.num_components }
    }

    pub fn num_planes(&self) -> usize {
        match self.format {
            ImageFormat::Chunky => 1,
            ImageFormat::ComponentPlanar => usize::from(self.effective_components()),
        }
    }

    /// Bytes in one row of one plane.
    pub fn plane_raster(&self) -> usize {
        let comps = match self.format {
            ImageFormat::Chunky => u32::from(self.effective_components()),
            ImageFormat::ComponentPlanar => 1,
        };
        ((self.width * comps * u32::from(self.bits_per_component)).div_ceil(8)) as usize
    }
}

/// One plane of rows handed to an image enumerator.
#[derive(Debug, Clone, Copy)]
pub struct ImagePlane<'a> {
    pub data: &'a [u8],
    pub data_x: i32,
    pub raster: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextOperation {
    #[default]
    Show,
    CharPath,
    StringWidth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextParams {
    pub operation: TextOperation,
    pub bytes: Vec<u8>,
    /// Extra advance after each glyph, in user space.
    pub char_spacing: f64,
}

impl TextParams {
    pub fn show(text: &str) -> Self {
        Self {
            operation: TextOperation::Show,
            bytes: text.as_bytes().to_vec(),
            char_spacing: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Font {
    pub name: String,
    pub size: f64,
    /// Advance width of every glyph, in 1/1000 em; the device layer does no shaping.
    pub advance: f64,
}

impl Font {
    pub fn new(name: impl Into<String>, size: f64) -> Self {
        Self { name: name.into(), size, advance: 500.0 }
    }
}

/// A compositing request handed to `create_compositor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Compositor {
    Overprint { retain_any_comps: bool, drawn_comps: u64 },
    Transparency { page_group: bool },
    Alpha { alpha: f32 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
}

impl BlendMode {
    pub fn pdf_name(self) -> &'static str {
        match self {
            BlendMode::Normal => "Normal",
            BlendMode::Multiply => "Multiply",
            BlendMode::Screen => "Screen",
            BlendMode::Overlay => "Overlay",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransparencyGroupParams {
    pub isolated: bool,
    pub knockout: bool,
    pub alpha: f32,
    pub blend_mode: BlendMode,
}

impl Default for TransparencyGroupParams {
    fn default() -> Self {
        Self { isolated: false, knockout: false, alpha: 1.0, blend_mode: BlendMode::Normal }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaskSubtype {
    #[default]
    Alpha,
    Luminosity,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransparencyMaskParams {
    pub subtype: MaskSubtype,
    pub background: Vec<f32>,
    pub replacing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternManage {
    /// Does the device want to handle patterns itself?
    CanAccum,
    StartAccum,
    FinishAccum,
    LoadCached,
    ShadingsAreAccepted,
}

/// Attributes for the linear-color (smooth shading) fills.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FillAttributes {
    pub clip: FixedRect,
    pub swap_axes: bool,
}

/// A color at a shading vertex: position plus per-component values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadingVertex {
    pub point: FixedPoint,
    pub color: Vec<f32>,
}

/// Band/plane layout parameters the synchronizer carries along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceParams {
    pub max_bitmap: u64,
    pub buffer_space: u64,
    pub band_height: u32,
    pub band_width: u32,
}

impl Default for SpaceParams {
    fn default() -> Self {
        Self { max_bitmap: 10_000_000, buffer_space: 4_000_000, band_height: 0, band_width: 0 }
    }
}

/// DeviceN parameters exposed by separation devices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevnParams {
    pub bits_per_component: u8,
    pub std_colorant_names: Vec<String>,
    pub separations: Vec<String>,
}

/// Flags for `get_bits_rectangle`; only the fields the layers here use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetBitsParams {
    /// Filled with the packed rows on return.
    pub data: Vec<u8>,
    pub raster: usize,
}

/// Options for `process_page`: a band processor called once per band of
/// rendered rows.
pub struct ProcessPageOptions<'a> {
    pub band_height: u32,
    pub process: &'a mut dyn FnMut(IntRect, &[u8]) -> Result<(), String>,
}

impl std::fmt::Debug for ProcessPageOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessPageOptions").field("band_height", &self.band_height).finish()
    }
}

/// An `include_color_space` request: a named color space the output
/// device may want to embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorSpaceRef {
    pub name: String,
    pub num_components: u8,
    /// ICC data or an equivalent serialized form.
    pub data: Vec<u8>,
}

/// Arguments shared by `copy_rop`, `strip_copy_rop` and `strip_copy_rop2`.
#[derive(Debug, Clone, Copy)]
pub struct RopArgs<'a> {
    pub source: Option<Bitmap<'a>>,
    /// Colors for a monochrome source; `None` means the source holds device pixels.
    pub source_colors: Option<[ColorIndex; 2]>,
    pub texture: Option<&'a StripBitmap>,
    pub texture_colors: Option<[ColorIndex; 2]>,
    pub rect: IntRect,
    pub phase: Phase,
    pub lop: LogicalOp,
    /// Non-zero when the source is stored as planes of this height.
    pub planar_height: u32,
}

impl<'a> RopArgs<'a> {
    pub fn new(rect: IntRect, lop: LogicalOp) -> Self {
        Self {
            source: None,
            source_colors: None,
            texture: None,
            texture_colors: None,
            rect,
            phase: Phase::default(),
            lop,
            planar_height: 0,
        }
    }
}

/// Which kind of object `get_alpha_bits` is asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlphaBitsKind {
    Text,
    Graphics,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::int2fixed;

    #[test]
    fn path_bbox_spans_all_points() {
        let path = Path::new()
            .move_to(int2fixed(1), int2fixed(2))
            .line_to(int2fixed(5), int2fixed(0))
            .line_to(int2fixed(3), int2fixed(7))
            .close();
        assert_eq!(path.bbox(), Some(FixedRect::new(int2fixed(1), 0, int2fixed(5), int2fixed(7))));
    }

    #[test]
    fn mask_images_have_a_single_component() {
        let mut desc = ImageDescriptor::mask(16, 4);
        desc.num_components = 3;
        assert_eq!(desc.effective_components(), 1);
        assert_eq!(desc.plane_raster(), 2);
    }

    #[test]
    fn planar_images_have_one_plane_per_component() {
        let mut desc = ImageDescriptor::new(10, 10, 3);
        desc.format = ImageFormat::ComponentPlanar;
        assert_eq!(desc.num_planes(), 3);
        assert_eq!(desc.plane_raster(), 10);
    }

    #[test]
    fn bitmap_reads_bits_msb_first() {
        let data = [0b1000_0001u8, 0xff];
        let bm = Bitmap::new(&data, 1);
        assert!(bm.bit(0, 0));
        assert!(!bm.bit(0, 1));
        assert!(bm.bit(0, 7));
        assert!(bm.bit(1, 3));
    }
}
